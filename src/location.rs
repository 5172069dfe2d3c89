//! Addresses of byte ranges inside versioned, namespaced objects.

use std::fmt;

/// Namespace identifier. The id space is bounded to 256 namespaces.
pub type NamespaceId = u8;

/// A byte range inside an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}

impl ByteRange {
    pub const fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// Exclusive end offset.
    ///
    /// The range must fit in `u64`; ranges produced by a successful scan always do.
    /// Use [`checked_end`](Self::checked_end) for untrusted input.
    pub const fn end(&self) -> u64 {
        self.offset + self.length
    }

    /// Exclusive end offset, or `None` if it overflows `u64`.
    pub const fn checked_end(&self) -> Option<u64> {
        self.offset.checked_add(self.length)
    }
}

/// Identifies `length` bytes at `offset` inside version `object_version` of
/// `object_name` in namespace `namespace_id`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockLocation {
    pub namespace_id: NamespaceId,
    pub object_name: String,
    pub object_version: String,
    pub offset: u64,
    pub length: u64,
}

impl BlockLocation {
    pub fn new(
        namespace_id: NamespaceId,
        object_name: impl Into<String>,
        object_version: impl Into<String>,
        offset: u64,
        length: u64,
    ) -> Self {
        Self {
            namespace_id,
            object_name: object_name.into(),
            object_version: object_version.into(),
            offset,
            length,
        }
    }

    pub fn namespace_id(&self) -> NamespaceId {
        self.namespace_id
    }

    pub fn block_range(&self) -> ByteRange {
        ByteRange::new(self.offset, self.length)
    }

    ///
    /// Returns the location of a sub-range of this block.
    ///
    /// `offset` is relative to the start of this block; the result addresses the
    /// same object and version. Returns `None` if the sub-range ends past `u64::MAX`.
    ///
    pub fn narrow(&self, offset: u64, length: u64) -> Option<Self> {
        let start = self.offset.checked_add(offset)?;
        start.checked_add(length)?;

        Some(Self {
            namespace_id: self.namespace_id,
            object_name: self.object_name.clone(),
            object_version: self.object_version.clone(),
            offset: start,
            length,
        })
    }
}

impl fmt::Display for BlockLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}@{}[{}+{}]",
            self.namespace_id, self.object_name, self.object_version, self.offset, self.length
        )
    }
}
