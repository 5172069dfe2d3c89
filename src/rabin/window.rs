use crate::error::Result;

/// Fixed-capacity ring of the most recent bytes of a stream.
///
/// Slots start zeroed, so the first `capacity` pushes evict zeros.
#[derive(Debug, Clone)]
pub(crate) struct RingWindow {
    slots: Box<[u8]>,
    cursor: usize,
}

impl RingWindow {
    /// Allocates a zeroed window, failing instead of aborting when memory is short.
    pub(crate) fn try_new(capacity: usize) -> Result<Self> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(capacity)?;
        slots.resize(capacity, 0);

        Ok(Self {
            slots: slots.into_boxed_slice(),
            cursor: 0,
        })
    }

    /// Stores `byte` and returns the byte it replaced.
    #[inline]
    pub(crate) fn push(&mut self, byte: u8) -> u8 {
        let evicted = std::mem::replace(&mut self.slots[self.cursor], byte);
        self.cursor += 1;
        if self.cursor == self.slots.len() {
            self.cursor = 0;
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_in_fifo_order() {
        let mut window = RingWindow::try_new(3).unwrap();

        // Priming evicts the zeroed slots
        assert_eq!(window.push(1), 0);
        assert_eq!(window.push(2), 0);
        assert_eq!(window.push(3), 0);

        assert_eq!(window.push(4), 1);
        assert_eq!(window.push(5), 2);
        assert_eq!(window.push(6), 3);
        assert_eq!(window.push(7), 4);
    }
}
