//! Round-robin selection over a liveness snapshot.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Round-robin selector.
///
/// Scans at most one full lap starting at `cursor % len` and leaves the
/// cursor just past the returned index, so the next call resumes there.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the next item for which `is_alive` holds, or `None` when a
    /// full scan finds nothing.
    ///
    /// The read-scan-advance sequence is applied with a compare-and-swap, so
    /// concurrent callers never lose a cursor update.
    pub fn select<T>(&self, items: &[T], is_alive: impl Fn(&T) -> bool) -> Option<usize> {
        let len = items.len();
        if len == 0 {
            return None;
        }

        let mut chosen = None;
        let _ = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cursor| {
                let start = cursor % len;
                chosen = (0..len)
                    .map(|offset| (start + offset) % len)
                    .find(|&index| is_alive(&items[index]));
                chosen.map(|index| index + 1)
            });
        chosen
    }

    #[cfg(test)]
    fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }
}
