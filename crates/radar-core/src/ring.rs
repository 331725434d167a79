use std::collections::VecDeque;

/// A bounded, oldest-evicted ring ordered by insertion.
///
/// Insertion appends to the back; once the ring holds more than `cap`
/// entries, the oldest (front) entry is dropped. For timestamp-ordered
/// data this keeps entries non-decreasing front-to-back as required by the
/// per-channel history invariant.
#[derive(Debug, Clone)]
pub struct Ring<T> {
    entries: VecDeque<T>,
    cap: usize,
}

impl<T> Ring<T> {
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap.min(1024)),
            cap,
        }
    }

    /// Appends `entry`, trimming the oldest entry while over capacity.
    pub fn push(&mut self, entry: T) {
        self.entries.push_back(entry);
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending insertion (timestamp) order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}
