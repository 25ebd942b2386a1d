//! Collections of pending requests with `wait_all` / `wait_any`.

use super::communicator::Wait;

/// Co-indexed set of in-flight requests (one slot per neighbour).
pub struct RequestVector<H: Wait> {
    slots: Vec<Option<H>>,
}

impl<H: Wait> Default for RequestVector<H> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<H: Wait> RequestVector<H> {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            slots: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, h: H) {
        self.slots.push(Some(h));
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of requests not yet completed.
    pub fn pending(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Wait for every pending request, in index order.
    pub fn wait_all(&mut self) -> Vec<(usize, Option<Vec<u8>>)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, s)| s.take().map(|h| (i, h.wait())))
            .collect()
    }

    /// Wait for any one pending request; `None` once all have completed.
    pub fn wait_any(&mut self) -> Option<(usize, Option<Vec<u8>>)> {
        if self.slots.iter().all(Option::is_none) {
            return None;
        }
        loop {
            for (i, slot) in self.slots.iter_mut().enumerate() {
                if let Some(h) = slot {
                    if h.test() {
                        let h = slot.take()?;
                        return Some((i, h.wait()));
                    }
                }
            }
            std::thread::yield_now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{Communicator, LocalUniverse};

    #[test]
    fn wait_any_returns_every_index_once() {
        let universe = LocalUniverse::new(3);
        let me = universe.comm(0);
        let (p1, p2) = (universe.comm(1), universe.comm(2));
        let mut buf = [0u8; 1];
        let mut reqs = RequestVector::with_capacity(2);
        reqs.push(me.irecv(1, 4, &mut buf));
        reqs.push(me.irecv(2, 4, &mut buf));
        p2.isend(0, 4, &[2]);
        let (i, data) = reqs.wait_any().unwrap();
        assert_eq!((i, data), (1, Some(vec![2])));
        p1.isend(0, 4, &[1]);
        let (i, data) = reqs.wait_any().unwrap();
        assert_eq!((i, data), (0, Some(vec![1])));
        assert!(reqs.wait_any().is_none());
        assert_eq!(reqs.pending(), 0);
    }

    #[test]
    fn wait_all_on_unit_handles() {
        let mut reqs: RequestVector<()> = RequestVector::default();
        reqs.push(());
        reqs.push(());
        let done = reqs.wait_all();
        assert_eq!(done.len(), 2);
        assert!(done.iter().all(|(_, d)| d.is_none()));
        assert!(reqs.wait_all().is_empty());
    }
}
