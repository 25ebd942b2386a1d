//! Asynchronous halo exchange of one vector.
//!
//! Creating a ticket gathers every neighbour buffer and posts all receives and
//! sends; [`SynchVectorTicket::wait`] scatter-adds the received buffers in
//! completion order. The ticket borrows the target vector mutably until it is
//! finished, so the vector cannot be touched while the exchange is in flight.

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::request::RequestVector;
use crate::algs::wire::{cast_slice, pod_vec_from};
use crate::lafem::{DenseVector, Scalar, VectorMirror};
use crate::util::statistics::SyncStatistics;
use std::mem::size_of;

pub(crate) const VECTOR_TAG: CommTag = CommTag::new(0x5100);

pub struct SynchVectorTicket<'a, T: Scalar, C: Communicator> {
    target: &'a mut DenseVector<T>,
    ranks: &'a [usize],
    mirrors: &'a [VectorMirror],
    recv_reqs: RequestVector<C::RecvHandle>,
    send_reqs: RequestVector<C::SendHandle>,
    stats: Option<&'a SyncStatistics>,
    bytes_sent: usize,
    finished: bool,
}

impl<'a, T: Scalar, C: Communicator> SynchVectorTicket<'a, T, C> {
    /// Post the exchange of `target` with every `(rank, mirror)` pair.
    ///
    /// `comm` may be `None` only if there are no neighbours.
    pub fn new(
        target: &'a mut DenseVector<T>,
        comm: Option<&'a C>,
        ranks: &'a [usize],
        mirrors: &'a [VectorMirror],
        stats: Option<&'a SyncStatistics>,
    ) -> Self {
        assert_eq!(ranks.len(), mirrors.len(), "ranks/mirrors not co-indexed");
        let mut recv_reqs = RequestVector::with_capacity(ranks.len());
        let mut send_reqs = RequestVector::with_capacity(ranks.len());
        let mut bytes_sent = 0;
        if !ranks.is_empty() {
            let comm = match comm {
                Some(c) => c,
                None => panic!("vector exchange with neighbours needs a communicator"),
            };
            let tag = VECTOR_TAG.as_u16();
            // receives first, then sends
            for (&rank, mirror) in ranks.iter().zip(mirrors) {
                let mut buf = vec![0u8; mirror.num_indices() * size_of::<T>()];
                recv_reqs.push(comm.irecv(rank, tag, &mut buf));
            }
            for (&rank, mirror) in ranks.iter().zip(mirrors) {
                let buf = mirror.gather_vec(&*target);
                let bytes = cast_slice(&buf);
                bytes_sent += bytes.len();
                send_reqs.push(comm.isend(rank, tag, bytes));
            }
        }
        Self {
            target,
            ranks,
            mirrors,
            recv_reqs,
            send_reqs,
            stats,
            bytes_sent,
            finished: false,
        }
    }

    /// Block until every neighbour contribution has been added.
    pub fn wait(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        let mut bytes_received = 0;
        while let Some((i, data)) = self.recv_reqs.wait_any() {
            let rank = self.ranks[i];
            let Some(bytes) = data else {
                panic!("vector exchange: no payload from rank {rank}");
            };
            let expected = self.mirrors[i].num_indices() * size_of::<T>();
            assert_eq!(
                bytes.len(),
                expected,
                "vector exchange: rank {rank} sent {} bytes, expected {expected}",
                bytes.len()
            );
            bytes_received += bytes.len();
            let buf: Vec<T> = pod_vec_from(&bytes);
            self.mirrors[i].scatter_axpy_vec(&*self.target, &buf, T::one());
        }
        self.send_reqs.wait_all();
        if let Some(stats) = self.stats {
            stats.record_vector_sync(self.bytes_sent, bytes_received);
        }
    }
}

impl<T: Scalar, C: Communicator> Drop for SynchVectorTicket<'_, T, C> {
    fn drop(&mut self) {
        if !self.finished && !std::thread::panicking() {
            log::warn!("SynchVectorTicket dropped without wait(); finishing exchange");
            self.finish();
        }
    }
}
