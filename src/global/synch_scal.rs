//! Asynchronous scalar reduction over a whole communicator.

use crate::algs::communicator::{Communicator, ReduceOp, ReduceWait};
use crate::lafem::Scalar;
use std::marker::PhantomData;

enum Pending<H> {
    Ready(f64),
    Posted(H),
}

/// In-flight all-reduce; optionally takes the square root of the result (norm2).
pub struct SynchScalarTicket<T: Scalar, C: Communicator> {
    state: Option<Pending<C::ReduceHandle>>,
    sqrt: bool,
    _t: PhantomData<T>,
}

impl<T: Scalar, C: Communicator> SynchScalarTicket<T, C> {
    /// Post `op` over `comm`; without a communicator the local value is the result.
    pub fn new(comm: Option<&C>, value: T, op: ReduceOp, sqrt: bool) -> Self {
        let state = match comm {
            Some(c) if c.size() > 1 => Pending::Posted(c.iall_reduce(value.to_f64(), op)),
            _ => Pending::Ready(value.to_f64()),
        };
        Self {
            state: Some(state),
            sqrt,
            _t: PhantomData,
        }
    }

    /// Block until the reduction completes; identical on every rank.
    pub fn wait(mut self) -> T {
        self.finish()
    }

    fn finish(&mut self) -> T {
        let v = match self.state.take() {
            Some(Pending::Posted(h)) => h.wait(),
            Some(Pending::Ready(v)) => v,
            None => unreachable!("scalar ticket finished twice"),
        };
        let v = T::from_f64(v);
        if self.sqrt { v.sqrt() } else { v }
    }
}

impl<T: Scalar, C: Communicator> Drop for SynchScalarTicket<T, C> {
    fn drop(&mut self) {
        // peers block in the collective until every rank has taken part
        if self.state.is_some() && !std::thread::panicking() {
            log::warn!("SynchScalarTicket dropped without wait(); completing reduction");
            let _ = self.finish();
        }
    }
}
