//! Thin façade over intra-process (threads) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! All handles are **waitable** but non-blocking: the sync layer calls
//! `.wait()` before it trusts that a buffer is ready.
//!
//! Matching follows MPI rules: for a given (communicator, source, destination, tag)
//! messages never overtake each other, the n-th receive posted matches the n-th send.

use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Message tag. Tags are scoped per communicator, so independent layers only
/// need distinct tags if they share one communicator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommTag(u16);

impl CommTag {
    /// Reserved for the reductions of the in-process backend.
    pub const COLLECTIVE: CommTag = CommTag(u16::MAX);

    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Derive a distinct tag for phase `k` of a multi-phase exchange.
    pub const fn offset(self, k: u16) -> Self {
        Self(self.0.wrapping_add(k))
    }
}

/// Associative reduction operator for `all_reduce`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Min,
    Max,
}

impl ReduceOp {
    #[inline]
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            ReduceOp::Sum => a + b,
            ReduceOp::Min => a.min(b),
            ReduceOp::Max => a.max(b),
        }
    }
}

/// Non-blocking communication interface.
pub trait Communicator: Send + Sync + 'static {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;
    /// Handle returned by `iall_reduce`.
    type ReduceHandle: ReduceWait;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive of at most `buf.len()` bytes; the payload is returned by `wait`.
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// Post a collective reduction over all ranks of this communicator.
    ///
    /// Every rank must post its reductions in the same order.
    fn iall_reduce(&self, value: f64, op: ReduceOp) -> Self::ReduceHandle;

    /// Blocking all-reduce; returns the identical value on every rank.
    fn all_reduce(&self, value: f64, op: ReduceOp) -> f64 {
        self.iall_reduce(value, op).wait()
    }

    fn barrier(&self) {
        let _ = self.all_reduce(0.0, ReduceOp::Sum);
    }

    /// Collective duplication (fresh message space, same group).
    fn dup(&self) -> Self
    where
        Self: Sized;

    /// Collective creation of the sub-group `{first, first+stride, ...}` of `count` ranks.
    ///
    /// Must be called by every rank of `self`; ranks outside the group get `None`
    /// (the null communicator).
    fn create_range_incl(&self, count: usize, first: usize, stride: usize) -> Option<Self>
    where
        Self: Sized;

    /// Abort the whole process group.
    fn abort(&self, code: i32) -> !;

    #[inline]
    fn is_root(&self) -> bool {
        self.rank() == 0
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;

    /// `true` once `wait` would return without blocking.
    fn test(&mut self) -> bool {
        true
    }
}

/// Pending collective reduction.
pub trait ReduceWait {
    fn wait(self) -> f64;
}

/// Already completed reduction.
#[derive(Copy, Clone, Debug)]
pub struct ReadyReduce(pub f64);

impl ReduceWait for ReadyReduce {
    fn wait(self) -> f64 {
        self.0
    }
}

/// Compile-time no-op comm for pure serial runs: one rank, no peers.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();
    type ReduceHandle = ReadyReduce;

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}
    fn iall_reduce(&self, value: f64, _op: ReduceOp) -> ReadyReduce {
        ReadyReduce(value)
    }
    fn dup(&self) -> Self {
        NoComm
    }
    fn create_range_incl(&self, count: usize, first: usize, _stride: usize) -> Option<Self> {
        (count >= 1 && first == 0).then_some(NoComm)
    }
    fn abort(&self, code: i32) -> ! {
        std::process::exit(code)
    }
}

// --- LocalComm: intra-process / one thread per rank ---
type Key = (u64, usize, usize, u16); // (context, src, dst, tag)

#[derive(Default)]
struct Mailbox {
    slots: DashMap<(Key, u64), Bytes>,
    send_seq: DashMap<Key, u64>,
    recv_seq: DashMap<Key, u64>,
    contexts: DashMap<(u64, u64, usize), u64>,
    next_context: AtomicU64,
}

impl Mailbox {
    fn new() -> Self {
        let mb = Self::default();
        mb.next_context.store(1, Ordering::Relaxed);
        mb
    }

    fn bump(map: &DashMap<Key, u64>, key: Key) -> u64 {
        let mut e = map.entry(key).or_insert(0);
        let seq = *e;
        *e += 1;
        seq
    }

    fn post(&self, key: Key, seq: u64, data: Bytes) {
        self.slots.insert((key, seq), data);
    }

    fn take(&self, key: Key, seq: u64) -> Option<Bytes> {
        self.slots.remove(&(key, seq)).map(|(_, v)| v)
    }

    fn ready(&self, key: Key, seq: u64) -> bool {
        self.slots.contains_key(&(key, seq))
    }

    /// Context id for derivation `n` of `parent`, identical on all members.
    fn context(&self, parent: u64, n: u64, group: usize) -> u64 {
        *self
            .contexts
            .entry((parent, n, group))
            .or_insert_with(|| self.next_context.fetch_add(1, Ordering::Relaxed))
    }

    fn wait_take(&self, key: Key, seq: u64) -> Bytes {
        let mut spins = 0u32;
        loop {
            if let Some(b) = self.take(key, seq) {
                return b;
            }
            spins += 1;
            if spins < 64 {
                std::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
        }
    }
}

/// A group of in-process ranks sharing one mailbox.
pub struct LocalUniverse {
    mailbox: Arc<Mailbox>,
    size: usize,
}

impl LocalUniverse {
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "a universe needs at least one rank");
        Self {
            mailbox: Arc::new(Mailbox::new()),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// World communicator of `rank`.
    pub fn comm(&self, rank: usize) -> LocalComm {
        assert!(rank < self.size, "rank {rank} out of range 0..{}", self.size);
        LocalComm {
            mailbox: self.mailbox.clone(),
            context: 0,
            rank,
            size: self.size,
            derived: AtomicU64::new(0),
        }
    }

    /// Run `f` once per rank, each on its own scoped thread; results in rank order.
    pub fn run<R, F>(size: usize, f: F) -> Vec<R>
    where
        F: Fn(LocalComm) -> R + Sync,
        R: Send,
    {
        let universe = Self::new(size);
        std::thread::scope(|s| {
            let f = &f;
            let handles: Vec<_> = (0..size)
                .map(|r| {
                    let comm = universe.comm(r);
                    s.spawn(move || f(comm))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(v) => v,
                    Err(payload) => std::panic::resume_unwind(payload),
                })
                .collect()
        })
    }
}

/// One rank of a [`LocalUniverse`].
pub struct LocalComm {
    mailbox: Arc<Mailbox>,
    context: u64,
    rank: usize,
    size: usize,
    derived: AtomicU64,
}

impl std::fmt::Debug for LocalComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalComm")
            .field("context", &self.context)
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl LocalComm {
    fn derive(&self, group: usize, rank: usize, size: usize) -> LocalComm {
        let n = self.derived.fetch_add(1, Ordering::Relaxed);
        LocalComm {
            mailbox: self.mailbox.clone(),
            context: self.mailbox.context(self.context, n, group),
            rank,
            size,
            derived: AtomicU64::new(0),
        }
    }

    fn recv_handle(&self, peer: usize, tag: u16, len: usize) -> LocalRecvHandle {
        let key = (self.context, peer, self.rank, tag);
        let seq = Mailbox::bump(&self.mailbox.recv_seq, key);
        LocalRecvHandle {
            mailbox: self.mailbox.clone(),
            key,
            seq,
            len,
        }
    }
}

pub struct LocalRecvHandle {
    mailbox: Arc<Mailbox>,
    key: Key,
    seq: u64,
    len: usize,
}

impl Wait for LocalRecvHandle {
    fn wait(self) -> Option<Vec<u8>> {
        let bytes = self.mailbox.wait_take(self.key, self.seq);
        let n = bytes.len().min(self.len);
        Some(bytes[..n].to_vec())
    }

    fn test(&mut self) -> bool {
        self.mailbox.ready(self.key, self.seq)
    }
}

/// Reduction in flight on a [`LocalComm`]; local rank 0 combines in rank order.
pub struct LocalReduceHandle(ReduceState);

enum ReduceState {
    Ready(f64),
    Root {
        mailbox: Arc<Mailbox>,
        value: f64,
        op: ReduceOp,
        gather: Vec<(Key, u64)>,
        scatter: Vec<(Key, u64)>,
    },
    Leaf(LocalRecvHandle),
}

fn decode_f64(bytes: &[u8], from: usize) -> f64 {
    match <[u8; 8]>::try_from(bytes) {
        Ok(raw) => f64::from_le_bytes(raw),
        Err(_) => panic!(
            "reduction payload from rank {from} has {} bytes, expected 8",
            bytes.len()
        ),
    }
}

impl ReduceWait for LocalReduceHandle {
    fn wait(self) -> f64 {
        match self.0 {
            ReduceState::Ready(v) => v,
            ReduceState::Root {
                mailbox,
                value,
                op,
                gather,
                scatter,
            } => {
                let mut acc = value;
                for (key, seq) in gather {
                    let b = mailbox.wait_take(key, seq);
                    acc = op.apply(acc, decode_f64(&b, key.1));
                }
                let payload = Bytes::copy_from_slice(&acc.to_le_bytes());
                for (key, seq) in scatter {
                    mailbox.post(key, seq, payload.clone());
                }
                acc
            }
            ReduceState::Leaf(h) => {
                let from = h.key.1;
                match h.wait() {
                    Some(b) => decode_f64(&b, from),
                    None => panic!("reduction result from rank {from} missing"),
                }
            }
        }
    }
}

impl Communicator for LocalComm {
    type SendHandle = ();
    type RecvHandle = LocalRecvHandle;
    type ReduceHandle = LocalReduceHandle;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
        debug_assert!(peer < self.size, "peer {peer} out of range");
        let key = (self.context, self.rank, peer, tag);
        let seq = Mailbox::bump(&self.mailbox.send_seq, key);
        self.mailbox.post(key, seq, Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> LocalRecvHandle {
        debug_assert!(peer < self.size, "peer {peer} out of range");
        self.recv_handle(peer, tag, buf.len())
    }

    fn iall_reduce(&self, value: f64, op: ReduceOp) -> LocalReduceHandle {
        let tag = CommTag::COLLECTIVE.as_u16();
        if self.size == 1 {
            return LocalReduceHandle(ReduceState::Ready(value));
        }
        if self.rank == 0 {
            let mut gather = Vec::with_capacity(self.size - 1);
            let mut scatter = Vec::with_capacity(self.size - 1);
            for r in 1..self.size {
                let rk = (self.context, r, 0, tag);
                gather.push((rk, Mailbox::bump(&self.mailbox.recv_seq, rk)));
                let sk = (self.context, 0, r, tag);
                scatter.push((sk, Mailbox::bump(&self.mailbox.send_seq, sk)));
            }
            LocalReduceHandle(ReduceState::Root {
                mailbox: self.mailbox.clone(),
                value,
                op,
                gather,
                scatter,
            })
        } else {
            self.isend(0, tag, &value.to_le_bytes());
            LocalReduceHandle(ReduceState::Leaf(self.recv_handle(0, tag, 8)))
        }
    }

    fn dup(&self) -> Self {
        self.derive(usize::MAX, self.rank, self.size)
    }

    fn create_range_incl(&self, count: usize, first: usize, stride: usize) -> Option<Self> {
        assert!(stride > 0, "stride must be positive");
        assert!(
            count > 0 && first + (count - 1) * stride < self.size,
            "range ({count}, {first}, {stride}) exceeds communicator of size {}",
            self.size
        );
        let member = self.rank >= first
            && (self.rank - first) % stride == 0
            && (self.rank - first) / stride < count;
        // every rank takes part in the derivation counter, members or not
        let n = self.derived.fetch_add(1, Ordering::Relaxed);
        member.then(|| LocalComm {
            mailbox: self.mailbox.clone(),
            context: self.mailbox.context(self.context, n, first),
            rank: (self.rank - first) / stride,
            size: count,
            derived: AtomicU64::new(0),
        })
    }

    fn abort(&self, code: i32) -> ! {
        panic!("rank {} aborted the local universe with code {code}", self.rank)
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::collective::SystemOperation;
    use mpi::request::{Request, StaticScope};
    use mpi::topology::{Color, SimpleCommunicator};
    use mpi::traits::*;

    pub struct MpiComm {
        comm: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    // SAFETY: an MpiComm is created and driven by the thread that initialised MPI;
    // the bounds exist so the same generic code can hold it behind an `Arc`.
    unsafe impl Send for MpiComm {}
    unsafe impl Sync for MpiComm {}

    impl MpiComm {
        /// World communicator. `universe` must outlive every derived `MpiComm`.
        pub fn world(universe: &mpi::environment::Universe) -> Self {
            Self::from_raw(universe.world())
        }

        fn from_raw(comm: SimpleCommunicator) -> Self {
            let rank = comm.rank() as usize;
            let size = comm.size() as usize;
            Self { comm, rank, size }
        }
    }

    fn system_op(op: ReduceOp) -> SystemOperation {
        match op {
            ReduceOp::Sum => SystemOperation::sum(),
            ReduceOp::Min => SystemOperation::min(),
            ReduceOp::Max => SystemOperation::max(),
        }
    }

    /// Owns the message buffer until MPI releases it.
    pub struct MpiHandle {
        req: Option<Request<'static, [u8], StaticScope>>,
        buf: *mut [u8],
        keep: bool,
    }

    impl Wait for MpiHandle {
        fn wait(mut self) -> Option<Vec<u8>> {
            if let Some(req) = self.req.take() {
                req.wait();
            }
            // SAFETY: the request completed, MPI no longer references the buffer,
            // and the pointer came from `Box::into_raw`.
            let data = unsafe { Box::from_raw(self.buf) }.into_vec();
            self.keep.then_some(data)
        }

        fn test(&mut self) -> bool {
            match self.req.take() {
                None => true,
                Some(req) => match req.test() {
                    Ok(_) => true,
                    Err(req) => {
                        self.req = Some(req);
                        false
                    }
                },
            }
        }
    }

    /// Non-blocking all-reduce of one value; owns both buffers until `wait`.
    pub struct MpiReduceHandle {
        req: Option<Request<'static, f64, StaticScope>>,
        send: *mut f64,
        recv: *mut f64,
    }

    impl ReduceWait for MpiReduceHandle {
        fn wait(mut self) -> f64 {
            if let Some(req) = self.req.take() {
                req.wait();
            }
            // SAFETY: the collective completed and both pointers came from `Box::into_raw`.
            unsafe {
                drop(Box::from_raw(self.send));
                *Box::from_raw(self.recv)
            }
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiHandle;
        type RecvHandle = MpiHandle;
        type ReduceHandle = MpiReduceHandle;

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiHandle {
            let ptr: *mut [u8] = Box::into_raw(buf.to_vec().into_boxed_slice());
            // SAFETY: the boxed buffer lives until `wait` reclaims it.
            let data: &'static [u8] = unsafe { &*ptr };
            let req = self
                .comm
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, data, tag as i32);
            MpiHandle {
                req: Some(req),
                buf: ptr,
                keep: false,
            }
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> MpiHandle {
            let ptr: *mut [u8] = Box::into_raw(vec![0u8; buf.len()].into_boxed_slice());
            // SAFETY: as above; MPI has exclusive access until the request completes.
            let data: &'static mut [u8] = unsafe { &mut *ptr };
            let req = self
                .comm
                .process_at_rank(peer as i32)
                .immediate_receive_into_with_tag(StaticScope, data, tag as i32);
            MpiHandle {
                req: Some(req),
                buf: ptr,
                keep: true,
            }
        }

        fn iall_reduce(&self, value: f64, op: ReduceOp) -> MpiReduceHandle {
            let send: *mut f64 = Box::into_raw(Box::new(value));
            let recv: *mut f64 = Box::into_raw(Box::new(0.0));
            // SAFETY: both boxes live until `wait` reclaims them.
            let (sbuf, rbuf): (&'static f64, &'static mut f64) = unsafe { (&*send, &mut *recv) };
            let req = self
                .comm
                .immediate_all_reduce_into(StaticScope, sbuf, rbuf, system_op(op));
            MpiReduceHandle {
                req: Some(req),
                send,
                recv,
            }
        }

        fn barrier(&self) {
            self.comm.barrier();
        }

        fn dup(&self) -> Self {
            Self::from_raw(self.comm.duplicate())
        }

        fn create_range_incl(&self, count: usize, first: usize, stride: usize) -> Option<Self> {
            let member = self.rank >= first
                && (self.rank - first) % stride == 0
                && (self.rank - first) / stride < count;
            let color = if member {
                Color::with_value(0)
            } else {
                Color::undefined()
            };
            self.comm
                .split_by_color_with_key(color, self.rank as i32)
                .map(Self::from_raw)
        }

        fn abort(&self, code: i32) -> ! {
            self.comm.abort(code)
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::{MpiComm, MpiHandle, MpiReduceHandle};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_roundtrip_two_ranks() {
        let universe = LocalUniverse::new(2);
        let comm0 = universe.comm(0);
        let comm1 = universe.comm(1);

        let mut recv_buf = [0u8; 4];
        let recv_handle = comm1.irecv(0, 7, &mut recv_buf);
        comm0.isend(1, 7, &[1, 2, 3, 4]).wait();

        let data = recv_handle
            .wait()
            .expect("Expected to receive data from rank 0");
        recv_buf.copy_from_slice(&data);
        assert_eq!(&recv_buf, &[1, 2, 3, 4]);
    }

    #[test]
    fn messages_do_not_overtake() {
        let universe = LocalUniverse::new(2);
        let (a, b) = (universe.comm(0), universe.comm(1));
        let mut buf = [0u8; 1];
        let first = b.irecv(0, 3, &mut buf);
        let second = b.irecv(0, 3, &mut buf);
        a.isend(1, 3, &[10]);
        a.isend(1, 3, &[20]);
        // waiting out of order still pairs by posting order
        assert_eq!(second.wait().unwrap(), vec![20]);
        assert_eq!(first.wait().unwrap(), vec![10]);
    }

    #[test]
    fn test_reports_arrival() {
        let universe = LocalUniverse::new(2);
        let (a, b) = (universe.comm(0), universe.comm(1));
        let mut buf = [0u8; 2];
        let mut h = b.irecv(0, 1, &mut buf);
        assert!(!h.test());
        a.isend(1, 1, &[5, 6]);
        assert!(h.test());
        assert_eq!(h.wait().unwrap(), vec![5, 6]);
    }

    #[test]
    fn truncation_is_ok() {
        let universe = LocalUniverse::new(2);
        let (a, b) = (universe.comm(0), universe.comm(1));
        let mut small = [0u8; 2];
        let h = b.irecv(0, 9, &mut small);
        a.isend(1, 9, &[1, 2, 3, 4]);
        assert_eq!(h.wait().unwrap(), vec![1, 2]);
    }

    #[test]
    fn all_reduce_on_four_ranks() {
        let out = LocalUniverse::run(4, |comm| {
            let x = (comm.rank() + 1) as f64;
            (
                comm.all_reduce(x, ReduceOp::Sum),
                comm.all_reduce(x, ReduceOp::Min),
                comm.all_reduce(x, ReduceOp::Max),
            )
        });
        for r in out {
            assert_eq!(r, (10.0, 1.0, 4.0));
        }
    }

    #[test]
    fn overlapping_reductions_complete_in_any_order() {
        let out = LocalUniverse::run(3, |comm| {
            let x = comm.rank() as f64;
            let h1 = comm.iall_reduce(x, ReduceOp::Sum);
            let h2 = comm.iall_reduce(x, ReduceOp::Max);
            let m = h2.wait();
            let s = h1.wait();
            (s, m)
        });
        assert!(out.iter().all(|&v| v == (3.0, 2.0)));
    }

    #[test]
    fn range_incl_builds_groups() {
        let out = LocalUniverse::run(8, |comm| {
            let group = comm.create_range_incl(4, comm.rank() & !3, 1);
            let parents = comm.create_range_incl(2, 0, 4);
            let g = group.map(|g| {
                let s = g.all_reduce(comm.rank() as f64, ReduceOp::Sum);
                (g.rank(), g.size(), s)
            });
            (g, parents.map(|p| p.rank()))
        });
        assert_eq!(out[0], (Some((0, 4, 6.0)), Some(0)));
        assert_eq!(out[5], (Some((1, 4, 22.0)), None));
        assert_eq!(out[4].1, Some(1));
    }

    #[test]
    fn no_comm_is_single() {
        let c = NoComm;
        assert_eq!((c.rank(), c.size()), (0, 1));
        assert_eq!(c.all_reduce(2.5, ReduceOp::Max), 2.5);
        assert!(c.create_range_incl(1, 0, 4).is_some());
        assert!(c.create_range_incl(1, 1, 4).is_none());
    }

    #[test]
    fn reduce_op_apply() {
        assert_eq!(ReduceOp::Sum.apply(1.0, 2.0), 3.0);
        assert_eq!(ReduceOp::Min.apply(1.0, 2.0), 1.0);
        assert_eq!(ReduceOp::Max.apply(1.0, 2.0), 2.0);
    }
}
