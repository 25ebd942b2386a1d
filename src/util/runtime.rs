//! All-or-nothing termination of a process group.

use super::dist_log::RankLogger;
use crate::algs::communicator::Communicator;
use crate::mesh_error::MeshGateError;

/// Print `err` on rank 0 only, then abort every rank of `comm`.
pub fn abort_with<C: Communicator>(comm: &C, err: &MeshGateError) -> ! {
    RankLogger::for_comm(comm).error(format!("ERROR: {err}"));
    comm.abort(1)
}

/// Unwrap `res` or abort the process group with a rank-0 diagnostic.
pub fn or_abort<T, C: Communicator>(comm: &C, res: Result<T, MeshGateError>) -> T {
    match res {
        Ok(v) => v,
        Err(e) => abort_with(comm, &e),
    }
}
