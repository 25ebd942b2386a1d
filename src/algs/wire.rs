//! Fixed little-endian wire helpers for the exchange paths.
//!
//! Numeric payloads travel as raw `Pod` slices; index arrays as `u64` so that
//! 32- and 64-bit peers agree.

use super::communicator::{CommTag, Communicator, Wait};
use bytemuck::{Pod, Zeroable};
use std::mem::size_of;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

/// Decode a byte payload into an owned vector (payload need not be aligned).
///
/// A trailing partial element is ignored; callers check lengths first.
pub fn pod_vec_from<T: Pod>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(size_of::<T>())
        .map(bytemuck::pod_read_unaligned)
        .collect()
}

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

/// Encode indices as little-endian `u64`.
pub fn encode_indices(idx: &[usize]) -> Vec<u8> {
    let wire: Vec<u64> = idx.iter().map(|&i| (i as u64).to_le()).collect();
    cast_slice(&wire).to_vec()
}

pub fn decode_indices(bytes: &[u8]) -> Vec<usize> {
    pod_vec_from::<u64>(bytes)
        .into_iter()
        .map(|w| u64::from_le(w) as usize)
        .collect()
}

/// Sparse buffer dimensions exchanged ahead of the structure.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct WireDims {
    pub rows_le: u64,
    pub cols_le: u64,
    pub nnz_le: u64,
}

impl WireDims {
    pub const SIZE: usize = 24;

    pub fn new(rows: usize, cols: usize, nnz: usize) -> Self {
        Self {
            rows_le: (rows as u64).to_le(),
            cols_le: (cols as u64).to_le(),
            nnz_le: (nnz as u64).to_le(),
        }
    }

    pub fn get(&self) -> (usize, usize, usize) {
        (
            u64::from_le(self.rows_le) as usize,
            u64::from_le(self.cols_le) as usize,
            u64::from_le(self.nnz_le) as usize,
        )
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        (bytes.len() == Self::SIZE).then(|| bytemuck::pod_read_unaligned(bytes))
    }
}

static_assertions::const_assert_eq!(size_of::<WireDims>(), WireDims::SIZE);

/// Broadcast a byte payload from `root` to every rank (length first, then data).
///
/// `data` is only read on `root`.
pub fn broadcast_bytes<C: Communicator>(comm: &C, root: usize, data: Option<Vec<u8>>) -> Vec<u8> {
    let tag = CommTag::new(0xB0);
    let (len_tag, data_tag) = (tag.as_u16(), tag.offset(1).as_u16());
    if comm.size() == 1 {
        return data.unwrap_or_default();
    }
    if comm.rank() == root {
        let data = data.unwrap_or_default();
        let len = (data.len() as u64).to_le_bytes();
        let mut sends = Vec::with_capacity(2 * (comm.size() - 1));
        for peer in (0..comm.size()).filter(|&p| p != root) {
            sends.push(comm.isend(peer, len_tag, &len));
            sends.push(comm.isend(peer, data_tag, &data));
        }
        for s in sends {
            let _ = s.wait();
        }
        data
    } else {
        let mut len_buf = [0u8; 8];
        let len = comm
            .irecv(root, len_tag, &mut len_buf)
            .wait()
            .and_then(|b| <[u8; 8]>::try_from(b.as_slice()).ok())
            .map(u64::from_le_bytes)
            .unwrap_or_else(|| panic!("broadcast length from rank {root} missing"));
        let mut buf = vec![0u8; len as usize];
        comm.irecv(root, data_tag, &mut buf)
            .wait()
            .unwrap_or_else(|| panic!("broadcast payload from rank {root} missing"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::LocalUniverse;

    #[test]
    fn dims_roundtrip() {
        let d = WireDims::new(3, 7, 12);
        let bytes = cast_slice(&[d]).to_vec();
        assert_eq!(WireDims::decode(&bytes).unwrap().get(), (3, 7, 12));
        assert!(WireDims::decode(&bytes[..8]).is_none());
    }

    #[test]
    fn indices_survive_the_wire() {
        let idx = vec![0usize, 5, 1 << 40];
        assert_eq!(decode_indices(&encode_indices(&idx)), idx);
    }

    #[test]
    fn pod_decode_accepts_unaligned_payloads() {
        let vals = [1.5f64, -2.25, 3.0];
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(cast_slice(&vals));
        assert_eq!(pod_vec_from::<f64>(&bytes[1..]), vals.to_vec());
        assert_eq!(pod_vec_from::<f32>(&cast_slice(&[0.5f32, 4.0])[..6]), vec![0.5f32]);
    }

    #[test]
    fn broadcast_reaches_all_ranks() {
        let out = LocalUniverse::run(3, |comm| {
            let mine = (comm.rank() == 1).then(|| b"partition".to_vec());
            broadcast_bytes(&comm, 1, mine)
        });
        assert!(out.iter().all(|v| v == b"partition"));
    }

    #[test]
    fn expect_len() {
        assert!(expect_exact_len(4, 4).is_ok());
        assert!(expect_exact_len(3, 4).is_err());
    }
}
