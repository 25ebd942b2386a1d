//! Read a file on rank 0 and hand its contents to every rank.

use crate::algs::communicator::Communicator;
use crate::algs::wire::broadcast_bytes;
use crate::mesh_error::MeshGateError;
use std::path::Path;

/// Collective: rank 0 reads `path`, all ranks receive the same bytes or the same error.
pub fn read_common<C: Communicator>(comm: &C, path: impl AsRef<Path>) -> Result<Vec<u8>, MeshGateError> {
    let path = path.as_ref();
    let mine = (comm.rank() == 0).then(|| match std::fs::read(path) {
        Ok(mut bytes) => {
            bytes.insert(0, 1);
            bytes
        }
        Err(e) => {
            let mut msg = e.to_string().into_bytes();
            msg.insert(0, 0);
            msg
        }
    });
    let mut data = broadcast_bytes(comm, 0, mine);
    if data.is_empty() {
        return Err(MeshGateError::Io {
            path: path.display().to_string(),
            message: "empty broadcast".into(),
        });
    }
    let ok = data.remove(0) == 1;
    if ok {
        Ok(data)
    } else {
        Err(MeshGateError::Io {
            path: path.display().to_string(),
            message: String::from_utf8_lossy(&data).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::LocalUniverse;

    #[test]
    fn missing_file_fails_on_every_rank() {
        let out = LocalUniverse::run(3, |comm| read_common(&comm, "/definitely/not/here.json"));
        assert!(out.iter().all(|r| matches!(r, Err(MeshGateError::Io { .. }))));
    }

    #[test]
    fn contents_reach_every_rank() {
        let path = std::env::temp_dir().join(format!("mesh-gate-common-{}.txt", std::process::id()));
        std::fs::write(&path, b"hello ranks").unwrap();
        let out = LocalUniverse::run(2, |comm| read_common(&comm, &path).unwrap());
        assert!(out.iter().all(|b| b == b"hello ranks"));
        std::fs::remove_file(&path).ok();
    }
}
