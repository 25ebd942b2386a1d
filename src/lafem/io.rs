//! Dense vector file I/O: raw binary, one-value-per-line text, MatrixMarket array.

use super::{DenseVector, Scalar};
use crate::mesh_error::MeshGateError;
use std::fs;
use std::path::Path;

#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileMode {
    /// `u64` count followed by `f64` values, little-endian.
    Binary,
    /// One value per line in exponential notation.
    Exp,
    /// MatrixMarket `array real general` with a single column.
    Mtx,
}

const MTX_HEADER: &str = "%%MatrixMarket matrix array real general";

impl FileMode {
    /// Pick a mode from a file extension (`.bin`, `.exp`/`.txt`, `.mtx`).
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "bin" => Some(FileMode::Binary),
            "exp" | "txt" => Some(FileMode::Exp),
            "mtx" => Some(FileMode::Mtx),
            _ => None,
        }
    }
}

impl<T: Scalar> DenseVector<T> {
    pub fn write_out(&self, mode: FileMode, path: impl AsRef<Path>) -> Result<(), MeshGateError> {
        let path = path.as_ref();
        let data = encode(&self.elements(), mode);
        fs::write(path, data).map_err(|e| MeshGateError::io(path, e))
    }

    pub fn read_from(mode: FileMode, path: impl AsRef<Path>) -> Result<Self, MeshGateError> {
        let path = path.as_ref();
        let raw = fs::read(path).map_err(|e| MeshGateError::io(path, e))?;
        decode(&raw, mode).map(Self::from_vec)
    }
}

pub(crate) fn encode<T: Scalar>(v: &[T], mode: FileMode) -> Vec<u8> {
    match mode {
        FileMode::Binary => {
            let mut out = Vec::with_capacity(8 + 8 * v.len());
            out.extend_from_slice(&(v.len() as u64).to_le_bytes());
            for x in v {
                out.extend_from_slice(&Scalar::to_f64(*x).to_le_bytes());
            }
            out
        }
        FileMode::Exp => v
            .iter()
            .map(|x| format!("{:.16e}\n", Scalar::to_f64(*x)))
            .collect::<String>()
            .into_bytes(),
        FileMode::Mtx => {
            let mut s = format!("{MTX_HEADER}\n{} 1\n", v.len());
            for x in v {
                s.push_str(&format!("{:.16e}\n", Scalar::to_f64(*x)));
            }
            s.into_bytes()
        }
    }
}

pub(crate) fn decode<T: Scalar>(raw: &[u8], mode: FileMode) -> Result<Vec<T>, MeshGateError> {
    let bad = |m: String| MeshGateError::VectorFormat(m);
    match mode {
        FileMode::Binary => {
            let (head, body) = raw
                .split_first_chunk::<8>()
                .ok_or_else(|| bad("missing length header".into()))?;
            let n = u64::from_le_bytes(*head) as usize;
            if body.len() != 8 * n {
                return Err(bad(format!(
                    "expected {} value bytes, found {}",
                    8 * n,
                    body.len()
                )));
            }
            Ok(body
                .chunks_exact(8)
                .map(|c| {
                    let mut b = [0u8; 8];
                    b.copy_from_slice(c);
                    T::from_f64(f64::from_le_bytes(b))
                })
                .collect())
        }
        FileMode::Exp => {
            let text = std::str::from_utf8(raw).map_err(|e| bad(e.to_string()))?;
            text.split_whitespace().map(|t| parse_value(t)).collect()
        }
        FileMode::Mtx => {
            let text = std::str::from_utf8(raw).map_err(|e| bad(e.to_string()))?;
            let mut lines = text.lines().filter(|l| !l.trim().is_empty());
            match lines.next() {
                Some(h) if h.trim().eq_ignore_ascii_case(MTX_HEADER) => {}
                other => return Err(bad(format!("unexpected header {other:?}"))),
            }
            let mut lines = lines.filter(|l| !l.starts_with('%'));
            let dims = lines.next().ok_or_else(|| bad("missing dimensions".into()))?;
            let dims: Vec<&str> = dims.split_whitespace().collect();
            let (n, m) = match dims.as_slice() {
                [n, m] => (
                    n.parse::<usize>().map_err(|e| bad(e.to_string()))?,
                    m.parse::<usize>().map_err(|e| bad(e.to_string()))?,
                ),
                _ => return Err(bad("dimension line needs two entries".into())),
            };
            if m != 1 {
                return Err(bad(format!("expected a single column, found {m}")));
            }
            let vals: Vec<T> = lines
                .flat_map(str::split_whitespace)
                .map(parse_value)
                .collect::<Result<_, _>>()?;
            if vals.len() != n {
                return Err(bad(format!("expected {n} values, found {}", vals.len())));
            }
            Ok(vals)
        }
    }
}

fn parse_value<T: Scalar>(t: &str) -> Result<T, MeshGateError> {
    t.parse::<f64>()
        .map(T::from_f64)
        .map_err(|e| MeshGateError::VectorFormat(format!("`{t}`: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<f64> {
        vec![1.0, -2.5, 3.25e-7, 0.0]
    }

    #[test]
    fn every_mode_reads_back_what_it_wrote() {
        for mode in [FileMode::Binary, FileMode::Exp, FileMode::Mtx] {
            let bytes = encode(&sample(), mode);
            let back: Vec<f64> = decode(&bytes, mode).unwrap();
            assert_eq!(back, sample(), "{mode:?}");
        }
    }

    #[test]
    fn single_precision_is_written_as_double() {
        let v = [0.5f32, -4.0];
        let bytes = encode(&v, FileMode::Binary);
        assert_eq!(bytes.len(), 8 + 2 * 8);
        assert_eq!(&bytes[8..16], &0.5f64.to_le_bytes());
        assert_eq!(decode::<f32>(&bytes, FileMode::Binary).unwrap(), v.to_vec());
        let text = String::from_utf8(encode(&v, FileMode::Exp)).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert_eq!(decode::<f32>(text.as_bytes(), FileMode::Exp).unwrap(), v.to_vec());
    }

    #[test]
    fn truncated_binary_is_rejected() {
        let mut bytes = encode(&sample(), FileMode::Binary);
        bytes.pop();
        assert!(matches!(
            decode::<f64>(&bytes, FileMode::Binary),
            Err(MeshGateError::VectorFormat(_))
        ));
    }

    #[test]
    fn mtx_needs_header() {
        assert!(decode::<f64>(b"2 1\n1\n2\n", FileMode::Mtx).is_err());
    }

    #[test]
    fn file_roundtrip() {
        let dir = std::env::temp_dir().join(format!("mesh-gate-io-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("v.mtx");
        let v = DenseVector::from_vec(sample());
        v.write_out(FileMode::from_extension(&path).unwrap(), &path).unwrap();
        let w = DenseVector::<f64>::read_from(FileMode::Mtx, &path).unwrap();
        assert_eq!(w.to_vec(), sample());
        std::fs::remove_dir_all(&dir).ok();
    }
}
