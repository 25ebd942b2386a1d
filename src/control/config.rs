//! Partitioning options of [`PartiDomainControl`](super::domain::PartiDomainControl).

use crate::geometry::AdaptMode;
use crate::mesh_error::MeshGateError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PartiConfig {
    pub allow_manual: bool,
    pub allow_metis: bool,
    pub allow_fallback: bool,
    /// Name filter for manual partitions; empty accepts any name.
    pub partition_name: String,
    /// Automatic partitioners refine the base mesh to at least this many
    /// elements per rank.
    pub min_elems_per_rank: usize,
    pub adapt_mode: AdaptMode,
    /// Keep the refined base mesh of every level (needed by splitters).
    pub keep_base_levels: bool,
}

impl Default for PartiConfig {
    fn default() -> Self {
        Self {
            allow_manual: true,
            allow_metis: true,
            allow_fallback: true,
            partition_name: String::new(),
            min_elems_per_rank: 4,
            adapt_mode: AdaptMode::Chart,
            keep_base_levels: false,
        }
    }
}

/// Values following `--name` up to the next `--option`, for every occurrence.
fn option_values<'a>(args: &'a [String], name: &str) -> Option<Vec<&'a str>> {
    let mut found = None;
    for (i, a) in args.iter().enumerate() {
        if a.strip_prefix("--") != Some(name) {
            continue;
        }
        let values = found.get_or_insert_with(Vec::new);
        values.extend(
            args[i + 1..]
                .iter()
                .take_while(|v| !v.starts_with("--"))
                .map(String::as_str),
        );
    }
    found
}

impl PartiConfig {
    pub fn from_json(text: &str) -> Result<Self, MeshGateError> {
        serde_json::from_str(text).map_err(|e| MeshGateError::InvalidArgument(format!("partitioner config: {e}")))
    }

    /// Apply `--parti-type`, `--parti-name` and `--parti-rank-elems`; other
    /// arguments are ignored.
    pub fn parse_args(&mut self, args: &[String]) -> Result<(), MeshGateError> {
        if let Some(types) = option_values(args, "parti-type") {
            self.allow_manual = false;
            self.allow_metis = false;
            self.allow_fallback = false;
            for t in types {
                match t {
                    "manual" => self.allow_manual = true,
                    "parmetis" | "metis" => self.allow_metis = true,
                    "fallback" => self.allow_fallback = true,
                    other => {
                        return Err(MeshGateError::InvalidArgument(format!(
                            "unknown partitioner type '{other}'"
                        )));
                    }
                }
            }
        }
        if let Some(names) = option_values(args, "parti-name") {
            match names.as_slice() {
                [name] => self.partition_name = (*name).to_string(),
                _ => {
                    return Err(MeshGateError::InvalidArgument(
                        "--parti-name expects exactly one name".into(),
                    ));
                }
            }
        }
        if let Some(values) = option_values(args, "parti-rank-elems") {
            let n = match values.as_slice() {
                [v] => v.parse::<usize>().ok().filter(|&n| n > 0),
                _ => None,
            };
            let Some(n) = n else {
                return Err(MeshGateError::InvalidArgument(format!(
                    "--parti-rank-elems expects one positive count, got {values:?}"
                )));
            };
            self.min_elems_per_rank = n;
        }
        Ok(())
    }
}
