//! JSON mesh files: a mesh, charts, mesh parts and manual partitions, possibly
//! spread over several streams.
//!
//! ```json
//! {
//!   "mesh": { "vertices": [[0,0],[1,0],[0,1],[1,1]], "cells": [[0,1,2,3]] },
//!   "charts": { "outer": { "type": "circle", "center": [0.5,0.5], "radius": 0.71 } },
//!   "meshparts": { "bnd": { "vertices": [0,1], "edges": [[0,1]], "chart": "outer" } },
//!   "partitions": [ { "name": "quad", "level": 1, "patches": [[0],[1],[2],[3]] } ]
//! }
//! ```
//!
//! Mesh-part edges are given by their two vertices. Partition patches list
//! the cells of each rank on the base mesh refined `level` times.

use super::atlas::{Chart, MeshAtlas};
use super::mesh::QuadMesh;
use super::mesh_node::RootMeshNode;
use super::mesh_part::MeshPart;
use super::partition::{Partition, PartitionSet};
use crate::adjacency::Graph;
use crate::mesh_error::MeshGateError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeshSection {
    pub vertices: Vec<[f64; 2]>,
    pub cells: Vec<[usize; 4]>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeshPartSection {
    #[serde(default)]
    pub vertices: Vec<usize>,
    #[serde(default)]
    pub edges: Vec<[usize; 2]>,
    #[serde(default)]
    pub cells: Vec<usize>,
    #[serde(default)]
    pub chart: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartitionSection {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub level: usize,
    pub patches: Vec<Vec<usize>>,
}

/// One parsed stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeshFileStream {
    #[serde(default)]
    pub mesh: Option<MeshSection>,
    #[serde(default)]
    pub charts: BTreeMap<String, Chart>,
    #[serde(default)]
    pub meshparts: BTreeMap<String, MeshPartSection>,
    #[serde(default)]
    pub partitions: Vec<PartitionSection>,
}

/// Result of [`MeshFileReader::parse`].
#[derive(Debug, Clone)]
pub struct MeshFileContents {
    pub node: RootMeshNode,
    pub partitions: PartitionSet,
}

#[derive(Debug, Clone, Default)]
pub struct MeshFileReader {
    streams: Vec<MeshFileStream>,
}

impl MeshFileReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stream(&mut self, text: &str) -> Result<(), MeshGateError> {
        let stream = serde_json::from_str(text)
            .map_err(|e| MeshGateError::MeshParse(format!("stream {}: {e}", self.streams.len())))?;
        self.streams.push(stream);
        Ok(())
    }

    pub fn add_bytes(&mut self, bytes: &[u8]) -> Result<(), MeshGateError> {
        let stream = serde_json::from_slice(bytes)
            .map_err(|e| MeshGateError::MeshParse(format!("stream {}: {e}", self.streams.len())))?;
        self.streams.push(stream);
        Ok(())
    }

    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<(), MeshGateError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| MeshGateError::io(path, e))?;
        self.add_bytes(&bytes)
    }

    pub fn num_streams(&self) -> usize {
        self.streams.len()
    }

    /// Build the root mesh node and the partition set from all streams.
    ///
    /// The first stream with a `mesh` section defines the mesh; charts, parts
    /// and partitions may come from any stream.
    pub fn parse(&self) -> Result<MeshFileContents, MeshGateError> {
        let mut meshes = self.streams.iter().filter_map(|s| s.mesh.as_ref());
        let Some(section) = meshes.next() else {
            return Err(MeshGateError::MeshParse("no stream defines a mesh".into()));
        };
        if meshes.next().is_some() {
            log::warn!("several streams define a mesh; using the first one");
        }
        if section.cells.is_empty() {
            return Err(MeshGateError::MeshParse("mesh has no cells".into()));
        }
        let mesh = QuadMesh::new(section.vertices.clone(), section.cells.clone())?;

        let mut atlas = MeshAtlas::new();
        for (name, chart) in self.streams.iter().flat_map(|s| &s.charts) {
            if !atlas.add_chart(name.clone(), chart.clone()) {
                return Err(MeshGateError::MeshParse(format!("chart '{name}' defined twice")));
            }
        }

        let num_cells = mesh.num_cells();
        let mut node = RootMeshNode::new(mesh, Arc::new(atlas));
        for (name, sec) in self.streams.iter().flat_map(|s| &s.meshparts) {
            let part = mesh_part(node.mesh(), name, sec)?;
            node.add_mesh_part(name.clone(), part)?;
        }

        let mut partitions = PartitionSet::new();
        for sec in self.streams.iter().flat_map(|s| &s.partitions) {
            partitions.add_partition(partition(num_cells, sec)?);
        }
        Ok(MeshFileContents { node, partitions })
    }
}

fn mesh_part(mesh: &QuadMesh, name: &str, sec: &MeshPartSection) -> Result<MeshPart, MeshGateError> {
    let edges = sec
        .edges
        .iter()
        .map(|&[a, b]| {
            mesh.find_edge(a, b).ok_or_else(|| {
                MeshGateError::MeshParse(format!("mesh part '{name}': no edge ({a}, {b})"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let mut part = MeshPart::new(sec.vertices.clone(), edges, sec.cells.clone());
    part.chart = sec.chart.clone();
    Ok(part)
}

fn partition(base_cells: usize, sec: &PartitionSection) -> Result<Partition, MeshGateError> {
    let err = |msg: String| MeshGateError::MeshParse(format!("partition '{}': {msg}", sec.name));
    if sec.patches.is_empty() {
        return Err(err("no patches".into()));
    }
    let num_cells = u32::try_from(sec.level)
        .ok()
        .and_then(|l| 4usize.checked_pow(l))
        .and_then(|f| f.checked_mul(base_cells))
        .ok_or_else(|| err(format!("level {} too large", sec.level)))?;
    let mut owner = vec![None; num_cells];
    for (rank, cells) in sec.patches.iter().enumerate() {
        for &c in cells {
            match owner.get_mut(c) {
                None => return Err(err(format!("cell {c} out of range ({num_cells} cells)"))),
                Some(Some(r)) => {
                    return Err(err(format!("cell {c} assigned to ranks {r} and {rank}")));
                }
                Some(slot) => *slot = Some(rank),
            }
        }
    }
    if let Some(c) = owner.iter().position(Option::is_none) {
        return Err(err(format!("cell {c} assigned to no rank")));
    }
    let graph = Graph::from_lists(num_cells, sec.patches.iter().map(|p| p.iter().copied()));
    Ok(Partition::new(sec.name.clone(), sec.priority, sec.level, graph))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = r#"{
        "mesh": { "vertices": [[0,0],[1,0],[0,1],[1,1]], "cells": [[0,1,2,3]] },
        "meshparts": { "bottom": { "vertices": [0,1], "edges": [[1,0]] } }
    }"#;

    #[test]
    fn parse_mesh_and_parts() {
        let mut r = MeshFileReader::new();
        r.add_stream(SQUARE).unwrap();
        let out = r.parse().unwrap();
        assert_eq!(out.node.mesh().num_cells(), 1);
        assert_eq!(out.node.find_mesh_part("bottom").unwrap().edges, vec![0]);
        assert!(out.partitions.is_empty());
    }

    #[test]
    fn partitions_may_come_from_another_stream() {
        let mut r = MeshFileReader::new();
        r.add_stream(r#"{ "partitions": [ { "name": "four", "level": 1, "patches": [[0],[1],[2],[3]] } ] }"#)
            .unwrap();
        r.add_stream(SQUARE).unwrap();
        let out = r.parse().unwrap();
        let p = out.partitions.find_partition(4, "four").unwrap();
        assert_eq!((p.level(), p.num_elements()), (1, 4));
    }

    #[test]
    fn incomplete_partition_is_rejected() {
        let mut r = MeshFileReader::new();
        r.add_stream(SQUARE).unwrap();
        r.add_stream(r#"{ "partitions": [ { "level": 1, "patches": [[0],[1],[2]] } ] }"#)
            .unwrap();
        assert!(matches!(r.parse(), Err(MeshGateError::MeshParse(_))));
    }

    #[test]
    fn mesh_without_cells_is_rejected() {
        let mut r = MeshFileReader::new();
        r.add_stream(r#"{ "mesh": { "vertices": [], "cells": [] } }"#).unwrap();
        assert!(matches!(r.parse(), Err(MeshGateError::MeshParse(_))));
    }

    #[test]
    fn missing_mesh_and_bad_json() {
        let mut r = MeshFileReader::new();
        r.add_stream("{}").unwrap();
        assert!(matches!(r.parse(), Err(MeshGateError::MeshParse(_))));
        assert!(matches!(r.add_stream("{ mesh"), Err(MeshGateError::MeshParse(_))));
        assert!(matches!(
            r.add_stream(r#"{ "meshes": {} }"#),
            Err(MeshGateError::MeshParse(_))
        ));
    }

    #[test]
    fn unknown_chart_reference() {
        let mut r = MeshFileReader::new();
        r.add_stream(
            r#"{ "mesh": { "vertices": [[0,0],[1,0],[0,1],[1,1]], "cells": [[0,1,2,3]] },
                 "meshparts": { "arc": { "vertices": [0], "chart": "ring" } } }"#,
        )
        .unwrap();
        assert!(matches!(r.parse(), Err(MeshGateError::MissingMeshPart(_))));
    }
}
