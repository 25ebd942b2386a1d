//! 2-D quadrilateral meshes: refinement, mesh parts, patch extraction and
//! mesh files.
//!
//! Only what the domain controls need to build levels, halos and patches;
//! there is no finite-element machinery here.

pub mod atlas;
pub mod mesh;
pub mod mesh_file;
pub mod mesh_node;
pub mod mesh_part;
pub mod partition;
pub mod unit_cube;

pub use atlas::{AdaptMode, Chart, MeshAtlas};
pub use mesh::QuadMesh;
pub use mesh_file::{MeshFileContents, MeshFileReader};
pub use mesh_node::{PatchExtraction, RootMeshNode};
pub use mesh_part::MeshPart;
pub use partition::{Partition, PartitionSet};
pub use unit_cube::{UnitCubePatch, UnitCubePatchGenerator};
