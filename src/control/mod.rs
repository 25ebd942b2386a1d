//! Domain controls and the assembly of sync-layer objects from their levels.

pub mod config;
pub mod domain;
pub mod system;

pub use config::PartiConfig;
pub use domain::{
    DomainControl, DomainLayer, DomainLevel, HierarchUnitCubeDomainControl, PartiDomainControl, PartiState,
    PartiStrategy, UnitCubeDomainControl, VirtualLevel,
};
