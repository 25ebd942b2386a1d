//! Domain controls: refinement hierarchies of a rank's patch over one or
//! more communicator layers.

pub mod domain_control;
pub mod domain_level;
pub mod parti_domain_control;
pub mod unit_cube_domain_control;

pub use domain_control::{DomainControl, VirtualLevel};
pub use domain_level::{DomainLayer, DomainLevel};
pub use parti_domain_control::{PartiDomainControl, PartiState, PartiStrategy};
pub use unit_cube_domain_control::{
    HierarchUnitCubeDomainControl, UnitCubeDomainControl, ilog4, lexi_to_two_level, two_level_to_lexi,
};

/// Clamp requested level bounds to `(lvl_max, lvl_min)` with
/// `0 <= lvl_min <= lvl_max`.
///
/// A negative `lvl_min` counts down from `lvl_max`: `-1` keeps only
/// `lvl_max`, `-2` one level more, and so on, never below level 0.
pub fn clamp_levels(lvl_max: i32, lvl_min: i32) -> (usize, usize) {
    let lvl_max = lvl_max.max(0);
    let lvl_min = if lvl_min < 0 {
        (lvl_max + lvl_min + 1).max(0)
    } else {
        lvl_min.min(lvl_max)
    };
    (lvl_max as usize, lvl_min as usize)
}
