//! Field-shaping calculators.
//!
//! [`rounded_leaf_position`] is the one machine-independent calculation: it
//! corrects a collimating element's lateral position for its rounded tip so
//! the projected field edge at the isocenter plane matches the requested
//! size. Everything else about field shaping is machine-specific and lives
//! behind [`MachineProfile`].

use crate::error::FieldError;
use crate::volume::Volume;

/// Distance from the virtual source to the isocenter plane.
pub const ISOCENTER_DISTANCE: f64 = 1000.0;

/// Position of a rounded-tip leaf/jaw such that the projected field edge at
/// the isocenter plane equals `field_size`.
///
/// The correction `delta` grows with the beam divergence angle at the field
/// edge. The branch is selected by the sign of `field_size` itself (zero
/// takes the positive branch), not by the sign of the projected result.
pub fn rounded_leaf_position(
    leaf_radius: f64,
    radius_position: f64,
    field_size: f64,
    iso_position: f64,
) -> f64 {
    let theta = (field_size / iso_position).atan();
    let delta = leaf_radius / theta.cos() - leaf_radius;
    let projected = field_size / iso_position * radius_position;

    if field_size >= 0.0 {
        projected + delta
    } else {
        projected - delta
    }
}

/// Machine-specific field shaping. A concrete treatment machine supplies
/// leaf/jaw naming and geometry; there is no generic default.
///
/// Implementations receive the head subtree mutably and set leaf/jaw
/// positions on the named daughter volumes.
pub trait MachineProfile {
    /// Set the jaw pairs for a rectangular aperture `(x1, x2, y1, y2)`.
    fn rectangular_field_jaws(
        &self,
        head: &mut Volume,
        x1: f64,
        x2: f64,
        y1: f64,
        y2: f64,
    ) -> Result<(), FieldError>;

    /// Set both leaf banks for a rectangular aperture `(x1, x2, y1, y2)`.
    fn rectangular_field_mlc(
        &self,
        head: &mut Volume,
        x1: f64,
        x2: f64,
        y1: f64,
        y2: f64,
    ) -> Result<(), FieldError>;

    /// Set every leaf pair directly from two bank position lists.
    fn arbitrary_field_mlc(
        &self,
        head: &mut Volume,
        bank1: &[f64],
        bank2: &[f64],
    ) -> Result<(), FieldError>;
}
