//! Declarative geometry records as loaded from a machine description.
//!
//! These types are the explicit schema for machine configuration files: a
//! fixed set of recognized fields per volume, a tagged per-axis value enum,
//! and typed phasespace/gun blocks. Unrecognized keys are a construction
//! error, never silently accepted.
//!
//! # Repeats
//!
//! A daughter spec with `repeat: Some(n)` for `n > 1` is a template: the
//! expansion engine materializes `n` concrete volumes from it, resolving the
//! per-axis values from a literal, an explicit per-instance list, or a named
//! transformer (see [`crate::expand`]).
//!
//! # Inherit
//!
//! A daughter spec may name a sibling with `inherit`; the sibling's fields
//! are merged underneath (child fields win, daughter maps merge key-wise),
//! resolved transitively with cycle detection.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::ConfigError;
use crate::math::{Color, Vec3};
use crate::volume::Solid;

// ---------------------------------------------------------------------------
// Per-axis values
// ---------------------------------------------------------------------------

/// How a translation or rotation is specified in a daughter record.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum VectorSpec {
    /// One triple, broadcast to every instance.
    Fixed(Vec3),
    /// One triple per instance; the list length must equal the repeat count.
    PerInstance(Vec<Vec3>),
    /// A registered transformer invoked once per instance index.
    Transform {
        function: String,
        /// Argument map. A `None` value is the inherit sentinel: the value is
        /// taken from the sibling spec field of the same name.
        args: BTreeMap<String, Option<f64>>,
    },
}

/// How a color is specified in a daughter record. A `Transform` resolves to
/// an RGB triple with alpha 1.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ColorSpec {
    Fixed(Color),
    PerInstance(Vec<Color>),
    Transform {
        function: String,
        args: BTreeMap<String, Option<f64>>,
    },
}

// ---------------------------------------------------------------------------
// Volume spec
// ---------------------------------------------------------------------------

/// Declarative record for one volume (or, with `repeat`, a bank of volumes).
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VolumeSpec {
    pub translation: Option<VectorSpec>,
    pub rotation: Option<VectorSpec>,
    pub color: Option<ColorSpec>,
    pub material: Option<String>,
    pub scale: Option<f64>,
    pub mesh_file: Option<String>,
    pub solid: Option<Solid>,
    pub tessellated: Option<bool>,
    /// Number of instances to materialize. Absent or `<= 1` means a single
    /// direct instantiation.
    pub repeat: Option<u32>,
    /// Name of a sibling spec to merge underneath this one.
    pub inherit: Option<String>,
    pub daughters: BTreeMap<String, VolumeSpec>,
}

impl VolumeSpec {
    /// Sibling-field lookup for the transformer inherit sentinel. Only the
    /// numeric spec fields are eligible.
    pub fn numeric_field(&self, key: &str) -> Option<f64> {
        match key {
            "repeat" => self.repeat.map(f64::from),
            "scale" => self.scale,
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Inherit merge
// ---------------------------------------------------------------------------

/// Merge `child` over `parent`: child fields win where present, daughter
/// maps merge key-wise with child precedence. The result carries no
/// `inherit` key.
fn merge_specs(parent: &VolumeSpec, child: &VolumeSpec) -> VolumeSpec {
    let mut daughters = parent.daughters.clone();
    for (name, spec) in &child.daughters {
        daughters.insert(name.clone(), spec.clone());
    }

    VolumeSpec {
        translation: child.translation.clone().or_else(|| parent.translation.clone()),
        rotation: child.rotation.clone().or_else(|| parent.rotation.clone()),
        color: child.color.clone().or_else(|| parent.color.clone()),
        material: child.material.clone().or_else(|| parent.material.clone()),
        scale: child.scale.or(parent.scale),
        mesh_file: child.mesh_file.clone().or_else(|| parent.mesh_file.clone()),
        solid: child.solid.or(parent.solid),
        tessellated: child.tessellated.or(parent.tessellated),
        repeat: child.repeat.or(parent.repeat),
        inherit: None,
        daughters,
    }
}

/// Resolve every `inherit` reference in a daughter map, transitively, with
/// cycle detection. Returns the map with all inherits applied and removed.
pub fn resolve_inherits(
    daughters: &BTreeMap<String, VolumeSpec>,
) -> Result<BTreeMap<String, VolumeSpec>, ConfigError> {
    let mut resolved = BTreeMap::new();
    for name in daughters.keys() {
        let mut visiting = BTreeSet::new();
        let spec = resolve_one(name, daughters, &mut visiting)?;
        resolved.insert(name.clone(), spec);
    }
    Ok(resolved)
}

fn resolve_one(
    name: &str,
    daughters: &BTreeMap<String, VolumeSpec>,
    visiting: &mut BTreeSet<String>,
) -> Result<VolumeSpec, ConfigError> {
    if !visiting.insert(name.to_string()) {
        return Err(ConfigError::InheritCycle {
            volume: name.to_string(),
        });
    }

    let spec = &daughters[name];
    let Some(parent_name) = &spec.inherit else {
        return Ok(spec.clone());
    };

    if !daughters.contains_key(parent_name) {
        return Err(ConfigError::UnknownInherit {
            volume: name.to_string(),
            parent: parent_name.clone(),
        });
    }

    let parent = resolve_one(parent_name, daughters, visiting)?;
    Ok(merge_specs(&parent, spec))
}

// ---------------------------------------------------------------------------
// Machine-level records
// ---------------------------------------------------------------------------

/// A recording/replay plane declared in the machine configuration.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhasespaceSpec {
    pub radius: f64,
    pub z_position: f64,
    #[serde(default = "default_phasespace_material")]
    pub material: String,
    /// Whether particles are absorbed at the plane after being recorded.
    #[serde(default)]
    pub kill: bool,
    /// Whether replayed particles are azimuthally resampled to wash out
    /// recording-induced correlation.
    #[serde(default)]
    pub redistribute: bool,
}

fn default_phasespace_material() -> String {
    "air".to_string()
}

/// Primary-gun defaults declared in the machine configuration.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GunSpec {
    /// Times a single replayed particle may be statistically reused.
    pub recycling_number: u32,
    /// Default beam spot FWHM.
    pub fwhm: f64,
    /// Default beam energy.
    pub energy: f64,
}

impl Default for GunSpec {
    fn default() -> Self {
        Self {
            recycling_number: 1,
            fwhm: 2.0,
            energy: 6.0,
        }
    }
}

/// The full declarative machine description.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MachineConfig {
    pub world: VolumeSpec,
    #[serde(default)]
    pub phasespaces: BTreeMap<String, PhasespaceSpec>,
    #[serde(default)]
    pub gun: GunSpec,
}
