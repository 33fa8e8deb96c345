//! The volume tree: a strict, exclusively-owned hierarchy of named nodes.
//!
//! A [`Volume`] carries placement (translation, rotation), appearance
//! (color), a material name, and at most one geometric representation —
//! either a CAD mesh reference or a primitive [`Solid`]. A volume with
//! neither is a pure grouping node. Daughters are held in an ordered-by-name
//! map and are owned exclusively by their mother; there is no sharing and
//! there are no cycles.

use std::collections::BTreeMap;

use crate::error::ConfigError;
use crate::math::{Color, Vec3};

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

/// A geometric primitive understood by the transport engine.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Solid {
    /// A full cylinder along z.
    Cylinder { radius: f64, length: f64 },
    /// A hollow cylinder along z.
    Tube {
        inner_radius: f64,
        outer_radius: f64,
        length: f64,
    },
    /// A square slab: `side` x `side` in plane, `thickness` along z.
    Slab { side: f64, thickness: f64 },
}

/// Reference to a CAD mesh on disk, tessellated by the transport engine.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MeshRef {
    pub file: String,
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_scale() -> f64 {
    1.0
}

// ---------------------------------------------------------------------------
// Volume
// ---------------------------------------------------------------------------

/// A named node in the geometry tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    pub name: String,
    /// Position within the mother volume.
    pub translation: Vec3,
    /// Rotation about the volume center, degrees, applied X then Y then Z.
    pub rotation: Vec3,
    pub color: Color,
    /// Name of a material known to the transport engine.
    pub material: String,
    pub mesh: Option<MeshRef>,
    pub solid: Option<Solid>,
    /// Whether a mesh is kept as a tessellated surface (`true`) or converted
    /// to a tetrahedral mesh for faster navigation (`false`).
    pub tessellated: bool,
    pub daughters: BTreeMap<String, Volume>,
}

impl Volume {
    /// A grouping volume with default placement and no shape.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            translation: (0.0, 0.0, 0.0),
            rotation: (0.0, 0.0, 0.0),
            color: (1.0, 0.0, 0.0, 1.0),
            material: "air".to_string(),
            mesh: None,
            solid: None,
            tessellated: true,
            daughters: BTreeMap::new(),
        }
    }

    /// Enforce the single-representation invariant.
    pub fn check_shape(&self) -> Result<(), ConfigError> {
        if self.mesh.is_some() && self.solid.is_some() {
            return Err(ConfigError::AmbiguousShape {
                volume: self.name.clone(),
            });
        }
        Ok(())
    }

    pub fn x_position(&self) -> f64 {
        self.translation.0
    }

    pub fn set_x_position(&mut self, value: f64) {
        self.translation.0 = value;
    }

    pub fn y_position(&self) -> f64 {
        self.translation.1
    }

    pub fn set_y_position(&mut self, value: f64) {
        self.translation.1 = value;
    }

    /// Direct daughter by name.
    pub fn daughter(&self, name: &str) -> Option<&Volume> {
        self.daughters.get(name)
    }

    /// Direct daughter by name, mutable.
    pub fn daughter_mut(&mut self, name: &str) -> Option<&mut Volume> {
        self.daughters.get_mut(name)
    }

    /// Insert a daughter, replacing any existing daughter of the same name.
    pub fn insert_daughter(&mut self, daughter: Volume) {
        self.daughters.insert(daughter.name.clone(), daughter);
    }

    /// Find a descendant (or this volume itself) by name, depth first.
    pub fn find_mut(&mut self, name: &str) -> Option<&mut Volume> {
        if self.name == name {
            return Some(self);
        }
        for daughter in self.daughters.values_mut() {
            if let Some(found) = daughter.find_mut(name) {
                return Some(found);
            }
        }
        None
    }

    /// Visit every descendant in name order, depth first.
    pub fn for_each(&self, f: &mut impl FnMut(&Volume)) {
        for daughter in self.daughters.values() {
            f(daughter);
            daughter.for_each(f);
        }
    }

    /// Visit every descendant in name order, depth first, mutably.
    pub fn for_each_mut(&mut self, f: &mut impl FnMut(&mut Volume)) {
        for daughter in self.daughters.values_mut() {
            f(daughter);
            daughter.for_each_mut(f);
        }
    }

    /// Count all descendants.
    pub fn descendant_count(&self) -> usize {
        let mut n = 0;
        self.for_each(&mut |_| n += 1);
        n
    }
}
