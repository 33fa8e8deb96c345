//! A treatment machine: the live volume tree plus its declarative context.
//!
//! The machine owns the world volume built from a [`MachineConfig`], the
//! phasespace declarations, the gun defaults, and an optional
//! [`MachineProfile`] supplying the machine-specific field-shaping
//! operations. Orientation operations (`rotate_gantry`, `rotate_collimator`)
//! act on the `head` daughter of the world.

use std::collections::BTreeMap;

use crate::error::{ConfigError, FieldError};
use crate::expand::build_tree;
use crate::field::MachineProfile;
use crate::math::rotate_about_y;
use crate::schema::{GunSpec, MachineConfig, PhasespaceSpec, VolumeSpec};
use crate::transformer::TransformerRegistry;
use crate::volume::Volume;

/// A declarative daughter queued for materialization at the next geometry
/// update.
#[derive(Debug, Clone)]
pub struct PendingComponent {
    /// Name of the mother volume to attach under.
    pub parent: String,
    pub name: String,
    pub spec: VolumeSpec,
}

/// The configured machine: world tree, phasespace declarations, gun
/// defaults, and the optional field-shaping profile.
pub struct Machine {
    pub world: Volume,
    pub phasespaces: BTreeMap<String, PhasespaceSpec>,
    pub gun: GunSpec,
    profile: Option<Box<dyn MachineProfile>>,
    pending: Vec<PendingComponent>,
}

impl Machine {
    /// Build the machine from its declarative configuration, expanding every
    /// repeated daughter.
    pub fn from_config(
        config: &MachineConfig,
        registry: &TransformerRegistry,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            world: build_tree("world", &config.world, registry)?,
            phasespaces: config.phasespaces.clone(),
            gun: config.gun.clone(),
            profile: None,
            pending: Vec::new(),
        })
    }

    /// Install the machine-specific field-shaping profile.
    pub fn with_profile(mut self, profile: Box<dyn MachineProfile>) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn has_profile(&self) -> bool {
        self.profile.is_some()
    }

    fn head_mut(world: &mut Volume) -> Result<&mut Volume, FieldError> {
        world.daughter_mut("head").ok_or_else(|| FieldError::UnknownVolume {
            name: "head".to_string(),
        })
    }

    /// The head subtree, if present.
    pub fn head(&self) -> Option<&Volume> {
        self.world.daughter("head")
    }

    // -----------------------------------------------------------------------
    // Field shaping
    // -----------------------------------------------------------------------

    pub fn rectangular_field_jaws(
        &mut self,
        x1: f64,
        x2: f64,
        y1: f64,
        y2: f64,
    ) -> Result<(), FieldError> {
        let profile = self
            .profile
            .as_deref()
            .ok_or(FieldError::NotImplemented {
                capability: "rectangular_field_jaws",
            })?;
        profile.rectangular_field_jaws(Self::head_mut(&mut self.world)?, x1, x2, y1, y2)
    }

    pub fn rectangular_field_mlc(
        &mut self,
        x1: f64,
        x2: f64,
        y1: f64,
        y2: f64,
    ) -> Result<(), FieldError> {
        let profile = self
            .profile
            .as_deref()
            .ok_or(FieldError::NotImplemented {
                capability: "rectangular_field_mlc",
            })?;
        profile.rectangular_field_mlc(Self::head_mut(&mut self.world)?, x1, x2, y1, y2)
    }

    /// Jaws and leaves together.
    pub fn rectangular_field(&mut self, x1: f64, x2: f64, y1: f64, y2: f64) -> Result<(), FieldError> {
        self.rectangular_field_jaws(x1, x2, y1, y2)?;
        self.rectangular_field_mlc(x1, x2, y1, y2)
    }

    pub fn square_field_jaws(
        &mut self,
        size: f64,
        x_offset: f64,
        y_offset: f64,
    ) -> Result<(), FieldError> {
        let half = size / 2.0;
        self.rectangular_field_jaws(
            half + x_offset,
            -half + x_offset,
            half + y_offset,
            -half + y_offset,
        )
    }

    pub fn square_field_mlc(
        &mut self,
        size: f64,
        x_offset: f64,
        y_offset: f64,
    ) -> Result<(), FieldError> {
        let half = size / 2.0;
        self.rectangular_field_mlc(
            half + x_offset,
            -half + x_offset,
            half + y_offset,
            -half + y_offset,
        )
    }

    /// Symmetric square aperture centered on the (offset) beam axis.
    pub fn square_field(&mut self, size: f64, x_offset: f64, y_offset: f64) -> Result<(), FieldError> {
        self.square_field_jaws(size, x_offset, y_offset)?;
        self.square_field_mlc(size, x_offset, y_offset)
    }

    pub fn arbitrary_field_mlc(&mut self, bank1: &[f64], bank2: &[f64]) -> Result<(), FieldError> {
        let profile = self
            .profile
            .as_deref()
            .ok_or(FieldError::NotImplemented {
                capability: "arbitrary_field_mlc",
            })?;
        profile.arbitrary_field_mlc(Self::head_mut(&mut self.world)?, bank1, bank2)
    }

    // -----------------------------------------------------------------------
    // Orientation
    // -----------------------------------------------------------------------

    /// Rotate the head to gantry angle `angle` degrees about Y.
    ///
    /// The head's existing translation is rotated by the *offset* between the
    /// old and new angle, not rebuilt from a canonical position, so any prior
    /// isocentric offset is preserved.
    pub fn rotate_gantry(&mut self, angle: f64) -> Result<(), FieldError> {
        let head = Self::head_mut(&mut self.world)?;
        let offset = head.rotation.1 - angle;
        head.rotation.1 = angle;
        head.translation = rotate_about_y(head.translation, offset);
        Ok(())
    }

    /// Rotate the collimator: sets the head's x-rotation only.
    pub fn rotate_collimator(&mut self, angle: f64) -> Result<(), FieldError> {
        Self::head_mut(&mut self.world)?.rotation.0 = angle;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Component authoring
    // -----------------------------------------------------------------------

    /// Queue a declarative daughter for the next geometry update. Nothing is
    /// placed in the transport engine's scene until then.
    pub fn queue_component(&mut self, parent: &str, name: &str, spec: VolumeSpec) {
        self.pending.push(PendingComponent {
            parent: parent.to_string(),
            name: name.to_string(),
            spec,
        });
    }

    /// Drain the queued components for materialization.
    pub fn take_pending(&mut self) -> Vec<PendingComponent> {
        std::mem::take(&mut self.pending)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("world", &self.world.name)
            .field("volumes", &self.world.descendant_count())
            .field("phasespaces", &self.phasespaces.keys().collect::<Vec<_>>())
            .field("has_profile", &self.profile.is_some())
            .field("pending", &self.pending.len())
            .finish()
    }
}
