//! The transport-engine collaborator contract.
//!
//! The engine that actually simulates particle histories is external; the
//! run controller only needs to hand it a materialized scene, phasespace
//! plane definitions, a source specification, a seed, and a history count.
//! All failures from the collaborator are opaque [`EngineFailure`]s and
//! propagate uncaught.

use crate::error::EngineFailure;
use crate::math::{Color, Vec3};
use crate::volume::Solid;

slotmap::new_key_type! {
    /// Handle for one placed volume in the engine's live scene.
    pub struct PlacementId;
}

/// A primitive solid placement.
#[derive(Debug, Clone, PartialEq)]
pub struct SolidPlacement {
    pub name: String,
    /// Name of the mother volume, or `None` for a world-level placement.
    pub mother: Option<String>,
    pub solid: Solid,
    pub translation: Vec3,
    pub rotation: Vec3,
    pub material: String,
    pub color: Color,
}

/// A CAD mesh placement.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshPlacement {
    pub name: String,
    pub mother: Option<String>,
    pub file: String,
    pub scale: f64,
    /// Kept as a tessellated surface when `true`, tetrahedralized otherwise.
    pub tessellated: bool,
    pub translation: Vec3,
    pub rotation: Vec3,
    pub material: String,
    pub color: Color,
}

/// Placement refresh for an already-placed volume.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementUpdate {
    pub translation: Vec3,
    pub rotation: Vec3,
    pub material: String,
}

/// A phasespace recording plane as handed to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PhasespacePlane {
    pub radius: f64,
    pub z_position: f64,
    pub material: String,
    pub kill: bool,
}

/// Spatial acceptance bounds for phasespace replay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptanceWindow {
    pub x: (f64, f64),
    pub y: (f64, f64),
    pub z: (f64, f64),
}

impl AcceptanceWindow {
    /// The replay window about a recording plane: +/-200 in plane, +/-0.1
    /// about the plane's z position.
    pub fn about_plane(z_position: f64) -> Self {
        Self {
            x: (-200.0, 200.0),
            y: (-200.0, 200.0),
            z: (z_position - 0.1, z_position + 0.1),
        }
    }
}

/// Replay from a recorded phasespace file.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaySource {
    pub file: String,
    pub window: AcceptanceWindow,
    pub redistribute: bool,
    pub recycling_number: u32,
    /// Current head rotation, so replayed particles follow the gantry.
    pub gantry_rotation: Vec3,
}

/// A fresh primary-particle gun.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimarySource {
    pub fwhm: f64,
    pub energy: f64,
    pub position: Vec3,
    pub direction: Vec3,
}

/// Scored histogram selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistogramKind {
    Energy,
    EnergySquared,
    Counts,
}

/// Contract with the external particle-transport engine.
pub trait TransportEngine {
    fn place_solid(&mut self, placement: SolidPlacement) -> Result<PlacementId, EngineFailure>;

    fn place_mesh(&mut self, placement: MeshPlacement) -> Result<PlacementId, EngineFailure>;

    /// Refresh a placement in the live scene. Safe to call when nothing
    /// changed.
    fn update_placement(
        &mut self,
        id: PlacementId,
        update: PlacementUpdate,
    ) -> Result<(), EngineFailure>;

    /// Create/open a recording at `file` and insert its plane into the scene.
    fn open_phasespace(
        &mut self,
        file: &str,
        plane: PhasespacePlane,
    ) -> Result<(), EngineFailure>;

    /// Close a recording and remove its plane from the scene.
    fn close_phasespace(&mut self, file: &str) -> Result<(), EngineFailure>;

    fn set_phasespace_source(&mut self, replay: ReplaySource) -> Result<(), EngineFailure>;

    fn set_primary_source(&mut self, gun: PrimarySource) -> Result<(), EngineFailure>;

    /// Rewind any replay source to its beginning for the next run.
    fn reset_source(&mut self);

    /// Commit the seed for the next run. Called before every run.
    fn set_seed(&mut self, seed: u64);

    /// Run exactly `histories` primary histories. Blocks until done.
    fn beam_on(&mut self, histories: u64) -> Result<(), EngineFailure>;

    /// Insert or bypass the voxelized patient geometry.
    fn use_phantom(&mut self, enabled: bool);

    /// Override the default gamma/electron production cuts.
    fn set_cuts(&mut self, gamma: f64, electron: f64);

    fn histogram(&self, kind: HistogramKind) -> Vec<f64>;

    fn zero_histograms(&mut self);
}
