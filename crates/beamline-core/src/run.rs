//! The simulation run controller.
//!
//! Owns the live [`Machine`] (and through it the world volume tree), the
//! transport-engine collaborator, the phasespace source/sink roles, and the
//! per-run seed sequence, and drives build / update / beam-on cycles against
//! the engine.
//!
//! # Phasespace roles
//!
//! A declared phasespace name holds at most one role at any time: active
//! sink (being recorded) or source (being replayed), never both. A recording
//! file is either being written or being read, never both.
//!
//! # Run sequencing
//!
//! `beam_on` always: refreshes the scene, configures replay or a fresh gun,
//! commits a freshly drawn seed, runs exactly the requested number of
//! histories, and closes the recordings it opened. Runs are strictly
//! sequential; a transport-engine failure is fatal to the run and
//! propagates.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{FieldError, RunError};
use crate::expand::instantiate;
use crate::export::{histogram_key, host_name, HistogramSink};
use crate::machine::Machine;
use crate::rng::SeedSequence;
use crate::schema::VolumeSpec;
use crate::transformer::TransformerRegistry;
use crate::transport::{
    AcceptanceWindow, HistogramKind, MeshPlacement, PhasespacePlane, PlacementId,
    PlacementUpdate, PrimarySource, ReplaySource, SolidPlacement, TransportEngine,
};
use crate::volume::Volume;

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

/// Controller lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Scene not yet constructed (only observable during `new`).
    Uninitialized,
    /// Scene constructed from the initial volume tree.
    Built,
    /// Geometry refreshed; ready for the next run.
    Ready,
    /// A run is in flight on the transport engine.
    Running,
}

/// The active replay source: a declared phasespace name, the file it
/// resolves to, and the acceptance window about its plane. The file is
/// resolved when the source is set, so a later run rename does not retarget
/// an already-selected recording.
#[derive(Debug, Clone, PartialEq)]
struct ActiveSource {
    name: String,
    file: String,
    window: AcceptanceWindow,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Drives repeated simulation runs against a transport engine.
pub struct Simulation<E: TransportEngine> {
    name: String,
    run_id: u32,
    machine: Machine,
    registry: TransformerRegistry,
    engine: E,
    phsp_dir: PathBuf,
    placements: BTreeMap<String, PlacementId>,
    source: Option<ActiveSource>,
    active_sinks: Vec<String>,
    open_recordings: Vec<String>,
    seeds: SeedSequence,
    phase: RunPhase,
}

impl<E: TransportEngine> Simulation<E> {
    /// Construct the controller: places the initial volume tree into the
    /// engine's scene and commits an initial seed.
    pub fn new(
        name: &str,
        machine: Machine,
        registry: TransformerRegistry,
        engine: E,
        phsp_dir: &str,
        run_id: u32,
    ) -> Result<Self, RunError> {
        let mut sim = Self {
            name: name.to_string(),
            run_id,
            machine,
            registry,
            engine,
            phsp_dir: PathBuf::from(phsp_dir),
            placements: BTreeMap::new(),
            source: None,
            active_sinks: Vec::new(),
            open_recordings: Vec::new(),
            seeds: SeedSequence::from_entropy(),
            phase: RunPhase::Uninitialized,
        };

        let world = sim.machine.world.clone();
        for daughter in world.daughters.values() {
            sim.place_subtree(daughter, None)?;
        }

        let seed = sim.seeds.next_seed();
        sim.engine.set_seed(seed);
        sim.phase = RunPhase::Built;
        Ok(sim)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the run; subsequent phasespace files are keyed by the new name.
    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn run_id(&self) -> u32 {
        self.run_id
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    /// Mutable machine access for field shaping and orientation between runs.
    pub fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// The file a phasespace records to (or replays from) for a run id:
    /// `{dir}/{phasespace}_{run_name}_{run_id}.phsp`.
    pub fn phasespace_filename(&self, name: &str, run_id: u32) -> String {
        format!(
            "{}/{}_{}_{}.phsp",
            self.phsp_dir.display(),
            name,
            self.name,
            run_id
        )
    }

    // -----------------------------------------------------------------------
    // Phasespace roles
    // -----------------------------------------------------------------------

    fn check_declared(&self, name: &str) -> Result<(), RunError> {
        if self.machine.phasespaces.contains_key(name) {
            Ok(())
        } else {
            Err(RunError::UnknownPhasespace {
                name: name.to_string(),
            })
        }
    }

    /// Replay the named phasespace (recorded under `run_id`) as the source
    /// for subsequent runs. If the name is currently an active sink —
    /// reading and writing the same recording is never allowed — the sink is
    /// closed first.
    pub fn set_source(&mut self, name: &str, run_id: u32) -> Result<(), RunError> {
        self.check_declared(name)?;
        if self.active_sinks.iter().any(|s| s == name) {
            self.disable_phasespace(name)?;
        }

        let z_position = self.machine.phasespaces[name].z_position;
        self.source = Some(ActiveSource {
            name: name.to_string(),
            file: self.phasespace_filename(name, run_id),
            window: AcceptanceWindow::about_plane(z_position),
        });
        Ok(())
    }

    /// Replay the named phasespace recorded under this controller's own run
    /// id. Sugar for "disable as sink if currently a sink, then use as
    /// source".
    pub fn enable_phasespace_source(&mut self, name: &str) -> Result<(), RunError> {
        let run_id = self.run_id;
        self.set_source(name, run_id)
    }

    /// Fall back to the primary-particle gun.
    pub fn disable_phasespace_source(&mut self) {
        self.source = None;
    }

    /// Add the named phasespace to the active-sink set. Its recording is
    /// opened at the next geometry update. A name currently serving as the
    /// source keeps that single role.
    pub fn enable_phasespace(&mut self, name: &str) -> Result<(), RunError> {
        self.check_declared(name)?;
        if let Some(source) = &self.source {
            if source.name == name {
                return Ok(());
            }
        }
        if !self.active_sinks.iter().any(|s| s == name) {
            self.active_sinks.push(name.to_string());
        }
        Ok(())
    }

    /// Close the named phasespace's recording (if open) and remove it from
    /// the active-sink set.
    pub fn disable_phasespace(&mut self, name: &str) -> Result<(), RunError> {
        let file = self.phasespace_filename(name, self.run_id);
        if let Some(index) = self.open_recordings.iter().position(|f| *f == file) {
            self.open_recordings.remove(index);
            self.engine.close_phasespace(&file)?;
        }
        self.active_sinks.retain(|s| s != name);
        Ok(())
    }

    pub fn disable_all_phasespaces(&mut self) -> Result<(), RunError> {
        for name in self.active_sinks.clone() {
            self.disable_phasespace(&name)?;
        }
        Ok(())
    }

    /// Current source phasespace name, if replaying.
    pub fn source_name(&self) -> Option<&str> {
        self.source.as_ref().map(|s| s.name.as_str())
    }

    /// Names currently enabled for recording, in enable order.
    pub fn active_sinks(&self) -> &[String] {
        &self.active_sinks
    }

    // -----------------------------------------------------------------------
    // Geometry
    // -----------------------------------------------------------------------

    /// Queue a declarative component under the treatment head for the next
    /// update cycle.
    pub fn add_head_component(&mut self, name: &str, spec: VolumeSpec) {
        self.machine.queue_component("head", name, spec);
    }

    /// Queue a declarative component under the vacuum assembly for the next
    /// update cycle.
    pub fn add_vacuum_component(&mut self, name: &str, spec: VolumeSpec) {
        self.machine.queue_component("vacuum", name, spec);
    }

    /// Refresh the engine's live scene from the volume tree: closes open
    /// recordings, materializes queued components, re-applies every
    /// placement (idempotent), and reopens the active-sink recordings.
    pub fn update_geometry(&mut self) -> Result<(), RunError> {
        for file in std::mem::take(&mut self.open_recordings) {
            self.engine.close_phasespace(&file)?;
        }

        for pending in self.machine.take_pending() {
            let instances = instantiate(&pending.name, &pending.spec, &self.registry)?;
            for instance in instances {
                let parent_name = pending.parent.clone();
                let parent = self.machine.world.find_mut(&parent_name).ok_or_else(|| {
                    FieldError::UnknownVolume {
                        name: parent_name.clone(),
                    }
                })?;
                parent.insert_daughter(instance.clone());
                self.place_subtree(&instance, Some(&parent_name))?;
            }
        }

        let world = self.machine.world.clone();
        self.refresh_subtree(&world)?;

        for name in self.active_sinks.clone() {
            let spec = &self.machine.phasespaces[&name];
            let plane = PhasespacePlane {
                radius: spec.radius,
                z_position: spec.z_position,
                material: spec.material.clone(),
                kill: spec.kill,
            };
            let file = self.phasespace_filename(&name, self.run_id);
            self.engine.open_phasespace(&file, plane)?;
            self.open_recordings.push(file);
        }

        self.phase = RunPhase::Ready;
        Ok(())
    }

    fn place_subtree(&mut self, volume: &Volume, mother: Option<&str>) -> Result<(), RunError> {
        if let Some(mesh) = &volume.mesh {
            let id = self.engine.place_mesh(MeshPlacement {
                name: volume.name.clone(),
                mother: mother.map(str::to_string),
                file: mesh.file.clone(),
                scale: mesh.scale,
                tessellated: volume.tessellated,
                translation: volume.translation,
                rotation: volume.rotation,
                material: volume.material.clone(),
                color: volume.color,
            })?;
            self.placements.insert(volume.name.clone(), id);
        } else if let Some(solid) = volume.solid {
            let id = self.engine.place_solid(SolidPlacement {
                name: volume.name.clone(),
                mother: mother.map(str::to_string),
                solid,
                translation: volume.translation,
                rotation: volume.rotation,
                material: volume.material.clone(),
                color: volume.color,
            })?;
            self.placements.insert(volume.name.clone(), id);
        }

        for daughter in volume.daughters.values() {
            self.place_subtree(daughter, Some(&volume.name))?;
        }
        Ok(())
    }

    fn refresh_subtree(&mut self, volume: &Volume) -> Result<(), RunError> {
        for daughter in volume.daughters.values() {
            if let Some(&id) = self.placements.get(&daughter.name) {
                self.engine.update_placement(
                    id,
                    PlacementUpdate {
                        translation: daughter.translation,
                        rotation: daughter.rotation,
                        material: daughter.material.clone(),
                    },
                )?;
            }
            self.refresh_subtree(daughter)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Runs
    // -----------------------------------------------------------------------

    /// Run with the gun defaults from the machine configuration.
    pub fn beam_on(&mut self, histories: f64) -> Result<(), RunError> {
        let fwhm = self.machine.gun.fwhm;
        let energy = self.machine.gun.energy;
        self.beam_on_with(histories, fwhm, energy)
    }

    /// Run `histories` primary histories. Replays the configured source
    /// phasespace if one is set, otherwise fires a fresh gun with the given
    /// beam spread and energy. A fresh seed is committed before the run;
    /// fractional history counts truncate and negatives clamp to zero.
    pub fn beam_on_with(&mut self, histories: f64, fwhm: f64, energy: f64) -> Result<(), RunError> {
        self.update_geometry()?;

        if let Some(source) = self.source.clone() {
            let spec = self
                .machine
                .phasespaces
                .get(&source.name)
                .ok_or_else(|| RunError::UnknownPhasespace {
                    name: source.name.clone(),
                })?;
            let gantry_rotation = self
                .machine
                .head()
                .ok_or_else(|| FieldError::UnknownVolume {
                    name: "head".to_string(),
                })?
                .rotation;

            self.engine.set_phasespace_source(ReplaySource {
                file: source.file,
                window: source.window,
                redistribute: spec.redistribute,
                recycling_number: self.machine.gun.recycling_number,
                gantry_rotation,
            })?;
        } else {
            self.engine.set_primary_source(PrimarySource {
                fwhm,
                energy,
                position: (0.0, 0.0, 1050.0),
                direction: (0.0, 0.0, -1.0),
            })?;
        }

        let seed = self.seeds.next_seed();
        self.engine.set_seed(seed);

        let histories = histories.max(0.0) as u64;
        self.phase = RunPhase::Running;
        self.engine.beam_on(histories)?;

        for file in std::mem::take(&mut self.open_recordings) {
            self.engine.close_phasespace(&file)?;
        }
        self.phase = RunPhase::Ready;
        Ok(())
    }

    /// Rewind the replay source so the next run replays from the beginning.
    pub fn reset_source(&mut self) {
        self.engine.reset_source();
    }

    /// Override the default gamma/electron production cuts.
    pub fn set_cuts(&mut self, gamma: f64, electron: f64) {
        self.engine.set_cuts(gamma, electron);
    }

    /// Insert or bypass the voxelized patient geometry.
    pub fn use_phantom(&mut self, enabled: bool) {
        self.engine.use_phantom(enabled);
    }

    /// Dump the scored histograms to the export collaborator, keyed by run
    /// name and the given tag (field size or beam index).
    pub fn save_histograms(&mut self, sink: &mut dyn HistogramSink, tag: &str) -> std::io::Result<()> {
        let host = host_name();
        let pid = std::process::id();
        for (label, kind) in [
            ("energy", HistogramKind::Energy),
            ("energy2", HistogramKind::EnergySquared),
            ("counts", HistogramKind::Counts),
        ] {
            let data = self.engine.histogram(kind);
            sink.save(&histogram_key(label, &self.name, tag, &host, pid), &data)?;
        }
        Ok(())
    }

    pub fn zero_histograms(&mut self) {
        self.engine.zero_histograms();
    }

    /// The seed committed for the most recent run.
    pub fn last_seed(&self) -> Option<u64> {
        self.seeds.last_seed()
    }
}
