//! Shared test helpers: a recording transport engine and small machine
//! configurations.

use std::collections::BTreeMap;

use slotmap::SlotMap;

use crate::error::EngineFailure;
use crate::machine::Machine;
use crate::profiles::PreciseProfile;
use crate::schema::{GunSpec, MachineConfig, PhasespaceSpec, VectorSpec, VolumeSpec};
use crate::transformer::TransformerRegistry;
use crate::transport::{
    HistogramKind, MeshPlacement, PhasespacePlane, PlacementId, PlacementUpdate, PrimarySource,
    ReplaySource, SolidPlacement, TransportEngine,
};
use crate::volume::Solid;

/// One observed collaborator call, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    PlaceSolid { name: String },
    PlaceMesh { name: String },
    UpdatePlacement { name: String },
    OpenPhasespace { file: String },
    ClosePhasespace { file: String },
    SetPhasespaceSource { file: String },
    SetPrimarySource { fwhm: f64, energy: f64 },
    ResetSource,
    SetSeed { seed: u64 },
    BeamOn { histories: u64 },
    UsePhantom { enabled: bool },
    SetCuts { gamma: f64, electron: f64 },
    ZeroHistograms,
}

/// A transport engine that records every call for assertion.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    pub calls: Vec<EngineCall>,
    pub placements: SlotMap<PlacementId, String>,
    pub updates: Vec<(String, PlacementUpdate)>,
    pub open_files: Vec<String>,
    pub last_replay: Option<ReplaySource>,
    pub last_primary: Option<PrimarySource>,
    pub seeds: Vec<u64>,
    /// When set, the next `beam_on` fails with this message.
    pub fail_next_beam_on: Option<String>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of every placement created so far. Order is not meaningful;
    /// use `calls` for ordering assertions.
    pub fn placement_names(&self) -> Vec<&str> {
        self.placements.values().map(String::as_str).collect()
    }

    /// Index of the first call matching `predicate`, for ordering checks.
    pub fn call_position(&self, predicate: impl Fn(&EngineCall) -> bool) -> Option<usize> {
        self.calls.iter().position(predicate)
    }
}

impl TransportEngine for RecordingEngine {
    fn place_solid(&mut self, placement: SolidPlacement) -> Result<PlacementId, EngineFailure> {
        self.calls.push(EngineCall::PlaceSolid {
            name: placement.name.clone(),
        });
        Ok(self.placements.insert(placement.name))
    }

    fn place_mesh(&mut self, placement: MeshPlacement) -> Result<PlacementId, EngineFailure> {
        self.calls.push(EngineCall::PlaceMesh {
            name: placement.name.clone(),
        });
        Ok(self.placements.insert(placement.name))
    }

    fn update_placement(
        &mut self,
        id: PlacementId,
        update: PlacementUpdate,
    ) -> Result<(), EngineFailure> {
        let name = self
            .placements
            .get(id)
            .cloned()
            .ok_or_else(|| EngineFailure("update of unknown placement".to_string()))?;
        self.calls.push(EngineCall::UpdatePlacement { name: name.clone() });
        self.updates.push((name, update));
        Ok(())
    }

    fn open_phasespace(
        &mut self,
        file: &str,
        _plane: PhasespacePlane,
    ) -> Result<(), EngineFailure> {
        self.calls.push(EngineCall::OpenPhasespace {
            file: file.to_string(),
        });
        self.open_files.push(file.to_string());
        Ok(())
    }

    fn close_phasespace(&mut self, file: &str) -> Result<(), EngineFailure> {
        self.calls.push(EngineCall::ClosePhasespace {
            file: file.to_string(),
        });
        self.open_files.retain(|f| f != file);
        Ok(())
    }

    fn set_phasespace_source(&mut self, replay: ReplaySource) -> Result<(), EngineFailure> {
        self.calls.push(EngineCall::SetPhasespaceSource {
            file: replay.file.clone(),
        });
        self.last_replay = Some(replay);
        Ok(())
    }

    fn set_primary_source(&mut self, gun: PrimarySource) -> Result<(), EngineFailure> {
        self.calls.push(EngineCall::SetPrimarySource {
            fwhm: gun.fwhm,
            energy: gun.energy,
        });
        self.last_primary = Some(gun);
        Ok(())
    }

    fn reset_source(&mut self) {
        self.calls.push(EngineCall::ResetSource);
    }

    fn set_seed(&mut self, seed: u64) {
        self.calls.push(EngineCall::SetSeed { seed });
        self.seeds.push(seed);
    }

    fn beam_on(&mut self, histories: u64) -> Result<(), EngineFailure> {
        self.calls.push(EngineCall::BeamOn { histories });
        if let Some(message) = self.fail_next_beam_on.take() {
            return Err(EngineFailure(message));
        }
        Ok(())
    }

    fn use_phantom(&mut self, enabled: bool) {
        self.calls.push(EngineCall::UsePhantom { enabled });
    }

    fn set_cuts(&mut self, gamma: f64, electron: f64) {
        self.calls.push(EngineCall::SetCuts { gamma, electron });
    }

    fn histogram(&self, _kind: HistogramKind) -> Vec<f64> {
        vec![0.0; 8]
    }

    fn zero_histograms(&mut self) {
        self.calls.push(EngineCall::ZeroHistograms);
    }
}

/// An in-memory histogram sink collecting saved keys.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub saved: Vec<(String, usize)>,
}

impl crate::export::HistogramSink for MemorySink {
    fn save(&mut self, key: &str, data: &[f64]) -> std::io::Result<()> {
        self.saved.push((key.to_string(), data.len()));
        Ok(())
    }
}

fn slab(side: f64, thickness: f64, translation: (f64, f64, f64)) -> VolumeSpec {
    VolumeSpec {
        solid: Some(Solid::Slab { side, thickness }),
        material: Some("tungsten".to_string()),
        translation: Some(VectorSpec::Fixed(translation)),
        ..VolumeSpec::default()
    }
}

/// A small Elekta-style machine description: four jaws, two four-leaf
/// banks placed by transformer, a vacuum window, and two phasespace planes.
pub fn test_machine_config() -> MachineConfig {
    let mut head = VolumeSpec {
        translation: Some(VectorSpec::Fixed((0.0, 0.0, 1000.0))),
        ..VolumeSpec::default()
    };
    head.daughters
        .insert("jaw_x_0".to_string(), slab(100.0, 30.0, (-60.0, 0.0, 360.0)));
    head.daughters
        .insert("jaw_x_1".to_string(), slab(100.0, 30.0, (60.0, 0.0, 360.0)));
    head.daughters
        .insert("jaw_y_0".to_string(), slab(100.0, 30.0, (0.0, -60.0, 280.0)));
    head.daughters
        .insert("jaw_y_1".to_string(), slab(100.0, 30.0, (0.0, 60.0, 280.0)));

    for (bank, shift) in [("mlc_1", 30.0), ("mlc_2", -30.0)] {
        let mut args = BTreeMap::new();
        args.insert("interval".to_string(), Some(10.0));
        args.insert("position".to_string(), Some(330.8));
        args.insert("repeat".to_string(), None);

        head.daughters.insert(
            bank.to_string(),
            VolumeSpec {
                repeat: Some(4),
                solid: Some(Solid::Slab {
                    side: 5.0,
                    thickness: 80.0,
                }),
                material: Some("tungsten".to_string()),
                translation: Some(VectorSpec::Fixed((shift, 0.0, 330.8))),
                rotation: Some(VectorSpec::Transform {
                    function: "mlc_diverge".to_string(),
                    args,
                }),
                ..VolumeSpec::default()
            },
        );
    }

    let mut vacuum = VolumeSpec::default();
    vacuum.daughters.insert(
        "exit_window_foil".to_string(),
        VolumeSpec {
            solid: Some(Solid::Cylinder {
                radius: 40.0,
                length: 2.0,
            }),
            material: Some("aluminium".to_string()),
            translation: Some(VectorSpec::Fixed((0.0, 0.0, 450.0))),
            ..VolumeSpec::default()
        },
    );

    let mut world = VolumeSpec::default();
    world.daughters.insert("head".to_string(), head);
    world.daughters.insert("vacuum".to_string(), vacuum);

    let mut phasespaces = BTreeMap::new();
    phasespaces.insert(
        "chamber".to_string(),
        PhasespaceSpec {
            radius: 120.0,
            z_position: 830.0,
            material: "air".to_string(),
            kill: false,
            redistribute: true,
        },
    );
    phasespaces.insert(
        "exit_window".to_string(),
        PhasespaceSpec {
            radius: 120.0,
            z_position: 440.0,
            material: "air".to_string(),
            kill: false,
            redistribute: false,
        },
    );

    MachineConfig {
        world,
        phasespaces,
        gun: GunSpec {
            recycling_number: 5,
            fwhm: 2.0,
            energy: 6.0,
        },
    }
}

/// Build the test machine with the Elekta-style profile installed.
pub fn test_machine() -> Machine {
    Machine::from_config(&test_machine_config(), &TransformerRegistry::builtin())
        .expect("test machine config is valid")
        .with_profile(Box::new(PreciseProfile))
}
