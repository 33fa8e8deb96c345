//! Beamline Plan -- treatment-plan records and the delivery driver.
//!
//! A [`TreatmentPlan`] is the already-parsed view of a plan (DICOM ingestion
//! itself is an external collaborator): per-beam jaw and leaf positions, the
//! gantry angle, and the isocenter. [`deliver`] sequences the plan against a
//! run controller, one beam at a time, in two stages per beam: a head-only
//! stage recorded at the patient plane, then a phantom stage replayed from
//! that recording at the planned gantry angle.

use beamline_core::error::{FieldError, RunError};
use beamline_core::export::HistogramSink;
use beamline_core::run::Simulation;
use beamline_core::transport::TransportEngine;

/// One beam of a treatment plan.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Beam {
    /// Gantry angle in degrees.
    pub gantry_angle: f64,
    pub isocenter: (f64, f64, f64),
    /// X jaw pair `(x1, x2)`.
    pub jaw_x: (f64, f64),
    /// Y jaw pair `(y1, y2)`.
    pub jaw_y: (f64, f64),
    /// Explicit leaf banks; `None` means the leaves follow the X jaws.
    #[serde(default)]
    pub mlc: Option<MlcAperture>,
}

/// Per-leaf positions for both banks.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MlcAperture {
    pub bank1: Vec<f64>,
    pub bank2: Vec<f64>,
}

/// A parsed treatment plan.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TreatmentPlan {
    pub name: String,
    pub beams: Vec<Beam>,
}

/// How a plan is driven through the controller.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DeliverySettings {
    /// Histories for the one-off commissioning run that fills the head
    /// recording.
    pub commissioning_histories: f64,
    /// Histories per beam stage.
    pub histories: f64,
    /// Phasespace recorded below the monitor chamber, shared by all beams.
    pub head_phasespace: String,
    /// Phasespace recorded at the patient plane, one per beam stage.
    pub patient_phasespace: String,
    /// Leaf pairs per bank, for the jaw-following fallback.
    pub leaf_pairs: usize,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            commissioning_histories: 1e4,
            histories: 1e6,
            head_phasespace: "chamber".to_string(),
            patient_phasespace: "exit_window".to_string(),
            leaf_pairs: 40,
        }
    }
}

/// Errors raised while delivering a plan.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Run(#[from] RunError),

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error("histogram export failed: {0}")]
    Export(#[from] std::io::Error),
}

/// Deliver every beam of a plan.
///
/// Runs one commissioning beam into the head recording, then per beam:
/// shapes the field, records the head-only stage at gantry zero into the
/// patient recording, then replays it through the phantom at the planned
/// gantry angle and exports the scored histograms keyed by beam index.
pub fn deliver<E: TransportEngine>(
    sim: &mut Simulation<E>,
    plan: &TreatmentPlan,
    settings: &DeliverySettings,
    sink: &mut dyn HistogramSink,
) -> Result<(), DeliveryError> {
    sim.set_name(&plan.name);
    sim.enable_phasespace(&settings.head_phasespace)?;
    sim.beam_on(settings.commissioning_histories)?;

    for (index, beam) in plan.beams.iter().enumerate() {
        sim.set_name(&plan.name);
        sim.set_source(&settings.head_phasespace, sim.run_id())?;

        sim.set_name(&format!("{}_{}", plan.name, index));
        sim.enable_phasespace(&settings.patient_phasespace)?;

        shape_field(sim, beam, settings.leaf_pairs)?;

        // Head-only stage: record the shaped beam at the patient plane.
        sim.use_phantom(false);
        sim.machine_mut().rotate_gantry(0.0)?;
        sim.beam_on(settings.histories)?;

        // Phantom stage: replay the recording at the planned angle.
        sim.machine_mut().rotate_gantry(beam.gantry_angle)?;
        sim.use_phantom(true);
        sim.enable_phasespace_source(&settings.patient_phasespace)?;
        sim.beam_on(settings.histories)?;

        sim.save_histograms(sink, &index.to_string())?;
        sim.zero_histograms();

        // Next beam starts from the shared head recording again.
        sim.disable_phasespace_source();
    }
    Ok(())
}

fn shape_field<E: TransportEngine>(
    sim: &mut Simulation<E>,
    beam: &Beam,
    leaf_pairs: usize,
) -> Result<(), FieldError> {
    let machine = sim.machine_mut();
    machine.rectangular_field_jaws(beam.jaw_x.0, beam.jaw_x.1, beam.jaw_y.0, beam.jaw_y.1)?;

    match &beam.mlc {
        Some(aperture) => machine.arbitrary_field_mlc(&aperture.bank1, &aperture.bank2)?,
        None => {
            // No leaf data in the plan: park both banks at the jaw edges.
            let bank1 = vec![beam.jaw_x.0; leaf_pairs];
            let bank2 = vec![beam.jaw_x.1; leaf_pairs];
            machine.arbitrary_field_mlc(&bank1, &bank2)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use beamline_core::test_utils::*;
    use beamline_core::transformer::TransformerRegistry;

    fn new_sim() -> Simulation<RecordingEngine> {
        Simulation::new(
            "plan_test",
            test_machine(),
            TransformerRegistry::builtin(),
            RecordingEngine::new(),
            "phsp",
            0,
        )
        .unwrap()
    }

    fn two_beam_plan() -> TreatmentPlan {
        TreatmentPlan {
            name: "plan_test".to_string(),
            beams: vec![
                Beam {
                    gantry_angle: 0.0,
                    isocenter: (0.0, 0.0, 0.0),
                    jaw_x: (50.0, -50.0),
                    jaw_y: (50.0, -50.0),
                    mlc: Some(MlcAperture {
                        bank1: vec![50.0; 4],
                        bank2: vec![-50.0; 4],
                    }),
                },
                Beam {
                    gantry_angle: 90.0,
                    isocenter: (0.0, 0.0, 0.0),
                    jaw_x: (30.0, -30.0),
                    jaw_y: (20.0, -20.0),
                    mlc: None,
                },
            ],
        }
    }

    fn settings() -> DeliverySettings {
        DeliverySettings {
            commissioning_histories: 100.0,
            histories: 1000.0,
            leaf_pairs: 4,
            ..DeliverySettings::default()
        }
    }

    #[test]
    fn delivery_runs_two_stages_per_beam() {
        let mut sim = new_sim();
        let mut sink = MemorySink::default();
        deliver(&mut sim, &two_beam_plan(), &settings(), &mut sink).unwrap();

        let runs = sim
            .engine()
            .calls
            .iter()
            .filter(|c| matches!(c, EngineCall::BeamOn { .. }))
            .count();
        // One commissioning run plus two stages per beam.
        assert_eq!(runs, 5);
    }

    #[test]
    fn phantom_toggles_off_then_on_per_beam() {
        let mut sim = new_sim();
        let mut sink = MemorySink::default();
        deliver(&mut sim, &two_beam_plan(), &settings(), &mut sink).unwrap();

        let toggles: Vec<bool> = sim
            .engine()
            .calls
            .iter()
            .filter_map(|c| match c {
                EngineCall::UsePhantom { enabled } => Some(*enabled),
                _ => None,
            })
            .collect();
        assert_eq!(toggles, [false, true, false, true]);
    }

    #[test]
    fn gantry_returns_to_plan_angle_for_the_phantom_stage() {
        let mut sim = new_sim();
        let mut sink = MemorySink::default();
        deliver(&mut sim, &two_beam_plan(), &settings(), &mut sink).unwrap();

        // Last beam rotated to 90 for its phantom stage.
        assert_eq!(sim.machine().head().unwrap().rotation.1, 90.0);
    }

    #[test]
    fn histograms_export_per_beam_index() {
        let mut sim = new_sim();
        let mut sink = MemorySink::default();
        deliver(&mut sim, &two_beam_plan(), &settings(), &mut sink).unwrap();

        // Three arrays per beam.
        assert_eq!(sink.saved.len(), 6);
        assert!(sink.saved[0].0.starts_with("energy_plan_test_0_0_"));
        assert!(sink.saved[3].0.starts_with("energy_plan_test_1_1_"));
    }

    #[test]
    fn missing_mlc_data_follows_the_jaws() {
        let mut sim = new_sim();
        let plan = TreatmentPlan {
            name: "fallback".to_string(),
            beams: vec![Beam {
                gantry_angle: 0.0,
                isocenter: (0.0, 0.0, 0.0),
                jaw_x: (25.0, -25.0),
                jaw_y: (25.0, -25.0),
                mlc: None,
            }],
        };
        let mut sink = MemorySink::default();
        deliver(&mut sim, &plan, &settings(), &mut sink).unwrap();

        let head = sim.machine().head().unwrap();
        let leaf = head.daughter("mlc_1_0").unwrap();
        let opposing = head.daughter("mlc_2_0").unwrap();
        assert!(leaf.x_position() > 0.0);
        assert!(opposing.x_position() < 0.0);
        assert!((leaf.x_position() + opposing.x_position()).abs() < 1e-12);
    }

    #[test]
    fn plan_round_trips_through_serde() {
        let plan = two_beam_plan();
        let encoded = ron::to_string(&plan).unwrap();
        let decoded: TreatmentPlan = ron::from_str(&encoded).unwrap();
        assert_eq!(plan, decoded);
    }
}
