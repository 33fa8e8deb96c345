//! Property-based tests for expansion, field shaping, and seed sequencing.

use beamline_core::expand::instantiate;
use beamline_core::field::{ISOCENTER_DISTANCE, rounded_leaf_position};
use beamline_core::rng::SeedSequence;
use beamline_core::run::Simulation;
use beamline_core::schema::{VectorSpec, VolumeSpec};
use beamline_core::test_utils::*;
use beamline_core::transformer::TransformerRegistry;
use proptest::prelude::*;

fn arb_vec3() -> impl Strategy<Value = (f64, f64, f64)> {
    let component = -1000.0..1000.0f64;
    (component.clone(), component.clone(), component)
}

proptest! {
    /// Literal translations broadcast: every instance of a repeat-N spec
    /// shares the literal.
    #[test]
    fn literal_broadcast_reaches_every_instance(
        repeat in 2..40u32,
        translation in arb_vec3(),
    ) {
        let registry = TransformerRegistry::builtin();
        let spec = VolumeSpec {
            repeat: Some(repeat),
            translation: Some(VectorSpec::Fixed(translation)),
            ..VolumeSpec::default()
        };

        let volumes = instantiate("slat", &spec, &registry).unwrap();
        prop_assert_eq!(volumes.len(), repeat as usize);
        for v in &volumes {
            prop_assert_eq!(v.translation, translation);
        }
    }

    /// Expansion names are `{base}_{i}` in index order.
    #[test]
    fn expansion_names_are_indexed(repeat in 2..30u32) {
        let registry = TransformerRegistry::builtin();
        let spec = VolumeSpec {
            repeat: Some(repeat),
            ..VolumeSpec::default()
        };

        let volumes = instantiate("leaf", &spec, &registry).unwrap();
        for (i, v) in volumes.iter().enumerate() {
            prop_assert_eq!(v.name.clone(), format!("leaf_{i}"));
        }
    }

    /// The rounded-leaf branch follows the sign of the field size, not the
    /// sign of the result.
    #[test]
    fn rounded_leaf_branch_follows_field_sign(field in -300.0..300.0f64) {
        let projected = field / ISOCENTER_DISTANCE * 330.8;
        let corrected = rounded_leaf_position(150.0, 330.8, field, ISOCENTER_DISTANCE);
        if field >= 0.0 {
            prop_assert!(corrected >= projected);
        } else {
            prop_assert!(corrected <= projected);
        }
    }

    /// Seed draws never repeat back-to-back, from any starting state.
    #[test]
    fn seed_sequence_has_no_adjacent_repeats(start in any::<u64>()) {
        let mut seq = SeedSequence::new(start);
        let mut previous = seq.next_seed();
        for _ in 0..200 {
            let seed = seq.next_seed();
            prop_assert_ne!(seed, previous);
            previous = seed;
        }
    }

    /// Whatever interleaving of role changes, a phasespace name never holds
    /// both the source and sink role.
    #[test]
    fn roles_stay_exclusive_under_interleaving(ops in proptest::collection::vec(0..4u8, 1..20)) {
        let mut sim = Simulation::new(
            "roles",
            test_machine(),
            TransformerRegistry::builtin(),
            RecordingEngine::new(),
            "phsp",
            0,
        )
        .unwrap();

        for op in ops {
            match op {
                0 => sim.enable_phasespace("chamber").unwrap(),
                1 => sim.disable_phasespace("chamber").unwrap(),
                2 => sim.set_source("chamber", 0).unwrap(),
                _ => sim.disable_phasespace_source(),
            }

            let is_source = sim.source_name() == Some("chamber");
            let is_sink = sim.active_sinks().iter().any(|s| s == "chamber");
            prop_assert!(
                !(is_source && is_sink),
                "chamber held both roles after op {op}"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Boundary cases that deserve exact assertions
// ---------------------------------------------------------------------------

#[test]
fn rounded_leaf_zero_field_is_exactly_zero() {
    // field_size = 0: projection and delta both vanish, positive branch.
    assert_eq!(
        rounded_leaf_position(150.0, 330.8, 0.0, ISOCENTER_DISTANCE),
        0.0
    );
}

#[test]
fn thousand_runs_never_reuse_a_seed_adjacently() {
    let mut seq = SeedSequence::from_entropy();
    let mut previous = seq.next_seed();
    for _ in 0..1000 {
        let seed = seq.next_seed();
        assert_ne!(seed, previous);
        previous = seed;
    }
}
