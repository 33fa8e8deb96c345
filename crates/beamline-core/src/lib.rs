//! Beamline Core -- geometry instantiation and run sequencing for Monte
//! Carlo treatment-head simulations.
//!
//! This crate owns the declarative volume tree, the repeat-expansion engine
//! that materializes collimator banks from parametric placement functions,
//! the field-shaping calculators, and the run controller that sequences
//! beam-on invocations while keeping phasespace recordings consistent. The
//! particle transport itself is an external collaborator behind
//! [`transport::TransportEngine`].
//!
//! # Build / update / run cycle
//!
//! 1. **Build** -- [`machine::Machine::from_config`] expands the declarative
//!    machine description into a concrete volume tree;
//!    [`run::Simulation::new`] places it into the engine's scene.
//! 2. **Reconfigure** -- field shaping ([`machine::Machine::square_field`]
//!    and friends), gantry/collimator rotation, phasespace role changes.
//! 3. **Run** -- [`run::Simulation::beam_on`] refreshes the scene, selects
//!    replay or a fresh gun, commits a fresh seed, and runs.
//!
//! # Key Types
//!
//! - [`volume::Volume`] -- a named node in the owned geometry tree.
//! - [`schema::VolumeSpec`] -- the declarative record a volume is built from.
//! - [`transformer::TransformerRegistry`] -- named pure positioning
//!   functions for repeat expansion, frozen after startup.
//! - [`field::MachineProfile`] -- machine-specific field-shaping seam.
//! - [`run::Simulation`] -- the run controller and phasespace state machine.
//! - [`rng::SeedSequence`] -- per-run seed draws, fresh every run.

pub mod error;
pub mod expand;
pub mod export;
pub mod field;
pub mod machine;
pub mod math;
pub mod profiles;
pub mod rng;
pub mod run;
pub mod schema;
pub mod transformer;
pub mod transport;
pub mod volume;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
