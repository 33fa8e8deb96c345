//! Beamline Data -- loads declarative machine descriptions from disk.
//!
//! A machine description is a single RON/TOML/JSON file deserializing into
//! [`beamline_core::schema::MachineConfig`]. [`load_machine`] parses the file;
//! [`validate_machine`] proves the description buildable (every transformer
//! resolves, every repeat spec is well formed, every inherit chain closes)
//! before any simulation is constructed, so configuration errors surface
//! before any run.

use std::path::Path;

use beamline_core::expand::build_tree;
use beamline_core::schema::MachineConfig;
use beamline_core::transformer::TransformerRegistry;

pub mod loader;

pub use loader::{deserialize_file, detect_format, DataLoadError, Format};

/// Load a machine description from a file, by extension.
pub fn load_machine(path: &Path) -> Result<MachineConfig, DataLoadError> {
    deserialize_file(path)
}

/// Check that the description can be built with the given registry and that
/// its phasespace declarations are sane. Cheap relative to a run; call at
/// startup.
pub fn validate_machine(
    config: &MachineConfig,
    registry: &TransformerRegistry,
) -> Result<(), DataLoadError> {
    build_tree("world", &config.world, registry)?;

    for (name, spec) in &config.phasespaces {
        if !(spec.radius > 0.0) {
            return Err(DataLoadError::InvalidPhasespace {
                name: name.clone(),
                detail: format!("radius must be positive, got {}", spec.radius),
            });
        }
        if !spec.z_position.is_finite() {
            return Err(DataLoadError::InvalidPhasespace {
                name: name.clone(),
                detail: "z_position must be finite".to_string(),
            });
        }
    }
    Ok(())
}

/// Load and validate in one step.
pub fn load_validated_machine(
    path: &Path,
    registry: &TransformerRegistry,
) -> Result<MachineConfig, DataLoadError> {
    let config = load_machine(path)?;
    validate_machine(&config, registry)?;
    Ok(config)
}
