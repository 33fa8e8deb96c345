//! Error taxonomy for geometry construction and run sequencing.
//!
//! Configuration errors are fatal before any run; runtime failures from the
//! transport engine propagate uncaught. There are no retries anywhere — a
//! failed run is restarted as a whole process with a fresh seed.

/// Errors raised while turning declarative specs into a concrete volume tree.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A repeat spec referenced a transformer that was never registered.
    #[error("unknown transformer '{name}'")]
    UnknownTransformer { name: String },

    /// A transformer was invoked without one of its required arguments.
    #[error("transformer '{transformer}' missing required argument '{arg}'")]
    MissingTransformerArg {
        transformer: &'static str,
        arg: &'static str,
    },

    /// A repeat spec was malformed (bad list length, bad inherit sentinel, ...).
    #[error("invalid repeat spec for volume '{volume}': {detail}")]
    InvalidRepeatSpec { volume: String, detail: String },

    /// A spec inherits, directly or transitively, from itself.
    #[error("inherit cycle detected at volume '{volume}'")]
    InheritCycle { volume: String },

    /// A spec inherits from a sibling that does not exist.
    #[error("volume '{volume}' inherits from unknown sibling '{parent}'")]
    UnknownInherit { volume: String, parent: String },

    /// A volume declared both a mesh file and a primitive solid.
    #[error("volume '{volume}' declares both a mesh and a solid")]
    AmbiguousShape { volume: String },
}

/// Errors raised by field-shaping operations.
#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    /// An abstract field-shaping capability was invoked without a machine
    /// profile installed.
    #[error("'{capability}' requires a machine profile")]
    NotImplemented { capability: &'static str },

    /// A named volume the operation needs is absent from the tree.
    #[error("volume '{name}' not found in the machine tree")]
    UnknownVolume { name: String },
}

/// Opaque failure reported by the transport-engine collaborator.
#[derive(Debug, thiserror::Error)]
#[error("transport engine failure: {0}")]
pub struct EngineFailure(pub String);

/// Errors raised by the simulation run controller.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// A phasespace name is not declared in the machine configuration.
    #[error("phasespace '{name}' not declared in machine configuration")]
    UnknownPhasespace { name: String },

    /// A field-shaping operation failed.
    #[error(transparent)]
    Field(#[from] FieldError),

    /// Geometry construction failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The transport engine reported a failure; fatal to the run.
    #[error(transparent)]
    Engine(#[from] EngineFailure),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offender() {
        let e = ConfigError::UnknownTransformer {
            name: "mlc_divirge".to_string(),
        };
        assert!(e.to_string().contains("mlc_divirge"));

        let e = RunError::UnknownPhasespace {
            name: "chamber".to_string(),
        };
        assert!(e.to_string().contains("chamber"));
    }

    #[test]
    fn engine_failure_is_opaque() {
        let e: RunError = EngineFailure("geometry overlap".to_string()).into();
        assert!(e.to_string().contains("geometry overlap"));
    }
}
