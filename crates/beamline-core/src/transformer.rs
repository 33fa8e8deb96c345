//! Named positioning transformers for repeat expansion.
//!
//! A transformer is a pure function `(index, args) -> (a, b, c)` producing a
//! per-instance translation or rotation triple. The registry is built once at
//! startup (before any geometry build) and read-only afterwards; resolution
//! is by exact, case-sensitive name.
//!
//! The built-in multi-leaf collimator transformers all work in the machine
//! coordinate convention where the virtual source sits at `z = 1000` and the
//! isocenter at `z = 0`, so a component plane at `position` is `1000 -
//! position` from the source.

use std::collections::BTreeMap;

use crate::error::ConfigError;
use crate::math::Vec3;

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// Resolved numeric arguments for one transformer invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformerArgs {
    values: BTreeMap<String, f64>,
}

impl TransformerArgs {
    pub fn new(values: BTreeMap<String, f64>) -> Self {
        Self { values }
    }

    /// Required argument; absence is a construction-time error.
    pub fn required(&self, transformer: &'static str, arg: &'static str) -> Result<f64, ConfigError> {
        self.values
            .get(arg)
            .copied()
            .ok_or(ConfigError::MissingTransformerArg { transformer, arg })
    }

    /// Optional argument with a default.
    pub fn get_or(&self, arg: &str, default: f64) -> f64 {
        self.values.get(arg).copied().unwrap_or(default)
    }
}

/// A pure positioning function. Deterministic given `(index, args)`.
pub type TransformerFn = fn(u32, &TransformerArgs) -> Result<Vec3, ConfigError>;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Registry of positioning transformers. Populate before any geometry build;
/// treat as configuration afterwards.
#[derive(Debug, Clone, Default)]
pub struct TransformerRegistry {
    transformers: BTreeMap<String, TransformerFn>,
}

impl TransformerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the built-in transformers.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("mlc_diverge", mlc_diverge);
        registry.register("mlc_interleave", mlc_interleave);
        registry.register("mlc_arc", mlc_arc);
        registry.register("repeat_x", repeat_x);
        registry.register("repeat_y", repeat_y);
        registry.register("repeat_z", repeat_z);
        registry
    }

    /// Insert or replace a transformer.
    pub fn register(&mut self, name: &str, f: TransformerFn) {
        self.transformers.insert(name.to_string(), f);
    }

    /// Resolve a transformer by exact name.
    pub fn resolve(&self, name: &str) -> Result<TransformerFn, ConfigError> {
        self.transformers
            .get(name)
            .copied()
            .ok_or_else(|| ConfigError::UnknownTransformer {
                name: name.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Built-in transformers
// ---------------------------------------------------------------------------

/// Offset that centers a bank of `repeat` instances spaced by `interval`
/// about the beam axis, with an optional extra `shift`.
fn bank_offset(interval: f64, repeat: f64, shift: f64) -> f64 {
    -(interval * repeat / 2.0 - interval + shift)
}

/// Leaf-bank divergence: tilts each leaf so its edge points at the virtual
/// source above the bank plane. Returns a rotation triple
/// `(-divergence, 0, z_rotation)` in degrees.
pub fn mlc_diverge(i: u32, args: &TransformerArgs) -> Result<Vec3, ConfigError> {
    let interval = args.required("mlc_diverge", "interval")?;
    let position = args.required("mlc_diverge", "position")?;
    let shift = args.get_or("shift", 0.0);
    let z_rotation = args.get_or("z_rotation", 0.0);
    let centre = args.get_or("centre", 0.0);
    let repeat = args.get_or("repeat", 0.0);

    let offset = bank_offset(interval, repeat, shift);
    let divergence = ((f64::from(i) * interval + offset + centre) / (1000.0 - position)).atan();
    Ok((-divergence.to_degrees(), 0.0, z_rotation))
}

/// Interleaved slat placement for a fixed bank of 20: translation triple
/// with a constant 10 on the first axis and the slat plane on the third.
pub fn mlc_interleave(i: u32, args: &TransformerArgs) -> Result<Vec3, ConfigError> {
    let interval = args.required("mlc_interleave", "interval")?;
    let position = args.required("mlc_interleave", "position")?;
    let shift = args.get_or("shift", 0.0);

    let offset = bank_offset(interval, 20.0, shift);
    Ok((10.0, f64::from(i) * interval + offset, position))
}

/// Places instances on a circular arc of radius `1000 - position` about the
/// virtual source point.
pub fn mlc_arc(i: u32, args: &TransformerArgs) -> Result<Vec3, ConfigError> {
    let interval = args.required("mlc_arc", "interval")?;
    let position = args.required("mlc_arc", "position")?;
    let shift = args.get_or("shift", 0.0);
    let repeat = args.get_or("repeat", 0.0);

    let offset = bank_offset(interval, repeat, shift);
    let w = f64::from(i) * interval + offset;
    let radius = 1000.0 - position;
    Ok((0.0, w, 1000.0 - (radius * radius - w * w).sqrt()))
}

/// Linear translation along x: `origin + i * interval`.
pub fn repeat_x(i: u32, args: &TransformerArgs) -> Result<Vec3, ConfigError> {
    let interval = args.required("repeat_x", "interval")?;
    let origin = args.get_or("origin", 0.0);
    Ok((origin + f64::from(i) * interval, 0.0, 0.0))
}

/// Linear translation along y: `origin + i * interval`.
pub fn repeat_y(i: u32, args: &TransformerArgs) -> Result<Vec3, ConfigError> {
    let interval = args.required("repeat_y", "interval")?;
    let origin = args.get_or("origin", 0.0);
    Ok((0.0, origin + f64::from(i) * interval, 0.0))
}

/// Linear translation along z: `origin + i * interval`.
pub fn repeat_z(i: u32, args: &TransformerArgs) -> Result<Vec3, ConfigError> {
    let interval = args.required("repeat_z", "interval")?;
    let origin = args.get_or("origin", 0.0);
    Ok((0.0, 0.0, origin + f64::from(i) * interval))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, f64)]) -> TransformerArgs {
        TransformerArgs::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        )
    }

    #[test]
    fn builtin_registry_resolves_all_builtins() {
        let registry = TransformerRegistry::builtin();
        for name in [
            "mlc_diverge",
            "mlc_interleave",
            "mlc_arc",
            "repeat_x",
            "repeat_y",
            "repeat_z",
        ] {
            assert!(registry.resolve(name).is_ok(), "missing builtin: {name}");
        }
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn resolution_is_case_sensitive() {
        let registry = TransformerRegistry::builtin();
        assert!(matches!(
            registry.resolve("MLC_Diverge"),
            Err(ConfigError::UnknownTransformer { .. })
        ));
    }

    #[test]
    fn register_replaces_existing_entry() {
        let mut registry = TransformerRegistry::builtin();
        registry.register("mlc_diverge", repeat_x);
        let f = registry.resolve("mlc_diverge").unwrap();
        let out = f(2, &args(&[("interval", 5.0)])).unwrap();
        assert_eq!(out, (10.0, 0.0, 0.0));
    }

    #[test]
    fn missing_required_arg_is_an_error() {
        let result = mlc_diverge(0, &args(&[("interval", 10.0)]));
        assert!(matches!(
            result,
            Err(ConfigError::MissingTransformerArg {
                transformer: "mlc_diverge",
                arg: "position",
            })
        ));
    }

    #[test]
    fn diverge_points_leaves_at_virtual_source() {
        // interval 10, repeat 20, shift 0: offset = -90, first leaf at -90
        // from the axis, 500 below the virtual source.
        let a = args(&[("interval", 10.0), ("position", 500.0), ("repeat", 20.0)]);
        let (x, y, z) = mlc_diverge(0, &a).unwrap();
        let expected = (90.0f64 / 500.0).atan().to_degrees();
        assert!((x - expected).abs() < 1e-12);
        assert_eq!(y, 0.0);
        assert_eq!(z, 0.0);
    }

    #[test]
    fn diverge_symmetric_bank_reflects_in_sign() {
        // shift = interval/2 centers the bank, so leaf 0 and leaf 19 sit at
        // mirrored lateral offsets and get mirrored divergences.
        let a = args(&[
            ("interval", 10.0),
            ("position", 500.0),
            ("repeat", 20.0),
            ("shift", 5.0),
        ]);
        let first = mlc_diverge(0, &a).unwrap();
        let last = mlc_diverge(19, &a).unwrap();
        assert!((first.0 + last.0).abs() < 1e-12, "{} vs {}", first.0, last.0);
    }

    #[test]
    fn diverge_carries_z_rotation_through() {
        let a = args(&[
            ("interval", 10.0),
            ("position", 500.0),
            ("z_rotation", 90.0),
        ]);
        let (_, _, z) = mlc_diverge(0, &a).unwrap();
        assert_eq!(z, 90.0);
    }

    #[test]
    fn interleave_uses_fixed_repeat_of_twenty() {
        let a = args(&[("interval", 5.0), ("position", 300.0)]);
        // offset = -(5 * 20 / 2 - 5) = -45
        assert_eq!(mlc_interleave(0, &a).unwrap(), (10.0, -45.0, 300.0));
        assert_eq!(mlc_interleave(9, &a).unwrap(), (10.0, 0.0, 300.0));
    }

    #[test]
    fn arc_instance_on_axis_lands_on_plane() {
        // interval 10, repeat 2: offset = -(10 - 10) = 0, so instance 0 sits
        // on the beam axis at exactly the nominal plane.
        let a = args(&[("interval", 10.0), ("position", 600.0), ("repeat", 2.0)]);
        let (x, y, z) = mlc_arc(0, &a).unwrap();
        assert_eq!((x, y), (0.0, 0.0));
        assert!((z - 600.0).abs() < 1e-12);
    }

    #[test]
    fn arc_off_axis_instances_pull_toward_source() {
        let a = args(&[("interval", 10.0), ("position", 600.0), ("repeat", 2.0)]);
        let on_axis = mlc_arc(0, &a).unwrap();
        let off_axis = mlc_arc(5, &a).unwrap();
        assert_eq!(off_axis.1, 50.0);
        assert!(off_axis.2 > on_axis.2);
    }

    #[test]
    fn linear_repeats_step_one_axis() {
        let a = args(&[("interval", 25.0), ("origin", -50.0)]);
        assert_eq!(repeat_x(2, &a).unwrap(), (0.0, 0.0, 0.0));
        assert_eq!(repeat_x(0, &a).unwrap(), (-50.0, 0.0, 0.0));
        assert_eq!(repeat_y(3, &a).unwrap(), (0.0, 25.0, 0.0));
        assert_eq!(repeat_z(4, &a).unwrap(), (0.0, 0.0, 50.0));
    }
}
