//! Repeat expansion: materializes declarative specs into concrete volumes.
//!
//! A spec with `repeat: n > 1` produces `n` volumes named `{base}_{i}`. For
//! each of translation, rotation, and color, a per-instance value sequence
//! is resolved from a literal (broadcast), an explicit per-instance list
//! (length must match), or a registered transformer invoked per index.
//! Malformed specs are construction-time errors, never silently skipped.

use crate::error::ConfigError;
use crate::math::{Color, Vec3};
use crate::schema::{resolve_inherits, ColorSpec, VectorSpec, VolumeSpec};
use crate::transformer::{TransformerArgs, TransformerRegistry};
use crate::volume::{MeshRef, Volume};

/// Build the full volume tree for a root spec (the "world"), expanding every
/// repeated daughter along the way.
pub fn build_tree(
    name: &str,
    spec: &VolumeSpec,
    registry: &TransformerRegistry,
) -> Result<Volume, ConfigError> {
    build_single(name, spec, registry)
}

/// Materialize one named daughter spec: a single volume, or `repeat` volumes
/// named `{base}_{i}` when the spec is a repeat template.
pub fn instantiate(
    name: &str,
    spec: &VolumeSpec,
    registry: &TransformerRegistry,
) -> Result<Vec<Volume>, ConfigError> {
    let repeat = spec.repeat.unwrap_or(1);
    if repeat <= 1 {
        return Ok(vec![build_single(name, spec, registry)?]);
    }

    let zero = (0.0, 0.0, 0.0);
    let translations =
        resolve_vectors(name, spec.translation.as_ref(), repeat, spec, registry, zero)?;
    let rotations = resolve_vectors(name, spec.rotation.as_ref(), repeat, spec, registry, zero)?;
    let colors = resolve_colors(name, spec.color.as_ref(), repeat, spec, registry)?;

    let mut volumes = Vec::with_capacity(repeat as usize);
    for i in 0..repeat {
        let mut instance = spec.clone();
        instance.repeat = None;
        instance.translation = Some(VectorSpec::Fixed(translations[i as usize]));
        instance.rotation = Some(VectorSpec::Fixed(rotations[i as usize]));
        instance.color = Some(ColorSpec::Fixed(colors[i as usize]));
        volumes.push(build_single(&format!("{name}_{i}"), &instance, registry)?);
    }
    Ok(volumes)
}

/// Build a single concrete volume from a spec with no repeat.
fn build_single(
    name: &str,
    spec: &VolumeSpec,
    registry: &TransformerRegistry,
) -> Result<Volume, ConfigError> {
    let mut volume = Volume::new(name);

    if let Some(t) = &spec.translation {
        volume.translation = fixed_vector(name, t)?;
    }
    if let Some(r) = &spec.rotation {
        volume.rotation = fixed_vector(name, r)?;
    }
    if let Some(c) = &spec.color {
        volume.color = fixed_color(name, c)?;
    }
    if let Some(material) = &spec.material {
        volume.material = material.clone();
    }
    if let Some(file) = &spec.mesh_file {
        volume.mesh = Some(MeshRef {
            file: file.clone(),
            scale: spec.scale.unwrap_or(1.0),
        });
    }
    volume.solid = spec.solid;
    if let Some(tessellated) = spec.tessellated {
        volume.tessellated = tessellated;
    }
    volume.check_shape()?;

    for (daughter_name, daughter_spec) in resolve_inherits(&spec.daughters)? {
        for instance in instantiate(&daughter_name, &daughter_spec, registry)? {
            volume.insert_daughter(instance);
        }
    }
    Ok(volume)
}

/// A direct (non-repeated) instantiation only accepts a literal value.
fn fixed_vector(volume: &str, spec: &VectorSpec) -> Result<Vec3, ConfigError> {
    match spec {
        VectorSpec::Fixed(v) => Ok(*v),
        VectorSpec::PerInstance(_) | VectorSpec::Transform { .. } => {
            Err(ConfigError::InvalidRepeatSpec {
                volume: volume.to_string(),
                detail: "per-instance values require repeat > 1".to_string(),
            })
        }
    }
}

fn fixed_color(volume: &str, spec: &ColorSpec) -> Result<Color, ConfigError> {
    match spec {
        ColorSpec::Fixed(c) => Ok(*c),
        ColorSpec::PerInstance(_) | ColorSpec::Transform { .. } => {
            Err(ConfigError::InvalidRepeatSpec {
                volume: volume.to_string(),
                detail: "per-instance colors require repeat > 1".to_string(),
            })
        }
    }
}

fn resolve_vectors(
    volume: &str,
    axis: Option<&VectorSpec>,
    repeat: u32,
    sibling: &VolumeSpec,
    registry: &TransformerRegistry,
    default: Vec3,
) -> Result<Vec<Vec3>, ConfigError> {
    match axis {
        None => Ok(vec![default; repeat as usize]),
        Some(VectorSpec::Fixed(v)) => Ok(vec![*v; repeat as usize]),
        Some(VectorSpec::PerInstance(list)) => {
            check_length(volume, list.len(), repeat)?;
            Ok(list.clone())
        }
        Some(VectorSpec::Transform { function, args }) => {
            invoke_transformer(volume, function, args, repeat, sibling, registry)
        }
    }
}

fn resolve_colors(
    volume: &str,
    axis: Option<&ColorSpec>,
    repeat: u32,
    sibling: &VolumeSpec,
    registry: &TransformerRegistry,
) -> Result<Vec<Color>, ConfigError> {
    match axis {
        // The repeat path defaults to opaque black, unlike the direct path.
        None => Ok(vec![(0.0, 0.0, 0.0, 1.0); repeat as usize]),
        Some(ColorSpec::Fixed(c)) => Ok(vec![*c; repeat as usize]),
        Some(ColorSpec::PerInstance(list)) => {
            check_length(volume, list.len(), repeat)?;
            Ok(list.clone())
        }
        Some(ColorSpec::Transform { function, args }) => {
            let triples = invoke_transformer(volume, function, args, repeat, sibling, registry)?;
            Ok(triples.into_iter().map(|(r, g, b)| (r, g, b, 1.0)).collect())
        }
    }
}

fn check_length(volume: &str, actual: usize, repeat: u32) -> Result<(), ConfigError> {
    if actual != repeat as usize {
        return Err(ConfigError::InvalidRepeatSpec {
            volume: volume.to_string(),
            detail: format!("per-instance list has {actual} entries for repeat {repeat}"),
        });
    }
    Ok(())
}

/// Resolve the argument map (applying the inherit-from-sibling sentinel) and
/// invoke the transformer once per instance index.
fn invoke_transformer(
    volume: &str,
    function: &str,
    args: &std::collections::BTreeMap<String, Option<f64>>,
    repeat: u32,
    sibling: &VolumeSpec,
    registry: &TransformerRegistry,
) -> Result<Vec<Vec3>, ConfigError> {
    let f = registry.resolve(function)?;

    let mut resolved = std::collections::BTreeMap::new();
    for (key, value) in args {
        let value = match value {
            Some(v) => *v,
            None => sibling.numeric_field(key).ok_or_else(|| {
                ConfigError::InvalidRepeatSpec {
                    volume: volume.to_string(),
                    detail: format!("argument '{key}' inherits from a non-numeric spec field"),
                }
            })?,
        };
        resolved.insert(key.clone(), value);
    }
    let args = TransformerArgs::new(resolved);

    (0..repeat).map(|i| f(i, &args)).collect()
}
