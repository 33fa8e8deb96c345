//! Repeat-expansion benchmark: materializing a full multi-leaf bank is the
//! hot path of every geometry rebuild.

use std::collections::BTreeMap;

use beamline_core::expand::instantiate;
use beamline_core::schema::{VectorSpec, VolumeSpec};
use beamline_core::transformer::TransformerRegistry;
use beamline_core::volume::Solid;
use criterion::{criterion_group, criterion_main, Criterion};

fn leaf_bank(repeat: u32) -> VolumeSpec {
    let mut rotation_args = BTreeMap::new();
    rotation_args.insert("interval".to_string(), Some(5.0));
    rotation_args.insert("position".to_string(), Some(330.8));
    rotation_args.insert("repeat".to_string(), None);

    let mut translation_args = BTreeMap::new();
    translation_args.insert("interval".to_string(), Some(5.0));
    translation_args.insert("position".to_string(), Some(330.8));
    translation_args.insert("repeat".to_string(), None);

    VolumeSpec {
        repeat: Some(repeat),
        solid: Some(Solid::Slab {
            side: 5.0,
            thickness: 80.0,
        }),
        material: Some("tungsten".to_string()),
        translation: Some(VectorSpec::Transform {
            function: "mlc_arc".to_string(),
            args: translation_args,
        }),
        rotation: Some(VectorSpec::Transform {
            function: "mlc_diverge".to_string(),
            args: rotation_args,
        }),
        ..VolumeSpec::default()
    }
}

fn bench_expand(c: &mut Criterion) {
    let registry = TransformerRegistry::builtin();

    let mut group = c.benchmark_group("expand");
    for leaves in [20u32, 80] {
        let spec = leaf_bank(leaves);
        group.bench_function(format!("bank_{leaves}"), |b| {
            b.iter(|| instantiate("mlc_1", &spec, &registry).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_expand);
criterion_main!(benches);
