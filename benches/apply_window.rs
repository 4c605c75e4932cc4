//! Hot-path microbenchmarks: volume math and registry churn.

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use tab_volume::{TabId, TabWindowRegistry, WindowId, gain_multiplier, sanitize_volume};

fn bench_volume_math(c: &mut Criterion) {
    c.bench_function("sanitize_volume", |b| {
        b.iter(|| {
            for raw in [-10.0, 0.0, 99.5, 150.0, 1_000.0, f64::NAN] {
                black_box(sanitize_volume(black_box(raw)));
            }
        });
    });

    c.bench_function("gain_multiplier", |b| {
        b.iter(|| {
            for volume in 0..=200u16 {
                black_box(gain_multiplier(black_box(volume)));
            }
        });
    });
}

fn bench_registry(c: &mut Criterion) {
    c.bench_function("registry_churn_100_tabs", |b| {
        b.iter(|| {
            let mut registry = TabWindowRegistry::new();
            let window = WindowId::new(1);
            for raw in 0..100u32 {
                let tab = TabId::new(raw);
                registry.map_tab(tab, window);
                registry.mark_attached(tab);
            }
            black_box(registry.tabs_mapped_to(window).len());
            for raw in 0..100u32 {
                registry.forget_tab(TabId::new(raw));
            }
            black_box(registry.mapped_count())
        });
    });
}

criterion_group!(benches, bench_volume_math, bench_registry);
criterion_main!(benches);
