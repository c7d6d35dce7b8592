// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for the pipeline interval search.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use improver::{binary_search_ii, ImproverConfig, RegstDemand, ZoneDemand};
use memory_zone::MemZoneKey;

/// `num_zones` zones of `descs_per_zone` descriptors, sized so that the
/// search has to bisect.
fn synthetic_zones(num_zones: usize, descs_per_zone: usize) -> Vec<ZoneDemand> {
    (0..num_zones)
        .map(|z| {
            let regsts: Vec<RegstDemand> = (0..descs_per_zone)
                .map(|d| RegstDemand {
                    regst_desc_id: (z * descs_per_zone + d) as i64,
                    byte_size: 4096 + 512 * d as u64,
                    duration: 20.0 + (d % 7) as f64 * 3.5,
                    reuse_ratio: if d % 5 == 0 { 0.25 } else { 1.0 },
                    min_register_num: 1,
                    max_register_num: None,
                })
                .collect();
            let min_bytes: u64 = regsts.iter().map(|r| r.byte_size).sum();
            ZoneDemand {
                key: MemZoneKey::new(z as i64 / 4, z as i64 % 4),
                available_bytes: min_bytes * 3,
                regsts,
            }
        })
        .collect()
}

fn bench_search(c: &mut Criterion) {
    let config = ImproverConfig::default();
    let mut group = c.benchmark_group("binary_search_ii");
    for &(zones, descs) in &[(4, 16), (16, 64), (64, 256)] {
        let input = synthetic_zones(zones, descs);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{zones}x{descs}")),
            &input,
            |b, input| b.iter(|| binary_search_ii(black_box(input), 1.0, &config)),
        );
    }
    group.finish();
}

fn bench_zone_usage(c: &mut Criterion) {
    let zones = synthetic_zones(1, 1024);
    c.bench_function("zone_usage_1024", |b| {
        b.iter(|| zones[0].usage_at(black_box(12.5)))
    });
}

criterion_group!(benches, bench_search, bench_zone_usage);
criterion_main!(benches);
