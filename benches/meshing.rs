use criterion::{Criterion, criterion_group, criterion_main};
use glam::DVec3;

use sdf_mesher::config::BuildParams;
use sdf_mesher::mesh::extract_surface;
use sdf_mesher::octree;
use sdf_mesher::pipeline::Pipeline;
use sdf_mesher::progress::CancelToken;
use sdf_mesher::sdf::scenes;

fn sphere_params(min_size: f64) -> BuildParams {
    BuildParams {
        root_center: DVec3::ZERO,
        root_size: 4.0,
        min_size,
        cell_budget: 10_000_000,
        optimize: true,
        refine: false,
    }
}

fn bench_octree(c: &mut Criterion) {
    let sdf = scenes::sphere(DVec3::ZERO, 1.0);
    let params = sphere_params(0.02);

    c.bench_function("octree_build_sphere_0.02", |b| {
        b.iter(|| octree::build(&sdf, &params, &CancelToken::new(), &mut |_| {}).unwrap());
    });
}

fn bench_extract(c: &mut Criterion) {
    let sdf = scenes::sphere(DVec3::ZERO, 1.0);
    let params = sphere_params(0.02);
    let tree = octree::build(&sdf, &params, &CancelToken::new(), &mut |_| {}).unwrap();

    c.bench_function("extract_surface_sphere_0.02", |b| {
        b.iter(|| extract_surface(&tree).unwrap());
    });
}

fn bench_pipeline(c: &mut Criterion) {
    let sdf = scenes::two_spheres();
    let params = BuildParams {
        root_size: 8.0,
        ..sphere_params(0.05)
    };

    c.bench_function("pipeline_two_spheres_0.05", |b| {
        b.iter(|| Pipeline::run(0, &sdf, &params, &CancelToken::new(), |_| {}).unwrap());
    });
}

criterion_group!(benches, bench_octree, bench_extract, bench_pipeline);
criterion_main!(benches);
