//! Benchmarks for the spatial filters and the merge pipeline

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};
use scanmerge_algorithms::{
    box_filter, merge_clouds, voxel_grid_filter, BoxBounds, CloudSource, KeepPolicy, MergeParams,
    VoxelParams,
};
use scanmerge_core::{IntensityPoint3f, Point3f, PointCloud, ScanCloud};

/// Generate a random intensity cloud inside a 20 m cube
fn generate_cloud(num_points: usize, seed: u64) -> PointCloud<IntensityPoint3f> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..num_points)
        .map(|_| IntensityPoint3f {
            position: Point3f::new(
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
            ),
            intensity: rng.gen(),
        })
        .collect()
}

fn bench_voxel_grid(c: &mut Criterion) {
    let mut group = c.benchmark_group("voxel_grid");
    for &n in &[10_000usize, 100_000, 1_000_000] {
        let cloud = generate_cloud(n, 1);
        group.throughput(Throughput::Elements(n as u64));
        for keep in [KeepPolicy::First, KeepPolicy::Random] {
            let params = VoxelParams::new(0.1, keep);
            group.bench_with_input(BenchmarkId::new(keep.to_string(), n), &cloud, |b, cloud| {
                b.iter(|| {
                    let mut rng = StdRng::seed_from_u64(135);
                    black_box(voxel_grid_filter(cloud, &params, &mut rng).unwrap())
                })
            });
        }
    }
    group.finish();
}

fn bench_box_filter(c: &mut Criterion) {
    let cloud = generate_cloud(1_000_000, 2);
    let bounds = BoxBounds::new([-5.0; 3], [5.0; 3]);
    c.bench_function("box_filter_1m", |b| {
        b.iter(|| black_box(box_filter(&cloud, &bounds).unwrap()))
    });
}

fn bench_merge(c: &mut Criterion) {
    let sources: Vec<ScanCloud> = (0..8).map(|i| generate_cloud(100_000, i).into()).collect();
    let params = MergeParams::default().with_voxel(VoxelParams::new(0.1, KeepPolicy::First));
    c.bench_function("merge_8x100k", |b| {
        b.iter(|| {
            let inputs: Vec<CloudSource> = sources.iter().cloned().map(CloudSource::from).collect();
            black_box(merge_clouds(inputs, None, &params).unwrap())
        })
    });
}

criterion_group!(benches, bench_voxel_grid, bench_box_filter, bench_merge);
criterion_main!(benches);
