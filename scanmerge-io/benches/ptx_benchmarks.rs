//! Benchmarks for the PTX reader and writer

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use scanmerge_core::{IntensityPoint3f, Point3f, PointCloud, Pose, ScanCloud, ScanFrame, Vector3d};
use scanmerge_io::{read_ptx, write_ptx, PtxReadOptions};
use tempfile::NamedTempFile;

/// Generate an organized intensity scan of `rows * cols` points
fn generate_frame(rows: usize, cols: usize) -> ScanFrame {
    let points: Vec<IntensityPoint3f> = (0..rows * cols)
        .map(|i| {
            let t = i as f32;
            IntensityPoint3f {
                position: Point3f::new((t * 0.1).sin() * 10.0, (t * 0.1).cos() * 10.0, t * 0.001),
                intensity: (i % 256) as f32 / 255.0,
            }
        })
        .collect();
    let cloud = PointCloud::from_grid(points, rows, cols).expect("grid shape");
    ScanFrame::new(
        Pose::identity(),
        Pose::translation(Vector3d::new(5.0, 0.0, 0.0)),
        ScanCloud::from(cloud),
    )
}

fn create_ptx_file(rows: usize, cols: usize) -> NamedTempFile {
    let file = tempfile::Builder::new()
        .suffix(".ptx")
        .tempfile()
        .expect("Failed to create temporary file");
    write_ptx(file.path(), &[generate_frame(rows, cols)]).expect("Failed to write PTX file");
    file
}

fn bench_ptx_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("ptx_read");
    for &rows in &[100usize, 500, 1000] {
        let cols = 100;
        let file = create_ptx_file(rows, cols);
        group.throughput(Throughput::Elements((rows * cols) as u64));
        group.bench_with_input(BenchmarkId::new("plain", rows * cols), &file, |b, file| {
            b.iter(|| black_box(read_ptx(file.path(), PtxReadOptions::default()).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("aligned", rows * cols), &file, |b, file| {
            b.iter(|| {
                black_box(
                    read_ptx(file.path(), PtxReadOptions::default().with_transform(true)).unwrap(),
                )
            })
        });
    }
    group.finish();
}

fn bench_ptx_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("ptx_write");
    for &rows in &[100usize, 1000] {
        let frame = generate_frame(rows, 100);
        let file = NamedTempFile::new().expect("Failed to create temporary file");
        group.throughput(Throughput::Elements((rows * 100) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows * 100), &frame, |b, frame| {
            b.iter(|| write_ptx(file.path(), std::slice::from_ref(frame)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_ptx_read, bench_ptx_write);
criterion_main!(benches);
