//! Benchmarks for command construction, fingerprinting and pool turnover.

#![allow(
    clippy::min_ident_chars,
    missing_docs,
    reason = "Benchmarks use standard loop variables"
)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use sieve_core::{EngineConfig, ExcludedTest, Task};
use sieve_engine::{FingerprintHasher, RepoPool, SelectionCommandBuilder};
use std::fs;
use std::hint::black_box;
use std::path::Path;
use tempfile::TempDir;
use tokio::runtime::Runtime;

fn create_task(excludes: usize) -> Task {
    (0..excludes).fold(
        Task::new().include("test_parse").include("unicode"),
        |task, i| {
            task.exclude(ExcludedTest::method(
                format!("TestCase{i}.test_case_{i}"),
                format!("tests/unit/test_module_{}.py", i % 16),
            ))
        },
    )
}

fn bench_command_build(c: &mut Criterion) {
    let builder = SelectionCommandBuilder::new(&EngineConfig::default());
    let root = Path::new("/work/clone-0");
    let mut group = c.benchmark_group("command_build");

    for excludes in &[0, 100, 1000] {
        let task = create_task(*excludes);
        group.throughput(Throughput::Elements(*excludes as u64));
        group.bench_with_input(BenchmarkId::from_parameter(excludes), &task, |b, task| {
            b.iter(|| builder.build(black_box(task), black_box(root)).to_shell_string());
        });
    }
    group.finish();
}

fn bench_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint");

    for files in &[10, 200] {
        let temp = TempDir::new().unwrap_or_else(|err| panic!("Failed to create temp dir: {err}"));
        for i in 0..*files {
            let dir = temp.path().join(format!("pkg_{}", i % 8));
            fs::create_dir_all(&dir).unwrap_or_else(|err| panic!("Failed to create dir: {err}"));
            fs::write(dir.join(format!("mod_{i}.py")), format!("value = {i}\n").repeat(50))
                .unwrap_or_else(|err| panic!("Failed to write file: {err}"));
        }

        let hasher = FingerprintHasher::new(["py"]);
        group.throughput(Throughput::Elements(*files as u64));
        group.bench_with_input(BenchmarkId::from_parameter(files), temp.path(), |b, dir| {
            b.iter(|| hasher.hash(black_box(dir), "python -m pytest tests"));
        });
    }
    group.finish();
}

fn bench_pool_turnover(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap_or_else(|err| panic!("Failed to build runtime: {err}"));
    let temp = TempDir::new().unwrap_or_else(|err| panic!("Failed to create temp dir: {err}"));
    let trees = (0..4)
        .map(|i| {
            let tree = temp.path().join(format!("clone-{i}"));
            fs::create_dir_all(&tree).unwrap_or_else(|err| panic!("Failed to create tree: {err}"));
            tree
        })
        .collect();
    let pool = RepoPool::new(trees).unwrap_or_else(|err| panic!("Failed to build pool: {err}"));

    c.bench_function("pool_acquire_release", |b| {
        b.to_async(&runtime).iter(|| async {
            let slot = pool
                .acquire()
                .await
                .unwrap_or_else(|err| panic!("Failed to acquire: {err}"));
            drop(black_box(slot));
        });
    });
}

criterion_group!(
    benches,
    bench_command_build,
    bench_fingerprint,
    bench_pool_turnover
);
criterion_main!(benches);
