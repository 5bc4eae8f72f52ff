//! Benchmarks for build-relay
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::fs;

fn benchmark_normalize_rule(c: &mut Criterion) {
    use build_relay::task::normalize_rule;

    let command = "prebuilts/clang/host/linux-x86/clang-r498229b/bin/clang++ \
                   -Iinclude -O2 -fPIC -c src/module/file.cpp -o out/obj/file.o";

    c.bench_function("normalize_clang_rule", |b| {
        b.iter(|| black_box(normalize_rule(black_box(command), "clang++")))
    });
}

fn benchmark_checksum(c: &mut Criterion) {
    use build_relay::content::checksum;

    let data = vec![0x5au8; 1024 * 1024];

    c.bench_function("checksum_1mib", |b| {
        b.iter(|| black_box(checksum(black_box(&data))))
    });
}

fn benchmark_include_expansion(c: &mut Criterion) {
    use build_relay::walker::{FileSet, SymlinkWalker};

    let dir = tempfile::tempdir().unwrap();
    for d in 0..20 {
        let sub = dir.path().join("inc").join(format!("mod{}", d));
        fs::create_dir_all(&sub).unwrap();
        for f in 0..50 {
            fs::write(sub.join(format!("header{}.h", f)), "#pragma once\n").unwrap();
        }
    }

    let walker = SymlinkWalker::new(dir.path());

    c.bench_function("expand_include_1000_files", |b| {
        b.iter(|| {
            let mut files = FileSet::new();
            walker.expand_include("inc", &mut files).unwrap();
            black_box(files.len())
        })
    });
}

criterion_group!(
    benches,
    benchmark_normalize_rule,
    benchmark_checksum,
    benchmark_include_expansion
);
criterion_main!(benches);
