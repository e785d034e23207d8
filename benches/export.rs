//! Benchmarks for document export.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use markflow::export::{ExportFormat, ExportOptions, export};

fn sample_document(sections: usize) -> String {
    let mut md = String::from("# Benchmark\n\n");
    for i in 0..sections {
        md.push_str(&format!(
            "## Section {i}\n\nSome *emphasis*, **strong** text and `code`.\n\n\
             - item one\n- item two\n  - nested\n\n\
             | a | b |\n|---|---|\n| {i} | {i} |\n\n\
             ```rust\nfn section_{i}() -> usize {{ {i} }}\n```\n\n"
        ));
    }
    md
}

fn bench_export_small(c: &mut Criterion) {
    let md = "# Hello\n\nWorld";
    let options = ExportOptions::default();
    c.bench_function("export_html_small", |b| {
        b.iter(|| export(black_box(md), ExportFormat::Html, &options).unwrap())
    });
}

fn bench_export_formats(c: &mut Criterion) {
    let md = sample_document(50);
    let options = ExportOptions::default();
    for format in [ExportFormat::Html, ExportFormat::PlainText, ExportFormat::Pdf] {
        c.bench_function(&format!("export_{format}_large"), |b| {
            b.iter(|| export(black_box(&md), format, &options).unwrap())
        });
    }
}

criterion_group!(benches, bench_export_small, bench_export_formats);
criterion_main!(benches);
