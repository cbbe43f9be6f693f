//! Reconcile benchmark: Measure the per-frame render cost.
//!
//! Simulates a response growing chunk by chunk and reconciles the full
//! HTML each time, against a from-scratch render for comparison.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use streamark::render::Signature;
use streamark::{Document, MarkdownSanitizer, PulldownSanitizer, ReconcilingRenderer};

/// Build a markdown document of `paragraphs` paragraphs.
fn sample_markdown(paragraphs: usize) -> String {
    let mut text = String::new();
    for i in 0..paragraphs {
        text.push_str(&format!(
            "Paragraph {i} talks about **streaming** and `reconciliation` at some length.\n\n"
        ));
        if i % 5 == 4 {
            text.push_str("```\nfn main() {\n    println!(\"hi\");\n}\n```\n\n");
        }
    }
    text
}

/// HTML snapshots of the text at each chunk boundary.
fn snapshots(text: &str, chunk: usize) -> Vec<String> {
    let sanitizer = PulldownSanitizer::new();
    let mut out = Vec::new();
    let mut end = chunk;
    while end < text.len() {
        while !text.is_char_boundary(end) {
            end += 1;
        }
        out.push(sanitizer.render(&text[..end]));
        end += chunk;
    }
    out.push(sanitizer.render(text));
    out
}

fn setup() -> (Document, ReconcilingRenderer) {
    let mut doc = Document::new();
    let root = doc.root();
    let container = doc.create_element("div");
    doc.append_child(root, container);
    (doc, ReconcilingRenderer::new(container))
}

fn stream_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_reconcile");
    for paragraphs in [10, 50] {
        let html = snapshots(&sample_markdown(paragraphs), 40);
        group.bench_with_input(BenchmarkId::new("reconcile", paragraphs), &html, |b, html| {
            b.iter(|| {
                let (mut doc, mut renderer) = setup();
                for snapshot in html {
                    renderer.update(&mut doc, black_box(snapshot));
                }
            });
        });
        group.bench_with_input(BenchmarkId::new("rebuild", paragraphs), &html, |b, html| {
            b.iter(|| {
                let (mut doc, mut renderer) = setup();
                for snapshot in html {
                    renderer.reset(&mut doc);
                    renderer.update(&mut doc, black_box(snapshot));
                }
            });
        });
    }
    group.finish();
}

fn identical_update(c: &mut Criterion) {
    let html = PulldownSanitizer::new().render(&sample_markdown(50));
    let (mut doc, mut renderer) = setup();
    renderer.update(&mut doc, &html);

    c.bench_function("update_identical_50", |b| {
        b.iter(|| renderer.update(&mut doc, black_box(&html)));
    });
}

fn signature(c: &mut Criterion) {
    let mut doc = Document::new();
    let p = doc.create_element("p");
    let text = doc.create_text("streaming ".repeat(1_000));
    doc.append_child(p, text);

    c.bench_function("signature_long_paragraph", |b| {
        b.iter(|| Signature::of(black_box(&doc), p));
    });
}

criterion_group!(benches, stream_reconcile, identical_update, signature);
criterion_main!(benches);
