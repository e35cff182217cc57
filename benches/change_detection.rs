//! Change detection benchmark suite.
//!
//! Measures mutation classification throughput:
//! - Batch sizes: 10, 100, 1000 records
//! - Text depths: 1, 8, 15 levels below the marked element
//!
//! Run with: cargo bench --bench change_detection
//! Results saved to: target/criterion/

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use domsync::client::{ChangeDetector, DomNode, MemoryNode, MutationRecord};
use domsync::ClientConfig;

// ============================================================================
// Benchmark Parameters
// ============================================================================

const BATCH_SIZES: &[usize] = &[10, 100, 1000];
const TEXT_DEPTHS: &[usize] = &[1, 8, 15];

// ============================================================================
// Fixtures
// ============================================================================

fn tracked(id: &str) -> Arc<MemoryNode> {
    let node = MemoryNode::element("div");
    node.set_attribute("uielement", id).expect("marker");
    node
}

/// Returns the marked root (keeps the tree alive) and a text node `depth`
/// levels below it.
fn text_at_depth(depth: usize) -> (Arc<MemoryNode>, Arc<MemoryNode>) {
    let root = tracked("root");
    let mut parent = Arc::clone(&root);
    for _ in 1..depth {
        let div = MemoryNode::element("div");
        parent.append_child(&div);
        parent = div;
    }
    let text = MemoryNode::text("x");
    parent.append_child(&text);
    (root, text)
}

fn mixed_batch(size: usize) -> (Vec<Arc<MemoryNode>>, Vec<MutationRecord>) {
    let mut keep = Vec::with_capacity(size);
    let mut records = Vec::with_capacity(size);

    for i in 0..size {
        let node = tracked(&format!("el{}", i % 16));
        records.push(match i % 3 {
            0 => MutationRecord::attributes(node.as_node(), "class"),
            1 => MutationRecord::child_list(node.as_node()),
            _ => {
                let text = MemoryNode::text("t");
                node.append_child(&text);
                MutationRecord::character_data(text.as_node())
            }
        });
        keep.push(node);
    }

    (keep, records)
}

// ============================================================================
// Benchmark: Batch Classification
// ============================================================================

fn bench_batches(c: &mut Criterion) {
    let plain = ChangeDetector::new(&ClientConfig::new());
    let coalesced = ChangeDetector::new(&ClientConfig::new().with_coalesced_mutations());

    let mut group = c.benchmark_group("batch");

    for &size in BATCH_SIZES {
        let (_keep, records) = mixed_batch(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("plain", size), &records, |b, records| {
            b.iter(|| black_box(plain.process(records)));
        });
        group.bench_with_input(BenchmarkId::new("coalesced", size), &records, |b, records| {
            b.iter(|| black_box(coalesced.process(records)));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Ancestor Walk
// ============================================================================

fn bench_ancestor_walk(c: &mut Criterion) {
    let detector = ChangeDetector::new(&ClientConfig::new());

    let mut group = c.benchmark_group("character_data");

    for &depth in TEXT_DEPTHS {
        let (_root, text) = text_at_depth(depth);
        let record = [MutationRecord::character_data(text.as_node())];

        group.bench_with_input(BenchmarkId::new("depth", depth), &record, |b, record| {
            b.iter(|| black_box(detector.process(record)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_batches, bench_ancestor_walk);
criterion_main!(benches);
