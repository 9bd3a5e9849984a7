//! Benchmarks for plaintext vs hashed matching and scrubbing.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mg_core::blocklist::{BlockList, EntryKind, HashedBlockList};
use mg_core::config::FilterConfig;
use mg_core::matcher::Matcher;
use mg_core::scrubber::Scrubber;
use mg_core::types::ReplacementMode;

const PARAGRAPH: &str = "The quick brown fox jumps over the lazy dog while reading \
    the morning news about markets, weather and sports results from last night";

fn phrases(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("blocked phrase {i}")).collect()
}

fn config_for(words: BlockList) -> FilterConfig {
    FilterConfig {
        blocked_words: words,
        replacement_mode: ReplacementMode::Erase,
        ..FilterConfig::default()
    }
}

fn bench_matches(c: &mut Criterion) {
    let mut group = c.benchmark_group("matches");

    for n in [10, 100, 1_000] {
        let entries = phrases(n);
        let plain = config_for(BlockList::words(&entries));
        let hashed = config_for(BlockList::Hashed(HashedBlockList::from_phrases(
            "bench-salt",
            &entries,
            EntryKind::Word,
        )));

        group.bench_function(BenchmarkId::new("plaintext", n), |b| {
            let mut matcher = Matcher::new();
            b.iter(|| matcher.matches(black_box(PARAGRAPH), &plain.blocked_words, &plain));
        });

        group.bench_function(BenchmarkId::new("hashed_uncached", n), |b| {
            let mut matcher = Matcher::new();
            b.iter(|| {
                matcher.invalidate();
                matcher.matches(black_box(PARAGRAPH), &hashed.blocked_words, &hashed)
            });
        });

        group.bench_function(BenchmarkId::new("hashed_cached", n), |b| {
            let mut matcher = Matcher::new();
            b.iter(|| matcher.matches(black_box(PARAGRAPH), &hashed.blocked_words, &hashed));
        });
    }

    group.finish();
}

fn bench_scrub(c: &mut Criterion) {
    let mut group = c.benchmark_group("scrub");
    let text = format!("{PARAGRAPH} blocked phrase 7 {PARAGRAPH}");

    for n in [10, 100, 1_000] {
        let config = config_for(BlockList::words(phrases(n)));
        group.bench_function(BenchmarkId::new("plaintext", n), |b| {
            let mut scrubber = Scrubber::new();
            let mut phrases = || String::new();
            b.iter(|| scrubber.scrub(black_box(&text), &config.blocked_words, &config, &mut phrases));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_matches, bench_scrub);
criterion_main!(benches);
