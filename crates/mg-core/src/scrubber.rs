//! Text scrubbing
//!
//! Rewrites every occurrence of a blocklist entry in a string, either with a
//! freshly drawn replacement phrase or with nothing.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use regex::{Captures, Regex, RegexBuilder};

use crate::blocklist::{BlockList, HashedBlockList};
use crate::config::FilterConfig;
use crate::hash::{cache_key, fold_word, word_spans};
use crate::matcher::{matches_hashed_words, matches_plain};
use crate::types::{ReplacementMode, ScrubResult};

/// Phrases used when the user has not configured any.
pub const DEFAULT_PHRASES: &[&str] = &[
    "kindness",
    "sunshine",
    "deep breath",
    "gratitude",
    "calm waters",
    "a gentle walk",
    "fresh air",
    "good company",
];

/// How many times a phrase is redrawn when it would itself be blocked.
const MAX_REDRAWS: usize = 3;

// Compiled patterns grow with the list; a blocklist is a few thousand entries at most
const PATTERN_SIZE_LIMIT: usize = 32 * 1024 * 1024;

// =============================================================================
// Phrase Sources
// =============================================================================

/// Supplies replacement phrases, one per replaced occurrence.
pub trait PhraseSource {
    fn next_phrase(&mut self) -> String;
}

impl<F> PhraseSource for F
where
    F: FnMut() -> String,
{
    fn next_phrase(&mut self) -> String {
        self()
    }
}

/// Uniformly random choice from a phrase list.
pub struct RandomPhrases {
    phrases: Vec<String>,
    rng: StdRng,
}

impl RandomPhrases {
    /// Falls back to `DEFAULT_PHRASES` when `phrases` is empty.
    pub fn new(phrases: &[String]) -> Self {
        Self::with_rng(phrases, StdRng::from_entropy())
    }

    pub fn seeded(phrases: &[String], seed: u64) -> Self {
        Self::with_rng(phrases, StdRng::seed_from_u64(seed))
    }

    fn with_rng(phrases: &[String], rng: StdRng) -> Self {
        let phrases = if phrases.is_empty() {
            DEFAULT_PHRASES.iter().map(|p| p.to_string()).collect()
        } else {
            phrases.to_vec()
        };
        Self { phrases, rng }
    }

    /// Phrases from a config.
    pub fn for_config(config: &FilterConfig) -> Self {
        Self::new(&config.replacement_phrases)
    }
}

impl PhraseSource for RandomPhrases {
    fn next_phrase(&mut self) -> String {
        self.phrases.choose(&mut self.rng).cloned().unwrap_or_default()
    }
}

// =============================================================================
// Scrubber
// =============================================================================

struct CompiledPattern {
    fingerprint: u64,
    regex: Option<Regex>,
}

/// Scrubs text against a blocklist. Keeps the compiled pattern of the last
/// plaintext list it saw.
#[derive(Default)]
pub struct Scrubber {
    compiled: Option<CompiledPattern>,
}

impl Scrubber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every blocklist occurrence in `text`.
    pub fn scrub(
        &mut self,
        text: &str,
        list: &BlockList,
        config: &FilterConfig,
        phrases: &mut dyn PhraseSource,
    ) -> ScrubResult {
        if !config.enabled || list.is_empty() || text.is_empty() {
            return ScrubResult::unchanged(text);
        }

        let mode = config.replacement_mode;
        match list {
            BlockList::Plain(plain) => {
                let entries = plain.entries();
                let regex = match self.pattern_for(entries) {
                    Some(regex) => regex,
                    None => return ScrubResult::unchanged(text),
                };
                let mut count = 0usize;
                let scrubbed = regex.replace_all(text, |_: &Captures<'_>| {
                    count += 1;
                    draw(mode, phrases, |p| matches_plain(p, entries))
                });
                if count == 0 {
                    return ScrubResult::unchanged(text);
                }
                ScrubResult {
                    text: scrubbed.into_owned(),
                    match_count: count,
                }
            }
            BlockList::Hashed(hashed) => scrub_hashed(text, hashed, mode, phrases),
        }
    }

    fn pattern_for(&mut self, entries: &[String]) -> Option<&Regex> {
        let fingerprint = cache_key(&entries.join("\n"));
        let stale = self
            .compiled
            .as_ref()
            .map_or(true, |c| c.fingerprint != fingerprint);

        if stale {
            self.compiled = Some(CompiledPattern {
                fingerprint,
                regex: build_pattern(entries),
            });
        }

        self.compiled.as_ref().and_then(|c| c.regex.as_ref())
    }
}

/// One alternation over all entries, longest first so overlapping entries
/// resolve to the longest phrase.
fn build_pattern(entries: &[String]) -> Option<Regex> {
    let mut sorted: Vec<&str> = entries.iter().map(String::as_str).collect();
    sorted.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let alternation = sorted
        .iter()
        .map(|e| regex::escape(e))
        .collect::<Vec<_>>()
        .join("|");

    match RegexBuilder::new(&alternation)
        .case_insensitive(true)
        .size_limit(PATTERN_SIZE_LIMIT)
        .build()
    {
        Ok(regex) => Some(regex),
        Err(e) => {
            log::warn!("blocklist pattern failed to compile, scrubbing disabled: {}", e);
            None
        }
    }
}

/// Draw the replacement for one occurrence. A phrase that would itself be
/// blocked is redrawn, then dropped.
fn draw(mode: ReplacementMode, phrases: &mut dyn PhraseSource, is_blocked: impl Fn(&str) -> bool) -> String {
    if mode == ReplacementMode::Erase {
        return String::new();
    }
    for _ in 0..MAX_REDRAWS {
        let phrase = phrases.next_phrase();
        if !is_blocked(&phrase) {
            return phrase;
        }
    }
    String::new()
}

/// Greedy word-window replacement against a hashed list: at each word the
/// longest matching window wins.
fn scrub_hashed(
    text: &str,
    list: &HashedBlockList,
    mode: ReplacementMode,
    phrases: &mut dyn PhraseSource,
) -> ScrubResult {
    let spans = word_spans(text);
    let words: Vec<String> = spans
        .iter()
        .map(|&(start, end)| fold_word(&text[start..end]))
        .collect();

    let mut out = String::with_capacity(text.len());
    let mut copied_to = 0;
    let mut count = 0;
    let mut i = 0;

    while i < words.len() {
        let longest = (1..=list.max_words().min(words.len() - i))
            .rev()
            .find(|&len| list.contains_normalized(&words[i..i + len].join(" ")));

        match longest {
            Some(len) => {
                let start = spans[i].0;
                let end = spans[i + len - 1].1;
                out.push_str(&text[copied_to..start]);
                out.push_str(&draw(mode, phrases, |p| matches_hashed_words(p, list)));
                copied_to = end;
                count += 1;
                i += len;
            }
            None => i += 1,
        }
    }

    if count == 0 {
        return ScrubResult::unchanged(text);
    }
    out.push_str(&text[copied_to..]);

    ScrubResult {
        text: out,
        match_count: count,
    }
}
