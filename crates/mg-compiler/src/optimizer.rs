use std::collections::HashSet;

use mg_core::blocklist::EntryKind;
use mg_core::hash::normalize_phrase;
use mg_core::psl::get_parent_domain;
use mg_core::url::normalize_site;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeStats {
    pub before: usize,
    pub after: usize,
    /// Entries that normalized to nothing.
    pub invalid: usize,
    pub deduped: usize,
    /// Entries already covered by a shorter one.
    pub subsumed: usize,
}

/// Normalize entries in place, drop blanks and duplicates, and prune entries
/// a shorter entry already blocks.
///
/// A site is covered by any of its parent domains. A phrase is covered by
/// another phrase whose words appear in it as a contiguous run. Both rules
/// hold for plaintext and hashed matching, so the result is mode independent.
pub fn optimize_entries(entries: &mut Vec<String>, kind: EntryKind) -> OptimizeStats {
    let before = entries.len();

    let mut invalid = 0usize;
    let mut normalized = Vec::with_capacity(entries.len());
    for raw in entries.drain(..) {
        match normalize_entry(&raw, kind) {
            Some(entry) => normalized.push(entry),
            None => invalid += 1,
        }
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut deduped = 0usize;
    normalized.retain(|entry| {
        if seen.insert(entry.clone()) {
            true
        } else {
            deduped += 1;
            false
        }
    });

    let mut subsumed = 0usize;
    let kept: Vec<String> = match kind {
        EntryKind::Site => normalized
            .into_iter()
            .filter(|site| {
                let covered = site_is_covered(site, &seen);
                if covered {
                    log::trace!("pruning {} (parent domain listed)", site);
                    subsumed += 1;
                }
                !covered
            })
            .collect(),
        EntryKind::Word => {
            let phrases: Vec<String> = normalized.iter().map(|e| normalize_phrase(e)).collect();
            normalized
                .into_iter()
                .enumerate()
                .filter(|(idx, entry)| {
                    let covered = phrase_is_covered(*idx, &phrases);
                    if covered {
                        log::trace!("pruning '{}' (shorter phrase listed)", entry);
                        subsumed += 1;
                    }
                    !covered
                })
                .map(|(_, entry)| entry)
                .collect()
        }
    };

    *entries = kept;

    OptimizeStats {
        before,
        after: entries.len(),
        invalid,
        deduped,
        subsumed,
    }
}

fn normalize_entry(raw: &str, kind: EntryKind) -> Option<String> {
    match kind {
        EntryKind::Site => normalize_site(raw),
        EntryKind::Word => {
            let trimmed = raw.trim();
            if normalize_phrase(trimmed).is_empty() {
                None
            } else {
                Some(trimmed.to_lowercase())
            }
        }
    }
}

fn site_is_covered(site: &str, listed: &HashSet<String>) -> bool {
    let mut current = site;
    while let Some(parent) = get_parent_domain(current) {
        if listed.contains(parent) {
            return true;
        }
        current = parent;
    }
    false
}

fn phrase_is_covered(idx: usize, phrases: &[String]) -> bool {
    let phrase = &phrases[idx];
    let padded = format!(" {phrase} ");
    phrases.iter().enumerate().any(|(other_idx, other)| {
        other_idx != idx
            && !other.is_empty()
            && other.len() < phrase.len()
            && padded.contains(&format!(" {other} "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn prunes_subdomains_of_listed_sites() {
        let mut entries = owned(&[
            "https://www.Example.com/",
            "news.example.com",
            "example.com",
            "other.test",
            "https://",
            "deep.sub.other.test",
        ]);
        let stats = optimize_entries(&mut entries, EntryKind::Site);
        assert_eq!(entries, owned(&["example.com", "other.test"]));
        assert_eq!(stats.before, 6);
        assert_eq!(stats.invalid, 1);
        assert_eq!(stats.deduped, 1);
        assert_eq!(stats.subsumed, 2);
        assert_eq!(stats.after, 2);
    }

    #[test]
    fn prunes_phrases_containing_listed_words() {
        let mut entries = owned(&["Online Casino", "casino", "casinos", "poker night", "--"]);
        let stats = optimize_entries(&mut entries, EntryKind::Word);
        assert_eq!(entries, owned(&["casino", "casinos", "poker night"]));
        assert_eq!(stats.invalid, 1);
        assert_eq!(stats.subsumed, 1);
    }

    #[test]
    fn empty_input() {
        let mut entries = Vec::new();
        let stats = optimize_entries(&mut entries, EntryKind::Word);
        assert_eq!(stats, OptimizeStats::default());
    }
}
