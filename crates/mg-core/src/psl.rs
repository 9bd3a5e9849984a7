//! Registrable-domain heuristics for site matching
//!
//! Hashed site lists cannot be substring-searched, so a host is checked by
//! walking its suffixes from the full host down to the registrable domain
//! (eTLD+1). No public suffix data is shipped; a short table of common
//! two-part suffixes covers the cases that matter for a personal blocklist.
//!
//! # Examples
//!
//! ```
//! use mg_core::psl::get_etld1;
//!
//! assert_eq!(get_etld1("m.casino.example"), "casino.example");
//! assert_eq!(get_etld1("www.bets.co.uk"), "bets.co.uk");
//! ```

/// Second-level suffixes under which registrations happen one label deeper.
const TWO_LABEL_SUFFIXES: &[&str] = &[
    "ac.jp", "ac.uk", "co.in", "co.jp", "co.kr", "co.nz", "co.uk", "co.za", "com.au", "com.br", "com.cn",
    "com.hk", "com.mx", "com.tw", "gov.au", "gov.uk", "ne.jp", "net.au", "net.nz", "or.jp", "org.au", "org.uk",
];

/// Number of trailing labels that make up the registrable domain of `host`.
fn registrable_labels(host: &str) -> usize {
    let mut tail = host.rsplit('.');
    let (Some(tld), Some(sld)) = (tail.next(), tail.next()) else {
        return 1;
    };
    let suffix_len = tld.len() + sld.len() + 1;
    if TWO_LABEL_SUFFIXES.contains(&&host[host.len() - suffix_len..]) {
        3
    } else {
        2
    }
}

/// The registrable domain (eTLD+1) of a host, lowercased. Hosts with no
/// more labels than that come back whole.
pub fn get_etld1(host: &str) -> String {
    let host = host.trim_end_matches('.').to_lowercase();
    let keep = registrable_labels(&host);
    match host.rmatch_indices('.').nth(keep - 1) {
        Some((idx, _)) => host[idx + 1..].to_string(),
        None => host,
    }
}

/// `host` without its leftmost label.
pub fn get_parent_domain(host: &str) -> Option<&str> {
    let (_, parent) = host.split_once('.')?;
    if parent.is_empty() {
        None
    } else {
        Some(parent)
    }
}

/// Suffixes of a host, most specific first, ending at its registrable
/// domain.
pub struct HostSuffixIter<'a> {
    next: Option<&'a str>,
    floor: usize,
}

impl<'a> Iterator for HostSuffixIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.next = get_parent_domain(current).filter(|parent| parent.len() >= self.floor);
        Some(current)
    }
}

pub fn walk_host_suffixes(host: &str) -> HostSuffixIter<'_> {
    let host = host.trim_end_matches('.');
    HostSuffixIter {
        next: Some(host).filter(|h| !h.is_empty()),
        floor: get_etld1(host).len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registrable_domain_of_plain_hosts() {
        assert_eq!(get_etld1("casino.example"), "casino.example");
        assert_eq!(get_etld1("cdn.static.casino.example"), "casino.example");
        assert_eq!(get_etld1("WWW.Casino.Example."), "casino.example");
        assert_eq!(get_etld1("localhost"), "localhost");
    }

    #[test]
    fn registrable_domain_under_two_label_suffix() {
        assert_eq!(get_etld1("bets.co.uk"), "bets.co.uk");
        assert_eq!(get_etld1("m.bets.co.uk"), "bets.co.uk");
        assert_eq!(get_etld1("co.uk"), "co.uk");
    }

    #[test]
    fn parent_domain_strips_one_label() {
        assert_eq!(get_parent_domain("m.casino.example"), Some("casino.example"));
        assert_eq!(get_parent_domain("casino.example"), Some("example"));
        assert_eq!(get_parent_domain("example"), None);
        assert_eq!(get_parent_domain("example."), None);
        assert_eq!(get_parent_domain(""), None);
    }

    #[test]
    fn suffix_walk_stops_at_registrable_domain() {
        let suffixes: Vec<&str> = walk_host_suffixes("a.b.casino.example").collect();
        assert_eq!(suffixes, vec!["a.b.casino.example", "b.casino.example", "casino.example"]);

        let suffixes: Vec<&str> = walk_host_suffixes("www.bets.co.uk").collect();
        assert_eq!(suffixes, vec!["www.bets.co.uk", "bets.co.uk"]);

        let suffixes: Vec<&str> = walk_host_suffixes("localhost").collect();
        assert_eq!(suffixes, vec!["localhost"]);

        assert_eq!(walk_host_suffixes("").count(), 0);
    }
}
