//! Scan scheduling
//!
//! A pure state machine deciding when the page agent scans and what. The
//! host drives it with the current time and arms one timer for
//! [`ScanScheduler::next_deadline`].
//!
//! Triggers:
//! - early one-shot full scans at fixed delays after injection
//! - a quiet-period debounce after the last DOM mutation (node batch scan)
//! - a periodic full scan as a safety net
//! - explicit full scan requests (config change)
//!
//! Any two scans are at least `min_scan_interval_ms` apart. A due scan that
//! hits the floor is deferred, never dropped.

use serde::{Deserialize, Serialize};

/// Page agent timing knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentTiming {
    /// Delays after injection of the early full scans.
    pub early_scan_delays_ms: Vec<u64>,
    /// Quiet period after the last mutation before the batch is scanned.
    pub mutation_debounce_ms: u64,
    /// Period of the safety-net full scan.
    pub periodic_scan_ms: u64,
    /// Floor between any two scans.
    pub min_scan_interval_ms: u64,
    /// Cumulative scrubbed count that triggers the page's single
    /// "content filtered" notification.
    pub notify_threshold: u32,
}

impl Default for AgentTiming {
    fn default() -> Self {
        Self {
            early_scan_delays_ms: vec![0, 100, 500, 1_000],
            mutation_debounce_ms: 200,
            periodic_scan_ms: 3_000,
            min_scan_interval_ms: 250,
            notify_threshold: 5,
        }
    }
}

/// What to scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    /// The whole document.
    Full,
    /// Only the elements added since the last scan.
    Batch,
}

#[derive(Debug)]
pub struct ScanScheduler {
    timing: AgentTiming,
    injected_at: u64,
    /// Index of the next early scan not yet run.
    next_early: usize,
    mutation_deadline: Option<u64>,
    next_periodic: u64,
    full_requested: bool,
    last_scan: Option<u64>,
}

impl ScanScheduler {
    pub fn new(timing: AgentTiming, injected_at: u64) -> Self {
        let next_periodic = injected_at + timing.periodic_scan_ms;
        Self {
            timing,
            injected_at,
            next_early: 0,
            mutation_deadline: None,
            next_periodic,
            full_requested: false,
            last_scan: None,
        }
    }

    pub fn timing(&self) -> &AgentTiming {
        &self.timing
    }

    /// Record DOM insertions. Restarts the quiet period.
    pub fn note_mutation(&mut self, now: u64) {
        self.mutation_deadline = Some(now + self.timing.mutation_debounce_ms);
    }

    /// Ask for a full scan as soon as the floor allows.
    pub fn request_full(&mut self) {
        self.full_requested = true;
    }

    /// Whether a mutation batch is waiting.
    pub fn has_pending_batch(&self) -> bool {
        self.mutation_deadline.is_some()
    }

    /// The scan to run now, if any. Consumes the triggers it covers.
    pub fn poll(&mut self, now: u64) -> Option<ScanKind> {
        let early_due = self.early_deadline().map_or(false, |t| t <= now);
        let periodic_due = self.next_periodic <= now;
        let batch_due = self.mutation_deadline.map_or(false, |t| t <= now);

        if !(early_due || periodic_due || batch_due || self.full_requested) {
            return None;
        }
        if self.floor().map_or(false, |floor| now < floor) {
            return None;
        }

        self.last_scan = Some(now);
        if early_due || periodic_due || self.full_requested {
            // Every early delay already elapsed collapses into this one scan
            while self.early_deadline().map_or(false, |t| t <= now) {
                self.next_early += 1;
            }
            self.full_requested = false;
            self.mutation_deadline = None;
            self.next_periodic = now + self.timing.periodic_scan_ms;
            Some(ScanKind::Full)
        } else {
            self.mutation_deadline = None;
            Some(ScanKind::Batch)
        }
    }

    /// When [`poll`](Self::poll) should next be called.
    pub fn next_deadline(&self) -> Option<u64> {
        let trigger = [
            self.early_deadline(),
            self.mutation_deadline,
            Some(self.next_periodic),
            self.full_requested.then_some(0),
        ]
        .into_iter()
        .flatten()
        .min()?;

        Some(match self.floor() {
            Some(floor) => trigger.max(floor),
            None => trigger,
        })
    }

    fn early_deadline(&self) -> Option<u64> {
        self.timing
            .early_scan_delays_ms
            .get(self.next_early)
            .map(|delay| self.injected_at + delay)
    }

    fn floor(&self) -> Option<u64> {
        self.last_scan.map(|t| t + self.timing.min_scan_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(scheduler: &mut ScanScheduler, from: u64, to: u64) -> Vec<(u64, ScanKind)> {
        (from..=to)
            .filter_map(|t| scheduler.poll(t).map(|kind| (t, kind)))
            .collect()
    }

    #[test]
    fn test_early_scans_respect_floor() {
        let mut scheduler = ScanScheduler::new(AgentTiming::default(), 0);
        let scans = drain(&mut scheduler, 0, 1_200);
        // 100 is inside the floor after 0, so it runs at 250
        assert_eq!(
            scans,
            vec![(0, ScanKind::Full), (250, ScanKind::Full), (500, ScanKind::Full), (1_000, ScanKind::Full)]
        );
    }

    #[test]
    fn test_mutation_burst_scans_once() {
        let mut scheduler = ScanScheduler::new(AgentTiming::default(), 0);
        drain(&mut scheduler, 0, 1_999);

        for t in 2_000..2_050 {
            scheduler.note_mutation(t);
            assert_eq!(scheduler.poll(t), None);
        }
        let scans = drain(&mut scheduler, 2_050, 2_900);
        assert_eq!(scans, vec![(2_249, ScanKind::Batch)]);
    }

    #[test]
    fn test_periodic_full_scan() {
        let mut scheduler = ScanScheduler::new(AgentTiming::default(), 0);
        let scans = drain(&mut scheduler, 0, 6_500);
        let full_after_early: Vec<u64> = scans
            .iter()
            .filter(|(t, _)| *t > 1_000)
            .map(|(t, _)| *t)
            .collect();
        assert_eq!(full_after_early, vec![4_000]);
    }

    #[test]
    fn test_full_scan_absorbs_pending_batch() {
        let mut scheduler = ScanScheduler::new(AgentTiming::default(), 0);
        drain(&mut scheduler, 0, 1_000);
        scheduler.note_mutation(3_900);
        assert_eq!(scheduler.poll(4_000), Some(ScanKind::Full));
        assert!(!scheduler.has_pending_batch());
    }

    #[test]
    fn test_request_full_is_deferred_not_dropped() {
        let mut scheduler = ScanScheduler::new(AgentTiming::default(), 0);
        assert_eq!(scheduler.poll(0), Some(ScanKind::Full));
        scheduler.request_full();
        assert_eq!(scheduler.next_deadline(), Some(250));
        assert_eq!(scheduler.poll(10), None);
        assert_eq!(scheduler.poll(250), Some(ScanKind::Full));
    }

    #[test]
    fn test_next_deadline() {
        let mut scheduler = ScanScheduler::new(AgentTiming::default(), 1_000);
        assert_eq!(scheduler.next_deadline(), Some(1_000));
        scheduler.poll(1_000);
        assert_eq!(scheduler.next_deadline(), Some(1_250));
        scheduler.note_mutation(1_300);
        assert_eq!(scheduler.poll(1_250), Some(ScanKind::Full));
    }
}
