//! Navigation trace replay.
//!
//! A trace is a JSON array (or one JSON object per line) of timestamped
//! steps. Steps run against an interception authority on a manual clock,
//! so debounce behaviour is reproducible.

use std::rc::Rc;

use mg_core::authority::InterceptionAuthority;
use mg_core::clock::ManualClock;
use mg_core::host::{HostCall, RecordingHost};
use mg_core::interceptor::NavigationOutcome;
use mg_core::settings::MemoryStore;
use mg_core::types::{AuthorityMessage, NavigationEvent, NavigationPhase, TabId};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::lists::environment;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TraceStep {
    #[serde(rename_all = "camelCase")]
    Navigation {
        at: u64,
        tab_id: TabId,
        #[serde(default)]
        frame_id: i32,
        url: String,
        phase: NavigationPhase,
    },
    #[serde(rename_all = "camelCase")]
    Message { at: u64, tab_id: TabId, message: AuthorityMessage },
    #[serde(rename_all = "camelCase")]
    TabRemoved { at: u64, tab_id: TabId },
    Settings { at: u64, changes: Map<String, Value> },
}

impl TraceStep {
    fn at(&self) -> u64 {
        match self {
            Self::Navigation { at, .. }
            | Self::Message { at, .. }
            | Self::TabRemoved { at, .. }
            | Self::Settings { at, .. } => *at,
        }
    }
}

/// One replayed step and what it caused.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub at: u64,
    pub label: String,
    pub outcome: Option<NavigationOutcome>,
    pub calls: Vec<HostCall>,
}

#[derive(Debug, Clone, Default)]
pub struct ReplaySummary {
    pub steps: Vec<StepResult>,
    pub blocked: usize,
    pub counted: u32,
    pub redirects: usize,
}

pub fn parse_trace(text: &str) -> Result<Vec<TraceStep>, String> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).map_err(|e| format!("Invalid trace: {}", e));
    }
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| serde_json::from_str(line).map_err(|e| format!("Invalid trace line {}: {}", idx + 1, e)))
        .collect()
}

pub fn replay(settings: Map<String, Value>, steps: &[TraceStep]) -> ReplaySummary {
    let clock = Rc::new(ManualClock::new(0));
    let host = Rc::new(RecordingHost::new());
    let store = MemoryStore::with_map(settings);
    let mut authority =
        InterceptionAuthority::cold_start(&store, environment(), Box::new(Rc::clone(&host)), Box::new(Rc::clone(&clock)));

    let mut summary = ReplaySummary::default();
    for step in steps {
        clock.set(step.at());
        let (label, outcome) = match step {
            TraceStep::Navigation {
                tab_id,
                frame_id,
                url,
                phase,
                ..
            } => {
                let event = NavigationEvent::new(*tab_id, *frame_id, url.clone(), *phase);
                let outcome = authority.on_navigation(&event);
                (format!("tab {} {:?} {}", tab_id, phase, url), Some(outcome))
            }
            TraceStep::Message { tab_id, message, .. } => {
                let outcome = match authority.handle_message(*tab_id, message) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        log::debug!("message dropped: {}", e);
                        None
                    }
                };
                (format!("tab {} message {:?}", tab_id, message), outcome)
            }
            TraceStep::TabRemoved { tab_id, .. } => {
                authority.on_tab_removed(*tab_id);
                (format!("tab {} removed", tab_id), None)
            }
            TraceStep::Settings { changes, .. } => {
                let changed = authority.on_settings_changed(changes);
                (format!("settings changed {:?}", changed), None)
            }
        };

        if let Some(NavigationOutcome::Blocked { .. }) = &outcome {
            summary.blocked += 1;
        }
        summary.steps.push(StepResult {
            at: step.at(),
            label,
            outcome,
            calls: host.take_calls(),
        });
    }

    for step in &summary.steps {
        for call in &step.calls {
            match call {
                HostCall::IncrementStats(n) => summary.counted += n,
                HostCall::RedirectTab { .. } => summary.redirects += 1,
                _ => {}
            }
        }
    }
    summary
}
