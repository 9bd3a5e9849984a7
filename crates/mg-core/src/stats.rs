//! Filter counters with a daily reset.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::config::StorageKey;
use crate::error::StorageError;
use crate::settings::SettingsStore;

/// Date format of `lastResetDate`.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Persisted filter counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterStats {
    pub lifetime: u64,
    pub today: u64,
    pub last_reset_date: Option<NaiveDate>,
}

impl FilterStats {
    /// Read the counters out of a settings map. Missing or mistyped values
    /// count as zero.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let count = |key: StorageKey| map.get(key.as_str()).and_then(Value::as_u64).unwrap_or(0);
        let last_reset_date = map
            .get(StorageKey::LastResetDate.as_str())
            .and_then(Value::as_str)
            .and_then(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok());

        Self {
            lifetime: count(StorageKey::LifetimeCount),
            today: count(StorageKey::TodayCount),
            last_reset_date,
        }
    }

    /// Counters as seen on `today`: the daily count is zero on a new day.
    pub fn as_of(self, today: NaiveDate) -> Self {
        if self.last_reset_date == Some(today) {
            return self;
        }
        Self {
            lifetime: self.lifetime,
            today: 0,
            last_reset_date: Some(today),
        }
    }

    /// Add `count` blocks on `today`.
    pub fn record(self, count: u32, today: NaiveDate) -> Self {
        let current = self.as_of(today);
        Self {
            lifetime: current.lifetime.saturating_add(u64::from(count)),
            today: current.today.saturating_add(u64::from(count)),
            last_reset_date: current.last_reset_date,
        }
    }

    /// The key/value pairs to persist.
    pub fn to_entries(&self) -> Vec<(StorageKey, Value)> {
        let date = self
            .last_reset_date
            .map(|d| Value::String(d.format(DATE_FORMAT).to_string()))
            .unwrap_or(Value::Null);
        vec![
            (StorageKey::LifetimeCount, Value::from(self.lifetime)),
            (StorageKey::TodayCount, Value::from(self.today)),
            (StorageKey::LastResetDate, date),
        ]
    }

    pub fn to_map(&self) -> Map<String, Value> {
        self.to_entries()
            .into_iter()
            .map(|(k, v)| (k.as_str().to_string(), v))
            .collect()
    }
}

/// Load, bump and save the counters in `store`.
pub fn record_blocks(
    store: &dyn SettingsStore,
    count: u32,
    today: NaiveDate,
) -> Result<FilterStats, StorageError> {
    let stats = FilterStats::from_map(&store.load()?).record(count, today);
    for (key, value) in stats.to_entries() {
        store.save(key.as_str(), value)?;
    }
    Ok(stats)
}

/// Today's date in local time.
pub fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}
