//! [`HolidayProvider`] — rest-day answers with a per-month cache.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{Datelike, NaiveDate};
use mission_core::RestDayInfo;
use tracing::{debug, warn};

use crate::registry::{SpecialDay, SpecialDayRegistry};

/// Answers "is date D a rest day, and why" for the scheduler.
///
/// Whole months are fetched from the registry and cached for the process
/// lifetime (the registry is append-only within a year). On remote failure
/// the answer degrades to the weekday-only rule and is NOT cached, so a
/// later tick retries the registry. This type never errors: a degraded but
/// safe answer is preferred to blocking the scheduler.
pub struct HolidayProvider {
    registry: Arc<dyn SpecialDayRegistry>,
    /// Month entries keyed by `"{year}-{month:02}"`. Read-mostly; entries
    /// are immutable once inserted.
    cache: RwLock<HashMap<String, Vec<SpecialDay>>>,
}

impl HolidayProvider {
    pub fn new(registry: Arc<dyn SpecialDayRegistry>) -> Self {
        Self {
            registry,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Classify a date. Registry entries win over the weekday rule, so a
    /// holiday that falls on a Saturday reports its holiday kind.
    pub async fn rest_day_info(&self, date: NaiveDate) -> RestDayInfo {
        let entries = match self.month_entries(date.year(), date.month()).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(date = %date, error = %e, "registry unavailable, weekday-only fallback");
                return RestDayInfo::weekday_only(date);
            }
        };

        match entries.iter().find(|d| d.date == date) {
            Some(day) => RestDayInfo {
                date,
                is_rest_day: true,
                kind: day.kind,
                label: day.name.clone(),
            },
            None => RestDayInfo::weekday_only(date),
        }
    }

    /// Month entries, from cache or the registry.
    ///
    /// December and January are queried under both the current and the
    /// adjacent year: year-end special days are sometimes registered under
    /// either year's records. Results are merged and deduplicated by date.
    async fn month_entries(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<SpecialDay>, crate::registry::RegistryError> {
        let key = month_key(year, month);
        {
            let cache = self.cache.read().expect("holiday cache lock poisoned");
            if let Some(entries) = cache.get(&key) {
                return Ok(entries.clone());
            }
        }

        let years: &[i32] = match month {
            12 => &[year, year + 1],
            1 => &[year, year - 1],
            _ => &[year],
        };

        let mut merged: Vec<SpecialDay> = Vec::new();
        for &y in years {
            let fetched = self.registry.fetch_month(y, month).await?;
            for day in fetched {
                if day.date.month() == month && !merged.iter().any(|d| d.date == day.date) {
                    merged.push(day);
                }
            }
        }
        merged.sort_by_key(|d| d.date);
        debug!(key = %key, count = merged.len(), "cached special days for month");

        let mut cache = self.cache.write().expect("holiday cache lock poisoned");
        cache.insert(key, merged.clone());
        Ok(merged)
    }

    /// Number of cached months (diagnostics).
    pub fn cached_months(&self) -> usize {
        self.cache.read().expect("holiday cache lock poisoned").len()
    }
}

fn month_key(year: i32, month: u32) -> String {
    format!("{year}-{month:02}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryError;
    use async_trait::async_trait;
    use mission_core::RestDayKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory registry recording (year, month) fetches; can be told to fail.
    struct FakeRegistry {
        days: Vec<SpecialDay>,
        fail: std::sync::atomic::AtomicBool,
        calls: AtomicUsize,
        queried: Mutex<Vec<(i32, u32)>>,
    }

    impl FakeRegistry {
        fn new(days: Vec<SpecialDay>) -> Self {
            Self {
                days,
                fail: std::sync::atomic::AtomicBool::new(false),
                calls: AtomicUsize::new(0),
                queried: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SpecialDayRegistry for FakeRegistry {
        async fn fetch_month(
            &self,
            year: i32,
            month: u32,
        ) -> Result<Vec<SpecialDay>, RegistryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queried.lock().unwrap().push((year, month));
            if self.fail.load(Ordering::SeqCst) {
                return Err(RegistryError::Status(503));
            }
            Ok(self
                .days
                .iter()
                .filter(|d| d.date.year() == year && d.date.month() == month)
                .cloned()
                .collect())
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn chuseok() -> SpecialDay {
        SpecialDay {
            date: date(2025, 10, 6),
            name: "Chuseok".into(),
            kind: RestDayKind::PublicHoliday,
        }
    }

    #[tokio::test]
    async fn holiday_beats_weekday_rule() {
        let registry = Arc::new(FakeRegistry::new(vec![chuseok()]));
        let provider = HolidayProvider::new(registry);

        // 2025-10-06 is a Monday but is a registered holiday.
        let info = provider.rest_day_info(date(2025, 10, 6)).await;
        assert!(info.is_rest_day);
        assert_eq!(info.kind, RestDayKind::PublicHoliday);
        assert_eq!(info.label, "Chuseok");
    }

    #[tokio::test]
    async fn month_is_fetched_once() {
        let registry = Arc::new(FakeRegistry::new(vec![chuseok()]));
        let provider = HolidayProvider::new(registry.clone());

        provider.rest_day_info(date(2025, 10, 6)).await;
        provider.rest_day_info(date(2025, 10, 7)).await;
        provider.rest_day_info(date(2025, 10, 20)).await;

        assert_eq!(registry.calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.cached_months(), 1);
    }

    #[tokio::test]
    async fn failure_falls_back_and_is_not_cached() {
        let registry = Arc::new(FakeRegistry::new(vec![chuseok()]));
        registry.fail.store(true, Ordering::SeqCst);
        let provider = HolidayProvider::new(registry.clone());

        // Saturday: degraded answer still says rest day, but only Weekend.
        let info = provider.rest_day_info(date(2025, 10, 4)).await;
        assert!(info.is_rest_day);
        assert_eq!(info.kind, RestDayKind::Weekend);
        assert_eq!(provider.cached_months(), 0);

        // Registry recovers; the month is fetched on the next call.
        registry.fail.store(false, Ordering::SeqCst);
        let info = provider.rest_day_info(date(2025, 10, 6)).await;
        assert_eq!(info.kind, RestDayKind::PublicHoliday);
        assert_eq!(provider.cached_months(), 1);
    }

    #[tokio::test]
    async fn december_queries_adjacent_year() {
        let registry = Arc::new(FakeRegistry::new(vec![]));
        let provider = HolidayProvider::new(registry.clone());

        provider.rest_day_info(date(2025, 12, 25)).await;
        let queried = registry.queried.lock().unwrap().clone();
        assert_eq!(queried, vec![(2025, 12), (2026, 12)]);

        provider.rest_day_info(date(2026, 1, 1)).await;
        let queried = registry.queried.lock().unwrap().clone();
        assert_eq!(queried[2..], [(2026, 1), (2025, 1)]);
    }

    #[tokio::test]
    async fn plain_workday_is_not_rest() {
        let registry = Arc::new(FakeRegistry::new(vec![]));
        let provider = HolidayProvider::new(registry);

        let info = provider.rest_day_info(date(2025, 10, 8)).await;
        assert!(!info.is_rest_day);
        assert_eq!(info.kind, RestDayKind::None);
    }
}
