//! Storage seams for period history, cycle profiles and daily entries.
//!
//! The relational backend lives elsewhere; the service only depends on these
//! traits. [`MemoryStore`] backs the offline snapshot and the tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{CycleProfile, DailyLog, PeriodLog, Snapshot, SymptomLog};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store lock poisoned")]
    Poisoned,
}

pub trait PeriodLogStore: Send + Sync {
    /// Periods for `user`, most recent start first, at most `limit` of them.
    fn recent_periods(&self, user: Uuid, limit: Option<usize>)
        -> Result<Vec<PeriodLog>, StoreError>;

    fn period(&self, user: Uuid, id: Uuid) -> Result<Option<PeriodLog>, StoreError>;

    fn add_period(&self, user: Uuid, log: PeriodLog) -> Result<(), StoreError>;

    /// Record the end of an ongoing period. Returns false if `id` is unknown.
    fn set_period_end(&self, user: Uuid, id: Uuid, end: NaiveDate) -> Result<bool, StoreError>;

    /// Returns false if `id` is unknown.
    fn delete_period(&self, user: Uuid, id: Uuid) -> Result<bool, StoreError>;
}

pub trait CycleProfileStore: Send + Sync {
    fn profile(&self, user: Uuid) -> Result<Option<CycleProfile>, StoreError>;

    fn put_profile(&self, user: Uuid, profile: CycleProfile) -> Result<(), StoreError>;
}

/// Symptoms and the one-per-day mood/energy/sleep entry.
pub trait DailyLogStore: Send + Sync {
    /// Every symptom for `user`, oldest first.
    fn symptoms(&self, user: Uuid) -> Result<Vec<SymptomLog>, StoreError>;

    /// Log `name` on `date`, or remove it if it is already logged there.
    /// Returns whether the symptom is logged afterwards.
    fn toggle_symptom(&self, user: Uuid, date: NaiveDate, name: &str)
        -> Result<bool, StoreError>;

    /// Every daily entry for `user`, oldest first.
    fn daily_logs(&self, user: Uuid) -> Result<Vec<DailyLog>, StoreError>;

    /// Insert or replace the entry for `log.date`. Returns the replaced entry.
    fn upsert_daily_log(&self, user: Uuid, log: DailyLog)
        -> Result<Option<DailyLog>, StoreError>;
}

type DailyEntries = HashMap<Uuid, BTreeMap<NaiveDate, DailyLog>>;

/// Per-user maps held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    periods: Mutex<HashMap<Uuid, Vec<PeriodLog>>>,
    profiles: Mutex<HashMap<Uuid, CycleProfile>>,
    symptoms: Mutex<HashMap<Uuid, Vec<SymptomLog>>>,
    daily: Mutex<DailyEntries>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let store = Self::new();
        if let Ok(mut periods) = store.periods.lock() {
            periods.insert(snapshot.user_id, snapshot.period_logs.clone());
        }
        if let (Ok(mut profiles), Some(profile)) = (store.profiles.lock(), snapshot.profile) {
            profiles.insert(snapshot.user_id, profile);
        }
        if let Ok(mut symptoms) = store.symptoms.lock() {
            symptoms.insert(snapshot.user_id, snapshot.symptoms.clone());
        }
        if let Ok(mut daily) = store.daily.lock() {
            // Later duplicates for a date win, as they would under upsert.
            let entries = snapshot
                .daily_logs
                .iter()
                .map(|log| (log.date, log.clone()))
                .collect();
            daily.insert(snapshot.user_id, entries);
        }
        store
    }

    /// Copy the snapshot owner's current data back into `snapshot`.
    pub fn write_into(&self, snapshot: &mut Snapshot) -> Result<(), StoreError> {
        let user = snapshot.user_id;
        snapshot.period_logs = self.recent_periods(user, None)?;
        snapshot.profile = self.profile(user)?;
        snapshot.symptoms = self.symptoms(user)?;
        snapshot.daily_logs = self.daily_logs(user)?;
        Ok(())
    }

    fn periods(&self) -> Result<MutexGuard<'_, HashMap<Uuid, Vec<PeriodLog>>>, StoreError> {
        self.periods.lock().map_err(|_| StoreError::Poisoned)
    }

    fn profiles(&self) -> Result<MutexGuard<'_, HashMap<Uuid, CycleProfile>>, StoreError> {
        self.profiles.lock().map_err(|_| StoreError::Poisoned)
    }

    fn symptom_map(&self) -> Result<MutexGuard<'_, HashMap<Uuid, Vec<SymptomLog>>>, StoreError> {
        self.symptoms.lock().map_err(|_| StoreError::Poisoned)
    }

    fn daily(&self) -> Result<MutexGuard<'_, DailyEntries>, StoreError> {
        self.daily.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl PeriodLogStore for MemoryStore {
    fn recent_periods(
        &self,
        user: Uuid,
        limit: Option<usize>,
    ) -> Result<Vec<PeriodLog>, StoreError> {
        let periods = self.periods()?;
        let mut logs = periods.get(&user).cloned().unwrap_or_default();
        logs.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        if let Some(limit) = limit {
            logs.truncate(limit);
        }
        Ok(logs)
    }

    fn period(&self, user: Uuid, id: Uuid) -> Result<Option<PeriodLog>, StoreError> {
        let periods = self.periods()?;
        Ok(periods
            .get(&user)
            .and_then(|logs| logs.iter().find(|l| l.id == id))
            .cloned())
    }

    fn add_period(&self, user: Uuid, log: PeriodLog) -> Result<(), StoreError> {
        self.periods()?.entry(user).or_default().push(log);
        Ok(())
    }

    fn set_period_end(&self, user: Uuid, id: Uuid, end: NaiveDate) -> Result<bool, StoreError> {
        let mut periods = self.periods()?;
        let Some(log) = periods
            .get_mut(&user)
            .and_then(|logs| logs.iter_mut().find(|l| l.id == id))
        else {
            return Ok(false);
        };
        log.end_date = Some(end);
        Ok(true)
    }

    fn delete_period(&self, user: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let mut periods = self.periods()?;
        let Some(logs) = periods.get_mut(&user) else {
            return Ok(false);
        };
        let before = logs.len();
        logs.retain(|l| l.id != id);
        Ok(logs.len() != before)
    }
}

impl CycleProfileStore for MemoryStore {
    fn profile(&self, user: Uuid) -> Result<Option<CycleProfile>, StoreError> {
        Ok(self.profiles()?.get(&user).copied())
    }

    fn put_profile(&self, user: Uuid, profile: CycleProfile) -> Result<(), StoreError> {
        self.profiles()?.insert(user, profile);
        Ok(())
    }
}

impl DailyLogStore for MemoryStore {
    fn symptoms(&self, user: Uuid) -> Result<Vec<SymptomLog>, StoreError> {
        let mut symptoms = self.symptom_map()?.get(&user).cloned().unwrap_or_default();
        symptoms.sort_by_key(|s| s.date);
        Ok(symptoms)
    }

    fn toggle_symptom(
        &self,
        user: Uuid,
        date: NaiveDate,
        name: &str,
    ) -> Result<bool, StoreError> {
        let mut map = self.symptom_map()?;
        let symptoms = map.entry(user).or_default();
        let before = symptoms.len();
        symptoms.retain(|s| !(s.date == date && s.name == name));
        if symptoms.len() != before {
            return Ok(false);
        }
        symptoms.push(SymptomLog {
            date,
            name: name.to_string(),
        });
        Ok(true)
    }

    fn daily_logs(&self, user: Uuid) -> Result<Vec<DailyLog>, StoreError> {
        Ok(self
            .daily()?
            .get(&user)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default())
    }

    fn upsert_daily_log(
        &self,
        user: Uuid,
        log: DailyLog,
    ) -> Result<Option<DailyLog>, StoreError> {
        Ok(self.daily()?.entry(user).or_default().insert(log.date, log))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn periods_come_back_most_recent_first() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        for start in ["2024-01-01", "2024-02-26", "2024-01-29"] {
            store
                .add_period(user, PeriodLog::new(date(start), None))
                .unwrap();
        }
        let starts: Vec<NaiveDate> = store
            .recent_periods(user, Some(2))
            .unwrap()
            .iter()
            .map(|l| l.start_date)
            .collect();
        assert_eq!(starts, vec![date("2024-02-26"), date("2024-01-29")]);
        assert!(store.recent_periods(Uuid::new_v4(), None).unwrap().is_empty());
    }

    #[test]
    fn end_and_delete_report_unknown_ids() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let log = PeriodLog::new(date("2024-01-01"), None);
        let id = log.id;
        store.add_period(user, log).unwrap();

        assert!(store.set_period_end(user, id, date("2024-01-05")).unwrap());
        assert_eq!(
            store.period(user, id).unwrap().unwrap().end_date,
            Some(date("2024-01-05"))
        );
        assert!(!store
            .set_period_end(user, Uuid::new_v4(), date("2024-01-05"))
            .unwrap());

        assert!(store.delete_period(user, id).unwrap());
        assert!(!store.delete_period(user, id).unwrap());
    }

    #[test]
    fn toggling_a_symptom_twice_removes_it() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let day = date("2024-03-02");

        assert!(store.toggle_symptom(user, day, "Cramps").unwrap());
        assert!(store.toggle_symptom(user, day, "Bloating").unwrap());
        assert!(store.toggle_symptom(user, date("2024-03-03"), "Cramps").unwrap());
        assert!(!store.toggle_symptom(user, day, "Cramps").unwrap());

        let left: Vec<(NaiveDate, String)> = store
            .symptoms(user)
            .unwrap()
            .into_iter()
            .map(|s| (s.date, s.name))
            .collect();
        assert_eq!(
            left,
            vec![
                (day, "Bloating".to_string()),
                (date("2024-03-03"), "Cramps".to_string())
            ]
        );
    }

    #[test]
    fn daily_upsert_keeps_one_entry_per_date() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let mut first = DailyLog::new(date("2024-03-02"));
        first.energy_level = Some(2);
        let mut second = DailyLog::new(date("2024-03-02"));
        second.energy_level = Some(4);

        assert!(store.upsert_daily_log(user, first.clone()).unwrap().is_none());
        assert_eq!(store.upsert_daily_log(user, second.clone()).unwrap(), Some(first));
        store
            .upsert_daily_log(user, DailyLog::new(date("2024-03-01")))
            .unwrap();

        let logs = store.daily_logs(user).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].date, date("2024-03-01"));
        assert_eq!(logs[1], second);
    }

    #[test]
    fn snapshot_round_trips_through_store() {
        let user = Uuid::new_v4();
        let mut snapshot = Snapshot::new(user);
        snapshot.profile = Some(CycleProfile::new(date("2024-01-01")));
        snapshot.period_logs = vec![PeriodLog::new(date("2024-01-01"), None)];
        snapshot.daily_logs = vec![DailyLog::new(date("2024-01-02"))];

        let store = MemoryStore::from_snapshot(&snapshot);
        store
            .add_period(user, PeriodLog::new(date("2024-01-30"), None))
            .unwrap();
        store
            .toggle_symptom(user, date("2024-01-30"), "Cramps")
            .unwrap();
        store.write_into(&mut snapshot).unwrap();

        assert_eq!(snapshot.symptoms.len(), 1);
        assert_eq!(snapshot.daily_logs.len(), 1);
        assert_eq!(snapshot.period_logs.len(), 2);
        assert_eq!(snapshot.period_logs[0].start_date, date("2024-01-30"));
        assert!(snapshot.profile.is_some());
    }
}
