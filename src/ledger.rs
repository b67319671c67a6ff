use crate::dates::{date_key, days_in_month, is_same_month, parse_date_key};
use crate::model::EntityId;
use crate::storage::{KeyedStore, StoreError, StoreKey};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyStats {
    pub total_possible: usize,
    pub actual_completions: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HabitRate {
    pub completed_days: usize,
    pub rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayProgress {
    pub date: NaiveDate,
    pub completed_count: usize,
    pub total: usize,
    pub percentage: f64,
}

pub fn entry_key(habit_id: EntityId, date: NaiveDate) -> String {
    format!("{}-{}", habit_id, date_key(date))
}

fn split_key(key: &str) -> Option<(EntityId, NaiveDate)> {
    let (id, date) = key.split_once('-')?;
    Some((id.parse().ok()?, parse_date_key(date).ok()?))
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Sparse habit-by-day completion map. A missing key means "not done".
pub struct CompletionLedger {
    store: KeyedStore,
    entries: BTreeMap<String, bool>,
}

impl CompletionLedger {
    pub fn load(store: &KeyedStore) -> Self {
        let raw: BTreeMap<String, serde_json::Value> =
            store.load(StoreKey::HabitCompletions, BTreeMap::new);
        let entries = raw
            .into_iter()
            .filter_map(|(key, value)| match value.as_bool() {
                Some(done) => Some((key, done)),
                None => {
                    tracing::warn!(%key, %value, "dropping non-boolean completion entry");
                    None
                }
            })
            .collect();
        CompletionLedger {
            store: store.clone(),
            entries,
        }
    }

    pub fn is_complete(&self, habit_id: EntityId, date: NaiveDate) -> bool {
        self.entries
            .get(&entry_key(habit_id, date))
            .copied()
            .unwrap_or(false)
    }

    /// Flips one cell and returns its new state. Un-completing removes the key
    /// so the map stays sparse.
    pub fn toggle(&mut self, habit_id: EntityId, date: NaiveDate) -> Result<bool, StoreError> {
        let key = entry_key(habit_id, date);
        let done = if self.is_complete(habit_id, date) {
            self.entries.remove(&key);
            false
        } else {
            self.entries.insert(key, true);
            true
        };
        self.persist()?;
        Ok(done)
    }

    pub fn cascade_delete(&mut self, habit_id: EntityId) -> Result<usize, StoreError> {
        let prefix = format!("{}-", habit_id);
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(&prefix));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.persist()?;
        }
        tracing::debug!(habit_id, removed, "cascade-deleted completions");
        Ok(removed)
    }

    /// Completed `(habit, day)` pairs, skipping keys that do not parse.
    pub fn completed(&self) -> impl Iterator<Item = (EntityId, NaiveDate)> + '_ {
        self.entries
            .iter()
            .filter(|(_, done)| **done)
            .filter_map(|(key, _)| split_key(key))
    }

    pub fn monthly_stats(&self, habit_ids: &[EntityId], anchor: NaiveDate) -> MonthlyStats {
        let wanted: HashSet<EntityId> = habit_ids.iter().copied().collect();
        let total_possible = wanted.len() * days_in_month(anchor).len();
        let actual_completions = self
            .completed()
            .filter(|(id, date)| wanted.contains(id) && is_same_month(*date, anchor))
            .count();
        MonthlyStats {
            total_possible,
            actual_completions,
            percentage: percent(actual_completions, total_possible),
        }
    }

    /// How many of `days` the habit was completed on.
    pub fn completed_in_range(&self, habit_id: EntityId, days: &[NaiveDate]) -> usize {
        days.iter()
            .filter(|day| self.is_complete(habit_id, **day))
            .count()
    }

    pub fn completion_rate(&self, habit_id: EntityId, days: &[NaiveDate]) -> HabitRate {
        let completed_days = self.completed_in_range(habit_id, days);
        HabitRate {
            completed_days,
            rate: percent(completed_days, days.len()),
        }
    }

    pub fn daily_progress(&self, habit_ids: &[EntityId], days: &[NaiveDate]) -> Vec<DayProgress> {
        days.iter()
            .map(|date| {
                let completed_count = habit_ids
                    .iter()
                    .filter(|id| self.is_complete(**id, *date))
                    .count();
                DayProgress {
                    date: *date,
                    completed_count,
                    total: habit_ids.len(),
                    percentage: percent(completed_count, habit_ids.len()),
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn persist(&self) -> Result<(), StoreError> {
        self.store.save(StoreKey::HabitCompletions, &self.entries)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn toggle_twice_restores_original_state() {
        let store = KeyedStore::in_memory();
        let mut ledger = CompletionLedger::load(&store);
        let day = ymd(2024, 3, 5);
        assert!(!ledger.is_complete(1, day));
        assert!(ledger.toggle(1, day).unwrap());
        assert!(ledger.is_complete(1, day));
        assert!(!ledger.toggle(1, day).unwrap());
        assert!(!ledger.is_complete(1, day));
        assert_eq!(ledger.len(), 0);
    }

    #[test]
    fn toggles_persist_under_the_concatenated_key() {
        let store = KeyedStore::in_memory();
        let mut ledger = CompletionLedger::load(&store);
        ledger.toggle(1, ymd(2024, 3, 5)).unwrap();
        assert_eq!(
            store.raw(StoreKey::HabitCompletions).as_deref(),
            Some(r#"{"1-2024-03-05":true}"#)
        );
        let reloaded = CompletionLedger::load(&store);
        assert!(reloaded.is_complete(1, ymd(2024, 3, 5)));
    }

    #[test]
    fn legacy_false_entries_read_as_incomplete() {
        let store = KeyedStore::in_memory();
        store
            .save(
                StoreKey::HabitCompletions,
                &serde_json::json!({"1-2024-03-05": false, "1-2024-03-06": "yes"}),
            )
            .unwrap();
        let mut ledger = CompletionLedger::load(&store);
        assert!(!ledger.is_complete(1, ymd(2024, 3, 5)));
        assert!(!ledger.is_complete(1, ymd(2024, 3, 6)));
        assert!(ledger.toggle(1, ymd(2024, 3, 5)).unwrap());
    }

    #[test]
    fn cascade_delete_only_touches_one_habit() {
        let store = KeyedStore::in_memory();
        let mut ledger = CompletionLedger::load(&store);
        for day in 1..=5 {
            ledger.toggle(1, ymd(2024, 3, day)).unwrap();
            ledger.toggle(11, ymd(2024, 3, day)).unwrap();
        }
        assert_eq!(ledger.cascade_delete(1).unwrap(), 5);
        assert_eq!(ledger.completed().filter(|(id, _)| *id == 1).count(), 0);
        assert_eq!(ledger.completed().filter(|(id, _)| *id == 11).count(), 5);
        assert_eq!(ledger.cascade_delete(1).unwrap(), 0);
    }

    #[test]
    fn monthly_stats_with_no_habits_is_zero() {
        let ledger = CompletionLedger::load(&KeyedStore::in_memory());
        let stats = ledger.monthly_stats(&[], ymd(2024, 3, 1));
        assert_eq!(stats.total_possible, 0);
        assert_eq!(stats.percentage, 0.0);
    }

    #[test]
    fn monthly_stats_counts_only_month_and_known_habits() {
        let store = KeyedStore::in_memory();
        let mut ledger = CompletionLedger::load(&store);
        ledger.toggle(1, ymd(2024, 3, 1)).unwrap();
        ledger.toggle(2, ymd(2024, 3, 2)).unwrap();
        ledger.toggle(1, ymd(2024, 4, 1)).unwrap();
        ledger.toggle(3, ymd(2024, 3, 3)).unwrap();
        let stats = ledger.monthly_stats(&[1, 2], ymd(2024, 3, 20));
        assert_eq!(stats.total_possible, 62);
        assert_eq!(stats.actual_completions, 2);
        assert!((stats.percentage - 200.0 / 62.0).abs() < 1e-9);
    }

    #[test]
    fn rates_and_daily_progress() {
        let store = KeyedStore::in_memory();
        let mut ledger = CompletionLedger::load(&store);
        let days = days_in_month(ymd(2024, 2, 1));
        ledger.toggle(1, days[0]).unwrap();
        ledger.toggle(1, days[1]).unwrap();
        ledger.toggle(2, days[1]).unwrap();

        let rate = ledger.completion_rate(1, &days);
        assert_eq!(rate.completed_days, 2);
        assert!((rate.rate - 200.0 / 29.0).abs() < 1e-9);
        assert_eq!(ledger.completion_rate(1, &[]).rate, 0.0);
        assert_eq!(ledger.completed_in_range(2, &days[..1]), 0);

        let progress = ledger.daily_progress(&[1, 2], &days[..3]);
        assert_eq!(progress[0].completed_count, 1);
        assert_eq!(progress[1].completed_count, 2);
        assert_eq!(progress[1].percentage, 100.0);
        assert_eq!(progress[2].completed_count, 0);
        assert_eq!(progress[2].total, 2);
        assert_eq!(ledger.daily_progress(&[], &days[..1])[0].percentage, 0.0);
    }
}
