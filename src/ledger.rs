use chrono::{DateTime, Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, MutexGuard};

use crate::store::{load_or_default, save_document, KvStore, PROGRESS_KEY};

/// One finished session. Never edited after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedWorkoutRecord {
    pub workout_id: String,
    pub completed_at: DateTime<Local>,
    pub duration_minutes: u32,
    pub calories_burned: u32,
    pub rounds_completed: u32,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum Achievement {
    #[strum(serialize = "First Bell")]
    FirstWorkout,
    #[strum(serialize = "Ten Down")]
    TenWorkouts,
    #[strum(serialize = "Fifty Strong")]
    FiftyWorkouts,
    #[strum(serialize = "Calorie Crusher")]
    CalorieCrusher,
    #[strum(serialize = "Inferno")]
    Inferno,
    #[strum(serialize = "Hour of Power")]
    HourOfPower,
    #[strum(serialize = "Iron Will")]
    IronWill,
    #[strum(serialize = "Three-Day Streak")]
    ThreeDayStreak,
    #[strum(serialize = "Week Warrior")]
    WeekWarrior,
    #[strum(serialize = "Month of Fire")]
    MonthOfFire,
}

impl Achievement {
    pub const ALL: [Achievement; 10] = [
        Achievement::FirstWorkout,
        Achievement::TenWorkouts,
        Achievement::FiftyWorkouts,
        Achievement::CalorieCrusher,
        Achievement::Inferno,
        Achievement::HourOfPower,
        Achievement::IronWill,
        Achievement::ThreeDayStreak,
        Achievement::WeekWarrior,
        Achievement::MonthOfFire,
    ];

    pub fn description(&self) -> &'static str {
        match self {
            Achievement::FirstWorkout => "Complete your first workout",
            Achievement::TenWorkouts => "Complete 10 workouts",
            Achievement::FiftyWorkouts => "Complete 50 workouts",
            Achievement::CalorieCrusher => "Burn 1,000 calories in total",
            Achievement::Inferno => "Burn 5,000 calories in total",
            Achievement::HourOfPower => "Train for 60 minutes in total",
            Achievement::IronWill => "Train for 600 minutes in total",
            Achievement::ThreeDayStreak => "Train 3 days in a row",
            Achievement::WeekWarrior => "Train 7 days in a row",
            Achievement::MonthOfFire => "Train 30 days in a row",
        }
    }

    pub fn is_earned(&self, agg: &ProgressAggregate) -> bool {
        match self {
            Achievement::FirstWorkout => agg.workouts_completed >= 1,
            Achievement::TenWorkouts => agg.workouts_completed >= 10,
            Achievement::FiftyWorkouts => agg.workouts_completed >= 50,
            Achievement::CalorieCrusher => agg.calories_burned >= 1_000,
            Achievement::Inferno => agg.calories_burned >= 5_000,
            Achievement::HourOfPower => agg.total_time_minutes >= 60,
            Achievement::IronWill => agg.total_time_minutes >= 600,
            Achievement::ThreeDayStreak => agg.longest_streak >= 3,
            Achievement::WeekWarrior => agg.longest_streak >= 7,
            Achievement::MonthOfFire => agg.longest_streak >= 30,
        }
    }
}

/// Running totals derived from the records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressAggregate {
    pub workouts_completed: u32,
    pub total_time_minutes: u32,
    pub calories_burned: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_workout_date: Option<NaiveDate>,
    pub achievements: BTreeSet<Achievement>,
}

impl ProgressAggregate {
    /// Fold one record in and return the achievements it unlocked.
    fn apply(&mut self, record: &CompletedWorkoutRecord) -> Vec<Achievement> {
        self.workouts_completed += 1;
        self.total_time_minutes += record.duration_minutes;
        self.calories_burned += record.calories_burned;

        let day = record.completed_at.date_naive();
        self.current_streak = match self.last_workout_date {
            None => 1,
            Some(last) if day <= last => self.current_streak.max(1),
            Some(last) if day - last == Duration::days(1) => self.current_streak + 1,
            Some(_) => 1,
        };
        self.longest_streak = self.longest_streak.max(self.current_streak);
        self.last_workout_date = self.last_workout_date.max(Some(day));

        let unlocked: Vec<Achievement> = Achievement::ALL
            .into_iter()
            .filter(|a| !self.achievements.contains(a) && a.is_earned(self))
            .collect();
        self.achievements.extend(unlocked.iter().copied());
        unlocked
    }

    /// Streak as of `today`: a streak survives until a full day is missed.
    pub fn live_streak(&self, today: NaiveDate) -> u32 {
        match self.last_workout_date {
            Some(last) if today - last <= Duration::days(1) => self.current_streak,
            _ => 0,
        }
    }
}

/// Append-only history plus its cached aggregate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ledger {
    pub records: Vec<CompletedWorkoutRecord>,
    pub aggregate: ProgressAggregate,
}

impl Ledger {
    /// Recompute the aggregate from scratch. Unlocked achievements are kept.
    pub fn rebuild(records: Vec<CompletedWorkoutRecord>, unlocked: &BTreeSet<Achievement>) -> Self {
        let mut aggregate = ProgressAggregate::default();
        for record in &records {
            aggregate.apply(record);
        }
        aggregate.achievements.extend(unlocked.iter().copied());
        Self { records, aggregate }
    }

    pub fn append(&mut self, record: CompletedWorkoutRecord) -> Vec<Achievement> {
        let unlocked = self.aggregate.apply(&record);
        self.records.push(record);
        unlocked
    }

    pub fn newest_first(&self) -> impl Iterator<Item = &CompletedWorkoutRecord> {
        self.records.iter().rev()
    }

    pub fn since(&self, cutoff: DateTime<Local>) -> Vec<&CompletedWorkoutRecord> {
        self.records
            .iter()
            .filter(|r| r.completed_at >= cutoff)
            .collect()
    }

    pub fn average_minutes(&self) -> Option<f64> {
        let minutes: Vec<f64> = self
            .records
            .iter()
            .map(|r| r.duration_minutes as f64)
            .collect();
        crate::util::mean(&minutes)
    }
}

/// Write records as CSV with a header row.
pub fn export_csv<'a, W, I>(records: I, writer: W) -> Result<(), csv::Error>
where
    W: io::Write,
    I: IntoIterator<Item = &'a CompletedWorkoutRecord>,
{
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Result of recording a completed session
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    pub record: CompletedWorkoutRecord,
    pub aggregate: ProgressAggregate,
    pub new_achievements: Vec<Achievement>,
    /// false when the write to storage failed; the in-memory ledger still advanced
    pub persisted: bool,
}

/// Owns the ledger and serializes every mutation through one lock.
///
/// Each mutation loads nothing new: the full ledger lives behind the mutex,
/// is changed in place and written back whole before the lock is released.
pub struct ProgressRepository<S: KvStore> {
    store: S,
    ledger: Mutex<Ledger>,
    subscribers: Mutex<Vec<Sender<ProgressAggregate>>>,
}

impl<S: KvStore> ProgressRepository<S> {
    /// Read the stored ledger. Missing or malformed data starts empty.
    pub fn load(store: S) -> Self {
        let stored: Ledger = load_or_default(&store, PROGRESS_KEY);
        let ledger = Ledger::rebuild(stored.records, &stored.aggregate.achievements);
        if ledger.aggregate != stored.aggregate {
            tracing::debug!("stored progress totals differed from records; rebuilt");
        }
        tracing::info!(records = ledger.records.len(), "progress loaded");
        Self {
            store,
            ledger: Mutex::new(ledger),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> Ledger {
        self.lock().clone()
    }

    pub fn aggregate(&self) -> ProgressAggregate {
        self.lock().aggregate.clone()
    }

    pub fn complete_session(
        &self,
        workout_id: &str,
        duration_minutes: u32,
        calories_burned: u32,
        rounds_completed: u32,
    ) -> RecordOutcome {
        self.complete_session_at(
            workout_id,
            duration_minutes,
            calories_burned,
            rounds_completed,
            Local::now(),
        )
    }

    pub fn complete_session_at(
        &self,
        workout_id: &str,
        duration_minutes: u32,
        calories_burned: u32,
        rounds_completed: u32,
        completed_at: DateTime<Local>,
    ) -> RecordOutcome {
        let record = CompletedWorkoutRecord {
            workout_id: workout_id.to_string(),
            completed_at,
            duration_minutes,
            calories_burned,
            rounds_completed,
        };

        let mut ledger = self.lock();
        let new_achievements = ledger.append(record.clone());
        let persisted = self.persist(&ledger);
        let aggregate = ledger.aggregate.clone();
        drop(ledger);

        tracing::info!(
            workout = workout_id,
            minutes = duration_minutes,
            calories = calories_burned,
            streak = aggregate.current_streak,
            "session recorded"
        );
        for a in &new_achievements {
            tracing::info!(achievement = %a, "achievement unlocked");
        }
        self.publish(&aggregate);

        RecordOutcome {
            record,
            aggregate,
            new_achievements,
            persisted,
        }
    }

    /// Drop all history. Calling it again is harmless.
    pub fn reset(&self) {
        let mut ledger = self.lock();
        *ledger = Ledger::default();
        if let Err(e) = self.store.delete(PROGRESS_KEY) {
            tracing::warn!("could not clear stored progress: {e}");
        }
        let aggregate = ledger.aggregate.clone();
        drop(ledger);
        tracing::info!("progress reset");
        self.publish(&aggregate);
    }

    /// Receive an aggregate snapshot after every mutation.
    pub fn subscribe(&self) -> Receiver<ProgressAggregate> {
        let (tx, rx) = mpsc::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(tx);
        rx
    }

    fn persist(&self, ledger: &Ledger) -> bool {
        match save_document(&self.store, PROGRESS_KEY, ledger) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("could not persist progress: {e}");
                false
            }
        }
    }

    fn publish(&self, aggregate: &ProgressAggregate) {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .retain(|tx| tx.send(aggregate.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryKvStore, StorageError};
    use chrono::TimeZone;
    use std::sync::Arc;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, 18, 0, 0).unwrap()
    }

    fn repo() -> ProgressRepository<Arc<MemoryKvStore>> {
        ProgressRepository::load(Arc::new(MemoryKvStore::new()))
    }

    #[test]
    fn first_completion_on_empty_ledger() {
        let repo = repo();
        let out = repo.complete_session("w1", 15, 240, 3);
        assert_eq!(out.aggregate.workouts_completed, 1);
        assert_eq!(out.aggregate.total_time_minutes, 15);
        assert_eq!(out.aggregate.calories_burned, 240);
        assert_eq!(out.aggregate.current_streak, 1);
        assert!(out.persisted);
        assert_eq!(out.new_achievements, vec![Achievement::FirstWorkout]);
        assert_eq!(repo.snapshot().records.len(), 1);
    }

    #[test]
    fn identical_completions_are_additive() {
        let repo = repo();
        repo.complete_session("w1", 15, 240, 3);
        let out = repo.complete_session("w1", 15, 240, 3);
        let ledger = repo.snapshot();
        assert_eq!(ledger.records.len(), 2);
        assert_eq!(out.aggregate.workouts_completed, 2);
        assert_eq!(out.aggregate.total_time_minutes, 30);
        assert_eq!(out.aggregate.calories_burned, 480);
    }

    #[test]
    fn streak_grows_on_consecutive_days_and_resets_after_gap() {
        let repo = repo();
        repo.complete_session_at("w", 10, 100, 1, at(2026, 3, 1));
        repo.complete_session_at("w", 10, 100, 1, at(2026, 3, 1));
        assert_eq!(repo.aggregate().current_streak, 1);
        repo.complete_session_at("w", 10, 100, 1, at(2026, 3, 2));
        let out = repo.complete_session_at("w", 10, 100, 1, at(2026, 3, 3));
        assert_eq!(out.aggregate.current_streak, 3);
        assert!(out.new_achievements.contains(&Achievement::ThreeDayStreak));

        let out = repo.complete_session_at("w", 10, 100, 1, at(2026, 3, 5));
        assert_eq!(out.aggregate.current_streak, 1);
        assert_eq!(out.aggregate.longest_streak, 3);
    }

    #[test]
    fn streak_crosses_month_boundary() {
        let repo = repo();
        repo.complete_session_at("w", 10, 100, 1, at(2026, 1, 31));
        let out = repo.complete_session_at("w", 10, 100, 1, at(2026, 2, 1));
        assert_eq!(out.aggregate.current_streak, 2);
    }

    #[test]
    fn live_streak_decays_after_missed_day() {
        let repo = repo();
        repo.complete_session_at("w", 10, 100, 1, at(2026, 3, 1));
        repo.complete_session_at("w", 10, 100, 1, at(2026, 3, 2));
        let agg = repo.aggregate();
        let day = |d| NaiveDate::from_ymd_opt(2026, 3, d).unwrap();
        assert_eq!(agg.live_streak(day(2)), 2);
        assert_eq!(agg.live_streak(day(3)), 2);
        assert_eq!(agg.live_streak(day(4)), 0);
    }

    #[test]
    fn totals_always_equal_fold_over_records() {
        let store = Arc::new(MemoryKvStore::new());
        let repo = ProgressRepository::load(store.clone());
        for i in 0..12 {
            repo.complete_session_at("w", 7, 95, 2, at(2026, 4, 1 + i));
        }
        let ledger = repo.snapshot();
        let sum_minutes: u32 = ledger.records.iter().map(|r| r.duration_minutes).sum();
        let sum_cal: u32 = ledger.records.iter().map(|r| r.calories_burned).sum();
        assert_eq!(ledger.aggregate.total_time_minutes, sum_minutes);
        assert_eq!(ledger.aggregate.calories_burned, sum_cal);
        assert_eq!(ledger.aggregate.workouts_completed, 12);
        assert!(ledger.aggregate.achievements.contains(&Achievement::TenWorkouts));
        assert!(ledger.aggregate.achievements.contains(&Achievement::CalorieCrusher));
        assert!(ledger.aggregate.achievements.contains(&Achievement::HourOfPower));
        assert!(ledger.aggregate.achievements.contains(&Achievement::WeekWarrior));
    }

    #[test]
    fn reload_rebuilds_stale_aggregate() {
        let store = Arc::new(MemoryKvStore::new());
        {
            let repo = ProgressRepository::load(store.clone());
            repo.complete_session("w1", 15, 240, 3);
            repo.complete_session("w2", 20, 300, 4);
        }
        // tamper with the cached totals
        let mut stored: Ledger = load_or_default(&*store, PROGRESS_KEY);
        stored.aggregate.calories_burned = 1;
        save_document(&*store, PROGRESS_KEY, &stored).unwrap();

        let repo = ProgressRepository::load(store);
        let agg = repo.aggregate();
        assert_eq!(agg.calories_burned, 540);
        assert_eq!(agg.workouts_completed, 2);
        assert!(agg.achievements.contains(&Achievement::FirstWorkout));
    }

    #[test]
    fn malformed_storage_loads_empty() {
        let store = Arc::new(MemoryKvStore::new());
        store.put(PROGRESS_KEY, "[[[").unwrap();
        let repo = ProgressRepository::load(store);
        assert_eq!(repo.snapshot(), Ledger::default());
    }

    #[test]
    fn reset_is_idempotent() {
        let store = Arc::new(MemoryKvStore::new());
        let repo = ProgressRepository::load(store.clone());
        repo.complete_session("w1", 15, 240, 3);
        repo.reset();
        repo.reset();
        assert_eq!(repo.snapshot(), Ledger::default());
        assert_eq!(store.get(PROGRESS_KEY).unwrap(), None);
        let reloaded = ProgressRepository::load(store);
        assert_eq!(reloaded.snapshot(), Ledger::default());
    }

    #[test]
    fn subscribers_see_every_mutation() {
        let repo = repo();
        let rx = repo.subscribe();
        repo.complete_session("w1", 15, 240, 3);
        repo.reset();
        assert_eq!(rx.try_recv().unwrap().workouts_completed, 1);
        assert_eq!(rx.try_recv().unwrap().workouts_completed, 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn concurrent_completions_do_not_lose_updates() {
        let repo = Arc::new(repo());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repo = repo.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        repo.complete_session("w", 1, 10, 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let ledger = repo.snapshot();
        assert_eq!(ledger.records.len(), 200);
        assert_eq!(ledger.aggregate.workouts_completed, 200);
        assert_eq!(ledger.aggregate.calories_burned, 2000);
    }

    struct FailingStore;

    impl KvStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Io(io::Error::other("disk gone")))
        }
        fn put(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Io(io::Error::other("disk gone")))
        }
        fn delete(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Io(io::Error::other("disk gone")))
        }
    }

    #[test]
    fn storage_failures_are_swallowed() {
        let repo = ProgressRepository::load(FailingStore);
        let out = repo.complete_session("w1", 15, 240, 3);
        assert!(!out.persisted);
        assert_eq!(out.aggregate.workouts_completed, 1);
        repo.reset();
    }

    #[test]
    fn history_queries_and_csv_export() {
        let repo = repo();
        repo.complete_session_at("old", 10, 100, 1, at(2026, 1, 1));
        repo.complete_session_at("new", 20, 200, 2, at(2026, 3, 1));
        let ledger = repo.snapshot();

        let newest: Vec<_> = ledger.newest_first().map(|r| r.workout_id.as_str()).collect();
        assert_eq!(newest, vec!["new", "old"]);
        assert_eq!(ledger.since(at(2026, 2, 1)).len(), 1);
        assert_eq!(ledger.average_minutes(), Some(15.0));

        let mut out = Vec::new();
        export_csv(&ledger.records, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "workout_id,completed_at,duration_minutes,calories_burned,rounds_completed"
        );
        assert!(lines.next().unwrap().starts_with("old,"));
        assert!(lines.next().unwrap().starts_with("new,"));
    }
}
