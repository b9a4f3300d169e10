use std::sync::Arc;

use chrono::{Duration, Local, TimeZone};
use ringside::catalog::ExerciseDef;
use ringside::coach::Coach;
use ringside::entitlement::StaticEntitlement;
use ringside::ledger::{Achievement, ProgressRepository};
use ringside::plan::CustomWorkout;
use ringside::profile::Stance;
use ringside::store::{KvStore, SqliteKvStore, PROGRESS_KEY};
use tempfile::tempdir;

#[test]
fn progress_survives_reopen() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("state").join("ringside.db");
    let day = Local.with_ymd_and_hms(2026, 3, 2, 18, 0, 0).unwrap();

    {
        let repo = ProgressRepository::load(SqliteKvStore::open(&db).unwrap());
        repo.complete_session_at("first-bell", 10, 150, 3, day);
        repo.complete_session_at("classic-rounds", 30, 350, 6, day + Duration::days(1));
        let out = repo.complete_session_at("first-bell", 10, 150, 3, day + Duration::days(2));
        assert!(out.persisted);
        assert_eq!(out.new_achievements, vec![Achievement::ThreeDayStreak]);
    }

    let repo = ProgressRepository::load(SqliteKvStore::open(&db).unwrap());
    let agg = repo.aggregate();
    assert_eq!(agg.workouts_completed, 3);
    assert_eq!(agg.total_time_minutes, 50);
    assert_eq!(agg.calories_burned, 650);
    assert_eq!(agg.current_streak, 3);
    assert_eq!(agg.longest_streak, 3);
    assert!(agg.achievements.contains(&Achievement::FirstWorkout));
    assert_eq!(repo.snapshot().records[1].workout_id, "classic-rounds");
}

#[test]
fn corrupt_progress_loads_as_empty() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("ringside.db");
    let store = SqliteKvStore::open(&db).unwrap();
    store.put(PROGRESS_KEY, "{ not json").unwrap();

    let repo = ProgressRepository::load(store);
    assert_eq!(repo.aggregate().workouts_completed, 0);
    let out = repo.complete_session("first-bell", 10, 150, 3);
    assert_eq!(out.aggregate.workouts_completed, 1);

    let reopened = ProgressRepository::load(SqliteKvStore::open(&db).unwrap());
    assert_eq!(reopened.aggregate().workouts_completed, 1);
}

#[test]
fn reset_clears_disk() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("ringside.db");
    {
        let repo = ProgressRepository::load(SqliteKvStore::open(&db).unwrap());
        repo.complete_session("first-bell", 10, 150, 3);
        repo.reset();
        repo.reset();
    }
    let store = SqliteKvStore::open(&db).unwrap();
    assert!(store.get(PROGRESS_KEY).unwrap().is_none());
    assert_eq!(ProgressRepository::load(store).aggregate().workouts_completed, 0);
}

#[test]
fn coach_keeps_profile_and_custom_workouts() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("ringside.db");
    let open = || {
        Coach::new(
            Arc::new(SqliteKvStore::open(&db).unwrap()),
            Box::new(StaticEntitlement(false)),
        )
    };

    let id = {
        let coach = open();
        coach
            .profile()
            .update(|p| {
                p.name = "Ali".into();
                p.stance = Stance::Southpaw;
            })
            .unwrap();
        coach
            .custom()
            .add(CustomWorkout {
                id: String::new(),
                name: "Lunch Rounds".into(),
                rounds: 2,
                rest_secs: 30,
                exercises: vec![ExerciseDef {
                    name: "Bag".into(),
                    duration_secs: 90,
                    combos: vec!["one-two".into()],
                }],
            })
            .unwrap()
            .id
    };
    assert_eq!(id, "custom-lunch-rounds");

    let coach = open();
    assert_eq!(coach.profile().get().name, "Ali");
    assert_eq!(coach.profile().get().stance, Stance::Southpaw);
    let plan = coach.resolve(&id).unwrap();
    assert_eq!(plan.total_secs(), 90 * 2 + 30);
}
