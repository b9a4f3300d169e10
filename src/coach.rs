use std::sync::mpsc::Sender;
use std::sync::Arc;
use thiserror::Error;

use crate::catalog::Catalog;
use crate::clock::Clock;
use crate::custom::CustomWorkoutRepository;
use crate::entitlement::EntitlementProvider;
use crate::ledger::{ProgressRepository, RecordOutcome};
use crate::plan::{PlanError, WorkoutPlan, WorkoutSource};
use crate::profile::ProfileRepository;
use crate::runner::SessionRunner;
use crate::runtime::CoachEvent;
use crate::session::CompletionEvent;
use crate::store::KvStore;

pub type SharedStore = Arc<dyn KvStore>;

/// Why a session did not start. Reported straight to the caller, never retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StartError {
    #[error("no workout or combo with id '{0}'")]
    NotFound(String),
    #[error("'{0}' is premium content; unlock it to train")]
    EntitlementDenied(String),
    #[error("workout cannot be run: {0}")]
    InvalidPlan(#[from] PlanError),
}

/// Front door for sessions: catalog lookups, the entitlement gate and the
/// user's stored data.
pub struct Coach {
    catalog: &'static Catalog,
    entitlement: Box<dyn EntitlementProvider>,
    progress: ProgressRepository<SharedStore>,
    profile: ProfileRepository<SharedStore>,
    custom: CustomWorkoutRepository<SharedStore>,
}

impl Coach {
    pub fn new(store: SharedStore, entitlement: Box<dyn EntitlementProvider>) -> Self {
        Self {
            catalog: Catalog::builtin(),
            entitlement,
            progress: ProgressRepository::load(store.clone()),
            profile: ProfileRepository::load(store.clone()),
            custom: CustomWorkoutRepository::load(store),
        }
    }

    pub fn catalog(&self) -> &'static Catalog {
        self.catalog
    }

    pub fn progress(&self) -> &ProgressRepository<SharedStore> {
        &self.progress
    }

    pub fn profile(&self) -> &ProfileRepository<SharedStore> {
        &self.profile
    }

    pub fn custom(&self) -> &CustomWorkoutRepository<SharedStore> {
        &self.custom
    }

    pub fn is_entitled(&self) -> bool {
        self.entitlement.is_entitled()
    }

    /// Look a workout up in the catalog, then among custom workouts.
    pub fn resolve(&self, workout_id: &str) -> Result<WorkoutPlan, StartError> {
        if let Some(w) = self.catalog.workout(workout_id) {
            return Ok(WorkoutSource::Standard(w).to_plan()?);
        }
        if let Some(w) = self.custom.get(workout_id) {
            return Ok(WorkoutSource::Custom(&w).to_plan()?);
        }
        Err(StartError::NotFound(workout_id.to_string()))
    }

    pub fn resolve_drill(
        &self,
        combo_id: &str,
        rounds: u32,
        round_secs: u32,
        rest_secs: u32,
    ) -> Result<WorkoutPlan, StartError> {
        let combo = self
            .catalog
            .combo(combo_id)
            .ok_or_else(|| StartError::NotFound(combo_id.to_string()))?;
        Ok(WorkoutSource::Drill {
            combo,
            rounds,
            round_secs,
            rest_secs,
        }
        .to_plan()?)
    }

    /// The entitlement gate on its own, so callers can refuse before any setup.
    pub fn authorize(&self, plan: &WorkoutPlan) -> Result<(), StartError> {
        if plan.premium && !self.entitlement.is_entitled() {
            tracing::info!(workout = %plan.id, "premium workout blocked by paywall");
            return Err(StartError::EntitlementDenied(plan.name.clone()));
        }
        Ok(())
    }

    /// Gate a resolved plan and start its clock.
    pub fn begin<C: Clock>(
        &self,
        plan: WorkoutPlan,
        clock: C,
        ticks: Sender<CoachEvent>,
    ) -> Result<SessionRunner<C>, StartError> {
        self.authorize(&plan)?;
        tracing::info!(
            workout = %plan.id,
            rounds = plan.rounds,
            total_secs = plan.total_secs(),
            "starting session"
        );
        let mut runner = SessionRunner::new(plan, clock, ticks);
        runner.start();
        Ok(runner)
    }

    pub fn start_session<C: Clock>(
        &self,
        workout_id: &str,
        clock: C,
        ticks: Sender<CoachEvent>,
    ) -> Result<SessionRunner<C>, StartError> {
        let plan = self.resolve(workout_id)?;
        self.begin(plan, clock, ticks)
    }

    /// Record a session that ended with credit.
    pub fn record(&self, event: &CompletionEvent) -> RecordOutcome {
        self.progress.complete_session(
            &event.workout_id,
            event.duration_minutes(),
            event.estimated_calories,
            event.rounds_completed,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ExerciseDef;
    use crate::clock::ManualClock;
    use crate::entitlement::StaticEntitlement;
    use crate::plan::CustomWorkout;
    use crate::store::MemoryKvStore;
    use assert_matches::assert_matches;
    use std::sync::mpsc;

    fn coach(entitled: bool) -> Coach {
        Coach::new(Arc::new(MemoryKvStore::new()), Box::new(StaticEntitlement(entitled)))
    }

    fn premium_id() -> String {
        Catalog::builtin()
            .workouts
            .iter()
            .find(|w| w.premium)
            .unwrap()
            .id
            .clone()
    }

    #[test]
    fn unknown_workout_is_not_found() {
        let (tx, _rx) = mpsc::channel();
        let result = coach(true).start_session("no-such-workout", ManualClock::new(), tx);
        assert_matches!(result, Err(StartError::NotFound(id)) if id == "no-such-workout");
    }

    #[test]
    fn premium_workout_needs_entitlement() {
        let (tx, _rx) = mpsc::channel();
        let result = coach(false).start_session(&premium_id(), ManualClock::new(), tx);
        assert_matches!(result, Err(StartError::EntitlementDenied(_)));

        let (tx, _rx) = mpsc::channel();
        let mut runner = coach(true)
            .start_session(&premium_id(), ManualClock::new(), tx)
            .unwrap();
        assert!(runner.clock_mut().is_running());
    }

    #[test]
    fn authorize_checks_without_starting() {
        let plan = coach(false).resolve(&premium_id()).unwrap();
        assert_matches!(coach(false).authorize(&plan), Err(StartError::EntitlementDenied(_)));
        assert_eq!(coach(true).authorize(&plan), Ok(()));
    }

    #[test]
    fn free_workout_starts_without_entitlement() {
        let (tx, _rx) = mpsc::channel();
        let mut runner = coach(false)
            .start_session("first-bell", ManualClock::new(), tx)
            .unwrap();
        assert_eq!(runner.plan().id, "first-bell");
        assert_eq!(runner.epoch(), 1);
        assert!(runner.clock_mut().is_running());
    }

    #[test]
    fn custom_workouts_resolve_by_id() {
        let coach = coach(false);
        let saved = coach
            .custom()
            .add(CustomWorkout {
                id: String::new(),
                name: "Quick".into(),
                rounds: 1,
                rest_secs: 0,
                exercises: vec![ExerciseDef {
                    name: "bag".into(),
                    duration_secs: 60,
                    combos: vec![],
                }],
            })
            .unwrap();
        let plan = coach.resolve(&saved.id).unwrap();
        assert_eq!(plan.total_secs(), 60);
    }

    #[test]
    fn drill_requires_known_combo() {
        let coach = coach(false);
        assert_matches!(
            coach.resolve_drill("nope", 3, 60, 30),
            Err(StartError::NotFound(_))
        );
        assert_matches!(
            coach.resolve_drill("one-two", 3, 0, 30),
            Err(StartError::InvalidPlan(PlanError::ZeroDuration(_)))
        );
        assert_eq!(coach.resolve_drill("one-two", 3, 60, 30).unwrap().rounds, 3);
        assert_matches!(
            coach.resolve_drill("one-two", 100_000, 100_000, 30),
            Err(StartError::InvalidPlan(PlanError::TooLong))
        );
    }

    #[test]
    fn record_adds_to_ledger() {
        let coach = coach(false);
        let out = coach.record(&CompletionEvent {
            workout_id: "first-bell".into(),
            rounds_completed: 3,
            elapsed_total_secs: 480,
            estimated_calories: 120,
        });
        assert_eq!(out.aggregate.workouts_completed, 1);
        assert_eq!(out.record.duration_minutes, 8);
        assert_eq!(coach.progress().snapshot().records.len(), 1);
    }
}
