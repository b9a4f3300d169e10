use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{Combo, ExerciseDef, Level, StandardWorkout};

/// Rough burn rate used when a workout carries no calorie label of its own.
pub const KCAL_PER_ACTIVE_MINUTE: u32 = 10;

/// Longest plan the runner accepts, rests included.
pub const MAX_PLAN_SECS: u32 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("workout has no exercises")]
    NoExercises,
    #[error("exercise '{0}' has a zero duration")]
    ZeroDuration(String),
    #[error("workout must have at least one round")]
    ZeroRounds,
    #[error("workout runs longer than {} hours", MAX_PLAN_SECS / 3600)]
    TooLong,
}

/// A user-built workout, stored alongside the profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomWorkout {
    pub id: String,
    pub name: String,
    pub rounds: u32,
    pub rest_secs: u32,
    pub exercises: Vec<ExerciseDef>,
}

/// Everything the session runner can be pointed at
#[derive(Debug, Clone)]
pub enum WorkoutSource<'a> {
    Standard(&'a StandardWorkout),
    Custom(&'a CustomWorkout),
    Drill {
        combo: &'a Combo,
        rounds: u32,
        round_secs: u32,
        rest_secs: u32,
    },
}

/// Canonical, validated shape consumed by the session runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkoutPlan {
    pub id: String,
    pub name: String,
    pub exercises: Vec<ExerciseDef>,
    pub rounds: u32,
    pub rest_secs: u32,
    pub calories: u32,
    pub level: Level,
    pub premium: bool,
}

impl WorkoutPlan {
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.exercises.is_empty() {
            return Err(PlanError::NoExercises);
        }
        if let Some(ex) = self.exercises.iter().find(|e| e.duration_secs == 0) {
            return Err(PlanError::ZeroDuration(ex.name.clone()));
        }
        if self.rounds == 0 {
            return Err(PlanError::ZeroRounds);
        }
        match self.checked_total_secs() {
            Some(total) if total <= MAX_PLAN_SECS => Ok(()),
            _ => Err(PlanError::TooLong),
        }
    }

    fn checked_total_secs(&self) -> Option<u32> {
        let round = self
            .exercises
            .iter()
            .try_fold(0u32, |acc, e| acc.checked_add(e.duration_secs))?;
        let rests = self.rest_secs.checked_mul(self.rounds.saturating_sub(1))?;
        round.checked_mul(self.rounds)?.checked_add(rests)
    }

    pub fn exercise(&self, idx: usize) -> Option<&ExerciseDef> {
        self.exercises.get(idx)
    }

    pub fn last_exercise_index(&self) -> usize {
        self.exercises.len().saturating_sub(1)
    }

    /// Active seconds in a single round
    pub fn round_secs(&self) -> u32 {
        self.exercises
            .iter()
            .fold(0u32, |acc, e| acc.saturating_add(e.duration_secs))
    }

    pub fn active_secs(&self) -> u32 {
        self.round_secs().saturating_mul(self.rounds)
    }

    /// Wall-clock length of the whole plan including rests between rounds
    pub fn total_secs(&self) -> u32 {
        self.active_secs()
            .saturating_add(self.rest_secs.saturating_mul(self.rounds.saturating_sub(1)))
    }

    /// Calories scaled by how much of the plan was actually trained.
    pub fn estimate_calories(&self, elapsed_secs: u32) -> u32 {
        let total = self.total_secs();
        if total == 0 {
            return 0;
        }
        let scaled = (self.calories as f64 * elapsed_secs as f64 / total as f64).round() as u32;
        scaled.min(self.calories)
    }
}

fn estimate_from_active_secs(active_secs: u32) -> u32 {
    ((active_secs as f64 / 60.0) * KCAL_PER_ACTIVE_MINUTE as f64).round() as u32
}

impl WorkoutSource<'_> {
    pub fn id(&self) -> String {
        match self {
            WorkoutSource::Standard(w) => w.id.clone(),
            WorkoutSource::Custom(w) => w.id.clone(),
            WorkoutSource::Drill { combo, .. } => format!("drill:{}", combo.id),
        }
    }

    pub fn is_premium(&self) -> bool {
        matches!(self, WorkoutSource::Standard(w) if w.premium)
    }

    /// Normalize into a validated plan.
    pub fn to_plan(&self) -> Result<WorkoutPlan, PlanError> {
        let mut plan = match self {
            WorkoutSource::Standard(w) => WorkoutPlan {
                id: w.id.clone(),
                name: w.name.clone(),
                exercises: w.exercises.clone(),
                rounds: w.rounds,
                rest_secs: w.rest_secs,
                calories: w.calories,
                level: w.level,
                premium: w.premium,
            },
            WorkoutSource::Custom(w) => WorkoutPlan {
                id: w.id.clone(),
                name: w.name.clone(),
                exercises: w.exercises.clone(),
                rounds: w.rounds,
                rest_secs: w.rest_secs,
                calories: 0,
                level: Level::Beginner,
                premium: false,
            },
            WorkoutSource::Drill {
                combo,
                rounds,
                round_secs,
                rest_secs,
            } => WorkoutPlan {
                id: self.id(),
                name: format!("{} drill", combo.name),
                exercises: vec![ExerciseDef {
                    name: combo.name.clone(),
                    duration_secs: *round_secs,
                    combos: vec![combo.id.clone()],
                }],
                rounds: *rounds,
                rest_secs: *rest_secs,
                calories: 0,
                level: combo.level,
                premium: false,
            },
        };
        plan.validate()?;
        if !matches!(self, WorkoutSource::Standard(_)) {
            plan.calories = estimate_from_active_secs(plan.active_secs());
        }
        Ok(plan)
    }
}
