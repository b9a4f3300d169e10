use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

use crate::catalog::Catalog;
use crate::plan::{CustomWorkout, PlanError, WorkoutSource};
use crate::store::{load_or_default, save_document, KvStore, StorageError, CUSTOM_WORKOUTS_KEY};

pub const CUSTOM_PREFIX: &str = "custom-";

#[derive(Debug, Error)]
pub enum CustomWorkoutError {
    #[error(transparent)]
    Invalid(#[from] PlanError),
    #[error("no combo with id '{0}'")]
    UnknownCombo(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// User-built workouts, persisted as one list
pub struct CustomWorkoutRepository<S: KvStore> {
    store: S,
    workouts: Mutex<Vec<CustomWorkout>>,
}

impl<S: KvStore> CustomWorkoutRepository<S> {
    pub fn load(store: S) -> Self {
        let workouts = load_or_default(&store, CUSTOM_WORKOUTS_KEY);
        Self {
            store,
            workouts: Mutex::new(workouts),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CustomWorkout>> {
        self.workouts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn list(&self) -> Vec<CustomWorkout> {
        self.lock().clone()
    }

    pub fn get(&self, id: &str) -> Option<CustomWorkout> {
        self.lock().iter().find(|w| w.id == id).cloned()
    }

    /// Validate, assign an id from the name, and store.
    pub fn add(&self, mut workout: CustomWorkout) -> Result<CustomWorkout, CustomWorkoutError> {
        WorkoutSource::Custom(&workout).to_plan()?;
        let catalog = Catalog::builtin();
        if let Some(unknown) = workout
            .exercises
            .iter()
            .flat_map(|e| &e.combos)
            .find(|id| catalog.combo(id).is_none())
        {
            return Err(CustomWorkoutError::UnknownCombo(unknown.clone()));
        }

        let mut workouts = self.lock();
        let base = format!("{CUSTOM_PREFIX}{}", slug(&workout.name));
        let mut id = base.clone();
        let mut n = 2;
        while workouts.iter().any(|w| w.id == id) {
            id = format!("{base}-{n}");
            n += 1;
        }
        workout.id = id;
        workouts.push(workout.clone());
        save_document(&self.store, CUSTOM_WORKOUTS_KEY, &*workouts)?;
        tracing::info!(id = %workout.id, "custom workout saved");
        Ok(workout)
    }

    /// Returns whether anything was removed.
    pub fn remove(&self, id: &str) -> Result<bool, StorageError> {
        let mut workouts = self.lock();
        let before = workouts.len();
        workouts.retain(|w| w.id != id);
        if workouts.len() == before {
            return Ok(false);
        }
        save_document(&self.store, CUSTOM_WORKOUTS_KEY, &*workouts)?;
        Ok(true)
    }
}

fn slug(name: &str) -> String {
    let s = name
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if s.is_empty() {
        "workout".to_string()
    } else {
        s
    }
}
