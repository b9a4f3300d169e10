use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};

use crate::catalog::Level;
use crate::ledger::Ledger;
use crate::store::{load_or_default, save_document, KvStore, StorageError, PROFILE_KEY};

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    #[default]
    #[strum(serialize = "orthodox")]
    Orthodox,
    #[strum(serialize = "southpaw")]
    Southpaw,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub name: String,
    pub stance: Stance,
    pub level: Level,
    pub weekly_goal: u32,
    pub weight_kg: Option<f32>,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            name: String::new(),
            stance: Stance::Orthodox,
            level: Level::Beginner,
            weekly_goal: 3,
            weight_kg: None,
        }
    }
}

impl UserProfile {
    /// Workouts logged in the ISO week containing `today`, against the goal.
    pub fn weekly_goal_progress(&self, ledger: &Ledger, today: NaiveDate) -> (u32, u32) {
        let week = today.iso_week();
        let done = ledger
            .records
            .iter()
            .filter(|r| r.completed_at.date_naive().iso_week() == week)
            .count() as u32;
        (done, self.weekly_goal)
    }
}

pub struct ProfileRepository<S: KvStore> {
    store: S,
    profile: Mutex<UserProfile>,
}

impl<S: KvStore> ProfileRepository<S> {
    pub fn load(store: S) -> Self {
        let profile = load_or_default(&store, PROFILE_KEY);
        Self {
            store,
            profile: Mutex::new(profile),
        }
    }

    fn lock(&self) -> MutexGuard<'_, UserProfile> {
        self.profile.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self) -> UserProfile {
        self.lock().clone()
    }

    /// Apply `f` and write the whole profile back.
    pub fn update<F: FnOnce(&mut UserProfile)>(&self, f: F) -> Result<UserProfile, StorageError> {
        let mut profile = self.lock();
        f(&mut profile);
        save_document(&self.store, PROFILE_KEY, &*profile)?;
        tracing::info!(name = %profile.name, stance = %profile.stance, "profile saved");
        Ok(profile.clone())
    }
}
