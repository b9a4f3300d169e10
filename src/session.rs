use serde::Serialize;

use crate::plan::WorkoutPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
pub enum Phase {
    #[strum(serialize = "WORK")]
    Active,
    #[strum(serialize = "REST")]
    Resting,
    #[strum(serialize = "DONE")]
    Complete,
}

/// Emitted exactly once when a session ends with credit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionEvent {
    pub workout_id: String,
    pub rounds_completed: u32,
    pub elapsed_total_secs: u32,
    pub estimated_calories: u32,
}

impl CompletionEvent {
    /// Whole minutes for the ledger, rounding a partial minute up.
    pub fn duration_minutes(&self) -> u32 {
        self.elapsed_total_secs.div_ceil(60)
    }
}

/// Live state of a guided session. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub current_round: u32,
    pub current_exercise_index: usize,
    pub phase: Phase,
    pub time_remaining_secs: u32,
    pub is_running: bool,
    pub elapsed_total_secs: u32,
}

impl SessionState {
    /// Fresh state at round 1, first exercise, running.
    pub fn new(plan: &WorkoutPlan) -> Self {
        Self {
            current_round: 1,
            current_exercise_index: 0,
            phase: Phase::Active,
            time_remaining_secs: exercise_secs(plan, 0),
            is_running: true,
            elapsed_total_secs: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    /// One clock second. Ticks while paused or after completion do nothing.
    pub fn tick(&mut self, plan: &WorkoutPlan) -> Option<CompletionEvent> {
        if !self.is_running || self.is_complete() {
            return None;
        }
        if self.time_remaining_secs > 0 {
            self.time_remaining_secs -= 1;
            self.elapsed_total_secs += 1;
        }
        if self.time_remaining_secs == 0 {
            self.advance(plan, false)
        } else {
            None
        }
    }

    /// Jump to the next boundary now. Rest is always bypassed.
    pub fn skip(&mut self, plan: &WorkoutPlan) -> Option<CompletionEvent> {
        if self.is_complete() {
            return None;
        }
        self.advance(plan, true)
    }

    /// Rewind the current phase without moving round or exercise.
    pub fn restart(&mut self, plan: &WorkoutPlan) {
        self.time_remaining_secs = match self.phase {
            Phase::Active => exercise_secs(plan, self.current_exercise_index),
            Phase::Resting => plan.rest_secs,
            Phase::Complete => 0,
        };
    }

    pub fn pause(&mut self) {
        if !self.is_complete() {
            self.is_running = false;
        }
    }

    pub fn resume(&mut self) {
        if !self.is_complete() {
            self.is_running = true;
        }
    }

    pub fn toggle_pause(&mut self) {
        if self.is_running {
            self.pause()
        } else {
            self.resume()
        }
    }

    /// Rounds whose last exercise has been finished.
    pub fn rounds_finished(&self) -> u32 {
        match self.phase {
            Phase::Active => self.current_round - 1,
            Phase::Resting | Phase::Complete => self.current_round,
        }
    }

    /// End with credit for what has been done so far.
    pub fn finish_early(&mut self, plan: &WorkoutPlan) -> Option<CompletionEvent> {
        if self.is_complete() {
            return None;
        }
        let event = self.completion(plan, self.rounds_finished());
        self.phase = Phase::Complete;
        self.time_remaining_secs = 0;
        self.is_running = false;
        Some(event)
    }

    /// Seconds left in the whole plan, counting the current countdown.
    pub fn remaining_total_secs(&self, plan: &WorkoutPlan) -> u32 {
        match self.phase {
            Phase::Complete => 0,
            Phase::Resting => {
                let rounds_left = plan.rounds - self.current_round;
                self.time_remaining_secs
                    + rounds_left * plan.round_secs()
                    + rounds_left.saturating_sub(1) * plan.rest_secs
            }
            Phase::Active => {
                let rest_of_round: u32 = plan
                    .exercises
                    .iter()
                    .skip(self.current_exercise_index + 1)
                    .map(|e| e.duration_secs)
                    .sum();
                let rounds_left = plan.rounds - self.current_round;
                self.time_remaining_secs
                    + rest_of_round
                    + rounds_left * (plan.round_secs() + plan.rest_secs)
            }
        }
    }

    fn advance(&mut self, plan: &WorkoutPlan, bypass_rest: bool) -> Option<CompletionEvent> {
        match self.phase {
            Phase::Active if self.current_exercise_index < plan.last_exercise_index() => {
                self.current_exercise_index += 1;
                self.time_remaining_secs = exercise_secs(plan, self.current_exercise_index);
                None
            }
            Phase::Active if self.current_round < plan.rounds => {
                if bypass_rest || plan.rest_secs == 0 {
                    self.start_round(plan, self.current_round + 1);
                } else {
                    self.phase = Phase::Resting;
                    self.current_exercise_index = 0;
                    self.time_remaining_secs = plan.rest_secs;
                    tracing::debug!(round = self.current_round, "rest started");
                }
                None
            }
            Phase::Active => {
                self.phase = Phase::Complete;
                self.time_remaining_secs = 0;
                self.is_running = false;
                tracing::info!(
                    workout = %plan.id,
                    elapsed = self.elapsed_total_secs,
                    "session complete"
                );
                Some(self.completion(plan, plan.rounds))
            }
            Phase::Resting => {
                self.start_round(plan, self.current_round + 1);
                None
            }
            Phase::Complete => None,
        }
    }

    fn start_round(&mut self, plan: &WorkoutPlan, round: u32) {
        self.phase = Phase::Active;
        self.current_round = round;
        self.current_exercise_index = 0;
        self.time_remaining_secs = exercise_secs(plan, 0);
        tracing::debug!(round, "round started");
    }

    fn completion(&self, plan: &WorkoutPlan, rounds_completed: u32) -> CompletionEvent {
        CompletionEvent {
            workout_id: plan.id.clone(),
            rounds_completed,
            elapsed_total_secs: self.elapsed_total_secs,
            estimated_calories: plan.estimate_calories(self.elapsed_total_secs),
        }
    }
}

fn exercise_secs(plan: &WorkoutPlan, idx: usize) -> u32 {
    plan.exercise(idx).map_or(0, |e| e.duration_secs)
}
