use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::plan::WorkoutPlan;
use crate::session::{Phase, SessionState};

/// Calls out a combo from the current exercise's pool every few seconds.
#[derive(Debug)]
pub struct ComboCaller {
    every_secs: u32,
    rng: StdRng,
    current: Option<String>,
    /// (round, exercise index, seconds into it) of the last call
    called_at: Option<(u32, usize, u32)>,
}

impl ComboCaller {
    pub fn new(every_secs: u32) -> Self {
        Self::with_rng(every_secs, StdRng::from_entropy())
    }

    pub fn seeded(every_secs: u32, seed: u64) -> Self {
        Self::with_rng(every_secs, StdRng::seed_from_u64(seed))
    }

    fn with_rng(every_secs: u32, rng: StdRng) -> Self {
        Self {
            every_secs: every_secs.max(1),
            rng,
            current: None,
            called_at: None,
        }
    }

    /// Combo id currently on screen
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Look at the state after a tick or action and pick a new call when due.
    /// Returns the new call, if one was made.
    pub fn observe(&mut self, plan: &WorkoutPlan, state: &SessionState) -> Option<&str> {
        let exercise = match (state.phase, plan.exercise(state.current_exercise_index)) {
            (Phase::Active, Some(ex)) if !ex.combos.is_empty() => ex,
            _ => {
                self.current = None;
                return None;
            }
        };

        let into = exercise.duration_secs - state.time_remaining_secs.min(exercise.duration_secs);
        let at = (state.current_round, state.current_exercise_index, into);
        let due = self.current.is_none() || (into > 0 && into % self.every_secs == 0);
        if !due || self.called_at == Some(at) {
            return None;
        }
        self.called_at = Some(at);
        self.current = exercise.combos.choose(&mut self.rng).cloned();
        self.current.as_deref()
    }
}
