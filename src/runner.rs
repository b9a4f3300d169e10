use std::sync::mpsc::Sender;

use crate::clock::Clock;
use crate::plan::WorkoutPlan;
use crate::runtime::CoachEvent;
use crate::session::{CompletionEvent, SessionState};

/// Owns one live session: the plan, its state and the clock driving it.
///
/// Ticks arrive as `CoachEvent::Tick` on the shared queue and are handed
/// back through [`SessionRunner::on_tick`]. Each clock start gets a new
/// epoch; ticks from an older epoch are dropped, so nothing queued before a
/// pause or teardown can touch the state.
pub struct SessionRunner<C: Clock> {
    plan: WorkoutPlan,
    state: SessionState,
    clock: C,
    ticks: Sender<CoachEvent>,
    epoch: u64,
}

impl<C: Clock> SessionRunner<C> {
    pub fn new(plan: WorkoutPlan, clock: C, ticks: Sender<CoachEvent>) -> Self {
        let state = SessionState::new(&plan);
        Self {
            plan,
            state,
            clock,
            ticks,
            epoch: 0,
        }
    }

    pub fn plan(&self) -> &WorkoutPlan {
        &self.plan
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Arm the clock if the session is live and not already ticking.
    pub fn start(&mut self) {
        if self.state.is_complete() || !self.state.is_running || self.clock.is_running() {
            return;
        }
        self.epoch += 1;
        let epoch = self.epoch;
        let tx = self.ticks.clone();
        self.clock.start(Box::new(move || {
            let _ = tx.send(CoachEvent::Tick { epoch });
        }));
        tracing::info!(workout = %self.plan.id, epoch, "session clock started");
    }

    pub fn on_tick(&mut self, epoch: u64) -> Option<CompletionEvent> {
        if epoch != self.epoch || !self.clock.is_running() {
            tracing::trace!(epoch, current = self.epoch, "dropping stale tick");
            return None;
        }
        let event = self.state.tick(&self.plan);
        if event.is_some() {
            self.clock.stop();
        }
        event
    }

    pub fn pause(&mut self) {
        self.state.pause();
        self.clock.stop();
    }

    pub fn resume(&mut self) {
        self.state.resume();
        self.start();
    }

    pub fn toggle_pause(&mut self) {
        if self.state.is_running {
            self.pause()
        } else {
            self.resume()
        }
    }

    pub fn skip(&mut self) -> Option<CompletionEvent> {
        let event = self.state.skip(&self.plan);
        if event.is_some() {
            self.clock.stop();
        }
        event
    }

    pub fn restart(&mut self) {
        self.state.restart(&self.plan);
    }

    pub fn finish_early(&mut self) -> Option<CompletionEvent> {
        self.clock.stop();
        self.state.finish_early(&self.plan)
    }

    /// Tear down without credit.
    pub fn exit(mut self) {
        self.clock.stop();
        tracing::info!(
            workout = %self.plan.id,
            elapsed = self.state.elapsed_total_secs,
            "session exited without recording"
        );
    }
}

impl<C: Clock> Drop for SessionRunner<C> {
    fn drop(&mut self) {
        self.clock.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ExerciseDef, Level};
    use crate::clock::ManualClock;
    use crate::session::Phase;
    use std::sync::mpsc::{self, Receiver};

    fn plan() -> WorkoutPlan {
        WorkoutPlan {
            id: "w1".into(),
            name: "Test".into(),
            exercises: vec![ExerciseDef {
                name: "bag".into(),
                duration_secs: 3,
                combos: vec![],
            }],
            rounds: 2,
            rest_secs: 2,
            calories: 40,
            level: Level::Beginner,
            premium: false,
        }
    }

    fn runner() -> (SessionRunner<ManualClock>, Receiver<CoachEvent>) {
        let (tx, rx) = mpsc::channel();
        (SessionRunner::new(plan(), ManualClock::new(), tx), rx)
    }

    fn pump(runner: &mut SessionRunner<ManualClock>, rx: &Receiver<CoachEvent>) -> Vec<CompletionEvent> {
        let mut out = vec![];
        while let Ok(CoachEvent::Tick { epoch }) = rx.try_recv() {
            out.extend(runner.on_tick(epoch));
        }
        out
    }

    #[test]
    fn clock_ticks_drive_the_session_to_completion() {
        let (mut r, rx) = runner();
        r.start();
        let mut done = vec![];
        for _ in 0..8 {
            r.clock_mut().fire();
            done.extend(pump(&mut r, &rx));
        }
        assert_eq!(done.len(), 1);
        assert_eq!(r.state().phase, Phase::Complete);
        assert!(!r.clock_mut().is_running());
        assert!(!r.clock_mut().fire());
    }

    #[test]
    fn start_twice_arms_once() {
        let (mut r, _rx) = runner();
        r.start();
        r.start();
        assert_eq!(r.clock_mut().starts(), 1);
        assert_eq!(r.epoch(), 1);
    }

    #[test]
    fn ticks_queued_before_pause_are_ignored() {
        let (mut r, rx) = runner();
        r.start();
        r.clock_mut().fire();
        r.clock_mut().fire();
        r.pause();
        let before = r.state().clone();
        assert!(pump(&mut r, &rx).is_empty());
        assert_eq!(r.state(), &before);
    }

    #[test]
    fn resume_uses_new_epoch() {
        let (mut r, rx) = runner();
        r.start();
        r.clock_mut().fire();
        r.pause();
        r.resume();
        assert_eq!(r.epoch(), 2);
        // stale tick from epoch 1 still in the queue
        assert!(pump(&mut r, &rx).is_empty());
        assert_eq!(r.state().time_remaining_secs, 3);
        r.clock_mut().fire();
        pump(&mut r, &rx);
        assert_eq!(r.state().time_remaining_secs, 2);
    }

    #[test]
    fn toggle_pause_flips_running() {
        let (mut r, _rx) = runner();
        r.start();
        r.toggle_pause();
        assert!(!r.state().is_running);
        assert!(!r.clock_mut().is_running());
        r.toggle_pause();
        assert!(r.state().is_running);
        assert!(r.clock_mut().is_running());
    }

    #[test]
    fn skip_to_end_stops_clock() {
        let (mut r, _rx) = runner();
        r.start();
        assert!(r.skip().is_none());
        let event = r.skip().unwrap();
        assert_eq!(event.rounds_completed, 2);
        assert!(!r.clock_mut().is_running());
    }

    #[test]
    fn finish_early_reports_elapsed() {
        let (mut r, rx) = runner();
        r.start();
        r.clock_mut().fire();
        pump(&mut r, &rx);
        let event = r.finish_early().unwrap();
        assert_eq!(event.elapsed_total_secs, 1);
        assert_eq!(event.rounds_completed, 0);
    }

    #[test]
    fn exit_stops_clock() {
        let (mut r, rx) = runner();
        r.start();
        r.clock_mut().fire();
        r.exit();
        // the queued tick has nobody to mutate
        assert!(matches!(rx.try_recv(), Ok(CoachEvent::Tick { epoch: 1 })));
    }
}

impl<C: Clock> std::fmt::Debug for SessionRunner<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRunner")
            .field("plan", &self.plan)
            .field("state", &self.state)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}
