use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

pub type TickFn = Box<dyn FnMut() + Send + 'static>;

/// The one scheduling primitive a session uses
pub trait Clock {
    /// Begin emitting ticks. A second call while running does nothing.
    fn start(&mut self, on_tick: TickFn);
    /// Halt emission. No callback fires after this returns.
    fn stop(&mut self);
    fn is_running(&self) -> bool;
}

struct Ticking {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Fixed-interval clock backed by a thread.
///
/// Drift accumulates with callback time and is not corrected.
pub struct IntervalClock {
    interval: Duration,
    ticking: Option<Ticking>,
}

impl IntervalClock {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ticking: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for IntervalClock {
    fn default() -> Self {
        Self::new(DEFAULT_TICK)
    }
}

impl Clock for IntervalClock {
    fn start(&mut self, mut on_tick: TickFn) {
        if self.ticking.is_some() {
            return;
        }
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let interval = self.interval;
        let handle = thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => on_tick(),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });
        self.ticking = Some(Ticking { stop_tx, handle });
    }

    fn stop(&mut self) {
        if let Some(ticking) = self.ticking.take() {
            let _ = ticking.stop_tx.send(());
            if ticking.handle.join().is_err() {
                tracing::warn!("clock thread panicked");
            }
        }
    }

    fn is_running(&self) -> bool {
        self.ticking.is_some()
    }
}

impl Drop for IntervalClock {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Clock that only ticks when told to
#[derive(Default)]
pub struct ManualClock {
    on_tick: Option<TickFn>,
    starts: usize,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire one tick. Returns false if the clock is stopped.
    pub fn fire(&mut self) -> bool {
        match self.on_tick.as_mut() {
            Some(f) => {
                f();
                true
            }
            None => false,
        }
    }

    /// How many times `start` actually armed the clock
    pub fn starts(&self) -> usize {
        self.starts
    }
}

impl Clock for ManualClock {
    fn start(&mut self, on_tick: TickFn) {
        if self.on_tick.is_none() {
            self.on_tick = Some(on_tick);
            self.starts += 1;
        }
    }

    fn stop(&mut self) {
        self.on_tick = None;
    }

    fn is_running(&self) -> bool {
        self.on_tick.is_some()
    }
}
