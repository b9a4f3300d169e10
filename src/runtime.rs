use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent};

/// Unified event type consumed by the app loop
#[derive(Clone, Debug, PartialEq)]
pub enum CoachEvent {
    Key(KeyEvent),
    Resize,
    /// One clock second, tagged with the clock start that produced it
    Tick { epoch: u64 },
}

/// Source of terminal and clock events
pub trait CoachEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&self, timeout: Duration) -> Result<CoachEvent, RecvTimeoutError>;

    /// Handle for producers (the session clock) feeding the same queue.
    fn sender(&self) -> Sender<CoachEvent>;
}

/// Production event source reading the terminal with crossterm
pub struct CrosstermEventSource {
    tx: Sender<CoachEvent>,
    rx: Receiver<CoachEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let input_tx = tx.clone();

        std::thread::spawn(move || loop {
            let sent = match event::read() {
                Ok(CtEvent::Key(key)) => input_tx.send(CoachEvent::Key(key)),
                Ok(CtEvent::Resize(_, _)) => input_tx.send(CoachEvent::Resize),
                Ok(_) => Ok(()),
                Err(e) => {
                    tracing::warn!("terminal input closed: {e}");
                    break;
                }
            };
            if sent.is_err() {
                break;
            }
        });

        Self { tx, rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CoachEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<CoachEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    fn sender(&self) -> Sender<CoachEvent> {
        self.tx.clone()
    }
}

/// Channel-backed source for headless tests
pub struct TestEventSource {
    tx: Sender<CoachEvent>,
    rx: Receiver<CoachEvent>,
}

impl TestEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }
}

impl Default for TestEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CoachEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<CoachEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    fn sender(&self) -> Sender<CoachEvent> {
        self.tx.clone()
    }
}

/// Pulls the next event, waking at least once per frame for redraws
pub struct Runner<E: CoachEventSource> {
    event_source: E,
    frame: Duration,
}

impl<E: CoachEventSource> Runner<E> {
    pub fn new(event_source: E, frame: Duration) -> Self {
        Self {
            event_source,
            frame,
        }
    }

    pub fn sender(&self) -> Sender<CoachEvent> {
        self.event_source.sender()
    }

    /// Blocks up to one frame. `None` means nothing arrived.
    pub fn step(&self) -> Option<CoachEvent> {
        match self.event_source.recv_timeout(self.frame) {
            Ok(ev) => Some(ev),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_returns_none_on_timeout() {
        let runner = Runner::new(TestEventSource::new(), Duration::from_millis(1));
        assert!(runner.step().is_none());
    }

    #[test]
    fn step_passes_through_events_in_order() {
        let runner = Runner::new(TestEventSource::new(), Duration::from_millis(10));
        let tx = runner.sender();
        tx.send(CoachEvent::Resize).unwrap();
        tx.send(CoachEvent::Tick { epoch: 3 }).unwrap();

        match runner.step() {
            Some(CoachEvent::Resize) => {}
            other => panic!("expected Resize event, got {other:?}"),
        }
        match runner.step() {
            Some(CoachEvent::Tick { epoch: 3 }) => {}
            other => panic!("expected Tick, got {other:?}"),
        }
    }
}
