use ratatui::Frame;
use ringside::clock::Clock;

use crate::{App, AppState};

/// A UI Screen boundary: one per app state
pub trait Screen<C: Clock> {
    fn render(&self, app: &mut App<'_, C>, f: &mut Frame);
}

/// Countdown, phase and combo call-outs while training
pub struct SessionScreen;

impl<C: Clock> Screen<C> for SessionScreen {
    fn render(&self, app: &mut App<'_, C>, f: &mut Frame) {
        f.render_widget(&*app, f.area());
    }
}

/// Summary of the finished session and any unlocked achievements
pub struct ResultsScreen;

impl<C: Clock> Screen<C> for ResultsScreen {
    fn render(&self, app: &mut App<'_, C>, f: &mut Frame) {
        f.render_widget(&*app, f.area());
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen<C: Clock>(state: &AppState) -> Box<dyn Screen<C>> {
    match state {
        AppState::Session => Box::new(SessionScreen),
        AppState::Results => Box::new(ResultsScreen),
    }
}
