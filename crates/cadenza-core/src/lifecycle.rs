//! Engine lifecycle state machine.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    /// No rendering structure has been touched yet, or rendering stopped.
    #[default]
    Idle,
    /// Topology has been edited since the engine was last idle.
    Configuring,
    Running,
    /// A stop request is tearing down the render driver.
    Stopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Any topology mutation.
    Configure,
    Start,
    BeginStop,
    FinishStop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionResult {
    None,
    Changed(EngineState),
    /// `Start` while a driver is already running or stopping.
    Rejected,
}

#[derive(Debug, Default)]
pub struct Lifecycle {
    state: EngineState,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn transition(&mut self, event: LifecycleEvent) -> TransitionResult {
        use EngineState::*;
        use LifecycleEvent::*;

        let next = match (event, self.state) {
            (Configure, Idle) => Configuring,
            // Mutation is legal while running; the state does not change.
            (Configure, _) => return TransitionResult::None,

            (Start, Idle | Configuring) => Running,
            (Start, Running | Stopping) => return TransitionResult::Rejected,

            (BeginStop, Running) => Stopping,
            (BeginStop, _) => return TransitionResult::None,

            (FinishStop, Stopping | Running) => Idle,
            (FinishStop, _) => return TransitionResult::None,
        };

        tracing::debug!(from = ?self.state, to = ?next, ?event, "engine lifecycle");
        self.state = next;
        TransitionResult::Changed(next)
    }
}
