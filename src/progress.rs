//! Run identifiers, states and the events published while a run progresses.

use std::fmt;

/// Identifier of a single vectorization run. Later runs have larger ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(u64);

impl RunId {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of one run.
///
/// `Idle -> Decoding -> Tracing -> Complete`, with `Failed` reachable from
/// `Decoding` or `Tracing` and `Superseded` from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Decoding,
    Tracing,
    Complete,
    Failed,
    Superseded,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Complete | RunState::Failed | RunState::Superseded
        )
    }

    /// Whether `next` is a legal successor of `self`. Staying put is legal.
    pub fn can_advance_to(self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (a, b) if a == b => !a.is_terminal(),
            (Idle, Decoding) => true,
            (Decoding, Tracing) => true,
            (Tracing, Complete) => true,
            (Decoding | Tracing, Failed) => true,
            (Idle | Decoding | Tracing, Superseded) => true,
            _ => false,
        }
    }
}

/// Coarse progress checkpoints of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Milestone {
    Started,
    Decoded,
    PreparedForTracing,
    Traced,
}

impl Milestone {
    pub fn percent(self) -> u8 {
        match self {
            Milestone::Started => 10,
            Milestone::Decoded => 40,
            Milestone::PreparedForTracing => 60,
            Milestone::Traced => 100,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Milestone::Started => "Processing image",
            Milestone::Decoded => "Image decoded",
            Milestone::PreparedForTracing => "Tracing",
            Milestone::Traced => "Done",
        }
    }
}

/// Notification published on the orchestrator's event channel.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// The run reached a milestone. `percent` never decreases within a run.
    Progress {
        run: RunId,
        state: RunState,
        milestone: Milestone,
        percent: u8,
    },
    Completed {
        run: RunId,
        path_count: usize,
        color_count: usize,
    },
    Failed {
        run: RunId,
        kind: &'static str,
        message: String,
    },
    /// A newer run replaced this one; its result was discarded.
    Superseded { run: RunId },
}

impl RunEvent {
    pub fn run(&self) -> RunId {
        match self {
            RunEvent::Progress { run, .. }
            | RunEvent::Completed { run, .. }
            | RunEvent::Failed { run, .. }
            | RunEvent::Superseded { run } => *run,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunEvent::Progress { .. })
    }
}
