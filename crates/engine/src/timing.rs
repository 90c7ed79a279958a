//! Wait-window selection.

use crate::buffer::BufferState;
use chatbuffer_config::TimingProfile;
use chatbuffer_core::UrgencyClass;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimingAction {
    Wait,
    FlushNow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimingDecision {
    pub action: TimingAction,
    /// Zero for `FlushNow`.
    pub wait_ms: u64,
}

/// Maps an urgency class to a wait window using the active profile.
///
/// Stateless: the same urgency and buffer state always give the same answer.
#[derive(Debug, Clone)]
pub struct TimingPolicy {
    profile: TimingProfile,
}

impl TimingPolicy {
    pub fn new(profile: TimingProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &TimingProfile {
        &self.profile
    }

    pub fn decide(&self, urgency: UrgencyClass, state: &BufferState) -> TimingDecision {
        if state.should_flush() {
            return TimingDecision {
                action: TimingAction::FlushNow,
                wait_ms: 0,
            };
        }
        TimingDecision {
            action: TimingAction::Wait,
            wait_ms: self.profile.wait_ms(urgency),
        }
    }
}
