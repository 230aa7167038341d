//! Per-transfer retry state machine: ATTEMPTING -> {SUCCEEDED, RETRYING, FAILED}.

use super::classify::classify;
use super::policy::{RetryDecision, RetryPolicy};
use super::TransferError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Attempting,
    Retrying,
    Succeeded,
    Failed,
}

/// Tracks attempts for one transfer and turns failures into decisions.
#[derive(Debug, Clone)]
pub struct RetryController {
    policy: RetryPolicy,
    attempts: u32,
    restarts: u32,
    state: AttemptState,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            restarts: 0,
            state: AttemptState::Attempting,
        }
    }

    /// Enter ATTEMPTING; returns the 1-based attempt number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.state = AttemptState::Attempting;
        self.attempts
    }

    pub fn succeed(&mut self) {
        self.state = AttemptState::Succeeded;
    }

    /// Fail the transfer without consulting the policy (e.g. cancellation).
    pub fn fail(&mut self) {
        self.state = AttemptState::Failed;
    }

    /// Classify `err` and move to RETRYING or FAILED.
    pub fn on_failure(&mut self, err: &TransferError) -> RetryDecision {
        let decision = self.policy.decide(self.attempts, classify(err));
        self.state = match decision {
            RetryDecision::NoRetry => AttemptState::Failed,
            RetryDecision::RestartAfter(_) => {
                self.restarts += 1;
                AttemptState::Retrying
            }
            RetryDecision::ResumeAfter(_) => AttemptState::Retrying,
        };
        decision
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn retries_used(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }
}
