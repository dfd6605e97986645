//! Continuation Policy
//!
//! Decides whether a run proceeds after a failed step while steps remain.
//! Rejections never reach the policy; they cancel the run outright.

use async_trait::async_trait;

use crate::common::error::FailureKind;

/// What the policy is told about a failure
#[derive(Debug, Clone, PartialEq)]
pub struct FailureContext {
    pub run_id: String,
    /// 1-based number of the failed step
    pub step: usize,
    pub total_steps: usize,
    pub kind: FailureKind,
    pub message: String,
    /// Whether the native transfer is still to come
    pub native_pending: bool,
}

impl FailureContext {
    pub fn remaining_steps(&self) -> usize {
        self.total_steps.saturating_sub(self.step)
    }
}

impl std::fmt::Display for FailureContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "step {}/{} failed ({}): {}; {} step(s) remaining",
            self.step,
            self.total_steps,
            self.kind,
            self.message,
            self.remaining_steps()
        )
    }
}

/// Asked after a non-rejection failure when steps remain
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContinuationPolicy: Send + Sync {
    async fn should_continue(&self, context: &FailureContext) -> bool;
}

/// Always proceeds with the remaining steps
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysContinue;

#[async_trait]
impl ContinuationPolicy for AlwaysContinue {
    async fn should_continue(&self, context: &FailureContext) -> bool {
        tracing::info!(
            target: "solsweep::continuation",
            run_id = %context.run_id,
            step = context.step,
            "Continuing after failure"
        );
        true
    }
}

/// Stops at the first failure
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverContinue;

#[async_trait]
impl ContinuationPolicy for NeverContinue {
    async fn should_continue(&self, _context: &FailureContext) -> bool {
        false
    }
}
