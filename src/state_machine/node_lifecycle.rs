// Copyright (c) 2025 - Cowboy AI, Inc.
//! Node Provisioning Lifecycle
//!
//! Per-node FSM driven by the orchestrator.
//!
//! # States
//!
//! - Pending: declared, not yet applied
//! - Applying: create/adopt request in flight
//! - WaitingOnExternal: suspended on an outside party (certificate
//!   validation, delegation propagation)
//! - Ready: outputs available to consumers
//! - Failed: apply or teardown failed; retryable
//! - Deleting / Deleted: teardown
//!
//! # Inputs
//!
//! - BeginApply: Pending → Applying
//! - AwaitExternal: Applying → WaitingOnExternal
//! - Complete: Applying | WaitingOnExternal → Ready, Deleting → Deleted
//! - Fail: Applying | WaitingOnExternal | Deleting → Failed
//! - Retry: Failed | Deleted → Pending
//! - BeginTeardown: Pending | Ready | Failed → Deleting
//!
//! Ready is never left except through BeginTeardown.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{StateMachine, StateMachineWithHistory, TransitionError, TransitionResult};

/// Runtime status of a resource node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Pending,
    Applying,
    WaitingOnExternal,
    Ready,
    Failed,
    Deleting,
    Deleted,
}

impl NodeStatus {
    /// A request for this node is in flight
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Applying | Self::WaitingOnExternal | Self::Deleting)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Applying => "applying",
            Self::WaitingOnExternal => "waiting_on_external",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Deleting => "deleting",
            Self::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// Lifecycle command (FSM input)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleCommand {
    BeginApply,
    AwaitExternal,
    Complete,
    Fail,
    Retry,
    BeginTeardown,
}

/// Transition output with metadata
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransitionOutput {
    /// Warnings generated during transition
    pub warnings: Vec<String>,

    /// Whether this transition ends a branch of the run
    pub is_critical: bool,
}

impl TransitionOutput {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn critical(warning: impl Into<String>) -> Self {
        Self {
            warnings: vec![warning.into()],
            is_critical: true,
        }
    }

    pub fn with_warning(warning: impl Into<String>) -> Self {
        Self {
            warnings: vec![warning.into()],
            is_critical: false,
        }
    }
}

impl StateMachine for NodeStatus {
    type Input = LifecycleCommand;
    type Output = TransitionOutput;

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
        use LifecycleCommand::*;
        use NodeStatus::*;

        match (self, input) {
            (Pending, BeginApply) => Ok((Applying, TransitionOutput::ok())),

            (Applying, AwaitExternal) => Ok((WaitingOnExternal, TransitionOutput::ok())),
            (Applying | WaitingOnExternal, Complete) => Ok((Ready, TransitionOutput::ok())),
            (Applying | WaitingOnExternal, Fail) => {
                Ok((Failed, TransitionOutput::critical("Apply failed")))
            }

            (Failed, Retry) => Ok((Pending, TransitionOutput::ok())),
            (Deleted, Retry) => Ok((
                Pending,
                TransitionOutput::with_warning("Re-provisioning a deleted resource"),
            )),

            (Pending | Failed, BeginTeardown) => Ok((Deleting, TransitionOutput::ok())),
            (Ready, BeginTeardown) => Ok((
                Deleting,
                TransitionOutput::with_warning("Deleting a ready resource"),
            )),
            (Deleting, Complete) => Ok((Deleted, TransitionOutput::ok())),
            (Deleting, Fail) => Ok((Failed, TransitionOutput::critical("Teardown failed"))),

            (Ready, BeginApply) => Err(TransitionError::BusinessRuleViolation(
                "Already ready".to_string(),
            )),
            (Deleted, BeginTeardown) => Err(TransitionError::BusinessRuleViolation(
                "Already deleted".to_string(),
            )),

            (from, input) => Err(TransitionError::InvalidTransition {
                from: from.to_string(),
                to: format!("{:?}", input),
            }),
        }
    }

    fn valid_inputs(&self) -> Vec<Self::Input> {
        use LifecycleCommand::*;
        use NodeStatus::*;

        match self {
            Pending => vec![BeginApply, BeginTeardown],
            Applying => vec![AwaitExternal, Complete, Fail],
            WaitingOnExternal => vec![Complete, Fail],
            Ready => vec![BeginTeardown],
            Failed => vec![Retry, BeginTeardown],
            Deleting => vec![Complete, Fail],
            Deleted => vec![Retry],
        }
    }
}

/// Status plus audited transition history for one node
#[derive(Debug, Clone)]
pub struct NodeLifecycle {
    machine: StateMachineWithHistory<NodeStatus>,
}

impl NodeLifecycle {
    pub fn new() -> Self {
        Self {
            machine: StateMachineWithHistory::new(NodeStatus::Pending),
        }
    }

    pub fn status(&self) -> NodeStatus {
        *self.machine.current_state()
    }

    /// Apply a command, recording it with the current time
    pub fn apply(&mut self, command: LifecycleCommand) -> TransitionResult<TransitionOutput> {
        self.apply_at(command, Utc::now())
    }

    pub fn apply_at(
        &mut self,
        command: LifecycleCommand,
        at: DateTime<Utc>,
    ) -> TransitionResult<TransitionOutput> {
        self.machine.transition_with_history(command, at)
    }

    /// When the node last entered `status`
    pub fn entered_at(&self, status: NodeStatus) -> Option<DateTime<Utc>> {
        self.machine
            .get_history()
            .iter()
            .rev()
            .find(|t| t.to == status)
            .map(|t| t.timestamp)
    }

    /// Statuses visited so far, oldest first, starting with Pending
    pub fn trail(&self) -> Vec<NodeStatus> {
        std::iter::once(NodeStatus::Pending)
            .chain(self.machine.get_history().iter().map(|t| t.to))
            .collect()
    }
}

impl Default for NodeLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_happy_path() {
        let mut lifecycle = NodeLifecycle::new();
        lifecycle.apply(LifecycleCommand::BeginApply).unwrap();
        lifecycle.apply(LifecycleCommand::AwaitExternal).unwrap();
        lifecycle.apply(LifecycleCommand::Complete).unwrap();

        assert_eq!(lifecycle.status(), NodeStatus::Ready);
        assert_eq!(
            lifecycle.trail(),
            vec![
                NodeStatus::Pending,
                NodeStatus::Applying,
                NodeStatus::WaitingOnExternal,
                NodeStatus::Ready,
            ]
        );
    }

    #[test]
    fn test_ready_is_monotonic_until_teardown() {
        use LifecycleCommand::*;
        for command in [BeginApply, AwaitExternal, Complete, Fail, Retry] {
            assert!(
                NodeStatus::Ready.transition(&command).is_err(),
                "Ready accepted {:?}",
                command
            );
        }
        let (next, _) = NodeStatus::Ready.transition(&BeginTeardown).unwrap();
        assert_eq!(next, NodeStatus::Deleting);
    }

    #[test_case(NodeStatus::Applying ; "while applying")]
    #[test_case(NodeStatus::WaitingOnExternal ; "while waiting")]
    #[test_case(NodeStatus::Deleting ; "while deleting")]
    fn test_fail_is_critical(state: NodeStatus) {
        let (next, output) = state.transition(&LifecycleCommand::Fail).unwrap();
        assert_eq!(next, NodeStatus::Failed);
        assert!(output.is_critical);
    }

    #[test]
    fn test_entered_at_tracks_latest_entry() {
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(1);
        let t2 = t0 + chrono::Duration::seconds(2);
        let mut lifecycle = NodeLifecycle::new();
        lifecycle.apply_at(LifecycleCommand::BeginApply, t0).unwrap();
        lifecycle.apply_at(LifecycleCommand::Fail, t1).unwrap();
        lifecycle.apply_at(LifecycleCommand::Retry, t1).unwrap();
        lifecycle.apply_at(LifecycleCommand::BeginApply, t2).unwrap();

        assert_eq!(lifecycle.entered_at(NodeStatus::Applying), Some(t2));
        assert_eq!(lifecycle.entered_at(NodeStatus::Failed), Some(t1));
        assert_eq!(lifecycle.entered_at(NodeStatus::Ready), None);
    }

    #[test]
    fn test_retry_returns_to_pending() {
        let (next, _) = NodeStatus::Failed
            .transition(&LifecycleCommand::Retry)
            .unwrap();
        assert_eq!(next, NodeStatus::Pending);
    }

    #[test]
    fn test_pending_cannot_fail_directly() {
        assert!(NodeStatus::Pending
            .transition(&LifecycleCommand::Fail)
            .is_err());
    }

    #[test]
    fn test_teardown_path() {
        let mut lifecycle = NodeLifecycle::new();
        lifecycle.apply(LifecycleCommand::BeginTeardown).unwrap();
        lifecycle.apply(LifecycleCommand::Complete).unwrap();
        assert_eq!(lifecycle.status(), NodeStatus::Deleted);
        assert!(lifecycle.apply(LifecycleCommand::BeginTeardown).is_err());
    }

    #[test]
    fn test_valid_inputs_agree_with_transition() {
        use NodeStatus::*;
        for state in [Pending, Applying, WaitingOnExternal, Ready, Failed, Deleting, Deleted] {
            for input in state.valid_inputs() {
                assert!(state.can_transition(&input), "{} rejects {:?}", state, input);
            }
        }
    }
}
