// Start/stop/restart commands, single and bulk

use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{info, warn};

use crate::api::ApiError;
use crate::models::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Start,
    Stop,
    Restart,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Start => "start",
            ActionKind::Stop => "stop",
            ActionKind::Restart => "restart",
        }
    }

    /// "Starting", "Stopping", "Restarting"
    pub fn progressive(self) -> &'static str {
        match self {
            ActionKind::Start => "Starting",
            ActionKind::Stop => "Stopping",
            ActionKind::Restart => "Restarting",
        }
    }

    /// "started", "stopped", "restarted"
    pub fn past(self) -> &'static str {
        match self {
            ActionKind::Start => "started",
            ActionKind::Stop => "stopped",
            ActionKind::Restart => "restarted",
        }
    }

    fn completed(self) -> &'static str {
        match self {
            ActionKind::Start => "Started",
            ActionKind::Stop => "Stopped",
            ActionKind::Restart => "Restarted",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend side of an action. The effect shows up on the next poll.
pub trait ActionExecutor: Send + Sync {
    fn perform(
        &self,
        action: ActionKind,
        target: &EntityId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

pub async fn run_action<E: ActionExecutor>(
    executor: &E,
    action: ActionKind,
    target: &EntityId,
) -> Result<(), ApiError> {
    info!(entity = %target, "{} {} {}", action.progressive(), target.kind, target.id);
    match executor.perform(action, target).await {
        Ok(()) => {
            info!(entity = %target, operation = action.as_str(), "{} {}", target.kind, action.past());
            Ok(())
        }
        Err(e) => {
            warn!(entity = %target, operation = action.as_str(), error = %e, "action failed");
            Err(e)
        }
    }
}

/// Aggregate result of a bulk action.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkOutcome {
    pub action: ActionKind,
    pub succeeded: Vec<EntityId>,
    pub failed: Vec<(EntityId, ApiError)>,
    noun: &'static str,
}

impl BulkOutcome {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// One-line report, e.g. "Restarted 2 services, failed to restart 1 services".
    pub fn summary(&self) -> String {
        let ok = self.succeeded.len();
        let failed = self.failed.len();
        let verb = self.action.as_str();
        if ok == 0 && failed == 0 {
            format!("No valid {} selected", self.noun)
        } else if failed == 0 {
            format!("Successfully {} {} {}", self.action.past(), ok, self.noun)
        } else if ok == 0 {
            format!("Failed to {} all {} {}", verb, failed, self.noun)
        } else {
            format!(
                "{} {} {}, failed to {} {} {}",
                self.action.completed(),
                ok,
                self.noun,
                verb,
                failed,
                self.noun
            )
        }
    }
}

fn noun_for(targets: &[EntityId]) -> &'static str {
    let mut kinds = targets.iter().map(|t| t.kind);
    match kinds.next() {
        Some(first) if kinds.all(|k| k == first) => first.plural(),
        _ => "entities",
    }
}

/// Runs `action` on each target in order. A failure is recorded and the
/// remaining targets still run.
pub async fn run_bulk<E: ActionExecutor>(
    executor: &E,
    action: ActionKind,
    targets: &[EntityId],
) -> BulkOutcome {
    let mut outcome = BulkOutcome {
        action,
        succeeded: Vec::with_capacity(targets.len()),
        failed: Vec::new(),
        noun: noun_for(targets),
    };
    if targets.is_empty() {
        warn!(operation = action.as_str(), "bulk action with no targets");
        return outcome;
    }
    info!(
        operation = action.as_str(),
        count = targets.len(),
        "{} {} {}",
        action.progressive(),
        targets.len(),
        outcome.noun
    );
    for target in targets {
        match run_action(executor, action, target).await {
            Ok(()) => outcome.succeeded.push(target.clone()),
            Err(e) => outcome.failed.push((target.clone(), e)),
        }
    }
    if outcome.is_complete_success() {
        info!(operation = action.as_str(), "{}", outcome.summary());
    } else {
        warn!(operation = action.as_str(), "{}", outcome.summary());
    }
    outcome
}
