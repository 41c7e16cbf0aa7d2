use serde::{Deserialize, Serialize};

/// Normalized deployment status: the closed set the sequencer drives on,
/// collapsed from the wider range the external service reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeploymentStatus {
    Unknown,
    NotStarted,
    Queued,
    PendingApproval,
    InProgress,
    Succeeded,
    Failed,
    Cancelled,
}

impl DeploymentStatus {
    /// Statuses worth polling again. `Unknown` and `NotStarted` are terminal
    /// for the current attempt: polling them would never converge.
    pub fn is_pollable(&self) -> bool {
        matches!(
            self,
            DeploymentStatus::Queued
                | DeploymentStatus::InProgress
                | DeploymentStatus::PendingApproval
        )
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeploymentStatus::Unknown => "unknown",
            DeploymentStatus::NotStarted => "notStarted",
            DeploymentStatus::Queued => "queued",
            DeploymentStatus::PendingApproval => "pendingApproval",
            DeploymentStatus::InProgress => "inProgress",
            DeploymentStatus::Succeeded => "succeeded",
            DeploymentStatus::Failed => "failed",
            DeploymentStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}
