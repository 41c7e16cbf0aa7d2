//! Deployment executor.
//!
//! The two-operation facade driving one service's deployment: start it, and
//! observe its status. Resolution misses are expected "nothing to deploy"
//! outcomes and come back as `false`/`Unknown`, not errors.

use crate::config::DeployOptions;
use crate::error::Result;
use crate::release::ReleaseRepository;
use crate::status::DeploymentStatus;
use crate::utils::validation;

/// Seam the sequencer drives one service through.
pub trait ServiceDeploymentExecutor {
    /// Start (or, in what-if mode, only resolve) one service's deployment.
    /// `false` means the request resolved to nothing deployable.
    fn deploy(
        &mut self,
        service_name: &str,
        environment: &str,
        version: Option<&str>,
        branch: Option<&str>,
        prereq_environment: Option<&str>,
    ) -> Result<bool>;

    fn deployment_status(
        &mut self,
        service_name: &str,
        environment: &str,
        version: Option<&str>,
    ) -> Result<DeploymentStatus>;
}

pub struct DeploymentExecutor<R: ReleaseRepository> {
    repository: R,
    options: DeployOptions,
}

impl<R: ReleaseRepository> DeploymentExecutor<R> {
    pub fn new(repository: R, options: DeployOptions) -> Self {
        Self {
            repository,
            options,
        }
    }
}

impl<R: ReleaseRepository> ServiceDeploymentExecutor for DeploymentExecutor<R> {
    fn deploy(
        &mut self,
        service_name: &str,
        environment: &str,
        version: Option<&str>,
        branch: Option<&str>,
        prereq_environment: Option<&str>,
    ) -> Result<bool> {
        let service_name = validation::require_non_empty(service_name, "serviceName")?;
        let environment = validation::require_non_empty(environment, "environment")?;

        let Some(release_id) =
            self.repository
                .release_id(service_name, version, branch, prereq_environment)?
        else {
            log_status!("deploy", "could not resolve a release for {}", service_name);
            return Ok(false);
        };

        log_status!("deploy", "resolved release [{}] for {}", release_id, service_name);

        let Some(environment_id) = self
            .repository
            .release_environment_id(&release_id, environment)?
        else {
            log_status!(
                "deploy",
                "release [{}] has no environment named {}",
                release_id,
                environment
            );
            return Ok(false);
        };

        if self.options.what_if {
            log_status!(
                "deploy",
                "what-if: would trigger release [{}] environment [{}]",
                release_id,
                environment_id
            );
        } else {
            self.repository
                .start_environment(&release_id, &environment_id)?;
        }

        Ok(true)
    }

    fn deployment_status(
        &mut self,
        service_name: &str,
        environment: &str,
        version: Option<&str>,
    ) -> Result<DeploymentStatus> {
        let service_name = validation::require_non_empty(service_name, "serviceName")?;
        let environment = validation::require_non_empty(environment, "environment")?;

        let Some(release_id) = self.repository.release_id(service_name, version, None, None)?
        else {
            return Ok(DeploymentStatus::Unknown);
        };

        let Some(environment_id) = self
            .repository
            .release_environment_id(&release_id, environment)?
        else {
            return Ok(DeploymentStatus::Unknown);
        };

        let status = self
            .repository
            .environment_status(&release_id, &environment_id)?;

        if status == DeploymentStatus::PendingApproval {
            // Approval takes effect on the next poll; this call stays
            // idempotent from the caller's perspective.
            log_status!(
                "deploy",
                "approval required, attempting to approve release [{}]",
                release_id
            );
            self.repository.approve_release(&release_id)?;
        }

        Ok(status)
    }
}
