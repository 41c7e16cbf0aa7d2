//! Release resolution and status observation.
//!
//! Maps a deployment request to the service's release/environment identifiers
//! and normalizes environment statuses for the sequencer. The one nuance worth
//! knowing: the service reports `inProgress` both while a deployment is
//! genuinely running and while it is parked on a manual approval gate, so an
//! in-progress status is disambiguated through the pending-approvals query.
//! Once a release is known to have no pending approval the answer is cached
//! for the lifetime of this resolver; instances are scoped to a single
//! deployment run.

use crate::auth::Authenticator;
use crate::client::{EnvironmentStatus, ReleaseClient, ReleaseDefinition};
use crate::error::{Error, Result};
use crate::status::DeploymentStatus;
use crate::utils::validation;

/// Resolution and mutation operations the executor drives. Ids are opaque
/// strings at this boundary; lookup misses are `None`, never errors.
pub trait ReleaseRepository {
    fn release_id(
        &self,
        service_name: &str,
        version: Option<&str>,
        branch: Option<&str>,
        prereq_environment: Option<&str>,
    ) -> Result<Option<String>>;

    fn release_environment_id(
        &self,
        release_id: &str,
        environment_name: &str,
    ) -> Result<Option<String>>;

    /// Trigger the environment; does not await completion.
    fn start_environment(&self, release_id: &str, environment_id: &str) -> Result<()>;

    fn environment_status(
        &mut self,
        release_id: &str,
        environment_id: &str,
    ) -> Result<DeploymentStatus>;

    fn approve_release(&self, release_id: &str) -> Result<()>;
}

pub struct ReleaseResolver<C: ReleaseClient, A: Authenticator> {
    client: C,
    authenticator: A,
    /// Set once this resolver has verified the release has no pending
    /// approval; avoids re-querying approvals on every poll.
    release_approved: bool,
}

impl<C: ReleaseClient, A: Authenticator> ReleaseResolver<C, A> {
    pub fn new(client: C, authenticator: A) -> Self {
        Self {
            client,
            authenticator,
            release_approved: false,
        }
    }

    fn prereq_environment_id(
        definition: &ReleaseDefinition,
        prereq_environment: Option<&str>,
    ) -> Option<i32> {
        let name = prereq_environment?;
        definition
            .environments
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
            .map(|e| e.id)
    }

    /// The build id of the newest build of the definition's primary artifact
    /// matching the requested version and/or branch.
    fn version_build_id(
        &self,
        definition: &ReleaseDefinition,
        version: Option<&str>,
        branch: Option<&str>,
        access_token: &str,
    ) -> Result<Option<i32>> {
        let primary = definition
            .artifacts
            .iter()
            .find(|a| a.is_primary)
            .ok_or_else(|| {
                Error::internal_unexpected(format!(
                    "release definition {} has no primary artifact",
                    definition.id
                ))
            })?;

        let build_definition = primary.definition_reference.get("definition").ok_or_else(|| {
            Error::internal_unexpected(format!(
                "primary artifact of release definition {} has no build definition reference",
                definition.id
            ))
        })?;

        let build_definition_id = build_definition.id.parse::<i32>().map_err(|_| {
            Error::internal_unexpected(format!(
                "build definition id '{}' is not numeric",
                build_definition.id
            ))
        })?;

        let builds = self
            .client
            .builds(build_definition_id, access_token, version, branch)?;

        Ok(builds.first().map(|b| b.id))
    }

    fn check_pending_approvals(
        &mut self,
        release_id: i32,
        access_token: &str,
    ) -> Result<DeploymentStatus> {
        if self.release_approved {
            return Ok(DeploymentStatus::InProgress);
        }

        let approvals = self.client.pending_approvals(release_id, access_token)?;
        if approvals.is_empty() {
            self.release_approved = true;
            return Ok(DeploymentStatus::InProgress);
        }

        Ok(DeploymentStatus::PendingApproval)
    }
}

fn map_status(status: EnvironmentStatus) -> DeploymentStatus {
    match status {
        EnvironmentStatus::Canceled => DeploymentStatus::Cancelled,
        EnvironmentStatus::NotStarted => DeploymentStatus::NotStarted,
        EnvironmentStatus::InProgress => DeploymentStatus::InProgress,
        EnvironmentStatus::PartiallySucceeded => DeploymentStatus::Failed,
        EnvironmentStatus::Queued => DeploymentStatus::Queued,
        EnvironmentStatus::Rejected => DeploymentStatus::Failed,
        EnvironmentStatus::Scheduled => DeploymentStatus::Queued,
        EnvironmentStatus::Succeeded => DeploymentStatus::Succeeded,
        EnvironmentStatus::Undefined => DeploymentStatus::Unknown,
    }
}

impl<C: ReleaseClient, A: Authenticator> ReleaseRepository for ReleaseResolver<C, A> {
    fn release_id(
        &self,
        service_name: &str,
        version: Option<&str>,
        branch: Option<&str>,
        prereq_environment: Option<&str>,
    ) -> Result<Option<String>> {
        let service_name = validation::require_non_empty(service_name, "serviceName")?;
        let access_token = self.authenticator.authenticate()?;

        // Search results are relevance-ordered; the first hit is the match.
        let definitions = self.client.release_definitions(service_name, &access_token)?;
        let Some(definition) = definitions.into_iter().next() else {
            return Ok(None);
        };

        let prereq_env_id = Self::prereq_environment_id(&definition, prereq_environment);

        let artifact_version_id = if version.is_some() || branch.is_some() {
            match self.version_build_id(&definition, version, branch, &access_token)? {
                Some(id) => Some(id),
                // The requested version/branch has no build: nothing to deploy.
                None => return Ok(None),
            }
        } else {
            None
        };

        let releases = self.client.releases(
            definition.id,
            &access_token,
            artifact_version_id,
            prereq_env_id,
        )?;

        Ok(releases.first().map(|r| r.id.to_string()))
    }

    fn release_environment_id(
        &self,
        release_id: &str,
        environment_name: &str,
    ) -> Result<Option<String>> {
        let release_id = validation::require_numeric_id(release_id, "releaseId")?;
        let environment_name = validation::require_non_empty(environment_name, "environmentName")?;
        let access_token = self.authenticator.authenticate()?;

        let Some(release) = self.client.release(release_id, &access_token)? else {
            return Ok(None);
        };

        Ok(release
            .environments
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(environment_name))
            .map(|e| e.id.to_string()))
    }

    fn start_environment(&self, release_id: &str, environment_id: &str) -> Result<()> {
        let release_id = validation::require_numeric_id(release_id, "releaseId")?;
        let environment_id = validation::require_numeric_id(environment_id, "environmentId")?;
        let access_token = self.authenticator.authenticate()?;

        self.client
            .start_release_environment(release_id, environment_id, &access_token)
    }

    fn environment_status(
        &mut self,
        release_id: &str,
        environment_id: &str,
    ) -> Result<DeploymentStatus> {
        let release_id = validation::require_numeric_id(release_id, "releaseId")?;
        let environment_id = validation::require_numeric_id(environment_id, "environmentId")?;
        let access_token = self.authenticator.authenticate()?;

        let Some(release) = self.client.release(release_id, &access_token)? else {
            return Ok(DeploymentStatus::Unknown);
        };

        let Some(environment) = release.environments.iter().find(|e| e.id == environment_id)
        else {
            return Ok(DeploymentStatus::Unknown);
        };

        if environment.status == EnvironmentStatus::InProgress {
            return self.check_pending_approvals(release_id, &access_token);
        }

        Ok(map_status(environment.status))
    }

    fn approve_release(&self, release_id: &str) -> Result<()> {
        let release_id = validation::require_numeric_id(release_id, "releaseId")?;
        let access_token = self.authenticator.authenticate()?;

        let approvals = self.client.pending_approvals(release_id, &access_token)?;
        let Some(first) = approvals.first() else {
            return Ok(());
        };

        // One gate per call: polling surfaces any remaining approvals as the
        // running status is re-observed.
        self.client.approve(first.id, &access_token)
    }
}
