//! Wire client for the release-management service.
//!
//! Thin, stateless wrappers over the REST surface: release definitions,
//! releases, builds, environment triggers and approvals. All calls are
//! project-scoped and carry a bearer token supplied by the caller; nothing
//! here retries, so a failed round trip is fatal to the operation in progress.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

use crate::config::DeployOptions;
use crate::error::{Error, Result};

const DEPLOY_COMMENT: &str = "Deployed by conveyor";
const APPROVE_COMMENT: &str = "Approved by conveyor";
const BUILDS_RETURN_TOP: u32 = 1;

/// Environment status as the service reports it. Anything the service adds
/// later lands on `Undefined` rather than failing the decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnvironmentStatus {
    NotStarted,
    InProgress,
    Succeeded,
    PartiallySucceeded,
    Queued,
    Scheduled,
    Canceled,
    Rejected,
    #[serde(other)]
    Undefined,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionEnvironment {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDefinitionRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub definition_reference: HashMap<String, ArtifactDefinitionRef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseDefinition {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub environments: Vec<DefinitionEnvironment>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseEnvironment {
    pub id: i32,
    pub name: String,
    pub status: EnvironmentStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub id: i32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub environments: Vec<ReleaseEnvironment>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub id: i32,
    #[serde(default)]
    pub build_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseApproval {
    pub id: i32,
}

/// Collection envelope the service wraps list responses in.
#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    value: Vec<T>,
}

/// The release-management operations the resolver drives.
pub trait ReleaseClient {
    fn release_definitions(
        &self,
        search_text: &str,
        access_token: &str,
    ) -> Result<Vec<ReleaseDefinition>>;

    fn release_definition(
        &self,
        id: i32,
        access_token: &str,
    ) -> Result<Option<ReleaseDefinition>>;

    fn releases(
        &self,
        definition_id: i32,
        access_token: &str,
        artifact_version_id: Option<i32>,
        prereq_env_id: Option<i32>,
    ) -> Result<Vec<Release>>;

    fn release(&self, id: i32, access_token: &str) -> Result<Option<Release>>;

    fn builds(
        &self,
        definition_id: i32,
        access_token: &str,
        build_number: Option<&str>,
        branch: Option<&str>,
    ) -> Result<Vec<Build>>;

    fn start_release_environment(
        &self,
        release_id: i32,
        environment_id: i32,
        access_token: &str,
    ) -> Result<()>;

    fn pending_approvals(
        &self,
        release_id: i32,
        access_token: &str,
    ) -> Result<Vec<ReleaseApproval>>;

    fn approve(&self, approval_id: i32, access_token: &str) -> Result<()>;
}

/// Blocking HTTP implementation of [`ReleaseClient`].
pub struct HttpReleaseClient {
    client: reqwest::blocking::Client,
    base_url: String,
    project: String,
    options: DeployOptions,
}

impl HttpReleaseClient {
    pub fn new(base_url: &str, project: &str, options: DeployOptions) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            project: project.to_string(),
            options,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.project, path)
    }

    /// Releases are only deployable from a prerequisite environment that
    /// finished cleanly, unless the run opted into partial successes.
    fn environment_status_filter(&self) -> &'static str {
        if self.options.allow_partial {
            "succeeded,partiallySucceeded"
        } else {
            "succeeded"
        }
    }

    fn get_list<T: DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let response = self
            .client
            .get(url)
            .query(query)
            .bearer_auth(access_token)
            .send()
            .map_err(|e| Error::api_request_failed(url, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| Error::api_request_failed(url, e.to_string()))?;

        if !status.is_success() {
            return Err(Error::api_unexpected_response(url, status.as_u16(), body));
        }

        let list: ListResponse<T> = serde_json::from_str(&body)
            .map_err(|e| Error::api_unexpected_response(url, status.as_u16(), e.to_string()))?;

        Ok(list.value)
    }

    /// Single-resource GET; a 404 is a lookup miss, not an error.
    fn get_resource<T: DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<Option<T>> {
        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .map_err(|e| Error::api_request_failed(url, e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response
            .text()
            .map_err(|e| Error::api_request_failed(url, e.to_string()))?;

        if !status.is_success() {
            return Err(Error::api_unexpected_response(url, status.as_u16(), body));
        }

        let resource = serde_json::from_str(&body)
            .map_err(|e| Error::api_unexpected_response(url, status.as_u16(), e.to_string()))?;

        Ok(Some(resource))
    }

    fn patch_json(&self, url: &str, access_token: &str, body: serde_json::Value) -> Result<()> {
        let response = self
            .client
            .patch(url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .map_err(|e| Error::api_request_failed(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::api_unexpected_response(url, status.as_u16(), body));
        }

        Ok(())
    }
}

impl ReleaseClient for HttpReleaseClient {
    fn release_definitions(
        &self,
        search_text: &str,
        access_token: &str,
    ) -> Result<Vec<ReleaseDefinition>> {
        let url = self.url("release/definitions");
        self.get_list(
            &url,
            access_token,
            &[
                ("searchText", search_text.to_string()),
                ("expand", "artifacts,environments".to_string()),
            ],
        )
    }

    fn release_definition(
        &self,
        id: i32,
        access_token: &str,
    ) -> Result<Option<ReleaseDefinition>> {
        let url = self.url(&format!("release/definitions/{}", id));
        self.get_resource(&url, access_token)
    }

    fn releases(
        &self,
        definition_id: i32,
        access_token: &str,
        artifact_version_id: Option<i32>,
        prereq_env_id: Option<i32>,
    ) -> Result<Vec<Release>> {
        let url = self.url("release/releases");

        let mut query = vec![
            ("definitionId", definition_id.to_string()),
            ("statusFilter", "active".to_string()),
            ("expand", "artifacts".to_string()),
        ];

        // The environment-status filter only means anything relative to a
        // concrete artifact version.
        if let Some(artifact_version_id) = artifact_version_id.filter(|id| *id > 0) {
            query.push(("artifactVersionId", artifact_version_id.to_string()));
            query.push((
                "environmentStatusFilter",
                self.environment_status_filter().to_string(),
            ));
        }

        if let Some(prereq_env_id) = prereq_env_id.filter(|id| *id > 0) {
            query.push(("definitionEnvironmentId", prereq_env_id.to_string()));
        }

        self.get_list(&url, access_token, &query)
    }

    fn release(&self, id: i32, access_token: &str) -> Result<Option<Release>> {
        let url = self.url(&format!("release/releases/{}", id));
        self.get_resource(&url, access_token)
    }

    fn builds(
        &self,
        definition_id: i32,
        access_token: &str,
        build_number: Option<&str>,
        branch: Option<&str>,
    ) -> Result<Vec<Build>> {
        let url = self.url("build/builds");

        let mut query = vec![("definitionId", definition_id.to_string())];
        if let Some(build_number) = build_number {
            query.push(("buildNumber", build_number.to_string()));
        }
        if let Some(branch) = branch {
            query.push(("branchName", branch.to_string()));
            query.push(("top", BUILDS_RETURN_TOP.to_string()));
        }

        self.get_list(&url, access_token, &query)
    }

    fn start_release_environment(
        &self,
        release_id: i32,
        environment_id: i32,
        access_token: &str,
    ) -> Result<()> {
        log_status!(
            "release",
            "triggering release {} environment {}",
            release_id,
            environment_id
        );

        let url = self.url(&format!(
            "release/releases/{}/environments/{}",
            release_id, environment_id
        ));
        self.patch_json(
            &url,
            access_token,
            json!({ "status": "inProgress", "comment": DEPLOY_COMMENT }),
        )
    }

    fn pending_approvals(
        &self,
        release_id: i32,
        access_token: &str,
    ) -> Result<Vec<ReleaseApproval>> {
        let url = self.url("release/approvals");
        self.get_list(
            &url,
            access_token,
            &[
                ("releaseId", release_id.to_string()),
                ("statusFilter", "pending".to_string()),
            ],
        )
    }

    fn approve(&self, approval_id: i32, access_token: &str) -> Result<()> {
        log_status!("release", "approving approval {}", approval_id);

        let url = self.url(&format!("release/approvals/{}", approval_id));
        self.patch_json(
            &url,
            access_token,
            json!({ "status": "approved", "comments": APPROVE_COMMENT }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_definition_parses_artifacts_and_environments() {
        let json = r#"{
            "id": 7,
            "name": "checkout-service",
            "environments": [
                { "id": 20, "name": "Staging" },
                { "id": 21, "name": "Production" }
            ],
            "artifacts": [
                {
                    "isPrimary": true,
                    "definitionReference": {
                        "definition": { "id": "311", "name": "checkout-ci" }
                    }
                }
            ]
        }"#;

        let definition: ReleaseDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(definition.id, 7);
        assert_eq!(definition.environments[1].name, "Production");
        assert!(definition.artifacts[0].is_primary);
        assert_eq!(
            definition.artifacts[0].definition_reference["definition"].id,
            "311"
        );
    }

    #[test]
    fn unrecognized_environment_status_decodes_as_undefined() {
        let json = r#"{ "id": 3, "name": "Staging", "status": "somethingNew" }"#;
        let environment: ReleaseEnvironment = serde_json::from_str(json).unwrap();
        assert_eq!(environment.status, EnvironmentStatus::Undefined);
    }

    #[test]
    fn list_envelope_unwraps_value() {
        let json = r#"{ "count": 2, "value": [ { "id": 1 }, { "id": 2 } ] }"#;
        let list: ListResponse<ReleaseApproval> = serde_json::from_str(json).unwrap();
        assert_eq!(list.value.len(), 2);
        assert_eq!(list.value[1].id, 2);
    }

    #[test]
    fn environment_status_filter_follows_allow_partial() {
        let strict = HttpReleaseClient::new("https://x/api", "p", DeployOptions::default());
        assert_eq!(strict.environment_status_filter(), "succeeded");

        let lenient = HttpReleaseClient::new(
            "https://x/api",
            "p",
            DeployOptions {
                allow_partial: true,
                ..Default::default()
            },
        );
        assert_eq!(
            lenient.environment_status_filter(),
            "succeeded,partiallySucceeded"
        );
    }

    #[test]
    fn urls_are_project_scoped() {
        let client = HttpReleaseClient::new("https://x/api/", "acme", DeployOptions::default());
        assert_eq!(
            client.url("release/releases/9"),
            "https://x/api/acme/release/releases/9"
        );
    }
}
