//! End-to-end deployment flow over an in-memory pipeline service.
//!
//! Wires the real chain (token store, authenticator, resolver, executor,
//! sequential handler) against a scripted `ReleaseClient`, and checks the
//! sequencing laws: every service triggers in order on success, and the
//! rollout halts at the first non-succeeded service.

use chrono::Utc;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use conveyor::auth::{OAuthAuthenticator, RefreshTransport};
use conveyor::client::{
    Artifact, ArtifactDefinitionRef, Build, DefinitionEnvironment, EnvironmentStatus, Release,
    ReleaseApproval, ReleaseClient, ReleaseDefinition, ReleaseEnvironment,
};
use conveyor::config::{DeployOptions, PipelineConfig};
use conveyor::deploy::SequentialDeploymentHandler;
use conveyor::executor::DeploymentExecutor;
use conveyor::manifest::{JsonFileManifestSource, ManifestSource};
use conveyor::release::ReleaseResolver;
use conveyor::status::DeploymentStatus;
use conveyor::token::{AccessTokenSet, JsonFileTokenStore, SystemClock, TokenStore};
use conveyor::Result;

/// Scripted release-management service.
///
/// Environment statuses are served per release fetch; the environment-id
/// lookup also fetches the release, so timelines account for every fetch and
/// the last entry repeats once the script runs out.
#[derive(Default)]
struct FakePipeline {
    definitions: Vec<ReleaseDefinition>,
    releases_by_definition: HashMap<i32, Vec<Release>>,
    builds_by_definition: HashMap<i32, Vec<Build>>,
    status_timelines: RefCell<HashMap<i32, VecDeque<EnvironmentStatus>>>,
    triggered: RefCell<Vec<(i32, i32)>>,
}

impl FakePipeline {
    fn next_status(&self, release_id: i32) -> EnvironmentStatus {
        let mut timelines = self.status_timelines.borrow_mut();
        let timeline = timelines.get_mut(&release_id).expect("unknown release");
        if timeline.len() > 1 {
            timeline.pop_front().unwrap()
        } else {
            *timeline.front().expect("empty status timeline")
        }
    }
}

impl ReleaseClient for &FakePipeline {
    fn release_definitions(
        &self,
        search_text: &str,
        _access_token: &str,
    ) -> Result<Vec<ReleaseDefinition>> {
        Ok(self
            .definitions
            .iter()
            .filter(|d| d.name == search_text)
            .cloned()
            .collect())
    }

    fn release_definition(
        &self,
        id: i32,
        _access_token: &str,
    ) -> Result<Option<ReleaseDefinition>> {
        Ok(self.definitions.iter().find(|d| d.id == id).cloned())
    }

    fn releases(
        &self,
        definition_id: i32,
        _access_token: &str,
        _artifact_version_id: Option<i32>,
        _prereq_env_id: Option<i32>,
    ) -> Result<Vec<Release>> {
        Ok(self
            .releases_by_definition
            .get(&definition_id)
            .cloned()
            .unwrap_or_default())
    }

    fn release(&self, id: i32, _access_token: &str) -> Result<Option<Release>> {
        let status = self.next_status(id);
        Ok(Some(Release {
            id,
            name: None,
            environments: vec![ReleaseEnvironment {
                id: id * 10,
                name: "Production".to_string(),
                status,
            }],
        }))
    }

    fn builds(
        &self,
        definition_id: i32,
        _access_token: &str,
        _build_number: Option<&str>,
        _branch: Option<&str>,
    ) -> Result<Vec<Build>> {
        Ok(self
            .builds_by_definition
            .get(&definition_id)
            .cloned()
            .unwrap_or_default())
    }

    fn start_release_environment(
        &self,
        release_id: i32,
        environment_id: i32,
        _access_token: &str,
    ) -> Result<()> {
        self.triggered.borrow_mut().push((release_id, environment_id));
        Ok(())
    }

    fn pending_approvals(
        &self,
        _release_id: i32,
        _access_token: &str,
    ) -> Result<Vec<ReleaseApproval>> {
        Ok(Vec::new())
    }

    fn approve(&self, _approval_id: i32, _access_token: &str) -> Result<()> {
        Ok(())
    }
}

/// Transport that must never be reached: the persisted token is fresh.
struct UnreachableTransport;

impl RefreshTransport for UnreachableTransport {
    fn post_form(&self, _url: &str, _form: &[(&str, String)]) -> Result<String> {
        panic!("token refresh should not happen with a fresh token");
    }
}

fn definition(id: i32, name: &str, build_definition_id: i32) -> ReleaseDefinition {
    ReleaseDefinition {
        id,
        name: name.to_string(),
        environments: vec![DefinitionEnvironment {
            id: 1,
            name: "Staging".to_string(),
        }],
        artifacts: vec![Artifact {
            is_primary: true,
            definition_reference: HashMap::from([(
                "definition".to_string(),
                ArtifactDefinitionRef {
                    id: build_definition_id.to_string(),
                    name: None,
                },
            )]),
        }],
    }
}

fn release(id: i32) -> Release {
    Release {
        id,
        name: None,
        environments: Vec::new(),
    }
}

fn config() -> PipelineConfig {
    serde_json::from_str(
        r#"{
            "baseUrl": "https://pipelines.example.com/api",
            "project": "acme",
            "tokenUrl": "https://auth.example.com/oauth2/token",
            "authorizeUrl": "https://auth.example.com/oauth2/authorize",
            "clientId": "client-1",
            "clientSecret": "s3cret",
            "callbackUrl": "https://localhost/callback",
            "userId": "user-9",
            "scopes": ["release.read", "release.execute"]
        }"#,
    )
    .unwrap()
}

const MANIFEST_JSON: &str = r#"{
    "products": [
        {
            "name": "storefront",
            "prereqEnvironment": "Staging",
            "versions": [
                {
                    "version": "1.0.0",
                    "services": [
                        { "name": "checkout-service", "version": "1.4.2" },
                        { "name": "catalog-service", "version": "2.0.1" },
                        { "name": "search-service", "version": "0.9.0" }
                    ]
                }
            ]
        }
    ]
}"#;

struct Workspace {
    _dir: tempfile::TempDir,
    tokens_path: std::path::PathBuf,
    manifest: JsonFileManifestSource,
}

fn workspace() -> Workspace {
    let dir = tempfile::tempdir().unwrap();

    let tokens_path = dir.path().join("tokens.json");
    let store = JsonFileTokenStore::new(tokens_path.clone());
    store
        .save_tokens(&AccessTokenSet {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            token_type: "jwt-bearer".to_string(),
            expires_in: 3600,
            acquired: Utc::now(),
        })
        .unwrap();

    let manifest_path = dir.path().join("manifest.json");
    std::fs::write(&manifest_path, MANIFEST_JSON).unwrap();

    Workspace {
        tokens_path,
        manifest: JsonFileManifestSource::new(manifest_path),
        _dir: dir,
    }
}

fn pipeline_with_statuses(
    timelines: &[(i32, &[EnvironmentStatus])],
) -> FakePipeline {
    let mut pipeline = FakePipeline {
        definitions: vec![
            definition(7, "checkout-service", 311),
            definition(8, "catalog-service", 312),
            definition(9, "search-service", 313),
        ],
        ..Default::default()
    };

    pipeline
        .releases_by_definition
        .insert(7, vec![release(100)]);
    pipeline
        .releases_by_definition
        .insert(8, vec![release(200)]);
    pipeline
        .releases_by_definition
        .insert(9, vec![release(300)]);

    pipeline.builds_by_definition.insert(311, vec![Build { id: 41, build_number: None }]);
    pipeline.builds_by_definition.insert(312, vec![Build { id: 42, build_number: None }]);
    pipeline.builds_by_definition.insert(313, vec![Build { id: 43, build_number: None }]);

    for (release_id, timeline) in timelines {
        pipeline
            .status_timelines
            .borrow_mut()
            .insert(*release_id, timeline.iter().copied().collect());
    }

    pipeline
}

fn run_deploy(
    pipeline: &FakePipeline,
    ws: &Workspace,
) -> conveyor::deploy::ProductDeployRun {
    let authenticator = OAuthAuthenticator::new(
        config(),
        JsonFileTokenStore::new(ws.tokens_path.clone()),
        UnreachableTransport,
        SystemClock,
    );

    let resolver = ReleaseResolver::new(pipeline, authenticator);
    let executor = DeploymentExecutor::new(resolver, DeployOptions::default());
    let mut handler =
        SequentialDeploymentHandler::new(executor, Duration::ZERO, DeployOptions::default());

    let manifest = ws
        .manifest
        .manifest("storefront", Some("1.0.0"))
        .unwrap()
        .unwrap();

    handler
        .deploy(&manifest, "Production", Some("1.0.0"), None)
        .unwrap()
}

#[test]
fn services_deploy_sequentially_to_success() {
    use EnvironmentStatus::{InProgress, Succeeded};

    let ws = workspace();
    // checkout-service takes one in-progress poll before succeeding; the
    // other two succeed on their first poll.
    let pipeline = pipeline_with_statuses(&[
        (100, &[InProgress, InProgress, InProgress, Succeeded][..]),
        (200, &[Succeeded][..]),
        (300, &[Succeeded][..]),
    ]);

    let run = run_deploy(&pipeline, &ws);

    assert!(run.completed);
    assert_eq!(run.summary.succeeded, 3);
    assert_eq!(
        *pipeline.triggered.borrow(),
        vec![(100, 1000), (200, 2000), (300, 3000)]
    );
    assert!(run
        .services
        .iter()
        .all(|s| s.status == Some(DeploymentStatus::Succeeded)));
}

#[test]
fn rollout_halts_at_first_failed_service() {
    use EnvironmentStatus::{Rejected, Succeeded};

    let ws = workspace();
    let pipeline = pipeline_with_statuses(&[
        (100, &[Succeeded][..]),
        (200, &[Rejected][..]),
        (300, &[Succeeded][..]),
    ]);

    let run = run_deploy(&pipeline, &ws);

    assert!(!run.completed);
    assert_eq!(run.halted_on.as_deref(), Some("catalog-service"));
    // The third service is never triggered.
    assert_eq!(*pipeline.triggered.borrow(), vec![(100, 1000), (200, 2000)]);
    assert_eq!(
        run.services.last().unwrap().status,
        Some(DeploymentStatus::Failed)
    );
}
