//! Product deployment orchestration.
//!
//! Walks the ordered service list of one product version, one service at a
//! time: trigger, poll to a terminal status, stop at the first service that
//! fails to start or finish successfully. There is never more than one
//! deployment in flight, and no retries happen at this layer.

use serde::Serialize;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use crate::auth::{HttpTransport, OAuthAuthenticator};
use crate::client::HttpReleaseClient;
use crate::config::{DeployOptions, PipelineConfig};
use crate::error::Result;
use crate::executor::{DeploymentExecutor, ServiceDeploymentExecutor};
use crate::manifest::{JsonFileManifestSource, ManifestSource, ProductManifest};
use crate::release::ReleaseResolver;
use crate::status::DeploymentStatus;
use crate::token::{JsonFileTokenStore, SystemClock};
use crate::utils::validation;

const MANIFEST_FILENAME: &str = "manifest.json";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDeployResult {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub started: bool,
    /// Terminal status observed by polling; absent for what-if runs and for
    /// services that never started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DeploymentStatus>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploySummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Outcome of one product deployment run, including which service (if any)
/// halted the rollout and with what status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDeployRun {
    pub version_found: bool,
    pub services: Vec<ServiceDeployResult>,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted_on: Option<String>,
    pub summary: DeploySummary,
}

impl ProductDeployRun {
    fn no_matching_version() -> Self {
        Self {
            version_found: false,
            services: Vec::new(),
            completed: false,
            halted_on: None,
            summary: DeploySummary {
                attempted: 0,
                succeeded: 0,
                failed: 0,
            },
        }
    }
}

/// Drives one product version's services to completion, strictly in manifest
/// order.
pub struct SequentialDeploymentHandler<E: ServiceDeploymentExecutor> {
    executor: E,
    poll_interval: Duration,
    options: DeployOptions,
}

impl<E: ServiceDeploymentExecutor> SequentialDeploymentHandler<E> {
    pub fn new(executor: E, poll_interval: Duration, options: DeployOptions) -> Self {
        Self {
            executor,
            poll_interval,
            options,
        }
    }

    pub fn deploy(
        &mut self,
        manifest: &ProductManifest,
        environment: &str,
        version: Option<&str>,
        branch: Option<&str>,
    ) -> Result<ProductDeployRun> {
        let environment = validation::require_non_empty(environment, "environment")?;

        let Some(product_version) = manifest
            .versions
            .iter()
            .find(|v| v.version.as_deref() == version)
        else {
            log_status!(
                "deploy",
                "product [{}] has no version [{}], nothing to deploy",
                manifest.name,
                version.unwrap_or("<none>")
            );
            return Ok(ProductDeployRun::no_matching_version());
        };

        let mut services = Vec::new();
        let mut halted_on = None;

        for service in &product_version.services {
            log_status!(
                "deploy",
                "starting deployment: [{}] [{}] [{}] [{}]",
                service.name,
                environment,
                service.version.as_deref().unwrap_or("<latest>"),
                manifest.prereq_environment.as_deref().unwrap_or("-")
            );

            let started = self.executor.deploy(
                &service.name,
                environment,
                service.version.as_deref(),
                branch,
                manifest.prereq_environment.as_deref(),
            )?;

            if !started {
                services.push(ServiceDeployResult {
                    name: service.name.clone(),
                    version: service.version.clone(),
                    started: false,
                    status: None,
                });
                halted_on = Some(service.name.clone());
                break;
            }

            if self.options.what_if {
                services.push(ServiceDeployResult {
                    name: service.name.clone(),
                    version: service.version.clone(),
                    started: true,
                    status: None,
                });
                continue;
            }

            let status =
                self.wait_for_completion(&service.name, environment, service.version.as_deref())?;

            let succeeded = status == DeploymentStatus::Succeeded;
            services.push(ServiceDeployResult {
                name: service.name.clone(),
                version: service.version.clone(),
                started: true,
                status: Some(status),
            });

            if !succeeded {
                halted_on = Some(service.name.clone());
                break;
            }
        }

        let attempted = services.len();
        let succeeded = services
            .iter()
            .filter(|s| {
                s.status == Some(DeploymentStatus::Succeeded)
                    || (self.options.what_if && s.started)
            })
            .count();

        Ok(ProductDeployRun {
            version_found: true,
            completed: halted_on.is_none(),
            halted_on,
            summary: DeploySummary {
                attempted,
                succeeded,
                failed: attempted - succeeded,
            },
            services,
        })
    }

    /// Polls one service to a non-pollable status, sleeping the configured
    /// interval between checks. Unbounded until the service settles.
    fn wait_for_completion(
        &mut self,
        service_name: &str,
        environment: &str,
        version: Option<&str>,
    ) -> Result<DeploymentStatus> {
        let mut count: u32 = 0;
        loop {
            count += 1;
            let status = self
                .executor
                .deployment_status(service_name, environment, version)?;

            log_status!("status", "deployment status: {:>2} [{}]", count, status);

            if !status.is_pollable() {
                return Ok(status);
            }

            thread::sleep(self.poll_interval);
        }
    }
}

/// Full deployment run output, as produced for the CLI.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRunOutput {
    pub product: String,
    pub environment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub what_if: bool,
    pub product_found: bool,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted_on: Option<String>,
    pub services: Vec<ServiceDeployResult>,
    pub summary: DeploySummary,
}

/// Resolve the manifest and drive the whole product rollout.
///
/// Wires the production chain: file-backed config, token store and manifest,
/// OAuth authenticator, HTTP release client, resolver, executor, handler. A
/// fresh chain per run keeps the token cache and the per-release approval
/// flag scoped to this deployment.
pub fn run(
    product: &str,
    environment: &str,
    version: Option<&str>,
    branch: Option<&str>,
    manifest_path: Option<PathBuf>,
    options: DeployOptions,
) -> Result<DeployRunOutput> {
    let product = validation::require_non_empty(product, "product")?;
    let environment = validation::require_non_empty(environment, "environment")?;

    let config = PipelineConfig::load_default()?;

    let branch = branch
        .map(str::to_string)
        .or_else(|| config.default_branch.clone());

    let manifest_source = JsonFileManifestSource::new(
        manifest_path.unwrap_or_else(|| PathBuf::from(MANIFEST_FILENAME)),
    );

    let Some(manifest) = manifest_source.manifest(product, version)? else {
        log_status!(
            "deploy",
            "could not find product [{}] version [{}] in the manifest",
            product,
            version.unwrap_or("<none>")
        );
        return Ok(DeployRunOutput {
            product: product.to_string(),
            environment: environment.to_string(),
            version: version.map(String::from),
            branch,
            what_if: options.what_if,
            product_found: false,
            completed: false,
            halted_on: None,
            services: Vec::new(),
            summary: DeploySummary {
                attempted: 0,
                succeeded: 0,
                failed: 0,
            },
        });
    };

    let authenticator = OAuthAuthenticator::new(
        config.clone(),
        JsonFileTokenStore::at_default_path()?,
        HttpTransport::new(),
        SystemClock,
    );
    let client = HttpReleaseClient::new(&config.base_url, &config.project, options);
    let resolver = ReleaseResolver::new(client, authenticator);
    let executor = DeploymentExecutor::new(resolver, options);
    let mut handler = SequentialDeploymentHandler::new(
        executor,
        Duration::from_secs(config.status_check_interval_secs),
        options,
    );

    let run = handler.deploy(&manifest, environment, version, branch.as_deref())?;

    Ok(DeployRunOutput {
        product: product.to_string(),
        environment: environment.to_string(),
        version: version.map(String::from),
        branch,
        what_if: options.what_if,
        product_found: true,
        completed: run.completed,
        halted_on: run.halted_on,
        services: run.services,
        summary: run.summary,
    })
}
