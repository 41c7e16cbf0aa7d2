use clap::Args;
use std::path::PathBuf;

use conveyor::config::DeployOptions;
use conveyor::deploy::{self, DeployRunOutput};

use super::CmdResult;

#[derive(Args)]
pub struct DeployArgs {
    /// Product name as listed in the manifest
    pub product: String,

    /// Target environment to promote into
    pub environment: String,

    /// Product version to deploy
    #[arg(short = 'v', long)]
    pub version: Option<String>,

    /// Code branch the deployed artifacts must come from
    #[arg(short = 'b', long)]
    pub branch: Option<String>,

    /// Consider partially succeeded prerequisite environments deployable
    #[arg(short = 'p', long)]
    pub allow_partial: bool,

    /// Resolve everything but trigger nothing
    #[arg(short = 'w', long)]
    pub what_if: bool,

    /// Path to the product manifest (defaults to ./manifest.json)
    #[arg(long)]
    pub manifest: Option<PathBuf>,
}

pub fn run(args: DeployArgs, _global: &super::GlobalArgs) -> CmdResult<DeployRunOutput> {
    let options = DeployOptions {
        what_if: args.what_if,
        allow_partial: args.allow_partial,
    };

    let result = deploy::run(
        &args.product,
        &args.environment,
        args.version.as_deref(),
        args.branch.as_deref(),
        args.manifest,
        options,
    )?;

    let exit_code = if result.halted_on.is_some() { 1 } else { 0 };

    Ok((result, exit_code))
}
