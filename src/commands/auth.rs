use clap::{Args, Subcommand};
use serde::Serialize;

use conveyor::auth::{self, AuthStatus};
use conveyor::config::PipelineConfig;

use super::CmdResult;

#[derive(Args)]
pub struct AuthArgs {
    #[command(subcommand)]
    command: AuthCommand,
}

#[derive(Subcommand)]
enum AuthCommand {
    /// Show whether the pipeline service authorization is usable
    Status,
    /// Print the authorization URL for the one-time consent step
    Url,
}

#[derive(Serialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum AuthOutput {
    Status {
        #[serde(flatten)]
        status: AuthStatus,
    },
    #[serde(rename_all = "camelCase")]
    Url {
        authorization_url: String,
    },
}

pub fn run(args: AuthArgs, _global: &super::GlobalArgs) -> CmdResult<AuthOutput> {
    match args.command {
        AuthCommand::Status => {
            let status = auth::status()?;
            Ok((AuthOutput::Status { status }, 0))
        }
        AuthCommand::Url => {
            let config = PipelineConfig::load_default()?;
            Ok((
                AuthOutput::Url {
                    authorization_url: auth::authorization_url(&config),
                },
                0,
            ))
        }
    }
}
