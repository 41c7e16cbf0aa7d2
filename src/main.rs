use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{auth, deploy, GlobalArgs};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "conveyor")]
#[command(version = VERSION)]
#[command(about = "CLI for promoting products through a deployment pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a product version to an environment
    Deploy(deploy::DeployArgs),
    /// Inspect or bootstrap pipeline authorization
    Auth(auth::AuthArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let global = GlobalArgs {};

    let (json_result, exit_code) = match cli.command {
        Commands::Deploy(args) => output::map_cmd_result_to_json(deploy::run(args, &global)),
        Commands::Auth(args) => output::map_cmd_result_to_json(auth::run(args, &global)),
    };

    output::print_json_result(json_result);

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
