use clap::Parser;
use std::process;

use tasktrack::cli::commands::{Cli, Commands};
use tasktrack::cli::{self, Context};
use tracing_subscriber::EnvFilter;

fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tasktrack=info,tower_http=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli_args = Cli::parse();
    let json_output = cli_args.json;

    let result = Context::load(json_output, cli_args.data_dir.as_deref()).and_then(|ctx| {
        match cli_args.command {
            Commands::Init => cli::init::run(&ctx),
            Commands::Serve { addr } => cli::serve::run(addr, &ctx),
            Commands::Task(cmd) => cli::task::run(cmd, &ctx),
            Commands::Project(cmd) => cli::project::run(cmd, &ctx),
            Commands::Sync { refresh, wait } => cli::sync::run(refresh, wait, &ctx),
            Commands::Queue => cli::queue::run(&ctx),
        }
    });

    process::exit(cli::finish(result, json_output));
}
