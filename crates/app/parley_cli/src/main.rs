pub use self::error::{Error, Result};
mod error;

use clap::Parser;
use cli::{Cli, Commands, ToolsCommand};
use tracing::error;

mod cli;
mod commands;
mod logging;
mod runtime;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    logging::init()?;

    let args = Cli::parse();

    match args.command {
        Commands::Run {
            variant,
            strict_transport,
        } => commands::run(variant, strict_transport).await?,
        Commands::Tools { command } => match command {
            ToolsCommand::List { json } => commands::tools_list(json).await?,
            ToolsCommand::Call { name, args } => commands::tools_call(&name, &args).await?,
            ToolsCommand::Inspect { path, json } => commands::tools_inspect(&path, json)?,
        },
        Commands::Search {
            query,
            limit,
            legacy,
        } => commands::search(&query, limit, legacy).await?,
        Commands::Version => {
            println!("{} {}", env!("CARGO_BIN_NAME"), parley_core::version());
        }
    }

    Ok(())
}
