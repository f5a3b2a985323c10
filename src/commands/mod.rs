mod probe;
mod utils;
mod vectorize;

use crate::cli::{Cli, Commands, GlobalOptions};
use logotrace::VectorizeResult;

/// The main function to run the command based on CLI input.
pub async fn run(cli: Cli) -> VectorizeResult<()> {
    let Cli { global, command } = cli;
    dispatch(&global, command).await
}

/// Dispatch the command to the appropriate handler.
async fn dispatch(global: &GlobalOptions, command: Commands) -> VectorizeResult<()> {
    match command {
        Commands::Vectorize(cmd) => vectorize::run(global, cmd).await,
        Commands::Probe(cmd) => probe::run(global, cmd),
    }
}
