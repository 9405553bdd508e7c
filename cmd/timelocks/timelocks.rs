use clap::Parser;
use timelocks::{cli::CLI, initializers::init_tracing};
use tracing::error;

#[tokio::main]
async fn main() {
    let CLI { opts, command } = CLI::parse();
    init_tracing(&opts);

    if let Err(err) = command.run().await {
        error!("{err:?}");
        std::process::exit(1);
    }
}
