use eosforce_lib::cli::Cli;
use eosforce_lib::error::exit_code_for;
use eosforce_lib::{init_logging, start_service};

#[tokio::main(worker_threads = 8)]
async fn main() {
    init_logging();
    let cli: Cli = argh::from_env();

    if let Err(e) = start_service(cli).await {
        tracing::error!("{e:?}");
        std::process::exit(exit_code_for(&e));
    }
}
