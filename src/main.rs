// src/main.rs

use sigwatch::errors::SigwatchError;
use sigwatch::{cli, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level, args.verbose) {
        eprintln!("sigwatch error: {err:?}");
        std::process::exit(1);
    }

    if let Err(err) = run(args).await {
        tracing::error!("{err}");
        eprintln!("sigwatch error: {err}");
        std::process::exit(exit_code(&err));
    }
}

/// A missing signature file exits with 2, everything else with 1.
fn exit_code(err: &SigwatchError) -> i32 {
    match err {
        SigwatchError::SignaturesMissing(_) => 2,
        _ => 1,
    }
}
