use bulkdl_core::logging;

mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    // Log to the state file when possible; the CLI must not crash over logging.
    if logging::init_logging().is_err() {
        logging::init_logging_stderr();
    }

    match Cli::run_from_args().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("bulkdl error: {:#}", err);
            std::process::exit(cli::EXIT_ERROR);
        }
    }
}
