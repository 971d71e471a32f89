use relay::startup::run;

use std::process::ExitCode;

use log::error;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // The logger may not be up yet.
            error!("Relay stopped: {e}");
            eprintln!("relay: {e}");
            ExitCode::FAILURE
        }
    }
}
