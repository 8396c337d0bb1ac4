use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    kmsd::app::run().await
}
