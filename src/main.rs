use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::from_filename("config.env").ok();
    dotenvy::dotenv().ok();

    match tour_booking::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("💥 Shutting down: {}", e);
            eprintln!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}
