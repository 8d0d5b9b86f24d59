//! Run the upload check against the API configured in the environment.
//!
//! ```text
//! SKETCH_API_BASE_URL=http://127.0.0.1:3000/api \
//! SKETCH_SESSION_COOKIE=alice-session \
//! cargo run -p sketch-client --example upload
//! ```
//!
//! Set `SKETCH_CLEANUP=true` to delete the sketch afterwards.

use sketch_client::{run_upload, ClientConfig, UploadOptions};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let client = ClientConfig::from_env()?.into_client()?;
    let cleanup = matches!(
        std::env::var("SKETCH_CLEANUP").as_deref(),
        Ok("1" | "true" | "yes")
    );
    let options = UploadOptions {
        cleanup,
        ..UploadOptions::default()
    };

    let report = run_upload(&client, &options)?;
    tracing::info!(
        id = %report.project.id,
        sketches = report.listed.len(),
        deleted = report.deleted,
        "upload check finished"
    );
    Ok(())
}
