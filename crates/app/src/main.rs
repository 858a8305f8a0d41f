use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use murmur_app::config::AppSettings;
use murmur_app::runtime;

fn init_logging(log_dir: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "murmur.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout.and(non_blocking_file))
        .with_env_filter(log_level)
        .init();
    // The guard must outlive main for the file writer to keep flushing.
    std::mem::forget(guard);
    Ok(())
}

fn load_settings() -> anyhow::Result<AppSettings> {
    if let Some(path) = std::env::args().nth(1) {
        return AppSettings::load(path);
    }
    let default_path = Path::new("murmur.toml");
    if default_path.exists() {
        return AppSettings::load(default_path);
    }
    Ok(AppSettings::default())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = load_settings()?;
    init_logging(&settings.device.log_dir)?;
    tracing::info!(device_id = %settings.device.device_id, "starting murmur");

    runtime::run(settings).await?;

    tracing::info!("shutdown complete");
    Ok(())
}
