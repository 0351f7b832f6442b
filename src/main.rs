use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use polishpic_lib::session::SessionOrchestrator;
use polishpic_lib::settings::store::PreferencesStore;
use polishpic_lib::settings::types::AppConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How long to wait for the face guide before giving up.
const ALIGN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let config_path = AppConfig::default_path();
    let config = match AppConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("invalid config {}: {e}", config_path.display());
            return ExitCode::FAILURE;
        }
    };

    let preferences = Arc::new(PreferencesStore::new(config.preferences_path.clone()));
    preferences.start_debounce_task();

    let session = polishpic_lib::build_session(
        &config,
        polishpic_lib::create_frame_source(),
        polishpic_lib::create_detector(&config),
    )
    .with_preferences(Arc::clone(&preferences));

    let outcome = run(&session, &config).await;
    session.close();
    if let Err(e) = preferences.flush() {
        tracing::warn!("failed to save preferences: {e}");
    }

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("polishpic=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(env_filter)
            .init();
    }
}

/// Start, wait for alignment, capture, composite and write the result.
///
/// An optional first argument sets the enhancement subtlety (0-100).
async fn run(session: &SessionOrchestrator, config: &AppConfig) -> Result<(), String> {
    let stream = session.start().map_err(|e| e.to_string())?;
    tracing::info!(
        "camera {} open at {}x{}",
        stream.device_id,
        stream.width,
        stream.height
    );

    session
        .wait_until_aligned(ALIGN_TIMEOUT)
        .await
        .map_err(|e| e.to_string())?;
    session.capture().await.map_err(|e| e.to_string())?;

    if let Some(arg) = std::env::args().nth(1) {
        let subtlety: i64 = arg
            .parse()
            .map_err(|_| format!("subtlety must be a number, got {arg:?}"))?;
        session
            .adjust_params(subtlety)
            .await
            .map_err(|e| e.to_string())?;
    }

    if session.snapshot().composite.is_none() {
        let first = session
            .catalog()
            .first()
            .map(|b| b.id)
            .ok_or_else(|| "backdrop catalog is empty".to_string())?;
        session
            .select_backdrop(first)
            .await
            .map_err(|e| e.to_string())?;
    }

    let encoded = session
        .export(config.output_format)
        .map_err(|e| e.to_string())?;
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|e| format!("{}: {e}", config.output_dir.display()))?;
    let path = config
        .output_dir
        .join(format!("headshot.{}", encoded.format.extension()));
    tokio::fs::write(&path, &encoded.bytes)
        .await
        .map_err(|e| format!("{}: {e}", path.display()))?;

    tracing::info!("wrote {} ({} bytes)", path.display(), encoded.bytes.len());
    Ok(())
}
