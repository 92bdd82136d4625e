use super::common::{LogLevel, init_logging};
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use clap::Parser;
use cloudwatch_exporter::Result;
use cloudwatch_exporter::cloudwatch::CloudWatch;
use cloudwatch_exporter::config::Config;
use cloudwatch_exporter::export::{ProviderApi, RefreshScheduler, RetrievalInstruments, SinkRegistry, compile, retrieve};
use core::time::Duration;
use ohno::IntoAppError;
use std::sync::Arc;

/// Log target for the HTTP endpoint
const LOG_TARGET: &str = "     serve";

/// Reporting granularity and length of the window read on every scrape
const SCRAPE_PERIOD: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Path to configuration file
    #[arg(long, short = 'c', value_name = "PATH", env = "MC_CONFIG")]
    pub config: Utf8PathBuf,

    /// Address to serve metrics on [default: `ListenAddress` from the configuration]
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<String>,

    /// Set the logging level for diagnostic output [default: info, or debug when the configuration enables `Debug`]
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

struct AppState {
    scheduler: RefreshScheduler,
    provider: Arc<dyn ProviderApi>,
    registry: SinkRegistry,
    instruments: RetrievalInstruments,
}

/// Run the exporter until interrupted or until something fatal happens
///
/// # Errors
///
/// Returns an error if the configuration is invalid, if the first discovery pass fails, if a
/// later discovery pass fails, or if the HTTP server fails
pub async fn serve(args: &ServeArgs) -> Result<()> {
    let config = Config::load(&args.config)?;
    init_logging(LogLevel::resolve(args.log_level, config.debug));

    let registry = SinkRegistry::new();
    let rules = compile(config.export_rules(), &registry).into_app_err("invalid export configuration")?;
    let instruments = RetrievalInstruments::register(&registry).into_app_err("unable to register exporter metrics")?;

    let provider: Arc<dyn ProviderApi> = Arc::new(CloudWatch::new(config.region.clone()).await);
    let scheduler = RefreshScheduler::start(rules, Arc::clone(&provider), &registry)
        .await
        .into_app_err("unable to discover the metrics to export")?;

    let state = Arc::new(AppState {
        scheduler,
        provider,
        registry,
        instruments,
    });

    let listen = args.listen.clone().unwrap_or(config.listen_address);
    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .into_app_err_with(|| format!("unable to listen on {listen}"))?;

    log::info!(target: LOG_TARGET, "Serving metrics on http://{listen}/metrics");

    let app = router(Arc::clone(&state));
    tokio::select! {
        result = async { axum::serve(listener, app).await } => result.into_app_err("HTTP server failed"),
        result = state.scheduler.run() => result.into_app_err("unable to refresh the metrics to export"),
        _ = tokio::signal::ctrl_c() => {
            log::info!(target: LOG_TARGET, "Shutting down");
            Ok(())
        }
    }
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .with_state(state)
}

/// Start of the window read by a scrape at `now`: two periods back, aligned to a period boundary.
fn window_start(now: DateTime<Utc>, period: Duration) -> Option<DateTime<Utc>> {
    let period = i64::try_from(period.as_secs()).ok().filter(|&p| p > 0)?;
    let start = now.timestamp().checked_sub(period.checked_mul(2)?)?;
    DateTime::from_timestamp(start - start.rem_euclid(period), 0)
}

async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let Some(start) = window_start(Utc::now(), SCRAPE_PERIOD) else {
        log::error!(target: LOG_TARGET, "Unable to compute the scrape window");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let snapshot = state.scheduler.snapshot();
    if let Err(err) = retrieve(&snapshot, start, SCRAPE_PERIOD, state.provider.as_ref(), &state.instruments).await {
        log::error!(target: LOG_TARGET, "Unable to retrieve metrics: {err:?}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    match state.registry.encode_text() {
        Ok(body) => ([(header::CONTENT_TYPE, SinkRegistry::content_type())], body).into_response(),
        Err(err) => {
            log::error!(target: LOG_TARGET, "Unable to encode metrics: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn health() -> StatusCode {
    StatusCode::OK
}
