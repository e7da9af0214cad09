//! Fatigue Prediction API Server
//!
//! Stateless HTTP front end for single-frame classifiers: every request
//! carries one frame and gets one probability back. Persistence across
//! frames is left to the client.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use camera_capture::VideoFrame;
use dms::{ClassifierProfile, DmsError};
use inference_engine::{Classifier, CropRegion, InferenceError, Preprocessor};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tower_governor::GovernorLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub mod config;
pub mod error;
pub mod rate_limit;
mod routes;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use rate_limit::{create_governor_config, RateLimitConfig};
pub use routes::predict::{decode_image_payload, PredictRequest, PredictResponse};

/// Application state shared across handlers; immutable after startup
pub struct AppState {
    pub classifier: Arc<dyn Classifier>,
    pub preprocessor: Preprocessor,
    pub profile: ClassifierProfile,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create application state; only single-frame profiles can be served
    pub fn new(profile: ClassifierProfile, classifier: Arc<dyn Classifier>) -> Result<Self, DmsError> {
        profile.validate()?;
        if profile.is_sequence() {
            return Err(DmsError::Config(format!(
                "profile {} needs a frame window and cannot be served per request",
                profile.name
            )));
        }

        Ok(Self {
            preprocessor: Preprocessor::new(profile.contract)?,
            classifier,
            profile,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Preprocess the whole frame and run the classifier on it
    pub fn classify_frame(&self, frame: &VideoFrame) -> Result<f32, InferenceError> {
        let prepared = self.preprocessor.prepare(frame, CropRegion::full(frame))?;
        let input = Preprocessor::batch_single(prepared.sample).into_dyn();
        self.classifier.classify(input.view())
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/predict", post(routes::predict::predict_handler))
        .route("/api/v1/health", get(routes::health::health_handler))
        .route("/metrics", get(routes::health::metrics_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}

/// Install the Prometheus recorder
pub fn init_metrics() -> Result<PrometheusHandle, ApiError> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ApiError::internal(format!("failed to install metrics recorder: {}", e)))
}

/// Run the server until the process is interrupted
pub async fn run_server(config: &ServerConfig) -> anyhow::Result<()> {
    let profile = config.profile()?;
    profile.log_summary();
    let classifier = config.classifier.build_classifier(&profile)?;

    let mut state = AppState::new(profile, classifier)?;
    match init_metrics() {
        Ok(handle) => state = state.with_metrics(handle),
        Err(e) => warn!("{}", e),
    }

    let governor = create_governor_config(&config.rate_limit)?;
    let app = create_router(Arc::new(state), config.max_body_bytes)
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(GovernorLayer { config: governor });

    let addr = config.addr()?;
    info!("Starting prediction server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down prediction server");
        })
        .await?;

    Ok(())
}
