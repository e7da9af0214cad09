//! Single-frame prediction route

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use camera_capture::decode_still;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Request body: one base64 encoded JPEG/PNG frame
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub image: Option<String>,
}

/// Response body
#[derive(Debug, Serialize, PartialEq)]
pub struct PredictResponse {
    pub status: &'static str,
    /// Raw classifier output
    pub probability: f32,
}

/// Decode a base64 payload, accepting `data:image/...;base64,` URLs
pub fn decode_image_payload(payload: &str) -> ApiResult<Vec<u8>> {
    let payload = payload.trim();
    let encoded = match payload.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| ApiError::bad_request("Malformed data URL"))?,
        None => payload,
    };
    if encoded.is_empty() {
        return Err(ApiError::bad_request("No image provided"));
    }
    STANDARD
        .decode(encoded)
        .map_err(|e| ApiError::bad_request(format!("Invalid base64 image: {}", e)))
}

/// Classify one frame
pub async fn predict_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> ApiResult<Json<PredictResponse>> {
    let Json(request) = payload?;
    let image = request
        .image
        .ok_or_else(|| ApiError::bad_request("No image provided"))?;
    let bytes = decode_image_payload(&image)?;
    debug!("Received {} byte frame", bytes.len());

    let worker = state.clone();
    let probability = tokio::task::spawn_blocking(move || -> ApiResult<f32> {
        let frame = decode_still(&bytes).map_err(|e| {
            debug!("Undecodable frame: {}", e);
            ApiError::bad_request("Could not decode image")
        })?;
        Ok(worker.classify_frame(&frame)?)
    })
    .await
    .map_err(|e| ApiError::internal(format!("inference task failed: {}", e)))??;

    let status = if state.profile.alert.indicates_fatigue(probability) {
        "fatigue"
    } else {
        "awake"
    };
    counter!("fatigue_predictions_total", "status" => status).increment(1);
    info!("Prediction: {} ({:.4})", status.to_uppercase(), probability);

    Ok(Json(PredictResponse { status, probability }))
}
