//! Request handling for `GET /predict`, independent of the HTTP framework.

use std::collections::HashMap;
use std::sync::Arc;

use warp::http::StatusCode;

use crate::domain::{PredictionRequest, PredictionResponse};
use crate::error::PredictError;
use crate::models::PricePredictor;

/// Prices one query at a time against a shared, read-only predictor.
///
/// There is no way to build a service without a predictor, so a running
/// server is always "ready".
#[derive(Clone)]
pub struct PredictionService {
    predictor: Arc<dyn PricePredictor>,
    strict_status: bool,
}

impl PredictionService {
    pub fn new(predictor: Arc<dyn PricePredictor>) -> Self {
        Self {
            predictor,
            strict_status: false,
        }
    }

    /// Map failures to 4xx/5xx instead of the uniform 200.
    pub fn with_strict_status(mut self, strict: bool) -> Self {
        self.strict_status = strict;
        self
    }

    pub fn predict(&self, params: &HashMap<String, String>) -> Result<f64, PredictError> {
        let request = parse_request(params)?;
        self.predictor.predict(&request.to_feature_row())
    }

    /// Full response for a query. Never fails: every error becomes a payload.
    pub fn respond(&self, params: &HashMap<String, String>) -> (PredictionResponse, StatusCode) {
        match self.predict(params) {
            Ok(price) => (
                PredictionResponse::Price {
                    predicted_price: format_price(price),
                },
                StatusCode::OK,
            ),
            Err(err) => {
                tracing::debug!(error = %err, "prediction failed");
                let status = if self.strict_status { error_status(&err) } else { StatusCode::OK };
                (PredictionResponse::Error { error: err.to_string() }, status)
            }
        }
    }
}

/// Read `surface`, `rooms`, `terrain` (floats) and `zip` (integer) from a query.
pub fn parse_request(params: &HashMap<String, String>) -> Result<PredictionRequest, PredictError> {
    Ok(PredictionRequest {
        surface: parse_float(params, "surface")?,
        rooms: parse_float(params, "rooms")?,
        terrain: parse_float(params, "terrain")?,
        zip: parse_int(params, "zip")?,
    })
}

/// Shortest decimal that round-trips, always with a fractional part (`300000.0`).
pub fn format_price(price: f64) -> String {
    format!("{price:?}")
}

fn error_status(err: &PredictError) -> StatusCode {
    match err {
        PredictError::Validation(_) => StatusCode::BAD_REQUEST,
        PredictError::UnseenCategory { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        PredictError::Model(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn required<'a>(params: &'a HashMap<String, String>, name: &str) -> Result<&'a str, PredictError> {
    params
        .get(name)
        .map(|v| v.trim())
        .ok_or_else(|| PredictError::Validation(format!("Missing query parameter `{name}`.")))
}

fn parse_float(params: &HashMap<String, String>, name: &str) -> Result<f64, PredictError> {
    let raw = required(params, name)?;
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(_) => Err(PredictError::Validation(format!(
            "Query parameter `{name}` must be a finite number, got '{raw}'."
        ))),
        Err(_) => Err(PredictError::Validation(format!(
            "Query parameter `{name}` must be a number, got '{raw}'."
        ))),
    }
}

fn parse_int(params: &HashMap<String, String>, name: &str) -> Result<i64, PredictError> {
    let raw = required(params, name)?;
    raw.parse::<i64>().map_err(|_| {
        PredictError::Validation(format!("Query parameter `{name}` must be an integer, got '{raw}'."))
    })
}
