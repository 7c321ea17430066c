//! warp filters for the prediction API.
//!
//! - `GET /` describes the endpoints
//! - `GET /predict?surface=&rooms=&terrain=&zip=` prices one apartment
//!
//! Every response, including 404s, carries `Access-Control-Allow-Origin: *`
//! so the dashboard can call the API from another origin.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use serde_json::{Value, json};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::domain::PredictionResponse;
use crate::serve::service::PredictionService;

pub fn routes(
    service: Arc<PredictionService>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone + Send + Sync + 'static {
    let index = warp::path::end()
        .and(warp::get())
        .map(|| warp::reply::json(&endpoints()));

    let with_service = warp::any().map(move || service.clone());
    let predict = warp::path("predict")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_service)
        .map(|params: HashMap<String, String>, service: Arc<PredictionService>| {
            let (body, status) = service.respond(&params);
            warp::reply::with_status(warp::reply::json(&body), status)
        });

    index
        .or(predict)
        .recover(handle_rejection)
        .with(warp::reply::with::header("access-control-allow-origin", "*"))
        .with(warp::trace::request())
}

/// Static description served at `GET /`.
pub fn endpoints() -> Value {
    json!({
        "endpoints": [
            {
                "url": "/",
                "description": "Provides help and information about available endpoints."
            },
            {
                "url": "/predict",
                "description": "Returns predicted apartment prices based on input data.",
                "parameters": [
                    {
                        "name": "surface",
                        "description": "Built surface of the apartment in square meters.",
                        "type": "float"
                    },
                    {
                        "name": "rooms",
                        "description": "Number of main rooms.",
                        "type": "float"
                    },
                    {
                        "name": "terrain",
                        "description": "Total surface of the lots in square meters.",
                        "type": "float"
                    },
                    {
                        "name": "zip",
                        "description": "Postal code of the apartment.",
                        "type": "int"
                    }
                ],
                "example": "/predict?surface=50&rooms=3&terrain=0&zip=75001"
            }
        ]
    })
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
    } else {
        tracing::warn!(rejection = ?err, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    };
    let body = PredictionResponse::Error {
        error: message.to_string(),
    };
    Ok(warp::reply::with_status(warp::reply::json(&body), status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CleanedFeatureRow, Delimiter, FeatureRow, ForestParams, TrainConfig};
    use crate::error::PredictError;
    use crate::models::PricePredictor;

    struct Fixed;

    impl PricePredictor for Fixed {
        fn predict(&self, row: &FeatureRow) -> Result<f64, PredictError> {
            match row.code_postal {
                75001 | 75002 => Ok(6_000.0 * row.surface_reelle_bati + 1_000.0 * row.total_surface_lots),
                other => Err(PredictError::UnseenCategory {
                    column: "code_postal",
                    value: other,
                }),
            }
        }
    }

    fn api(strict: bool) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone + 'static {
        let service = PredictionService::new(Arc::new(Fixed)).with_strict_status(strict);
        routes(Arc::new(service))
    }

    fn body_json(body: &[u8]) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn known_postal_code_gets_a_price() {
        let res = warp::test::request()
            .method("GET")
            .path("/predict?surface=50&rooms=3&terrain=0&zip=75001")
            .reply(&api(false))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["access-control-allow-origin"], "*");
        assert_eq!(body_json(res.body()), json!({"predicted_price": "300000.0"}));
    }

    #[tokio::test]
    async fn unseen_postal_code_is_an_error_payload() {
        let res = warp::test::request()
            .path("/predict?surface=50&rooms=3&terrain=0&zip=99999")
            .reply(&api(false))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res.body());
        assert!(body["error"].as_str().unwrap().contains("99999"));
        assert!(body.get("predicted_price").is_none());
    }

    #[tokio::test]
    async fn missing_surface_is_an_error_payload() {
        let res = warp::test::request()
            .path("/predict?rooms=3&terrain=0&zip=75001")
            .reply(&api(false))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(body_json(res.body())["error"].as_str().unwrap().contains("surface"));
    }

    #[tokio::test]
    async fn no_query_at_all_is_an_error_payload() {
        let res = warp::test::request().path("/predict").reply(&api(false)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(body_json(res.body())["error"].is_string());
    }

    #[tokio::test]
    async fn server_keeps_answering_after_errors() {
        let api = api(false);
        let bad = warp::test::request().path("/predict?surface=x").reply(&api).await;
        assert!(body_json(bad.body())["error"].is_string());
        let good = warp::test::request()
            .path("/predict?surface=10&rooms=1&terrain=2&zip=75002")
            .reply(&api)
            .await;
        assert_eq!(body_json(good.body()), json!({"predicted_price": "62000.0"}));
    }

    #[tokio::test]
    async fn strict_mode_uses_client_error_statuses() {
        let api = api(true);
        let missing = warp::test::request().path("/predict?rooms=3").reply(&api).await;
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        let unseen = warp::test::request()
            .path("/predict?surface=50&rooms=3&terrain=0&zip=99999")
            .reply(&api)
            .await;
        assert_eq!(unseen.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(unseen.headers()["access-control-allow-origin"], "*");
    }

    fn trained_api() -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone + 'static {
        let rows: Vec<CleanedFeatureRow> = (0..80)
            .map(|i| {
                let zip = 75001 + (i % 4) as i64;
                let surface = 20.0 + (i % 20) as f64 * 4.0;
                CleanedFeatureRow {
                    valeur_fonciere: surface * (9_000.0 + (zip - 75001) as f64 * 1_000.0),
                    surface_reelle_bati: surface,
                    nombre_pieces_principales: 1.0 + (surface / 30.0).floor(),
                    code_postal: zip,
                    total_surface_lots: 0.0,
                }
            })
            .collect();
        let config = TrainConfig {
            input: "memory".to_string(),
            delimiter: Delimiter::Auto,
            model_path: "pipeline.bin".into(),
            seed: 42,
            forest: ForestParams {
                n_trees: 10,
                ..ForestParams::default()
            },
            export_cleaned: None,
        };
        let pipeline = crate::fit::train(&rows, &config).unwrap();
        assert!(pipeline.encoder.contains(75001));
        routes(Arc::new(PredictionService::new(Arc::new(pipeline))))
    }

    #[tokio::test]
    async fn trained_pipeline_serves_known_and_unseen_codes() {
        let api = trained_api();

        let known = warp::test::request()
            .path("/predict?surface=50&rooms=3&terrain=0&zip=75001")
            .reply(&api)
            .await;
        assert_eq!(known.status(), StatusCode::OK);
        let body = body_json(known.body());
        let price: f64 = body["predicted_price"].as_str().unwrap().parse().unwrap();
        assert!(price > 0.0);

        let unseen = warp::test::request()
            .path("/predict?surface=50&rooms=3&terrain=0&zip=99999")
            .reply(&api)
            .await;
        assert_eq!(unseen.status(), StatusCode::OK);
        assert_eq!(unseen.headers()["access-control-allow-origin"], "*");
        assert_eq!(
            body_json(unseen.body()),
            json!({"error": "Found unknown categories [99999] in column code_postal during transform"})
        );
    }

    #[tokio::test]
    async fn index_lists_endpoints() {
        let res = warp::test::request().path("/").reply(&api(false)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["access-control-allow-origin"], "*");
        let body = body_json(res.body());
        let urls: Vec<&str> = body["endpoints"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["url"].as_str().unwrap())
            .collect();
        assert_eq!(urls, ["/", "/predict"]);
    }

    #[tokio::test]
    async fn unknown_path_is_404_with_cors() {
        let res = warp::test::request().path("/nope").reply(&api(false)).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.headers()["access-control-allow-origin"], "*");
    }
}
