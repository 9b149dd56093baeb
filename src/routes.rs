// src/routes.rs
use log::info;
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use warp::filters::body::BodyDeserializeError;
use warp::http::StatusCode;
use warp::reject::{MethodNotAllowed, Rejection};
use warp::{Filter, Reply};

use crate::config::PipelineConfig;
use crate::handlers::error::ApiError;
use crate::handlers::valuation::calculate;

const MAX_BODY_BYTES: u64 = 16 * 1024;

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;

    if let Some(api_error) = err.find::<ApiError>() {
        code = api_error.status;
        message = api_error.message.clone();
    } else if let Some(body_error) = err.find::<BodyDeserializeError>() {
        code = StatusCode::BAD_REQUEST;
        message = body_error.to_string();
    } else if err.is_not_found() {
        code = StatusCode::NOT_FOUND;
        message = "Not Found".to_string();
    } else if err.find::<MethodNotAllowed>().is_some() {
        code = StatusCode::METHOD_NOT_ALLOWED;
        message = "Method Not Allowed".to_string();
    } else {
        code = StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal Server Error".to_string();
    }

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": message,
        })),
        code,
    ))
}

pub fn routes(
    config: Arc<PipelineConfig>,
    static_dir: PathBuf,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring routes...");

    let config_filter = warp::any().map(move || config.clone());

    let calculate_route = warp::path!("calculate")
        .and(warp::post())
        .and(config_filter)
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and_then(calculate);

    let static_route = warp::get().and(warp::fs::dir(static_dir));

    info!("All routes configured successfully.");

    calculate_route.or(static_route).recover(handle_rejection)
}
