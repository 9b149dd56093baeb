// src/handlers/valuation.rs
use log::{debug, error, info};
use serde::Serialize;
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use super::error::ApiError;
use crate::config::PipelineConfig;
use crate::models::{ValuationParams, ValuationResult};
use crate::services::pipeline::{compute_valuations, PipelineError};

/// Wire shape of one ranked company.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ValuationRow {
    pub company: String,
    pub intrinsic_value: String,
    pub market_value: String,
    pub undervalued: &'static str,
}

impl From<&ValuationResult> for ValuationRow {
    fn from(result: &ValuationResult) -> Self {
        ValuationRow {
            company: result.company_name.clone(),
            intrinsic_value: format!("{:.2}", result.intrinsic_value_adjusted),
            market_value: format!("{:.2}", result.market_value),
            undervalued: if result.undervalued { "Yes" } else { "No" },
        }
    }
}

pub async fn calculate(
    config: Arc<PipelineConfig>,
    params: ValuationParams,
) -> Result<Json, Rejection> {
    info!("Handling request to calculate valuations: {:?}", params);

    match compute_valuations(&config, params).await {
        Ok(report) => {
            for skipped in &report.skipped {
                debug!("Excluded '{}': {}", skipped.company_name, skipped.reason);
            }
            let rows: Vec<ValuationRow> = report.results.iter().map(ValuationRow::from).collect();
            Ok(warp::reply::json(&rows))
        }
        Err(PipelineError::InvalidParameters(message)) => {
            Err(warp::reject::custom(ApiError::bad_request(message)))
        }
        Err(e) => {
            error!("Valuation request failed: {}", e);
            Err(warp::reject::custom(ApiError::internal()))
        }
    }
}
