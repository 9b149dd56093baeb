// src/services/pipeline.rs
use log::{info, warn};
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::models::{
    MatchedCompany, SkipReason, SkippedCompany, ValuationCandidate, ValuationParams,
    ValuationReport,
};
use crate::services::calculations::valuate;
use crate::services::loader::{load_all, LoadError};
use crate::services::matcher::match_companies;
use crate::services::ranker::rank;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error(transparent)]
    Load(#[from] LoadError),
}

pub fn validate_params(params: &ValuationParams) -> Result<(), PipelineError> {
    let ValuationParams {
        desired_return,
        margin_of_safety,
    } = *params;

    if !desired_return.is_finite() || desired_return <= -1.0 {
        return Err(PipelineError::InvalidParameters(format!(
            "desiredReturn must be a finite number greater than -1, got {}",
            desired_return
        )));
    }
    if !margin_of_safety.is_finite() || !(0.0..1.0).contains(&margin_of_safety) {
        return Err(PipelineError::InvalidParameters(format!(
            "marginOfSafety must be in [0, 1), got {}",
            margin_of_safety
        )));
    }
    Ok(())
}

/// Values every matched company and ranks the survivors. Companies whose
/// valuation is undefined come back in the skip list.
pub fn evaluate(
    matched: Vec<MatchedCompany>,
    params: &ValuationParams,
) -> (Vec<ValuationCandidate>, Vec<SkippedCompany>) {
    let mut candidates = Vec::with_capacity(matched.len());
    let mut skipped = Vec::new();

    for company in matched {
        match valuate(
            &company.free_cash_flows,
            params.desired_return,
            company.perpetual_growth_rate,
            params.margin_of_safety,
        ) {
            Ok(intrinsic_value_adjusted) => candidates.push(ValuationCandidate {
                company_name: company.company_name,
                intrinsic_value_adjusted,
                market_value: company.market_value,
            }),
            Err(e) => {
                warn!("Skipping company '{}': {}", company.company_name, e);
                skipped.push(SkippedCompany {
                    company_name: company.company_name,
                    reason: SkipReason::UndefinedFormula {
                        detail: e.to_string(),
                    },
                });
            }
        }
    }

    (candidates, skipped)
}

/// Runs one full valuation request: load, match, value, rank.
pub async fn compute_valuations(
    config: &PipelineConfig,
    params: ValuationParams,
) -> Result<ValuationReport, PipelineError> {
    validate_params(&params)?;
    info!(
        "Computing valuations with desired return {} and margin of safety {}",
        params.desired_return, params.margin_of_safety
    );

    let datasets = load_all(&config.sources, config.on_missing_source, config.load_timeout).await?;

    let outcome = match_companies(
        &datasets.cash_flows,
        &datasets.growth_rates,
        &datasets.market_values,
        config.join_policy,
    );
    let (candidates, formula_skips) = evaluate(outcome.matched, &params);

    let mut skipped = outcome.skipped;
    skipped.extend(formula_skips);
    let results = rank(candidates);

    info!(
        "Valued {} companies, skipped {}",
        results.len(),
        skipped.len()
    );
    Ok(ValuationReport { results, skipped })
}
