// src/services/calculations.rs
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("no cash flows to discount")]
    EmptyCashFlows,
    #[error("perpetual growth rate {growth_rate} is not below discount rate {discount_rate}")]
    NonConvergentGrowth { discount_rate: f64, growth_rate: f64 },
    #[error("valuation produced a non-finite value")]
    NonFiniteResult,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DcfBreakdown {
    /// Sum of the explicit-period cash flows, discounted.
    pub pv_cash_flows: f64,
    /// Terminal value discounted back from the last explicit period.
    pub pv_terminal_value: f64,
    pub intrinsic_value: f64,
}

fn discount_factor(discount_rate: f64, period: usize) -> f64 {
    (1.0 + discount_rate).powi(period as i32)
}

/// Present value of cash flows for periods 1..=N.
pub fn present_value_of_cash_flows(cash_flows: &[f64], discount_rate: f64) -> f64 {
    cash_flows
        .iter()
        .enumerate()
        .map(|(i, cf)| cf / discount_factor(discount_rate, i + 1))
        .sum()
}

/// Gordon growth value of everything after the last explicit period.
/// Caller must ensure `growth_rate < discount_rate`.
pub fn terminal_value(last_cash_flow: f64, discount_rate: f64, growth_rate: f64) -> f64 {
    last_cash_flow * (1.0 + growth_rate) / (discount_rate - growth_rate)
}

pub fn intrinsic_value(
    cash_flows: &[f64],
    discount_rate: f64,
    growth_rate: f64,
) -> Result<DcfBreakdown, FormulaError> {
    let last = *cash_flows.last().ok_or(FormulaError::EmptyCashFlows)?;

    // NaN fails both comparisons, so check finiteness separately.
    if !discount_rate.is_finite() || !growth_rate.is_finite() {
        return Err(FormulaError::NonFiniteResult);
    }
    if growth_rate >= discount_rate {
        return Err(FormulaError::NonConvergentGrowth {
            discount_rate,
            growth_rate,
        });
    }

    let n = cash_flows.len();
    let pv_cash_flows = present_value_of_cash_flows(cash_flows, discount_rate);
    let pv_terminal_value =
        terminal_value(last, discount_rate, growth_rate) / discount_factor(discount_rate, n);
    let intrinsic_value = pv_cash_flows + pv_terminal_value;

    if !intrinsic_value.is_finite() {
        return Err(FormulaError::NonFiniteResult);
    }

    Ok(DcfBreakdown {
        pv_cash_flows,
        pv_terminal_value,
        intrinsic_value,
    })
}

/// Intrinsic value reduced by the margin of safety.
pub fn valuate(
    cash_flows: &[f64],
    discount_rate: f64,
    growth_rate: f64,
    margin_of_safety: f64,
) -> Result<f64, FormulaError> {
    let breakdown = intrinsic_value(cash_flows, discount_rate, growth_rate)?;
    let adjusted = breakdown.intrinsic_value * (1.0 - margin_of_safety);
    if adjusted.is_finite() {
        Ok(adjusted)
    } else {
        Err(FormulaError::NonFiniteResult)
    }
}
