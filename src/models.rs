// src/models.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Number of explicit forecast periods in the cash-flow table.
pub const FORECAST_YEARS: usize = 10;

/// A single cell as read from a dataset. Workbooks keep native numbers,
/// delimited text is always `Text`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Header name -> cell. A field that is absent from the map was missing in
/// the source, which is not the same thing as an empty string.
pub type RawRecord = HashMap<String, CellValue>;

#[derive(Debug, Clone, PartialEq)]
pub struct CashFlowRecord {
    pub company_name: String,
    pub free_cash_flows: [f64; FORECAST_YEARS],
}

#[derive(Debug, Clone, PartialEq)]
pub struct GrowthRateRecord {
    pub company_name: String,
    pub perpetual_growth_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketValueRecord {
    pub company_name: String,
    pub market_value: f64,
}

/// A company that was found in all three datasets with usable numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedCompany {
    pub company_name: String,
    pub free_cash_flows: [f64; FORECAST_YEARS],
    pub perpetual_growth_rate: f64,
    pub market_value: f64,
}

impl MatchedCompany {
    pub fn join(
        cash_flows: CashFlowRecord,
        growth: GrowthRateRecord,
        market: MarketValueRecord,
    ) -> Self {
        MatchedCompany {
            company_name: cash_flows.company_name,
            free_cash_flows: cash_flows.free_cash_flows,
            perpetual_growth_rate: growth.perpetual_growth_rate,
            market_value: market.market_value,
        }
    }
}

/// Inbound request parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationParams {
    /// Discount rate as a fraction (0.10 = 10%).
    pub desired_return: f64,
    pub margin_of_safety: f64,
}

/// A valued company before rounding and ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuationCandidate {
    pub company_name: String,
    pub intrinsic_value_adjusted: f64,
    pub market_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationResult {
    pub company_name: String,
    pub intrinsic_value_adjusted: f64,
    pub market_value: f64,
    pub undervalued: bool,
}

/// Which lookup table a duplicate or missing row was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LookupTable {
    GrowthRate,
    MarketValue,
}

impl fmt::Display for LookupTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LookupTable::GrowthRate => write!(f, "growth rate"),
            LookupTable::MarketValue => write!(f, "market value"),
        }
    }
}

/// Why a company was left out of the result set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SkipReason {
    MissingCompanyName,
    MissingCashFlow { period: usize },
    MalformedNumeric { field: String, value: String },
    GrowthRateNotFound,
    MarketValueNotFound,
    DuplicateRecord { table: LookupTable },
    UndefinedFormula { detail: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SkipReason::MissingCompanyName => write!(f, "record has no company name"),
            SkipReason::MissingCashFlow { period } => {
                write!(f, "missing free cash flow for year {}", period)
            }
            SkipReason::MalformedNumeric { field, value } => {
                write!(f, "field '{}' is not numeric: {:?}", field, value)
            }
            SkipReason::GrowthRateNotFound => write!(f, "perpetual growth rate not found"),
            SkipReason::MarketValueNotFound => write!(f, "market value not found"),
            SkipReason::DuplicateRecord { table } => {
                write!(f, "company appears more than once in the {} table", table)
            }
            SkipReason::UndefinedFormula { detail } => write!(f, "valuation undefined: {}", detail),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedCompany {
    /// Empty when the record carried no name at all.
    pub company_name: String,
    pub reason: SkipReason,
}

/// Outcome of one valuation request: the ranking plus every exclusion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValuationReport {
    pub results: Vec<ValuationResult>,
    pub skipped: Vec<SkippedCompany>,
}
