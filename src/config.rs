// src/config.rs
use log::warn;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::services::loader::{DatasetSources, MissingSourcePolicy, SourceSpec};
use crate::services::matcher::JoinPolicy;

pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Error)]
#[error("invalid value for {key}: {message}")]
pub struct ConfigError {
    pub key: &'static str,
    pub message: String,
}

/// Everything one valuation request needs to know about its inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub sources: DatasetSources,
    pub on_missing_source: MissingSourcePolicy,
    pub join_policy: JoinPolicy,
    /// `None` waits for the datasets indefinitely.
    pub load_timeout: Option<Duration>,
}

impl PipelineConfig {
    pub fn new(sources: DatasetSources) -> Self {
        PipelineConfig {
            sources,
            on_missing_source: MissingSourcePolicy::default(),
            join_policy: JoinPolicy::default(),
            load_timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    pub static_dir: PathBuf,
    pub pipeline: PipelineConfig,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError {
            key,
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    /// Reads settings from the environment (and `.env` when present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let port = match env::var("PORT") {
            Ok(_) => parse_var("PORT", DEFAULT_PORT)?,
            Err(_) => {
                warn!("$PORT not set, defaulting to {}", DEFAULT_PORT);
                DEFAULT_PORT
            }
        };

        let cash_flow_sheet = var_or("CASH_FLOW_SHEET", "Sheet1");
        let growth_rate_sheet = var_or("GROWTH_RATE_SHEET", "Sheet1");
        let sources = DatasetSources {
            cash_flows: SourceSpec::new(
                "cash flow",
                var_or("CASH_FLOW_PATH", "companies_full_list.xlsx"),
                Some(&cash_flow_sheet),
            ),
            growth_rates: SourceSpec::new(
                "growth rate",
                var_or("GROWTH_RATE_PATH", "perpetual_growth_rate.xlsx"),
                Some(&growth_rate_sheet),
            ),
            market_values: SourceSpec::new(
                "market value",
                var_or("MARKET_VALUE_PATH", "ftse250_companies.csv"),
                None,
            ),
        };

        let load_timeout = match env::var("LOAD_TIMEOUT_SECS") {
            Ok(_) => Some(Duration::from_secs(parse_var::<u64>("LOAD_TIMEOUT_SECS", 0)?)),
            Err(_) => None,
        };

        Ok(AppConfig {
            port,
            static_dir: PathBuf::from(var_or("STATIC_DIR", "public")),
            pipeline: PipelineConfig {
                sources,
                on_missing_source: parse_var("ON_MISSING_SOURCE", MissingSourcePolicy::Skip)?,
                join_policy: parse_var("JOIN_POLICY", JoinPolicy::FirstWins)?,
                load_timeout,
            },
        })
    }
}
