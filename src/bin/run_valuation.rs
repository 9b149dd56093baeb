// src/bin/run_valuation.rs
use anyhow::{bail, Context};
use std::env;

use dcf_screener::config::AppConfig;
use dcf_screener::models::ValuationParams;
use dcf_screener::services::pipeline::compute_valuations;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args: Vec<String> = env::args().skip(1).collect();
    let json = match args.iter().position(|a| a == "--json") {
        Some(i) => {
            args.remove(i);
            true
        }
        None => false,
    };
    if args.len() != 2 {
        bail!("usage: run_valuation [--json] <desired_return> <margin_of_safety>");
    }
    let params = ValuationParams {
        desired_return: args[0].parse::<f64>().context("desired_return must be a number")?,
        margin_of_safety: args[1].parse::<f64>().context("margin_of_safety must be a number")?,
    };

    let config = AppConfig::from_env()?;
    let report = compute_valuations(&config.pipeline, params).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{:<40} {:>18} {:>18} {:>11}",
        "Company", "Intrinsic Value", "Market Value", "Undervalued"
    );
    for r in &report.results {
        println!(
            "{:<40} {:>18.2} {:>18.2} {:>11}",
            r.company_name,
            r.intrinsic_value_adjusted,
            r.market_value,
            if r.undervalued { "Yes" } else { "No" }
        );
    }

    if !report.skipped.is_empty() {
        println!("\nSkipped {} companies:", report.skipped.len());
        for s in &report.skipped {
            println!("  {}: {}", s.company_name, s.reason);
        }
    }
    Ok(())
}
