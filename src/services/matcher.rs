// src/services/matcher.rs
use log::warn;
use std::collections::HashMap;
use std::str::FromStr;

use crate::models::{
    CashFlowRecord, CellValue, GrowthRateRecord, LookupTable, MarketValueRecord, MatchedCompany,
    RawRecord, SkipReason, SkippedCompany, FORECAST_YEARS,
};

pub const COMPANY_FIELD: &str = "Company";
pub const RATE_FIELD: &str = "Rate";
pub const MARKET_VALUE_FIELD: &str = "MarketValue";

pub fn cash_flow_field(year: usize) -> String {
    format!("Year {} FCF", year)
}

/// How to resolve a company name that appears more than once in the growth
/// rate or market value table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinPolicy {
    #[default]
    FirstWins,
    RejectDuplicates,
}

impl FromStr for JoinPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first-wins" => Ok(JoinPolicy::FirstWins),
            "reject-duplicates" => Ok(JoinPolicy::RejectDuplicates),
            other => Err(format!(
                "expected 'first-wins' or 'reject-duplicates', got '{}'",
                other
            )),
        }
    }
}

#[derive(Debug, Default)]
pub struct MatchOutcome {
    pub matched: Vec<MatchedCompany>,
    pub skipped: Vec<SkippedCompany>,
}

/// Parses a cell as a finite number. Text is trimmed; empty text is not zero.
fn to_number(field: &str, cell: &CellValue) -> Result<f64, SkipReason> {
    let parsed = match cell {
        CellValue::Number(n) => Some(*n),
        CellValue::Text(s) => s.trim().parse::<f64>().ok(),
    };
    match parsed {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(SkipReason::MalformedNumeric {
            field: field.to_string(),
            value: cell.to_string(),
        }),
    }
}

/// Market values arrive as display strings such as "1,234,567.89".
pub fn parse_market_value(cell: &CellValue) -> Result<f64, SkipReason> {
    match cell {
        CellValue::Text(s) => to_number(MARKET_VALUE_FIELD, &CellValue::Text(s.replace(',', "")))
            .map_err(|_| SkipReason::MalformedNumeric {
                field: MARKET_VALUE_FIELD.to_string(),
                value: s.clone(),
            }),
        number => to_number(MARKET_VALUE_FIELD, number),
    }
}

fn company_name(record: &RawRecord) -> Option<String> {
    record.get(COMPANY_FIELD).map(|c| c.to_string())
}

pub fn parse_cash_flow_record(record: &RawRecord) -> Result<CashFlowRecord, SkipReason> {
    let company_name = company_name(record).ok_or(SkipReason::MissingCompanyName)?;

    // Check presence of every period before coercing any of them.
    let mut cells = Vec::with_capacity(FORECAST_YEARS);
    for year in 1..=FORECAST_YEARS {
        let cell = record
            .get(&cash_flow_field(year))
            .ok_or(SkipReason::MissingCashFlow { period: year })?;
        cells.push(cell);
    }

    let mut free_cash_flows = [0.0; FORECAST_YEARS];
    for (i, cell) in cells.into_iter().enumerate() {
        free_cash_flows[i] = to_number(&cash_flow_field(i + 1), cell)?;
    }

    Ok(CashFlowRecord {
        company_name,
        free_cash_flows,
    })
}

/// Company name -> rows in source order.
fn index_by_company(records: &[RawRecord]) -> HashMap<String, Vec<&RawRecord>> {
    let mut index: HashMap<String, Vec<&RawRecord>> = HashMap::new();
    for record in records {
        if let Some(name) = company_name(record) {
            index.entry(name).or_default().push(record);
        }
    }
    index
}

fn lookup<'a>(
    index: &HashMap<String, Vec<&'a RawRecord>>,
    name: &str,
    table: LookupTable,
    policy: JoinPolicy,
) -> Result<&'a RawRecord, SkipReason> {
    let not_found = match table {
        LookupTable::GrowthRate => SkipReason::GrowthRateNotFound,
        LookupTable::MarketValue => SkipReason::MarketValueNotFound,
    };
    match index.get(name).map(|rows| rows.as_slice()) {
        None | Some([]) => Err(not_found),
        Some([only]) => Ok(*only),
        Some([first, ..]) => match policy {
            JoinPolicy::FirstWins => Ok(*first),
            JoinPolicy::RejectDuplicates => Err(SkipReason::DuplicateRecord { table }),
        },
    }
}

struct Lookups<'a> {
    growth_rates: HashMap<String, Vec<&'a RawRecord>>,
    market_values: HashMap<String, Vec<&'a RawRecord>>,
    policy: JoinPolicy,
}

impl Lookups<'_> {
    fn join(&self, record: &RawRecord) -> Result<MatchedCompany, SkipReason> {
        let cash_flows = parse_cash_flow_record(record)?;
        let name = cash_flows.company_name.as_str();

        let growth_row = lookup(&self.growth_rates, name, LookupTable::GrowthRate, self.policy)?;
        let rate_cell = growth_row
            .get(RATE_FIELD)
            .ok_or(SkipReason::GrowthRateNotFound)?;
        let growth = GrowthRateRecord {
            company_name: name.to_string(),
            perpetual_growth_rate: to_number(RATE_FIELD, rate_cell)?,
        };

        let market_row = lookup(&self.market_values, name, LookupTable::MarketValue, self.policy)?;
        let value_cell = market_row
            .get(MARKET_VALUE_FIELD)
            .ok_or(SkipReason::MarketValueNotFound)?;
        let market = MarketValueRecord {
            company_name: name.to_string(),
            market_value: parse_market_value(value_cell)?,
        };

        Ok(MatchedCompany::join(cash_flows, growth, market))
    }
}

/// Joins the three datasets on exact company name. Output follows the order
/// of `cash_flows`; every company that cannot be joined is reported in
/// `skipped` instead.
pub fn match_companies(
    cash_flows: &[RawRecord],
    growth_rates: &[RawRecord],
    market_values: &[RawRecord],
    policy: JoinPolicy,
) -> MatchOutcome {
    let lookups = Lookups {
        growth_rates: index_by_company(growth_rates),
        market_values: index_by_company(market_values),
        policy,
    };

    let mut outcome = MatchOutcome::default();
    for record in cash_flows {
        match lookups.join(record) {
            Ok(company) => outcome.matched.push(company),
            Err(reason) => {
                let company_name = company_name(record).unwrap_or_default();
                warn!("Skipping company '{}': {}", company_name, reason);
                outcome.skipped.push(SkippedCompany {
                    company_name,
                    reason,
                });
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn cash_flow_row(name: &str, value: f64) -> RawRecord {
        let mut record = RawRecord::new();
        record.insert(COMPANY_FIELD.to_string(), text(name));
        for year in 1..=FORECAST_YEARS {
            record.insert(cash_flow_field(year), CellValue::Number(value));
        }
        record
    }

    fn row(name: &str, field: &str, value: CellValue) -> RawRecord {
        let mut record = RawRecord::new();
        record.insert(COMPANY_FIELD.to_string(), text(name));
        record.insert(field.to_string(), value);
        record
    }

    fn rate(name: &str, value: &str) -> RawRecord {
        row(name, RATE_FIELD, text(value))
    }

    fn market(name: &str, value: &str) -> RawRecord {
        row(name, MARKET_VALUE_FIELD, text(value))
    }

    fn names(outcome: &MatchOutcome) -> Vec<&str> {
        outcome.matched.iter().map(|m| m.company_name.as_str()).collect()
    }

    #[test]
    fn test_parse_market_value_with_separators() {
        assert_eq!(parse_market_value(&text("1,234,567.89")), Ok(1234567.89));
        assert_eq!(parse_market_value(&text(" 42 ")), Ok(42.0));
        assert_eq!(parse_market_value(&CellValue::Number(7.5)), Ok(7.5));
        assert!(parse_market_value(&text("n/a")).is_err());
        assert!(parse_market_value(&text("")).is_err());
    }

    #[test]
    fn test_complete_company_is_joined_in_order() {
        let cash_flows = vec![cash_flow_row("Beta", 5.0), cash_flow_row("Alpha", 10.0)];
        let growth = vec![rate("Alpha", "0.02"), rate("Beta", "0.01")];
        let markets = vec![market("Alpha", "1,000"), market("Beta", "500.5")];

        let outcome = match_companies(&cash_flows, &growth, &markets, JoinPolicy::FirstWins);
        assert_eq!(names(&outcome), vec!["Beta", "Alpha"]);
        assert!(outcome.skipped.is_empty());

        let alpha = &outcome.matched[1];
        assert_eq!(alpha.free_cash_flows, [10.0; FORECAST_YEARS]);
        assert_eq!(alpha.perpetual_growth_rate, 0.02);
        assert_eq!(alpha.market_value, 1000.0);
    }

    #[test]
    fn test_missing_any_cash_flow_year_is_skipped() {
        for missing in 1..=FORECAST_YEARS {
            let mut record = cash_flow_row("Gappy", 1.0);
            record.remove(&cash_flow_field(missing));
            let outcome = match_companies(
                &[record],
                &[rate("Gappy", "0.01")],
                &[market("Gappy", "1")],
                JoinPolicy::FirstWins,
            );
            assert!(outcome.matched.is_empty());
            assert_eq!(
                outcome.skipped[0].reason,
                SkipReason::MissingCashFlow { period: missing }
            );
        }
    }

    #[test]
    fn test_zero_is_present_but_empty_text_is_malformed() {
        let mut zero = cash_flow_row("Zero", 1.0);
        zero.insert(cash_flow_field(3), text("0"));
        let mut blank = cash_flow_row("Blank", 1.0);
        blank.insert(cash_flow_field(3), text(""));

        let outcome = match_companies(
            &[zero, blank],
            &[rate("Zero", "0.01"), rate("Blank", "0.01")],
            &[market("Zero", "1"), market("Blank", "1")],
            JoinPolicy::FirstWins,
        );
        assert_eq!(names(&outcome), vec!["Zero"]);
        assert!(matches!(
            outcome.skipped[0].reason,
            SkipReason::MalformedNumeric { .. }
        ));
    }

    #[test]
    fn test_non_numeric_values_are_skipped_not_nan() {
        let mut bad_flow = cash_flow_row("BadFlow", 1.0);
        bad_flow.insert(cash_flow_field(7), text("twelve"));
        let cash_flows = vec![
            bad_flow,
            cash_flow_row("BadRate", 1.0),
            cash_flow_row("BadMarket", 1.0),
        ];
        let growth = vec![
            rate("BadFlow", "0.01"),
            rate("BadRate", "two percent"),
            rate("BadMarket", "0.01"),
        ];
        let markets = vec![
            market("BadFlow", "1"),
            market("BadRate", "1"),
            market("BadMarket", "12abc"),
        ];

        let outcome = match_companies(&cash_flows, &growth, &markets, JoinPolicy::FirstWins);
        assert!(outcome.matched.is_empty());
        assert_eq!(outcome.skipped.len(), 3);
        assert_eq!(
            outcome.skipped[0].reason,
            SkipReason::MalformedNumeric {
                field: "Year 7 FCF".to_string(),
                value: "twelve".to_string()
            }
        );
        for skipped in &outcome.skipped {
            assert!(matches!(skipped.reason, SkipReason::MalformedNumeric { .. }));
        }
    }

    #[test]
    fn test_unmatched_lookups_are_skipped() {
        let cash_flows = vec![cash_flow_row("NoRate", 1.0), cash_flow_row("NoMarket", 1.0)];
        let growth = vec![rate("NoMarket", "0.01")];
        let markets = vec![market("NoRate", "1")];

        let outcome = match_companies(&cash_flows, &growth, &markets, JoinPolicy::FirstWins);
        assert!(outcome.matched.is_empty());
        assert_eq!(outcome.skipped[0].reason, SkipReason::GrowthRateNotFound);
        assert_eq!(outcome.skipped[1].reason, SkipReason::MarketValueNotFound);
    }

    #[test]
    fn test_names_match_case_sensitively() {
        let outcome = match_companies(
            &[cash_flow_row("Acme", 1.0)],
            &[rate("ACME", "0.01")],
            &[market("Acme", "1")],
            JoinPolicy::FirstWins,
        );
        assert!(outcome.matched.is_empty());
        assert_eq!(outcome.skipped[0].reason, SkipReason::GrowthRateNotFound);
    }

    #[test]
    fn test_missing_company_name() {
        let mut record = cash_flow_row("x", 1.0);
        record.remove(COMPANY_FIELD);
        let outcome = match_companies(&[record], &[], &[], JoinPolicy::FirstWins);
        assert_eq!(outcome.skipped[0].company_name, "");
        assert_eq!(outcome.skipped[0].reason, SkipReason::MissingCompanyName);
    }

    #[test]
    fn test_first_wins_uses_first_duplicate() {
        let outcome = match_companies(
            &[cash_flow_row("Dup", 1.0)],
            &[rate("Dup", "0.01"), rate("Dup", "0.05")],
            &[market("Dup", "10"), market("Dup", "20")],
            JoinPolicy::FirstWins,
        );
        assert_eq!(outcome.matched[0].perpetual_growth_rate, 0.01);
        assert_eq!(outcome.matched[0].market_value, 10.0);
    }

    #[test]
    fn test_reject_duplicates_skips_company() {
        let outcome = match_companies(
            &[cash_flow_row("Dup", 1.0), cash_flow_row("Solo", 1.0)],
            &[rate("Dup", "0.01"), rate("Solo", "0.01")],
            &[market("Dup", "10"), market("Dup", "20"), market("Solo", "5")],
            JoinPolicy::RejectDuplicates,
        );
        assert_eq!(names(&outcome), vec!["Solo"]);
        assert_eq!(
            outcome.skipped[0].reason,
            SkipReason::DuplicateRecord {
                table: LookupTable::MarketValue
            }
        );
    }

    #[test]
    fn test_join_policy_from_str() {
        assert_eq!("first-wins".parse::<JoinPolicy>(), Ok(JoinPolicy::FirstWins));
        assert_eq!(
            "Reject-Duplicates".parse::<JoinPolicy>(),
            Ok(JoinPolicy::RejectDuplicates)
        );
        assert!("last-wins".parse::<JoinPolicy>().is_err());
    }
}
