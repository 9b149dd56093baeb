// src/services/ranker.rs
use crate::models::{ValuationCandidate, ValuationResult};

/// Above this magnitude f64 has no fractional precision left to round, and
/// scaling by 100 could overflow.
const ROUNDING_LIMIT: f64 = 1e15;

/// Round half away from zero to two decimal places. Never returns `-0.0`.
pub fn round2(value: f64) -> f64 {
    if value.abs() >= ROUNDING_LIMIT {
        return value;
    }
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Rounds, classifies and orders candidates for presentation. Classification
/// and ordering both use the rounded figures the caller will see.
pub fn rank(candidates: Vec<ValuationCandidate>) -> Vec<ValuationResult> {
    let mut results: Vec<ValuationResult> = candidates
        .into_iter()
        .map(|c| {
            let intrinsic = round2(c.intrinsic_value_adjusted);
            let market = round2(c.market_value);
            ValuationResult {
                company_name: c.company_name,
                intrinsic_value_adjusted: intrinsic,
                market_value: market,
                undervalued: intrinsic > market,
            }
        })
        .collect();

    // sort_by is stable: equal values keep their input order
    results.sort_by(|a, b| b.intrinsic_value_adjusted.total_cmp(&a.intrinsic_value_adjusted));
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, intrinsic: f64, market: f64) -> ValuationCandidate {
        ValuationCandidate {
            company_name: name.to_string(),
            intrinsic_value_adjusted: intrinsic,
            market_value: market,
        }
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1106.0222), 1106.02);
        assert_eq!(round2(2.675001), 2.68);
        assert_eq!(round2(-1.005001), -1.01);
        assert_eq!(round2(0.0), 0.0);
    }

    #[test]
    fn test_sorted_descending() {
        let ranked = rank(vec![
            candidate("Low", 10.0, 5.0),
            candidate("High", 300.0, 5.0),
            candidate("Mid", 150.0, 5.0),
        ]);
        let names: Vec<&str> = ranked.iter().map(|r| r.company_name.as_str()).collect();
        assert_eq!(names, vec!["High", "Mid", "Low"]);
        for pair in ranked.windows(2) {
            assert!(pair[0].intrinsic_value_adjusted >= pair[1].intrinsic_value_adjusted);
        }
    }

    #[test]
    fn test_ties_keep_input_order() {
        let ranked = rank(vec![
            candidate("First", 50.0, 1.0),
            candidate("Top", 99.0, 1.0),
            candidate("Second", 50.0, 1.0),
            // rounds to the same 50.00
            candidate("Third", 50.001, 1.0),
        ]);
        let names: Vec<&str> = ranked.iter().map(|r| r.company_name.as_str()).collect();
        assert_eq!(names, vec!["Top", "First", "Second", "Third"]);
    }

    #[test]
    fn test_undervalued_is_strict() {
        let ranked = rank(vec![
            candidate("Above", 100.01, 100.0),
            candidate("Equal", 100.0, 100.0),
            candidate("Below", 99.99, 100.0),
            // equal once rounded
            candidate("RoundsEqual", 100.004, 100.0),
        ]);
        let flag = |name: &str| {
            ranked
                .iter()
                .find(|r| r.company_name == name)
                .map(|r| r.undervalued)
                .unwrap()
        };
        assert!(flag("Above"));
        assert!(!flag("Equal"));
        assert!(!flag("Below"));
        assert!(!flag("RoundsEqual"));
    }

    #[test]
    fn test_round2_has_no_negative_zero() {
        assert!(round2(-0.001).is_sign_positive());
        assert!(round2(-0.0).is_sign_positive());
    }

    #[test]
    fn test_tiny_negative_ties_with_zero() {
        let ranked = rank(vec![candidate("NegTiny", -0.001, 1.0), candidate("Zero", 0.0, 1.0)]);
        let names: Vec<&str> = ranked.iter().map(|r| r.company_name.as_str()).collect();
        assert_eq!(names, vec!["NegTiny", "Zero"]);
        assert_eq!(ranked[0].intrinsic_value_adjusted.to_bits(), 0.0f64.to_bits());
    }

    #[test]
    fn test_huge_values_stay_finite() {
        assert_eq!(round2(1e307), 1e307);
        assert_eq!(round2(-1e307), -1e307);

        let ranked = rank(vec![candidate("Huge", 1e307, 1e307), candidate("Big", 2e307, 1.0)]);
        for r in &ranked {
            assert!(r.intrinsic_value_adjusted.is_finite());
            assert!(r.market_value.is_finite());
        }
        assert_eq!(ranked[0].company_name, "Big");
        assert!(ranked[0].undervalued);
        assert!(!ranked[1].undervalued);
    }

    #[test]
    fn test_empty() {
        assert!(rank(Vec::new()).is_empty());
    }
}
