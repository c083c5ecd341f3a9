// ⚖️ Subsidy Engine - Closed-form subsidy formulas
//
// Two deployment variants share one shape:
//   Variant A (income):  subsidy = (family_income / family_members) * coefficient
//   Variant B (area):    subsidy = total_area * value_per_area
//                                  * correction_factor * service_coefficient
//
// Both are pure functions over validated inputs: no shared state, no I/O,
// safe to call from any number of concurrent requests. Every intermediate
// quantity is echoed back in the breakdown so the result is auditable.

use serde::Serialize;

// ============================================================================
// FORMULA VARIANT
// ============================================================================

/// Which formula a deployment runs. The two variants are mutually exclusive
/// deployment configurations, not a per-request choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormulaVariant {
    /// Variant A: income-based, uses a per-region coefficient.
    Income,
    /// Variant B: area/service-based, uses market value and correction factor.
    Area,
}

impl FormulaVariant {
    pub fn name(&self) -> &'static str {
        match self {
            FormulaVariant::Income => "income",
            FormulaVariant::Area => "area",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "income" => Some(FormulaVariant::Income),
            "area" => Some(FormulaVariant::Area),
            _ => None,
        }
    }
}

// ============================================================================
// VALIDATED REQUESTS
// ============================================================================

/// Variant A input, already validated: income positive, members >= 1.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomeRequest {
    pub region_id: i64,
    pub family_income: f64,
    pub family_members: u32,
}

/// Variant B input, already validated: members >= 1, areas non-negative,
/// years non-negative.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaRequest {
    pub region_id: i64,
    pub family_members: u32,
    pub additional_area: f64,
    pub owned_area: f64,
    pub years_of_service: u32,
}

// ============================================================================
// CALCULATION RESULTS
// ============================================================================

/// Variant A breakdown: every quantity the formula used.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeBreakdown {
    pub region_name: String,
    pub coefficient: f64,
    pub family_income: f64,
    pub family_members: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeCalculation {
    pub amount: f64,
    pub breakdown: IncomeBreakdown,
}

/// Variant B breakdown: every intermediate, including the final amount.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaBreakdown {
    pub region_name: String,
    pub value_per_area: f64,
    pub correction_factor: f64,
    pub years_of_service: u32,
    pub service_coefficient: f64,
    pub family_members: u32,
    pub normative_area: f64,
    pub additional_area: f64,
    pub owned_area: f64,
    pub total_area: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaCalculation {
    pub amount: f64,
    pub breakdown: AreaBreakdown,
}

// ============================================================================
// FORMULA PIECES
// ============================================================================

/// Round to 2 decimal places, half away from zero (currency rounding).
pub fn round_currency(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Government-defined minimum housing area entitlement by household size.
/// A step function: 33 m² for one person, 42 m² for two, 18 m² per person
/// from three up.
pub fn normative_area(family_members: u32) -> f64 {
    match family_members {
        1 => 33.0,
        2 => 42.0,
        n => 18.0 * n as f64,
    }
}

/// Service-length multiplier on the subsidy amount.
///
/// Intervals are closed on the left: exactly 9 years lands in the 1.15
/// tier, not 1.1. From 20 years the coefficient grows by 0.025 per year
/// and saturates at 1.5 (reached at 30 years).
pub fn service_coefficient(years_of_service: u32) -> f64 {
    match years_of_service {
        0..=6 => 1.0,
        7..=8 => 1.1,
        9..=10 => 1.15,
        11..=14 => 1.2,
        15..=19 => 1.25,
        years => (1.25 + (years - 20) as f64 * 0.025).min(1.5),
    }
}

// ============================================================================
// VARIANT A - INCOME-BASED
// ============================================================================

/// Compute the income-based subsidy. Total over its validated domain:
/// members >= 1 keeps the division safe.
pub fn calculate_income_subsidy(
    region_name: &str,
    coefficient: f64,
    request: &IncomeRequest,
) -> IncomeCalculation {
    let amount = round_currency(
        (request.family_income / request.family_members as f64) * coefficient,
    );

    IncomeCalculation {
        amount,
        breakdown: IncomeBreakdown {
            region_name: region_name.to_string(),
            coefficient,
            family_income: request.family_income,
            family_members: request.family_members,
        },
    }
}

// ============================================================================
// VARIANT B - AREA/SERVICE-BASED
// ============================================================================

/// Compute the area/service-based subsidy.
///
/// Total chargeable area may be zero or negative when the owned area
/// exceeds the entitlement; it is passed through unclamped, and so is the
/// resulting amount. Whether a negative amount means "no entitlement" is a
/// product decision that has not been taken - the formula does not guess.
pub fn calculate_area_subsidy(
    region_name: &str,
    value_per_area: f64,
    correction_factor: f64,
    request: &AreaRequest,
) -> AreaCalculation {
    let normative = normative_area(request.family_members);
    let total_area = normative + request.additional_area - request.owned_area;
    let coefficient = service_coefficient(request.years_of_service);

    let amount = round_currency(total_area * value_per_area * correction_factor * coefficient);

    AreaCalculation {
        amount,
        breakdown: AreaBreakdown {
            region_name: region_name.to_string(),
            value_per_area,
            correction_factor,
            years_of_service: request.years_of_service,
            service_coefficient: coefficient,
            family_members: request.family_members,
            normative_area: normative,
            additional_area: request.additional_area,
            owned_area: request.owned_area,
            total_area,
            amount,
        },
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regions::{RegionConstants, RegionRecord, RegionRegistry, RegionStore};

    #[test]
    fn test_income_subsidy_basic() {
        let request = IncomeRequest {
            region_id: 1,
            family_income: 150000.0,
            family_members: 3,
        };

        let calc = calculate_income_subsidy("Омск", 0.8, &request);

        // (150000 / 3) * 0.8 = 40000.00
        assert_eq!(calc.amount, 40000.00);
        assert_eq!(calc.breakdown.region_name, "Омск");
        assert_eq!(calc.breakdown.coefficient, 0.8);
        assert_eq!(calc.breakdown.family_income, 150000.0);
        assert_eq!(calc.breakdown.family_members, 3);
    }

    #[test]
    fn test_normative_area_step_function() {
        assert_eq!(normative_area(1), 33.0);
        assert_eq!(normative_area(2), 42.0);
        assert_eq!(normative_area(3), 54.0);
        assert_eq!(normative_area(5), 90.0);
    }

    #[test]
    fn test_service_coefficient_tiers() {
        assert_eq!(service_coefficient(0), 1.0);
        assert_eq!(service_coefficient(6), 1.0);
        // Boundaries belong to the higher tier
        assert_eq!(service_coefficient(7), 1.1);
        assert_eq!(service_coefficient(8), 1.1);
        assert_eq!(service_coefficient(9), 1.15);
        assert_eq!(service_coefficient(11), 1.2);
        assert_eq!(service_coefficient(15), 1.25);
        assert_eq!(service_coefficient(19), 1.25);
        assert_eq!(service_coefficient(20), 1.25);
        assert_eq!(service_coefficient(25), 1.375);
        // Saturates at 1.5 from 30 years on
        assert_eq!(service_coefficient(30), 1.5);
        assert_eq!(service_coefficient(40), 1.5);
    }

    #[test]
    fn test_area_subsidy_end_to_end() {
        let request = AreaRequest {
            region_id: 1,
            family_members: 2,
            additional_area: 15.0,
            owned_area: 0.0,
            years_of_service: 11,
        };

        let calc = calculate_area_subsidy("Москва", 90000.0, 1.0, &request);

        // normative 42 + 15 - 0 = 57; 57 * 90000 * 1.0 * 1.2 = 6156000.00
        assert_eq!(calc.breakdown.normative_area, 42.0);
        assert_eq!(calc.breakdown.total_area, 57.0);
        assert_eq!(calc.breakdown.service_coefficient, 1.2);
        assert_eq!(calc.amount, 6156000.00);
        assert_eq!(calc.breakdown.amount, calc.amount);
    }

    #[test]
    fn test_area_subsidy_negative_passthrough() {
        // Owned area exceeds the entitlement: the engine does not clamp.
        let request = AreaRequest {
            region_id: 1,
            family_members: 1,
            additional_area: 0.0,
            owned_area: 50.0,
            years_of_service: 0,
        };

        let calc = calculate_area_subsidy("Омск", 1000.0, 1.0, &request);

        assert_eq!(calc.breakdown.total_area, -17.0);
        assert_eq!(calc.amount, -17000.00);
    }

    #[test]
    fn test_round_currency_half_away_from_zero() {
        // 0.125 is exactly representable, so the .5 cent boundary is real
        assert_eq!(round_currency(0.125), 0.13);
        assert_eq!(round_currency(-0.125), -0.13);
        assert_eq!(round_currency(2.344), 2.34);
        assert_eq!(round_currency(2.346), 2.35);
        assert_eq!(round_currency(40000.0), 40000.0);
    }

    #[test]
    fn test_variant_names() {
        assert_eq!(FormulaVariant::Income.name(), "income");
        assert_eq!(FormulaVariant::from_name("area"), Some(FormulaVariant::Area));
        assert_eq!(FormulaVariant::from_name("both"), None);
    }

    #[test]
    fn test_engine_against_fake_store() {
        // Full lookup-then-calculate flow against the in-memory store.
        let registry = RegionRegistry::from_records(vec![RegionRecord::area(
            7, "Казань", 90000.0, 1.0,
        )]);

        let record = registry.lookup(7).unwrap().unwrap();
        let (value_per_area, correction_factor) = match record.constants {
            RegionConstants::Area {
                value_per_area,
                correction_factor,
            } => (value_per_area, correction_factor),
            RegionConstants::Income { .. } => panic!("expected area constants"),
        };

        let request = AreaRequest {
            region_id: record.id,
            family_members: 2,
            additional_area: 15.0,
            owned_area: 0.0,
            years_of_service: 11,
        };

        let calc = calculate_area_subsidy(&record.name, value_per_area, correction_factor, &request);
        assert_eq!(calc.amount, 6156000.00);
    }
}
