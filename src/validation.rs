// 📐 Validation Stage - Raw input to typed, in-domain requests
//
// Given an untyped JSON body, produce a fully-typed request the engine can
// trust, or a descriptive error naming the offending field. Rules apply in
// order and fail fast on the first violation:
//   1. every required field is present (absence is its own error kind),
//   2. numeric fields parse; integer-typed fields are whole numbers,
//   3. domain bounds hold.
// Region resolution is NOT part of this stage - a missing region is a
// NotFound condition surfaced after the store lookup.

use crate::engine::{AreaRequest, IncomeRequest};
use serde_json::Value;

// ============================================================================
// VALIDATION ERROR
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    /// A required field is absent (or null).
    MissingField,
    /// A field is present but the wrong type or outside its domain.
    OutOfDomain,
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub kind: ValidationKind,
}

impl ValidationError {
    fn missing(field: &str) -> Self {
        ValidationError {
            field: field.to_string(),
            message: "required field is missing".to_string(),
            kind: ValidationKind::MissingField,
        }
    }

    fn out_of_domain(field: &str, message: &str) -> Self {
        ValidationError {
            field: field.to_string(),
            message: message.to_string(),
            kind: ValidationKind::OutOfDomain,
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult<T> = Result<T, ValidationError>;

// ============================================================================
// FIELD HELPERS
// ============================================================================

/// Rule 1: the field must be present and non-null.
fn require<'a>(body: &'a Value, field: &str) -> ValidationResult<&'a Value> {
    match body.get(field) {
        Some(Value::Null) | None => Err(ValidationError::missing(field)),
        Some(value) => Ok(value),
    }
}

/// Rule 2 for real-valued fields: must be a finite JSON number.
fn number(value: &Value, field: &str) -> ValidationResult<f64> {
    value
        .as_f64()
        .filter(|n| n.is_finite())
        .ok_or_else(|| ValidationError::out_of_domain(field, "must be a number"))
}

/// Rule 2 for integer-typed fields: a whole number (2.0 is fine, 2.5 is not).
fn whole_number(value: &Value, field: &str) -> ValidationResult<i64> {
    let n = number(value, field)?;
    if n.fract() != 0.0 || n < i64::MIN as f64 || n > i64::MAX as f64 {
        return Err(ValidationError::out_of_domain(
            field,
            "must be a whole number",
        ));
    }
    Ok(n as i64)
}

fn positive_number(value: &Value, field: &str) -> ValidationResult<f64> {
    let n = number(value, field)?;
    if n <= 0.0 {
        return Err(ValidationError::out_of_domain(
            field,
            "must be a positive number",
        ));
    }
    Ok(n)
}

fn non_negative_number(value: &Value, field: &str) -> ValidationResult<f64> {
    let n = number(value, field)?;
    if n < 0.0 {
        return Err(ValidationError::out_of_domain(
            field,
            "must be zero or greater",
        ));
    }
    Ok(n)
}

fn positive_integer(value: &Value, field: &str) -> ValidationResult<u32> {
    let n = whole_number(value, field)?;
    if n < 1 {
        return Err(ValidationError::out_of_domain(field, "must be at least 1"));
    }
    u32::try_from(n)
        .map_err(|_| ValidationError::out_of_domain(field, "is implausibly large"))
}

fn non_negative_integer(value: &Value, field: &str) -> ValidationResult<u32> {
    let n = whole_number(value, field)?;
    if n < 0 {
        return Err(ValidationError::out_of_domain(
            field,
            "must be zero or greater",
        ));
    }
    u32::try_from(n)
        .map_err(|_| ValidationError::out_of_domain(field, "is implausibly large"))
}

/// Region ids arrive as a JSON integer or a numeric string (HTML selects
/// post strings); both normalize to the store key.
fn region_id(value: &Value, field: &str) -> ValidationResult<i64> {
    match value {
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ValidationError::out_of_domain(field, "must be a region id")),
        other => whole_number(other, field),
    }
}

// ============================================================================
// REQUEST VALIDATORS
// ============================================================================

/// Validate a Variant A (income) request body.
pub fn validate_income_request(body: &Value) -> ValidationResult<IncomeRequest> {
    let raw_region = require(body, "regionId")?;
    let raw_income = require(body, "familyIncome")?;
    let raw_members = require(body, "familyMembers")?;

    Ok(IncomeRequest {
        region_id: region_id(raw_region, "regionId")?,
        family_income: positive_number(raw_income, "familyIncome")?,
        family_members: positive_integer(raw_members, "familyMembers")?,
    })
}

/// Validate a Variant B (area/service) request body.
pub fn validate_area_request(body: &Value) -> ValidationResult<AreaRequest> {
    let raw_region = require(body, "regionId")?;
    let raw_members = require(body, "familyMembers")?;
    let raw_additional = require(body, "additionalArea")?;
    let raw_owned = require(body, "ownedArea")?;
    let raw_years = require(body, "yearsOfService")?;

    Ok(AreaRequest {
        region_id: region_id(raw_region, "regionId")?,
        family_members: positive_integer(raw_members, "familyMembers")?,
        additional_area: non_negative_number(raw_additional, "additionalArea")?,
        owned_area: non_negative_number(raw_owned, "ownedArea")?,
        years_of_service: non_negative_integer(raw_years, "yearsOfService")?,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_area_body() -> Value {
        json!({
            "regionId": 1,
            "familyMembers": 2,
            "additionalArea": 15.0,
            "ownedArea": 0.0,
            "yearsOfService": 11
        })
    }

    #[test]
    fn test_valid_income_request() {
        let body = json!({
            "regionId": 3,
            "familyIncome": 150000.0,
            "familyMembers": 3
        });

        let request = validate_income_request(&body).unwrap();
        assert_eq!(request.region_id, 3);
        assert_eq!(request.family_income, 150000.0);
        assert_eq!(request.family_members, 3);
    }

    #[test]
    fn test_valid_area_request() {
        let request = validate_area_request(&valid_area_body()).unwrap();
        assert_eq!(request.region_id, 1);
        assert_eq!(request.family_members, 2);
        assert_eq!(request.additional_area, 15.0);
        assert_eq!(request.owned_area, 0.0);
        assert_eq!(request.years_of_service, 11);
    }

    #[test]
    fn test_missing_field_is_distinct_kind() {
        let body = json!({ "regionId": 1, "familyMembers": 2 });

        let err = validate_income_request(&body).unwrap_err();
        assert_eq!(err.field, "familyIncome");
        assert_eq!(err.kind, ValidationKind::MissingField);
    }

    #[test]
    fn test_null_counts_as_missing() {
        let mut body = valid_area_body();
        body["ownedArea"] = Value::Null;

        let err = validate_area_request(&body).unwrap_err();
        assert_eq!(err.field, "ownedArea");
        assert_eq!(err.kind, ValidationKind::MissingField);
    }

    #[test]
    fn test_income_must_be_positive() {
        let body = json!({
            "regionId": 1,
            "familyIncome": 0,
            "familyMembers": 2
        });

        let err = validate_income_request(&body).unwrap_err();
        assert_eq!(err.field, "familyIncome");
        assert_eq!(err.kind, ValidationKind::OutOfDomain);
    }

    #[test]
    fn test_members_zero_rejected() {
        let mut body = valid_area_body();
        body["familyMembers"] = json!(0);

        let err = validate_area_request(&body).unwrap_err();
        assert_eq!(err.field, "familyMembers");
        assert_eq!(err.kind, ValidationKind::OutOfDomain);
    }

    #[test]
    fn test_members_fractional_rejected() {
        let mut body = valid_area_body();
        body["familyMembers"] = json!(2.5);

        let err = validate_area_request(&body).unwrap_err();
        assert_eq!(err.field, "familyMembers");
        assert_eq!(err.message, "must be a whole number");
    }

    #[test]
    fn test_members_whole_float_accepted() {
        // 2.0 is a whole number even though it arrives as a float
        let mut body = valid_area_body();
        body["familyMembers"] = json!(2.0);

        let request = validate_area_request(&body).unwrap();
        assert_eq!(request.family_members, 2);
    }

    #[test]
    fn test_negative_additional_area_rejected() {
        let mut body = valid_area_body();
        body["additionalArea"] = json!(-1);

        let err = validate_area_request(&body).unwrap_err();
        assert_eq!(err.field, "additionalArea");
        assert_eq!(err.kind, ValidationKind::OutOfDomain);
    }

    #[test]
    fn test_non_numeric_field_rejected() {
        let mut body = valid_area_body();
        body["yearsOfService"] = json!("eleven");

        let err = validate_area_request(&body).unwrap_err();
        assert_eq!(err.field, "yearsOfService");
        assert_eq!(err.message, "must be a number");
    }

    #[test]
    fn test_region_id_numeric_string_accepted() {
        let mut body = valid_area_body();
        body["regionId"] = json!("5");

        let request = validate_area_request(&body).unwrap();
        assert_eq!(request.region_id, 5);
    }

    #[test]
    fn test_region_id_garbage_string_rejected() {
        let mut body = valid_area_body();
        body["regionId"] = json!("fifth");

        let err = validate_area_request(&body).unwrap_err();
        assert_eq!(err.field, "regionId");
        assert_eq!(err.kind, ValidationKind::OutOfDomain);
    }

    #[test]
    fn test_presence_checked_before_values() {
        // regionId invalid AND yearsOfService missing: presence wins
        let body = json!({
            "regionId": "junk",
            "familyMembers": 2,
            "additionalArea": 0,
            "ownedArea": 0
        });

        let err = validate_area_request(&body).unwrap_err();
        assert_eq!(err.field, "yearsOfService");
        assert_eq!(err.kind, ValidationKind::MissingField);
    }
}
