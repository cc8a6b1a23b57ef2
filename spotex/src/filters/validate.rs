//! Field-level validation of [`SearchFilters`].
//!
//! Validation never fails fast: every problem is collected so the search endpoint can report
//! all of them in one response. An empty issue list means the filters are valid.

use serde_json::Value;

use crate::errors::{ValidationError, ValidationIssue, ValidationResult, codes};
use crate::filters::types::{
    DateRange, EnumeratedField, LocationFilter, MAX_PER_PAGE, MAX_QUERY_LENGTH, MAX_RADIUS_MILES, MIN_PAGE,
    NumericRange, RangeBounds, SORT_DIRECTIONS, SORT_KEYS, SearchFilters,
};
use crate::validators::{is_allowed, is_valid_state_code, parse_filter_date};

/// Validate filters, returning every issue found.
pub fn validate(filters: &SearchFilters) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if let Some(query) = filters.query.as_deref() {
        let length = query.chars().count();
        if length > MAX_QUERY_LENGTH {
            issues.push(ValidationIssue::new(
                "query",
                codes::LENGTH,
                format!("search text must be at most {MAX_QUERY_LENGTH} characters (got {length})"),
            ));
        }
    }

    for (name, location) in filters.locations() {
        if let Some(location) = location {
            validate_location(name, location, &mut issues);
        }
    }

    for (name, range) in filters.date_ranges() {
        if let Some(range) = range {
            validate_date_range(name, range, &mut issues);
        }
    }

    for (bounds, range) in filters.numeric_ranges() {
        if let Some(range) = range {
            validate_numeric_range(bounds, range, &mut issues);
        }
    }

    for (field, values) in filters.enumerated_fields() {
        if let Some(values) = values {
            validate_enumerated(field, values, &mut issues);
        }
    }

    validate_keyword(filters.sort_by.as_deref(), "sort_by", SORT_KEYS, &mut issues);
    validate_keyword(filters.sort_direction.as_deref(), "sort_direction", SORT_DIRECTIONS, &mut issues);

    if let Some(page) = filters.page
        && page < MIN_PAGE
    {
        issues.push(ValidationIssue::new("page", codes::RANGE, "page must be at least 1"));
    }

    if let Some(per_page) = filters.per_page
        && !(1..=MAX_PER_PAGE).contains(&per_page)
    {
        issues.push(ValidationIssue::new(
            "per_page",
            codes::RANGE,
            format!("per_page must be between 1 and {MAX_PER_PAGE}"),
        ));
    }

    issues
}

/// Parse a raw JSON filter object and validate it.
///
/// A value that does not have the shape of [`SearchFilters`] yields a single `filters` issue.
pub fn validate_value(value: &Value) -> Vec<ValidationIssue> {
    match SearchFilters::from_value(value) {
        Ok(filters) => validate(&filters),
        Err(err) => vec![ValidationIssue::new("filters", codes::MALFORMED, err.to_string())],
    }
}

/// `Result` flavoured wrapper for callers that reject invalid filters outright.
pub fn ensure_valid(filters: &SearchFilters) -> ValidationResult<()> {
    ValidationError::new(validate(filters)).into_result()
}

fn validate_location(name: &str, location: &LocationFilter, issues: &mut Vec<ValidationIssue>) {
    if let Some(radius) = location.radius
        && !(0.0..=MAX_RADIUS_MILES).contains(&radius)
    {
        issues.push(ValidationIssue::new(
            format!("{name}.radius"),
            codes::RANGE,
            format!("radius must be between 0 and {MAX_RADIUS_MILES} miles"),
        ));
    }

    if let Some(state) = location.state.as_deref() {
        let trimmed = state.trim();
        if !trimmed.is_empty() && !is_valid_state_code(trimmed) {
            issues.push(ValidationIssue::new(
                format!("{name}.state"),
                codes::FORMAT,
                "state must be a two-letter code",
            ));
        }
    }

    if let Some(latitude) = location.latitude
        && !(-90.0..=90.0).contains(&latitude)
    {
        issues.push(ValidationIssue::new(
            format!("{name}.latitude"),
            codes::RANGE,
            "latitude must be between -90 and 90",
        ));
    }

    if let Some(longitude) = location.longitude
        && !(-180.0..=180.0).contains(&longitude)
    {
        issues.push(ValidationIssue::new(
            format!("{name}.longitude"),
            codes::RANGE,
            "longitude must be between -180 and 180",
        ));
    }
}

fn validate_date_range(name: &str, range: &DateRange, issues: &mut Vec<ValidationIssue>) {
    let mut parse_bound = |bound: &str, raw: Option<&str>| {
        let raw = raw.map(str::trim).filter(|value| !value.is_empty())?;
        let parsed = parse_filter_date(raw);
        if parsed.is_none() {
            issues.push(ValidationIssue::new(
                format!("{name}.{bound}"),
                codes::DATE,
                format!("'{raw}' is not a valid date (expected YYYY-MM-DD)"),
            ));
        }
        parsed
    };

    let from = parse_bound("from", range.from.as_deref());
    let to = parse_bound("to", range.to.as_deref());

    if let (Some(from), Some(to)) = (from, to)
        && from > to
    {
        issues.push(ValidationIssue::new(
            name,
            codes::ORDER,
            format!("start date {from} is after end date {to}"),
        ));
    }
}

fn validate_numeric_range(bounds: RangeBounds, range: &NumericRange, issues: &mut Vec<ValidationIssue>) {
    let within = |value: f64| value >= bounds.floor && value <= bounds.ceiling;
    let out_of_bounds = |bound: &str| {
        ValidationIssue::new(
            format!("{}.{bound}", bounds.field),
            codes::RANGE,
            format!("{bound} must be between {} and {}", bounds.floor, bounds.ceiling),
        )
    };

    if let Some(min) = range.min
        && !within(min)
    {
        issues.push(out_of_bounds("min"));
    }
    if let Some(max) = range.max
        && !within(max)
    {
        issues.push(out_of_bounds("max"));
    }
    if let (Some(min), Some(max)) = (range.min, range.max)
        && min > max
    {
        issues.push(ValidationIssue::new(
            bounds.field,
            codes::ORDER,
            format!("min ({min}) must not exceed max ({max})"),
        ));
    }
}

fn validate_enumerated(field: EnumeratedField, values: &[String], issues: &mut Vec<ValidationIssue>) {
    let unsupported: Vec<&str> = values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty() && !is_allowed(value, field.allowed))
        .collect();

    if !unsupported.is_empty() {
        issues.push(ValidationIssue::new(
            field.field,
            codes::ENUM,
            format!("unsupported {}: {}", field.label, unsupported.join(", ")),
        ));
    }
}

fn validate_keyword(value: Option<&str>, field: &str, allowed: &[&str], issues: &mut Vec<ValidationIssue>) {
    let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return;
    };
    if !is_allowed(value, allowed) {
        issues.push(ValidationIssue::new(
            field,
            codes::ENUM,
            format!("'{value}' is not one of: {}", allowed.join(", ")),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn issues_for(value: Value) -> Vec<ValidationIssue> {
        validate_value(&value)
    }

    fn fields(issues: &[ValidationIssue]) -> Vec<&str> {
        issues.iter().map(|issue| issue.field.as_str()).collect()
    }

    #[test]
    fn empty_filters_are_valid() {
        assert!(issues_for(json!({})).is_empty());
        assert!(issues_for(Value::Null).is_empty());
    }

    #[test]
    fn per_page_bounds() {
        assert_eq!(fields(&issues_for(json!({ "per_page": 0 }))), vec!["per_page"]);
        assert_eq!(fields(&issues_for(json!({ "per_page": 101 }))), vec!["per_page"]);
        assert!(issues_for(json!({ "per_page": 100 })).is_empty());
        assert!(issues_for(json!({ "per_page": 1 })).is_empty());
    }

    #[test]
    fn page_must_be_positive() {
        assert_eq!(fields(&issues_for(json!({ "page": 0 }))), vec!["page"]);
        assert_eq!(fields(&issues_for(json!({ "page": -3 }))), vec!["page"]);
        assert!(issues_for(json!({ "page": 1 })).is_empty());
    }

    #[test]
    fn inverted_pickup_dates_yield_one_issue() {
        let issues = issues_for(json!({
            "pickup_date_range": { "from": "2024-12-31", "to": "2024-01-01" }
        }));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "pickup_date_range");
        assert_eq!(issues[0].code, codes::ORDER);
    }

    #[test]
    fn same_day_and_open_ended_ranges_are_valid() {
        assert!(issues_for(json!({ "delivery_date_range": { "from": "2024-05-01", "to": "2024-05-01" } })).is_empty());
        assert!(issues_for(json!({ "delivery_date_range": { "from": "2024-05-01" } })).is_empty());
        assert!(issues_for(json!({ "delivery_date_range": { "to": "  " } })).is_empty());
    }

    #[test]
    fn unparseable_dates_point_at_the_bound() {
        let issues = issues_for(json!({ "pickup_date_range": { "from": "next tuesday", "to": "2024-01-01" } }));
        assert_eq!(fields(&issues), vec!["pickup_date_range.from"]);
        assert_eq!(issues[0].code, codes::DATE);
    }

    #[test]
    fn unknown_equipment_type_is_rejected() {
        let issues = issues_for(json!({ "equipment_types": ["not_a_type"] }));
        assert_eq!(fields(&issues), vec!["equipment_types"]);
        assert!(issues[0].message.contains("not_a_type"));
    }

    #[test]
    fn known_types_pass_regardless_of_case() {
        assert!(issues_for(json!({ "equipment_types": ["Reefer", " dry_van "], "cargo_types": [] })).is_empty());
        assert!(issues_for(json!({ "status": ["open", "BIDDING"], "urgency": ["high"] })).is_empty());
    }

    #[test]
    fn offending_entries_are_reported_once_per_field() {
        let issues = issues_for(json!({ "cargo_types": ["general", "plutonium", "gravel"] }));
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.ends_with("plutonium, gravel"));
    }

    #[test]
    fn numeric_ranges_check_floor_ceiling_and_order() {
        let issues = issues_for(json!({ "rate_range": { "min": -5, "max": 2_000_000 } }));
        assert_eq!(fields(&issues), vec!["rate_range.min", "rate_range.max"]);

        let issues = issues_for(json!({ "weight_range": { "min": 40_000, "max": 10_000 } }));
        assert_eq!(fields(&issues), vec!["weight_range"]);
        assert_eq!(issues[0].code, codes::ORDER);

        assert!(issues_for(json!({ "distance_range": { "min": 0, "max": 10_000 } })).is_empty());
    }

    #[test]
    fn radius_and_coordinates_are_bounded() {
        let issues = issues_for(json!({
            "origin": { "city": "Chicago", "radius": 501 },
            "destination": { "radius": -1, "latitude": 91.0, "longitude": -181.0 }
        }));
        assert_eq!(
            fields(&issues),
            vec![
                "origin.radius",
                "destination.radius",
                "destination.latitude",
                "destination.longitude"
            ]
        );
        assert!(issues_for(json!({ "origin": { "radius": 500 } })).is_empty());
    }

    #[test]
    fn state_must_be_two_letters() {
        assert_eq!(fields(&issues_for(json!({ "origin": { "state": "Illinois" } }))), vec!["origin.state"]);
        assert!(issues_for(json!({ "origin": { "state": " il " } })).is_empty());
    }

    #[test]
    fn long_search_text_is_rejected() {
        let text = "a".repeat(MAX_QUERY_LENGTH + 1);
        assert_eq!(fields(&issues_for(json!({ "query": text }))), vec!["query"]);
        let text = "é".repeat(MAX_QUERY_LENGTH);
        assert!(issues_for(json!({ "query": text })).is_empty());
    }

    #[test]
    fn sort_options_are_checked() {
        let issues = issues_for(json!({ "sort_by": "popularity", "sort_direction": "sideways" }));
        assert_eq!(fields(&issues), vec!["sort_by", "sort_direction"]);
        assert!(issues_for(json!({ "sort_by": "Rate", "sort_direction": "DESC" })).is_empty());
    }

    #[test]
    fn all_issues_are_accumulated() {
        let issues = issues_for(json!({
            "page": 0,
            "per_page": 500,
            "equipment_types": ["spaceship"],
            "rate_range": { "min": 10, "max": 1 }
        }));
        assert_eq!(issues.len(), 4);
    }

    #[test]
    fn malformed_shape_is_a_single_issue() {
        let issues = issues_for(json!({ "per_page": "lots" }));
        assert_eq!(fields(&issues), vec!["filters"]);
        assert_eq!(issues[0].code, codes::MALFORMED);
    }

    #[test]
    fn validation_is_repeatable() {
        let filters = SearchFilters::from_value(&json!({ "per_page": 0, "origin": { "radius": 900 } })).expect("parse");
        assert_eq!(validate(&filters), validate(&filters));
        assert!(ensure_valid(&filters).is_err());
        assert!(ensure_valid(&SearchFilters::default()).is_ok());
    }
}
