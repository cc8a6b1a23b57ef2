//! Canonicalization of [`SearchFilters`].
//!
//! `normalize` is the single gate every filter value passes through before it reaches the query
//! builder or is stored as a saved search. It never fails: out-of-range values are repaired
//! rather than rejected, so strict callers must run [`crate::filters::validate`] first.

use serde_json::Value;

use crate::filters::types::{
    DateRange, LocationFilter, MAX_PER_PAGE, MAX_QUERY_LENGTH, MAX_RADIUS_MILES, MIN_PAGE, NumericRange, RangeBounds,
    DISTANCE_BOUNDS, RATE_BOUNDS, RATE_PER_MILE_BOUNDS, SearchFilters, WEIGHT_BOUNDS,
};

/// Produce the canonical form of `filters`. Applying it twice is the same as applying it once.
pub fn normalize(filters: SearchFilters) -> SearchFilters {
    SearchFilters {
        query: filters.query.as_deref().and_then(normalize_query),
        origin: filters.origin.and_then(normalize_location),
        destination: filters.destination.and_then(normalize_location),
        pickup_date_range: filters.pickup_date_range.and_then(normalize_date_range),
        delivery_date_range: filters.delivery_date_range.and_then(normalize_date_range),
        rate_range: filters.rate_range.and_then(|range| normalize_range(range, RATE_BOUNDS)),
        rate_per_mile_range: filters
            .rate_per_mile_range
            .and_then(|range| normalize_range(range, RATE_PER_MILE_BOUNDS)),
        weight_range: filters.weight_range.and_then(|range| normalize_range(range, WEIGHT_BOUNDS)),
        distance_range: filters.distance_range.and_then(|range| normalize_range(range, DISTANCE_BOUNDS)),
        equipment_types: filters.equipment_types.and_then(normalize_list),
        cargo_types: filters.cargo_types.and_then(normalize_list),
        status: filters.status.and_then(normalize_list),
        urgency: filters.urgency.and_then(normalize_list),
        hazmat: filters.hazmat,
        team_driver: filters.team_driver,
        has_bids: filters.has_bids,
        sort_by: filters.sort_by.as_deref().and_then(normalize_keyword),
        sort_direction: filters.sort_direction.as_deref().and_then(normalize_keyword),
        page: filters.page.map(|page| page.max(MIN_PAGE)),
        per_page: filters.per_page.map(|per_page| per_page.clamp(1, MAX_PER_PAGE)),
    }
}

/// Normalize a raw JSON filter object. Malformed input normalizes to empty filters.
pub fn normalize_value(value: &Value) -> SearchFilters {
    match SearchFilters::from_value(value) {
        Ok(filters) => normalize(filters),
        Err(err) => {
            log::debug!("discarding malformed filters during normalization: {err}");
            SearchFilters::default()
        }
    }
}

fn normalize_string(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn normalize_query(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.chars().count() <= MAX_QUERY_LENGTH {
        return normalize_string(trimmed);
    }
    let truncated: String = trimmed.chars().take(MAX_QUERY_LENGTH).collect();
    normalize_string(&truncated)
}

fn normalize_keyword(value: &str) -> Option<String> {
    normalize_string(value).map(|value| value.to_ascii_lowercase())
}

fn normalize_location(location: LocationFilter) -> Option<LocationFilter> {
    let normalized = LocationFilter {
        city: location.city.as_deref().and_then(normalize_string),
        state: location
            .state
            .as_deref()
            .and_then(normalize_string)
            .map(|state| state.to_ascii_uppercase()),
        radius: location.radius.map(|radius| radius.clamp(0.0, MAX_RADIUS_MILES)),
        latitude: location.latitude.map(|latitude| latitude.clamp(-90.0, 90.0)),
        longitude: location.longitude.map(|longitude| longitude.clamp(-180.0, 180.0)),
    };
    (!normalized.is_empty()).then_some(normalized)
}

fn normalize_date_range(range: DateRange) -> Option<DateRange> {
    let normalized = DateRange {
        from: range.from.as_deref().and_then(normalize_string),
        to: range.to.as_deref().and_then(normalize_string),
    };
    (normalized.from.is_some() || normalized.to.is_some()).then_some(normalized)
}

fn normalize_range(range: NumericRange, bounds: RangeBounds) -> Option<NumericRange> {
    let clamp = |value: f64| value.clamp(bounds.floor, bounds.ceiling);
    let mut min = range.min.map(clamp);
    let mut max = range.max.map(clamp);
    if let (Some(low), Some(high)) = (min, max)
        && low > high
    {
        min = Some(high);
        max = Some(low);
    }
    (min.is_some() || max.is_some()).then_some(NumericRange { min, max })
}

fn normalize_list(values: Vec<String>) -> Option<Vec<String>> {
    let mut normalized: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let Some(entry) = normalize_keyword(&value) else {
            continue;
        };
        if !normalized.contains(&entry) {
            normalized.push(entry);
        }
    }
    (!normalized.is_empty()).then_some(normalized)
}
