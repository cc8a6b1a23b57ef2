use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(feature = "utoipa")]
use utoipa::ToSchema;

use crate::errors::SearchError;

pub const MAX_QUERY_LENGTH: usize = 1000;
pub const MAX_RADIUS_MILES: f64 = 500.0;
pub const MIN_PAGE: i64 = 1;
pub const MAX_PER_PAGE: i64 = 100;

pub const EQUIPMENT_TYPES: &[&str] = &[
    "dry_van",
    "reefer",
    "flatbed",
    "step_deck",
    "lowboy",
    "power_only",
    "box_truck",
    "conestoga",
    "tanker",
    "hotshot",
    "container",
    "car_hauler",
];

pub const CARGO_TYPES: &[&str] = &[
    "general",
    "refrigerated",
    "hazmat",
    "oversized",
    "fragile",
    "livestock",
    "automotive",
    "machinery",
    "building_materials",
    "food_grade",
    "liquid_bulk",
    "dry_bulk",
];

pub const OPPORTUNITY_STATUSES: &[&str] = &["open", "bidding", "awarded", "in_transit", "delivered", "cancelled", "expired"];

pub const URGENCY_LEVELS: &[&str] = &["low", "normal", "high", "critical"];

pub const SORT_KEYS: &[&str] = &[
    "created_at",
    "pickup_date",
    "delivery_date",
    "rate",
    "rate_per_mile",
    "weight",
    "distance",
    "bid_count",
];

pub const SORT_DIRECTIONS: &[&str] = &["asc", "desc"];

/// Absolute bounds for one of the numeric range filters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeBounds {
    pub field: &'static str,
    pub floor: f64,
    pub ceiling: f64,
}

pub const RATE_BOUNDS: RangeBounds = RangeBounds {
    field: "rate_range",
    floor: 0.0,
    ceiling: 1_000_000.0,
};

pub const RATE_PER_MILE_BOUNDS: RangeBounds = RangeBounds {
    field: "rate_per_mile_range",
    floor: 0.0,
    ceiling: 1_000.0,
};

pub const WEIGHT_BOUNDS: RangeBounds = RangeBounds {
    field: "weight_range",
    floor: 0.0,
    ceiling: 200_000.0,
};

pub const DISTANCE_BOUNDS: RangeBounds = RangeBounds {
    field: "distance_range",
    floor: 0.0,
    ceiling: 10_000.0,
};

/// An array filter restricted to a fixed vocabulary.
#[derive(Debug, Clone, Copy)]
pub struct EnumeratedField {
    pub field: &'static str,
    /// Human label used in messages (`equipment type`).
    pub label: &'static str,
    pub allowed: &'static [&'static str],
}

pub const EQUIPMENT_FIELD: EnumeratedField = EnumeratedField {
    field: "equipment_types",
    label: "equipment type",
    allowed: EQUIPMENT_TYPES,
};

pub const CARGO_FIELD: EnumeratedField = EnumeratedField {
    field: "cargo_types",
    label: "cargo type",
    allowed: CARGO_TYPES,
};

pub const STATUS_FIELD: EnumeratedField = EnumeratedField {
    field: "status",
    label: "status",
    allowed: OPPORTUNITY_STATUSES,
};

pub const URGENCY_FIELD: EnumeratedField = EnumeratedField {
    field: "urgency",
    label: "urgency",
    allowed: URGENCY_LEVELS,
};

#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Search radius in miles around the coordinates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl LocationFilter {
    pub fn is_empty(&self) -> bool {
        self.city.is_none()
            && self.state.is_none()
            && self.radius.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
    }

    /// Coordinates as `(longitude, latitude)`, only when both are present.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.longitude?, self.latitude?))
    }
}

#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumericRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl NumericRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }
}

/// Opportunity search filters as submitted by the search endpoint or stored in a saved search.
///
/// Values are deliberately loose (signed page numbers, unchecked strings) so bad input can be
/// reported field by field by [`crate::filters::validate`] instead of failing at deserialization.
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<LocationFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<LocationFilter>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup_date_range: Option<DateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_date_range: Option<DateRange>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_range: Option<NumericRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_per_mile_range: Option<NumericRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_range: Option<NumericRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_range: Option<NumericRange>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub equipment_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cargo_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hazmat: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_driver: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_bids: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_direction: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<i64>,
}

impl SearchFilters {
    /// Interpret a raw JSON value (the `filters` field of a request body).
    ///
    /// `null` is treated as "no filters".
    pub fn from_value(value: &Value) -> Result<Self, SearchError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone()).map_err(|err| SearchError::InvalidRequest {
            message: format!("malformed filters: {err}"),
        })
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn locations(&self) -> [(&'static str, Option<&LocationFilter>); 2] {
        [("origin", self.origin.as_ref()), ("destination", self.destination.as_ref())]
    }

    pub fn date_ranges(&self) -> [(&'static str, Option<&DateRange>); 2] {
        [
            ("pickup_date_range", self.pickup_date_range.as_ref()),
            ("delivery_date_range", self.delivery_date_range.as_ref()),
        ]
    }

    pub fn numeric_ranges(&self) -> [(RangeBounds, Option<&NumericRange>); 4] {
        [
            (RATE_BOUNDS, self.rate_range.as_ref()),
            (RATE_PER_MILE_BOUNDS, self.rate_per_mile_range.as_ref()),
            (WEIGHT_BOUNDS, self.weight_range.as_ref()),
            (DISTANCE_BOUNDS, self.distance_range.as_ref()),
        ]
    }

    pub fn enumerated_fields(&self) -> [(EnumeratedField, Option<&Vec<String>>); 4] {
        [
            (EQUIPMENT_FIELD, self.equipment_types.as_ref()),
            (CARGO_FIELD, self.cargo_types.as_ref()),
            (STATUS_FIELD, self.status.as_ref()),
            (URGENCY_FIELD, self.urgency.as_ref()),
        ]
    }

    /// Every free-form string in the filters paired with its dotted field path.
    pub fn text_fields(&self) -> Vec<(String, &str)> {
        let mut fields = Vec::new();
        if let Some(query) = self.query.as_deref() {
            fields.push(("query".to_string(), query));
        }
        for (name, location) in self.locations() {
            let Some(location) = location else { continue };
            if let Some(city) = location.city.as_deref() {
                fields.push((format!("{name}.city"), city));
            }
            if let Some(state) = location.state.as_deref() {
                fields.push((format!("{name}.state"), state));
            }
        }
        for (name, range) in self.date_ranges() {
            let Some(range) = range else { continue };
            if let Some(from) = range.from.as_deref() {
                fields.push((format!("{name}.from"), from));
            }
            if let Some(to) = range.to.as_deref() {
                fields.push((format!("{name}.to"), to));
            }
        }
        for (field, values) in self.enumerated_fields() {
            for value in values.into_iter().flatten() {
                fields.push((field.field.to_string(), value.as_str()));
            }
        }
        if let Some(sort_by) = self.sort_by.as_deref() {
            fields.push(("sort_by".to_string(), sort_by));
        }
        if let Some(direction) = self.sort_direction.as_deref() {
            fields.push(("sort_direction".to_string(), direction));
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_and_empty_objects_parse_as_default() {
        assert_eq!(SearchFilters::from_value(&Value::Null).expect("null"), SearchFilters::default());
        assert_eq!(SearchFilters::from_value(&json!({})).expect("empty"), SearchFilters::default());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let filters = SearchFilters::from_value(&json!({ "page": 2, "colour": "blue" })).expect("parse");
        assert_eq!(filters.page, Some(2));
    }

    #[test]
    fn wrong_shapes_are_rejected() {
        let err = SearchFilters::from_value(&json!({ "page": "two" })).expect_err("page must be numeric");
        assert!(matches!(err, SearchError::InvalidRequest { .. }));
        assert!(SearchFilters::from_value(&json!(["not", "an", "object"])).is_err());
    }

    #[test]
    fn absent_fields_are_not_serialized() {
        let filters = SearchFilters {
            origin: Some(LocationFilter {
                city: Some("Chicago".to_string()),
                ..LocationFilter::default()
            }),
            ..SearchFilters::default()
        };
        assert_eq!(filters.to_value(), json!({ "origin": { "city": "Chicago" } }));
    }

    #[test]
    fn text_fields_use_dotted_paths() {
        let filters = SearchFilters::from_value(&json!({
            "query": "steel coils",
            "destination": { "state": "tx" },
            "equipment_types": ["flatbed"]
        }))
        .expect("parse");
        let paths: Vec<String> = filters.text_fields().into_iter().map(|(path, _)| path).collect();
        assert_eq!(paths, vec!["query", "destination.state", "equipment_types"]);
    }
}
