use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use redis::aio::ConnectionLike;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::errors::{SearchError, ValidationError};
use crate::filters::{DateRange, LocationFilter, NumericRange, SearchFilters, normalize, normalize_value, validate_value};
use crate::keys::KeyContext;
use crate::search::{
    DEFAULT_PAGE, DEFAULT_PAGE_SIZE, FilterCondition, IndexDefinition, IndexField, IndexFieldType, MAX_PAGE_SIZE,
    SearchParams, SearchResult, SearchSort, SortField, SortOrder, build_text_query, execute_search,
};
use crate::validators::{is_valid_uuid, parse_filter_date};

/// TEXT attributes searched by the free-text `query` filter.
pub const OPPORTUNITY_TEXT_FIELDS: &[&str] = &["title", "description", "commodity"];

pub const OPPORTUNITY_SORTS: &[SortField] = &[
    SortField {
        name: "created_at",
        path: "created_at_ts",
        default_order: SortOrder::Desc,
    },
    SortField {
        name: "pickup_date",
        path: "pickup_ts",
        default_order: SortOrder::Asc,
    },
    SortField {
        name: "delivery_date",
        path: "delivery_ts",
        default_order: SortOrder::Asc,
    },
    SortField {
        name: "rate",
        path: "rate",
        default_order: SortOrder::Desc,
    },
    SortField {
        name: "rate_per_mile",
        path: "rate_per_mile",
        default_order: SortOrder::Desc,
    },
    SortField {
        name: "weight",
        path: "weight",
        default_order: SortOrder::Asc,
    },
    SortField {
        name: "distance",
        path: "distance",
        default_order: SortOrder::Asc,
    },
    SortField {
        name: "bid_count",
        path: "bid_count",
        default_order: SortOrder::Desc,
    },
];

const fn field(path: &'static str, field_name: &'static str, field_type: IndexFieldType, sortable: bool) -> IndexField {
    IndexField {
        path,
        field_name,
        field_type,
        sortable,
    }
}

pub const OPPORTUNITY_SCHEMA: &[IndexField] = &[
    field("$.tenant_id", "tenant_id", IndexFieldType::Tag, false),
    field("$.title", "title", IndexFieldType::Text, false),
    field("$.description", "description", IndexFieldType::Text, false),
    field("$.commodity", "commodity", IndexFieldType::Text, false),
    field("$.origin_city", "origin_city", IndexFieldType::Tag, false),
    field("$.origin_state", "origin_state", IndexFieldType::Tag, false),
    field("$.origin_geo", "origin_geo", IndexFieldType::Geo, false),
    field("$.destination_city", "destination_city", IndexFieldType::Tag, false),
    field("$.destination_state", "destination_state", IndexFieldType::Tag, false),
    field("$.destination_geo", "destination_geo", IndexFieldType::Geo, false),
    field("$.pickup_ts", "pickup_ts", IndexFieldType::Numeric, true),
    field("$.delivery_ts", "delivery_ts", IndexFieldType::Numeric, true),
    field("$.rate", "rate", IndexFieldType::Numeric, true),
    field("$.rate_per_mile", "rate_per_mile", IndexFieldType::Numeric, true),
    field("$.weight", "weight", IndexFieldType::Numeric, true),
    field("$.distance", "distance", IndexFieldType::Numeric, true),
    field("$.equipment_type", "equipment_type", IndexFieldType::Tag, false),
    field("$.cargo_type", "cargo_type", IndexFieldType::Tag, false),
    field("$.status", "status", IndexFieldType::Tag, false),
    field("$.urgency", "urgency", IndexFieldType::Tag, false),
    field("$.hazmat", "hazmat", IndexFieldType::Tag, false),
    field("$.team_driver", "team_driver", IndexFieldType::Tag, false),
    field("$.bid_count", "bid_count", IndexFieldType::Numeric, true),
    field("$.created_at_ts", "created_at_ts", IndexFieldType::Numeric, true),
];

/// Index over opportunity JSON documents stored under `{prefix}:opportunity:`.
pub fn opportunity_index(keys: &KeyContext<'_>, index_name: &str) -> IndexDefinition {
    IndexDefinition {
        name: index_name.to_string(),
        prefixes: vec![keys.opportunity_prefix()],
        schema: OPPORTUNITY_SCHEMA,
    }
}

/// Indexed opportunity document as stored by the posting side of the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: String,
    pub tenant_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub commodity: Option<String>,
    pub origin_city: String,
    pub origin_state: String,
    /// `"lon,lat"` as expected by GEO attributes.
    #[serde(default)]
    pub origin_geo: Option<String>,
    pub destination_city: String,
    pub destination_state: String,
    #[serde(default)]
    pub destination_geo: Option<String>,
    pub pickup_ts: i64,
    pub delivery_ts: i64,
    pub rate: f64,
    pub rate_per_mile: f64,
    pub weight: f64,
    pub distance: f64,
    pub equipment_type: String,
    pub cargo_type: String,
    pub status: String,
    pub urgency: String,
    pub hazmat: String,
    pub team_driver: String,
    #[serde(default)]
    pub bid_count: u64,
    pub created_at_ts: i64,
}

/// Paging limits applied when a request leaves `per_page` unset or asks for too many rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSettings {
    pub default_per_page: u64,
    pub max_per_page: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_per_page: DEFAULT_PAGE_SIZE,
            max_per_page: MAX_PAGE_SIZE,
        }
    }
}

/// Builds tenant-scoped [`SearchParams`] from search filters.
#[derive(Debug, Clone)]
pub struct OpportunityQuery {
    tenant_id: String,
    settings: SearchSettings,
}

impl OpportunityQuery {
    pub fn for_tenant(tenant_id: &str, settings: SearchSettings) -> Result<Self, SearchError> {
        let tenant_id = tenant_id.trim();
        if !is_valid_uuid(tenant_id) {
            return Err(SearchError::invalid(format!("tenant id '{tenant_id}' is not a UUID")));
        }
        Ok(Self {
            tenant_id: tenant_id.to_ascii_lowercase(),
            settings,
        })
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Translate filters into search parameters. Filters are normalized first, so the
    /// conditions only ever see clamped, trimmed values.
    pub fn build(&self, filters: &SearchFilters) -> SearchParams {
        let filters = normalize(filters.clone());
        let mut conditions = vec![FilterCondition::tag_eq("tenant_id", self.tenant_id.as_str())];

        push_location(&mut conditions, "origin", filters.origin.as_ref());
        push_location(&mut conditions, "destination", filters.destination.as_ref());
        push_dates(&mut conditions, "pickup_ts", filters.pickup_date_range.as_ref());
        push_dates(&mut conditions, "delivery_ts", filters.delivery_date_range.as_ref());

        let ranges: [(&str, Option<NumericRange>); 4] = [
            ("rate", filters.rate_range),
            ("rate_per_mile", filters.rate_per_mile_range),
            ("weight", filters.weight_range),
            ("distance", filters.distance_range),
        ];
        for (attribute, range) in ranges {
            if let Some(range) = range {
                conditions.push(FilterCondition::numeric_range(attribute, range.min, range.max));
            }
        }

        let tags: [(&str, &Option<Vec<String>>); 4] = [
            ("equipment_type", &filters.equipment_types),
            ("cargo_type", &filters.cargo_types),
            ("status", &filters.status),
            ("urgency", &filters.urgency),
        ];
        for (attribute, values) in tags {
            if let Some(values) = values {
                conditions.push(FilterCondition::tag_in(attribute, values.iter().map(String::as_str)));
            }
        }

        if let Some(hazmat) = filters.hazmat {
            conditions.push(FilterCondition::bool_eq("hazmat", hazmat));
        }
        if let Some(team) = filters.team_driver {
            conditions.push(FilterCondition::bool_eq("team_driver", team));
        }
        match filters.has_bids {
            Some(true) => conditions.push(FilterCondition::numeric_range("bid_count", Some(1.0), None)),
            Some(false) => conditions.push(FilterCondition::numeric_eq("bid_count", 0.0)),
            None => {}
        }

        let text_query = filters
            .query
            .as_deref()
            .and_then(|query| build_text_query(query, OPPORTUNITY_TEXT_FIELDS));

        let page = filters.page.map_or(DEFAULT_PAGE, |page| page.max(1).unsigned_abs());
        let per_page = filters
            .per_page
            .map_or(self.settings.default_per_page, |per_page| per_page.max(1).unsigned_abs())
            .min(self.settings.max_per_page);

        SearchParams::new()
            .with_conditions(conditions)
            .with_text_query(text_query)
            .with_sort(Some(resolve_sort(filters.sort_by.as_deref(), filters.sort_direction.as_deref())))
            .with_page(page, per_page)
    }
}

fn resolve_sort(sort_by: Option<&str>, direction: Option<&str>) -> SearchSort {
    let default = &OPPORTUNITY_SORTS[0];
    let field = match sort_by {
        Some(name) => OPPORTUNITY_SORTS
            .iter()
            .find(|candidate| candidate.name.eq_ignore_ascii_case(name))
            .unwrap_or_else(|| {
                log::debug!("unknown sort key {name}; falling back to {}", default.name);
                default
            }),
        None => default,
    };
    SearchSort {
        field: field.path.to_string(),
        order: direction.and_then(SortOrder::parse).unwrap_or(field.default_order),
    }
}

fn push_location(conditions: &mut Vec<FilterCondition>, side: &str, location: Option<&LocationFilter>) {
    let Some(location) = location else { return };
    if let Some(city) = location.city.as_deref() {
        conditions.push(FilterCondition::tag_eq(format!("{side}_city"), city));
    }
    if let Some(state) = location.state.as_deref() {
        conditions.push(FilterCondition::tag_eq(format!("{side}_state"), state));
    }
    if let (Some((longitude, latitude)), Some(radius)) = (location.coordinates(), location.radius) {
        conditions.push(FilterCondition::geo_radius(format!("{side}_geo"), longitude, latitude, radius));
    }
}

fn push_dates(conditions: &mut Vec<FilterCondition>, attribute: &str, range: Option<&DateRange>) {
    let Some(range) = range else { return };
    let bound = |raw: Option<&str>, time: NaiveTime| -> Option<f64> {
        let raw = raw?;
        match parse_filter_date(raw) {
            Some(date) => Some(day_timestamp(date, time) as f64),
            None => {
                log::debug!("ignoring unparseable date bound '{raw}' on {attribute}");
                None
            }
        }
    };
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    let from = bound(range.from.as_deref(), NaiveTime::MIN);
    let to = bound(range.to.as_deref(), end_of_day);
    if from.is_some() || to.is_some() {
        conditions.push(FilterCondition::numeric_range(attribute, from, to));
    }
}

fn day_timestamp(date: NaiveDate, time: NaiveTime) -> i64 {
    DateTime::<Utc>::from_naive_utc_and_offset(date.and_time(time), Utc).timestamp()
}

/// Validate, normalize and execute a tenant-scoped opportunity search.
///
/// Invalid filters are rejected with every issue attached; nothing reaches Redis.
pub async fn search_opportunities<C, T>(
    conn: &mut C,
    index: &IndexDefinition,
    query: &OpportunityQuery,
    raw_filters: &Value,
) -> Result<SearchResult<T>, SearchError>
where
    C: ConnectionLike + Send,
    T: DeserializeOwned,
{
    let issues = validate_value(raw_filters);
    if !issues.is_empty() {
        log::debug!("rejecting search for tenant {} with {} issue(s)", query.tenant_id(), issues.len());
        return Err(ValidationError::new(issues).into());
    }
    let params = query.build(&normalize_value(raw_filters));
    execute_search(conn, &index.name, &params).await
}
