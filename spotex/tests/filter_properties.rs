use serde_json::{Value, json};
use spotex::errors::codes;
use spotex::filters::{
    DISTANCE_BOUNDS, RATE_BOUNDS, RATE_PER_MILE_BOUNDS, SearchFilters, WEIGHT_BOUNDS, normalize, normalize_value,
    validate_value,
};
use spotex::search::{OpportunityQuery, SearchSettings};

const TENANT: &str = "0b6f6f3e-3f43-4d2c-9d7e-1c7d2b8f4a10";

fn samples() -> Vec<Value> {
    vec![
        json!({}),
        json!({"rate_range": {"min": 5000, "max": 100}}),
        json!({"weight_range": {"min": -20, "max": 999999999}}),
        json!({"distance_range": {"max": -5}}),
        json!({"rate_per_mile_range": {"min": 2.5, "max": 1.25}}),
        json!({
            "query": "  frozen   poultry ",
            "origin": {"city": "  Chicago  ", "state": " il ", "radius": 900},
            "destination": {"city": "   ", "state": ""},
            "equipment_types": [" Reefer ", "reefer", ""],
            "status": ["OPEN", "bidding", "open"],
            "sort_by": " RATE ",
            "sort_direction": "Desc",
            "page": -3,
            "per_page": 1000
        }),
        json!({"pickup_date_range": {"from": " 2024-05-01 ", "to": ""}, "cargo_types": []}),
    ]
}

#[test]
fn normalized_ranges_are_ordered_and_non_negative() {
    for sample in samples() {
        let normalized = normalize_value(&sample);
        for (bounds, range) in normalized.numeric_ranges() {
            let Some(range) = range else { continue };
            if let Some(min) = range.min {
                assert!(min >= 0.0, "{} min {min} from {sample}", bounds.field);
            }
            if let (Some(min), Some(max)) = (range.min, range.max) {
                assert!(min <= max, "{} {min} > {max} from {sample}", bounds.field);
            }
        }
    }
}

#[test]
fn normalization_is_idempotent() {
    for sample in samples() {
        let once = normalize_value(&sample);
        let twice = normalize(once.clone());
        assert_eq!(once, twice, "not idempotent for {sample}");
    }
}

#[test]
fn per_page_bounds() {
    let fields = |value: Value| -> Vec<String> { validate_value(&value).into_iter().map(|issue| issue.field).collect() };
    assert_eq!(fields(json!({"per_page": 0})), vec!["per_page"]);
    assert_eq!(fields(json!({"per_page": 101})), vec!["per_page"]);
    assert!(fields(json!({"per_page": 100})).is_empty());
}

#[test]
fn inverted_pickup_dates_yield_one_issue() {
    let issues = validate_value(&json!({"pickup_date_range": {"from": "2024-06-10", "to": "2024-06-01"}}));
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].field, "pickup_date_range");
    assert_eq!(issues[0].code, codes::ORDER);
}

#[test]
fn origin_city_is_trimmed() {
    let normalized = normalize_value(&json!({"origin": {"city": "  Chicago  "}}));
    assert_eq!(normalized.origin.and_then(|origin| origin.city).as_deref(), Some("Chicago"));
}

#[test]
fn unknown_equipment_is_flagged() {
    let issues = validate_value(&json!({"equipment_types": ["not_a_type"]}));
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].field, "equipment_types");
    assert_eq!(issues[0].code, codes::ENUM);
}

#[test]
fn malformed_payloads_are_reported_not_panicked() {
    let issues = validate_value(&json!({"rate_range": "cheap"}));
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].code, codes::MALFORMED);
    assert_eq!(normalize_value(&json!([1, 2, 3])), SearchFilters::default());
}

#[test]
fn queries_always_start_with_the_tenant() {
    let query = OpportunityQuery::for_tenant(TENANT, SearchSettings::default()).expect("tenant");
    for sample in samples() {
        let built = query.build(&normalize_value(&sample)).build_query();
        assert!(built.starts_with("(@tenant_id:{"), "unscoped query {built} for {sample}");
    }
}

#[test]
fn hostile_text_never_breaks_out_of_its_clause() {
    let query = OpportunityQuery::for_tenant(TENANT, SearchSettings::default()).expect("tenant");
    let filters = normalize_value(&json!({
        "query": "x) | @tenant_id:{*}",
        "origin": {"city": "Gary} | @tenant_id:{other"}
    }));
    let built = query.build(&filters).build_query();
    let unescaped_tenant_clauses = built
        .match_indices("@tenant_id:")
        .filter(|(at, _)| !built[..*at].ends_with('\\'))
        .count();
    assert_eq!(unescaped_tenant_clauses, 1, "{built}");
    assert!(built.contains(r"(@origin_city:{Gary\} \| \@tenant_id:\{other})"), "{built}");
}

#[test]
fn largest_valid_page_builds_without_overflow() {
    let raw = json!({"page": i64::MAX, "per_page": 100});
    assert!(validate_value(&raw).is_empty());

    let query = OpportunityQuery::for_tenant(TENANT, SearchSettings::default()).expect("tenant");
    let params = query.build(&normalize_value(&raw));
    assert_eq!(params.page, i64::MAX as u64);
    assert_eq!(params.offset(), u64::MAX);
}

#[test]
fn most_negative_per_page_is_flagged_then_clamped() {
    let raw = json!({"page": i64::MIN, "per_page": i64::MIN});
    let mut fields: Vec<String> = validate_value(&raw).into_iter().map(|issue| issue.field).collect();
    fields.sort();
    assert_eq!(fields, vec!["page", "per_page"]);

    let normalized = normalize_value(&raw);
    assert_eq!((normalized.page, normalized.per_page), (Some(1), Some(1)));

    let query = OpportunityQuery::for_tenant(TENANT, SearchSettings::default()).expect("tenant");
    let params = query.build(&normalized);
    assert_eq!((params.page, params.page_size, params.offset()), (1, 1, 0));
}

#[test]
fn ranges_at_floor_and_ceiling_survive_untouched() {
    let raw = json!({
        "rate_range": {"min": RATE_BOUNDS.floor, "max": RATE_BOUNDS.ceiling},
        "rate_per_mile_range": {"min": RATE_PER_MILE_BOUNDS.floor, "max": RATE_PER_MILE_BOUNDS.ceiling},
        "weight_range": {"min": WEIGHT_BOUNDS.ceiling, "max": WEIGHT_BOUNDS.ceiling},
        "distance_range": {"min": DISTANCE_BOUNDS.floor, "max": DISTANCE_BOUNDS.floor}
    });
    assert!(validate_value(&raw).is_empty(), "{:?}", validate_value(&raw));

    let normalized = normalize_value(&raw);
    assert_eq!(normalized, SearchFilters::from_value(&raw).expect("filters"));

    let query = OpportunityQuery::for_tenant(TENANT, SearchSettings::default()).expect("tenant");
    let built = query.build(&normalized).build_query();
    assert!(built.contains("(@rate:[0 1000000])"), "{built}");
    assert!(built.contains("(@rate_per_mile:[0 1000])"), "{built}");
    assert!(built.contains("(@weight:[200000 200000])"), "{built}");
    assert!(built.contains("(@distance:[0 0])"), "{built}");
}

#[test]
fn one_past_the_edges_is_rejected_and_clamped() {
    let raw = json!({"rate_range": {"min": -0.01, "max": RATE_BOUNDS.ceiling + 1.0}});
    let mut fields: Vec<String> = validate_value(&raw).into_iter().map(|issue| issue.field).collect();
    fields.sort();
    assert_eq!(fields, vec!["rate_range.max", "rate_range.min"]);

    let range = normalize_value(&raw).rate_range.expect("range kept");
    assert_eq!((range.min, range.max), (Some(RATE_BOUNDS.floor), Some(RATE_BOUNDS.ceiling)));
}

#[test]
fn normalizer_swaps_inverted_bounds() {
    let range = normalize_value(&json!({"rate_range": {"min": 2500, "max": 1500}}))
        .rate_range
        .expect("range kept");
    assert_eq!((range.min, range.max), (Some(1500.0), Some(2500.0)));
}
