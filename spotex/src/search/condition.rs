//! Typed filter conditions and the escaping rules used to render them.
//!
//! Values never get spliced into a query string directly: each leaf escapes its own values for
//! the field type it targets.
//!
//! | Field type | Clause                         | Escaping                         |
//! |------------|--------------------------------|----------------------------------|
//! | TAG        | `(@status:{open\|bidding})`    | [`escape_for_tag_query`]         |
//! | NUMERIC    | `(@rate:[500 +inf])`           | numbers only                     |
//! | GEO        | `(@origin_geo:[-87.6 41.8 50 mi])` | numbers only                 |
//! | TEXT       | `(@title:(steel* coil*))`      | [`escape_for_text_search`]       |

const TAG_SEPARATOR: &str = "|";
const OR_SEPARATOR: &str = " | ";

#[derive(Debug, Clone, PartialEq)]
pub enum FilterCondition {
    /// TAG field matching any of `values`.
    TagIn { field: String, values: Vec<String> },
    /// Inclusive numeric range; `None` is unbounded on that side.
    NumericRange {
        field: String,
        min: Option<f64>,
        max: Option<f64>,
    },
    /// Boolean stored as a `true`/`false` TAG.
    BooleanEquals { field: String, value: bool },
    /// Points within `radius_miles` of a coordinate.
    GeoRadius {
        field: String,
        longitude: f64,
        latitude: f64,
        radius_miles: f64,
    },
    /// Every term must match as a prefix within the TEXT field.
    TextPrefix { field: String, terms: Vec<String> },
    And(Vec<FilterCondition>),
    Or(Vec<FilterCondition>),
}

impl FilterCondition {
    #[inline]
    pub fn tag_eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::TagIn {
            field: field.into(),
            values: vec![value.into()],
        }
    }

    #[inline]
    pub fn tag_in<S: Into<String>>(field: impl Into<String>, values: impl IntoIterator<Item = S>) -> Self {
        Self::TagIn {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    #[inline]
    pub fn bool_eq(field: impl Into<String>, value: bool) -> Self {
        Self::BooleanEquals {
            field: field.into(),
            value,
        }
    }

    #[inline]
    pub fn numeric_range(field: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        Self::NumericRange {
            field: field.into(),
            min,
            max,
        }
    }

    #[inline]
    pub fn numeric_eq(field: impl Into<String>, value: f64) -> Self {
        Self::numeric_range(field, Some(value), Some(value))
    }

    #[inline]
    pub fn geo_radius(field: impl Into<String>, longitude: f64, latitude: f64, radius_miles: f64) -> Self {
        Self::GeoRadius {
            field: field.into(),
            longitude,
            latitude,
            radius_miles,
        }
    }

    #[inline]
    pub fn text_prefix<S: Into<String>>(field: impl Into<String>, terms: impl IntoIterator<Item = S>) -> Self {
        Self::TextPrefix {
            field: field.into(),
            terms: terms.into_iter().map(Into::into).collect(),
        }
    }

    #[inline]
    pub fn and(conditions: impl IntoIterator<Item = FilterCondition>) -> Self {
        Self::And(conditions.into_iter().collect())
    }

    #[inline]
    pub fn or(conditions: impl IntoIterator<Item = FilterCondition>) -> Self {
        Self::Or(conditions.into_iter().collect())
    }

    /// Render the condition as a RediSearch clause. Empty TAG sets and fully unbounded ranges
    /// render as an empty string and are dropped by the caller.
    pub fn to_query_clause(&self) -> String {
        match self {
            Self::TagIn { field, values } => {
                if values.is_empty() {
                    return String::new();
                }
                let escaped: Vec<String> = values.iter().map(|v| escape_for_tag_query(v)).collect();
                format!("(@{}:{{{}}})", field, escaped.join(TAG_SEPARATOR))
            }
            Self::NumericRange { field, min, max } => {
                if min.is_none() && max.is_none() {
                    return String::new();
                }
                let min_s = min.map(format_numeric).unwrap_or_else(|| "-inf".to_string());
                let max_s = max.map(format_numeric).unwrap_or_else(|| "+inf".to_string());
                format!("(@{}:[{} {}])", field, min_s, max_s)
            }
            Self::BooleanEquals { field, value } => {
                format!("(@{}:{{{}}})", field, if *value { "true" } else { "false" })
            }
            Self::GeoRadius {
                field,
                longitude,
                latitude,
                radius_miles,
            } => format!(
                "(@{}:[{} {} {} mi])",
                field,
                format_numeric(*longitude),
                format_numeric(*latitude),
                format_numeric(*radius_miles)
            ),
            Self::TextPrefix { field, terms } => {
                let escaped: Vec<String> = terms
                    .iter()
                    .filter(|term| !term.is_empty())
                    .map(|term| escape_for_text_search(term))
                    .collect();
                if escaped.is_empty() {
                    return String::new();
                }
                format!("(@{}:({}))", field, escaped.join(" "))
            }
            Self::And(conditions) => group(conditions, " "),
            Self::Or(conditions) => group(conditions, OR_SEPARATOR),
        }
    }
}

fn group(conditions: &[FilterCondition], separator: &str) -> String {
    let clauses: Vec<String> = conditions
        .iter()
        .map(FilterCondition::to_query_clause)
        .filter(|clause| !clause.is_empty())
        .collect();
    match clauses.as_slice() {
        [] => String::new(),
        [single] => single.clone(),
        _ => format!("({})", clauses.join(separator)),
    }
}

/// Build a free-text clause matching every term as a prefix in any of `fields`.
///
/// Terms are split on whitespace and on `-`/`/`, which TEXT fields tokenize on at index time.
pub fn build_text_query(term: &str, fields: &[&str]) -> Option<String> {
    let tokens: Vec<&str> = term
        .split(|c: char| c.is_whitespace() || c == '-' || c == '/')
        .filter(|token| !token.is_empty())
        .collect();

    let clause = FilterCondition::or(
        fields
            .iter()
            .map(|field| FilterCondition::text_prefix(*field, tokens.iter().copied())),
    )
    .to_query_clause();
    (!clause.is_empty()).then_some(clause)
}

/// Escape a value for a TAG clause.
///
/// ```
/// use spotex::search::escape_for_tag_query;
///
/// assert_eq!(escape_for_tag_query("dry_van"), "dry_van");
/// assert_eq!(escape_for_tag_query("New York"), "New York");
/// assert_eq!(escape_for_tag_query("in-transit"), "in\\-transit");
/// assert_eq!(escape_for_tag_query("a|b}"), "a\\|b\\}");
/// ```
pub fn escape_for_tag_query(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '$' | '{' | '}' | '\\' | '|' | '.' | '-' | '@' | '*' | '(' | ')') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Escape one search term and append a prefix wildcard.
///
/// ```
/// use spotex::search::escape_for_text_search;
///
/// assert_eq!(escape_for_text_search("steel"), "steel*");
/// assert_eq!(escape_for_text_search("o'hare"), "o\\'hare*");
/// ```
pub fn escape_for_text_search(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 1);
    for ch in term.chars() {
        if matches!(
            ch,
            '\\' | '(' | ')' | '|' | '\'' | '"' | '[' | ']' | '{' | '}' | ':' | '@' | '?' | '~' | '&' | '!' | '.' | '*'
                | '%' | '$' | ';' | ',' | '<' | '>' | '=' | '^' | '+'
        ) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('*');
    escaped
}

pub(crate) fn format_numeric(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_clause_joins_escaped_values() {
        let clause = FilterCondition::tag_in("status", ["open", "in-transit"]).to_query_clause();
        assert_eq!(clause, "(@status:{open|in\\-transit})");
    }

    #[test]
    fn injection_attempts_stay_inside_the_tag() {
        let clause = FilterCondition::tag_eq("origin_city", "x} | @tenant_id:{*").to_query_clause();
        assert_eq!(clause, "(@origin_city:{x\\} \\| \\@tenant_id:\\{\\*})");
    }

    #[test]
    fn empty_tag_set_renders_nothing() {
        let empty: [&str; 0] = [];
        assert_eq!(FilterCondition::tag_in("status", empty).to_query_clause(), "");
    }

    #[test]
    fn numeric_ranges_render_open_bounds() {
        assert_eq!(
            FilterCondition::numeric_range("rate", Some(500.0), None).to_query_clause(),
            "(@rate:[500 +inf])"
        );
        assert_eq!(
            FilterCondition::numeric_range("rate_per_mile", None, Some(2.75)).to_query_clause(),
            "(@rate_per_mile:[-inf 2.75])"
        );
        assert_eq!(FilterCondition::numeric_eq("bid_count", 0.0).to_query_clause(), "(@bid_count:[0 0])");
        assert_eq!(FilterCondition::numeric_range("weight", None, None).to_query_clause(), "");
    }

    #[test]
    fn boolean_and_geo_clauses() {
        assert_eq!(FilterCondition::bool_eq("hazmat", true).to_query_clause(), "(@hazmat:{true})");
        assert_eq!(
            FilterCondition::geo_radius("origin_geo", -87.65, 41.85, 50.0).to_query_clause(),
            "(@origin_geo:[-87.65 41.85 50 mi])"
        );
    }

    #[test]
    fn text_query_splits_terms_and_fields() {
        let query = build_text_query("steel  coils", &["title", "description"]).expect("terms present");
        assert_eq!(query, "((@title:(steel* coils*)) | (@description:(steel* coils*)))");
    }

    #[test]
    fn text_query_tokenizes_on_dashes_and_slashes() {
        let query = build_text_query("cross-dock/LTL", &["title"]).expect("terms present");
        assert_eq!(query, "(@title:(cross* dock* LTL*))");
    }

    #[test]
    fn blank_text_query_is_none() {
        assert_eq!(build_text_query("  - / ", &["title"]), None);
        assert_eq!(build_text_query("steel", &[]), None);
    }

    #[test]
    fn text_prefix_escapes_each_term() {
        let clause = FilterCondition::text_prefix("commodity", ["steel", "", "o'hare"]).to_query_clause();
        assert_eq!(clause, "(@commodity:(steel* o\\'hare*))");
        let none: [&str; 0] = [];
        assert_eq!(FilterCondition::text_prefix("commodity", none).to_query_clause(), "");
    }

    #[test]
    fn and_groups_members_and_skips_empty_ones() {
        let clause = FilterCondition::and([
            FilterCondition::tag_eq("status", "open"),
            FilterCondition::numeric_range("rate", None, None),
            FilterCondition::bool_eq("hazmat", false),
        ])
        .to_query_clause();
        assert_eq!(clause, "((@status:{open}) (@hazmat:{false}))");
    }

    #[test]
    fn or_nests_inside_and() {
        let clause = FilterCondition::and([
            FilterCondition::tag_eq("tenant_id", "t1"),
            FilterCondition::or([
                FilterCondition::tag_eq("origin_state", "IL"),
                FilterCondition::tag_eq("destination_state", "IL"),
            ]),
        ])
        .to_query_clause();
        assert_eq!(
            clause,
            "((@tenant_id:{t1}) ((@origin_state:{IL}) | (@destination_state:{IL})))"
        );
    }

    #[test]
    fn single_member_groups_collapse() {
        let lone = FilterCondition::or([FilterCondition::tag_eq("status", "open")]);
        assert_eq!(lone.to_query_clause(), "(@status:{open})");
        assert_eq!(FilterCondition::and(Vec::new()).to_query_clause(), "");
        let hollow = FilterCondition::or([FilterCondition::numeric_range("rate", None, None)]);
        assert_eq!(hollow.to_query_clause(), "");
    }

    #[test]
    fn text_terms_escape_query_syntax() {
        assert_eq!(escape_for_text_search("@title:x"), "\\@title\\:x*");
        assert_eq!(escape_for_text_search("(a|b)"), "\\(a\\|b\\)*");
    }
}
