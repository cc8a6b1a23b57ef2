//! # Opportunity search
//!
//! Search requests are turned into RediSearch queries through typed [`FilterCondition`]s so
//! that user input is always escaped for the field it targets. Nothing in this module
//! concatenates raw filter text into a query.
//!
//! ```text
//! raw JSON filters
//!   -> filters::validate        (reject with every issue)
//!   -> filters::normalize       (canonical form)
//!   -> OpportunityQuery::build  (SearchParams of FilterConditions)
//!   -> execute_search           (FT.SEARCH ... DIALECT 3)
//! ```

pub mod condition;
pub mod index;
pub mod opportunity;

use serde::{Deserialize, Serialize};

#[cfg(feature = "utoipa")]
use utoipa::ToSchema;

pub use condition::{FilterCondition, build_text_query, escape_for_tag_query, escape_for_text_search};
pub use index::{IndexDefinition, IndexField, IndexFieldType, decode_search_response, ensure_index, execute_search};
pub use opportunity::{
    OPPORTUNITY_SORTS, OPPORTUNITY_TEXT_FIELDS, Opportunity, OpportunityQuery, SearchSettings, opportunity_index,
    search_opportunities,
};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PAGE_SIZE: u64 = 25;
pub const MAX_PAGE_SIZE: u64 = 100;

#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    /// Parse `asc`/`desc` in any case.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

/// A sort key exposed to clients, mapped to the indexed attribute it orders by.
#[derive(Debug, Clone, Copy)]
pub struct SortField {
    pub name: &'static str,
    pub path: &'static str,
    pub default_order: SortOrder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchSort {
    pub field: String,
    pub order: SortOrder,
}

/// Parameters of one search: conditions are ANDed, then the optional text query is appended.
///
/// ```
/// use spotex::search::{FilterCondition, SearchParams};
///
/// let params = SearchParams::new()
///     .with_condition(FilterCondition::tag_eq("status", "open"))
///     .with_condition(FilterCondition::numeric_range("rate", Some(1500.0), None))
///     .with_page(2, 50);
/// assert_eq!(params.build_query(), "(@status:{open}) (@rate:[1500 +inf])");
/// assert_eq!(params.offset(), 50);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub page: u64,
    pub page_size: u64,
    pub sort: Option<SearchSort>,
    pub conditions: Vec<FilterCondition>,
    pub text_query: Option<String>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchParams {
    pub fn new() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
            sort: None,
            conditions: Vec::new(),
            text_query: None,
        }
    }

    /// Saturates instead of wrapping for absurd page numbers.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }

    #[inline]
    pub fn with_sort(mut self, sort: Option<SearchSort>) -> Self {
        self.sort = sort;
        self
    }

    #[inline]
    pub fn with_condition(mut self, condition: FilterCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[inline]
    pub fn with_conditions(mut self, conditions: impl IntoIterator<Item = FilterCondition>) -> Self {
        self.conditions.extend(conditions);
        self
    }

    #[inline]
    pub fn with_text_query(mut self, query: Option<String>) -> Self {
        self.text_query = query;
        self
    }

    #[inline]
    pub fn with_page(mut self, page: u64, page_size: u64) -> Self {
        self.page = page.max(1);
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn build_query(&self) -> String {
        let mut clauses: Vec<String> = self
            .conditions
            .iter()
            .map(FilterCondition::to_query_clause)
            .filter(|clause| !clause.is_empty())
            .collect();

        if let Some(text) = &self.text_query
            && !text.is_empty()
        {
            clauses.push(text.clone());
        }

        if clauses.is_empty() {
            "*".to_string()
        } else {
            clauses.join(" ")
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub has_more: bool,
}

#[derive(Debug, Clone)]
pub struct SearchResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

impl<T> SearchResult<T> {
    #[inline]
    pub fn has_more(&self) -> bool {
        self.page.saturating_mul(self.page_size) < self.total
    }
}

impl<T: Serialize> From<SearchResult<T>> for PaginatedResponse<T> {
    fn from(value: SearchResult<T>) -> Self {
        Self {
            has_more: value.has_more(),
            page: value.page,
            page_size: value.page_size,
            total: value.total,
            items: value.items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_params_match_everything() {
        assert_eq!(SearchParams::new().build_query(), "*");
    }

    #[test]
    fn unbounded_conditions_are_skipped() {
        let params = SearchParams::new()
            .with_condition(FilterCondition::numeric_range("rate", None, None))
            .with_condition(FilterCondition::bool_eq("hazmat", false));
        assert_eq!(params.build_query(), "(@hazmat:{false})");
    }

    #[test]
    fn text_query_comes_last() {
        let params = SearchParams::new()
            .with_text_query(build_text_query("lumber", &["title"]))
            .with_condition(FilterCondition::tag_eq("tenant_id", "t1"));
        assert_eq!(params.build_query(), "(@tenant_id:{t1}) (@title:(lumber*))");
    }

    #[test]
    fn paging_is_clamped() {
        let params = SearchParams::new().with_page(0, 1000);
        assert_eq!((params.page, params.page_size), (1, MAX_PAGE_SIZE));
        assert_eq!(params.offset(), 0);
        let params = SearchParams::new().with_page(3, 20);
        assert_eq!(params.offset(), 40);
    }

    #[test]
    fn huge_pages_saturate() {
        let params = SearchParams::new().with_page(u64::MAX, MAX_PAGE_SIZE);
        assert_eq!(params.offset(), u64::MAX);
        let result = SearchResult::<i32> {
            items: Vec::new(),
            total: 10,
            page: 9_000_000_000_000_000_000,
            page_size: 25,
        };
        assert!(!result.has_more());
    }

    #[test]
    fn sort_order_parses_loosely() {
        assert_eq!(SortOrder::parse(" DESC "), Some(SortOrder::Desc));
        assert_eq!(SortOrder::parse("asc"), Some(SortOrder::Asc));
        assert_eq!(SortOrder::parse("down"), None);
    }

    #[test]
    fn paginated_response_reports_more_pages() {
        let result = SearchResult {
            items: vec![1, 2],
            total: 5,
            page: 1,
            page_size: 2,
        };
        let response: PaginatedResponse<i32> = result.into();
        assert!(response.has_more);
        assert_eq!(response.items, vec![1, 2]);
    }
}
