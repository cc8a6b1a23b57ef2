/// Redis key layout for everything spotex stores under one global prefix.
#[derive(Debug, Clone, Copy)]
pub struct KeyContext<'a> {
    pub prefix: &'a str,
}

impl<'a> KeyContext<'a> {
    pub fn new(prefix: &'a str) -> Self {
        Self { prefix }
    }

    /// Key prefix shared by all indexed opportunity documents.
    pub fn opportunity_prefix(&self) -> String {
        format!("{}:opportunity:", self.prefix)
    }

    pub fn opportunity(&self, opportunity_id: &str) -> String {
        format!("{}{}", self.opportunity_prefix(), opportunity_id)
    }

    pub fn saved_search(&self, user_id: &str, search_id: &str) -> String {
        format!("{}:saved_search:{}:{}", self.prefix, user_id, search_id)
    }

    /// Hash of `use_count` and `last_used_at`, kept apart from the JSON record.
    pub fn saved_search_usage(&self, user_id: &str, search_id: &str) -> String {
        format!("{}:usage", self.saved_search(user_id, search_id))
    }

    /// Set of saved-search ids owned by a user.
    pub fn saved_search_ids(&self, user_id: &str) -> String {
        format!("{}:saved_search:{}:ids", self.prefix, user_id)
    }

    /// Holds the id of the user's default saved search, if any.
    pub fn saved_search_default(&self, user_id: &str) -> String {
        format!("{}:saved_search:{}:default", self.prefix, user_id)
    }

    pub fn rate_limit(&self, subject: &str, window_start: i64) -> String {
        format!("{}:rate_limit:{}:{}", self.prefix, subject, window_start)
    }
}
