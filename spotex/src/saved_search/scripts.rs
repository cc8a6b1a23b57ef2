use redis::Script;
use std::sync::LazyLock;

pub const SAVED_SEARCH_DELETE_SCRIPT_BODY: &str = include_str!("../../lua/saved_search_delete.lua");
pub const SAVED_SEARCH_SET_DEFAULT_SCRIPT_BODY: &str = include_str!("../../lua/saved_search_set_default.lua");
pub const SAVED_SEARCH_RECORD_USE_SCRIPT_BODY: &str = include_str!("../../lua/saved_search_record_use.lua");

pub static SAVED_SEARCH_DELETE_SCRIPT: LazyLock<Script> =
    LazyLock::new(|| Script::new(SAVED_SEARCH_DELETE_SCRIPT_BODY));
pub static SAVED_SEARCH_SET_DEFAULT_SCRIPT: LazyLock<Script> =
    LazyLock::new(|| Script::new(SAVED_SEARCH_SET_DEFAULT_SCRIPT_BODY));
pub static SAVED_SEARCH_RECORD_USE_SCRIPT: LazyLock<Script> =
    LazyLock::new(|| Script::new(SAVED_SEARCH_RECORD_USE_SCRIPT_BODY));
