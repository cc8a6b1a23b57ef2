use redis::{Value, aio::ConnectionLike, cmd, from_redis_value};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::errors::SearchError;
use crate::search::{SearchParams, SearchResult};

const TAG_SEPARATOR: &str = "|";
const QUERY_DIALECT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFieldType {
    Tag,
    Text,
    Numeric,
    Geo,
}

#[derive(Debug, Clone, Copy)]
pub struct IndexField {
    pub path: &'static str,
    pub field_name: &'static str,
    pub field_type: IndexFieldType,
    pub sortable: bool,
}

#[derive(Debug, Clone)]
pub struct IndexDefinition {
    pub name: String,
    pub prefixes: Vec<String>,
    pub schema: &'static [IndexField],
}

impl IndexDefinition {
    /// Arguments of the `FT.CREATE` call for this index (without the command name).
    pub fn create_args(&self) -> Vec<String> {
        let mut args = vec![
            self.name.clone(),
            "ON".to_string(),
            "JSON".to_string(),
            "PREFIX".to_string(),
            self.prefixes.len().to_string(),
        ];
        args.extend(self.prefixes.iter().cloned());
        args.push("SCHEMA".to_string());

        for field in self.schema {
            args.extend([field.path.to_string(), "AS".to_string(), field.field_name.to_string()]);
            match field.field_type {
                IndexFieldType::Tag => {
                    args.extend(["TAG".to_string(), "SEPARATOR".to_string(), TAG_SEPARATOR.to_string()]);
                }
                IndexFieldType::Text => args.push("TEXT".to_string()),
                IndexFieldType::Numeric => args.push("NUMERIC".to_string()),
                IndexFieldType::Geo => args.push("GEO".to_string()),
            }
            if field.sortable {
                args.push("SORTABLE".to_string());
            }
        }
        args
    }
}

/// Create the index unless it already exists.
pub async fn ensure_index<C>(conn: &mut C, definition: &IndexDefinition) -> Result<(), SearchError>
where
    C: ConnectionLike + Send,
{
    let indexes: Vec<String> = cmd("FT._LIST").query_async(conn).await?;
    if indexes.iter().any(|name| name == &definition.name) {
        log::debug!("search index {} already present", definition.name);
        return Ok(());
    }

    let mut command = cmd("FT.CREATE");
    for arg in definition.create_args() {
        command.arg(arg);
    }

    match command.query_async::<()>(conn).await {
        Ok(()) => {
            log::info!("created search index {}", definition.name);
            Ok(())
        }
        // Another process won the race to create it.
        Err(err) if index_exists_error(&err) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn index_exists_error(err: &redis::RedisError) -> bool {
    let msg = err.to_string().to_ascii_lowercase();
    msg.contains("already exists") && msg.contains("index")
}

/// Run `FT.SEARCH` for `params` and decode the JSON documents.
pub async fn execute_search<C, T>(
    conn: &mut C,
    index_name: &str,
    params: &SearchParams,
) -> Result<SearchResult<T>, SearchError>
where
    C: ConnectionLike + Send,
    T: DeserializeOwned,
{
    let query = params.build_query();
    log::debug!("FT.SEARCH {index_name} {query}");

    let mut command = cmd("FT.SEARCH");
    command.arg(index_name);
    command.arg(&query);

    if let Some(sort) = &params.sort {
        command.arg("SORTBY").arg(&sort.field).arg(sort.order.as_str());
    }

    command.arg("LIMIT").arg(params.offset()).arg(params.page_size);
    command.arg("RETURN").arg(1).arg("$");
    command.arg("DIALECT").arg(QUERY_DIALECT);

    let raw: Value = command.query_async(conn).await?;
    decode_search_response(&raw, params.page, params.page_size)
}

/// Decode the RESP2 reply of `FT.SEARCH ... RETURN 1 $`:
/// `[total, key1, [field, json], key2, [field, json], ...]`.
pub fn decode_search_response<T>(raw: &Value, page: u64, page_size: u64) -> Result<SearchResult<T>, SearchError>
where
    T: DeserializeOwned,
{
    let values: Vec<Value> = from_redis_value(raw)
        .map_err(|err| SearchError::other(format!("failed to parse search response: {err}")))?;

    let Some(first) = values.first() else {
        return Ok(SearchResult {
            items: Vec::new(),
            total: 0,
            page,
            page_size,
        });
    };

    let total = match first {
        Value::Int(v) => u64::try_from(*v).unwrap_or(0),
        Value::BulkString(bytes) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| SearchError::other("invalid total count in search response"))?,
        other => {
            return Err(SearchError::other(format!("unexpected total count type: {other:?}")));
        }
    };

    let mut items = Vec::with_capacity(values.len() / 2);
    for pair in values[1..].chunks(2) {
        let [_key, document] = pair else { continue };
        let payload = extract_json_payload(document)?;
        let item: T = serde_json::from_str(&payload)
            .map_err(|err| SearchError::other(format!("failed to deserialize search document: {err}")))?;
        items.push(item);
    }

    Ok(SearchResult {
        items,
        total,
        page,
        page_size,
    })
}

fn extract_json_payload(value: &Value) -> Result<String, SearchError> {
    match value {
        Value::Array(fields) => {
            for pair in fields.chunks(2) {
                let [alias, payload] = pair else { continue };
                let alias = value_to_string(alias)?;
                if alias == "$" || alias == "doc" {
                    return unwrap_json_array(value_to_string(payload)?);
                }
            }
            Err(SearchError::other("search response missing JSON payload"))
        }
        other => unwrap_json_array(value_to_string(other)?),
    }
}

/// DIALECT 3 wraps each `$` result in a single-element array.
fn unwrap_json_array(payload: String) -> Result<String, SearchError> {
    let trimmed = payload.trim();
    if !(trimmed.starts_with('[') && trimmed.ends_with(']')) {
        return Ok(payload);
    }
    let value: JsonValue = serde_json::from_str(trimmed)
        .map_err(|err| SearchError::other(format!("failed to parse JSON payload array: {err}")))?;
    match value.as_array().and_then(|items| items.first()) {
        Some(first) => Ok(first.to_string()),
        None => Ok(payload),
    }
}

fn value_to_string(value: &Value) -> Result<String, SearchError> {
    match value {
        Value::BulkString(bytes) => String::from_utf8(bytes.clone())
            .map_err(|err| SearchError::other(format!("invalid UTF-8 in search response: {err}"))),
        Value::SimpleString(text) => Ok(text.clone()),
        Value::VerbatimString { text, .. } => Ok(text.clone()),
        Value::Int(v) => Ok(v.to_string()),
        other => from_redis_value::<String>(other)
            .map_err(|err| SearchError::other(format!("unexpected search value type: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Doc {
        id: String,
        rate: f64,
    }

    fn bulk(text: &str) -> Value {
        Value::BulkString(text.as_bytes().to_vec())
    }

    const SCHEMA: &[IndexField] = &[
        IndexField {
            path: "$.status",
            field_name: "status",
            field_type: IndexFieldType::Tag,
            sortable: false,
        },
        IndexField {
            path: "$.rate",
            field_name: "rate",
            field_type: IndexFieldType::Numeric,
            sortable: true,
        },
    ];

    #[test]
    fn create_args_describe_the_schema() {
        let definition = IndexDefinition {
            name: "idx:test".to_string(),
            prefixes: vec!["test:opportunity:".to_string()],
            schema: SCHEMA,
        };
        assert_eq!(
            definition.create_args().join(" "),
            "idx:test ON JSON PREFIX 1 test:opportunity: SCHEMA $.status AS status TAG SEPARATOR | \
             $.rate AS rate NUMERIC SORTABLE"
        );
    }

    #[test]
    fn decodes_dialect_three_documents() {
        let raw = Value::Array(vec![
            Value::Int(7),
            bulk("test:opportunity:a"),
            Value::Array(vec![bulk("$"), bulk(r#"[{"id":"a","rate":1200.0}]"#)]),
            bulk("test:opportunity:b"),
            Value::Array(vec![bulk("$"), bulk(r#"{"id":"b","rate":950.5}"#)]),
        ]);
        let result: SearchResult<Doc> = decode_search_response(&raw, 2, 2).expect("decode");
        assert_eq!(result.total, 7);
        assert_eq!(
            result.items,
            vec![
                Doc {
                    id: "a".to_string(),
                    rate: 1200.0
                },
                Doc {
                    id: "b".to_string(),
                    rate: 950.5
                },
            ]
        );
        assert!(result.has_more());
    }

    #[test]
    fn empty_reply_is_an_empty_page() {
        let result: SearchResult<Doc> = decode_search_response(&Value::Array(Vec::new()), 1, 25).expect("decode");
        assert_eq!(result.total, 0);
        assert!(result.items.is_empty());
    }

    #[test]
    fn missing_payload_is_an_error() {
        let raw = Value::Array(vec![
            Value::Int(1),
            bulk("test:opportunity:a"),
            Value::Array(vec![bulk("title"), bulk("x")]),
        ]);
        assert!(decode_search_response::<Doc>(&raw, 1, 25).is_err());
    }
}
