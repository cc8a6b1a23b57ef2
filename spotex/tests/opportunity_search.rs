use std::time::Duration;

use redis::aio::ConnectionManager;
use serde_json::{Value, json};
use spotex::SearchError;
use spotex::keys::KeyContext;
use spotex::search::{
    IndexDefinition, Opportunity, OpportunityQuery, SearchSettings, ensure_index, opportunity_index,
    search_opportunities,
};

const TENANT: &str = "0b6f6f3e-3f43-4d2c-9d7e-1c7d2b8f4a10";
const OTHER_TENANT: &str = "9d1c4f20-6a3b-4e8f-b1d2-7c5e3a9f0b44";

/// Connection to a server with RediSearch and RedisJSON loaded, or `None` to skip.
async fn search_connection() -> Option<ConnectionManager> {
    let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
    let client = redis::Client::open(redis_url).ok()?;
    let mut conn = match tokio::time::timeout(Duration::from_secs(2), ConnectionManager::new(client)).await {
        Ok(Ok(conn)) => conn,
        _ => {
            eprintln!("skipping: redis is not reachable");
            return None;
        }
    };
    if redis::cmd("FT._LIST").query_async::<Vec<String>>(&mut conn).await.is_err() {
        eprintln!("skipping: RediSearch module not loaded");
        return None;
    }
    Some(conn)
}

fn opportunity(id: &str, tenant: &str, overrides: Value) -> Value {
    let mut doc = json!({
        "id": id,
        "tenant_id": tenant,
        "title": "Dry van load",
        "description": "General freight",
        "commodity": "paper",
        "origin_city": "Chicago",
        "origin_state": "IL",
        "origin_geo": "-87.6298,41.8781",
        "destination_city": "Dallas",
        "destination_state": "TX",
        "destination_geo": "-96.7970,32.7767",
        "pickup_ts": 1_717_200_000,
        "delivery_ts": 1_717_400_000,
        "rate": 2400.0,
        "rate_per_mile": 2.5,
        "weight": 38000.0,
        "distance": 960.0,
        "equipment_type": "dry_van",
        "cargo_type": "general",
        "status": "open",
        "urgency": "normal",
        "hazmat": "false",
        "team_driver": "false",
        "bid_count": 0,
        "created_at_ts": 1_717_000_000
    });
    if let (Value::Object(base), Value::Object(extra)) = (&mut doc, overrides) {
        base.extend(extra);
    }
    doc
}

async fn seed(conn: &mut ConnectionManager, keys: &KeyContext<'_>, docs: &[Value]) {
    for doc in docs {
        let id = doc["id"].as_str().expect("doc id");
        let _: () = redis::cmd("JSON.SET")
            .arg(keys.opportunity(id))
            .arg("$")
            .arg(doc.to_string())
            .query_async(conn)
            .await
            .expect("JSON.SET");
    }
}

async fn drop_index(conn: &mut ConnectionManager, index: &IndexDefinition) {
    let _: Result<(), _> = redis::cmd("FT.DROPINDEX").arg(&index.name).arg("DD").query_async(conn).await;
}

async fn setup(conn: &mut ConnectionManager, prefix: &str) -> IndexDefinition {
    let keys = KeyContext::new(prefix);
    let index = opportunity_index(&keys, &format!("{prefix}:idx:opportunities"));
    ensure_index(conn, &index).await.expect("create index");
    ensure_index(conn, &index).await.expect("ensure is idempotent");
    seed(
        conn,
        &keys,
        &[
            opportunity("op1", TENANT, json!({})),
            opportunity(
                "op2",
                TENANT,
                json!({"equipment_type": "flatbed", "rate": 3100.0, "title": "Steel coils", "bid_count": 3}),
            ),
            opportunity(
                "op3",
                TENANT,
                json!({"equipment_type": "reefer", "rate": 1800.0, "title": "Frozen poultry", "hazmat": "true"}),
            ),
            opportunity("op4", OTHER_TENANT, json!({"rate": 9999.0})),
        ],
    )
    .await;
    index
}

fn ids(items: &[Opportunity]) -> Vec<&str> {
    items.iter().map(|item| item.id.as_str()).collect()
}

#[tokio::test]
async fn searches_are_tenant_scoped_and_filtered() {
    let Some(mut conn) = search_connection().await else { return };
    let prefix = format!("spotex_test_{}", uuid::Uuid::new_v4().simple());
    let index = setup(&mut conn, &prefix).await;
    let query = OpportunityQuery::for_tenant(TENANT, SearchSettings::default()).expect("tenant");

    let all = search_opportunities::<_, Opportunity>(&mut conn, &index, &query, &json!({"sort_by": "rate"}))
        .await
        .expect("search all");
    assert_eq!(all.total, 3);
    assert_eq!(ids(&all.items), vec!["op2", "op1", "op3"]);

    let flatbeds = search_opportunities::<_, Opportunity>(
        &mut conn,
        &index,
        &query,
        &json!({"equipment_types": ["Flatbed"], "has_bids": true}),
    )
    .await
    .expect("flatbeds");
    assert_eq!(ids(&flatbeds.items), vec!["op2"]);

    let cheap = search_opportunities::<_, Opportunity>(
        &mut conn,
        &index,
        &query,
        &json!({"rate_range": {"max": 2000}, "hazmat": true}),
    )
    .await
    .expect("cheap hazmat");
    assert_eq!(ids(&cheap.items), vec!["op3"]);

    let text = search_opportunities::<_, Opportunity>(&mut conn, &index, &query, &json!({"query": "poul"}))
        .await
        .expect("text");
    assert_eq!(ids(&text.items), vec!["op3"]);

    let nearby = search_opportunities::<_, Opportunity>(
        &mut conn,
        &index,
        &query,
        &json!({"origin": {"latitude": 41.88, "longitude": -87.63, "radius": 25}, "per_page": 2}),
    )
    .await
    .expect("geo");
    assert_eq!(nearby.total, 3);
    assert_eq!(nearby.items.len(), 2);
    assert!(nearby.has_more());

    drop_index(&mut conn, &index).await;
}

#[tokio::test]
async fn invalid_filters_never_reach_redis() {
    let Some(mut conn) = search_connection().await else { return };
    let prefix = format!("spotex_test_{}", uuid::Uuid::new_v4().simple());
    let index = opportunity_index(&KeyContext::new(&prefix), "spotex_test_missing_index");
    let query = OpportunityQuery::for_tenant(TENANT, SearchSettings::default()).expect("tenant");

    let err = search_opportunities::<_, Opportunity>(&mut conn, &index, &query, &json!({"per_page": 0}))
        .await
        .expect_err("invalid per_page");
    match err {
        SearchError::Validation(validation) => assert_eq!(validation.issues[0].field, "per_page"),
        other => panic!("expected a validation error, got {other:?}"),
    }
}
