use api_rest::{router, AppState};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use roster_core::seed::{self, DemoSeed, NewUser};
use roster_core::{CoreConfig, Store};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

const KEY: &str = "demo-key";
const PREFIX: &str = "/plugins/patient_plugin";

struct TestApp {
    app: Router,
    store: Store,
    demo: DemoSeed,
}

fn test_app(prefix: &str) -> TestApp {
    let store = Store::open_in_memory().unwrap();
    let demo = store.with_conn(|conn| seed::seed_demo(conn, KEY)).unwrap();
    let cfg = CoreConfig::new(PathBuf::from(":memory:"), prefix).unwrap();
    TestApp {
        app: router(AppState::new(Arc::new(cfg), store.clone())),
        store,
        demo,
    }
}

async fn get(app: &Router, uri: &str, key: Option<&str>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let mut req = Request::builder().uri(uri);
    if let Some(key) = key {
        req = req.header("x-api-key", key);
    }
    let res = app
        .clone()
        .oneshot(req.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = res.status();
    let headers = res.headers().clone();
    let body = res.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, headers, body)
}

async fn get_json(app: &Router, uri: &str) -> serde_json::Value {
    let (status, _, body) = get(app, uri, Some(KEY)).await;
    assert_eq!(status, StatusCode::OK, "{uri}");
    serde_json::from_slice(&body).unwrap()
}

fn last_names(page: &serde_json::Value) -> Vec<String> {
    let col = page["columns"]
        .as_array()
        .unwrap()
        .iter()
        .position(|c| c["name"] == "last_name")
        .unwrap();
    page["patients"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["cells"][col].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn health_is_served() {
    let t = test_app(PREFIX);
    let (status, _, body) = get(&t.app, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["ok"], true);
}

#[tokio::test]
async fn every_endpoint_forbids_missing_permission() {
    let t = test_app(PREFIX);
    t.store
        .with_conn(|conn| {
            seed::insert_user(
                conn,
                &NewUser {
                    username: "visitor".into(),
                    organization_id: Some(t.demo.organization_id),
                    api_key: Some("no-perms".into()),
                    ..Default::default()
                },
            )
        })
        .unwrap();

    for path in ["patients/", "patients/compact/", "patients/stats/"] {
        let uri = format!("{PREFIX}/{path}");
        for key in [None, Some("no-perms"), Some("unknown")] {
            let (status, _, _) = get(&t.app, &uri, key).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{uri} {key:?}");
        }
    }
}

#[tokio::test]
async fn stats_denial_has_literal_body() {
    let t = test_app(PREFIX);
    let (status, _, body) = get(&t.app, &format!("{PREFIX}/patients/stats/"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, b"Permission denied");
}

#[tokio::test]
async fn list_shows_only_active_intake_complete_patients_of_own_organization() {
    let t = test_app(PREFIX);
    let page = get_json(&t.app, &format!("{PREFIX}/patients/")).await;
    assert_eq!(page["title"], "Patients List");
    assert_eq!(page["page"]["total_count"], 3);
    assert_eq!(last_names(&page), vec!["Lee", "Smith", "Smithson"]);
}

#[tokio::test]
async fn name_filter_is_case_insensitive_substring() {
    let t = test_app(PREFIX);
    let page = get_json(&t.app, &format!("{PREFIX}/patients/?name=SMITH")).await;
    assert_eq!(last_names(&page), vec!["Smith", "Smithson"]);
    assert_eq!(page["filter"]["values"]["name"], "SMITH");
}

#[tokio::test]
async fn has_care_team_filter_and_complement() {
    let t = test_app(PREFIX);
    let with = get_json(&t.app, &format!("{PREFIX}/patients/?has_care_team=true")).await;
    assert_eq!(last_names(&with), vec!["Smith"]);
    assert_eq!(with["patients"][0]["in_care_team"], true);

    let without = get_json(&t.app, &format!("{PREFIX}/patients/?has_care_team=false")).await;
    assert_eq!(last_names(&without), vec!["Lee", "Smithson"]);
}

#[tokio::test]
async fn invalid_filter_yields_empty_page_with_errors() {
    let t = test_app(PREFIX);
    let page = get_json(&t.app, &format!("{PREFIX}/patients/?birth_date_after=yesterday")).await;
    assert_eq!(page["patients"].as_array().unwrap().len(), 0);
    assert!(page["filter"]["errors"]["birth_date_after"].is_string());
}

#[tokio::test]
async fn per_page_outside_allow_list_uses_default() {
    let t = test_app(PREFIX);
    for (raw, expected) in [("5", 5), ("200", 200), ("7", 20), ("abc", 20)] {
        let page = get_json(&t.app, &format!("{PREFIX}/patients/?per_page={raw}")).await;
        assert_eq!(page["page"]["per_page"], expected, "per_page={raw}");
    }
}

#[tokio::test]
async fn sorting_and_paging_follow_query() {
    let t = test_app(PREFIX);
    let page = get_json(&t.app, &format!("{PREFIX}/patients/?sort=-last_name&per_page=5")).await;
    assert_eq!(last_names(&page), vec!["Smithson", "Smith", "Lee"]);

    let header = page["columns"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["name"] == "last_name")
        .unwrap();
    assert_eq!(header["sorted"], "desc");
}

#[tokio::test]
async fn missing_relations_render_placeholder_cells() {
    let t = test_app(PREFIX);
    let page = get_json(&t.app, &format!("{PREFIX}/patients/?name=smithson")).await;
    let columns = page["columns"].as_array().unwrap();
    let col = |name: &str| columns.iter().position(|c| c["name"] == name).unwrap();
    let row = &page["patients"][0];
    assert_eq!(row["cells"][col("eligible_insurance")], "-");
    assert_eq!(row["cells"][col("patient_category")], "-");
    assert_eq!(row["cells"][col("admission_date")], "-");
    assert_eq!(row["latest_referral_note"], "Referred by county office");
}

#[tokio::test]
async fn csv_export_is_an_attachment_of_the_whole_collection() {
    let t = test_app(PREFIX);
    let (status, headers, body) = get(
        &t.app,
        &format!("{PREFIX}/patients/?_export=csv&per_page=5&page=2"),
        Some(KEY),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"table.csv\""
    );
    let text = String::from_utf8(body).unwrap();
    assert_eq!(text.lines().count(), 4);
    assert!(!text.lines().next().unwrap().contains("Actions"));
}

#[tokio::test]
async fn json_and_xlsx_exports() {
    let t = test_app(PREFIX);
    let (_, headers, body) = get(&t.app, &format!("{PREFIX}/patients/?_export=json"), Some(KEY)).await;
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    let rows: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(rows.len(), 3);

    let (status, headers, body) =
        get(&t.app, &format!("{PREFIX}/patients/?_export=xlsx"), Some(KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"table.xlsx\""
    );
    assert!(body.starts_with(b"PK"));
}

#[tokio::test]
async fn compact_list_is_org_scoped_only_with_fixed_page_size() {
    let t = test_app(PREFIX);
    let page = get_json(&t.app, &format!("{PREFIX}/patients/compact/?per_page=5")).await;
    assert_eq!(page["page"]["per_page"], 50);
    assert_eq!(page["patients"].as_array().unwrap().len(), 5);
    assert_eq!(page["columns"].as_array().unwrap().len(), 4);

    let active = get_json(&t.app, &format!("{PREFIX}/patients/compact/?is_active=false")).await;
    assert_eq!(active["patients"].as_array().unwrap().len(), 1);
    assert_eq!(active["patients"][0]["cells"][3], "✗");
}

#[tokio::test]
async fn stats_count_whole_organization() {
    let t = test_app(PREFIX);
    let res = get_json(&t.app, &format!("{PREFIX}/patients/stats/")).await;
    let stats = &res["stats"];
    assert_eq!(stats["total"], 5);
    assert_eq!(stats["active"], 4);
    assert_eq!(stats["inactive"], 1);
    assert_eq!(stats["with_care_team"], 1);
    assert_eq!(stats["by_gender"]["F"], 2);
    assert_eq!(stats["by_gender"]["M"], 2);
    assert_eq!(stats["by_gender"]["O"], 1);
}

#[tokio::test]
async fn override_serves_main_list_at_site_root() {
    let t = test_app(PREFIX);
    let overridden = get_json(&t.app, "/patients/").await;
    let plugin = get_json(&t.app, &format!("{PREFIX}/patients/")).await;
    assert_eq!(overridden, plugin);
}

#[tokio::test]
async fn root_mount_serves_plugin_routes() {
    let t = test_app("/");
    let page = get_json(&t.app, "/patients/").await;
    assert_eq!(page["page"]["total_count"], 3);
    let (status, _, _) = get(&t.app, "/patients/stats/", Some(KEY)).await;
    assert_eq!(status, StatusCode::OK);
}
