//! Integration tests for the club content backend.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::auth::Role;
use crate::config::{Config, StoreBackend};
use crate::db::{init_database, SqliteStore};
use crate::{create_router, AppState};

const ADMIN_EMAIL: &str = "admin@club.example";
const EDITOR_EMAIL: &str = "editor@club.example";
const VIEWER_EMAIL: &str = "viewer@club.example";
const SECRET: &str = "correct-horse";

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let store = Arc::new(SqliteStore::new(pool));

        // Create config
        let config = Config {
            store: StoreBackend::Sqlite,
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            bootstrap_admin: None,
            session_ttl: Duration::from_secs(600),
            notification_ttl: Duration::from_secs(60),
            seed_on_start: true,
        };

        let state = AppState::new(&config, store);
        state.content.seed_missing().await.expect("Failed to seed");
        for (email, role) in [
            (ADMIN_EMAIL, Role::Administrator),
            (EDITOR_EMAIL, Role::Editor),
            (VIEWER_EMAIL, Role::Viewer),
        ] {
            state
                .auth
                .create_account(email, SECRET, role)
                .await
                .expect("Failed to create account");
        }

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn sign_in(&self, email: &str) -> String {
        let resp = self
            .client
            .post(self.url("/api/auth/sign-in"))
            .json(&json!({"email": email, "secret": SECRET}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"]["token"].as_str().unwrap().to_string()
    }

    async fn editor(&self) -> Session<'_> {
        Session {
            fixture: self,
            token: self.sign_in(EDITOR_EMAIL).await,
        }
    }
}

/// Requests carrying a signed-in bearer token.
struct Session<'a> {
    fixture: &'a TestFixture,
    token: String,
}

impl Session<'_> {
    fn get(&self, path: &str) -> RequestBuilder {
        self.fixture
            .client
            .get(self.fixture.url(path))
            .bearer_auth(&self.token)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.fixture
            .client
            .post(self.fixture.url(path))
            .bearer_auth(&self.token)
    }

    fn patch(&self, path: &str) -> RequestBuilder {
        self.fixture
            .client
            .patch(self.fixture.url(path))
            .bearer_auth(&self.token)
    }

    fn delete(&self, path: &str) -> RequestBuilder {
        self.fixture
            .client
            .delete(self.fixture.url(path))
            .bearer_auth(&self.token)
    }
}

async fn json_ok(request: RequestBuilder) -> Value {
    let resp = request.send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    body
}

fn item_ids(items: &Value) -> Vec<String> {
    items
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_public_reads() {
    let fixture = TestFixture::new().await;

    let body = json_ok(fixture.client.get(fixture.url("/api/content/about"))).await;
    assert_eq!(body["data"]["foundedYear"], 1956);
    assert!(body["revisionId"].as_i64().unwrap() > 0);

    let body = json_ok(fixture.client.get(fixture.url("/api/collections/departments"))).await;
    assert_eq!(item_ids(&body["data"]), vec!["music-1", "dance-1", "drama-1"]);

    let body = json_ok(fixture.client.get(fixture.url("/api/site"))).await;
    assert_eq!(body["data"]["config"]["hero"]["title"], "Where Culture Comes Alive");
    assert_eq!(body["data"]["revisionId"], body["revisionId"]);

    let resp = fixture
        .client
        .get(fixture.url("/api/collections/sponsors"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_admin_requires_session() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/admin/config"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let resp = fixture
        .client
        .get(fixture.url("/api/admin/config"))
        .header("x-session-token", "not-a-session")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_sign_in_rejects_wrong_secret() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/auth/sign-in"))
        .json(&json!({"email": EDITOR_EMAIL, "secret": "wrong-secret"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_role_claims() {
    let fixture = TestFixture::new().await;

    let viewer = fixture.sign_in(VIEWER_EMAIL).await;
    let resp = fixture
        .client
        .get(fixture.url("/api/admin/config"))
        .header("x-session-token", &viewer)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let editor = fixture.editor().await;
    json_ok(editor.get("/api/admin/config")).await;
    let resp = editor.get("/api/admin/accounts").send().await.unwrap();
    assert_eq!(resp.status(), 403);

    let admin = Session {
        fixture: &fixture,
        token: fixture.sign_in(ADMIN_EMAIL).await,
    };
    let body = json_ok(admin.post("/api/admin/accounts").json(&json!({
        "email": "new@club.example",
        "secret": "another-secret",
        "role": "editor"
    })))
    .await;
    assert_eq!(body["data"]["role"], "editor");

    let body = json_ok(admin.get("/api/admin/accounts")).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_sign_out_ends_session() {
    let fixture = TestFixture::new().await;
    let editor = fixture.editor().await;

    let body = json_ok(editor.get("/api/auth/session")).await;
    assert_eq!(body["data"]["email"], EDITOR_EMAIL);
    assert_eq!(body["data"]["role"], "editor");

    let body = json_ok(editor.post("/api/auth/sign-out")).await;
    assert_eq!(body["data"], true);

    let body = json_ok(editor.get("/api/auth/session")).await;
    assert!(body["data"].is_null());
    let resp = editor.get("/api/admin/config").send().await.unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_config_edit_save_and_reset() {
    let fixture = TestFixture::new().await;
    let editor = fixture.editor().await;

    let body = json_ok(editor.get("/api/admin/config")).await;
    assert_eq!(body["data"]["hasChanges"], false);
    let revision = body["revisionId"].as_i64().unwrap();

    let body = json_ok(
        editor
            .patch("/api/admin/config/hero/title")
            .json(&json!({"value": "Spring Fest"})),
    )
    .await;
    assert_eq!(body["data"]["hasChanges"], true);
    assert_eq!(body["data"]["changedSections"], json!(["hero"]));

    let body = json_ok(editor.post("/api/admin/config/save")).await;
    assert_eq!(body["data"], json!({"status": "saved", "sections": ["hero"]}));
    assert_eq!(body["revisionId"].as_i64().unwrap(), revision + 1);

    // The public snapshot sees the commit.
    let body = json_ok(fixture.client.get(fixture.url("/api/content/hero"))).await;
    assert_eq!(body["data"]["title"], "Spring Fest");

    let body = json_ok(editor.post("/api/admin/config/save")).await;
    assert_eq!(body["data"]["status"], "unchanged");

    json_ok(
        editor
            .patch("/api/admin/config/theme/darkMode")
            .json(&json!({"value": "true"})),
    )
    .await;
    let body = json_ok(editor.post("/api/admin/config/reset")).await;
    assert_eq!(body["data"]["hasChanges"], false);
    assert_eq!(body["data"]["draft"]["theme"]["darkMode"], false);

    let resp = editor
        .patch("/api/admin/config/theme/primaryColor")
        .json(&json!({"value": ["not", "a", "colour"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let resp = editor
        .patch("/api/admin/config/sidebar/title")
        .json(&json!({"value": "x"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_collection_create_and_delete() {
    let fixture = TestFixture::new().await;
    let editor = fixture.editor().await;

    let body = json_ok(editor.post("/api/admin/collections/events/items")).await;
    assert_eq!(body["data"]["mode"]["state"], "editing");
    assert_eq!(body["data"]["mode"]["isNew"], true);
    assert!(body["data"]["mode"]["form"]
        .as_array()
        .unwrap()
        .iter()
        .all(|field| field["key"] != "id"));

    json_ok(
        editor
            .patch("/api/admin/collections/events/modal")
            .json(&json!({"title": "Open Mic", "date": "2025-03-01"})),
    )
    .await;

    // A second modal cannot open while this one is active.
    let resp = editor
        .post("/api/admin/collections/events/items/annual-fest-1/edit")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    let body = json_ok(editor.post("/api/admin/collections/events/modal/save")).await;
    let items = &body["data"]["items"];
    assert_eq!(items[0]["title"], "Open Mic");
    assert_eq!(items[1]["id"], "annual-fest-1");
    assert_eq!(body["data"]["mode"]["state"], "viewing");
    let new_id = items[0]["id"].as_str().unwrap().to_string();
    assert!(new_id.starts_with("open-mic-"));

    let body = json_ok(fixture.client.get(fixture.url("/api/collections/events"))).await;
    assert_eq!(item_ids(&body["data"]), vec![new_id.clone(), "annual-fest-1".to_string()]);

    let body = json_ok(editor.post(&format!(
        "/api/admin/collections/events/items/{}/delete",
        new_id
    )))
    .await;
    assert_eq!(body["data"]["pendingDelete"], new_id.as_str());
    let body = json_ok(editor.post("/api/admin/collections/events/delete/confirm")).await;
    assert_eq!(item_ids(&body["data"]["items"]), vec!["annual-fest-1"]);

    let resp = editor
        .post("/api/admin/collections/events/delete/confirm")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
}

#[tokio::test]
async fn test_modal_rejects_invalid_fields() {
    let fixture = TestFixture::new().await;
    let editor = fixture.editor().await;

    json_ok(editor.post("/api/admin/collections/events/items/annual-fest-1/edit")).await;
    let resp = editor
        .patch("/api/admin/collections/events/modal")
        .json(&json!({"title": "Renamed", "date": "someday"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["details"]["fields"]["date"].is_string());
    assert!(body["error"]["details"]["fields"].get("title").is_none());

    // The valid title in the same request was not applied either.
    let body = json_ok(editor.get("/api/admin/collections/events")).await;
    assert_ne!(body["data"]["mode"]["item"]["title"], "Renamed");

    let body = json_ok(editor.post("/api/admin/collections/events/modal/close")).await;
    assert_eq!(body["data"]["mode"]["state"], "viewing");
    assert_eq!(body["data"]["hasChanges"], false);
}

#[tokio::test]
async fn test_collection_reorder() {
    let fixture = TestFixture::new().await;
    let editor = fixture.editor().await;

    let body = json_ok(
        editor
            .post("/api/admin/collections/departments/reorder")
            .json(&json!({"from": 0, "to": 2})),
    )
    .await;
    assert_eq!(
        item_ids(&body["data"]["items"]),
        vec!["dance-1", "drama-1", "music-1"]
    );
    assert_eq!(body["data"]["items"][2]["order"], 2);

    json_ok(editor.post("/api/admin/collections/departments/drag/start")).await;
    json_ok(
        editor
            .post("/api/admin/collections/departments/drag/move")
            .json(&json!({"from": 2, "to": 0})),
    )
    .await;
    json_ok(editor.post("/api/admin/collections/departments/drag/drop")).await;

    let body = json_ok(fixture.client.get(fixture.url("/api/collections/departments"))).await;
    assert_eq!(item_ids(&body["data"]), vec!["music-1", "dance-1", "drama-1"]);

    let resp = editor
        .post("/api/admin/collections/departments/reorder")
        .json(&json!({"from": 0, "to": 9}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_notifications_queue() {
    let fixture = TestFixture::new().await;
    let editor = fixture.editor().await;

    let body = json_ok(editor.get("/api/admin/notifications")).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    json_ok(
        editor
            .patch("/api/admin/config/footer/email")
            .json(&json!({"value": "hello@club.example"})),
    )
    .await;
    json_ok(editor.post("/api/admin/config/save")).await;

    let body = json_ok(editor.get("/api/admin/notifications")).await;
    let queued = body["data"].as_array().unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0]["kind"], "success");
    let id = queued[0]["id"].as_i64().unwrap();

    json_ok(editor.delete(&format!("/api/admin/notifications/{}", id))).await;
    let resp = editor
        .delete(&format!("/api/admin/notifications/{}", id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_schema_and_refresh() {
    let fixture = TestFixture::new().await;
    let editor = fixture.editor().await;

    let body = json_ok(editor.get("/api/admin/schema/collections/current_executives")).await;
    let type_field = body["data"]["fields"]
        .as_array()
        .unwrap()
        .iter()
        .find(|field| field["key"] == "type")
        .cloned()
        .unwrap();
    assert_eq!(type_field["kind"], "select");

    let body = json_ok(editor.post("/api/admin/site/refresh")).await;
    assert_eq!(body["data"]["revisionId"], body["revisionId"]);

    let body = json_ok(editor.post("/api/admin/reload")).await;
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_sessions_keep_separate_drafts() {
    let fixture = TestFixture::new().await;
    let first = fixture.editor().await;
    let second = fixture.editor().await;

    let body = json_ok(first.post("/api/admin/collections/events/items/annual-fest-1/edit")).await;
    assert_eq!(body["data"]["mode"]["state"], "editing");

    // Another session sees no open modal and may open its own.
    let body = json_ok(second.get("/api/admin/collections/events")).await;
    assert_eq!(body["data"]["mode"]["state"], "viewing");
    json_ok(second.post("/api/admin/collections/events/items/annual-fest-1/edit")).await;

    json_ok(
        first
            .patch("/api/admin/config/hero/title")
            .json(&json!({"value": "Only Mine"})),
    )
    .await;
    let body = json_ok(second.get("/api/admin/config")).await;
    assert_eq!(body["data"]["hasChanges"], false);
}
