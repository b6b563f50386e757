use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

struct TestServer {
    base_url: String,
    child: Child,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));

#[cfg(unix)]
mod cleanup {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn unique_database_url() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("casework_http_{}_{}.db", std::process::id(), nanos));
    format!("sqlite://{}", path.to_string_lossy())
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/api/analytics/overview")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let child = Command::new(env!("CARGO_BIN_EXE_casework"))
        .env("PORT", port.to_string())
        .env("DATABASE_URL", unique_database_url())
        .env_remove("DATABASE_URL_OVERRIDE")
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

async fn read_json(response: reqwest::Response) -> Value {
    response.json().await.unwrap()
}

#[tokio::test]
async fn http_user_without_permissions_is_rejected() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response = client
        .post(server.url("/api/admin/users"))
        .json(&json!({ "email": "x@y.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = read_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["message"], "At least one permission must be enabled");

    let created = client
        .post(server.url("/api/admin/users"))
        .header("x-user-email", "admin@example.org")
        .json(&json!({ "email": "Case.Worker@Example.org", "can_view_client_services": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let body = read_json(created).await;
    assert_eq!(body["data"]["email"], "case.worker@example.org");
    assert_eq!(body["data"]["role"], "Reports Viewer");

    let audit = read_json(
        client
            .get(server.url("/api/admin/audit-logs?table=users&action=create"))
            .send()
            .await
            .unwrap(),
    )
    .await;
    let entries = audit["data"].as_array().unwrap();
    assert!(entries.iter().any(|entry| entry["user_email"] == "admin@example.org"));
}

#[tokio::test]
async fn http_checkin_shows_up_in_todays_impact() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response = client
        .post(server.url("/api/checkin"))
        .json(&json!({
            "clientName": "Jordan Ellis",
            "providerName": "Sam",
            "objectives": ["Food", "Housing"],
            "accessedFood": true
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let again = client
        .post(server.url("/api/checkin"))
        .json(&json!({ "clientName": "Jordan Ellis", "providerName": "Sam", "objectives": ["Food"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::CONFLICT);

    let impact = read_json(
        client
            .get(server.url("/api/analytics/services-impact?period=Today"))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(impact["success"], true);
    assert_eq!(impact["data"]["period"], "Today");

    let services = impact["data"]["services"].as_array().unwrap();
    let food = services.iter().find(|service| service["name"] == "Food").unwrap();
    assert!(food["requested"].as_i64().unwrap() >= 1);
    assert!(food["provided"].as_i64().unwrap() >= 1);
    assert_eq!(impact["data"]["trends"].as_array().unwrap().len(), 24);
}

#[tokio::test]
async fn http_completed_checkins_are_locked() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let draft = read_json(
        client
            .post(server.url("/api/checkins"))
            .json(&json!({ "client_name": "Riley Park", "provider_name": "Sam" }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    let id = draft["data"]["id"].as_i64().unwrap();
    assert_eq!(draft["data"]["status"], "Draft");

    let completed = client
        .put(server.url(&format!("/api/checkins/{id}")))
        .json(&json!({ "status": "Completed" }))
        .send()
        .await
        .unwrap();
    assert!(completed.status().is_success());

    let edit = client
        .put(server.url(&format!("/api/checkins/{id}")))
        .json(&json!({ "notes": "late note" }))
        .send()
        .await
        .unwrap();
    assert_eq!(edit.status(), StatusCode::BAD_REQUEST);

    let delete = client
        .delete(server.url(&format!("/api/checkins/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(delete.status(), StatusCode::BAD_REQUEST);

    let other = read_json(
        client
            .post(server.url("/api/ot-checkins"))
            .json(&json!({ "client_name": "Riley Park", "provider_name": "Sam" }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    let other_id = other["data"]["id"].as_i64().unwrap();
    let removed = client
        .delete(server.url(&format!("/api/ot-checkins/{other_id}")))
        .send()
        .await
        .unwrap();
    assert!(removed.status().is_success());

    let missing = client
        .get(server.url(&format!("/api/ot-checkins/{other_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn http_fresh_database_has_no_impact_today() {
    let _guard = TEST_LOCK.lock().await;
    let server = spawn_server().await;
    let client = Client::new();

    let impact = read_json(
        client
            .get(server.url("/api/analytics/services-impact?period=Today"))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert!(impact["data"]["services"].as_array().unwrap().is_empty());
    assert_eq!(impact["data"]["summary"]["totalRequested"], 0);

    let page = client.get(server.url("/")).send().await.unwrap();
    assert!(page.status().is_success());
    assert!(page.text().await.unwrap().contains("Services Impact"));
}

#[tokio::test]
async fn http_contact_date_can_be_corrected() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let checked_in = read_json(
        client
            .post(server.url("/api/checkin"))
            .json(&json!({ "clientName": "Morgan Vale", "providerName": "Sam", "objectives": ["Legal"] }))
            .send()
            .await
            .unwrap(),
    )
    .await;
    let id = checked_in["data"]["id"].as_i64().unwrap();

    let today = chrono::Local::now().date_naive();
    let yesterday = today.pred_opt().unwrap().to_string();
    let tomorrow = today.succ_opt().unwrap().to_string();

    let future = client
        .post(server.url("/api/change-date"))
        .json(&json!({ "contactIds": [id], "newDate": tomorrow }))
        .send()
        .await
        .unwrap();
    assert_eq!(future.status(), StatusCode::BAD_REQUEST);

    let moved = client
        .post(server.url("/api/change-date"))
        .header("x-user-email", "admin@example.org")
        .json(&json!({ "contactIds": [id], "newDate": yesterday }))
        .send()
        .await
        .unwrap();
    assert_eq!(moved.status(), StatusCode::OK);
    let body = read_json(moved).await;
    assert_eq!(body["message"], "Contact date updated for 1 contact(s)");
    assert_eq!(body["data"]["daysAgo"], 1);
    assert_eq!(body["data"]["updatedContacts"][0]["clientName"], "Morgan Vale");

    let stored = read_json(client.get(server.url(&format!("/api/contacts/{id}"))).send().await.unwrap()).await;
    assert!(stored["data"]["contactDate"].as_str().unwrap().starts_with(&yesterday));
}

#[tokio::test]
async fn http_outreach_contact_appears_in_todays_list() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let created = client
        .post(server.url("/api/outreach/contacts"))
        .json(&json!({
            "staff_member": "Jo",
            "is_new_client": true,
            "new_client_first_name": "Quinn",
            "new_client_last_name": "Hart",
            "supplies_given": { "socks": 2 },
            "narcan_administered": true
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let id = read_json(created).await["data"]["id"].as_i64().unwrap();

    let today = read_json(client.get(server.url("/api/outreach/contacts/today")).send().await.unwrap()).await;
    let contact = today["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|contact| contact["id"] == id)
        .unwrap()
        .clone();
    assert_eq!(contact["client_name"], "Quinn Hart");
    assert_eq!(contact["supplies_given"]["socks"], 2);

    let dangling = client
        .post(server.url("/api/outreach/contacts"))
        .json(&json!({ "staff_member": "Jo", "run_id": 999_999 }))
        .send()
        .await
        .unwrap();
    assert_eq!(dangling.status(), StatusCode::BAD_REQUEST);
}
