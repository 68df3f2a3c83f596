use devrank_crawler::config::{ApiConfig, CrawlerConfig, PriorityConfig};
use devrank_crawler::handlers::HandlerRegistry;
use devrank_crawler::storage::{SharedStorage, SqliteStorage};
use devrank_crawler::{ApiClient, Credential, CredentialPool, Worker};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// `Authorization` values for the test credentials
pub const ALICE_AUTH: &str = "Basic YWxpY2U6c2VjcmV0";
pub const BOB_AUTH: &str = "Basic Ym9iOmh1bnRlcjI=";
pub const CAROL_AUTH: &str = "Basic Y2Fyb2w6cHcz";

pub const ALICE: (&str, &str) = ("alice", "secret");
pub const BOB: (&str, &str) = ("bob", "hunter2");
pub const CAROL: (&str, &str) = ("carol", "pw3");

/// API configuration pointing at a mock server, with no retry delays
pub fn api_config(base_url: &str, retry: u32) -> ApiConfig {
    ApiConfig {
        base_url: base_url.to_string(),
        retry,
        retry_delay_ms: 0,
        exhausted_pool_pause: 0,
        timeout_secs: 10,
        ..ApiConfig::default()
    }
}

pub fn pool(credentials: &[(&str, &str)]) -> CredentialPool {
    CredentialPool::new(
        credentials
            .iter()
            .map(|(username, password)| Credential {
                username: username.to_string(),
                password: password.to_string(),
            })
            .collect(),
    )
    .unwrap()
}

pub fn client(base_url: &str, retry: u32, credentials: &[(&str, &str)]) -> ApiClient {
    ApiClient::new(&api_config(base_url, retry), pool(credentials)).unwrap()
}

pub fn memory_storage() -> SharedStorage {
    Arc::new(Mutex::new(SqliteStorage::new_in_memory().unwrap()))
}

/// Worker with standard handlers and no pauses
pub fn worker(base_url: &str, retry: u32, storage: SharedStorage) -> Worker {
    Worker::new(
        "test-worker",
        client(base_url, retry, &[ALICE]),
        HandlerRegistry::standard(),
        storage,
        CrawlerConfig {
            idle_time: 1,
            claim_backoff_ms: 0,
            failure_backoff: 0,
        },
        PriorityConfig::default(),
    )
}

/// A reduced account as it appears in listings
pub fn account_json(id: i64, login: &str) -> Value {
    json!({
        "id": id,
        "login": login,
        "avatar_url": format!("https://avatars.example.com/u/{}", id),
        "type": "User"
    })
}
