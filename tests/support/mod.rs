// Shared primitives for bootstrapping sandbox servers in integration tests.
#![allow(dead_code)]

use bike_sandbox::domain::tuning::bike::BikeTuning;
use bike_sandbox::use_cases::SandboxSettings;
use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

pub const TICK: Duration = Duration::from_millis(10);

// No countdown so inputs are live as soon as the server accepts connections.
pub fn test_settings() -> SandboxSettings {
    SandboxSettings {
        bike_count: 2,
        tuning: BikeTuning::default(),
        countdown: Duration::ZERO,
        tick_interval: TICK,
    }
}

// Start a dedicated server and return its base URL. Each test gets its own
// sandbox so recorder state never leaks between tests.
pub fn spawn_server(settings: SandboxSettings) -> String {
    let published_url = Arc::new(OnceLock::<String>::new());
    let published_url_thread = Arc::clone(&published_url);

    // An OS thread keeps the server alive past the `#[tokio::test]` runtime.
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().expect("test runtime");
        runtime.block_on(async move {
            // Ephemeral port to avoid collisions with local services.
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind ephemeral test port");
            let addr = listener.local_addr().expect("get local addr");
            let _ = published_url_thread.set(format!("http://{}", addr));
            bike_sandbox::run_with_settings(listener, settings)
                .await
                .expect("server failed");
        });
    });

    wait_for_server_url_and_readiness(published_url)
}

pub fn ensure_server() -> String {
    spawn_server(test_settings())
}

fn wait_for_server_url_and_readiness(published_url: Arc<OnceLock<String>>) -> String {
    let base_url = loop {
        if let Some(url) = published_url.get() {
            break url.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };

    let addr = base_url
        .strip_prefix("http://")
        .expect("base url should use http://");

    // Retry for a short period to avoid racing server bind/accept.
    for _ in 0..100 {
        if std::net::TcpStream::connect(addr).is_ok() {
            return base_url;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    panic!("server did not become ready in time");
}

pub async fn session(client: &reqwest::Client, base_url: &str) -> serde_json::Value {
    client
        .get(format!("{base_url}/session"))
        .send()
        .await
        .expect("request should succeed")
        .json()
        .await
        .expect("session body should be json")
}

// Poll the session until it reports `state`, or fail after a generous deadline.
pub async fn wait_for_state(
    client: &reqwest::Client,
    base_url: &str,
    state: &str,
) -> serde_json::Value {
    for _ in 0..200 {
        let body = session(client, base_url).await;
        if body["state"] == state {
            return body;
        }
        tokio::time::sleep(TICK).await;
    }
    panic!("session never reached state {state}");
}
