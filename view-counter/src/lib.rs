pub mod config;
pub mod errors;
mod handler;
pub mod metafield;
pub mod metrics_defs;
mod product_locks;
pub mod request;
pub mod service;
pub mod signature;
pub mod store;

#[cfg(test)]
mod testutils;

use config::{Config, StoreConfig};
use errors::ViewCounterError;
use service::ViewCounterService;
use shared::admin_service::AdminService;
use shared::http::{bind_listener, run_http_service, serve_http};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use store::{AdminApiStore, CounterStore, InMemoryStore};

pub fn build_store(config: &StoreConfig) -> Result<Arc<dyn CounterStore>, ViewCounterError> {
    match config {
        StoreConfig::AdminApi(admin) => Ok(Arc::new(AdminApiStore::new(admin)?)),
        StoreConfig::Memory => {
            tracing::warn!("Using the in-memory store: view counts are lost on restart");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

pub async fn run(config: Config) -> Result<(), ViewCounterError> {
    config.validate()?;
    if !config.verify_signature {
        tracing::warn!("Signature verification is disabled, unsigned requests will be accepted");
    }

    let store = build_store(&config.store)?;
    let service = ViewCounterService::new(&config, store)?;

    let ready = Arc::new(AtomicBool::new(false));
    let is_ready = {
        let ready = ready.clone();
        move || ready.load(Ordering::Relaxed)
    };

    let listener = bind_listener(&config.listener.host, config.listener.port).await?;
    ready.store(true, Ordering::Relaxed);
    tracing::info!(path = %config.proxy_path, "View counter proxy ready");

    let proxy_task = serve_http(listener, service);
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::<_, ViewCounterError>::new(is_ready),
    );

    tokio::try_join!(proxy_task, admin_task)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{SIGNATURE_HEADER, SignatureVerifier};
    use serde_json::{Value, json};
    use std::net::SocketAddr;
    use tokio::net::TcpListener;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SECRET: &str = "e2e-secret";
    const PRODUCT: &str = "gid://shopify/Product/555";

    async fn start_proxy(upstream: &MockServer) -> SocketAddr {
        let yaml = format!(
            r#"
shared_secret: {SECRET}
store:
    type: admin_api
    access_token: shpat_e2e
    endpoint: "{}/graphql.json"
    field_type: list.number_integer
"#,
            upstream.uri()
        );
        let config: Config = serde_yaml::from_str(&yaml).unwrap();
        let store = build_store(&config.store).unwrap();
        let service = ViewCounterService::new(&config, store).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve_http(listener, service));
        addr
    }

    async fn call(addr: SocketAddr, body: Value) -> (u16, Value) {
        let raw = body.to_string();
        let response = reqwest::Client::new()
            .post(format!("http://{addr}/LMserver.js"))
            .header(SIGNATURE_HEADER, SignatureVerifier::new(SECRET).sign(raw.as_bytes()))
            .header("content-type", "application/json")
            .body(raw)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    #[tokio::test]
    async fn test_increment_over_http() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("query ProductViewCount"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"product": {"metafield": {"value": "[41]", "type": "list.number_integer"}}}
            })))
            .expect(1)
            .mount(&upstream)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("SetProductViewCount"))
            .and(body_string_contains(r#""value":"[42]""#))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"metafieldsSet": {
                    "metafields": [{"value": "[42]", "type": "list.number_integer"}],
                    "userErrors": []
                }}
            })))
            .expect(1)
            .mount(&upstream)
            .await;

        let addr = start_proxy(&upstream).await;
        let (status, body) = call(
            addr,
            json!({"action": "update_metafield", "productGid": PRODUCT}),
        )
        .await;

        assert_eq!(status, 200);
        assert_eq!(body, json!({"success": true, "totalViews": 42}));
    }

    #[tokio::test]
    async fn test_upstream_outage_over_http() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&upstream)
            .await;

        let addr = start_proxy(&upstream).await;
        let (status, body) = call(
            addr,
            json!({"action": "get_metafield", "productGid": PRODUCT}),
        )
        .await;

        assert_eq!(status, 500);
        assert_eq!(body["success"], false);
    }

    #[test]
    fn test_build_memory_store() {
        let store = build_store(&StoreConfig::Memory).unwrap();
        assert_eq!(store.name(), "memory");
    }
}
