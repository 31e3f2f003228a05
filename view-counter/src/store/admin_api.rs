use super::{CounterStore, StoreError};
use crate::config::{AdminApiConfig, ValidationError};
use crate::metafield::{FieldType, MetafieldValue};
use crate::metrics_defs::UPSTREAM_REQUESTS;
use crate::request::ProductGid;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use url::Url;

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

const READ_QUERY: &str = r#"
query ProductViewCount($id: ID!, $namespace: String!, $key: String!) {
  product(id: $id) {
    metafield(namespace: $namespace, key: $key) {
      value
      type
    }
  }
}"#;

const WRITE_MUTATION: &str = r#"
mutation SetProductViewCount($metafields: [MetafieldsSetInput!]!) {
  metafieldsSet(metafields: $metafields) {
    metafields {
      value
      type
    }
    userErrors {
      field
      message
    }
  }
}"#;

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct ProductData {
    product: Option<ProductNode>,
}

#[derive(Deserialize)]
struct ProductNode {
    metafield: Option<MetafieldNode>,
}

#[derive(Deserialize)]
struct MetafieldNode {
    value: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetafieldsSetData {
    metafields_set: Option<MetafieldsSetPayload>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetafieldsSetPayload {
    #[serde(default)]
    metafields: Option<Vec<MetafieldNode>>,
    #[serde(default)]
    user_errors: Vec<UserError>,
}

#[derive(Deserialize)]
struct UserError {
    field: Option<Vec<String>>,
    message: String,
}

impl UserError {
    fn describe(&self) -> String {
        match &self.field {
            Some(path) if !path.is_empty() => format!("{}: {}", path.join("."), self.message),
            _ => self.message.clone(),
        }
    }

    /// `metafieldsSet` reports an unknown owner against the `ownerId` input field.
    fn targets_owner(&self) -> bool {
        self.field
            .as_ref()
            .and_then(|path| path.last())
            .is_some_and(|last| last == "ownerId")
    }
}

/// Keeps the view count in a product metafield through the Admin GraphQL API.
pub struct AdminApiStore {
    client: reqwest::Client,
    endpoint: Url,
    access_token: String,
    namespace: String,
    key: String,
    field_type: FieldType,
}

#[derive(thiserror::Error, Debug)]
pub enum AdminApiStoreError {
    #[error(transparent)]
    Config(#[from] ValidationError),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

impl AdminApiStore {
    pub fn new(config: &AdminApiConfig) -> Result<Self, AdminApiStoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(AdminApiStore {
            client,
            endpoint: config.endpoint()?,
            access_token: config.access_token.expose().to_string(),
            namespace: config.namespace.clone(),
            key: config.key.clone(),
            field_type: config.field_type,
        })
    }

    /// Runs one GraphQL operation and unwraps the `data` member of the reply.
    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        body: serde_json::Value,
    ) -> Result<T, StoreError> {
        let result = self.send(body).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(StoreError::Transport(_)) => "transport_error",
            Err(StoreError::UpstreamStatus(_)) => "bad_status",
            Err(_) => "invalid_response",
        };
        shared::counter!(UPSTREAM_REQUESTS, "operation" => operation, "outcome" => outcome)
            .increment(1);
        result
    }

    async fn send<T: DeserializeOwned>(&self, body: serde_json::Value) -> Result<T, StoreError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::UpstreamStatus(status));
        }

        let bytes = response.bytes().await?;
        let reply: GraphQlResponse<T> = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::MalformedResponse(e.to_string()))?;

        if !reply.errors.is_empty() {
            return Err(StoreError::GraphQl(
                reply.errors.into_iter().map(|e| e.message).collect(),
            ));
        }

        reply
            .data
            .ok_or_else(|| StoreError::MalformedResponse("response has no data".into()))
    }

    fn decode(&self, product: &ProductGid, raw: &str) -> Result<u64, StoreError> {
        let value = MetafieldValue::decode(raw)?;
        if value.field_type() != self.field_type {
            tracing::warn!(
                product = %product,
                stored = value.field_type().as_str(),
                configured = self.field_type.as_str(),
                "Metafield representation differs from the configured field type"
            );
        }
        Ok(value.count())
    }
}

#[async_trait]
impl CounterStore for AdminApiStore {
    fn name(&self) -> &'static str {
        "admin_api"
    }

    async fn get(&self, product: &ProductGid) -> Result<u64, StoreError> {
        let body = json!({
            "query": READ_QUERY,
            "variables": {
                "id": product.as_str(),
                "namespace": self.namespace,
                "key": self.key,
            },
        });

        let data: ProductData = self.execute("read", body).await?;
        let node = data
            .product
            .ok_or_else(|| StoreError::ProductNotFound(product.to_string()))?;

        match node.metafield {
            Some(metafield) => self.decode(product, &metafield.value),
            None => {
                tracing::debug!(product = %product, "No view count metafield yet");
                Ok(0)
            }
        }
    }

    async fn set(&self, product: &ProductGid, count: u64) -> Result<u64, StoreError> {
        let body = json!({
            "query": WRITE_MUTATION,
            "variables": {
                "metafields": [{
                    "ownerId": product.as_str(),
                    "namespace": self.namespace,
                    "key": self.key,
                    "type": self.field_type.as_str(),
                    "value": MetafieldValue::new(self.field_type, count).encode(),
                }],
            },
        });

        let data: MetafieldsSetData = self.execute("write", body).await?;
        let payload = data
            .metafields_set
            .ok_or_else(|| StoreError::MalformedResponse("metafieldsSet is null".into()))?;

        if payload.user_errors.iter().any(UserError::targets_owner) {
            return Err(StoreError::ProductNotFound(product.to_string()));
        }
        if !payload.user_errors.is_empty() {
            return Err(StoreError::WriteRejected(
                payload.user_errors.iter().map(UserError::describe).collect(),
            ));
        }

        match payload.metafields.as_deref() {
            Some([written, ..]) => self.decode(product, &written.value),
            _ => Ok(count),
        }
    }
}
