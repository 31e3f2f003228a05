use crate::config::Config;
use crate::errors::{RequestError, ViewCounterError};
use crate::handler::ViewCounter;
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_INFLIGHT, SIGNATURE_REJECTED};
use crate::request::ViewCountRequest;
use crate::signature::{SIGNATURE_HEADER, SignatureError, SignatureVerifier};
use crate::store::CounterStore;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Limited};
use hyper::body::{Body, Bytes, Incoming};
use hyper::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ALLOW, HeaderValue,
};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use shared::http::make_json_response;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

pub type ServiceBody = BoxBody<Bytes, ViewCounterError>;

const ALLOWED_METHODS: &str = "POST, OPTIONS";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ViewCountResponse {
    success: bool,
    total_views: u64,
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response<ServiceBody> {
    make_json_response(
        status,
        &ErrorResponse {
            success: false,
            error: message.into(),
        },
    )
}

/// Counts a request as in flight until dropped.
///
/// hyper drops the handler future when the client disconnects, so the gauge
/// and duration are settled in `Drop` rather than after the last await.
struct RequestMetrics {
    started: Instant,
    inflight: metrics::Gauge,
    status: Option<StatusCode>,
}

impl RequestMetrics {
    fn start() -> Self {
        let inflight = shared::gauge!(REQUESTS_INFLIGHT);
        inflight.increment(1.0);
        RequestMetrics {
            started: Instant::now(),
            inflight,
            status: None,
        }
    }
}

impl Drop for RequestMetrics {
    fn drop(&mut self) {
        self.inflight.decrement(1.0);
        let status = match self.status {
            Some(status) => status.as_str().to_owned(),
            None => "cancelled".to_owned(),
        };
        shared::histogram!(REQUEST_DURATION, "status" => status)
            .record(self.started.elapsed().as_secs_f64());
    }
}

/// The storefront-facing endpoint.
///
/// Verifies the signature over the raw body, parses the request, runs it and
/// renders the outcome as JSON. Every failure becomes a response; the
/// service itself never errors.
#[derive(Clone)]
pub struct ViewCounterService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    counter: ViewCounter,
    verifier: Option<SignatureVerifier>,
    proxy_path: String,
    max_body_bytes: usize,
    cors_allow_origin: HeaderValue,
}

impl ViewCounterService {
    pub fn new(config: &Config, store: Arc<dyn CounterStore>) -> Result<Self, ViewCounterError> {
        config.validate()?;

        let verifier = config
            .verify_signature
            .then(|| SignatureVerifier::new(config.shared_secret.expose()));
        let cors_allow_origin = HeaderValue::from_str(&config.cors_allow_origin).map_err(|_| {
            crate::config::ValidationError::InvalidCorsOrigin(config.cors_allow_origin.clone())
        })?;

        Ok(ViewCounterService {
            inner: Arc::new(ServiceInner {
                counter: ViewCounter::new(store),
                verifier,
                proxy_path: config.proxy_path.clone(),
                max_body_bytes: config.max_body_bytes,
                cors_allow_origin,
            }),
        })
    }

    pub async fn handle<B>(&self, req: Request<B>) -> Response<ServiceBody>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        self.inner.handle(req).await
    }
}

impl ServiceInner {
    async fn handle<B>(&self, req: Request<B>) -> Response<ServiceBody>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let mut request_metrics = RequestMetrics::start();

        let mut response = match self.route(req).await {
            Ok(response) => response,
            Err(e) => self.render_error(e),
        };
        response
            .headers_mut()
            .insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.cors_allow_origin.clone());

        request_metrics.status = Some(response.status());
        response
    }

    async fn route<B>(&self, req: Request<B>) -> Result<Response<ServiceBody>, RequestError>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        if req.uri().path() != self.proxy_path {
            return Ok(error_response(StatusCode::NOT_FOUND, "not found"));
        }

        match *req.method() {
            Method::POST => {}
            Method::OPTIONS => return Ok(self.preflight()),
            _ => {
                let mut response =
                    error_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
                response
                    .headers_mut()
                    .insert(ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
                return Ok(response);
            }
        }

        let (parts, body) = req.into_parts();
        let body = Limited::new(body, self.max_body_bytes)
            .collect()
            .await
            .map_err(|e| RequestError::UnreadableBody(e.to_string()))?
            .to_bytes();

        if let Some(verifier) = &self.verifier {
            verifier
                .verify(&body, parts.headers.get(SIGNATURE_HEADER))
                .map_err(|e| {
                    shared::counter!(SIGNATURE_REJECTED).increment(1);
                    match e {
                        SignatureError::Missing => RequestError::MissingSignature,
                        SignatureError::Mismatch => RequestError::InvalidSignature,
                    }
                })?;
        }

        let request = ViewCountRequest::from_slice(&body)?;
        tracing::debug!(
            action = request.action.as_str(),
            product = %request.product_gid,
            "Handling view count request"
        );

        let total_views = self.counter.execute(&request).await?;

        Ok(make_json_response(
            StatusCode::OK,
            &ViewCountResponse {
                success: true,
                total_views,
            },
        ))
    }

    fn preflight(&self) -> Response<ServiceBody> {
        let mut response = Response::new(shared::http::full_body(Bytes::new()));
        *response.status_mut() = StatusCode::NO_CONTENT;

        let headers = response.headers_mut();
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("content-type, x-shopify-hmac-sha256"),
        );
        response
    }

    fn render_error(&self, e: RequestError) -> Response<ServiceBody> {
        let status = e.status_code();
        match &e {
            RequestError::Store(inner) if status.is_server_error() => {
                tracing::error!(store = self.counter.store_name(), error = %inner, "Upstream call failed");
            }
            RequestError::MissingSignature | RequestError::InvalidSignature => {
                tracing::warn!(error = %e, "Rejected request signature");
            }
            _ => tracing::info!(status = status.as_u16(), error = %e, "Rejected request"),
        }
        error_response(status, e.public_message())
    }
}

impl Service<Request<Incoming>> for ViewCounterService {
    type Response = Response<ServiceBody>;
    type Error = ViewCounterError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.handle(req).await) })
    }
}
