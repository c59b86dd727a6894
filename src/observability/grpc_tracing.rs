//! gRPC Tracing Layer
//!
//! Tower middleware that opens a span for every call the CSI driver makes on
//! the provider socket and logs its outcome and duration.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use tonic::codegen::http::{Request, Response};
use tower::{Layer, Service};
use tracing::{info_span, Instrument, Span};

/// Tower layer that provides automatic tracing for gRPC services.
///
/// This layer:
/// - Creates a span for each gRPC call
/// - Records the method name, gRPC status and duration
#[derive(Clone, Copy, Debug, Default)]
pub struct GrpcTracingLayer;

impl GrpcTracingLayer {
    /// Create a new gRPC tracing layer
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for GrpcTracingLayer {
    type Service = GrpcTracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GrpcTracingService { inner }
    }
}

/// Service wrapper that instruments gRPC calls with tracing spans.
#[derive(Clone, Debug)]
pub struct GrpcTracingService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for GrpcTracingService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let (service_name, method_name) = parse_grpc_path(request.uri().path());
        let span = create_grpc_span(&service_name, &method_name);

        // The ready service is the one that must handle this call
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = inner.call(request).await;

                let duration_ms = start.elapsed().as_millis() as u64;
                Span::current().record("grpc.duration_ms", duration_ms);

                match &result {
                    Ok(response) => {
                        // Unary handlers that fail report the status in the headers
                        let status = response
                            .headers()
                            .get("grpc-status")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("0")
                            .to_string();
                        Span::current().record("grpc.status", status.as_str());
                        tracing::debug!(grpc.status = %status, duration_ms, "gRPC call completed");
                    }
                    Err(_) => {
                        Span::current().record("grpc.status", "transport_error");
                        tracing::warn!(duration_ms, "gRPC call failed at the transport");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}

/// Parse gRPC path into service and method names
///
/// gRPC paths are formatted as `/package.ServiceName/MethodName`
fn parse_grpc_path(path: &str) -> (String, String) {
    let parts: Vec<&str> = path.trim_start_matches('/').split('/').collect();

    match parts.as_slice() {
        [service, method] => (service.to_string(), method.to_string()),
        [single] if !single.is_empty() => (single.to_string(), "unknown".to_string()),
        _ => ("unknown".to_string(), "unknown".to_string()),
    }
}

fn create_grpc_span(service: &str, method: &str) -> Span {
    info_span!(
        "grpc.server",
        rpc.system = "grpc",
        rpc.service = %service,
        rpc.method = %method,
        grpc.status = tracing::field::Empty,
        grpc.duration_ms = tracing::field::Empty,
    )
}
