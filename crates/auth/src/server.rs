use crate::{CorrelationId, Error, PolicyMap, Principal, Resolver};
use std::sync::Arc;
use std::task::{Context, Poll};
use tonic::codegen::http;
use tracing::Instrument;

/// Server-side security posture, chosen at startup and uniform for the
/// process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    /// Pass every call through untouched.
    None,
    /// Tokens must verify, but no Principal is published and no
    /// per-method authorization runs.
    BasicValidation,
    /// Publish a Principal and enforce per-method policies.
    Full,
}

impl std::str::FromStr for ServerMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(Self::None),
            "BASIC_VALIDATION" => Ok(Self::BasicValidation),
            "FULL" => Ok(Self::Full),
            other => Err(format!(
                "'{other}' is not a server mode (expected NONE, BASIC_VALIDATION, or FULL)"
            )),
        }
    }
}

/// The raw bearer token as received, published request-scoped so the
/// client chain can propagate it on outbound calls.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

/// Request-scoped values carried from an inbound RPC into work it spawns,
/// such as the order saga's call to the identity service.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub correlation_id: CorrelationId,
    pub token: Option<String>,
    pub principal: Option<Principal>,
}

impl RequestContext {
    /// Capture the context of `request`. Mints a fresh correlation-id if
    /// the chain didn't run (e.g. background work).
    pub fn of<T>(request: &tonic::Request<T>) -> Self {
        use crate::RequestExt;
        Self {
            correlation_id: request.correlation_id().cloned().unwrap_or_default(),
            token: request.bearer_token().map(str::to_string),
            principal: request.principal().cloned(),
        }
    }
}

struct Chain {
    mode: ServerMode,
    codec: Arc<tokens::Codec>,
    resolver: Arc<Resolver>,
    policies: PolicyMap,
}

/// Tower layer running the inbound interceptor chain on every RPC:
///
/// 1. adopt or mint the correlation-id and publish it request-scoped;
/// 2. extract a `Bearer` token from `authorization` metadata;
/// 3. verify + resolve it and publish the Principal (mode-dependent);
/// 4. evaluate the per-method policy;
///
/// and echo the effective correlation-id on the response, including on
/// rejections. Rejections are answered locally as trailers-only gRPC
/// responses and never reach the service implementation.
#[derive(Clone)]
pub struct AuthLayer {
    chain: Arc<Chain>,
}

impl AuthLayer {
    pub fn new(
        mode: ServerMode,
        codec: Arc<tokens::Codec>,
        resolver: Arc<Resolver>,
        policies: PolicyMap,
    ) -> Self {
        Self {
            chain: Arc::new(Chain {
                mode,
                codec,
                resolver,
                policies,
            }),
        }
    }
}

impl<S> tower::Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            chain: self.chain.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    chain: Arc<Chain>,
}

impl<S, B> tonic::codegen::Service<http::Request<B>> for AuthService<S>
where
    S: tonic::codegen::Service<
            http::Request<B>,
            Response = http::Response<tonic::body::BoxBody>,
        > + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: http::Request<B>) -> Self::Future {
        // Swap a clone in so the readied inner service handles this call.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let chain = self.chain.clone();

        Box::pin(async move {
            let correlation_id = request
                .headers()
                .get(proto_header::CORRELATION_ID)
                .and_then(|v| v.to_str().ok())
                .and_then(CorrelationId::parse)
                .unwrap_or_else(CorrelationId::mint);

            // Always a valid header value: parse() admits only visible ASCII
            // and minted ids are UUIDs.
            let echo = http::HeaderValue::from_str(correlation_id.as_str()).unwrap();

            let request_id = request
                .headers()
                .get(proto_header::REQUEST_ID)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let span = tracing::info_span!(
                "rpc",
                method = %request.uri().path(),
                correlation_id = %correlation_id,
                request_id = tracing::field::Empty,
            );
            if let Some(request_id) = &request_id {
                span.record("request_id", tracing::field::display(request_id));
            }

            request.extensions_mut().insert(correlation_id);

            let mut response = match chain.authenticate(&mut request) {
                Ok(()) => inner.call(request).instrument(span).await?,
                Err(status) => {
                    let _entered = span.enter();
                    tracing::info!(code = ?status.code(), "rejecting call");
                    reject(status)
                }
            };

            response
                .headers_mut()
                .insert(proto_header::CORRELATION_ID, echo);
            Ok(response)
        })
    }
}

mod proto_header {
    pub const CORRELATION_ID: &str = "x-correlation-id";
    pub const AUTHORIZATION: &str = "authorization";
    pub const REQUEST_ID: &str = "x-request-id";
}

impl Chain {
    fn authenticate<B>(&self, request: &mut http::Request<B>) -> Result<(), tonic::Status> {
        let path = request.uri().path().to_string();

        if self.mode == ServerMode::None || self.policies.is_excluded(&path) {
            return Ok(());
        }

        let token = request
            .headers()
            .get(proto_header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string);

        // Absent credentials leave the call anonymous; the per-method
        // policy decides whether that's acceptable.
        let principal = match token {
            None => None,
            Some(token) => {
                let claims = self.codec.verify(&token).map_err(|err| {
                    tracing::warn!(error = %err, "token verification failed");
                    Error::Token(err).into_status()
                })?;

                let principal = if self.mode == ServerMode::Full {
                    let principal = self.resolver.resolve(&claims).map_err(|err| {
                        tracing::warn!(error = %err, "principal resolution failed");
                        err.into_status()
                    })?;
                    request.extensions_mut().insert(principal.clone());
                    Some(principal)
                } else {
                    None
                };

                request.extensions_mut().insert(BearerToken(token));
                principal
            }
        };

        if self.mode == ServerMode::Full {
            self.policies
                .authorize(&path, principal.as_ref())
                .map_err(Error::into_status)?;
        }

        Ok(())
    }
}

// A trailers-only gRPC response carrying `status`.
fn reject(status: tonic::Status) -> http::Response<tonic::body::BoxBody> {
    let mut builder = http::Response::builder()
        .status(200)
        .header("grpc-status", status.code() as i32)
        .header("content-type", "application/grpc");

    // Status messages are short ASCII descriptions; skip the header rather
    // than fail the response if one ever isn't.
    if let Ok(message) = http::HeaderValue::from_str(status.message()) {
        builder = builder.header("grpc-message", message);
    }

    builder.body(tonic::codegen::empty_body()).unwrap()
}
