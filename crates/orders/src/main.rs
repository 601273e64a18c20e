use anyhow::Context;
use clap::Parser;
use orders::{CacheConfig, InMemoryCacheStore, OrderApi, OrderSaga, OrderStore, UserValidator};
use proto_grpc::orders::order_service_server::OrderServiceServer;
use std::sync::Arc;
use std::time::Duration;
use tokens::{Clock, SystemClock};

/// Order service: order creation via the user-validation saga, backed by
/// the identity service.
#[derive(Debug, Parser)]
#[command(about, version)]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:7071", env = "LISTEN_ADDR")]
    listen: std::net::SocketAddr,

    /// Base64-encoded symmetric token-signing key of at least 256 bits,
    /// shared with the identity service.
    #[arg(long, env = "JWT_SECRET")]
    jwt_secret: String,
    /// Issuer claim minted into, and required of, every token.
    #[arg(long, default_value = "identity-svc", env = "JWT_ISSUER")]
    jwt_issuer: String,
    /// Audience claim minted into, and required of, every token.
    #[arg(long, default_value = "commerce", env = "JWT_AUDIENCE")]
    jwt_audience: String,
    /// Lifetime of tokens minted for outbound calls, in milliseconds.
    #[arg(long, default_value = "86400000", env = "JWT_EXPIRATION_MS")]
    jwt_expiration_ms: u64,
    /// Tolerated clock skew when verifying token expiry.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "0s", env = "JWT_LEEWAY")]
    jwt_leeway: Duration,

    /// Server security mode: NONE, BASIC_VALIDATION, or FULL.
    #[arg(long, default_value = "FULL", env = "GRPC_SERVER_MODE")]
    server_mode: auth::ServerMode,
    /// Outbound credential mode: NONE, PROPAGATE, or VALIDATE.
    #[arg(long, default_value = "PROPAGATE", env = "GRPC_CLIENT_MODE")]
    client_mode: auth::ClientMode,
    /// Additional fully-qualified method names which bypass authentication.
    #[arg(long, env = "GRPC_EXCLUDED_METHODS", value_delimiter = ',')]
    excluded_methods: Vec<String>,

    /// Identity service backend addresses, tried round-robin.
    #[arg(
        long,
        default_value = "http://127.0.0.1:7070",
        env = "IDENTITY_ADDRESS",
        value_delimiter = ','
    )]
    identity_address: Vec<String>,
    /// Use TLS towards the identity service.
    #[arg(long, env = "IDENTITY_TLS")]
    identity_tls: bool,
    /// Default deadline of calls to the identity service.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "10s", env = "IDENTITY_DEADLINE")]
    identity_deadline: Duration,
    /// Soft limit after which an in-flight identity call is cancelled.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "10s", env = "IDENTITY_TIME_LIMIT")]
    identity_time_limit: Duration,
    /// How long the circuit breaker stays open once tripped.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "10s", env = "IDENTITY_BREAKER_OPEN_FOR")]
    identity_breaker_open_for: Duration,
    /// Concurrent in-flight calls admitted towards the identity service.
    #[arg(long, default_value = "10", env = "IDENTITY_BULKHEAD_LIMIT")]
    identity_bulkhead_limit: usize,
    /// How long callers wait for bulkhead admission before failing fast.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "1s", env = "IDENTITY_BULKHEAD_WAIT")]
    identity_bulkhead_wait: Duration,

    /// Validation-cache TTL for entries written on the order creation path.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "24h", env = "CACHE_POST_CREATE_TTL")]
    cache_post_create_ttl: Duration,
    /// Validation-cache TTL for entries written after plain lookups.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "30m", env = "CACHE_POST_LOOKUP_TTL")]
    cache_post_lookup_ttl: Duration,

    /// Maximum inbound message size, in bytes.
    #[arg(long, default_value = "16777216", env = "MAX_MESSAGE_BYTES")]
    max_message_bytes: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let mut token_config =
        tokens::Config::new(cli.jwt_secret, cli.jwt_issuer, cli.jwt_audience);
    token_config.ttl = Duration::from_millis(cli.jwt_expiration_ms);
    token_config.leeway = cli.jwt_leeway;
    let codec =
        Arc::new(tokens::Codec::new(token_config, clock.clone()).context("building token codec")?);

    // No local user directory: principals resolve from verified claims.
    let resolver = Arc::new(auth::Resolver::new(None, clock.clone()));
    let policies = orders::policies().exclude_all(&cli.excluded_methods);
    let layer = auth::AuthLayer::new(cli.server_mode, codec.clone(), resolver, policies);

    let mut peer_config = fabric::PeerConfig::new("identity", cli.identity_address);
    peer_config.tls = cli.identity_tls;
    peer_config.default_deadline = cli.identity_deadline;
    peer_config.time_limit = cli.identity_time_limit;
    peer_config.breaker.open_for = cli.identity_breaker_open_for;
    peer_config.bulkhead_limit = cli.identity_bulkhead_limit;
    peer_config.bulkhead_wait = cli.identity_bulkhead_wait;
    peer_config.max_message_bytes = cli.max_message_bytes;
    let peer = Arc::new(fabric::Peer::new(peer_config).context("building identity channel")?);

    let validator = Arc::new(UserValidator::new(
        peer,
        Arc::new(auth::TokenProvider::new(codec, cli.client_mode)),
        Arc::new(InMemoryCacheStore::default()),
        CacheConfig {
            post_create_ttl: cli.cache_post_create_ttl,
            post_lookup_ttl: cli.cache_post_lookup_ttl,
        },
        clock.clone(),
    ));

    let store = Arc::new(OrderStore::new(clock));
    let saga = Arc::new(OrderSaga::new(store.clone(), validator));
    let api = OrderApi::new(store, saga);

    tracing::info!(listen = %cli.listen, mode = ?cli.server_mode, "starting order service");

    tonic::transport::Server::builder()
        .http2_keepalive_interval(Some(Duration::from_secs(30)))
        .http2_keepalive_timeout(Some(Duration::from_secs(10)))
        .layer(layer)
        .add_service(
            OrderServiceServer::new(api).max_decoding_message_size(cli.max_message_bytes),
        )
        .serve_with_shutdown(cli.listen, async {
            _ = tokio::signal::ctrl_c().await;
            tracing::info!("signaled to stop");
        })
        .await
        .context("serving order service")?;

    Ok(())
}
