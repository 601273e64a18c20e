use anyhow::Context;
use clap::Parser;
use identity::{IdentityApi, UserStore};
use proto_grpc::identity::identity_service_server::IdentityServiceServer;
use std::sync::Arc;
use std::time::Duration;
use tokens::{Clock, SystemClock};

/// Identity service: signup, login, token verification, and user
/// validation for the commerce deployment.
#[derive(Debug, Parser)]
#[command(about, version)]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:7070", env = "LISTEN_ADDR")]
    listen: std::net::SocketAddr,

    /// Base64-encoded symmetric token-signing key of at least 256 bits.
    #[arg(long, env = "JWT_SECRET")]
    jwt_secret: String,
    /// Issuer claim minted into, and required of, every token.
    #[arg(long, default_value = "identity-svc", env = "JWT_ISSUER")]
    jwt_issuer: String,
    /// Audience claim minted into, and required of, every token.
    #[arg(long, default_value = "commerce", env = "JWT_AUDIENCE")]
    jwt_audience: String,
    /// Lifetime of issued tokens, in milliseconds.
    #[arg(long, default_value = "86400000", env = "JWT_EXPIRATION_MS")]
    jwt_expiration_ms: u64,
    /// Tolerated clock skew when verifying token expiry.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "0s", env = "JWT_LEEWAY")]
    jwt_leeway: Duration,

    /// Server security mode: NONE, BASIC_VALIDATION, or FULL.
    #[arg(long, default_value = "FULL", env = "GRPC_SERVER_MODE")]
    server_mode: auth::ServerMode,
    /// Additional fully-qualified method names which bypass authentication.
    #[arg(long, env = "GRPC_EXCLUDED_METHODS", value_delimiter = ',')]
    excluded_methods: Vec<String>,

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

    let store = Arc::new(UserStore::new(clock.clone()));
    let resolver = Arc::new(auth::Resolver::new(
        Some(store.clone() as Arc<dyn auth::UserDirectory>),
        clock.clone(),
    ));
    let policies = identity::policies().exclude_all(&cli.excluded_methods);

    let layer = auth::AuthLayer::new(cli.server_mode, codec.clone(), resolver, policies);
    let api = IdentityApi::new(store, codec, clock);

    tracing::info!(listen = %cli.listen, mode = ?cli.server_mode, "starting identity service");

    tonic::transport::Server::builder()
        .http2_keepalive_interval(Some(Duration::from_secs(30)))
        .http2_keepalive_timeout(Some(Duration::from_secs(10)))
        .layer(layer)
        .add_service(
            IdentityServiceServer::new(api).max_decoding_message_size(cli.max_message_bytes),
        )
        .serve_with_shutdown(cli.listen, async {
            _ = tokio::signal::ctrl_c().await;
            tracing::info!("signaled to stop");
        })
        .await
        .context("serving identity service")?;

    Ok(())
}
