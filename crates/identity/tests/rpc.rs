use identity::{IdentityApi, UserStore};
use proto_commerce::identity as pb;
use proto_grpc::identity::identity_service_client::IdentityServiceClient;
use proto_grpc::identity::identity_service_server::IdentityServiceServer;
use std::sync::Arc;
use std::time::Duration;
use tokens::{Codec, Config, ManualClock};
use tonic::transport::Channel;

const TEST_SECRET: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

struct TestServer {
    addr: std::net::SocketAddr,
    codec: Arc<Codec>,
    clock: Arc<ManualClock>,
    store: Arc<UserStore>,
    _shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl TestServer {
    async fn start() -> Self {
        let clock = Arc::new(ManualClock::new(
            chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        let codec = Arc::new(
            Codec::new(
                Config::new(TEST_SECRET, "identity-svc", "commerce"),
                clock.clone(),
            )
            .unwrap(),
        );
        let store = Arc::new(UserStore::new(clock.clone()));
        let resolver = Arc::new(auth::Resolver::new(
            Some(store.clone() as Arc<dyn auth::UserDirectory>),
            clock.clone(),
        ));
        let layer = auth::AuthLayer::new(
            auth::ServerMode::Full,
            codec.clone(),
            resolver,
            identity::policies(),
        );
        let api = IdentityApi::new(store.clone(), codec.clone(), clock.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(
            tonic::transport::Server::builder()
                .layer(layer)
                .add_service(IdentityServiceServer::new(api))
                .serve_with_incoming_shutdown(
                    tokio_stream::wrappers::TcpListenerStream::new(listener),
                    async {
                        _ = shutdown_rx.await;
                    },
                ),
        );

        Self {
            addr,
            codec,
            clock,
            store,
            _shutdown_tx: shutdown_tx,
        }
    }

    async fn client(&self) -> IdentityServiceClient<Channel> {
        IdentityServiceClient::connect(format!("http://{}", self.addr))
            .await
            .unwrap()
    }

    fn bearer(&self, username: &str) -> tonic::metadata::MetadataValue<tonic::metadata::Ascii> {
        let token = self
            .codec
            .issue(username, None, &["ROLE_USER".to_string()], Duration::from_secs(60))
            .unwrap();
        format!("Bearer {token}").parse().unwrap()
    }
}

fn signup(username: &str, email: &str) -> pb::CreateUserRequest {
    pb::CreateUserRequest {
        username: username.to_string(),
        email: email.to_string(),
        password: "Alice@123".to_string(),
        first_name: "Alice".to_string(),
        last_name: "Johnson".to_string(),
        phone: None,
    }
}

#[tokio::test]
async fn signup_is_public_and_duplicates_are_rejected() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    let created = client
        .create_user(signup("alice", "alice@example.com"))
        .await
        .unwrap()
        .into_inner();
    let profile = created.profile.unwrap();
    assert_eq!(profile.username, "alice");
    assert!(profile.is_active);
    assert!(!profile.is_email_verified);

    let err = client
        .create_user(signup("alice", "alice@example.com"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), tonic::Code::AlreadyExists);
}

#[tokio::test]
async fn get_user_requires_a_live_token() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    let created = client
        .create_user(signup("alice", "alice@example.com"))
        .await
        .unwrap()
        .into_inner();

    // Anonymous calls are turned away.
    let err = client
        .get_user(pb::GetUserRequest {
            user_id: created.user_id.clone(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), tonic::Code::Unauthenticated);
    assert_eq!(err.message(), "missing token");

    // A valid bearer token is accepted.
    let bearer = server.bearer("alice");
    let mut request = tonic::Request::new(pb::GetUserRequest {
        user_id: created.user_id.clone(),
    });
    request.metadata_mut().insert("authorization", bearer.clone());
    let profile = client
        .get_user(request)
        .await
        .unwrap()
        .into_inner()
        .profile
        .unwrap();
    assert_eq!(profile.username, "alice");

    // The same token 61 simulated seconds later is expired.
    server.clock.advance(chrono::TimeDelta::seconds(61));
    let mut request = tonic::Request::new(pb::GetUserRequest {
        user_id: created.user_id,
    });
    request.metadata_mut().insert("authorization", bearer);
    let err = client.get_user(request).await.unwrap_err();
    assert_eq!(err.code(), tonic::Code::Unauthenticated);
    assert!(err.message().contains("expired"), "{}", err.message());
}

#[tokio::test]
async fn correlation_ids_are_adopted_and_echoed() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    // Echoed verbatim when supplied, on success...
    let mut request = tonic::Request::new(pb::HealthCheckRequest {});
    request
        .metadata_mut()
        .insert("x-correlation-id", "corr-42".parse().unwrap());
    let response = client.health_check(request).await.unwrap();
    assert_eq!(
        response.metadata().get("x-correlation-id").unwrap(),
        "corr-42"
    );

    // ...and on rejection.
    let mut request = tonic::Request::new(pb::GetUserRequest {
        user_id: "whatever".to_string(),
    });
    request
        .metadata_mut()
        .insert("x-correlation-id", "corr-43".parse().unwrap());
    let err = client.get_user(request).await.unwrap_err();
    assert_eq!(err.metadata().get("x-correlation-id").unwrap(), "corr-43");

    // Minted when absent.
    let response = client.health_check(pb::HealthCheckRequest {}).await.unwrap();
    assert!(response.metadata().get("x-correlation-id").is_some());
}

#[tokio::test]
async fn login_issues_a_working_token() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    let created = client
        .create_user(signup("alice", "alice@example.com"))
        .await
        .unwrap()
        .into_inner();

    let login = client
        .login(pb::LoginRequest {
            username: "alice".to_string(),
            password: "Alice@123".to_string(),
        })
        .await
        .unwrap()
        .into_inner();
    assert!(!login.token.is_empty());

    let mut request = tonic::Request::new(pb::GetUserRequest {
        user_id: created.user_id,
    });
    request.metadata_mut().insert(
        "authorization",
        format!("Bearer {}", login.token).parse().unwrap(),
    );
    assert!(client.get_user(request).await.is_ok());

    let err = client
        .login(pb::LoginRequest {
            username: "alice".to_string(),
            password: "nope".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), tonic::Code::Unauthenticated);
}

#[tokio::test]
async fn disabled_users_are_rejected_even_with_live_tokens() {
    let server = TestServer::start().await;
    let mut client = server.client().await;

    let created = client
        .create_user(signup("alice", "alice@example.com"))
        .await
        .unwrap()
        .into_inner();
    let bearer = server.bearer("alice");

    let mut user = server.store.get(&created.user_id).unwrap();
    user.is_active = false;
    server.store.save(user).unwrap();

    let mut request = tonic::Request::new(pb::GetUserRequest {
        user_id: created.user_id,
    });
    request.metadata_mut().insert("authorization", bearer);
    let err = client.get_user(request).await.unwrap_err();
    assert_eq!(err.code(), tonic::Code::Unauthenticated);
    assert_eq!(err.message(), "identity unknown or disabled");
}
