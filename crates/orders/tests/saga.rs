use orders::{CacheConfig, InMemoryCacheStore, OrderApi, OrderSaga, OrderStore, UserValidator};
use proto_commerce::orders as pb;
use proto_grpc::identity::identity_service_server::IdentityServiceServer;
use proto_grpc::orders::order_service_client::OrderServiceClient;
use proto_grpc::orders::order_service_server::OrderServiceServer;
use std::sync::Arc;
use std::time::Duration;
use tokens::{Codec, Config, ManualClock};
use tonic::transport::Channel;

const TEST_SECRET: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

/// Both services, wired together in-process: the order service reaches
/// the identity service over a real channel through the full guard stack.
struct Stack {
    users: Arc<identity::UserStore>,
    orders: Arc<OrderStore>,
    peer: Arc<fabric::Peer>,
    codec: Arc<Codec>,
    orders_addr: std::net::SocketAddr,
    _shutdown_txs: Vec<tokio::sync::oneshot::Sender<()>>,
}

impl Stack {
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
        let mut shutdown_txs = Vec::new();

        // Identity service.
        let users = Arc::new(identity::UserStore::new(clock.clone()));
        let identity_addr = {
            let resolver = Arc::new(auth::Resolver::new(
                Some(users.clone() as Arc<dyn auth::UserDirectory>),
                clock.clone(),
            ));
            let layer = auth::AuthLayer::new(
                auth::ServerMode::Full,
                codec.clone(),
                resolver,
                identity::policies(),
            );
            let api = identity::IdentityApi::new(users.clone(), codec.clone(), clock.clone());

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let (tx, rx) = tokio::sync::oneshot::channel::<()>();
            shutdown_txs.push(tx);
            tokio::spawn(
                tonic::transport::Server::builder()
                    .layer(layer)
                    .add_service(IdentityServiceServer::new(api))
                    .serve_with_incoming_shutdown(
                        tokio_stream::wrappers::TcpListenerStream::new(listener),
                        async {
                            _ = rx.await;
                        },
                    ),
            );
            addr
        };

        // Order service, pointed at the identity service.
        let mut peer_config =
            fabric::PeerConfig::new("identity", vec![format!("http://{identity_addr}")]);
        peer_config.retry.max_attempts = 2;
        peer_config.retry.initial_backoff = Duration::from_millis(50);
        let peer = Arc::new(fabric::Peer::new(peer_config).unwrap());

        let orders = Arc::new(OrderStore::new(clock.clone()));
        let orders_addr = {
            let validator = Arc::new(UserValidator::new(
                peer.clone(),
                Arc::new(auth::TokenProvider::new(
                    codec.clone(),
                    auth::ClientMode::Propagate,
                )),
                Arc::new(InMemoryCacheStore::default()),
                CacheConfig::default(),
                clock.clone(),
            ));
            let saga = Arc::new(OrderSaga::new(orders.clone(), validator));
            let api = OrderApi::new(orders.clone(), saga);

            let resolver = Arc::new(auth::Resolver::new(None, clock.clone()));
            let layer = auth::AuthLayer::new(
                auth::ServerMode::Full,
                codec.clone(),
                resolver,
                orders::policies(),
            );

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let (tx, rx) = tokio::sync::oneshot::channel::<()>();
            shutdown_txs.push(tx);
            tokio::spawn(
                tonic::transport::Server::builder()
                    .layer(layer)
                    .add_service(OrderServiceServer::new(api))
                    .serve_with_incoming_shutdown(
                        tokio_stream::wrappers::TcpListenerStream::new(listener),
                        async {
                            _ = rx.await;
                        },
                    ),
            );
            addr
        };

        Self {
            users,
            orders,
            peer,
            codec,
            orders_addr,
            _shutdown_txs: shutdown_txs,
        }
    }

    async fn client(&self) -> OrderServiceClient<Channel> {
        OrderServiceClient::connect(format!("http://{}", self.orders_addr))
            .await
            .unwrap()
    }

    /// Seed a user directly in the identity store.
    fn seed_user(&self, username: &str, email_verified: bool) -> identity::User {
        let mut user = self
            .users
            .insert(identity::NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password_hash: identity::password::hash("Secret@123"),
                first_name: "Alice".to_string(),
                last_name: "Johnson".to_string(),
                phone: None,
            })
            .unwrap();
        if email_verified {
            user.is_email_verified = true;
            user = self.users.save(user).unwrap();
        }
        user
    }

    fn bearer(&self, user: &identity::User) -> tonic::metadata::MetadataValue<tonic::metadata::Ascii> {
        let token = self
            .codec
            .issue(
                &user.username,
                Some(&user.user_id),
                &user.roles,
                Duration::from_secs(300),
            )
            .unwrap();
        format!("Bearer {token}").parse().unwrap()
    }
}

fn create_order_request(user_id: &str) -> pb::CreateOrderRequest {
    pb::CreateOrderRequest {
        user_id: user_id.to_string(),
        items: vec![
            pb::OrderItem {
                product_id: "P-001".to_string(),
                name: "Laptop".to_string(),
                quantity: 1,
                unit_price_cents: 99_999,
            },
            pb::OrderItem {
                product_id: "P-002".to_string(),
                name: "Mouse".to_string(),
                quantity: 2,
                unit_price_cents: 2_999,
            },
        ],
        shipping_address: Some("1 Main St, Springfield".to_string()),
        payment_method: Some("CREDIT_CARD".to_string()),
    }
}

fn with_bearer<T>(
    message: T,
    bearer: &tonic::metadata::MetadataValue<tonic::metadata::Ascii>,
) -> tonic::Request<T> {
    let mut request = tonic::Request::new(message);
    request.metadata_mut().insert("authorization", bearer.clone());
    request
}

#[tokio::test]
async fn valid_user_order_is_confirmed_with_an_exact_total() {
    let stack = Stack::start().await;
    let mut client = stack.client().await;

    let alice = stack.seed_user("alice", true);
    let bearer = stack.bearer(&alice);

    let order = client
        .create_order(with_bearer(create_order_request(&alice.user_id), &bearer))
        .await
        .unwrap()
        .into_inner()
        .order
        .unwrap();

    assert_eq!(order.status(), pb::OrderStatus::Confirmed);
    assert_eq!(order.saga_state(), pb::SagaState::Completed);
    assert_eq!(order.total_amount_cents, 105_997);
    assert_eq!(order.user_id, alice.user_id);

    // The persisted order agrees with the response.
    let stored = stack.orders.get(&order.order_id).unwrap();
    assert_eq!(stored.status, pb::OrderStatus::Confirmed);
    assert_eq!(stored.saga_state, pb::SagaState::Completed);
}

#[tokio::test]
async fn unverified_user_order_is_compensated() {
    let stack = Stack::start().await;
    let mut client = stack.client().await;

    let bob = stack.seed_user("bob", false);
    let bearer = stack.bearer(&bob);

    let err = client
        .create_order(with_bearer(create_order_request(&bob.user_id), &bearer))
        .await
        .unwrap_err();
    assert_eq!(err.code(), tonic::Code::FailedPrecondition);

    // The order row survives, in its compensated form.
    let (persisted, total) = stack.orders.list_for_user(&bob.user_id, 10, 0);
    assert_eq!(total, 1);
    assert_eq!(persisted[0].status, pb::OrderStatus::Cancelled);
    assert_eq!(persisted[0].saga_state, pb::SagaState::Failed);
}

#[tokio::test]
async fn open_circuit_fails_the_saga_as_unavailable() {
    let stack = Stack::start().await;
    let mut client = stack.client().await;

    let alice = stack.seed_user("alice", true);
    let bearer = stack.bearer(&alice);

    stack.peer.breaker().force_open();

    let err = client
        .create_order(with_bearer(create_order_request(&alice.user_id), &bearer))
        .await
        .unwrap_err();
    assert_eq!(err.code(), tonic::Code::Unavailable);

    let (persisted, total) = stack.orders.list_for_user(&alice.user_id, 10, 0);
    assert_eq!(total, 1);
    assert_eq!(persisted[0].status, pb::OrderStatus::Cancelled);
    assert_eq!(persisted[0].saga_state, pb::SagaState::Failed);
}

#[tokio::test]
async fn empty_orders_are_rejected_before_persistence() {
    let stack = Stack::start().await;
    let mut client = stack.client().await;

    let alice = stack.seed_user("alice", true);
    let bearer = stack.bearer(&alice);

    let mut request = create_order_request(&alice.user_id);
    request.items.clear();

    let err = client
        .create_order(with_bearer(request, &bearer))
        .await
        .unwrap_err();
    assert_eq!(err.code(), tonic::Code::InvalidArgument);

    let (_, total) = stack.orders.list_for_user(&alice.user_id, 10, 0);
    assert_eq!(total, 0);
}

#[tokio::test]
async fn orders_are_only_visible_to_their_owner() {
    let stack = Stack::start().await;
    let mut client = stack.client().await;

    let alice = stack.seed_user("alice", true);
    let mallory = stack.seed_user("mallory", true);

    let order = client
        .create_order(with_bearer(
            create_order_request(&alice.user_id),
            &stack.bearer(&alice),
        ))
        .await
        .unwrap()
        .into_inner()
        .order
        .unwrap();

    // Mallory sees NotFound, not PermissionDenied: existence is hidden.
    let err = client
        .get_order(with_bearer(
            pb::GetOrderRequest {
                order_id: order.order_id.clone(),
            },
            &stack.bearer(&mallory),
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), tonic::Code::NotFound);

    let fetched = client
        .get_order(with_bearer(
            pb::GetOrderRequest {
                order_id: order.order_id,
            },
            &stack.bearer(&alice),
        ))
        .await
        .unwrap()
        .into_inner()
        .order
        .unwrap();
    assert_eq!(fetched.user_id, alice.user_id);
}

#[tokio::test]
async fn delivered_orders_reject_further_transitions() {
    let stack = Stack::start().await;
    let mut client = stack.client().await;

    let alice = stack.seed_user("alice", true);
    let bearer = stack.bearer(&alice);

    let order = client
        .create_order(with_bearer(create_order_request(&alice.user_id), &bearer))
        .await
        .unwrap()
        .into_inner()
        .order
        .unwrap();

    for status in ["PROCESSING", "SHIPPED", "DELIVERED"] {
        client
            .update_order_status(with_bearer(
                pb::UpdateOrderStatusRequest {
                    order_id: order.order_id.clone(),
                    status: status.to_string(),
                },
                &bearer,
            ))
            .await
            .unwrap();
    }

    let before = stack.orders.get(&order.order_id).unwrap();
    let err = client
        .update_order_status(with_bearer(
            pb::UpdateOrderStatusRequest {
                order_id: order.order_id.clone(),
                status: "PENDING".to_string(),
            },
            &bearer,
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), tonic::Code::FailedPrecondition);

    // And the order is untouched.
    let after = stack.orders.get(&order.order_id).unwrap();
    assert_eq!(after.status, before.status);
    assert_eq!(after.version, before.version);
}

#[tokio::test]
async fn listing_pages_through_a_users_orders() {
    let stack = Stack::start().await;
    let mut client = stack.client().await;

    let alice = stack.seed_user("alice", true);
    let bearer = stack.bearer(&alice);

    for _ in 0..3 {
        client
            .create_order(with_bearer(create_order_request(&alice.user_id), &bearer))
            .await
            .unwrap();
    }

    let page = client
        .list_user_orders(with_bearer(
            pb::ListUserOrdersRequest {
                user_id: alice.user_id.clone(),
                page_size: 2,
                page_number: 0,
            },
            &bearer,
        ))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(page.orders.len(), 2);
    assert_eq!(page.total_items, 3);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.current_page, 0);

    // An anonymous listing is rejected outright.
    let err = client
        .list_user_orders(pb::ListUserOrdersRequest {
            user_id: alice.user_id.clone(),
            page_size: 2,
            page_number: 0,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), tonic::Code::Unauthenticated);
}
