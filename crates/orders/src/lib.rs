mod saga;
mod service;
mod store;
mod validation;

pub use saga::{OrderSaga, SagaError};
pub use service::OrderApi;
pub use store::{NewOrder, Order, OrderItem, OrderStore, StoreError};
pub use validation::{
    CacheConfig, CacheEntry, CacheStore, CacheUnavailable, InMemoryCacheStore, UserValidator,
};

/// Default per-method policies of the order service. Only health checks
/// bypass authentication; every order operation requires an authenticated
/// caller.
pub fn policies() -> auth::PolicyMap {
    auth::PolicyMap::new().exclude("commerce.orders.OrderService/HealthCheck")
}
