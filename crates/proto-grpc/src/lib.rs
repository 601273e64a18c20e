#[cfg(any(feature = "identity_client", feature = "identity_server"))]
pub mod identity;

#[cfg(any(feature = "orders_client", feature = "orders_server"))]
pub mod orders;
