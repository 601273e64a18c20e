/// Message types of the `commerce.identity` protobuf package.
pub mod identity;
/// Message types of the `commerce.orders` protobuf package.
pub mod orders;

/// Wire metadata keys shared by both services and their clients.
pub mod metadata {
    /// Carries `Bearer <token>` credentials.
    pub const AUTHORIZATION: &str = "authorization";
    /// Correlation-id threaded through an entire request tree.
    /// Adopted verbatim when present, freshly minted otherwise, and
    /// echoed back on every response.
    pub const CORRELATION_ID: &str = "x-correlation-id";
    /// Optional per-call request id, logged but not otherwise interpreted.
    pub const REQUEST_ID: &str = "x-request-id";
}

#[derive(Debug, thiserror::Error)]
#[error("'{0}' is not a recognized value")]
pub struct ParseEnumError(pub String);

impl orders::OrderStatus {
    /// Parse a status from its wire name, as sent by UpdateOrderStatus callers.
    pub fn from_wire_name(name: &str) -> Result<Self, ParseEnumError> {
        Self::from_str_name(name).ok_or_else(|| ParseEnumError(name.to_string()))
    }
}
