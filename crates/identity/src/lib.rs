pub mod password;
mod service;
mod store;

pub use service::IdentityApi;
pub use store::{NewUser, StoreError, User, UserStore};

/// Default per-method policies of the identity service. Signup, login,
/// and health checks bypass authentication; everything else requires an
/// authenticated caller.
pub fn policies() -> auth::PolicyMap {
    auth::PolicyMap::new()
        .exclude("commerce.identity.IdentityService/CreateUser")
        .exclude("commerce.identity.IdentityService/Login")
        .exclude("commerce.identity.IdentityService/HealthCheck")
}
