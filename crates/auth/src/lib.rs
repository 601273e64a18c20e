mod client;
mod correlation;
mod policy;
mod principal;
mod resolver;
mod server;

pub use client::{ClientMode, Metadata, TokenProvider};
pub use correlation::CorrelationId;
pub use policy::{Policy, PolicyMap};
pub use principal::{AccountStatus, Principal, UserDirectory};
pub use resolver::Resolver;
pub use server::{AuthLayer, AuthService, BearerToken, RequestContext, ServerMode};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Token(#[from] tokens::Error),
    #[error("missing token")]
    MissingToken,
    #[error("unknown subject '{0}'")]
    UnknownSubject(String),
    #[error("account '{0}' is disabled or locked")]
    AccountDisabled(String),
    #[error("caller is not authorized for this method")]
    PolicyDenied,
    #[error("invalid metadata value")]
    InvalidMetadata(#[from] tonic::metadata::errors::InvalidMetadataValue),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Map onto the wire status surfaced to callers. Resolution failures
    /// collapse into one message; responses never disclose whether a
    /// subject exists.
    pub fn into_status(self) -> tonic::Status {
        match self {
            Error::Token(tokens::Error::Issuance(_)) => {
                tonic::Status::unauthenticated("could not obtain credentials")
            }
            Error::Token(err) => tonic::Status::unauthenticated(err.to_string()),
            Error::MissingToken => tonic::Status::unauthenticated("missing token"),
            Error::UnknownSubject(_) | Error::AccountDisabled(_) => {
                tonic::Status::unauthenticated("identity unknown or disabled")
            }
            Error::PolicyDenied => tonic::Status::permission_denied("not authorized"),
            Error::InvalidMetadata(_) => tonic::Status::internal("invalid request metadata"),
        }
    }
}

/// Accessors for the request-scoped values published by [`AuthLayer`].
///
/// The values live in the RPC's extensions, so their lifetime is exactly
/// the lifetime of the call: once the request is dropped, on any terminal
/// path, nothing retains them.
pub trait RequestExt {
    fn principal(&self) -> Option<&Principal>;
    fn correlation_id(&self) -> Option<&CorrelationId>;
    fn bearer_token(&self) -> Option<&str>;

    fn require_principal(&self) -> std::result::Result<&Principal, tonic::Status> {
        self.principal()
            .ok_or_else(|| tonic::Status::unauthenticated("missing token"))
    }

    /// The caller must either be the user identified by `user_id`, or hold
    /// one of `authorities`.
    fn require_self_or_authority(
        &self,
        user_id: &str,
        authorities: &[&str],
    ) -> std::result::Result<(), tonic::Status> {
        let principal = self.require_principal()?;
        if principal.user_id == user_id
            || authorities.iter().any(|a| principal.has_authority(a))
        {
            Ok(())
        } else {
            Err(tonic::Status::permission_denied("not authorized"))
        }
    }
}

impl<T> RequestExt for tonic::Request<T> {
    fn principal(&self) -> Option<&Principal> {
        self.extensions().get::<Principal>()
    }
    fn correlation_id(&self) -> Option<&CorrelationId> {
        self.extensions().get::<CorrelationId>()
    }
    fn bearer_token(&self) -> Option<&str> {
        self.extensions().get::<BearerToken>().map(|t| t.0.as_str())
    }
}
