mod clock;
mod codec;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{Claims, Codec, Config};

pub use jsonwebtoken::Algorithm;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("token signature verification failed")]
    BadSignature,
    #[error("token is expired")]
    Expired,
    #[error("wrong token issuer")]
    WrongIssuer,
    #[error("wrong token audience")]
    WrongAudience,
    #[error("missing required claim '{0}'")]
    MissingRequiredClaim(&'static str),
    #[error("cannot issue token: {0}")]
    Issuance(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => Error::BadSignature,
            ErrorKind::ExpiredSignature => Error::Expired,
            ErrorKind::InvalidIssuer => Error::WrongIssuer,
            ErrorKind::InvalidAudience => Error::WrongAudience,
            ErrorKind::MissingRequiredClaim(name) => {
                Error::MissingRequiredClaim(match name.as_str() {
                    "sub" => "sub",
                    "iss" => "iss",
                    "aud" => "aud",
                    "exp" => "exp",
                    "iat" => "iat",
                    _ => "unknown",
                })
            }
            _ => Error::Malformed(err.to_string()),
        }
    }
}
