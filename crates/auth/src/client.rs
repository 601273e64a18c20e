use crate::{CorrelationId, Error, Principal, RequestContext, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Outbound credential posture, chosen at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMode {
    /// Attach nothing.
    None,
    /// Reuse the caller's token when present, minting one from the
    /// current Principal otherwise.
    Propagate,
    /// As Propagate, plus re-verify the token before it ever hits the
    /// wire.
    Validate,
}

impl std::str::FromStr for ClientMode {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(Self::None),
            "PROPAGATE" => Ok(Self::Propagate),
            "VALIDATE" => Ok(Self::Validate),
            other => Err(format!(
                "'{other}' is not a client mode (expected NONE, PROPAGATE, or VALIDATE)"
            )),
        }
    }
}

/// Metadata assembled for one outbound call, applied as a tonic
/// interceptor when building the per-call sub-client.
#[derive(Clone, Debug, Default)]
pub struct Metadata(pub tonic::metadata::MetadataMap);

impl Metadata {
    /// Attaches an `Authorization: Bearer $token` to the request.
    pub fn bearer_token(&mut self, token: &str) -> Result<()> {
        self.0.insert(
            "authorization",
            format!("Bearer {}", &token)
                .parse()
                .map_err(Error::InvalidMetadata)?,
        );
        Ok(())
    }

    /// Attaches the correlation-id so the callee joins this request's trace.
    pub fn correlation_id(&mut self, id: &CorrelationId) -> Result<()> {
        self.0.insert(
            "x-correlation-id",
            id.as_str().parse().map_err(Error::InvalidMetadata)?,
        );
        Ok(())
    }
}

impl tonic::service::Interceptor for Metadata {
    fn call(
        &mut self,
        mut request: tonic::Request<()>,
    ) -> std::result::Result<tonic::Request<()>, tonic::Status> {
        for entry in self.0.iter() {
            match entry {
                tonic::metadata::KeyAndValueRef::Ascii(key, value) => {
                    _ = request.metadata_mut().insert(key, value.clone());
                }
                tonic::metadata::KeyAndValueRef::Binary(key, value) => {
                    _ = request.metadata_mut().insert_bin(key, value.clone());
                }
            }
        }
        Ok(request)
    }
}

struct CachedToken {
    token: String,
    iat: u64,
    exp: u64,
}

impl CachedToken {
    // Reuse a minted token only through 90% of its lifetime, keeping a
    // safety margin against skew at the callee.
    fn is_fresh(&self, now_unix: u64) -> bool {
        let lifetime = self.exp.saturating_sub(self.iat).max(1);
        let elapsed = now_unix.saturating_sub(self.iat);
        (elapsed as f64) < (lifetime as f64) * 0.9
    }
}

const MINT_ATTEMPTS: usize = 3;
const MINT_BACKOFF: Duration = Duration::from_millis(100);

/// TokenProvider prepares the outbound metadata of the client chain:
/// correlation-id propagation plus token attachment per [`ClientMode`].
/// Minted tokens are cached per principal.
pub struct TokenProvider {
    codec: Arc<tokens::Codec>,
    mode: ClientMode,
    minted: Mutex<HashMap<String, CachedToken>>,
}

impl TokenProvider {
    pub fn new(codec: Arc<tokens::Codec>, mode: ClientMode) -> Self {
        Self {
            codec,
            mode,
            minted: Mutex::new(HashMap::new()),
        }
    }

    pub fn mode(&self) -> ClientMode {
        self.mode
    }

    /// Build the metadata for one call made within `ctx`.
    pub async fn prepare(&self, ctx: &RequestContext) -> Result<Metadata> {
        let mut metadata = Metadata::default();
        metadata.correlation_id(&ctx.correlation_id)?;

        if self.mode == ClientMode::None {
            return Ok(metadata);
        }

        let token = match (&ctx.token, &ctx.principal) {
            (Some(token), _) => Some(token.clone()),
            (None, Some(principal)) => Some(self.mint(principal).await?),
            // Anonymous background work: nothing to attach.
            (None, None) => None,
        };

        if let Some(token) = token {
            if self.mode == ClientMode::Validate {
                self.codec.verify(&token).map_err(|err| {
                    tracing::warn!(error = %err, "outbound token failed pre-validation");
                    Error::Token(err)
                })?;
            }
            metadata.bearer_token(&token)?;
        }

        Ok(metadata)
    }

    async fn mint(&self, principal: &Principal) -> Result<String> {
        let now = self.codec.clock().unix_seconds();

        if let Some(cached) = self.minted.lock().unwrap().get(&principal.username) {
            if cached.is_fresh(now) {
                return Ok(cached.token.clone());
            }
        }

        let ttl = self.codec.default_ttl();
        let mut attempt = 1;
        let token = loop {
            match self
                .codec
                .issue(
                    &principal.username,
                    Some(&principal.user_id),
                    &principal.authorities,
                    ttl,
                )
            {
                Ok(token) => break token,
                Err(err) if attempt < MINT_ATTEMPTS => {
                    tracing::warn!(attempt, error = %err, "token mint failed, backing off");
                    attempt += 1;
                    tokio::time::sleep(MINT_BACKOFF).await;
                }
                Err(err) => return Err(Error::Token(err)),
            }
        };

        self.minted.lock().unwrap().insert(
            principal.username.clone(),
            CachedToken {
                token: token.clone(),
                iat: now,
                exp: now + ttl.as_secs(),
            },
        );

        Ok(token)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::AccountStatus;
    use tokens::{Codec, Config, ManualClock};

    const TEST_SECRET: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

    fn fixture(mode: ClientMode) -> (TokenProvider, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        let mut config = Config::new(TEST_SECRET, "identity-svc", "commerce");
        config.ttl = Duration::from_secs(100);
        let codec = Arc::new(Codec::new(config, clock.clone()).unwrap());
        (TokenProvider::new(codec, mode), clock)
    }

    fn principal() -> Principal {
        Principal {
            user_id: "id-alice".to_string(),
            username: "alice".to_string(),
            authorities: vec!["ROLE_USER".to_string()],
            status: AccountStatus::Active,
        }
    }

    fn ctx(token: Option<&str>, principal: Option<Principal>) -> RequestContext {
        RequestContext {
            correlation_id: CorrelationId::mint(),
            token: token.map(str::to_string),
            principal,
        }
    }

    fn authorization(metadata: &Metadata) -> Option<String> {
        metadata
            .0
            .get("authorization")
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn propagates_the_callers_token_verbatim() {
        let (provider, _clock) = fixture(ClientMode::Propagate);
        let metadata = provider
            .prepare(&ctx(Some("upstream-token"), Some(principal())))
            .await
            .unwrap();
        assert_eq!(
            authorization(&metadata).unwrap(),
            "Bearer upstream-token"
        );
        assert!(metadata.0.get("x-correlation-id").is_some());
    }

    #[tokio::test]
    async fn mints_and_caches_until_ninety_percent_of_ttl() {
        let (provider, clock) = fixture(ClientMode::Propagate);

        let first = provider.prepare(&ctx(None, Some(principal()))).await.unwrap();
        let second = provider.prepare(&ctx(None, Some(principal()))).await.unwrap();
        assert_eq!(authorization(&first), authorization(&second));

        // Past 90% of the 100s ttl, a fresh token is minted.
        clock.advance(chrono::TimeDelta::seconds(91));
        let third = provider.prepare(&ctx(None, Some(principal()))).await.unwrap();
        assert_ne!(authorization(&first), authorization(&third));
    }

    #[tokio::test]
    async fn validate_mode_rejects_a_bad_token_locally() {
        let (provider, _clock) = fixture(ClientMode::Validate);
        let err = provider
            .prepare(&ctx(Some("garbage"), Some(principal())))
            .await
            .unwrap_err();
        assert_eq!(
            err.into_status().code(),
            tonic::Code::Unauthenticated
        );
    }

    #[tokio::test]
    async fn none_mode_attaches_only_the_correlation_id() {
        let (provider, _clock) = fixture(ClientMode::None);
        let metadata = provider
            .prepare(&ctx(Some("upstream-token"), Some(principal())))
            .await
            .unwrap();
        assert!(authorization(&metadata).is_none());
        assert!(metadata.0.get("x-correlation-id").is_some());
    }

    #[tokio::test]
    async fn anonymous_context_stays_anonymous() {
        let (provider, _clock) = fixture(ClientMode::Propagate);
        let metadata = provider.prepare(&ctx(None, None)).await.unwrap();
        assert!(authorization(&metadata).is_none());
    }
}
