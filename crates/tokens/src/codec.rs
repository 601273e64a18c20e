use crate::{Clock, Error, Result};
use base64::Engine;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;
use std::time::Duration;

/// Claims carried by every access token issued by this process.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    /// Subject: the authenticated username. Never empty.
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub iss: String,
    #[serde(default)]
    pub aud: String,
    /// Issued-at, in whole seconds since the unix epoch.
    #[serde(default)]
    pub iat: u64,
    /// Expiry, in whole seconds since the unix epoch. Strictly greater than `iat`.
    #[serde(default)]
    pub exp: u64,
    /// Granted role strings. Absent on the wire means empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    /// Private claim: the subject's stable user id, for callees without
    /// directory access. Falls back to `sub` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// Unique token id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl Claims {
    pub fn expires_at(&self) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::from_timestamp(self.exp as i64, 0).unwrap_or_default()
    }

    /// Fraction of the token lifetime which has elapsed at `now`,
    /// where 0.0 is freshly issued and 1.0 is expired.
    pub fn elapsed_lifetime(&self, now_unix: u64) -> f64 {
        let lifetime = self.exp.saturating_sub(self.iat).max(1);
        let elapsed = now_unix.saturating_sub(self.iat);
        elapsed as f64 / lifetime as f64
    }
}

/// Codec configuration. `secret` is the base64 encoding of a symmetric
/// key of at least 256 bits, shared by every process of the deployment.
#[derive(Debug, Clone)]
pub struct Config {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    /// Lifetime of issued tokens.
    pub ttl: Duration,
    pub algorithm: Algorithm,
    /// Tolerated clock skew when comparing `exp`. Zero unless explicitly configured.
    pub leeway: Duration,
}

impl Config {
    pub fn new(secret: impl Into<String>, issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl: Duration::from_millis(86_400_000),
            algorithm: Algorithm::HS512,
            leeway: Duration::ZERO,
        }
    }
}

/// Codec signs and verifies access tokens. It's a pure function over
/// (key, token, clock) and is cheap to share across request handlers.
pub struct Codec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
    algorithm: Algorithm,
    leeway: Duration,
    clock: Arc<dyn Clock>,
}

impl Codec {
    pub fn new(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let key = base64::engine::general_purpose::STANDARD
            .decode(&config.secret)
            .map_err(|err| Error::Issuance(format!("secret is not valid base64: {err}")))?;

        if key.len() < 32 {
            return Err(Error::Issuance(format!(
                "secret must be at least 256 bits, got {}",
                key.len() * 8
            )));
        }
        if config.issuer.is_empty() {
            return Err(Error::Issuance("issuer must not be empty".to_string()));
        }
        if config.audience.is_empty() {
            return Err(Error::Issuance("audience must not be empty".to_string()));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(&key),
            decoding_key: DecodingKey::from_secret(&key),
            issuer: config.issuer,
            audience: config.audience,
            ttl: config.ttl,
            algorithm: config.algorithm,
            leeway: config.leeway,
            clock,
        })
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn default_ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token for `subject` carrying `roles`, valid for `ttl` from
    /// now. `user_id` rides along as a private claim when known.
    pub fn issue(
        &self,
        subject: &str,
        user_id: Option<&str>,
        roles: &[String],
        ttl: Duration,
    ) -> Result<String> {
        if subject.is_empty() {
            return Err(Error::Issuance("subject must not be empty".to_string()));
        }
        if ttl.as_secs() == 0 {
            return Err(Error::Issuance("ttl must be at least one second".to_string()));
        }
        let iat = self.clock.unix_seconds();

        let claims = Claims {
            sub: subject.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat,
            exp: iat + ttl.as_secs(),
            roles: roles.to_vec(),
            uid: user_id.map(str::to_string),
            jti: Some(uuid::Uuid::new_v4().to_string()),
        };

        jsonwebtoken::encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|err| Error::Issuance(err.to_string()))
    }

    /// Verify structure, signature, issuer, audience, and expiry, in that
    /// order. Expiry is strict: a token with `exp == now` is already dead.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(self.algorithm);
        // Expiry is compared against the injected clock below, not the
        // verification library's notion of wall time.
        validation.validate_exp = false;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)?;
        let claims = data.claims;

        if claims.sub.is_empty() {
            return Err(Error::MissingRequiredClaim("sub"));
        }
        if claims.iat == 0 {
            return Err(Error::MissingRequiredClaim("iat"));
        }
        if claims.exp == 0 {
            return Err(Error::MissingRequiredClaim("exp"));
        }
        if self.clock.unix_seconds() >= claims.exp + self.leeway.as_secs() {
            return Err(Error::Expired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ManualClock;
    use pretty_assertions::assert_eq;

    // 256 bits of zeroes, base64.
    const TEST_SECRET: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

    fn fixture() -> (Codec, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        let codec = Codec::new(
            Config::new(TEST_SECRET, "identity-svc", "commerce"),
            clock.clone(),
        )
        .unwrap();
        (codec, clock)
    }

    #[test]
    fn round_trip_preserves_claims() {
        let (codec, _clock) = fixture();
        let roles = vec!["ROLE_USER".to_string(), "ROLE_ADMIN".to_string()];

        let token = codec
            .issue("alice", Some("id-alice"), &roles, Duration::from_secs(60))
            .unwrap();
        let claims = codec.verify(&token).unwrap();

        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.iss, "identity-svc");
        assert_eq!(claims.aud, "commerce");
        assert_eq!(claims.roles, roles);
        assert_eq!(claims.exp, claims.iat + 60);
        assert!(claims.jti.is_some());
    }

    #[test]
    fn expiry_is_strict() {
        let (codec, clock) = fixture();
        let token = codec.issue("alice", None, &[], Duration::from_secs(60)).unwrap();

        clock.advance(chrono::TimeDelta::seconds(59));
        assert!(codec.verify(&token).is_ok());

        // exp == now is already expired.
        clock.advance(chrono::TimeDelta::seconds(1));
        assert!(matches!(codec.verify(&token), Err(Error::Expired)));
    }

    #[test]
    fn leeway_tolerates_configured_skew() {
        let clock = Arc::new(ManualClock::new(
            chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        let mut config = Config::new(TEST_SECRET, "identity-svc", "commerce");
        config.leeway = Duration::from_secs(30);
        let codec = Codec::new(config, clock.clone()).unwrap();

        let token = codec.issue("alice", None, &[], Duration::from_secs(60)).unwrap();

        clock.advance(chrono::TimeDelta::seconds(89));
        assert!(codec.verify(&token).is_ok());
        clock.advance(chrono::TimeDelta::seconds(1));
        assert!(matches!(codec.verify(&token), Err(Error::Expired)));
    }

    #[test]
    fn wrong_issuer_and_audience_are_distinct() {
        let (codec, _clock) = fixture();
        let clock = Arc::new(ManualClock::new(
            chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));

        let other = Codec::new(
            Config::new(TEST_SECRET, "not-identity-svc", "commerce"),
            clock.clone(),
        )
        .unwrap();
        let token = other.issue("alice", None, &[], Duration::from_secs(60)).unwrap();
        assert!(matches!(codec.verify(&token), Err(Error::WrongIssuer)));

        let other = Codec::new(
            Config::new(TEST_SECRET, "identity-svc", "not-commerce"),
            clock,
        )
        .unwrap();
        let token = other.issue("alice", None, &[], Duration::from_secs(60)).unwrap();
        assert!(matches!(codec.verify(&token), Err(Error::WrongAudience)));
    }

    #[test]
    fn foreign_key_is_a_bad_signature() {
        let (codec, _clock) = fixture();
        let clock = Arc::new(ManualClock::new(
            chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));

        // Same claims, signed under a different key.
        let other_secret = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAE=";
        let other = Codec::new(
            Config::new(other_secret, "identity-svc", "commerce"),
            clock,
        )
        .unwrap();
        let token = other.issue("alice", None, &[], Duration::from_secs(60)).unwrap();

        assert!(matches!(codec.verify(&token), Err(Error::BadSignature)));
    }

    #[test]
    fn garbage_is_malformed() {
        let (codec, _clock) = fixture();
        assert!(matches!(
            codec.verify("not-a-token"),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn missing_subject_is_rejected() {
        let (codec, clock) = fixture();

        #[derive(serde::Serialize)]
        struct Partial {
            iss: &'static str,
            aud: &'static str,
            iat: u64,
            exp: u64,
        }
        let key = base64::engine::general_purpose::STANDARD
            .decode(TEST_SECRET)
            .unwrap();
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS512),
            &Partial {
                iss: "identity-svc",
                aud: "commerce",
                iat: clock.unix_seconds(),
                exp: clock.unix_seconds() + 60,
            },
            &EncodingKey::from_secret(&key),
        )
        .unwrap();

        assert!(matches!(
            codec.verify(&token),
            Err(Error::MissingRequiredClaim("sub"))
        ));
    }

    #[test]
    fn unusable_key_fails_issuance() {
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));

        // Too short: 128 bits.
        let short = base64::engine::general_purpose::STANDARD.encode([0u8; 16]);
        assert!(matches!(
            Codec::new(Config::new(short, "iss", "aud"), clock.clone()),
            Err(Error::Issuance(_))
        ));
        assert!(matches!(
            Codec::new(Config::new("!!!", "iss", "aud"), clock),
            Err(Error::Issuance(_))
        ));
    }

    #[test]
    fn zero_ttl_fails_issuance() {
        let (codec, _clock) = fixture();
        assert!(matches!(
            codec.issue("alice", None, &[], Duration::ZERO),
            Err(Error::Issuance(_))
        ));
    }
}
