use auth::{RequestContext, TokenProvider};
use chrono::{DateTime, Utc};
use fabric::Peer;
use proto_commerce::identity::ValidateUserRequest;
use proto_grpc::identity::identity_service_client::IdentityServiceClient;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokens::Clock;

/// Validation-cache TTLs. The long TTL applies to writes on the order
/// creation path, the short one to plain read-through lookups.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub post_create_ttl: Duration,
    pub post_lookup_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            post_create_ttl: Duration::from_secs(24 * 60 * 60),
            post_lookup_ttl: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("validation cache store is unavailable")]
pub struct CacheUnavailable;

#[derive(Debug, Clone, Copy)]
pub struct CacheEntry {
    pub valid: bool,
    /// Entries whose deadline has passed are treated as absent.
    pub deadline: DateTime<Utc>,
}

/// Backing store of the validation cache. Failures are non-fatal to the
/// caller: reads fall through to the authoritative lookup and writes are
/// dropped with a warning.
pub trait CacheStore: Send + Sync + 'static {
    fn get(&self, user_id: &str) -> Result<Option<CacheEntry>, CacheUnavailable>;
    fn put(&self, user_id: &str, entry: CacheEntry) -> Result<(), CacheUnavailable>;
}

#[derive(Default)]
pub struct InMemoryCacheStore(Mutex<HashMap<String, CacheEntry>>);

impl CacheStore for InMemoryCacheStore {
    fn get(&self, user_id: &str) -> Result<Option<CacheEntry>, CacheUnavailable> {
        Ok(self.0.lock().unwrap().get(user_id).copied())
    }

    fn put(&self, user_id: &str, entry: CacheEntry) -> Result<(), CacheUnavailable> {
        self.0.lock().unwrap().insert(user_id.to_string(), entry);
        Ok(())
    }
}

/// Read-through, TTL'd check of whether a user may place orders,
/// amortizing calls to the identity service. Eventually consistent: a
/// user whose standing changed inside the TTL may still be answered
/// from cache.
pub struct UserValidator {
    peer: Arc<Peer>,
    tokens: Arc<TokenProvider>,
    cache: Arc<dyn CacheStore>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    /// Deadline of each ValidateUser RPC.
    validate_deadline: Duration,
}

impl UserValidator {
    pub fn new(
        peer: Arc<Peer>,
        tokens: Arc<TokenProvider>,
        cache: Arc<dyn CacheStore>,
        config: CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            peer,
            tokens,
            cache,
            config,
            clock,
            validate_deadline: Duration::from_secs(2),
        }
    }

    /// Check used by the order saga at creation time; an authoritative
    /// answer on this path is cached with the long post-creation TTL.
    pub async fn validate_for_order(
        &self,
        ctx: &RequestContext,
        user_id: &str,
    ) -> fabric::Result<bool> {
        self.check(ctx, user_id, self.config.post_create_ttl).await
    }

    /// Plain read-through check, cached with the short post-lookup TTL.
    pub async fn is_valid_for_order(
        &self,
        ctx: &RequestContext,
        user_id: &str,
    ) -> fabric::Result<bool> {
        self.check(ctx, user_id, self.config.post_lookup_ttl).await
    }

    async fn check(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        ttl: Duration,
    ) -> fabric::Result<bool> {
        let now = self.clock.now();

        match self.cache.get(user_id) {
            Ok(Some(entry)) if now < entry.deadline => {
                tracing::debug!(user_id, valid = entry.valid, "validation cache hit");
                return Ok(entry.valid);
            }
            Ok(_) => (),
            Err(err) => {
                tracing::warn!(error = %err, "validation cache read failed, falling through")
            }
        }

        let valid = self.lookup(ctx, user_id).await?;

        let entry = CacheEntry {
            valid,
            deadline: now + ttl,
        };
        if let Err(err) = self.cache.put(user_id, entry) {
            tracing::warn!(error = %err, "validation cache write failed");
        }

        Ok(valid)
    }

    /// The authoritative lookup: one guarded ValidateUser RPC.
    async fn lookup(&self, ctx: &RequestContext, user_id: &str) -> fabric::Result<bool> {
        let metadata = self
            .tokens
            .prepare(ctx)
            .await
            .map_err(|err| fabric::Error::Grpc(err.into_status()))?;

        let deadline = self.validate_deadline;
        let max_bytes = self.peer.max_message_bytes();
        let user_id = user_id.to_string();

        self.peer
            .call(true, move |channel| {
                let metadata = metadata.clone();
                let user_id = user_id.clone();
                async move {
                    let mut client = IdentityServiceClient::with_interceptor(channel, metadata)
                        .max_decoding_message_size(max_bytes);
                    let mut request = tonic::Request::new(ValidateUserRequest { user_id });
                    request.set_timeout(deadline);
                    Ok(client.validate_user(request).await?.into_inner().valid)
                }
            })
            .await
    }
}
