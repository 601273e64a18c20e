use crate::{AccountStatus, Error, Principal, Result, UserDirectory};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokens::{Claims, Clock};

struct CacheEntry {
    principal: Principal,
    deadline: chrono::DateTime<chrono::Utc>,
}

/// Resolver converts a verified claim set into a Principal, consulting
/// the user directory (when configured) so that disabled or locked
/// accounts are rejected even while their tokens are still unexpired.
///
/// Successful directory resolutions are cached per username with a
/// bounded TTL. Entries past their deadline are discarded on read; there
/// is no invalidation channel.
pub struct Resolver {
    directory: Option<Arc<dyn UserDirectory>>,
    cache: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl Resolver {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

    pub fn new(directory: Option<Arc<dyn UserDirectory>>, clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(directory, clock, Self::DEFAULT_TTL)
    }

    pub fn with_ttl(
        directory: Option<Arc<dyn UserDirectory>>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            directory,
            cache: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// Resolve `claims` into a Principal. Falls back to claims-only
    /// resolution when no directory is configured.
    pub fn resolve(&self, claims: &Claims) -> Result<Principal> {
        let Some(directory) = &self.directory else {
            return Ok(Self::from_claims(claims));
        };

        let now = self.clock.now();

        if let Some(entry) = self.cache.lock().unwrap().get(&claims.sub) {
            if now < entry.deadline {
                return Ok(entry.principal.clone());
            }
        }

        let principal = directory
            .lookup(&claims.sub)
            .ok_or_else(|| Error::UnknownSubject(claims.sub.clone()))?;

        if principal.status != AccountStatus::Active {
            tracing::warn!(username = %claims.sub, status = ?principal.status, "rejecting inactive account");
            return Err(Error::AccountDisabled(claims.sub.clone()));
        }

        self.cache.lock().unwrap().insert(
            claims.sub.clone(),
            CacheEntry {
                principal: principal.clone(),
                deadline: now + self.ttl,
            },
        );

        Ok(principal)
    }

    /// Trust the claims verbatim. Used when no directory is configured.
    fn from_claims(claims: &Claims) -> Principal {
        Principal {
            user_id: claims.uid.clone().unwrap_or_else(|| claims.sub.clone()),
            username: claims.sub.clone(),
            authorities: claims.roles.clone(),
            status: AccountStatus::Active,
        }
    }
}
