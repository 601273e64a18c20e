use auth::{AccountStatus, Principal, UserDirectory};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokens::Clock;

/// Consecutive failed logins after which an account both locks and stops
/// being eligible for orders.
pub const MAX_FAILED_LOGINS: u32 = 5;
/// How long a lockout lasts.
pub const LOCKOUT: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone)]
pub struct User {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub is_email_verified: bool,
    pub failed_login_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub roles: Vec<String>,
    /// Monotonic counter for optimistic concurrency control.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// The eligibility predicate consulted before an order may be placed.
    pub fn is_valid_for_order(&self) -> bool {
        self.is_active && self.is_email_verified && self.failed_login_attempts < MAX_FAILED_LOGINS
    }

    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }

    pub fn account_status(&self, now: DateTime<Utc>) -> AccountStatus {
        if !self.is_active {
            AccountStatus::Disabled
        } else if self.is_locked(now) {
            AccountStatus::Locked
        } else {
            AccountStatus::Active
        }
    }

    pub fn profile(&self) -> proto_commerce::identity::UserProfile {
        proto_commerce::identity::UserProfile {
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone: self.phone.clone(),
            is_active: self.is_active,
            is_email_verified: self.is_email_verified,
            created_at_unix_ms: self.created_at.timestamp_millis(),
            updated_at_unix_ms: self.updated_at.timestamp_millis(),
        }
    }
}

/// Fields of a signup, already validated and with the password hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("user not found")]
    NotFound,
    #[error("username or email is already taken")]
    AlreadyExists,
    #[error("stale version")]
    VersionConflict,
}

#[derive(Default)]
struct Inner {
    users: HashMap<String, User>,
    by_username: HashMap<String, String>,
    by_email: HashMap<String, String>,
}

/// In-process user store, unique on username and email, with optimistic
/// versioning on writes.
pub struct UserStore {
    clock: Arc<dyn Clock>,
    inner: RwLock<Inner>,
}

impl UserStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn insert(&self, new: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.write().unwrap();

        if inner.by_username.contains_key(&new.username) || inner.by_email.contains_key(&new.email)
        {
            return Err(StoreError::AlreadyExists);
        }

        let now = self.clock.now();
        let user = User {
            user_id: uuid::Uuid::new_v4().to_string(),
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            first_name: new.first_name,
            last_name: new.last_name,
            phone: new.phone,
            is_active: true,
            is_email_verified: false,
            failed_login_attempts: 0,
            locked_until: None,
            roles: vec!["ROLE_USER".to_string()],
            version: 0,
            created_at: now,
            updated_at: now,
        };

        inner
            .by_username
            .insert(user.username.clone(), user.user_id.clone());
        inner
            .by_email
            .insert(user.email.clone(), user.user_id.clone());
        inner.users.insert(user.user_id.clone(), user.clone());

        Ok(user)
    }

    pub fn get(&self, user_id: &str) -> Option<User> {
        self.inner.read().unwrap().users.get(user_id).cloned()
    }

    pub fn get_by_username(&self, username: &str) -> Option<User> {
        let inner = self.inner.read().unwrap();
        let user_id = inner.by_username.get(username)?;
        inner.users.get(user_id).cloned()
    }

    /// Save `user`, requiring that its version still matches the stored
    /// one. Username and email are immutable once assigned.
    pub fn save(&self, mut user: User) -> Result<User, StoreError> {
        let mut inner = self.inner.write().unwrap();

        let stored = inner.users.get(&user.user_id).ok_or(StoreError::NotFound)?;
        if stored.version != user.version {
            return Err(StoreError::VersionConflict);
        }

        user.version += 1;
        user.updated_at = self.clock.now();
        inner.users.insert(user.user_id.clone(), user.clone());

        Ok(user)
    }
}

impl UserDirectory for UserStore {
    fn lookup(&self, username: &str) -> Option<Principal> {
        let user = self.get_by_username(username)?;
        Some(Principal {
            user_id: user.user_id.clone(),
            username: user.username.clone(),
            authorities: user.roles.clone(),
            status: user.account_status(self.clock.now()),
        })
    }
}
