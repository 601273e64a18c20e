/// Stored account standing, as reported by the user directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Active,
    Disabled,
    Locked,
}

/// The server-side identity active for the duration of one RPC.
///
/// Principals are values: every request resolves (or clones) its own, and
/// none is ever shared by reference across in-flight calls.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub user_id: String,
    pub username: String,
    /// Granted role strings, in grant order.
    pub authorities: Vec<String>,
    pub status: AccountStatus,
}

impl Principal {
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a == authority)
    }
}

/// Collaborator consulted to enrich a verified claim set with the current
/// stored identity. Implemented by the identity service's user store.
pub trait UserDirectory: Send + Sync + 'static {
    /// Look up the current Principal for `username`, or None if unknown.
    /// The returned status reflects the store at lookup time.
    fn lookup(&self, username: &str) -> Option<Principal>;
}
