use crate::{Error, Principal};
use std::collections::{HashMap, HashSet};

/// Per-method authorization requirement, evaluated after authentication.
#[derive(Debug, Clone)]
pub enum Policy {
    /// No caller requirements.
    Public,
    /// Any authenticated principal.
    Authenticated,
    /// An authenticated principal holding at least one of these authorities.
    AnyAuthority(&'static [&'static str]),
}

/// Authorization policies keyed by fully-qualified gRPC method path,
/// plus the exclusion list of methods which bypass authentication
/// entirely (public signup, health checks).
///
/// Methods without an explicit entry require an authenticated caller.
#[derive(Debug, Clone, Default)]
pub struct PolicyMap {
    methods: HashMap<String, Policy>,
    excluded: HashSet<String>,
}

// Accept both "pkg.Service/Method" and "/pkg.Service/Method" spellings.
fn normalize(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

impl PolicyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, path: &str, policy: Policy) -> Self {
        self.methods.insert(normalize(path), policy);
        self
    }

    pub fn exclude(mut self, path: &str) -> Self {
        self.excluded.insert(normalize(path));
        self
    }

    pub fn exclude_all<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for path in paths {
            self.excluded.insert(normalize(path.as_ref()));
        }
        self
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded.contains(path)
    }

    pub fn policy_for(&self, path: &str) -> &Policy {
        self.methods.get(path).unwrap_or(&Policy::Authenticated)
    }

    /// Evaluate the method's policy against the (possibly anonymous) caller.
    pub fn authorize(&self, path: &str, principal: Option<&Principal>) -> Result<(), Error> {
        match (self.policy_for(path), principal) {
            (Policy::Public, _) => Ok(()),
            (_, None) => Err(Error::MissingToken),
            (Policy::Authenticated, Some(_)) => Ok(()),
            (Policy::AnyAuthority(required), Some(principal)) => {
                if required.iter().any(|a| principal.has_authority(a)) {
                    Ok(())
                } else {
                    Err(Error::PolicyDenied)
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::AccountStatus;

    fn principal(authorities: &[&str]) -> Principal {
        Principal {
            user_id: "u-1".to_string(),
            username: "alice".to_string(),
            authorities: authorities.iter().map(|s| s.to_string()).collect(),
            status: AccountStatus::Active,
        }
    }

    #[test]
    fn unlisted_methods_require_authentication() {
        let map = PolicyMap::new();
        assert!(map.authorize("/svc/Method", None).is_err());
        assert!(map.authorize("/svc/Method", Some(&principal(&[]))).is_ok());
    }

    #[test]
    fn authority_policies_check_any_of() {
        let map = PolicyMap::new().method(
            "svc/Admin",
            Policy::AnyAuthority(&["ROLE_ADMIN", "ROLE_OPERATOR"]),
        );

        assert!(matches!(
            map.authorize("/svc/Admin", Some(&principal(&["ROLE_USER"]))),
            Err(Error::PolicyDenied)
        ));
        assert!(map
            .authorize("/svc/Admin", Some(&principal(&["ROLE_OPERATOR"])))
            .is_ok());
    }

    #[test]
    fn exclusions_are_tracked_separately() {
        let map = PolicyMap::new().exclude("svc/Health");
        assert!(map.is_excluded("/svc/Health"));
        assert!(!map.is_excluded("/svc/Other"));
    }
}
