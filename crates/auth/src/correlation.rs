/// A short opaque identifier threaded through an entire request tree.
/// Forwarded verbatim when present upstream, freshly minted otherwise.
/// Not authoritative for anything security-related.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(String);

/// Inbound values longer than this are discarded and re-minted.
const MAX_LEN: usize = 128;

impl CorrelationId {
    pub fn mint() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Adopt an upstream value, if it's a plausible id.
    pub fn parse(value: &str) -> Option<Self> {
        if value.is_empty() || value.len() > MAX_LEN {
            return None;
        }
        if !value.bytes().all(|b| (b' '..=b'~').contains(&b)) {
            return None;
        }
        Some(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::mint()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
