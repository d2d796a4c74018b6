use tokio::time::Instant;

pub type CredentialId = u64;

/// The kind of failure a caller observed, driving how `CredentialStore`
/// reacts in `report_failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    RateLimit,
    AuthError,
    Transient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    Active,
    /// Disabled by an `auth_error` or an explicit `set_enabled(false)`. Never
    /// recovered automatically; only `reset()` clears it.
    Disabled,
    Cooling {
        until: Instant,
        reason: FailureKind,
    },
}

impl CredentialState {
    pub fn is_active(self) -> bool {
        matches!(self, CredentialState::Active)
    }

    pub fn cooldown_until(self) -> Option<Instant> {
        match self {
            CredentialState::Cooling { until, .. } => Some(until),
            _ => None,
        }
    }
}
