use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::{info, warn};

use crate::recovery::CooldownQueue;
use crate::state::{CredentialId, CredentialState, FailureKind};

/// Consecutive transient failures before a credential is cooled briefly.
const TRANSIENT_COOLDOWN_THRESHOLD: u32 = 3;
const TRANSIENT_COOLDOWN: Duration = Duration::from_secs(10);
const RATE_LIMIT_BASE_COOLDOWN: Duration = Duration::from_secs(1);
const RATE_LIMIT_MAX_COOLDOWN: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, thiserror::Error)]
pub enum AcquireError {
    #[error("no active credentials available for this provider")]
    NoCredentialsAvailable,
}

/// The secret material dispensed by `acquire`. Opaque to the store; adapters
/// read `api_key` when building upstream headers.
#[derive(Debug, Clone)]
pub struct Credential {
    pub id: CredentialId,
    pub api_key: String,
}

#[derive(Debug, Clone, Copy)]
pub struct CredentialStats {
    pub id: CredentialId,
    pub state_label: &'static str,
    pub consecutive_failures: u32,
}

pub(crate) struct Entry {
    pub(crate) secret: String,
    pub(crate) state: CredentialState,
    pub(crate) consecutive_failures: u32,
}

/// The one state map `acquire`/`report_*` and the background recovery task
/// both read and mutate. There is deliberately no second copy: a shadow copy
/// the recovery task writes to but nothing ever reads back from is how a
/// "temporary" cooldown becomes permanent.
pub(crate) struct Inner {
    order: Vec<CredentialId>,
    entries: Vec<(CredentialId, Entry)>,
    next_index: usize,
}

impl Inner {
    fn entry(&self, id: CredentialId) -> Option<&Entry> {
        self.entries.iter().find(|(cid, _)| *cid == id).map(|(_, e)| e)
    }

    pub(crate) fn entry_mut(&mut self, id: CredentialId) -> Option<&mut Entry> {
        self.entries
            .iter_mut()
            .find(|(cid, _)| *cid == id)
            .map(|(_, e)| e)
    }
}

/// One rotating pool of credentials for a single provider.
///
/// Every mutating operation holds `inner` only for the duration of the state
/// transition; `acquire`'s wait path sleeps without the lock held, so no I/O
/// or backoff ever happens under the lock
pub struct CredentialStore {
    provider: String,
    inner: Arc<Mutex<Inner>>,
    queue: Arc<CooldownQueue>,
}

impl CredentialStore {
    pub fn new(provider: impl Into<String>) -> Self {
        let inner = Arc::new(Mutex::new(Inner {
            order: Vec::new(),
            entries: Vec::new(),
            next_index: 0,
        }));
        let queue = Arc::new(CooldownQueue::new());
        queue.clone().spawn_recover_task(inner.clone());
        Self {
            provider: provider.into(),
            inner,
            queue,
        }
    }

    /// Builds a store pre-seeded with `credentials`, all `Active`. For
    /// callers constructing a store from static config before any task
    /// could contend on it, avoiding the `async add` round-trip per key.
    pub fn with_credentials(provider: impl Into<String>, credentials: Vec<(CredentialId, String)>) -> Self {
        let order = credentials.iter().map(|(id, _)| *id).collect();
        let entries = credentials
            .into_iter()
            .map(|(id, secret)| {
                (
                    id,
                    Entry {
                        secret,
                        state: CredentialState::Active,
                        consecutive_failures: 0,
                    },
                )
            })
            .collect();
        let inner = Arc::new(Mutex::new(Inner { order, entries, next_index: 0 }));
        let queue = Arc::new(CooldownQueue::new());
        queue.clone().spawn_recover_task(inner.clone());
        Self {
            provider: provider.into(),
            inner,
            queue,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub async fn add(&self, id: CredentialId, api_key: impl Into<String>) {
        let mut inner = self.inner.lock().await;
        if inner.entry(id).is_some() {
            return;
        }
        inner.order.push(id);
        inner.entries.push((
            id,
            Entry {
                secret: api_key.into(),
                state: CredentialState::Active,
                consecutive_failures: 0,
            },
        ));
    }

    /// Round-robins over `Active` entries starting just after the last
    /// dispensed index. If none are active but some are cooling, either
    /// waits for the earliest cooldown to elapse (`wait = true`) or fails
    /// fast (`wait = false`). Fails with `NoCredentialsAvailable` if every
    /// entry is disabled.
    pub async fn acquire(&self, wait: bool) -> Result<Credential, AcquireError> {
        loop {
            let earliest_cooldown = {
                let mut inner = self.inner.lock().await;
                if let Some(found) = self.find_active_round_robin(&mut inner) {
                    return Ok(found);
                }
                inner
                    .entries
                    .iter()
                    .filter_map(|(_, e)| e.state.cooldown_until())
                    .min()
            };

            match earliest_cooldown {
                Some(deadline) if wait => sleep_until(deadline).await,
                _ => return Err(AcquireError::NoCredentialsAvailable),
            }
        }
    }

    fn find_active_round_robin(&self, inner: &mut Inner) -> Option<Credential> {
        let len = inner.order.len();
        if len == 0 {
            return None;
        }
        for step in 0..len {
            let pos = (inner.next_index + step) % len;
            let id = inner.order[pos];
            if let Some(entry) = inner.entry(id)
                && entry.state.is_active()
            {
                inner.next_index = (pos + 1) % len;
                return Some(Credential {
                    id,
                    api_key: entry.secret.clone(),
                });
            }
        }
        None
    }

    pub async fn report_success(&self, id: CredentialId) {
        let mut inner = self.inner.lock().await;
        if let Some(entry) = inner.entry_mut(id) {
            entry.consecutive_failures = 0;
            entry.state = CredentialState::Active;
        }
    }

    pub async fn report_failure(&self, id: CredentialId, kind: FailureKind) {
        let mut inner = self.inner.lock().await;
        let Some(entry) = inner.entry_mut(id) else {
            return;
        };

        match kind {
            FailureKind::AuthError => {
                warn!(credential_id = id, "auth error, disabling credential");
                entry.state = CredentialState::Disabled;
            }
            FailureKind::RateLimit => {
                entry.consecutive_failures += 1;
                let exp = entry.consecutive_failures.saturating_sub(1).min(10);
                let cooldown = (RATE_LIMIT_BASE_COOLDOWN * 2u32.saturating_pow(exp))
                    .min(RATE_LIMIT_MAX_COOLDOWN);
                let until = Instant::now() + cooldown;
                entry.state = CredentialState::Cooling {
                    until,
                    reason: kind,
                };
                self.queue.push(until, id).await;
                info!(credential_id = id, cooldown_secs = cooldown.as_secs(), "rate limited, cooling credential");
            }
            FailureKind::Transient => {
                entry.consecutive_failures += 1;
                if entry.consecutive_failures >= TRANSIENT_COOLDOWN_THRESHOLD {
                    let until = Instant::now() + TRANSIENT_COOLDOWN;
                    entry.state = CredentialState::Cooling {
                        until,
                        reason: kind,
                    };
                    self.queue.push(until, id).await;
                }
            }
        }
    }

    pub async fn stats(&self) -> Vec<CredentialStats> {
        let inner = self.inner.lock().await;
        inner
            .entries
            .iter()
            .map(|(id, e)| CredentialStats {
                id: *id,
                state_label: match e.state {
                    CredentialState::Active => "active",
                    CredentialState::Disabled => "disabled",
                    CredentialState::Cooling { .. } => "cooling",
                },
                consecutive_failures: e.consecutive_failures,
            })
            .collect()
    }

    /// Clears cooling/disabled state for every credential.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        for (_, entry) in inner.entries.iter_mut() {
            entry.state = CredentialState::Active;
            entry.consecutive_failures = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn round_robins_over_active_credentials() {
        let store = CredentialStore::new("openai");
        store.add(1, "key-1").await;
        store.add(2, "key-2").await;

        let first = store.acquire(false).await.unwrap();
        let second = store.acquire(false).await.unwrap();
        let third = store.acquire(false).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(third.id, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn auth_error_disables_and_skips_credential() {
        let store = CredentialStore::new("openai");
        store.add(1, "key-1").await;
        store.add(2, "key-2").await;

        store.report_failure(1, FailureKind::AuthError).await;
        let acquired = store.acquire(false).await.unwrap();
        assert_eq!(acquired.id, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn all_disabled_fails_fast() {
        let store = CredentialStore::new("openai");
        store.add(1, "key-1").await;
        store.report_failure(1, FailureKind::AuthError).await;
        let err = store.acquire(false).await.unwrap_err();
        assert!(matches!(err, AcquireError::NoCredentialsAvailable));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_below_threshold_stay_active() {
        let store = CredentialStore::new("openai");
        store.add(1, "key-1").await;
        store.report_failure(1, FailureKind::Transient).await;
        store.report_failure(1, FailureKind::Transient).await;
        assert!(store.acquire(false).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn cooling_credential_recovers_once_its_deadline_elapses() {
        let store = CredentialStore::new("openai");
        store.add(1, "key-1").await;
        store.report_failure(1, FailureKind::RateLimit).await;

        assert!(matches!(store.acquire(false).await.unwrap_err(), AcquireError::NoCredentialsAvailable));

        // The background recovery task, not the caller, flips the state
        // back: advance past the cooldown deadline and give it a chance to
        // run without anyone calling `acquire` to nudge it.
        tokio::time::advance(RATE_LIMIT_BASE_COOLDOWN * 2).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let acquired = store.acquire(false).await.unwrap();
        assert_eq!(acquired.id, 1);

        let stats = store.stats().await;
        assert_eq!(stats[0].state_label, "active");
    }
}
