use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tokio::time::{Instant, sleep_until};
use tracing::debug;

use crate::state::{CredentialId, CredentialState};
use crate::store::Inner;

/// Background recovery of cooling credentials back to `Active`, once their
/// deadline passes, independent of whether anyone calls `acquire()` in the
/// meantime.
pub struct CooldownQueue {
    heap: Mutex<BinaryHeap<Reverse<(Instant, CredentialId)>>>,
    notify: Notify,
}

impl CooldownQueue {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
        }
    }

    pub async fn push(&self, until: Instant, id: CredentialId) {
        self.heap.lock().await.push(Reverse((until, id)));
        self.notify.notify_one();
    }

    /// Recovers directly into the same `Inner` that `acquire`/`report_*`
    /// read and mutate — there is only one state map, never a shadow copy.
    pub fn spawn_recover_task(self: Arc<Self>, inner: Arc<Mutex<Inner>>) {
        tokio::spawn(async move {
            loop {
                let next = {
                    let heap = self.heap.lock().await;
                    heap.peek().map(|Reverse((t, id))| (*t, *id))
                };

                match next {
                    None => {
                        self.notify.notified().await;
                        continue;
                    }
                    Some((deadline, _)) => sleep_until(deadline).await,
                }

                let now = Instant::now();
                let mut due = Vec::new();
                {
                    let mut heap = self.heap.lock().await;
                    while let Some(Reverse((t, id))) = heap.peek().copied()
                        && t <= now
                    {
                        heap.pop();
                        due.push(id);
                    }
                }
                if due.is_empty() {
                    continue;
                }

                let mut guard = inner.lock().await;
                for id in due {
                    if let Some(entry) = guard.entry_mut(id) {
                        let should_recover = matches!(
                            entry.state,
                            CredentialState::Cooling { until, .. } if until <= now
                        );
                        if should_recover {
                            debug!(credential_id = id, "credential cooldown elapsed, recovering");
                            entry.state = CredentialState::Active;
                        }
                    }
                }
            }
        });
    }
}
