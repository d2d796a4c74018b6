//! A rotating, health-tracked pool of API credentials for a single provider.

mod recovery;
mod state;
mod store;

pub use state::{CredentialId, CredentialState, FailureKind};
pub use store::{AcquireError, Credential, CredentialStats, CredentialStore};
