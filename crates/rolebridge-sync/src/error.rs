//! Error types for the sync core.

use rolebridge_keycloak::KeycloakError;
use thiserror::Error;

/// Result type alias using `SyncError`.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that abort a reconciliation pass or a live update.
///
/// Expected absences (groups without sync attributes, unknown guilds or
/// roles, chat accounts with no linked directory account) are not errors;
/// they are skipped where they occur.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The identity directory rejected or failed a call.
    #[error("Identity directory error: {0}")]
    Directory(#[from] KeycloakError),

    /// The chat platform rejected or failed a call.
    #[error("Chat platform error: {0}")]
    Platform(String),

    /// A synced group member has no federated chat identity.
    ///
    /// Onboarding links every member before they are placed in a synced
    /// group, so this is a data-integrity violation rather than drift.
    #[error("Group member {username} ({user_id}) has no linked chat identity")]
    MissingFederatedIdentity { user_id: String, username: String },
}

impl SyncError {
    /// Returns true for errors that indicate inconsistent directory data.
    #[must_use]
    pub fn is_integrity_violation(&self) -> bool {
        matches!(self, Self::MissingFederatedIdentity { .. })
    }
}
