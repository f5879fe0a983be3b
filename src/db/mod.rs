//! Database layer (Firestore).

pub mod store;

pub use store::CredentialDb;

/// Document ID of the single stored credential.
pub const CREDENTIAL_DOC_ID: &str = "schwab";

/// Collection names as constants.
pub mod collections {
    pub const AUTH_TOKENS: &str = "auth_tokens";
}
