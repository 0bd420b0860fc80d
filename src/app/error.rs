//! Failure taxonomy surfaced by the scan service.
//!
//! Setup failures abort the run. Credential failures for one account/region pair are reported
//! with [`ScanError::AssumeRole`] and only skip that pair; counter failures never become a
//! `ScanError`, they are carried inside the counter result.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// Session initialization produced a configuration without a region
    #[error("failed to initialize AWS session: empty region")]
    EmptyRegion,

    /// The ambient SDK configuration could not be loaded
    #[error("failed to initialize AWS session: {0}")]
    SessionInit(String),

    /// The role given with `--role-arn` could not be assumed at startup
    #[error("failed to assume initial role {role_arn}: {message}")]
    InitialRole { role_arn: String, message: String },

    /// STS refused delegated credentials for one account/region pair
    #[error("failed to assume role {role_arn}: {message}")]
    AssumeRole { role_arn: String, message: String },

    /// Enabled regions could not be listed
    #[error("failed to get regions: {0}")]
    RegionLookup(String),

    #[error("a single-account scan requires an account id")]
    MissingAccountId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assume_role_message_names_role() {
        let err = ScanError::AssumeRole {
            role_arn: "arn:aws:iam::111111111111:role/resource-discovery-role".to_string(),
            message: "AccessDenied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to assume role arn:aws:iam::111111111111:role/resource-discovery-role: AccessDenied"
        );
    }

    #[test]
    fn test_initial_role_message_is_distinct() {
        let err = ScanError::InitialRole {
            role_arn: "arn:aws:iam::999999999999:role/scanner".to_string(),
            message: "ExpiredToken".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to assume initial role arn:aws:iam::999999999999:role/scanner: ExpiredToken"
        );
    }
}
