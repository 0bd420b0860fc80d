//! AWS SDK error categorization for counter failures.
//!
//! Counter errors never abort a scan; they are recorded in the counter result and logged. The
//! category decides how the failure is reported: permission problems point the operator at the
//! remediation text, transient failures (throttling, timeouts, network issues) are flagged as
//! worth re-running.

use aws_smithy_types::error::display::DisplayErrorContext;

/// Convert an SDK error into an `anyhow::Error` carrying its whole source chain.
/// The bare `SdkError` display is only "service error"; the error code lives in the sources.
pub fn sdk_error<E: std::error::Error>(e: E) -> anyhow::Error {
    anyhow::anyhow!("{}", DisplayErrorContext(&e))
}

/// Categorized error types for AWS SDK errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Request was throttled due to rate limiting
    Throttled,
    /// Request timed out
    Timeout,
    /// Network connectivity issues
    NetworkError,
    /// AWS service temporarily unavailable
    ServiceUnavailable,
    /// Caller lacks a permission or holds invalid credentials
    PermissionDenied,
    /// Anything else (validation, missing resources, ...)
    NonRetryable,
}

impl ErrorCategory {
    /// Returns true if re-running the scan may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Throttled
                | ErrorCategory::Timeout
                | ErrorCategory::NetworkError
                | ErrorCategory::ServiceUnavailable
        )
    }

    pub fn is_permission_error(&self) -> bool {
        *self == ErrorCategory::PermissionDenied
    }

    /// Short label for log lines
    pub fn short_label(&self) -> &'static str {
        match self {
            ErrorCategory::Throttled => "throttled",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::NetworkError => "network",
            ErrorCategory::ServiceUnavailable => "unavailable",
            ErrorCategory::PermissionDenied => "permission",
            ErrorCategory::NonRetryable => "error",
        }
    }
}

/// Categorize an error based on its string representation
///
/// This handles the common patterns seen in AWS SDK error messages, as rendered by
/// `DisplayErrorContext` or an `anyhow` chain (`{:#}`).
pub fn categorize_error_string(error_str: &str) -> ErrorCategory {
    // Throttling errors (most common transient error)
    if error_str.contains("ThrottlingException")
        || error_str.contains("Throttling")
        || error_str.contains("TooManyRequestsException")
        || error_str.contains("RequestLimitExceeded")
        || error_str.contains("RateExceeded")
    {
        return ErrorCategory::Throttled;
    }

    if error_str.contains("TimeoutError")
        || error_str.contains("timeout")
        || error_str.contains("timed out")
    {
        return ErrorCategory::Timeout;
    }

    // Network/dispatch errors
    if error_str.contains("DispatchFailure")
        || error_str.contains("dispatch failure")
        || error_str.contains("connection")
        || error_str.contains("Connection")
        || error_str.contains("DNS")
    {
        return ErrorCategory::NetworkError;
    }

    if error_str.contains("ServiceUnavailable")
        || error_str.contains("InternalServerError")
        || error_str.contains("InternalServerException")
        || error_str.contains("InternalFailure")
    {
        return ErrorCategory::ServiceUnavailable;
    }

    if error_str.contains("AccessDenied")
        || error_str.contains("UnauthorizedOperation")
        || error_str.contains("UnauthorizedAccess")
        || error_str.contains("AuthFailure")
        || error_str.contains("InvalidClientTokenId")
        || error_str.contains("ExpiredToken")
        || error_str.contains("not authorized")
    {
        return ErrorCategory::PermissionDenied;
    }

    ErrorCategory::NonRetryable
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_throttling() {
        let cat = categorize_error_string("ThrottlingException: Rate exceeded");
        assert_eq!(cat, ErrorCategory::Throttled);
        assert!(cat.is_retryable());
    }

    #[test]
    fn test_categorize_timeout() {
        let cat = categorize_error_string("counter timed out after 300s");
        assert_eq!(cat, ErrorCategory::Timeout);
        assert_eq!(cat.short_label(), "timeout");
    }

    #[test]
    fn test_categorize_network_error() {
        let cat = categorize_error_string("dispatch failure: connection refused");
        assert_eq!(cat, ErrorCategory::NetworkError);
        assert!(cat.is_retryable());
    }

    #[test]
    fn test_categorize_access_denied() {
        let cat = categorize_error_string(
            "AccessDeniedException: User is not authorized to perform ecr:DescribeRepositories",
        );
        assert!(cat.is_permission_error());
        assert!(!cat.is_retryable());
        assert_eq!(cat.short_label(), "permission");
    }

    #[test]
    fn test_categorize_generic_error() {
        let cat = categorize_error_string("ValidationException: Invalid type name");
        assert_eq!(cat, ErrorCategory::NonRetryable);
        assert!(!cat.is_permission_error());
        assert_eq!(cat.short_label(), "error");
    }
}
