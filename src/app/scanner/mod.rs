//! Scan orchestration.
//!
//! [`service::ScanService`] prepares a run (session, regions, accounts), [`org_scanner::OrgScanner`]
//! walks every account/region pair in order and [`resource_scanner::ResourceScanner`] fans the
//! counters of one pair out over tokio tasks.

pub mod org_scanner;
pub mod resource_scanner;
pub mod service;

use std::time::Duration;

/// Final line printed after a run
pub fn completion_message(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let minutes = secs / 60;
    let seconds = secs % 60;
    if minutes > 0 {
        format!(
            "\nScan completed in {} minutes {} seconds.",
            minutes, seconds
        )
    } else {
        format!("\nScan completed in {} seconds.", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_message() {
        assert_eq!(
            completion_message(Duration::from_secs(42)),
            "\nScan completed in 42 seconds."
        );
        assert_eq!(
            completion_message(Duration::from_millis(185_900)),
            "\nScan completed in 3 minutes 5 seconds."
        );
    }
}
