//! The nested account/region loop.

use super::resource_scanner::ResourceScanner;
use crate::app::audit_log::ScanLog;
use crate::app::credentials::CredentialSource;
use crate::app::organizations::Account;
use crate::app::totals::{ResourceTotals, ScanSummary};
use colored::Colorize;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Prints `done / total` on a single terminal line
struct ProgressReporter {
    done: usize,
    total: usize,
    enabled: bool,
}

impl ProgressReporter {
    fn new(accounts: usize, regions: usize, enabled: bool) -> Self {
        Self {
            done: 0,
            total: accounts * regions,
            enabled,
        }
    }

    fn advance(&mut self) {
        self.done += 1;
        if !self.enabled {
            return;
        }
        print!(
            "{} {} / {} ...\r",
            "AWS Resource Discovery Scan Progress:".cyan(),
            self.done,
            self.total
        );
        if let Err(e) = std::io::stdout().flush() {
            tracing::debug!("Failed to flush progress line: {}", e);
        }
    }
}

/// Scans every (account, region) pair, accounts outer and regions inner.
pub struct OrgScanner {
    credentials: Arc<dyn CredentialSource>,
    resource_scanner: ResourceScanner,
    log: Arc<dyn ScanLog>,
    totals: Mutex<ResourceTotals>,
    show_progress: bool,
}

impl OrgScanner {
    pub fn new(
        credentials: Arc<dyn CredentialSource>,
        resource_scanner: ResourceScanner,
        log: Arc<dyn ScanLog>,
    ) -> Self {
        Self {
            credentials,
            resource_scanner,
            log,
            totals: Mutex::new(ResourceTotals::default()),
            show_progress: true,
        }
    }

    /// Disable the stdout progress line and summary
    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Scan all pairs sequentially and return the aggregated summary.
    ///
    /// A pair whose credentials cannot be obtained is logged and skipped; every other pair still
    /// runs and contributes to the totals.
    pub async fn run(&self, accounts: &[Account], regions: &[String]) -> ScanSummary {
        let mut progress = ProgressReporter::new(accounts.len(), regions.len(), self.show_progress);
        let mut pairs_scanned = 0;
        let mut pairs_skipped = 0;

        for account in accounts {
            for region in regions {
                match self.credentials.credentials_for(&account.id, region).await {
                    Ok(credentials) => {
                        self.resource_scanner
                            .scan_resources(&account.id, region, Some(&credentials), &self.totals)
                            .await;
                        pairs_scanned += 1;
                    }
                    Err(e) => {
                        scan_warn!(account.id, region, "Skipping pair: {}", e);
                        let message = format!(
                            "Failed to get credentials for account {} in region {}: {}",
                            account.id, region, e
                        );
                        if let Err(e) = self.log.log_message(&message) {
                            tracing::warn!("Failed to write audit log message: {:#}", e);
                        }
                        pairs_skipped += 1;
                    }
                }
                progress.advance();
            }
        }

        let summary = ScanSummary {
            accounts: accounts.len(),
            pairs_scanned,
            pairs_skipped,
            totals: self.totals.lock().await.clone(),
        };

        trace_info!(
            "Scan finished: {} pairs scanned, {} skipped, {} resources",
            summary.pairs_scanned,
            summary.pairs_skipped,
            summary.totals.total()
        );

        if self.show_progress {
            println!("\n{}\n", summary.headline().as_str().bold());
            println!("{}", summary.totals.to_table());
        }

        summary
    }
}
