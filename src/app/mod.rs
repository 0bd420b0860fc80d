pub mod audit_log;
pub mod cloudtrail;
pub mod config;
pub mod counters;
pub mod credentials;
pub mod error;
pub mod global_services;
pub mod organizations;
pub mod pagination;
pub mod regions;
pub mod scanner;
pub mod sdk_errors;
pub mod session;
pub mod totals;

pub use config::{ScanConfig, ScanSettings};
pub use error::ScanError;
pub use scanner::service::{ScanResult, ScanService};
