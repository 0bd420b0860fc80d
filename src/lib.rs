//! awsscan - AWS Resource Discovery
//!
//! awsscan inventories billable cloud resources across a single AWS account or every active
//! account of an AWS Organization. For each in-scope (account, region) pair it runs a fixed set
//! of resource counters in parallel, aggregates their counts into category totals and writes one
//! audit record per resource type.
//!
//! # Architecture Overview
//!
//! - **Entry point** ([`app::scanner::service::ScanService`]): single-account and organization
//!   flows sharing session initialization and region resolution
//! - **Credential delegation** ([`app::credentials`]): STS AssumeRole per account and region
//! - **Discovery** ([`app::organizations`]): paginated account listing and the active-account
//!   filter
//! - **Counting** ([`app::counters`]): one descriptor per resource type, executed through the
//!   shared [`app::counters::ResourceCounter`] capability
//! - **Orchestration** ([`app::scanner`]): the nested account/region loop and the per-pair
//!   parallel fan-out with per-counter timeouts
//! - **Output** ([`app::audit_log`], [`app::totals`]): CSV audit records and the totals table
//!
//! ## Key Architectural Patterns
//!
//! - **Trait seams around every AWS API**: each SDK client is wrapped by a small async trait so
//!   the orchestration can be exercised with in-memory fakes
//! - **Explicit shared state**: the run-wide totals live behind a `tokio::sync::Mutex` owned by
//!   the organization scanner and passed by reference into each pair scan
//! - **Error isolation**: counter failures become data in their result, credential failures skip
//!   one pair, only setup failures abort the run

#![warn(clippy::all, rust_2018_idioms)]

// Include logging macros first
#[macro_use]
pub mod logging_macros;

pub mod app;
