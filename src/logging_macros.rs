#![warn(clippy::all, rust_2018_idioms)]

/// Tracing macros with file and line context.
/// Use these for messages that are not tied to a single account/region pair.
#[macro_export]
macro_rules! trace_debug {
    ($($arg:tt)*) => {
        tracing::debug!("[{}:{}] {}", file!(), line!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! trace_info {
    ($($arg:tt)*) => {
        tracing::info!("[{}:{}] {}", file!(), line!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! trace_warn {
    ($($arg:tt)*) => {
        tracing::warn!("[{}:{}] {}", file!(), line!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! trace_error {
    ($($arg:tt)*) => {
        tracing::error!("[{}:{}] {}", file!(), line!(), format!($($arg)*));
    };
}

/// Scan-scoped tracing macros.
/// The first two arguments are the account id and region of the pair being scanned; they are
/// recorded as structured `account` and `region` fields so a single pair can be filtered out of
/// the log file.
#[macro_export]
macro_rules! scan_debug {
    ($account:expr, $region:expr, $($arg:tt)*) => {
        tracing::debug!(account = %$account, region = %$region, "[{}:{}] {}", file!(), line!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! scan_info {
    ($account:expr, $region:expr, $($arg:tt)*) => {
        tracing::info!(account = %$account, region = %$region, "[{}:{}] {}", file!(), line!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! scan_warn {
    ($account:expr, $region:expr, $($arg:tt)*) => {
        tracing::warn!(account = %$account, region = %$region, "[{}:{}] {}", file!(), line!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! scan_error {
    ($account:expr, $region:expr, $($arg:tt)*) => {
        tracing::error!(account = %$account, region = %$region, "[{}:{}] {}", file!(), line!(), format!($($arg)*));
    };
}
