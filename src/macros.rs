//! Emission macros for ergonomic log routing.
//!
//! These macros build a tagged [`LogRecord`](crate::core::LogRecord) with
//! automatic string formatting and hand it to a
//! [`Dispatcher`](crate::core::Dispatcher), similar to `println!` and
//! `format!`.
//!
//! # Examples
//!
//! ```no_run
//! use log_router_system::prelude::*;
//! use log_router_system::info;
//! use std::sync::Arc;
//!
//! # #[tokio::main] async fn main() {
//! let hub = Arc::new(ChannelHub::new());
//! hub.create("default").unwrap();
//! let dispatcher = Dispatcher::new(hub);
//!
//! // Basic emission
//! info!(dispatcher, "default", "web", "startup", "Server started");
//!
//! // With format arguments
//! let port = 8080;
//! info!(dispatcher, "default", "web", "startup", "Listening on port {}", port);
//! # }
//! ```

/// Emit a record at an explicit severity.
///
/// # Examples
///
/// ```no_run
/// # use log_router_system::prelude::*;
/// # use std::sync::Arc;
/// # #[tokio::main] async fn main() {
/// # let hub = Arc::new(ChannelHub::new());
/// # let dispatcher = Dispatcher::new(hub);
/// use log_router_system::log;
/// log!(dispatcher, "default", "web", "auth", Severity::Info, "Simple message");
/// log!(dispatcher, "default", "web", "auth", Severity::Error, "Error code: {}", 500);
/// # }
/// ```
#[macro_export]
macro_rules! log {
    ($dispatcher:expr, $channel:expr, $application:expr, $module:expr, $severity:expr, $($arg:tt)+) => {
        $dispatcher.dispatch(
            $channel,
            &$crate::core::LogRecord::new($severity, $application, $module, format!($($arg)+)),
        )
    };
}

/// Emit a debug-severity record.
#[macro_export]
macro_rules! debug {
    ($dispatcher:expr, $channel:expr, $application:expr, $module:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $channel, $application, $module, $crate::core::Severity::Debug, $($arg)+)
    };
}

/// Emit an info-severity record.
#[macro_export]
macro_rules! info {
    ($dispatcher:expr, $channel:expr, $application:expr, $module:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $channel, $application, $module, $crate::core::Severity::Info, $($arg)+)
    };
}

/// Emit a notice-severity record.
#[macro_export]
macro_rules! notice {
    ($dispatcher:expr, $channel:expr, $application:expr, $module:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $channel, $application, $module, $crate::core::Severity::Notice, $($arg)+)
    };
}

/// Emit a warning-severity record.
#[macro_export]
macro_rules! warning {
    ($dispatcher:expr, $channel:expr, $application:expr, $module:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $channel, $application, $module, $crate::core::Severity::Warning, $($arg)+)
    };
}

/// Emit an error-severity record.
#[macro_export]
macro_rules! error {
    ($dispatcher:expr, $channel:expr, $application:expr, $module:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $channel, $application, $module, $crate::core::Severity::Error, $($arg)+)
    };
}

/// Emit a critical-severity record.
#[macro_export]
macro_rules! critical {
    ($dispatcher:expr, $channel:expr, $application:expr, $module:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $channel, $application, $module, $crate::core::Severity::Critical, $($arg)+)
    };
}

/// Emit an alert-severity record.
#[macro_export]
macro_rules! alert {
    ($dispatcher:expr, $channel:expr, $application:expr, $module:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $channel, $application, $module, $crate::core::Severity::Alert, $($arg)+)
    };
}

/// Emit an emergency-severity record.
#[macro_export]
macro_rules! emergency {
    ($dispatcher:expr, $channel:expr, $application:expr, $module:expr, $($arg:tt)+) => {
        $crate::log!($dispatcher, $channel, $application, $module, $crate::core::Severity::Emergency, $($arg)+)
    };
}
