//! Actix-web middleware for common log format access logs.
//!
//! Every request produces one structured record: the usual Apache/NCSA
//! access line as the message, plus the same data as typed key-values.
//! The level follows the response status: `error` for 5xx, `warn` for 4xx,
//! `info` otherwise.
//!
//! ```text
//! 10.1.2.3:50312 - - [10/Oct/2000:13:55:36 -0700] "GET /users?id=5 HTTP/1.1" 200 42 "-" "curl/8.5.0" 1.234567ms
//! ```
//!
//! # Examples:
//! ## By default middleware uses the standard `log` crate for logging.
//! ```bash
//! cargo add actix-web-middleware-clf
//! ```
//! Example usage with standard `log` crate and `structured_logger` crate:
//! ```rust,no_run
//! use actix_web::{web, App, HttpServer};
//! use actix_web_middleware_clf::AccessLogger;
//! use tokio;
//! use structured_logger::{Builder, async_json::new_writer};
//!
//! #[actix_web::main] // or #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     Builder::new()
//!         .with_target_writer("*", new_writer(tokio::io::stdout()))
//!         .init();
//!
//!     HttpServer::new(|| {
//!         App::new()
//!             .wrap(AccessLogger::default())
//!             .route("/", web::get().to(|| async { "Hello world!" }))
//!     })
//!     .bind("127.0.0.1:8080")?
//!     .run()
//!     .await
//! }
//! ```
//! ## Custom sinks
//! Records can be routed anywhere by implementing [`AccessLogSink`]:
//! ```rust
//! use actix_web::App;
//! use actix_web_middleware_clf::{AccessLogSink, AccessLogger, AccessRecord};
//!
//! struct Stderr;
//!
//! impl AccessLogSink for Stderr {
//!     fn emit(&self, record: &AccessRecord<'_>) {
//!         eprintln!("{} {}", record.severity.as_str(), record.message);
//!     }
//! }
//!
//! let app = App::new().wrap(AccessLogger::new(Stderr));
//! ```
//!
//! # Configuration
//!
//! ## Path Exclusions
//!
//! Exclude specific paths from logging:
//!
//! ```rust
//! use actix_web_middleware_clf::AccessLogger;
//!
//! let logger = AccessLogger::default()
//!     .exclude("/health")
//!     .exclude("/metrics");
//! ```
//!
//! use regex patterns:
//!
//! ```rust
//! use actix_web_middleware_clf::AccessLogger;
//!
//! let logger = AccessLogger::default()
//!     .exclude_regex(r"^/assets/.*");
//! ```
//!
//! ## Client address behind a proxy
//!
//! ```rust
//! use actix_web_middleware_clf::AccessLogger;
//!
//! let logger = AccessLogger::default().real_ip(true);
//! ```
//!
//! # Fields
//!
//! - `statusCode` - Response status code
//! - `duration` - Request duration in nanoseconds
//! - `durationPretty` - Request duration as text, e.g. `1.5ms`
//! - `clientIP` - Client address, `-` when unknown
//! - `method` - HTTP method (GET, POST, etc.)
//! - `path` - Request path with the raw query string, if any
//! - `proto` - HTTP protocol version
//! - `referer` - Request referrer, `-` when absent
//! - `dataLength` - Response body size in bytes
//! - `userAgent` - Client user agent, `-` when absent
//!
//! # Feature Flags
//!
//! - `log` (default) - Enable integration with the standard `log` crate

mod entry;
mod logger;
mod wrapper;

pub use crate::entry::{FieldValue, LoggingEntry, Severity, format_duration};
pub use crate::logger::{
    AccessLogger, AccessLoggerMiddlewareService, AccessLoggerResponse, ObservedBody,
};
pub use crate::wrapper::{AccessLogSink, AccessRecord};
#[cfg(feature = "log")]
pub use crate::wrapper::rust_log;
