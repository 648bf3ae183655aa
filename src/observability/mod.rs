//! Observability for the archive and the ACL engine
//!
//! - Structured JSON logging, one line per event
//! - Typed lifecycle events
//! - Logging never fails or alters the operation being observed
//!
//! ```ignore
//! use arcvault::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::VersionClaimed, &[("unit", "U1"), ("version", "0")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log a lifecycle event
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_failure() {
        Severity::Error
    } else {
        Severity::Info
    };
    Logger::log(severity, event.as_str(), fields);
}

/// Log a lifecycle event at an explicit severity
pub fn log_event_at(severity: Severity, event: Event, fields: &[(&str, &str)]) {
    Logger::log(severity, event.as_str(), fields);
}
