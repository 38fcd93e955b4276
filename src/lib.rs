//! Core library for the ARG control panel.
//! A topic bus keeps the editor panels in step with one persisted parameter document; the
//! toolbar drives the remote report service and broadcasts the results.

pub mod bus;
pub mod config;
pub mod error;
pub mod form;
mod gui;
pub mod inserts;
pub mod logger;
pub mod panel;
pub mod service;
pub mod statics;
pub mod store;
pub mod table;
pub mod toolbar;
mod value;

pub use bus::{Subscription, TopicBus};
pub use config::Config;
pub use gui::run_gui;
pub use logger::{LogLevel, LogRecord};
pub use value::{ParamMap, ParamNumber, ParamValue};

/// Payload carried on the application's bus.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The full parameter document, sent on a panel's refresh topic.
    Refresh(Option<ParamValue>),
    /// A line for the `logger` topic.
    Log(LogRecord),
}

pub type EventBus = TopicBus<Event>;
