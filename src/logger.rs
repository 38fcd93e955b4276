//! The `logger` topic: user-facing log lines and the one view that renders them.

use crate::{
    Event, EventBus,
    bus::Subscription,
    statics,
};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Success,
    Other(String),
}

impl LogLevel {
    pub fn parse(text: &str) -> Self {
        match text.trim().to_ascii_uppercase().as_str() {
            statics::LEVEL_DEBUG => LogLevel::Debug,
            statics::LEVEL_INFO => LogLevel::Info,
            statics::LEVEL_WARN | "WARNING" => LogLevel::Warn,
            statics::LEVEL_ERROR | "CRITICAL" => LogLevel::Error,
            statics::LEVEL_SUCCESS => LogLevel::Success,
            _ => LogLevel::Other(text.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            LogLevel::Debug => statics::LEVEL_DEBUG,
            LogLevel::Info => statics::LEVEL_INFO,
            LogLevel::Warn => statics::LEVEL_WARN,
            LogLevel::Error => statics::LEVEL_ERROR,
            LogLevel::Success => statics::LEVEL_SUCCESS,
            LogLevel::Other(s) => s,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message on the `logger` topic. `date` is set when the line came from the service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "WireLog")]
pub struct LogRecord {
    pub date: Option<NaiveDateTime>,
    pub level: LogLevel,
    pub message: String,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            date: None,
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Success, message)
    }
}

#[derive(Deserialize)]
struct WireLog {
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl From<WireLog> for LogRecord {
    fn from(wire: WireLog) -> Self {
        Self {
            date: wire.date.as_deref().and_then(parse_log_date),
            level: wire
                .level
                .as_deref()
                .map_or(LogLevel::Info, LogLevel::parse),
            message: wire.message.unwrap_or_default(),
        }
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]` and bare dates (midnight).
pub fn parse_log_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub fn publish(bus: &EventBus, record: LogRecord) {
    bus.publish(statics::TOPIC_LOGGER, Event::Log(record));
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub date: NaiveDateTime,
    pub level: LogLevel,
    pub message: String,
}

/// Renders the `logger` topic. Each append requests a scroll to the newest line.
pub struct LogView {
    lines: Rc<RefCell<Vec<LogLine>>>,
    scroll_pending: Rc<Cell<bool>>,
    _subscription: Subscription,
}

impl LogView {
    pub fn attach(bus: &EventBus) -> Self {
        let lines = Rc::new(RefCell::new(Vec::new()));
        let scroll_pending = Rc::new(Cell::new(false));

        let subscription = {
            let lines = Rc::clone(&lines);
            let scroll_pending = Rc::clone(&scroll_pending);
            bus.subscribe(statics::TOPIC_LOGGER, move |event| {
                let Event::Log(record) = event else {
                    return Ok(());
                };
                lines.borrow_mut().push(LogLine {
                    date: record.date.unwrap_or_else(|| Local::now().naive_local()),
                    level: record.level.clone(),
                    message: record.message.clone(),
                });
                scroll_pending.set(true);
                Ok(())
            })
        };

        Self {
            lines,
            scroll_pending,
            _subscription: subscription,
        }
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.lines.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.lines.borrow_mut().clear();
    }

    /// True once after any append.
    pub fn take_scroll_request(&self) -> bool {
        self.scroll_pending.replace(false)
    }
}

#[cfg(test)]
mod tests {
    use super::{LogLevel, LogRecord, LogView, parse_log_date, publish};
    use crate::EventBus;
    use chrono::NaiveDate;

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!(LogLevel::parse("warn"), LogLevel::Warn);
        assert_eq!(LogLevel::parse("WARNING"), LogLevel::Warn);
        assert_eq!(LogLevel::parse("Success"), LogLevel::Success);
        assert_eq!(LogLevel::parse("TRACE"), LogLevel::Other("TRACE".to_string()));
    }

    #[test]
    fn bare_dates_parse_to_midnight() {
        let expected = NaiveDate::from_ymd_opt(2020, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        assert_eq!(parse_log_date("2020-01-01"), Some(expected));
        assert!(parse_log_date("2020-01-01 10:30:00").is_some());
        assert_eq!(parse_log_date("yesterday"), None);
    }

    #[test]
    fn wire_logs_deserialize_with_defaults() {
        let record: LogRecord =
            serde_json::from_str(r#"{"level":"WARN","message":"check X","date":"2020-01-01"}"#)
                .unwrap();
        assert_eq!(record.level, LogLevel::Warn);
        assert_eq!(record.message, "check X");
        assert!(record.date.is_some());

        let bare: LogRecord = serde_json::from_str("{}").unwrap();
        assert_eq!(bare.level, LogLevel::Info);
        assert_eq!(bare.message, "");
    }

    #[test]
    fn view_appends_and_requests_scroll() {
        let bus = EventBus::new();
        let view = LogView::attach(&bus);
        assert!(!view.take_scroll_request());

        publish(&bus, LogRecord::info("hello"));
        assert_eq!(view.len(), 1);
        assert!(view.take_scroll_request());
        assert!(!view.take_scroll_request());

        view.clear();
        assert!(view.is_empty());
    }
}
