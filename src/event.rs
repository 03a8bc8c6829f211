//! Leveled structured events and the logger handle that builds them.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::level_filters::LevelFilter;
use tracing::Level;

use crate::sink::{EventSink, TracingSink};

/// Target used for events unless the handle is given another one.
pub const DEFAULT_TARGET: &str = "sea_orm_query_logger";

/// Key under which [`Event::err`] stores the error message.
pub const ERROR_KEY: &str = "error";

/// A value attached to an [`Event`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    I64(i64),
    Bool(bool),
    Duration(Duration),
    /// Rendered error message.
    Error(String),
    /// `{:?}` rendering of an arbitrary value.
    Debug(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Str(s) | FieldValue::Error(s) | FieldValue::Debug(s) => f.write_str(s),
            FieldValue::I64(v) => write!(f, "{v}"),
            FieldValue::Bool(v) => write!(f, "{v}"),
            FieldValue::Duration(d) => write!(f, "{d:?}"),
        }
    }
}

/// A finished event handed to an [`EventSink`].
#[derive(Debug)]
pub struct Record<'a> {
    pub level: Level,
    pub target: &'static str,
    pub message: &'a str,
    pub fields: &'a [(String, FieldValue)],
}

/// A structured logger handle with its own severity threshold.
///
/// Handles are cheap to clone. Changing the threshold with [`EventLogger::level`]
/// produces a new handle and leaves the original alone.
///
/// The default handle has no sink and an `OFF` threshold: it never logs,
/// whatever threshold it is later switched to.
#[derive(Clone)]
pub struct EventLogger {
    sink: Option<Arc<dyn EventSink>>,
    level: LevelFilter,
    target: &'static str,
}

impl Default for EventLogger {
    fn default() -> Self {
        Self {
            sink: None,
            level: LevelFilter::OFF,
            target: DEFAULT_TARGET,
        }
    }
}

impl fmt::Debug for EventLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLogger")
            .field("level", &self.level)
            .field("target", &self.target)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl EventLogger {
    /// Create a handle writing to `sink`, with every level enabled.
    pub fn new(sink: impl EventSink + 'static) -> Self {
        Self::from_sink(Arc::new(sink))
    }

    /// Create a handle from an already shared sink.
    pub fn from_sink(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink: Some(sink),
            level: LevelFilter::TRACE,
            target: DEFAULT_TARGET,
        }
    }

    /// A handle forwarding to the current `tracing` subscriber.
    pub fn tracing() -> Self {
        Self::new(TracingSink)
    }

    /// Return a copy of this handle with a different threshold.
    pub fn level(&self, level: LevelFilter) -> Self {
        Self {
            level,
            ..self.clone()
        }
    }

    /// Return a copy of this handle logging under another target.
    pub fn with_target(&self, target: &'static str) -> Self {
        Self {
            target,
            ..self.clone()
        }
    }

    /// The threshold of this handle.
    pub fn max_level(&self) -> LevelFilter {
        self.level
    }

    pub fn target(&self) -> &'static str {
        self.target
    }

    /// Start an event at `level`. The event is disabled when the handle's
    /// threshold or the sink rejects the level.
    pub fn event(&self, level: Level) -> Event {
        let sink = self
            .sink
            .as_ref()
            .filter(|sink| level <= self.level && sink.enabled(level, self.target))
            .cloned();

        Event {
            level,
            target: self.target,
            sink,
            fields: Vec::new(),
        }
    }

    pub fn error(&self) -> Event {
        self.event(Level::ERROR)
    }

    pub fn warn(&self) -> Event {
        self.event(Level::WARN)
    }

    pub fn info(&self) -> Event {
        self.event(Level::INFO)
    }

    pub fn debug(&self) -> Event {
        self.event(Level::DEBUG)
    }

    pub fn trace(&self) -> Event {
        self.event(Level::TRACE)
    }
}

/// An in-flight event at a chosen level.
///
/// Field methods are no-ops on a disabled event, and closures passed to
/// [`Event::with`] only run when the event is enabled, so building an event
/// that will be filtered out costs next to nothing.
pub struct Event {
    level: Level,
    target: &'static str,
    sink: Option<Arc<dyn EventSink>>,
    fields: Vec<(String, FieldValue)>,
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("level", &self.level)
            .field("target", &self.target)
            .field("enabled", &self.enabled())
            .field("fields", &self.fields)
            .finish()
    }
}

impl Event {
    pub fn level(&self) -> Level {
        self.level
    }

    /// Whether the event will reach its sink.
    pub fn enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Disable the event.
    pub fn discard(mut self) -> Self {
        self.sink = None;
        self.fields.clear();
        self
    }

    /// Fields attached so far, in insertion order.
    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    /// Look up an attached field.
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Attach a field. A field with the same key is replaced in place.
    pub fn put(&mut self, key: &str, value: FieldValue) -> &mut Self {
        if !self.enabled() {
            return self;
        }
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key.to_owned(), value)),
        }
        self
    }

    pub fn str(&mut self, key: &str, value: &str) -> &mut Self {
        if !self.enabled() {
            return self;
        }
        self.put(key, FieldValue::Str(value.to_owned()))
    }

    pub fn i64(&mut self, key: &str, value: i64) -> &mut Self {
        self.put(key, FieldValue::I64(value))
    }

    pub fn bool(&mut self, key: &str, value: bool) -> &mut Self {
        self.put(key, FieldValue::Bool(value))
    }

    pub fn dur(&mut self, key: &str, value: Duration) -> &mut Self {
        self.put(key, FieldValue::Duration(value))
    }

    /// Attach an error under [`ERROR_KEY`].
    pub fn err(&mut self, err: &(dyn Error + 'static)) -> &mut Self {
        if !self.enabled() {
            return self;
        }
        self.put(ERROR_KEY, FieldValue::Error(err.to_string()))
    }

    /// Attach any `Debug` value.
    pub fn debug(&mut self, key: &str, value: &dyn fmt::Debug) -> &mut Self {
        if !self.enabled() {
            return self;
        }
        self.put(key, FieldValue::Debug(format!("{value:?}")))
    }

    /// Run `f` against the event, only if it is enabled.
    pub fn with(mut self, f: impl FnOnce(&mut Event)) -> Self {
        if self.enabled() {
            f(&mut self);
        }
        self
    }

    /// Emit the event with `message`. Nothing happens when it is disabled.
    pub fn msg(self, message: impl fmt::Display) {
        let Some(sink) = self.sink else {
            return;
        };
        let message = message.to_string();
        sink.emit(&Record {
            level: self.level,
            target: self.target,
            message: &message,
            fields: &self.fields,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    #[test]
    fn test_threshold_filters_levels() {
        let sink = MemorySink::new();
        let logger = EventLogger::new(sink.clone()).level(LevelFilter::WARN);

        assert!(logger.error().enabled());
        assert!(logger.warn().enabled());
        assert!(!logger.info().enabled());
        assert!(!logger.trace().enabled());

        logger.info().msg("hidden");
        logger.warn().msg("shown");

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "shown");
        assert_eq!(events[0].level, Level::WARN);
    }

    #[test]
    fn test_default_handle_is_silent() {
        let logger = EventLogger::default();
        assert_eq!(logger.max_level(), LevelFilter::OFF);
        assert!(!logger.error().enabled());
        assert!(!logger.level(LevelFilter::TRACE).error().enabled());
    }

    #[test]
    fn test_level_returns_new_handle() {
        let logger = EventLogger::new(MemorySink::new());
        let quiet = logger.level(LevelFilter::ERROR);
        assert_eq!(logger.max_level(), LevelFilter::TRACE);
        assert_eq!(quiet.max_level(), LevelFilter::ERROR);
    }

    #[test]
    fn test_fields_and_replacement() {
        let sink = MemorySink::new();
        let logger = EventLogger::new(sink.clone()).with_target("app::db");

        let mut event = logger.info();
        event
            .str("sql", "SELECT 1")
            .i64("affected_rows", 3)
            .bool("cached", false)
            .dur("duration", Duration::from_millis(5))
            .debug("tags", &["a", "b"])
            .i64("affected_rows", 4);
        event.msg(format_args!("done in {}ms", 5));

        let events = sink.events();
        assert_eq!(events[0].target, "app::db");
        assert_eq!(events[0].message, "done in 5ms");
        assert_eq!(events[0].fields.len(), 5);
        assert_eq!(events[0].field("affected_rows"), Some(&FieldValue::I64(4)));
        assert_eq!(
            events[0].field("tags"),
            Some(&FieldValue::Debug(r#"["a", "b"]"#.to_string()))
        );
    }

    #[test]
    fn test_with_skips_disabled_events() {
        let logger = EventLogger::new(MemorySink::new()).level(LevelFilter::INFO);
        let mut called = false;
        let event = logger.debug().with(|_| called = true);
        assert!(!called);
        assert!(event.fields().is_empty());

        let event = logger.info().with(|ev| {
            ev.str("k", "v");
        });
        assert_eq!(event.field("k"), Some(&FieldValue::Str("v".to_string())));
    }

    #[test]
    fn test_discard() {
        let sink = MemorySink::new();
        let logger = EventLogger::new(sink.clone());
        let mut event = logger.error().discard();
        event.str("sql", "SELECT 1");
        assert!(!event.enabled());
        event.msg("never");
        assert!(sink.events().is_empty());
    }
}
