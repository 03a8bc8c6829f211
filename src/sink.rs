//! Destinations for finished events.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::field::{self, DebugValue, DisplayValue, Value};
use tracing::level_filters::{LevelFilter, STATIC_MAX_LEVEL};
use tracing::Level;
use tracing_core::field::Field;

use crate::callsite::{self, MAX_FIELDS};
use crate::event::{FieldValue, Record};

/// Where events end up once they are emitted.
pub trait EventSink: Send + Sync {
    /// Whether an event at `level` for `target` would be kept. Asked before
    /// any field is computed.
    fn enabled(&self, _level: Level, _target: &'static str) -> bool {
        true
    }

    fn emit(&self, record: &Record<'_>);
}

/// Forwards events to the current `tracing` dispatcher.
///
/// Field names are only known at runtime, so every distinct combination of
/// level, target and field names gets its own callsite, registered the first
/// time it is seen. Events are recorded under the active span.
///
/// An event counts as enabled only when the current subscriber would record
/// it for its level and target, so a filter such as `warn,sqlx=debug` keeps
/// TRACE errors of this crate disabled and lets them fall through.
///
/// At most `MAX_FIELDS - 1` fields are forwarded per event; `message` takes
/// the remaining slot and a user field called `message` is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn enabled(&self, level: Level, target: &'static str) -> bool {
        if level > STATIC_MAX_LEVEL || level > LevelFilter::current() {
            return false;
        }

        // The subscriber's own filter has the last word, per target
        let metadata = callsite::resolve(level, target, &[]);
        tracing::dispatcher::get_default(|dispatch| dispatch.enabled(metadata))
    }

    fn emit(&self, record: &Record<'_>) {
        let forwarded: Vec<&(String, FieldValue)> = record
            .fields
            .iter()
            .filter(|(key, _)| key != callsite::MESSAGE)
            .take(MAX_FIELDS - 1)
            .collect();
        let names: Vec<&str> = forwarded.iter().map(|(key, _)| key.as_str()).collect();

        let metadata = callsite::resolve(record.level, record.target, &names);

        tracing::dispatcher::get_default(|dispatch| {
            if !dispatch.enabled(metadata) {
                return;
            }

            let fieldset = metadata.fields();
            let Some(message_field) = fieldset.field(callsite::MESSAGE) else {
                return;
            };
            let fields: Vec<Field> = names.iter().filter_map(|name| fieldset.field(*name)).collect();
            let slots: Vec<Slot<'_>> = forwarded.iter().map(|(_, value)| Slot::from(value)).collect();
            let message = field::display(record.message);

            let mut values: [(&Field, Option<&dyn Value>); MAX_FIELDS] =
                [(&message_field, None); MAX_FIELDS];
            values[0] = (&message_field, Some(&message as &dyn Value));
            for (i, (field, slot)) in fields.iter().zip(&slots).enumerate() {
                values[i + 1] = (field, Some(slot.as_value()));
            }

            let value_set = fieldset.value_set(&values);
            dispatch.event(&tracing_core::Event::new(metadata, &value_set));
        });
    }
}

/// Borrowed view of a [`FieldValue`] that `tracing` can record.
enum Slot<'a> {
    Str(&'a str),
    I64(i64),
    Bool(bool),
    Duration(DebugValue<&'a std::time::Duration>),
    Text(DisplayValue<&'a str>),
}

impl<'a> From<&'a FieldValue> for Slot<'a> {
    fn from(value: &'a FieldValue) -> Self {
        match value {
            FieldValue::Str(s) => Slot::Str(s.as_str()),
            FieldValue::I64(v) => Slot::I64(*v),
            FieldValue::Bool(v) => Slot::Bool(*v),
            FieldValue::Duration(d) => Slot::Duration(field::debug(d)),
            FieldValue::Error(s) | FieldValue::Debug(s) => Slot::Text(field::display(s.as_str())),
        }
    }
}

impl Slot<'_> {
    fn as_value(&self) -> &dyn Value {
        match self {
            Slot::Str(s) => s,
            Slot::I64(v) => v,
            Slot::Bool(v) => v,
            Slot::Duration(v) => v,
            Slot::Text(v) => v,
        }
    }
}

/// An event captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedEvent {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub fields: Vec<(String, FieldValue)>,
}

impl CapturedEvent {
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.field(key).is_some()
    }
}

/// Keeps emitted events in memory. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl fmt::Debug for MemorySink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySink")
            .field("events", &self.events().len())
            .finish()
    }
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return everything emitted so far.
    pub fn take(&self) -> Vec<CapturedEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl EventSink for MemorySink {
    fn emit(&self, record: &Record<'_>) {
        let event = CapturedEvent {
            level: record.level,
            target: record.target.to_owned(),
            message: record.message.to_owned(),
            fields: record.fields.to_vec(),
        };
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
