//! Runtime-registered `tracing` callsites.
//!
//! `tracing` wants field names and levels fixed in `'static` metadata, while
//! query events carry keys chosen at configuration time. Each distinct shape
//! is registered once and kept for the life of the process.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use once_cell::sync::{Lazy, OnceCell};
use tracing::Level;
use tracing_core::callsite::{self, Callsite};
use tracing_core::field::FieldSet;
use tracing_core::metadata::Kind;
use tracing_core::subscriber::Interest;
use tracing_core::Metadata;

/// Field every event carries its message in.
pub(crate) const MESSAGE: &str = "message";

/// Upper bound on fields per event, message included.
pub(crate) const MAX_FIELDS: usize = 32;

const EVENT_NAME: &str = "sea_orm_query_logger event";

struct EventCallsite {
    metadata: OnceCell<Metadata<'static>>,
}

impl Callsite for EventCallsite {
    fn set_interest(&self, _interest: Interest) {}

    fn metadata(&self) -> &Metadata<'_> {
        self.metadata
            .get()
            .expect("callsite metadata is set before registration")
    }
}

#[derive(PartialEq, Eq, Hash)]
struct Shape {
    level: u8,
    target: &'static str,
    names: Vec<String>,
}

static CALLSITES: Lazy<Mutex<HashMap<Shape, &'static Metadata<'static>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn level_rank(level: Level) -> u8 {
    match level {
        Level::ERROR => 0,
        Level::WARN => 1,
        Level::INFO => 2,
        Level::DEBUG => 3,
        _ => 4,
    }
}

/// Metadata for an event with `names` as fields (after `message`).
pub(crate) fn resolve(
    level: Level,
    target: &'static str,
    names: &[&str],
) -> &'static Metadata<'static> {
    let shape = Shape {
        level: level_rank(level),
        target,
        names: names.iter().map(|name| (*name).to_owned()).collect(),
    };

    let mut callsites = CALLSITES.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(metadata) = callsites.get(&shape) {
        return metadata;
    }

    let metadata = register(level, target, names);
    callsites.insert(shape, metadata);
    metadata
}

fn register(level: Level, target: &'static str, names: &[&str]) -> &'static Metadata<'static> {
    let field_names: Vec<&'static str> = std::iter::once(MESSAGE)
        .chain(
            names
                .iter()
                .map(|name| &*Box::leak((*name).to_owned().into_boxed_str())),
        )
        .collect();
    let field_names: &'static [&'static str] = Box::leak(field_names.into_boxed_slice());

    let site: &'static EventCallsite = Box::leak(Box::new(EventCallsite {
        metadata: OnceCell::new(),
    }));
    let metadata = Metadata::new(
        EVENT_NAME,
        target,
        level,
        None,
        None,
        Some(module_path!()),
        FieldSet::new(field_names, tracing_core::identify_callsite!(site)),
        Kind::EVENT,
    );
    // The cell is fresh, so `set` cannot fail here.
    let _ = site.metadata.set(metadata);
    callsite::register(site);

    site.metadata()
}
