#![forbid(unsafe_code)]

//! Log output and event capture for tests.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::Level;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::{EnvFilter, Layer};

/// Route `tracing` output to the test writer, filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// An event seen by [`capture_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedEvent {
    pub level: Level,
    pub target: String,
    pub message: String,
    /// Every field other than `message`, formatted with `Debug`.
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

struct EventCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

struct Fields {
    message: String,
    rest: Vec<(String, String)>,
}

impl tracing::field::Visit for Fields {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_owned();
        } else {
            self.rest.push((field.name().to_owned(), value.to_owned()));
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let text = format!("{value:?}");
        if field.name() == "message" {
            self.message = text.trim_matches('"').to_owned();
        } else {
            self.rest.push((field.name().to_owned(), text));
        }
    }
}

impl<S: tracing::Subscriber> Layer<S> for EventCapture {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = Fields {
            message: String::new(),
            rest: Vec::new(),
        };
        event.record(&mut fields);
        let meta = event.metadata();
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CapturedEvent {
                level: *meta.level(),
                target: meta.target().to_owned(),
                message: fields.message,
                fields: fields.rest,
            });
    }
}

/// Run `f` with a thread-local subscriber and return what it logged.
pub fn capture_events<R>(f: impl FnOnce() -> R) -> (R, Vec<CapturedEvent>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(EventCapture {
        events: Arc::clone(&events),
    });
    let result = {
        let _guard = tracing::subscriber::set_default(subscriber);
        f()
    };
    let events = std::mem::take(&mut *events.lock().unwrap_or_else(PoisonError::into_inner));
    (result, events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_message_and_fields() {
        let ((), events) = capture_events(|| {
            tracing::warn!(target: "weft_test", count = 3, "something odd");
            tracing::debug!(target: "weft_test", "detail");
        });
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].level, Level::WARN);
        assert_eq!(events[0].target, "weft_test");
        assert_eq!(events[0].message, "something odd");
        assert_eq!(events[0].field("count"), Some("3"));
        assert_eq!(events[1].message, "detail");
    }

    #[test]
    fn capture_is_scoped() {
        let (value, events) = capture_events(|| 7);
        assert_eq!(value, 7);
        assert!(events.is_empty());
        tracing::info!("outside");
    }

    #[test]
    fn init_is_idempotent() {
        init_test_logging();
        init_test_logging();
    }
}
