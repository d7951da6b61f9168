//! In-memory capture of log events for assertions
//!
//! Every test in a binary shares one global subscriber, so captured events
//! carry the unit they belong to as a typed `transaction_id`. Tests pick out
//! their own unit with [`LogCapture::events_for_unit`] or
//! [`LogCapture::lifecycle`] instead of clearing a shared buffer.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, OnceLock};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::core_types::schema::{FIELD_ERR_CODE, FIELD_EVENT, FIELD_OP, FIELD_TRANSACTION_ID};

/// One log event as emitted by the logging macros or the executor
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    pub level: Level,
    pub op: Option<String>,
    /// `start`, `end` or `end_error`
    pub event: Option<String>,
    /// Unit the event was logged for, if any
    pub transaction_id: Option<i64>,
    pub err_code: Option<String>,
    /// Every field, rendered as text
    pub fields: BTreeMap<String, String>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Whether this is the `event` boundary of operation `op`
    pub fn is(&self, op: &str, event: &str) -> bool {
        self.op.as_deref() == Some(op) && self.event.as_deref() == Some(event)
    }
}

#[derive(Default)]
struct EventFields {
    transaction_id: Option<i64>,
    fields: BTreeMap<String, String>,
}

impl EventFields {
    fn put(&mut self, field: &Field, value: String) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for EventFields {
    fn record_i64(&mut self, field: &Field, value: i64) {
        if field.name() == FIELD_TRANSACTION_ID {
            self.transaction_id = Some(value);
        }
        self.put(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == FIELD_TRANSACTION_ID {
            self.transaction_id = i64::try_from(value).ok();
        }
        self.put(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.to_string());
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, format!("{:?}", value));
    }
}

/// Shared buffer of captured events
#[derive(Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
    /// Everything captured so far, in emission order
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn events_for_op(&self, op: &str) -> Vec<CapturedEvent> {
        self.filtered(|e| e.op.as_deref() == Some(op))
    }

    /// Events logged for the unit `transaction_id`, in emission order
    pub fn events_for_unit(&self, transaction_id: i64) -> Vec<CapturedEvent> {
        self.filtered(|e| e.transaction_id == Some(transaction_id))
    }

    /// Boundary names of `op` for one unit, e.g. `["start", "end"]`
    pub fn lifecycle(&self, op: &str, transaction_id: i64) -> Vec<String> {
        self.events_for_unit(transaction_id)
            .into_iter()
            .filter(|e| e.op.as_deref() == Some(op))
            .filter_map(|e| e.event)
            .collect()
    }

    fn filtered(&self, keep: impl Fn(&CapturedEvent) -> bool) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .map(|events| events.iter().filter(|e| keep(e)).cloned().collect())
            .unwrap_or_default()
    }

    fn push(&self, event: CapturedEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

struct CaptureLayer {
    capture: LogCapture,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visited = EventFields::default();
        event.record(&mut visited);

        let EventFields {
            transaction_id,
            fields,
        } = visited;
        self.capture.push(CapturedEvent {
            level: *event.metadata().level(),
            op: fields.get(FIELD_OP).cloned(),
            event: fields.get(FIELD_EVENT).cloned(),
            transaction_id,
            err_code: fields.get(FIELD_ERR_CODE).cloned(),
            fields,
        });
    }
}

static GLOBAL_CAPTURE: OnceLock<LogCapture> = OnceLock::new();

/// Install the capturing subscriber once per process and hand out its buffer
///
/// ```
/// use kestrel_core::logging_facility::test_capture::init_test_capture;
/// use kestrel_core::log_op_start;
///
/// let capture = init_test_capture();
/// log_op_start!("doc_example", transaction_id = 42_i64);
/// assert_eq!(capture.lifecycle("doc_example", 42), vec!["start"]);
/// ```
pub fn init_test_capture() -> LogCapture {
    GLOBAL_CAPTURE
        .get_or_init(|| {
            let capture = LogCapture::default();
            let layer = CaptureLayer {
                capture: capture.clone(),
            };
            tracing_subscriber::registry().with(layer).try_init().ok();
            capture
        })
        .clone()
}
