//! Custom tracing layer for JSONL output.
//!
//! This layer produces machine-parseable JSONL logs on stderr while
//! keeping stdout clean for command payloads.

use std::io::{self, Write};
use std::sync::Mutex;

use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use super::events::{Level, LogEvent};

/// Correlation fields stored on a span.
#[derive(Debug, Clone, Default)]
struct SpanContext {
    run_id: Option<String>,
    stage: Option<String>,
}

impl SpanContext {
    fn record(&mut self, name: &str, value: String) -> bool {
        match name {
            "run_id" => self.run_id = Some(value),
            "stage" => self.stage = Some(value),
            _ => return false,
        }
        true
    }
}

/// Collects an event's fields, lifting the correlation fields and the
/// message out of the generic field map.
#[derive(Default)]
struct JsonFieldVisitor {
    context: SpanContext,
    fields: serde_json::Map<String, serde_json::Value>,
    message: Option<String>,
}

impl JsonFieldVisitor {
    fn insert_string(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else if !self.context.record(field.name(), value.clone()) {
            self.fields
                .insert(field.name().to_string(), serde_json::Value::String(value));
        }
    }
}

impl Visit for JsonFieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert_string(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert_string(field, format!("{:?}", value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::Number(value.into()));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::Number(value.into()));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.fields
                .insert(field.name().to_string(), serde_json::Value::Number(n));
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::Bool(value));
    }
}

/// Extracts span context from span attributes.
#[derive(Default)]
struct SpanContextVisitor {
    context: SpanContext,
}

impl Visit for SpanContextVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.context.record(field.name(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.context.record(field.name(), format!("{:?}", value));
    }
}

/// JSONL tracing layer that outputs to stderr.
pub struct JsonlLayer<W = io::Stderr> {
    writer: Mutex<W>,
}

impl JsonlLayer<io::Stderr> {
    /// Create a new JSONL layer writing to stderr.
    pub fn stderr() -> Self {
        JsonlLayer {
            writer: Mutex::new(io::stderr()),
        }
    }
}

impl<W: Write> JsonlLayer<W> {
    /// Create a new JSONL layer with a custom writer.
    pub fn new(writer: W) -> Self {
        JsonlLayer {
            writer: Mutex::new(writer),
        }
    }
}

impl<S, W> Layer<S> for JsonlLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: Write + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = SpanContextVisitor::default();
        attrs.record(&mut visitor);

        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(visitor.context);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut visitor = JsonFieldVisitor::default();
        event.record(&mut visitor);

        let mut log = LogEvent::new(
            Level::from(*event.metadata().level()),
            event.metadata().target(),
        );
        log.run_id = visitor.context.run_id;
        log.stage = visitor.context.stage;
        log.message = visitor.message;
        log.fields = visitor.fields;

        // innermost span wins for anything the event did not set itself
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if let Some(span_ctx) = span.extensions().get::<SpanContext>() {
                    if log.run_id.is_none() {
                        log.run_id.clone_from(&span_ctx.run_id);
                    }
                    if log.stage.is_none() {
                        log.stage.clone_from(&span_ctx.stage);
                    }
                }
            }
        }

        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", log.to_jsonl());
        }
    }
}
