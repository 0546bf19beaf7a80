//! Log interception as a `tracing_subscriber` layer.
//!
//! Composed next to the regular output layer, so the real sink still sees every
//! event unchanged while a `LogEvent` copy goes to the correlator.

use std::fmt;
use std::future::Future;

use tracing::field::{Field, Visit};
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::correlation::Correlator;
use crate::events::{join_args, render_arg, LogEvent, LogLevel};
use crate::finalize::FINALIZE_TARGET;
use crate::transmit::TRANSMIT_TARGET;

/// The tracker's own delivery machinery; never captured.
const INTERNAL_TARGETS: [&str; 2] = [TRANSMIT_TARGET, FINALIZE_TARGET];

/// Connection internals of the HTTP client stack. Pooled connections are
/// driven on tasks of their own, outside any [`suppressed`] scope.
const CONNECTION_TARGETS: [&str; 6] = ["hyper", "hyper_util", "h2", "reqwest", "rustls", "want"];

tokio::task_local! {
    static SUPPRESSED: ();
}

/// Run `fut` with log capture switched off for everything it emits.
///
/// Wraps every call the tracker makes to the collector.
pub async fn suppressed<F: Future>(fut: F) -> F::Output {
    SUPPRESSED.scope((), fut).await
}

fn is_suppressed() -> bool {
    SUPPRESSED.try_with(|_| ()).is_ok()
}

fn has_prefix(target: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|prefix| {
        target
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

/// Turns every `tracing` event into a `LogEvent`.
#[derive(Debug, Clone)]
pub struct CaptureLayer {
    correlator: Correlator,
    max_level: Level,
}

impl CaptureLayer {
    pub fn new(correlator: Correlator, max_level: Level) -> Self {
        Self {
            correlator,
            max_level,
        }
    }

    fn wants(&self, meta: &tracing::Metadata<'_>) -> bool {
        meta.level() <= &self.max_level
            && !has_prefix(meta.target(), &INTERNAL_TARGETS)
            && !has_prefix(meta.target(), &CONNECTION_TARGETS)
            && !is_suppressed()
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if !self.wants(meta) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        self.correlator
            .record_log(LogEvent::new(LogLevel::from(meta.level()), visitor.finish()));
    }
}

/// Collects the message first, then every other field as `name=value`.
#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn push(&mut self, field: &Field, rendered: String) {
        if field.name() == "message" {
            self.message = Some(rendered);
        } else {
            self.fields.push(format!("{}={}", field.name(), rendered));
        }
    }

    fn finish(self) -> String {
        join_args(self.message.into_iter().chain(self.fields))
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, render_arg(&value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, render_arg(&value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, render_arg(&value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, render_arg(&value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, format!("{:?}", value));
    }
}
