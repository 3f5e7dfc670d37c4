//! Log formatting.

use std::fmt;
use std::fmt::Debug;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::Event;
use tracing::Subscriber;
use tracing::field::Field;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::FormatEvent;
use tracing_subscriber::fmt::FormatFields;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::registry::LookupSpan;

/// [`Format`](tracing_subscriber::fmt::format::Format) for the
/// `tracing_subscriber::fmt` layer.
///
/// It formats each event as its own self-contained flat JSON log line,
/// similar to the [`Json`](tracing_subscriber::fmt::format::Json) format.
///
/// It has at least the following keys:
/// - `service_name`
/// - `timestamp`
/// - `level`
/// - `target`
///
/// It may also have the following keys:
/// - `message`
/// - `filename`
/// - `line_number`
/// - `span_name`
///
/// Additionally, it may have any custom key-value pair defined for the event.
#[derive(Debug, Clone)]
pub struct FlatJson {
    pub service_name: String,
}

impl<S, N> FormatEvent<S, N> for FlatJson
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        #[derive(Default)]
        struct JsonVisitor(serde_json::Map<String, serde_json::Value>);
        impl JsonVisitor {
            fn insert(&mut self, key: impl ToString, value: impl Into<serde_json::Value>) {
                self.0.insert(key.to_string(), value.into());
            }
            fn finish(self) -> serde_json::Value {
                serde_json::Value::Object(self.0)
            }
        }
        impl tracing::field::Visit for JsonVisitor {
            fn record_f64(&mut self, field: &Field, value: f64) {
                self.insert(field.name(), value);
            }

            fn record_i64(&mut self, field: &Field, value: i64) {
                self.insert(field.name(), value);
            }

            fn record_u64(&mut self, field: &Field, value: u64) {
                self.insert(field.name(), value);
            }

            fn record_bool(&mut self, field: &Field, value: bool) {
                self.insert(field.name(), value);
            }

            fn record_str(&mut self, field: &Field, value: &str) {
                self.insert(field.name(), value);
            }

            fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
                self.insert(field.name(), format!("{value:?}"));
            }
        }

        let meta = event.metadata();

        let mut json = JsonVisitor::default();
        json.insert(
            "timestamp",
            OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_else(|_| "ERROR".to_string()),
        );
        json.insert("level", meta.level().to_string());
        json.insert("target", meta.target().to_string());
        if let Some(filename) = meta.file() {
            json.insert("filename", filename.to_string());
        }
        if let Some(line_number) = meta.line() {
            json.insert("line_number", line_number);
        }

        json.insert("service_name", self.service_name.clone());
        if let Some(span) = ctx.lookup_current() {
            json.insert("span_name", span.name().to_string());
        }

        event.record(&mut json);

        writeln!(writer, "{}", json.finish())
    }
}
