use crate::entry::{LoggingEntry, Severity};

/// A finished access record as handed to an [`AccessLogSink`].
#[derive(Debug, Clone, Copy)]
pub struct AccessRecord<'a> {
    /// Log target configured with [`AccessLogger::log_target`](crate::AccessLogger::log_target).
    pub target: &'a str,
    pub severity: Severity,
    pub entry: &'a LoggingEntry,
    /// Rendered `durationPretty` field, shared with the message.
    pub duration_pretty: &'a str,
    /// Common log format line.
    pub message: &'a str,
}

/// Destination of access records.
///
/// Called once per logged request from the worker that served it.
pub trait AccessLogSink {
    fn emit(&self, record: &AccessRecord<'_>);
}

impl<T: AccessLogSink + ?Sized> AccessLogSink for std::rc::Rc<T> {
    fn emit(&self, record: &AccessRecord<'_>) {
        (**self).emit(record)
    }
}

impl<T: AccessLogSink + ?Sized> AccessLogSink for std::sync::Arc<T> {
    fn emit(&self, record: &AccessRecord<'_>) {
        (**self).emit(record)
    }
}

#[cfg(feature = "log")]
pub mod rust_log {
    use super::{AccessLogSink, AccessRecord};
    use crate::entry::{FieldValue, Severity};
    use std::panic::Location;

    impl From<Severity> for log::Level {
        fn from(severity: Severity) -> Self {
            match severity {
                Severity::Info => log::Level::Info,
                Severity::Warn => log::Level::Warn,
                Severity::Error => log::Level::Error,
            }
        }
    }

    /// Sink that forwards records to the `log` facade, with the structured
    /// fields attached as key-values.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct LogSink;

    impl AccessLogSink for LogSink {
        fn emit(&self, record: &AccessRecord<'_>) {
            log(
                record.severity.into(),
                record.target,
                module_path!(),
                Location::caller(),
                record,
            );
        }
    }

    pub fn log(
        level: log::Level,
        target: &str,
        module_path: &'static str,
        loc: &'static Location,
        record: &AccessRecord<'_>,
    ) {
        if level > log::max_level() {
            return;
        }

        let fields = record.entry.fields(record.duration_pretty);
        let kvs: Vec<(&str, log::kv::Value)> = fields
            .iter()
            .map(|(k, v)| match v {
                FieldValue::Int(v) => (*k, log::kv::Value::from(*v)),
                FieldValue::Str(v) => (*k, log::kv::Value::from(*v)),
            })
            .collect();
        let kvs = kvs.as_slice();

        log::logger().log(
            &log::Record::builder()
                .args(format_args!("{}", record.message))
                .level(level)
                .target(target)
                .module_path_static(Some(module_path))
                .file_static(Some(loc.file()))
                .line(Some(loc.line()))
                .key_values(&kvs)
                .build(),
        );
    }
}
