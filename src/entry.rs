use std::time::Duration;

use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

/// Apache/NCSA timestamp layout. Example: `10/Oct/2000:13:55:36 -0700`
const CLF_TIME_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[day]/[month repr:short]/[year]:[hour]:[minute]:[second] [offset_hour sign:mandatory][offset_minute]"
);

/// Placeholder used for absent request values.
pub(crate) const MISSING: &str = "-";

/// Level of an access record, chosen from the response status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    /// `Error` for 5xx and above, `Warn` for 4xx, `Info` for everything else.
    pub fn from_status(status: u16) -> Self {
        if status >= 500 {
            Severity::Error
        } else if status >= 400 {
            Severity::Warn
        } else {
            Severity::Info
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }
}

/// Value of a structured field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Int(u64),
    Str(&'a str),
}

impl std::fmt::Display for FieldValue<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::Str(v) => f.write_str(v),
        }
    }
}

/// Summary of one served request.
///
/// Built once the response body has been released, then handed to an
/// [`AccessLogSink`](crate::AccessLogSink) and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingEntry {
    status: u16,
    duration: Duration,
    client_ip: String,
    method: String,
    path: String,
    proto: String,
    referer: String,
    data_length: u64,
    user_agent: String,
}

impl LoggingEntry {
    /// Number of structured fields returned by [`fields`](LoggingEntry::fields).
    pub const FIELD_COUNT: usize = 10;

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        status: u16,
        duration: Duration,
        client_ip: String,
        method: String,
        path: String,
        proto: String,
        referer: String,
        data_length: u64,
        user_agent: String,
    ) -> Self {
        LoggingEntry {
            status,
            duration,
            client_ip: or_missing(client_ip),
            method,
            path,
            proto,
            referer: or_missing(referer),
            data_length,
            user_agent: or_missing(user_agent),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Duration in whole nanoseconds, saturating at `u64::MAX`.
    pub fn duration_nanos(&self) -> u64 {
        u64::try_from(self.duration.as_nanos()).unwrap_or(u64::MAX)
    }

    pub fn duration_pretty(&self) -> String {
        format_duration(self.duration)
    }

    pub fn client_ip(&self) -> &str {
        &self.client_ip
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Raw path, with `?query` appended when the request had one.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn proto(&self) -> &str {
        &self.proto
    }

    pub fn referer(&self) -> &str {
        &self.referer
    }

    pub fn data_length(&self) -> u64 {
        self.data_length
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn severity(&self) -> Severity {
        Severity::from_status(self.status)
    }

    /// Structured fields in emission order.
    ///
    /// `duration_pretty` must be the rendered duration; it is passed in so the
    /// message and the fields share one rendering.
    pub fn fields<'a>(
        &'a self,
        duration_pretty: &'a str,
    ) -> [(&'static str, FieldValue<'a>); Self::FIELD_COUNT] {
        [
            ("statusCode", FieldValue::Int(u64::from(self.status))),
            ("duration", FieldValue::Int(self.duration_nanos())),
            ("durationPretty", FieldValue::Str(duration_pretty)),
            ("clientIP", FieldValue::Str(&self.client_ip)),
            ("method", FieldValue::Str(&self.method)),
            ("path", FieldValue::Str(&self.path)),
            ("proto", FieldValue::Str(&self.proto)),
            ("referer", FieldValue::Str(&self.referer)),
            ("dataLength", FieldValue::Int(self.data_length)),
            ("userAgent", FieldValue::Str(&self.user_agent)),
        ]
    }

    /// Common log format line stamped with the current local time (UTC when
    /// the local offset cannot be determined).
    pub fn message(&self) -> String {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        self.message_at(now)
    }

    /// Common log format line stamped with `now`.
    pub fn message_at(&self, now: OffsetDateTime) -> String {
        let timestamp = now
            .format(CLF_TIME_FORMAT)
            .unwrap_or_else(|_| MISSING.to_string());

        format!(
            "{} - - [{}] \"{} {} {}\" {} {} \"{}\" \"{}\" {}",
            self.client_ip,
            timestamp,
            self.method,
            self.path,
            self.proto,
            self.status,
            self.data_length,
            self.referer,
            self.user_agent,
            self.duration_pretty(),
        )
    }
}

fn or_missing(value: String) -> String {
    if value.is_empty() {
        MISSING.to_string()
    } else {
        value
    }
}

/// Joins a raw path and raw query string, leaving both encoded as received.
pub(crate) fn path_with_query(path: &str, query: Option<&str>) -> String {
    match query {
        Some(query) if !query.is_empty() => format!("{path}?{query}"),
        _ => path.to_string(),
    }
}

/// Renders a duration the way Go's `time.Duration` prints itself:
/// `0s`, `42ns`, `1.5µs`, `1.234ms`, `2.5s`, `1m30s`, `1h0m0s`.
pub fn format_duration(duration: Duration) -> String {
    let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);

    if nanos == 0 {
        return "0s".to_string();
    }

    if nanos < 1_000 {
        return format!("{nanos}ns");
    }
    if nanos < 1_000_000 {
        let (whole, frac) = split_fraction(nanos, 3);
        return format!("{whole}{frac}µs");
    }
    if nanos < 1_000_000_000 {
        let (whole, frac) = split_fraction(nanos, 6);
        return format!("{whole}{frac}ms");
    }

    let (secs, frac) = split_fraction(nanos, 9);
    let minutes = secs / 60;
    let hours = minutes / 60;

    if hours > 0 {
        format!("{}h{}m{}{}s", hours, minutes % 60, secs % 60, frac)
    } else if minutes > 0 {
        format!("{}m{}{}s", minutes, secs % 60, frac)
    } else {
        format!("{secs}{frac}s")
    }
}

/// Splits `value` into its integer part and a `.digits` suffix at `precision`
/// decimal places, dropping trailing zeros (and the dot when nothing is left).
fn split_fraction(value: u64, precision: u32) -> (u64, String) {
    let scale = 10u64.pow(precision);
    let whole = value / scale;
    let digits = value % scale;

    if digits == 0 {
        return (whole, String::new());
    }

    let padded = format!("{:0width$}", digits, width = precision as usize);
    (whole, format!(".{}", padded.trim_end_matches('0')))
}
