//! Deadline resolution from inbound message attributes.
//!
//! # Responsibilities
//! - Look up the configured deadline header
//! - Parse ISO-8601 / RFC 3339 timestamps
//! - Fall back to the default time budget when the header is missing or bad
//!
//! # Design Decisions
//! - Empty header value is the same as a missing one
//! - Parse failures are logged and recovered, never surfaced
//! - A past deadline is returned as-is; enforcement decides what expired means

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};

use crate::config::DeadlineConfig;
use crate::deadline::Deadline;
use crate::observability::metrics;

/// Header consulted when no other name is configured.
pub const DEFAULT_HEADER: &str = "x-deadline";

/// Read access to the string attributes a broker attaches to a message.
pub trait Attributes {
    fn attribute(&self, key: &str) -> Option<&str>;
}

impl<S: BuildHasher> Attributes for HashMap<String, String, S> {
    fn attribute(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

impl Attributes for BTreeMap<String, String> {
    fn attribute(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

impl<T: Attributes + ?Sized> Attributes for &T {
    fn attribute(&self, key: &str) -> Option<&str> {
        (**self).attribute(key)
    }
}

/// Where a resolved deadline came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineSource {
    Header,
    Default,
}

impl DeadlineSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeadlineSource::Header => "header",
            DeadlineSource::Default => "default",
        }
    }
}

/// Layouts carrying a UTC offset: `Z`, `+02`, `+0200` or `+02:00`.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M%#z",
    "%Y-%m-%d %H:%M%#z",
    "%Y%m%dT%H%M%S%.f%#z",
    "%Y%m%dT%H%M%#z",
];

/// The same layouts without an offset. Read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y%m%dT%H%M%S%.f",
    "%Y%m%dT%H%M",
];

/// Bare dates. Read as midnight UTC.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d"];

/// Parse a deadline header value.
///
/// Accepts ISO-8601 date-times in extended (`2024-05-01T12:00:30`) or basic
/// (`20240501T120030`) form, with `T` or a space before the time, optional
/// seconds, fractional seconds after `.` or `,`, and an optional offset.
/// Bare dates mean midnight. Offset-less values are taken to be UTC.
/// Surrounding whitespace is rejected.
pub fn parse_deadline(value: &str) -> Option<Deadline> {
    if value.is_empty() || value.trim() != value {
        return None;
    }
    let value: Cow<'_, str> = if value.contains(',') {
        Cow::Owned(value.replacen(',', ".", 1))
    } else {
        Cow::Borrowed(value)
    };
    let value = value.as_ref();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// How the deadline for one message was decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// No usable header and no default budget.
    Unbounded,
    Header(Deadline),
    Default(Deadline),
    /// Header present but unparsable. `fallback` is the default deadline, if any.
    Malformed {
        raw: &'a str,
        fallback: Option<Deadline>,
    },
}

impl Resolution<'_> {
    pub fn deadline(&self) -> Option<Deadline> {
        match *self {
            Resolution::Unbounded => None,
            Resolution::Header(deadline) | Resolution::Default(deadline) => Some(deadline),
            Resolution::Malformed { fallback, .. } => fallback,
        }
    }
}

/// Turns message attributes plus the default budget into a deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadlineResolver {
    header: String,
    default_timeout: Option<Duration>,
}

impl DeadlineResolver {
    /// Create a resolver. A zero default timeout means no default.
    pub fn new(header: impl Into<String>, default_timeout: Option<Duration>) -> Self {
        Self {
            header: header.into(),
            default_timeout: default_timeout.filter(|t| !t.is_zero()),
        }
    }

    pub fn from_config(config: &DeadlineConfig) -> Self {
        Self::new(config.header.clone(), config.default_timeout())
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Resolve the deadline for a message against the current wall clock.
    ///
    /// Logs the decision and warns about a malformed header.
    pub fn resolve<A: Attributes + ?Sized>(&self, attributes: &A) -> Option<Deadline> {
        let resolution = self.resolution_at(attributes, Utc::now());
        self.record(&resolution);
        resolution.deadline()
    }

    /// Resolve the deadline for a message as if the time were `now`. No side effects.
    pub fn resolve_at<A: Attributes + ?Sized>(
        &self,
        attributes: &A,
        now: Deadline,
    ) -> Option<Deadline> {
        self.resolution_at(attributes, now).deadline()
    }

    /// Decide how the deadline for a message is set, as if the time were `now`.
    pub fn resolution_at<'a, A: Attributes + ?Sized>(
        &self,
        attributes: &'a A,
        now: Deadline,
    ) -> Resolution<'a> {
        let raw = match attributes.attribute(&self.header) {
            Some(raw) if !raw.is_empty() => raw,
            _ => {
                return match self.default_deadline(now) {
                    Some(deadline) => Resolution::Default(deadline),
                    None => Resolution::Unbounded,
                }
            }
        };

        match parse_deadline(raw) {
            Some(deadline) => Resolution::Header(deadline),
            None => Resolution::Malformed {
                raw,
                fallback: self.default_deadline(now),
            },
        }
    }

    fn default_deadline(&self, now: Deadline) -> Option<Deadline> {
        let delta = TimeDelta::from_std(self.default_timeout?).ok()?;
        now.checked_add_signed(delta)
    }

    fn record(&self, resolution: &Resolution<'_>) {
        match resolution {
            Resolution::Unbounded => {
                tracing::trace!(header = %self.header, "No deadline for message");
            }
            Resolution::Header(deadline) => {
                tracing::debug!(header = %self.header, %deadline, "Deadline taken from header");
                metrics::record_deadline_resolved(DeadlineSource::Header);
            }
            Resolution::Default(deadline) => self.record_default(*deadline),
            Resolution::Malformed { raw, fallback } => {
                tracing::warn!(
                    header = %self.header,
                    value = ?raw,
                    "Invalid {} header value received: {:?}. Using default deadline.",
                    self.header,
                    raw
                );
                metrics::record_malformed_header();
                if let Some(deadline) = fallback {
                    self.record_default(*deadline);
                }
            }
        }
    }

    fn record_default(&self, deadline: Deadline) {
        tracing::debug!(
            %deadline,
            timeout_secs = self.default_timeout.map(|t| t.as_secs_f64()),
            "Applying default deadline"
        );
        metrics::record_deadline_resolved(DeadlineSource::Default);
    }
}

impl Default for DeadlineResolver {
    fn default() -> Self {
        Self::new(DEFAULT_HEADER, None)
    }
}
