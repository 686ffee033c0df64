//! Reading trace files back, and the per-invocation timeline summary.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use chrono::{DateTime, SecondsFormat};
use serde::de::DeserializeOwned;
use tokio::fs;
use tracing::debug;

use crate::{InvocationEvent, InvocationEventKind, TraceResult};

/// Events parsed from a trace file.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceReadout<E> {
    /// Parsed events, in file order.
    pub events: Vec<E>,
    /// Lines that could not be parsed, such as a torn trailing write.
    pub skipped: usize,
}

/// Parses a trace file line by line.
///
/// Blank lines are ignored. Lines that do not parse as `E`, including a
/// trailing line cut inside a multi-byte character, are counted in
/// [`TraceReadout::skipped`] instead of failing the read.
///
/// # Errors
///
/// Returns [`TraceError::Io`](crate::TraceError::Io) if the file cannot be read.
pub async fn read_trace_file<E: DeserializeOwned>(
    path: impl AsRef<Path>,
) -> TraceResult<TraceReadout<E>> {
    let path = path.as_ref();
    let data = fs::read(path).await?;

    let mut events = Vec::new();
    let mut skipped = 0;
    for (index, line) in data.split(|byte| *byte == b'\n').enumerate() {
        let line = line.trim_ascii();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_slice(line) {
            Ok(event) => events.push(event),
            Err(err) => {
                skipped += 1;
                debug!(
                    path = %path.display(),
                    line = index + 1,
                    %err,
                    "skipping unparsable trace line"
                );
            }
        }
    }
    Ok(TraceReadout { events, skipped })
}

/// Renders a Unix timestamp as RFC 3339 with microsecond precision.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn format_timestamp(timestamp: f64) -> String {
    DateTime::from_timestamp_micros((timestamp * 1_000_000.0).round() as i64).map_or_else(
        || timestamp.to_string(),
        |at| at.to_rfc3339_opts(SecondsFormat::Micros, true),
    )
}

/// Timeline of one invocation: when each transition was seen.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationTimeline {
    /// Request id of the invocation.
    pub request_id: String,
    /// ARN of the invoked function.
    pub function_arn: String,
    timestamps: BTreeMap<InvocationEventKind, Vec<f64>>,
}

impl InvocationTimeline {
    /// Timestamps of every occurrence of `kind`, in file order.
    #[must_use]
    pub fn timestamps(&self, kind: InvocationEventKind) -> &[f64] {
        self.timestamps
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Occurrences of `kind` rendered as RFC 3339, comma separated.
    #[must_use]
    pub fn rendered(&self, kind: InvocationEventKind) -> String {
        self.timestamps(kind)
            .iter()
            .map(|timestamp| format_timestamp(*timestamp))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Invocation events pivoted into one timeline per `(request_id, function_arn)`.
///
/// Timelines keep the order in which their invocation first appeared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvocationSummary {
    timelines: Vec<InvocationTimeline>,
}

impl InvocationSummary {
    /// Groups the supplied events.
    #[must_use]
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a InvocationEvent>) -> Self {
        let mut timelines: Vec<InvocationTimeline> = Vec::new();
        for event in events {
            let position = timelines.iter().position(|timeline| {
                timeline.request_id == event.request_id
                    && timeline.function_arn == event.function_arn
            });
            let timeline = if let Some(index) = position {
                &mut timelines[index]
            } else {
                timelines.push(InvocationTimeline {
                    request_id: event.request_id.clone(),
                    function_arn: event.function_arn.clone(),
                    timestamps: BTreeMap::new(),
                });
                let last = timelines.len() - 1;
                &mut timelines[last]
            };
            timeline
                .timestamps
                .entry(event.event)
                .or_default()
                .push(event.timestamp);
        }
        Self { timelines }
    }

    /// Timelines, one per invocation.
    #[must_use]
    pub fn timelines(&self) -> &[InvocationTimeline] {
        &self.timelines
    }

    /// Looks up the timeline of one invocation.
    #[must_use]
    pub fn get(&self, request_id: &str, function_arn: &str) -> Option<&InvocationTimeline> {
        self.timelines.iter().find(|timeline| {
            timeline.request_id == request_id && timeline.function_arn == function_arn
        })
    }
}

impl fmt::Display for InvocationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request_id\tfunction_arn")?;
        for kind in InvocationEventKind::ALL {
            write!(f, "\t{kind}")?;
        }
        writeln!(f)?;
        for timeline in &self.timelines {
            write!(f, "{}\t{}", timeline.request_id, timeline.function_arn)?;
            for kind in InvocationEventKind::ALL {
                write!(f, "\t{}", timeline.rendered(kind))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
