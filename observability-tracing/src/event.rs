//! Event shapes written to trace files.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::TraceError;

/// Transitions of one function invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationEventKind {
    /// Invocation was put on the internal invoke queue.
    Enqueued,
    /// A worker picked the invocation up and submitted it to its pool.
    Submitted,
    /// The function is being invoked.
    Invoking,
    /// The invocation succeeded.
    Successful,
    /// The invocation failed; the event carries a failure cause.
    Failed,
    /// The invocation hit a throttle or system error and will be retried.
    Retry,
}

impl InvocationEventKind {
    /// All kinds, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Enqueued,
        Self::Submitted,
        Self::Invoking,
        Self::Successful,
        Self::Failed,
        Self::Retry,
    ];

    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enqueued => "enqueued",
            Self::Submitted => "submitted",
            Self::Invoking => "invoking",
            Self::Successful => "successful",
            Self::Failed => "failed",
            Self::Retry => "retry",
        }
    }
}

impl fmt::Display for InvocationEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvocationEventKind {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TraceError::UnknownEventKind(s.to_owned()))
    }
}

/// One transition of a function invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationEvent {
    /// Seconds since the Unix epoch, captured when the transition was observed.
    pub timestamp: f64,
    /// Transition that happened.
    pub event: InvocationEventKind,
    /// Request id of the invocation.
    pub request_id: String,
    /// ARN of the invoked function.
    pub function_arn: String,
    /// Failure classification, for `failed` and `retry`.
    #[serde(default)]
    pub failure_cause: Option<String>,
}

/// Transitions of a message travelling from a queue to a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSourceEventKind {
    /// Message was added to a queue backing an event source mapping.
    MessageQueued,
    /// Message was received by the event source poller.
    MessageDequeued,
    /// Message was turned into an asynchronous invocation and queued.
    InvokeQueued,
    /// The function is being invoked with the message.
    Invoke,
    /// Invocation completed without error.
    InvokeSuccess,
    /// Invocation completed with an error.
    InvokeError,
    /// Invocation could not be attempted.
    InvokeException,
}

impl EventSourceEventKind {
    /// All kinds, in pipeline order.
    pub const ALL: [Self; 7] = [
        Self::MessageQueued,
        Self::MessageDequeued,
        Self::InvokeQueued,
        Self::Invoke,
        Self::InvokeSuccess,
        Self::InvokeError,
        Self::InvokeException,
    ];

    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MessageQueued => "message_queued",
            Self::MessageDequeued => "message_dequeued",
            Self::InvokeQueued => "invoke_queued",
            Self::Invoke => "invoke",
            Self::InvokeSuccess => "invoke_success",
            Self::InvokeError => "invoke_error",
            Self::InvokeException => "invoke_exception",
        }
    }
}

impl fmt::Display for EventSourceEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventSourceEventKind {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TraceError::UnknownEventKind(s.to_owned()))
    }
}

/// One transition in the queue-to-function pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSourceEvent {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    /// Transition that happened.
    pub event: EventSourceEventKind,
    /// Id of the queue message.
    pub message_id: String,
    /// ARN of the queue the message came from.
    pub event_source_arn: String,
    /// Function the message is routed to, once known.
    #[serde(default)]
    pub function_arn: Option<String>,
    /// Request id of the invocation, once assigned.
    #[serde(default)]
    pub request_id: Option<String>,
    /// Failure classification for `invoke_error` and `invoke_exception`.
    #[serde(default)]
    pub failure_cause: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn invocation_event_serializes_every_field() {
        let event = InvocationEvent {
            timestamp: 1.5,
            event: InvocationEventKind::Enqueued,
            request_id: "1".into(),
            function_arn: "arn:aws:lambda:us-east-1:000000000000:function:f".into(),
            failure_cause: None,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "timestamp": 1.5,
                "event": "enqueued",
                "request_id": "1",
                "function_arn": "arn:aws:lambda:us-east-1:000000000000:function:f",
                "failure_cause": null,
            })
        );
    }

    #[test]
    fn kind_names_round_trip_through_from_str() {
        for kind in InvocationEventKind::ALL {
            assert_eq!(kind.as_str().parse::<InvocationEventKind>().unwrap(), kind);
        }
        for kind in EventSourceEventKind::ALL {
            assert_eq!(kind.to_string().parse::<EventSourceEventKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = "exploded".parse::<InvocationEventKind>().unwrap_err();
        assert!(matches!(err, TraceError::UnknownEventKind(kind) if kind == "exploded"));
    }
}
