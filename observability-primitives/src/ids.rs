//! Session identifiers and the trace file names derived from them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Extension of every trace file written for a session.
pub const TRACE_FILE_SUFFIX: &str = ".ndjson.log";

/// Identifies one process lifetime. Every trace file written during that
/// lifetime is named after it, so files of one run sort together.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Starts a new session.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// File name of this session's trace file, `<session>.ndjson.log`.
    #[must_use]
    pub fn trace_file_name(self) -> String {
        format!("{self}{TRACE_FILE_SUFFIX}")
    }

    /// Recovers the session from a trace file name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSessionId`] when the name does not end in
    /// [`TRACE_FILE_SUFFIX`] or its stem is not a session id.
    pub fn from_trace_file_name(name: &str) -> Result<Self> {
        name.strip_suffix(TRACE_FILE_SUFFIX)
            .ok_or_else(|| Error::InvalidSessionId {
                value: name.to_owned(),
            })?
            .parse()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::random()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Hyphenated lowercase, as used in file names.
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for SessionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::try_parse(s)
            .map(Self)
            .map_err(|_| Error::InvalidSessionId {
                value: s.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_file_name_round_trips() {
        let session = SessionId::random();
        let name = session.trace_file_name();
        assert!(name.ends_with(".ndjson.log"));
        assert_eq!(SessionId::from_trace_file_name(&name).unwrap(), session);
    }

    #[test]
    fn foreign_file_names_are_rejected() {
        let session = SessionId::random();
        for name in [
            session.to_string(),
            format!("{session}.json"),
            "notes.ndjson.log".to_owned(),
        ] {
            let err = SessionId::from_trace_file_name(&name).unwrap_err();
            assert!(matches!(err, Error::InvalidSessionId { .. }), "{name}");
        }
    }

    #[test]
    fn sessions_are_distinct() {
        assert_ne!(SessionId::random(), SessionId::default());
    }
}
