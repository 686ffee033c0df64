//! Insertion-ordered registry of named instruments.

use std::fmt;
use std::sync::Arc;

use crate::{Instrument, InstrumentError, InstrumentResult};

/// Registry that maps names to instruments, preserving registration order.
///
/// Iteration order is the order of registration, which keeps aggregated
/// snapshots deterministic.
#[derive(Clone, Default)]
pub struct InstrumentRegistry {
    entries: Vec<(String, Arc<dyn Instrument>)>,
}

impl fmt::Debug for InstrumentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentRegistry")
            .field("registered", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

impl InstrumentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an instrument under its own [`Instrument::name`].
    ///
    /// # Errors
    ///
    /// Returns [`InstrumentError::DuplicateInstrument`] if the name is taken.
    pub fn register(&mut self, instrument: Arc<dyn Instrument>) -> InstrumentResult<()> {
        let name = instrument.name().to_owned();
        self.register_as(name, instrument)
    }

    /// Registers an instrument under an explicit name.
    ///
    /// # Errors
    ///
    /// Returns [`InstrumentError::DuplicateInstrument`] if the name is taken.
    pub fn register_as(
        &mut self,
        name: impl Into<String>,
        instrument: Arc<dyn Instrument>,
    ) -> InstrumentResult<()> {
        let name = name.into();
        if self.contains(&name) {
            return Err(InstrumentError::DuplicateInstrument { name });
        }
        self.entries.push((name, instrument));
        Ok(())
    }

    /// Returns `true` if an instrument is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(entry, _)| entry == name)
    }

    /// Looks up an instrument by name.
    ///
    /// # Errors
    ///
    /// Returns [`InstrumentError::NotFound`] when nothing is registered under `name`.
    pub fn get(&self, name: &str) -> InstrumentResult<Arc<dyn Instrument>> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, instrument)| Arc::clone(instrument))
            .ok_or_else(|| InstrumentError::not_found(name))
    }

    /// Builds a registry holding only the requested instruments.
    ///
    /// The result keeps registration order, not request order, and ignores
    /// repeated names.
    ///
    /// # Errors
    ///
    /// Returns [`InstrumentError::NotFound`] for the first requested name that
    /// is not registered.
    pub fn select<I, S>(&self, names: I) -> InstrumentResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut wanted = Vec::new();
        for name in names {
            let name = name.as_ref();
            if !self.contains(name) {
                return Err(InstrumentError::not_found(name));
            }
            wanted.push(name.to_owned());
        }

        let entries = self
            .entries
            .iter()
            .filter(|(name, _)| wanted.contains(name))
            .cloned()
            .collect();
        Ok(Self { entries })
    }

    /// Names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Iterates over `(name, instrument)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Instrument>)> {
        self.entries
            .iter()
            .map(|(name, instrument)| (name.as_str(), instrument))
    }

    /// Number of registered instruments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
