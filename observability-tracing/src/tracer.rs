//! Thread-safe event buffer drained by the trace file logger.

use std::fmt;
use std::mem;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

/// Anything a [`TraceFileLogger`](crate::TraceFileLogger) can drain.
pub trait TraceSource: Send + Sync {
    /// Event type written as one JSON line per event.
    type Event: Serialize + Send;

    /// Removes and returns every buffered event, oldest first.
    fn flush(&self) -> Vec<Self::Event>;
}

/// Ordered buffer of events shared by any number of producers.
///
/// `append` and `flush` share one lock. A flush takes the whole buffer and
/// leaves it empty in the same critical section, so every appended event is
/// returned by exactly one flush. Producers never wait on anything but that
/// lock.
pub struct EventTracer<E> {
    records: Mutex<Vec<E>>,
}

impl<E> EventTracer<E> {
    /// Creates an empty tracer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    /// Appends one event.
    ///
    /// A producer that panicked while holding the lock leaves the buffer
    /// usable; appends continue on the recovered guard.
    pub fn append(&self, event: E) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Takes every buffered event, leaving the buffer empty.
    pub fn drain(&self) -> Vec<E> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        mem::take(&mut *records)
    }

    /// Number of events waiting for the next drain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` when nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E> Default for EventTracer<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventTracer<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTracer")
            .field("buffered", &self.len())
            .finish()
    }
}

impl<E> TraceSource for EventTracer<E>
where
    E: Serialize + Send,
{
    type Event = E;

    fn flush(&self) -> Vec<E> {
        self.drain()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    use super::*;

    #[test]
    fn flush_returns_everything_then_nothing() {
        let tracer = Arc::new(EventTracer::new());
        let producers: Vec<_> = (0..8u32)
            .map(|producer| {
                let tracer = Arc::clone(&tracer);
                thread::spawn(move || {
                    for seq in 0..500u32 {
                        tracer.append((producer, seq));
                    }
                })
            })
            .collect();
        for handle in producers {
            handle.join().unwrap();
        }

        let events = tracer.flush();
        assert_eq!(events.len(), 4000);
        for producer in 0..8 {
            let seqs: Vec<_> = events
                .iter()
                .filter(|(p, _)| *p == producer)
                .map(|(_, seq)| *seq)
                .collect();
            assert_eq!(seqs, (0..500).collect::<Vec<_>>());
        }
        assert!(tracer.flush().is_empty());
    }

    #[test]
    fn concurrent_flushes_neither_lose_nor_duplicate() {
        let tracer = Arc::new(EventTracer::new());
        let done = Arc::new(AtomicBool::new(false));

        let flusher = {
            let tracer = Arc::clone(&tracer);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut seen = Vec::new();
                while !done.load(Ordering::SeqCst) {
                    seen.extend(tracer.flush());
                    thread::yield_now();
                }
                seen
            })
        };

        let producers: Vec<_> = (0..4u32)
            .map(|producer| {
                let tracer = Arc::clone(&tracer);
                thread::spawn(move || {
                    for seq in 0..1000u32 {
                        tracer.append(producer * 1000 + seq);
                    }
                })
            })
            .collect();
        for handle in producers {
            handle.join().unwrap();
        }
        done.store(true, Ordering::SeqCst);

        let mut seen = flusher.join().unwrap();
        seen.extend(tracer.flush());

        let unique: HashSet<_> = seen.iter().copied().collect();
        assert_eq!(seen.len(), 4000);
        assert_eq!(unique.len(), 4000);
    }

    #[test]
    fn flush_is_idempotent_without_appends() {
        let tracer = EventTracer::<u8>::default();
        tracer.append(1);
        assert_eq!(tracer.len(), 1);
        assert_eq!(tracer.flush(), [1]);
        assert!(tracer.flush().is_empty());
        assert!(tracer.is_empty());
    }

    #[test]
    fn poisoned_buffer_keeps_accepting_events() {
        let tracer = Arc::new(EventTracer::new());
        tracer.append(1);
        let poisoner = Arc::clone(&tracer);
        let _ = thread::spawn(move || {
            let _guard = poisoner.records.lock().unwrap();
            panic!("producer crashed while holding the lock");
        })
        .join();

        tracer.append(2);
        assert_eq!(tracer.flush(), [1, 2]);
    }
}
