use crate::reading::Reading;
use std::sync::{Arc, RwLock};

/// Single-slot store for the most recent reading. The MQTT listener is
/// the only writer; the fan-out path and the persistence sampler read.
/// A new reading unconditionally replaces the previous one.
#[derive(Debug, Clone, Default)]
pub struct ReadingCache {
    slot: Arc<RwLock<Option<Reading>>>,
}

impl ReadingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Reading> {
        self.slot.read().ok().and_then(|guard| guard.clone())
    }

    pub fn set(&self, reading: Reading) {
        if let Ok(mut guard) = self.slot.write() {
            *guard = Some(reading);
        }
    }
}
