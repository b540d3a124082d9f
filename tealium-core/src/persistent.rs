//! The durable payload
//!
//! [`PersistentPayloadStore`] loads the payload kept in a [`TextStore`],
//! accepting the JSON form first and the legacy percent-encoded form second.
//! When neither decodes, or nothing can be read, the caller's default is used
//! and written back. Storage problems never reach the caller: the in-memory
//! payload is authoritative for the running process.

use crate::error::Result;
use crate::payload::Payload;
use crate::storage::TextStore;

/// The wire form a stored payload was decoded from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredFormat {
    Json,
    PercentEncoded,
}

/// Where the store is in its load cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Uninitialized,
    Loading,
    Loaded(StoredFormat),
    Fallback,
}

/// Result of [`PersistentPayloadStore::read_or_create`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Stored text decoded successfully
    Loaded {
        payload: Payload,
        format: StoredFormat,
    },
    /// Storage was unreadable or undecodable; the default is in use
    Fallback { payload: Payload },
}

impl LoadOutcome {
    pub fn payload(&self) -> &Payload {
        match self {
            LoadOutcome::Loaded { payload, .. } | LoadOutcome::Fallback { payload } => payload,
        }
    }

    pub fn into_payload(self) -> Payload {
        match self {
            LoadOutcome::Loaded { payload, .. } | LoadOutcome::Fallback { payload } => payload,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, LoadOutcome::Fallback { .. })
    }

    fn state(&self) -> LoadState {
        match self {
            LoadOutcome::Loaded { format, .. } => LoadState::Loaded(*format),
            LoadOutcome::Fallback { .. } => LoadState::Fallback,
        }
    }
}

/// Load-or-create access to one durable payload
pub struct PersistentPayloadStore<S> {
    store: S,
    state: LoadState,
}

impl<S: TextStore> PersistentPayloadStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            state: LoadState::Uninitialized,
        }
    }

    /// Load the stored payload, or fall back to `default`
    ///
    /// Tries JSON, then the legacy form. On fallback the default is persisted
    /// on a best-effort basis.
    pub fn read_or_create(&mut self, default: Payload) -> LoadOutcome {
        self.state = LoadState::Loading;

        let outcome = match self.store.read_text() {
            Ok(text) => match decode(&text) {
                Some((payload, format)) => {
                    tracing::debug!(?format, entries = payload.len(), "Loaded persistent payload");
                    LoadOutcome::Loaded { payload, format }
                }
                None => {
                    tracing::warn!("Stored payload is not decodable, using defaults");
                    self.fall_back(default)
                }
            },
            Err(e) => {
                tracing::debug!(error = %e, "No readable persistent payload, using defaults");
                self.fall_back(default)
            }
        };

        self.state = outcome.state();
        outcome
    }

    /// Run the load again, e.g. after storage was changed externally
    pub fn reload(&mut self, default: Payload) -> LoadOutcome {
        self.read_or_create(default)
    }

    /// Persist `payload` as JSON
    ///
    /// Serialization failures are returned. Storage failures are logged and
    /// swallowed.
    pub fn write(&mut self, payload: &Payload) -> Result<()> {
        let text = payload.to_json()?;
        if let Err(e) = self.store.write_text(&text) {
            tracing::warn!(error = %e, "Failed to persist payload, keeping it in memory only");
        }
        Ok(())
    }

    /// Whether any payload text is stored
    pub fn exists(&self) -> bool {
        self.store.exists()
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn text_store(&self) -> &S {
        &self.store
    }

    fn fall_back(&mut self, default: Payload) -> LoadOutcome {
        if let Err(e) = self.write(&default) {
            tracing::warn!(error = %e, "Failed to persist default payload");
        }
        LoadOutcome::Fallback { payload: default }
    }
}

fn decode(text: &str) -> Option<(Payload, StoredFormat)> {
    if let Ok(payload) = Payload::from_json(text) {
        return Some((payload, StoredFormat::Json));
    }
    Payload::from_percent_encoded(text)
        .ok()
        .map(|payload| (payload, StoredFormat::PercentEncoded))
}
