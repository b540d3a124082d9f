//! Session and visitor identity
//!
//! [`SessionDataManager`] owns the persistent payload (visitor id, library
//! identity, account details) for the life of the process and computes the
//! volatile fields that accompany every dispatch.

use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

use crate::config::LibraryContext;
use crate::error::Result;
use crate::payload::{IntoValue, Payload};
use crate::persistent::{LoadOutcome, PersistentPayloadStore};
use crate::storage::TextStore;

/// Well-known payload keys
pub mod keys {
    pub const EVENT_NAME: &str = "event_name";
    pub const TEALIUM_ACCOUNT: &str = "tealium_account";
    pub const TEALIUM_DATASOURCE: &str = "tealium_datasource";
    pub const TEALIUM_ENVIRONMENT: &str = "tealium_environment";
    pub const TEALIUM_EVENT: &str = "tealium_event";
    pub const TEALIUM_EVENT_TYPE: &str = "tealium_event_type";
    pub const TEALIUM_LIBRARY_NAME: &str = "tealium_library_name";
    pub const TEALIUM_LIBRARY_VERSION: &str = "tealium_library_version";
    pub const TEALIUM_PROFILE: &str = "tealium_profile";
    pub const TEALIUM_RANDOM: &str = "tealium_random";
    pub const TEALIUM_SESSION_ID: &str = "tealium_session_id";
    pub const TEALIUM_TIMESTAMP_EPOCH: &str = "tealium_timestamp_epoch";
    pub const TEALIUM_VISITOR_ID: &str = "tealium_visitor_id";
    /// Older name of the visitor id, still written for migrating consumers
    pub const TEALIUM_VID: &str = "tealium_vid";
}

/// Values for [`keys::TEALIUM_EVENT_TYPE`]
pub mod event_type {
    pub const ACTIVITY: &str = "activity";
    pub const CONVERSION: &str = "conversion";
    pub const DERIVED: &str = "derived";
    pub const INTERACTION: &str = "interaction";
    pub const VIEW: &str = "view";
}

pub const LIBRARY_NAME: &str = "rust";
pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");

const NONCE_MODULUS: i64 = 10_000_000_000_000_000;

/// Owns the persistent payload and the current session id
pub struct SessionDataManager<S> {
    store: PersistentPayloadStore<S>,
    persistent: Payload,
    session_id: String,
}

impl<S: TextStore> SessionDataManager<S> {
    /// Load the persistent payload from `store`, minting a fresh identity if
    /// nothing usable is stored
    pub fn new(context: &LibraryContext, store: S) -> Self {
        let mut store = PersistentPayloadStore::new(store);
        let outcome = store.read_or_create(default_persistent_payload(context));

        if let LoadOutcome::Fallback { .. } = outcome {
            tracing::info!(
                account = %context.account,
                profile = %context.profile,
                "Created new persistent identity"
            );
        }

        Self {
            store,
            persistent: outcome.into_payload(),
            session_id: timestamp_millis(),
        }
    }

    /// The cached persistent payload
    pub fn persistent_payload(&self) -> &Payload {
        &self.persistent
    }

    /// Merge `fields` into the persistent payload and write it back
    ///
    /// Fails only when the payload can't be serialized; storage failures are
    /// logged and the in-memory payload stays authoritative.
    pub fn add_persistent_data<I, K, V>(&mut self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: IntoValue,
    {
        self.persistent.put_all(fields);
        self.store.write(&self.persistent)
    }

    /// Timestamp, nonce, and session id for one dispatch
    pub fn volatile_fields(&self) -> Payload {
        let mut fields = Payload::new();
        fields.put(keys::TEALIUM_TIMESTAMP_EPOCH, Utc::now().timestamp());
        fields.put(keys::TEALIUM_RANDOM, random_nonce());
        fields.put(keys::TEALIUM_SESSION_ID, self.session_id.as_str());
        fields
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Start a new session, identified by the current time in milliseconds
    pub fn reset_session_id(&mut self) -> &str {
        self.session_id = timestamp_millis();
        tracing::debug!(session_id = %self.session_id, "Session reset");
        &self.session_id
    }

    /// Whether persistent text is present in storage
    pub fn persistent_data_exists(&self) -> bool {
        self.store.exists()
    }

    pub fn store(&self) -> &PersistentPayloadStore<S> {
        &self.store
    }
}

/// The payload used when no persisted one can be loaded
pub fn default_persistent_payload(context: &LibraryContext) -> Payload {
    let visitor_id = new_visitor_id();

    let mut payload = Payload::new();
    payload.put(keys::TEALIUM_LIBRARY_NAME, LIBRARY_NAME);
    payload.put(keys::TEALIUM_LIBRARY_VERSION, LIBRARY_VERSION);
    payload.put(keys::TEALIUM_ACCOUNT, context.account.as_str());
    payload.put(keys::TEALIUM_PROFILE, context.profile.as_str());
    payload.put(keys::TEALIUM_ENVIRONMENT, context.environment.as_str());
    payload.put(keys::TEALIUM_DATASOURCE, context.datasource.as_deref());
    payload.put(keys::TEALIUM_VISITOR_ID, visitor_id.as_str());
    payload.put(keys::TEALIUM_VID, visitor_id);
    payload
}

/// 128 random bits as 32 lowercase hex digits
fn new_visitor_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// A random value below 10^16, zero-padded to 16 digits
fn random_nonce() -> String {
    let value: i64 = rand::rng().random();
    format_nonce(value)
}

fn format_nonce(value: i64) -> String {
    format!("{:016}", (value % NONCE_MODULUS).unsigned_abs())
}

fn timestamp_millis() -> String {
    Utc::now().timestamp_millis().to_string()
}
