//! The tracking entry point
//!
//! [`Tealium`] ties the pieces together: every tracked event is the
//! persistent payload, plus the event name, plus the volatile fields, plus
//! whatever the caller supplies, sent in one dispatch.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Config, LibraryContext, DEFAULT_ENDPOINT};
use crate::dispatch::{DispatchCallback, Dispatcher, HttpTransport, Transport};
use crate::error::{Error, Result};
use crate::payload::Payload;
use crate::session::{keys, SessionDataManager};
use crate::storage::{FileTextStore, TextStore};

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Tracks events for one account/profile/environment
pub struct Tealium<S = FileTextStore, T = HttpTransport> {
    context: LibraryContext,
    data: SessionDataManager<S>,
    dispatcher: Dispatcher<T>,
}

/// Builder for [`Tealium`]
#[derive(Debug, Clone)]
pub struct Builder {
    context: LibraryContext,
    endpoint: String,
    timeout: Duration,
    storage_dir: Option<PathBuf>,
}

impl Tealium {
    /// Start building a tracker. Account, profile, and environment are
    /// required and must not be empty.
    pub fn builder(
        account: impl Into<String>,
        profile: impl Into<String>,
        environment: impl Into<String>,
    ) -> Result<Builder> {
        let context = LibraryContext::new(account, profile, environment);
        context.validate()?;

        Ok(Builder {
            context,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            storage_dir: None,
        })
    }

    /// Build a tracker from loaded configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        Builder {
            context: config.library_context(),
            endpoint: config.dispatch.endpoint.clone(),
            timeout: config.dispatch.timeout(),
            storage_dir: Some(config.storage_dir()),
        }
        .build()
    }
}

impl Builder {
    /// Upper bound on how long one dispatch may block
    pub fn timeout(mut self, timeout: Duration) -> Result<Self> {
        if timeout.is_zero() {
            return Err(Error::Config(
                "timeout should be greater than zero".to_string(),
            ));
        }
        self.timeout = timeout;
        Ok(self)
    }

    /// Collect endpoint, without query string
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn datasource(mut self, datasource: impl Into<String>) -> Self {
        self.context = self.context.with_datasource(datasource);
        self
    }

    /// Directory for the persisted payload (defaults to the XDG data dir)
    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }

    /// Build with file storage and the HTTP transport
    pub fn build(self) -> Result<Tealium> {
        let dir = self.storage_dir.clone().unwrap_or_else(Config::data_dir);
        let store = FileTextStore::for_context(&dir, &self.context);
        let transport = HttpTransport::new()?;
        Ok(self.build_with(store, transport))
    }

    /// Build with caller-supplied storage and transport
    pub fn build_with<S: TextStore, T: Transport>(self, store: S, transport: T) -> Tealium<S, T> {
        let data = SessionDataManager::new(&self.context, store);
        let dispatcher = Dispatcher::with_transport(self.endpoint, self.timeout, transport);

        tracing::info!(
            account = %self.context.account,
            profile = %self.context.profile,
            environment = %self.context.environment,
            endpoint = %dispatcher.endpoint(),
            "Tracker ready"
        );

        Tealium {
            context: self.context,
            data,
            dispatcher,
        }
    }
}

impl<S: TextStore, T: Transport> Tealium<S, T> {
    /// Track an event by name with no extra data and no callback
    pub fn track_event(&self, event_name: &str) -> Result<()> {
        self.track(Some(event_name), None, None)
    }

    /// Track an event
    ///
    /// Caller `data` is merged last, so it overrides persistent and volatile
    /// fields of the same name. Only hard-stop dispatch failures are returned;
    /// everything else is reported to `callback`.
    ///
    /// With the HTTP transport this blocks the calling thread for up to the
    /// configured timeout. Called from inside a tokio runtime it returns a
    /// connection setup error without sending; use `spawn_blocking` there.
    pub fn track(
        &self,
        event_name: Option<&str>,
        data: Option<&Payload>,
        callback: Option<&dyn DispatchCallback>,
    ) -> Result<()> {
        let payload = self.event_payload(event_name, data);

        self.dispatcher.dispatch(&payload, callback).map_err(|e| {
            tracing::error!(error = %e, "Failed to track event");
            Error::from(e)
        })
    }

    /// The payload [`Tealium::track`] would send
    pub fn event_payload(&self, event_name: Option<&str>, data: Option<&Payload>) -> Payload {
        let mut payload = self.data.persistent_payload().clone();
        if let Some(name) = event_name {
            payload.put(keys::EVENT_NAME, name);
            payload.put(keys::TEALIUM_EVENT, name);
        }
        payload.merge(&self.data.volatile_fields());
        if let Some(data) = data {
            payload.merge(data);
        }
        payload
    }

    pub fn account(&self) -> &str {
        &self.context.account
    }

    pub fn profile(&self) -> &str {
        &self.context.profile
    }

    pub fn environment(&self) -> &str {
        &self.context.environment
    }

    pub fn context(&self) -> &LibraryContext {
        &self.context
    }

    pub fn data_manager(&self) -> &SessionDataManager<S> {
        &self.data
    }

    pub fn data_manager_mut(&mut self) -> &mut SessionDataManager<S> {
        &mut self.data
    }

    pub fn dispatcher(&self) -> &Dispatcher<T> {
        &self.dispatcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Value;
    use crate::storage::MemoryTextStore;

    fn tracker() -> Tealium<MemoryTextStore, HttpTransport> {
        Tealium::builder("tealiummobile", "demo", "dev")
            .unwrap()
            .endpoint("http://127.0.0.1:1/event")
            .build_with(MemoryTextStore::new(), HttpTransport::new().unwrap())
    }

    #[test]
    fn test_builder_rejects_empty_identity() {
        assert!(Tealium::builder("", "demo", "dev").is_err());
        assert!(Tealium::builder("acct", "", "dev").is_err());
        assert!(Tealium::builder("acct", "demo", "").is_err());
    }

    #[test]
    fn test_builder_rejects_zero_timeout() {
        let builder = Tealium::builder("acct", "demo", "dev").unwrap();
        assert!(builder.clone().timeout(Duration::ZERO).is_err());
        assert!(builder.timeout(Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_accessors() {
        let tealium = tracker();
        assert_eq!(tealium.account(), "tealiummobile");
        assert_eq!(tealium.profile(), "demo");
        assert_eq!(tealium.environment(), "dev");
        assert_eq!(tealium.dispatcher().endpoint(), "http://127.0.0.1:1/event");
        assert_eq!(tealium.dispatcher().timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_event_payload_layers() {
        let tealium = tracker();
        let mut data = Payload::new();
        data.put("screen", "home");
        data.put(keys::TEALIUM_ACCOUNT, "override");

        let payload = tealium.event_payload(Some("launch"), Some(&data));

        assert_eq!(payload.get(keys::EVENT_NAME).and_then(Value::as_str), Some("launch"));
        assert_eq!(payload.get(keys::TEALIUM_EVENT).and_then(Value::as_str), Some("launch"));
        assert!(payload.contains_key(keys::TEALIUM_VISITOR_ID));
        assert!(payload.contains_key(keys::TEALIUM_RANDOM));
        assert_eq!(payload.get("screen").and_then(Value::as_str), Some("home"));
        assert_eq!(
            payload.get(keys::TEALIUM_ACCOUNT).and_then(Value::as_str),
            Some("override")
        );
    }

    #[test]
    fn test_tracking_does_not_touch_persistent_payload() {
        let tealium = tracker();
        let before = tealium.data_manager().persistent_payload().clone();

        tealium.event_payload(Some("launch"), None);

        assert_eq!(tealium.data_manager().persistent_payload(), &before);
        assert!(!before.contains_key(keys::EVENT_NAME));
    }
}
