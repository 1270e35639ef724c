//! Telemetry connections
//!
//! A [`TelemetryConnection`] ties one [`SharedStore`] to its readiness signal and a
//! [`VariableRegistry`]. It hands out independent [`SnapshotReader`]s and spawns
//! [`SnapshotStream`]s; it never holds a snapshot itself.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::commands::CommandClient;
use crate::driver::{Driver, SnapshotStream};
use crate::memory::{ReadySignal, ReaderConfig, SessionInfoText, SharedStore, SnapshotReader};
use crate::registry::VariableRegistry;
use crate::schema::ConnectionHeader;
use crate::Result;

/// Name of the simulator's shared memory mapping.
pub const DEFAULT_MEMORY_NAME: &str = "Local\\IRSDKMemMapFileName";
/// Name of the simulator's data-valid event.
pub const DEFAULT_EVENT_NAME: &str = "Local\\IRSDKDataValidEvent";
/// Name of the registered broadcast window message.
pub const DEFAULT_BROADCAST_MESSAGE: &str = "IRSDK_BROADCASTMSG";

/// Where to find the simulator and how to read from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub memory_name: String,
    pub event_name: String,
    pub broadcast_message_name: String,
    pub reader: ReaderConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            memory_name: DEFAULT_MEMORY_NAME.to_string(),
            event_name: DEFAULT_EVENT_NAME.to_string(),
            broadcast_message_name: DEFAULT_BROADCAST_MESSAGE.to_string(),
            reader: ReaderConfig::default(),
        }
    }
}

impl ConnectionConfig {
    pub fn with_memory_name(mut self, name: impl Into<String>) -> Self {
        self.memory_name = name.into();
        self
    }

    pub fn with_event_name(mut self, name: impl Into<String>) -> Self {
        self.event_name = name.into();
        self
    }

    pub fn with_broadcast_message_name(mut self, name: impl Into<String>) -> Self {
        self.broadcast_message_name = name.into();
        self
    }

    pub fn with_reader(mut self, reader: ReaderConfig) -> Self {
        self.reader = reader;
        self
    }
}

/// An open connection to a publisher's shared snapshot store.
#[derive(Clone)]
pub struct TelemetryConnection {
    store: Arc<SharedStore>,
    signal: Arc<dyn ReadySignal>,
    config: ConnectionConfig,
    registry: Arc<VariableRegistry>,
}

impl std::fmt::Debug for TelemetryConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryConnection")
            .field("store", &self.store)
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl TelemetryConnection {
    /// Build a connection from an already opened store and signal.
    pub fn from_parts(
        store: Arc<SharedStore>,
        signal: Arc<dyn ReadySignal>,
        config: ConnectionConfig,
    ) -> Self {
        Self { store, signal, config, registry: Arc::new(VariableRegistry::new()) }
    }

    /// Open the named mapping and event described by `config`.
    #[cfg(windows)]
    pub fn open(config: ConnectionConfig) -> Result<Self> {
        tracing::info!(memory = %config.memory_name, event = %config.event_name, "Connecting to simulator");
        let store = Arc::new(crate::windows::open_shared_store(&config.memory_name)?);
        let signal: Arc<dyn ReadySignal> =
            Arc::new(crate::windows::NamedEventSignal::open(&config.event_name)?);
        tracing::info!(
            tick_rate = store.header().tick_rate(),
            variables = store.header().variable_count(),
            "Connected to simulator"
        );
        Ok(Self::from_parts(store, signal, config))
    }

    #[cfg(not(windows))]
    pub fn open(_config: ConnectionConfig) -> Result<Self> {
        Err(crate::TelemetryError::unsupported_platform("Live telemetry", "Windows"))
    }

    /// Share `registry` with other connections instead of this connection's own.
    pub fn with_registry(mut self, registry: Arc<VariableRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// A new reader with its own last-returned tick.
    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader::new(Arc::clone(&self.store), Arc::clone(&self.signal), self.config.reader.clone())
    }

    pub fn store(&self) -> &Arc<SharedStore> {
        &self.store
    }

    pub fn header(&self) -> &ConnectionHeader {
        self.store.header()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<VariableRegistry> {
        &self.registry
    }

    pub fn is_connected(&self) -> bool {
        self.store.is_connected()
    }

    pub fn tick_rate(&self) -> i32 {
        self.header().tick_rate()
    }

    /// Raw session document text.
    pub fn session_info_text(&self) -> Result<Option<SessionInfoText>> {
        self.store.session_info_text(self.config.reader.max_retries)
    }

    /// Deliver pending registrations against this connection's header.
    ///
    /// Activation ticks are taken from the latest completed slot, or 0 before the first
    /// publication.
    pub fn refresh_variables(&self) -> Result<usize> {
        let tick = self.reader().latest()?.map(|snapshot| snapshot.tick()).unwrap_or(0);
        let delivered = self.registry.refresh(self.header(), tick);
        if delivered > 0 {
            debug!(delivered, tick, "Delivered variable activations");
        }
        Ok(delivered)
    }

    /// Command client broadcasting under this connection's configured message name.
    pub fn commands(&self) -> Result<CommandClient> {
        CommandClient::broadcast_with(&self.config)
    }

    /// Stream snapshots from a background task, buffering at most `capacity`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn snapshots(&self, capacity: usize) -> SnapshotStream {
        Driver::spawn(self.reader(), capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VariableType;
    use crate::memory::InProcessSignal;
    use crate::test_utils::{RegionBuilder, SyntheticPublisher};
    use futures::StreamExt;
    use parking_lot::Mutex;
    use std::time::Duration;

    fn connection() -> anyhow::Result<(TelemetryConnection, SyntheticPublisher)> {
        let signal = Arc::new(InProcessSignal::new());
        let (store, publisher) = RegionBuilder::new()
            .with_variable("Speed", VariableType::Float, 1)
            .with_variable("Gear", VariableType::Int, 1)
            .with_session_info("WeekendInfo:\n TrackName: monza\n")
            .with_tick_rate(60)
            .build()
            .into_store()?;
        let config = ConnectionConfig::default()
            .with_reader(ReaderConfig::default().with_wait_timeout(Some(Duration::from_millis(50))));
        Ok((TelemetryConnection::from_parts(store, signal.clone(), config), publisher.with_signal(signal)))
    }

    #[test]
    fn default_names_match_simulator_sdk() {
        let config = ConnectionConfig::default();
        assert_eq!(config.memory_name, "Local\\IRSDKMemMapFileName");
        assert_eq!(config.event_name, "Local\\IRSDKDataValidEvent");
        assert_eq!(config.broadcast_message_name, "IRSDK_BROADCASTMSG");
        assert_eq!(config.reader, ReaderConfig::default());
    }

    #[test]
    fn reports_header_and_status() -> anyhow::Result<()> {
        let (conn, publisher) = connection()?;
        assert_eq!(conn.tick_rate(), 60);
        assert!(conn.header().has_variable("Gear"));
        assert!(conn.is_connected());
        publisher.set_connected(false);
        assert!(!conn.is_connected());

        let info = conn.session_info_text()?.ok_or_else(|| anyhow::anyhow!("no session info"))?;
        assert!(info.text.contains("monza"));
        Ok(())
    }

    #[test]
    fn readers_are_independent() -> anyhow::Result<()> {
        let (conn, mut publisher) = connection()?;
        let (_, tick) = publisher.publish_pattern(1);

        let mut first = conn.reader();
        let mut second = conn.reader();
        assert_eq!(first.read()?.tick(), tick);
        assert_eq!(second.read()?.tick(), tick);
        assert_eq!(first.last_tick(), Some(tick));
        Ok(())
    }

    #[test]
    fn refresh_uses_latest_tick() -> anyhow::Result<()> {
        let (conn, mut publisher) = connection()?;
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        conn.registry().register("Gear", move |info| {
            *sink.lock() = Some(info.activated_at_tick);
        });

        publisher.publish_pattern(0);
        let (_, tick) = publisher.publish_pattern(0);
        assert_eq!(conn.refresh_variables()?, 1);
        assert_eq!(*seen.lock(), Some(tick));
        Ok(())
    }

    #[test]
    fn shared_registry_spans_connections() -> anyhow::Result<()> {
        let registry = Arc::new(VariableRegistry::new());
        let (a, _pa) = connection()?;
        let (b, _pb) = connection()?;
        let a = a.with_registry(Arc::clone(&registry));
        let b = b.with_registry(Arc::clone(&registry));

        registry.register("Speed", |_| {});
        assert_eq!(a.refresh_variables()?, 1);
        assert!(b.registry().is_active("Speed"));
        Ok(())
    }

    #[tokio::test]
    async fn snapshots_stream_through_connection() -> anyhow::Result<()> {
        let (conn, mut publisher) = connection()?;
        let mut stream = conn.snapshots(2);
        let (_, tick) = publisher.publish_pattern(9);

        let snapshot = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("stream ended"))?;
        assert_eq!(snapshot.tick(), tick);
        assert!(snapshot.bytes().iter().all(|&b| b == 9));
        Ok(())
    }

    #[cfg(not(windows))]
    #[test]
    fn live_open_is_windows_only() {
        assert!(matches!(
            TelemetryConnection::open(ConnectionConfig::default()),
            Err(crate::TelemetryError::UnsupportedPlatform { .. })
        ));
    }

    #[cfg(not(windows))]
    #[test]
    fn commands_use_configured_broadcast_name() -> anyhow::Result<()> {
        let (conn, _publisher) = connection()?;
        let config = conn.config().clone().with_broadcast_message_name("PITLANE_REPLAY_RELAY");
        let conn = TelemetryConnection::from_parts(Arc::clone(conn.store()), Arc::new(InProcessSignal::new()), config);

        match conn.commands() {
            Err(crate::TelemetryError::UnsupportedPlatform { feature, .. }) => {
                assert!(feature.contains("PITLANE_REPLAY_RELAY"), "{feature}");
            }
            other => anyhow::bail!("expected UnsupportedPlatform, got {other:?}"),
        }
        Ok(())
    }
}
