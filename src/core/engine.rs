//! Poll engine
//!
//! Owns one [`PollScheduler`] task per configured channel, fans their events
//! out on a single broadcast channel and routes write requests by point name.

use crate::config::ChannelConfig;
use crate::core::catalog::{RegisterCatalog, RegisterPoint};
use crate::core::event::PointEvent;
use crate::core::protocol::{Value, ValueParseError};
use crate::core::scheduler::{ChannelClosed, ChannelHandle, PollScheduler};
use crate::core::transport::{ChannelTransport, TransportError};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Capacity of the shared event channel
const EVENT_CAPACITY: usize = 1024;

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// No point with this name in the catalog
    #[error("Unknown point: {0}")]
    UnknownPoint(String),

    /// Points reference a channel that has no configuration
    #[error("Channel {0} has points but no configuration")]
    UnconfiguredChannel(String),

    /// Opening a channel's transport failed
    #[error("Failed to open channel {channel}: {source}")]
    Open {
        /// Channel id
        channel: String,
        /// Transport error
        #[source]
        source: TransportError,
    },

    /// Text could not be parsed as the point's type
    #[error(transparent)]
    InvalidValue(#[from] ValueParseError),

    /// The point's channel is not being polled
    #[error(transparent)]
    ChannelClosed(#[from] ChannelClosed),
}

/// Running set of channel schedulers
pub struct PollEngine {
    catalog: Arc<RegisterCatalog>,
    handles: HashMap<String, ChannelHandle>,
    events: broadcast::Sender<PointEvent>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl PollEngine {
    /// Open every channel that has points and start polling.
    ///
    /// `open` is called once per channel with its configuration and the
    /// points living on it.
    pub fn start<F>(
        catalog: Arc<RegisterCatalog>,
        channels: &[ChannelConfig],
        mut open: F,
    ) -> Result<Self, EngineError>
    where
        F: FnMut(&ChannelConfig, &[Arc<RegisterPoint>]) -> Result<Box<dyn ChannelTransport>, TransportError>,
    {
        if let Some(orphan) = catalog
            .channels()
            .into_iter()
            .find(|name| !channels.iter().any(|c| &c.id == name))
        {
            return Err(EngineError::UnconfiguredChannel(orphan));
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let cancel = CancellationToken::new();

        // Open everything first so a failure leaves nothing running
        let mut schedulers = Vec::new();
        let mut handles = HashMap::new();
        for channel in channels {
            let points = catalog.channel_points(&channel.id);
            if points.is_empty() {
                warn!(channel = %channel.id, "Channel has no points, not polling");
                continue;
            }
            let transport = open(channel, &points).map_err(|source| EngineError::Open {
                channel: channel.id.clone(),
                source,
            })?;
            let (scheduler, handle) = PollScheduler::new(
                channel.id.clone(),
                points,
                transport,
                channel.scheduler_config(),
                events.clone(),
            );
            schedulers.push(scheduler);
            handles.insert(channel.id.clone(), handle);
        }

        let tasks = schedulers
            .into_iter()
            .map(|scheduler| tokio::spawn(scheduler.run(cancel.child_token())))
            .collect();

        info!(channels = handles.len(), points = catalog.len(), "Poll engine started");
        Ok(Self {
            catalog,
            handles,
            events,
            cancel,
            tasks,
        })
    }

    /// Queue a write at the front of the point's channel.
    ///
    /// Validation against the point's type and access happens when the task
    /// runs; failures arrive as `OperationFailed` events.
    pub async fn request_write(&self, point: &str, value: Value) -> Result<(), EngineError> {
        let point = self
            .catalog
            .get(point)
            .ok_or_else(|| EngineError::UnknownPoint(point.to_string()))?;
        let handle = self
            .handles
            .get(point.channel())
            .ok_or_else(|| ChannelClosed(point.channel().to_string()))?;
        handle.write(Arc::clone(point), value).await?;
        Ok(())
    }

    /// Parse `text` as the point's type and queue the write
    pub async fn request_write_text(&self, point: &str, text: &str) -> Result<(), EngineError> {
        let data_type = self
            .catalog
            .get(point)
            .ok_or_else(|| EngineError::UnknownPoint(point.to_string()))?
            .data_type();
        let value = Value::parse(data_type, text)?;
        self.request_write(point, value).await
    }

    /// Receive every event from every channel, starting now
    pub fn subscribe(&self) -> broadcast::Receiver<PointEvent> {
        self.events.subscribe()
    }

    /// Last successfully read value of a point
    pub fn point_value(&self, point: &str) -> Option<Value> {
        self.catalog.get(point).and_then(|p| p.last_value())
    }

    /// Point catalog shared with the schedulers
    pub fn catalog(&self) -> &Arc<RegisterCatalog> {
        &self.catalog
    }

    /// Names of the channels being polled
    pub fn channels(&self) -> Vec<&str> {
        self.handles.keys().map(String::as_str).collect()
    }

    /// Stop every scheduler after its current task and wait for them
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Channel task ended abnormally: {}", e);
            }
        }
        info!("Poll engine stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::PointDefinition;
    use crate::core::protocol::DataType;
    use crate::core::simulator::SimulatedBus;

    fn catalog() -> Arc<RegisterCatalog> {
        let definitions = vec![
            PointDefinition {
                name: "temp".into(),
                channel: "COM1".into(),
                data_type: DataType::Float32,
                device_address: 1,
                register_address: 0,
                read_only: true,
            },
            PointDefinition {
                name: "setpoint".into(),
                channel: "COM1".into(),
                data_type: DataType::Int16,
                device_address: 1,
                register_address: 10,
                read_only: false,
            },
        ];
        Arc::new(RegisterCatalog::from_definitions(definitions).unwrap())
    }

    fn channel(id: &str) -> ChannelConfig {
        ChannelConfig::new(id)
    }

    fn simulated(_: &ChannelConfig, points: &[Arc<RegisterPoint>]) -> Result<Box<dyn ChannelTransport>, TransportError> {
        Ok(Box::new(SimulatedBus::from_points(points)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_points_without_channel_config_rejected() {
        let result = PollEngine::start(catalog(), &[channel("COM2")], simulated);
        assert!(matches!(result, Err(EngineError::UnconfiguredChannel(c)) if c == "COM1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_failure_reported() {
        let result = PollEngine::start(catalog(), &[channel("COM1")], |_, _| {
            Err(TransportError::PortNotFound("COM1".into()))
        });
        assert!(matches!(result, Err(EngineError::Open { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_without_points_skipped() {
        let mut opened = Vec::new();
        let engine = PollEngine::start(catalog(), &[channel("COM1"), channel("COM9")], |c, p| {
            opened.push(c.id.clone());
            simulated(c, p)
        })
        .unwrap();
        assert_eq!(opened, vec!["COM1".to_string()]);
        assert_eq!(engine.channels(), vec!["COM1"]);
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_write_unknown_point() {
        let engine = PollEngine::start(catalog(), &[channel("COM1")], simulated).unwrap();
        assert!(matches!(
            engine.request_write("nope", Value::Int16(1)).await,
            Err(EngineError::UnknownPoint(_))
        ));
        assert!(matches!(
            engine.request_write_text("setpoint", "abc").await,
            Err(EngineError::InvalidValue(_))
        ));
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_values_flow_to_subscribers() {
        let engine = PollEngine::start(catalog(), &[channel("COM1")], simulated).unwrap();
        let mut events = engine.subscribe();

        let first = events.recv().await.unwrap();
        assert_eq!(first.point(), "temp");
        assert!(matches!(first, PointEvent::ValueUpdated { value: Value::Float32(v), .. } if v == 0.0));
        assert_eq!(engine.point_value("temp"), Some(Value::Float32(0.0)));

        engine.shutdown().await;
    }
}
