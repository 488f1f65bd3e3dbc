//! Per-channel poll scheduler
//!
//! One scheduler owns one channel: its transport, its task queue and the
//! points that live on it. Tasks run strictly one at a time; each sends a
//! request, waits the settle interval, then takes whatever arrived.
//!
//! Queue discipline:
//! - when the queue empties, one read per point is enqueued in catalog order
//! - external writes go to the front, behind any pending confirmation read
//! - a write that reached the wire is always followed by a read of the same point

use crate::core::catalog::RegisterPoint;
use crate::core::event::{ErrorKind, Operation, PointEvent};
use crate::core::protocol::{
    check_echo, decode_ack, decode_response, encode_read, encode_write, format_frame, DecodeError,
    EncodeError, Value,
};
use crate::core::transport::{ChannelTransport, TransportError};
use bytes::Bytes;
use chrono::Local;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Capacity of each channel's command queue
const COMMAND_CAPACITY: usize = 256;

/// Failure of a single task
#[derive(Error, Debug)]
pub enum PollError {
    /// Request could not be encoded
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Response could not be decoded
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Link failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Nothing arrived within the settle interval
    #[error("No response within {0:?}")]
    Timeout(Duration),
}

impl PollError {
    /// Error kind reported in events
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Encode(EncodeError::TypeMismatch { .. }) => ErrorKind::TypeMismatch,
            Self::Encode(EncodeError::ReadOnlyViolation(_)) => ErrorKind::ReadOnlyViolation,
            Self::Decode(DecodeError::Incomplete { .. }) => ErrorKind::Incomplete,
            Self::Decode(DecodeError::ChecksumMismatch { .. }) => ErrorKind::ChecksumMismatch,
            Self::Decode(DecodeError::Truncated { .. }) => ErrorKind::Truncated,
            Self::Decode(DecodeError::Exception { .. }) => ErrorKind::DeviceException,
            Self::Decode(DecodeError::EchoMismatch { .. }) => ErrorKind::EchoMismatch,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Timeout(_) => ErrorKind::Timeout,
        }
    }
}

/// A queued intent
#[derive(Debug, Clone)]
pub enum Task {
    /// Read a point
    Read(Arc<RegisterPoint>),
    /// Write a value to a point
    Write(Arc<RegisterPoint>, Value),
}

impl Task {
    /// Point the task operates on
    pub fn point(&self) -> &Arc<RegisterPoint> {
        match self {
            Self::Read(point) | Self::Write(point, _) => point,
        }
    }

    /// Read or write
    pub fn operation(&self) -> Operation {
        match self {
            Self::Read(_) => Operation::Read,
            Self::Write(..) => Operation::Write,
        }
    }
}

#[derive(Debug)]
struct Entry {
    task: Task,
    /// Read that confirms a preceding write
    confirm: bool,
}

/// FIFO task queue with front insertion for writes
#[derive(Debug, Default)]
pub struct TaskQueue {
    entries: VecDeque<Entry>,
}

impl TaskQueue {
    /// Empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a background poll task
    pub fn push_back(&mut self, task: Task) {
        self.entries.push_back(Entry { task, confirm: false });
    }

    /// Insert a write ahead of everything except pending confirmation reads
    pub fn push_write(&mut self, point: Arc<RegisterPoint>, value: Value) {
        let at = self.entries.iter().take_while(|e| e.confirm).count();
        self.entries.insert(
            at,
            Entry {
                task: Task::Write(point, value),
                confirm: false,
            },
        );
    }

    /// Put the read confirming a write at the very front
    pub fn push_confirm(&mut self, point: Arc<RegisterPoint>) {
        self.entries.push_front(Entry {
            task: Task::Read(point),
            confirm: true,
        });
    }

    fn pop(&mut self) -> Option<Entry> {
        self.entries.pop_front()
    }

    /// Remove and return the head task
    pub fn pop_front(&mut self) -> Option<Task> {
        self.pop().map(|e| e.task)
    }

    /// Head is a background poll rather than a write or confirmation read
    fn front_is_poll(&self) -> bool {
        matches!(
            self.entries.front(),
            Some(Entry {
                task: Task::Read(_),
                confirm: false
            })
        )
    }

    /// Queued tasks, head first
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.entries.iter().map(|e| &e.task)
    }

    /// Number of queued tasks
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Timing and validation settings of one channel
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Fixed wait between sending a request and reading its response
    pub settle: Duration,
    /// Minimum time between the starts of two sweeps
    pub poll_interval: Duration,
    /// Reject responses whose address or function differs from the request
    pub strict_echo: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(100),
            poll_interval: Duration::from_millis(1000),
            strict_echo: false,
        }
    }
}

/// Command sent into a running scheduler
#[derive(Debug)]
pub enum ChannelCommand {
    Write {
        /// Target point
        point: Arc<RegisterPoint>,
        /// Value to write
        value: Value,
    },
}

/// The scheduler loop has stopped
#[derive(Error, Debug)]
#[error("Channel {0} is not running")]
pub struct ChannelClosed(pub String);

/// Sending side of a scheduler's command queue
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    channel: String,
    commands: mpsc::Sender<ChannelCommand>,
}

impl ChannelHandle {
    /// Channel id
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Queue a write at the front of the channel
    pub async fn write(&self, point: Arc<RegisterPoint>, value: Value) -> Result<(), ChannelClosed> {
        self.commands
            .send(ChannelCommand::Write { point, value })
            .await
            .map_err(|_| ChannelClosed(self.channel.clone()))
    }
}

/// Outcome of one executed task
#[derive(Debug)]
pub struct TaskReport {
    /// Task that ran
    pub task: Task,
    /// Decoded value for reads, `None` for acknowledged writes
    pub result: Result<Option<Value>, PollError>,
}

/// Send one request and capture whatever answers within the settle interval
pub async fn exchange(
    transport: &mut dyn ChannelTransport,
    frame: &[u8],
    settle: Duration,
) -> Result<Bytes, PollError> {
    debug!(tx = %hex::encode(frame), "{}", format_frame(frame));
    transport.send(frame).await?;

    tokio::time::sleep(settle).await;

    let available = transport.bytes_available()?;
    if available == 0 {
        return Err(PollError::Timeout(settle));
    }
    let raw = transport.read(available).await?;
    debug!(rx = %hex::encode(&raw), "{}", format_frame(&raw));
    Ok(raw)
}

/// Scheduler for one channel
pub struct PollScheduler {
    channel: String,
    points: Vec<Arc<RegisterPoint>>,
    transport: Box<dyn ChannelTransport>,
    queue: TaskQueue,
    config: SchedulerConfig,
    commands: mpsc::Receiver<ChannelCommand>,
    events: broadcast::Sender<PointEvent>,
    /// Reads of a new sweep are queued but none has started yet
    sweep_pending: bool,
    sweep_started: Option<Instant>,
}

impl PollScheduler {
    /// Create a scheduler over `points` (in catalog order) and its command handle
    pub fn new(
        channel: impl Into<String>,
        points: Vec<Arc<RegisterPoint>>,
        transport: Box<dyn ChannelTransport>,
        config: SchedulerConfig,
        events: broadcast::Sender<PointEvent>,
    ) -> (Self, ChannelHandle) {
        let channel = channel.into();
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let scheduler = Self {
            channel: channel.clone(),
            points,
            transport,
            queue: TaskQueue::new(),
            config,
            commands: rx,
            events,
            sweep_pending: false,
            sweep_started: None,
        };
        let handle = ChannelHandle {
            channel,
            commands: tx,
        };
        (scheduler, handle)
    }

    /// Channel id
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Pending tasks
    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// Run until cancelled. A task that has started always finishes first.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            channel = %self.channel,
            points = self.points.len(),
            link = %self.transport.connection_info(),
            "Channel scheduler started"
        );

        if self.points.is_empty() {
            cancel.cancelled().await;
        } else {
            while !cancel.is_cancelled() {
                if self.queue.front_is_poll() && !self.wait_for_sweep(&cancel).await {
                    break;
                }
                self.step().await;
            }
        }

        info!(channel = %self.channel, "Channel scheduler stopped");
    }

    /// Execute the next task, refilling the queue when it runs dry
    pub async fn step(&mut self) -> Option<TaskReport> {
        self.drain_commands();
        if self.queue.is_empty() {
            self.begin_sweep();
        }

        let entry = self.queue.pop()?;
        if self.sweep_pending && !entry.confirm && matches!(entry.task, Task::Read(_)) {
            self.sweep_pending = false;
            self.sweep_started = Some(Instant::now());
        }

        let report = self.execute(entry.task).await;

        if self.queue.is_empty() {
            self.begin_sweep();
        }
        Some(report)
    }

    /// Idle -> Draining: one read per point, in catalog order
    fn begin_sweep(&mut self) {
        for point in &self.points {
            self.queue.push_back(Task::Read(Arc::clone(point)));
        }
        self.sweep_pending = !self.points.is_empty();
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.enqueue(command);
        }
    }

    fn enqueue(&mut self, command: ChannelCommand) {
        match command {
            ChannelCommand::Write { point, value } => {
                debug!(channel = %self.channel, point = point.name(), %value, "Write queued");
                self.queue.push_write(point, value);
            }
        }
    }

    /// Time left before the queued sweep may start
    fn sweep_due_in(&self) -> Option<Duration> {
        if !self.sweep_pending {
            return None;
        }
        let due = self.sweep_started? + self.config.poll_interval;
        let now = Instant::now();
        (due > now).then(|| due - now)
    }

    /// Wait out the poll interval. Writes arriving meanwhile are queued and
    /// end the wait. Returns false when cancelled.
    async fn wait_for_sweep(&mut self, cancel: &CancellationToken) -> bool {
        let Some(remaining) = self.sweep_due_in() else {
            return true;
        };
        let deadline = Instant::now() + remaining;
        let mut accepting = true;
        loop {
            tokio::select! {
                () = cancel.cancelled() => return false,
                () = tokio::time::sleep_until(deadline) => return true,
                command = self.commands.recv(), if accepting => match command {
                    Some(command) => {
                        self.enqueue(command);
                        return true;
                    }
                    None => accepting = false,
                },
            }
        }
    }

    async fn execute(&mut self, task: Task) -> TaskReport {
        let result = match &task {
            Task::Read(point) => self.read_point(point).await.map(Some),
            Task::Write(point, value) => self.write_point(point, *value).await.map(|()| None),
        };

        let point = task.point();
        match &result {
            Ok(Some(value)) => {
                point.set_last_value(*value);
                self.emit(PointEvent::ValueUpdated {
                    point: point.name().to_string(),
                    channel: self.channel.clone(),
                    value: *value,
                    timestamp: Local::now(),
                });
            }
            Ok(None) => {
                debug!(channel = %self.channel, point = point.name(), "Write acknowledged");
            }
            Err(error) if error.kind().is_local() => {
                info!(channel = %self.channel, point = point.name(), kind = %error.kind(), "Write rejected: {}", error);
                self.emit_failure(&task, error);
            }
            Err(error) => {
                warn!(
                    channel = %self.channel,
                    point = point.name(),
                    operation = %task.operation(),
                    kind = %error.kind(),
                    "{}",
                    error
                );
                self.emit_failure(&task, error);
            }
        }

        TaskReport { task, result }
    }

    fn emit_failure(&self, task: &Task, error: &PollError) {
        self.emit(PointEvent::OperationFailed {
            point: task.point().name().to_string(),
            channel: self.channel.clone(),
            operation: task.operation(),
            kind: error.kind(),
            message: error.to_string(),
            timestamp: Local::now(),
        });
    }

    async fn read_point(&mut self, point: &RegisterPoint) -> Result<Value, PollError> {
        let request = encode_read(point);
        let raw = exchange(self.transport.as_mut(), &request, self.config.settle).await?;
        let value = decode_response(&raw, point.data_type())?;
        self.verify_echo(point, &request, &raw)?;
        Ok(value)
    }

    async fn write_point(&mut self, point: &Arc<RegisterPoint>, value: Value) -> Result<(), PollError> {
        // Rejected writes never reach the wire and get no confirmation read
        let request = encode_write(point, value)?;

        let acknowledged = match exchange(self.transport.as_mut(), &request, self.config.settle).await {
            Ok(raw) => decode_ack(&raw)
                .map_err(PollError::from)
                .and_then(|()| self.verify_echo(point, &request, &raw)),
            Err(error) => Err(error),
        };

        self.queue.push_confirm(Arc::clone(point));
        acknowledged
    }

    fn verify_echo(&self, point: &RegisterPoint, request: &[u8], raw: &[u8]) -> Result<(), PollError> {
        match check_echo(request, raw) {
            Ok(()) => Ok(()),
            Err(error) if self.config.strict_echo => Err(error.into()),
            Err(error) => {
                warn!(channel = %self.channel, point = point.name(), "Accepted response with {}", error);
                Ok(())
            }
        }
    }

    fn emit(&self, event: PointEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
