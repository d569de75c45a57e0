//! [`Pipeline`] – the four units of execution that keep the controller
//! serving requests.
//!
//! ```text
//!  transport ──► Ingress ──► inbound (2) ──► Executor ──► outbound (8) ──► Publisher ──► transport
//!                   │                                        ▲               │
//!                   └── busy / decode errors ────────────────┘               └─ feeds watchdog
//!  ADC ──────► Sampler ──► samples (4) ──────────────────────────────────► Publisher
//! ```
//!
//! * **Ingress** decodes each inbound message.  It never waits on the
//!   executor: when the inbound queue is full the command is answered with a
//!   busy reply on the spot.
//! * **Executor** is a dedicated OS thread that owns the
//!   [`InstrumentContext`] and runs one command at a time to completion,
//!   including any blocking hardware I/O inside a handler.
//! * **Sampler** is a second OS thread reading both photodiodes on a fixed
//!   period.  It only touches the ADC, never the context.
//! * **Publisher** ticks on a short interval: feeds the watchdog, moves
//!   samples to the outbound queue and drains that queue to the transport.
//!
//! Ingress and publisher are Tokio tasks, so [`Pipeline::spawn`] must be
//! called from inside a Tokio runtime.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use serde_json::json;
use tib_hal::{PhotodiodeSample, PhotodiodeSampler, WatchdogTimer};
use tib_kernel::WatchdogFeeder;
use tib_kernel::watchdog::{DEFAULT_FEED_INTERVAL, DEFAULT_TIMEOUT};
use tib_middleware::{
    InboundMessage, InboundQueue, OutboundQueue, Receiver, SampleQueue, Transport,
};
use tib_types::{Command, PHOTODIODE_TOPIC, Response, TibError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::context::InstrumentContext;
use crate::dispatch::Dispatcher;
use crate::protocol::{Decoded, busy_response, decode};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Commands that may wait for the executor.
pub const INBOUND_DEPTH: usize = 2;
/// Responses that may wait for the publisher.
pub const OUTBOUND_DEPTH: usize = 8;
/// Photodiode samples that may wait for the publisher.
pub const SAMPLE_DEPTH: usize = 4;

pub const DEFAULT_SAMPLE_PERIOD: Duration = Duration::from_millis(20);
pub const DEFAULT_PUBLISH_TICK: Duration = Duration::from_millis(10);

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Timing parameters for [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Photodiode sampling period.  Must be non-zero.
    pub sample_period: Duration,
    /// Interval between publisher iterations.  Must be non-zero.
    pub publish_tick: Duration,
    pub watchdog_timeout: Duration,
    /// Must be shorter than `watchdog_timeout`.
    pub watchdog_feed_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_period: DEFAULT_SAMPLE_PERIOD,
            publish_tick: DEFAULT_PUBLISH_TICK,
            watchdog_timeout: DEFAULT_TIMEOUT,
            watchdog_feed_interval: DEFAULT_FEED_INTERVAL,
        }
    }
}

impl PipelineConfig {
    /// # Errors
    ///
    /// [`TibError::Config`] when the sample period or publish tick is zero.
    pub fn validate(&self) -> Result<(), TibError> {
        if self.sample_period.is_zero() {
            return Err(TibError::Config("sample period must be non-zero".to_string()));
        }
        if self.publish_tick.is_zero() {
            return Err(TibError::Config("publish tick must be non-zero".to_string()));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Ingress
// ─────────────────────────────────────────────────────────────────────────────

/// Decode `msg` and hand the result to the right queue.
///
/// A decoded command goes to `inbound`; if that queue is full the command is
/// answered with a busy reply instead.  Rejected messages get their error
/// reply queued on `outbound`.  Messages outside the command topic are
/// dropped.
pub fn ingest(
    msg: &InboundMessage,
    inbound: &InboundQueue<Command>,
    outbound: &OutboundQueue<Response>,
) {
    match decode(msg) {
        Decoded::Command(cmd) => {
            if let Err(cmd) = inbound.offer(cmd) {
                warn!(key = cmd.key(), "executor busy; rejecting command");
                outbound.push(busy_response(&cmd));
            }
        }
        Decoded::Rejected(reply) => {
            outbound.push(reply);
        }
        Decoded::Ignored => {}
    }
}

async fn run_ingress(
    transport: Arc<dyn Transport>,
    inbound: InboundQueue<Command>,
    outbound: OutboundQueue<Response>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            msg = transport.recv() => match msg {
                Some(msg) => ingest(&msg, &inbound, &outbound),
                None => {
                    info!("transport closed; ingress stopping");
                    break;
                }
            },
        }
    }
    // Dropping `inbound` here lets the executor finish once it has drained.
    debug!("ingress stopped");
}

// ─────────────────────────────────────────────────────────────────────────────
// Executor
// ─────────────────────────────────────────────────────────────────────────────

fn run_executor(
    mut ctx: InstrumentContext,
    dispatcher: Dispatcher,
    commands: Receiver<Command>,
    outbound: OutboundQueue<Response>,
) -> InstrumentContext {
    info!("executor started");
    while let Ok(cmd) = commands.recv() {
        let reply = dispatcher.dispatch(&mut ctx, &cmd);
        outbound.push(reply);
    }
    info!("executor stopped");
    ctx
}

// ─────────────────────────────────────────────────────────────────────────────
// Sampler
// ─────────────────────────────────────────────────────────────────────────────

/// The photodiode-topic message for one sample taken at `unix_time`.
pub fn sample_response(sample: PhotodiodeSample, unix_time: i64) -> Response {
    let payload = json!({ "yj": sample.yj, "hk": sample.hk, "time": unix_time });
    Response::sample(PHOTODIODE_TOPIC, payload.to_string())
}

/// Runs until `stop` receives a message or its sender is dropped.
fn run_sampler(
    mut sampler: PhotodiodeSampler,
    samples: SampleQueue<Response>,
    period: Duration,
    stop: channel::Receiver<()>,
) {
    loop {
        let started = Instant::now();
        let reading = sampler.sample();
        samples.push(sample_response(reading, chrono::Utc::now().timestamp()));

        let elapsed = started.elapsed();
        let remaining = period.checked_sub(elapsed).unwrap_or_else(|| {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                period_ms = period.as_millis() as u64,
                "sampler overran its period"
            );
            Duration::ZERO
        });

        match stop.recv_timeout(remaining) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("sampler stopped");
}

// ─────────────────────────────────────────────────────────────────────────────
// Publisher
// ─────────────────────────────────────────────────────────────────────────────

struct PublisherQueues {
    outbound: OutboundQueue<Response>,
    replies: Receiver<Response>,
    samples: Receiver<Response>,
}

impl PublisherQueues {
    async fn flush(&self, transport: &dyn Transport) {
        for sample in self.samples.try_iter() {
            self.outbound.push(sample);
        }
        let batch: Vec<Response> = self.replies.try_iter().collect();
        for reply in batch {
            let topic = reply.topic().to_string();
            if let Err(e) = transport.publish(reply.into()).await {
                error!(topic = %topic, error = %e, "publish failed");
            }
        }
    }
}

async fn run_publisher(
    transport: Arc<dyn Transport>,
    queues: PublisherQueues,
    mut feeder: WatchdogFeeder,
    tick: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = interval.tick() => {}
        }
        feeder.tick(Instant::now());
        queues.flush(transport.as_ref()).await;
    }
    // Replies produced while the other units wound down.
    queues.flush(transport.as_ref()).await;
    debug!("publisher stopped");
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline
// ─────────────────────────────────────────────────────────────────────────────

/// Handles to the running units.  Dropping a `Pipeline` without calling
/// [`shutdown`][Self::shutdown] leaves the units running until the runtime
/// exits.
pub struct Pipeline {
    pending: Receiver<Command>,
    stop_inputs: watch::Sender<bool>,
    stop_sampler: Sender<()>,
    stop_publisher: watch::Sender<bool>,
    ingress: JoinHandle<()>,
    publisher: JoinHandle<()>,
    sampler: thread::JoinHandle<()>,
    executor: thread::JoinHandle<InstrumentContext>,
}

fn spawn_thread<T, F>(name: &str, f: F) -> Result<thread::JoinHandle<T>, TibError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map_err(|e| TibError::InternalConfig(format!("failed to spawn {name}: {e}")))
}

impl Pipeline {
    /// Start every unit.  `ctx` moves to the executor thread.
    ///
    /// # Errors
    ///
    /// * [`TibError::Config`] when a period is zero or the watchdog feed
    ///   interval is not shorter than its timeout.  Nothing is started.
    /// * [`TibError::InternalConfig`] when a worker thread cannot be spawned.
    pub fn spawn(
        transport: Arc<dyn Transport>,
        ctx: InstrumentContext,
        sampler: PhotodiodeSampler,
        watchdog: Option<Box<dyn WatchdogTimer>>,
        config: PipelineConfig,
    ) -> Result<Self, TibError> {
        config.validate()?;
        let feeder = WatchdogFeeder::install(
            watchdog,
            config.watchdog_timeout,
            config.watchdog_feed_interval,
        )?;

        let (inbound, commands) = InboundQueue::bounded(INBOUND_DEPTH);
        let (outbound, replies) = OutboundQueue::bounded(OUTBOUND_DEPTH);
        let (samples, sample_rx) = SampleQueue::bounded(SAMPLE_DEPTH);
        let (stop_inputs, inputs_rx) = watch::channel(false);
        let (stop_publisher, publisher_rx) = watch::channel(false);
        let (stop_sampler, sampler_stop_rx) = channel::bounded(1);

        let pending = commands.clone();
        let executor = {
            let outbound = outbound.clone();
            spawn_thread("tib-executor", move || {
                run_executor(ctx, Dispatcher::new(), commands, outbound)
            })?
        };
        let period = config.sample_period;
        let sampler = spawn_thread("tib-sampler", move || {
            run_sampler(sampler, samples, period, sampler_stop_rx)
        })?;

        let ingress = tokio::spawn(run_ingress(
            Arc::clone(&transport),
            inbound,
            outbound.clone(),
            inputs_rx,
        ));
        let queues = PublisherQueues {
            outbound,
            replies,
            samples: sample_rx,
        };
        let publisher = tokio::spawn(run_publisher(
            transport,
            queues,
            feeder,
            config.publish_tick,
            publisher_rx,
        ));

        info!(
            sample_period_ms = config.sample_period.as_millis() as u64,
            publish_tick_ms = config.publish_tick.as_millis() as u64,
            "pipeline started"
        );
        Ok(Self {
            pending,
            stop_inputs,
            stop_sampler,
            stop_publisher,
            ingress,
            publisher,
            sampler,
            executor,
        })
    }

    /// Commands waiting for the executor.
    pub fn pending_commands(&self) -> usize {
        self.pending.len()
    }

    /// Stop every unit and hand back the instrument context.
    ///
    /// Inputs stop first, then the executor finishes the commands already
    /// queued, and finally the publisher flushes what is left.
    ///
    /// # Errors
    ///
    /// [`TibError::InternalConfig`] when any unit panicked.  The remaining
    /// units are still stopped.
    pub async fn shutdown(self) -> Result<InstrumentContext, TibError> {
        info!("pipeline shutting down");
        let mut failed: Vec<&'static str> = Vec::new();

        self.stop_inputs.send_replace(true);
        drop(self.stop_sampler);
        if let Err(e) = self.ingress.await {
            error!(unit = "ingress", error = %e, "task ended abnormally");
            failed.push("ingress");
        }

        let (sampler, executor) = (self.sampler, self.executor);
        let (sampler, executor) =
            tokio::task::spawn_blocking(move || (sampler.join(), executor.join()))
                .await
                .map_err(|e| TibError::InternalConfig(format!("worker join failed: {e}")))?;
        if sampler.is_err() {
            error!(unit = "sampler", "thread panicked");
            failed.push("sampler");
        }

        self.stop_publisher.send_replace(true);
        if let Err(e) = self.publisher.await {
            error!(unit = "publisher", error = %e, "task ended abnormally");
            failed.push("publisher");
        }

        let ctx = executor
            .map_err(|_| TibError::InternalConfig("executor thread panicked".to_string()))?;
        if !failed.is_empty() {
            return Err(TibError::InternalConfig(format!(
                "pipeline units ended abnormally: {}",
                failed.join(", ")
            )));
        }
        info!("pipeline stopped");
        Ok(ctx)
    }
}
