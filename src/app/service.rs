//! Application service: the lifecycle manager.
//!
//! [`AlertSystem`] is the one explicitly owned system context.  It opens the
//! hardware, starts the queue consumer, accepts submissions from the
//! transport layer and tears everything down again.  All I/O flows through
//! the port traits it is constructed with.
//!
//! ```text
//!  submit ──▶ AlertQueue ──▶ consumer ──▶ PatternEngine ──▶ OutputPort
//!                                 │
//!                                 └──────▶ EventSink
//! ```
//!
//! The consumer is the only thing that pops the queue and it renders each
//! alert to completion before popping the next, so at most one
//! [`ExecutionContext`] exists at any instant.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crossbeam_channel::Receiver;
use log::{error, info, warn};
use serde::Serialize;

use crate::config::{AlertConfig, ShutdownPolicy};
use crate::drivers::buzzer::Buzzer;
use crate::drivers::patterns::PatternTable;
use crate::drivers::rgb::RgbLed;
use crate::drivers::task::{WORKER_STACK_KB, spawn_worker};
use crate::error::Result;

use super::commands::{AlertId, AlertRequest, QueuedAlert, Severity};
use super::engine::{ExecutionContext, Outcome, PatternEngine};
use super::events::{AlertEvent, EventKind};
use super::ports::{EventSink, OutputPort, PinHandle};
use super::queue::{AlertQueue, Enqueued};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ───────────────────────────────────────────────────────────────
// Shared control state
// ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct ControlState {
    stopping: bool,
    active: Option<ExecutionContext>,
}

/// Hand-off point between the consumer and `shutdown`.
///
/// Both sides take the same lock, so an alert either starts before
/// shutdown (and is then cancelled) or sees `stopping` and is discarded.
struct Control {
    policy: ShutdownPolicy,
    state: Mutex<ControlState>,
}

impl Control {
    /// Register `alert` as in flight, or `None` if it must be discarded.
    fn begin(&self, alert: QueuedAlert) -> Option<ExecutionContext> {
        let mut state = lock(&self.state);
        if state.stopping && self.policy == ShutdownPolicy::Discard {
            return None;
        }
        let ctx = ExecutionContext::new(alert);
        state.active = Some(ctx.clone());
        Some(ctx)
    }

    fn end(&self) {
        lock(&self.state).active = None;
    }

    fn stop(&self) {
        let mut state = lock(&self.state);
        state.stopping = true;
        if self.policy == ShutdownPolicy::Discard {
            if let Some(ctx) = &state.active {
                info!("Cancelling in-flight alert {}", ctx.alert.id);
                ctx.cancel.cancel();
            }
        }
    }

    fn current(&self) -> Option<(AlertId, Severity)> {
        lock(&self.state)
            .active
            .as_ref()
            .map(|ctx| (ctx.alert.id.clone(), ctx.severity()))
    }
}

// ───────────────────────────────────────────────────────────────
// Public records
// ───────────────────────────────────────────────────────────────

/// Point-in-time view for health reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    /// An alert is being rendered right now.
    pub active: bool,
    pub queue_depth: usize,
    pub backend: &'static str,
    pub running: bool,
}

/// Result of [`AlertSystem::shutdown`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Queued alerts dropped without running.
    pub discarded: usize,
    /// Pins whose PWM channel missed its stop bound and were forced off.
    pub timed_out_pins: Vec<u32>,
}

// ───────────────────────────────────────────────────────────────
// AlertSystem
// ───────────────────────────────────────────────────────────────

struct ConsumerExit {
    engine: PatternEngine,
    discarded: usize,
}

pub struct AlertSystem {
    config: AlertConfig,
    port: Arc<dyn OutputPort>,
    sink: Arc<dyn EventSink>,
    queue: AlertQueue,
    control: Arc<Control>,
    handles: Vec<PinHandle>,
    consumer: Mutex<Option<JoinHandle<ConsumerExit>>>,
    report: Mutex<Option<ShutdownReport>>,
    running: AtomicBool,
}

impl AlertSystem {
    /// Open the hardware and start the consumer with the standard patterns.
    pub fn start(
        config: AlertConfig,
        port: Arc<dyn OutputPort>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        Self::start_with_patterns(config, port, sink, PatternTable::standard())
    }

    /// As [`start`](Self::start) with a caller-supplied pattern table.
    ///
    /// Any failure here is fatal: whatever was claimed is released and the
    /// error is returned.
    pub fn start_with_patterns(
        config: AlertConfig,
        port: Arc<dyn OutputPort>,
        sink: Arc<dyn EventSink>,
        patterns: PatternTable,
    ) -> Result<Self> {
        config.validate()?;
        info!(
            "Starting alert system on '{}' backend (rgb={}/{}/{}, buzzer={}, {} Hz{})",
            port.backend(),
            config.red_pin,
            config.green_pin,
            config.blue_pin,
            config.buzzer_pin,
            config.pwm_frequency_hz,
            if config.common_anode { ", common anode" } else { "" }
        );

        let mut rgb = RgbLed::open(&port, config.rgb_pins(), config.pwm(), &config.consumer_label)?;
        let buzzer = match Buzzer::open(
            Arc::clone(&port),
            config.buzzer_pin,
            &format!("{}-buzzer", config.consumer_label),
        ) {
            Ok(buzzer) => buzzer,
            Err(e) => {
                rgb.stop(config.stop_timeout());
                for handle in rgb.handles() {
                    let _ = port.close(handle);
                }
                return Err(e);
            }
        };

        let engine = PatternEngine::new(rgb, buzzer, Arc::new(patterns), config.update_hz);
        let handles = engine.handles();
        let queue = AlertQueue::new();
        let control = Arc::new(Control {
            policy: config.shutdown_policy,
            state: Mutex::new(ControlState::default()),
        });

        let rx = queue.receiver();
        let worker_control = Arc::clone(&control);
        let worker_sink = Arc::clone(&sink);
        let consumer = spawn_worker("alert-consumer", WORKER_STACK_KB, move || {
            consume(engine, &rx, &worker_control, worker_sink.as_ref())
        });
        let consumer = match consumer {
            Ok(join) => join,
            Err(e) => {
                // The engine went down with the closure; its channels are stopped.
                for handle in &handles {
                    let _ = port.close(*handle);
                }
                return Err(e);
            }
        };

        sink.emit(&AlertEvent::system(EventKind::SystemStarted {
            backend: port.backend(),
        }));
        info!("Alert system running");

        Ok(Self {
            config,
            port,
            sink,
            queue,
            control,
            handles,
            consumer: Mutex::new(Some(consumer)),
            report: Mutex::new(None),
            running: AtomicBool::new(true),
        })
    }

    // ── Inbound ───────────────────────────────────────────────

    /// Queue an alert and return its identifier without waiting for it to run.
    pub fn submit_alert(
        &self,
        severity: Severity,
        alert_type: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Result<AlertId> {
        self.submit(AlertRequest::new(severity, alert_type, device_id))
    }

    pub fn submit(&self, request: AlertRequest) -> Result<AlertId> {
        let Enqueued { alert, depth } = self.queue.enqueue(request)?;
        info!(
            "Alert {} queued: {} '{}' from {} (depth {})",
            alert.id, alert.request.severity, alert.request.alert_type, alert.request.device_id, depth
        );
        self.sink.emit(&AlertEvent::for_alert(
            &alert,
            EventKind::Enqueued { queue_depth: depth },
        ));
        Ok(alert.id)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn health(&self) -> Health {
        Health {
            active: self.is_active(),
            queue_depth: self.queue.depth(),
            backend: self.port.backend(),
            running: self.is_running(),
        }
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.depth()
    }

    /// An alert is being rendered right now.
    pub fn is_active(&self) -> bool {
        self.current().is_some()
    }

    /// The alert being rendered, if any.
    pub fn current(&self) -> Option<(AlertId, Severity)> {
        self.control.current()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    // ── Shutdown ──────────────────────────────────────────────

    /// Stop accepting alerts, settle the queue per the configured policy,
    /// stop every PWM channel (bounded wait each) and release every line.
    ///
    /// Idempotent: later calls return the first call's report.
    pub fn shutdown(&self) -> ShutdownReport {
        let mut report_slot = lock(&self.report);
        if let Some(report) = report_slot.as_ref() {
            return report.clone();
        }

        info!("Shutting down alert system ({:?})", self.config.shutdown_policy);
        self.queue.close();
        self.control.stop();

        let exit = lock(&self.consumer).take().and_then(|join| match join.join() {
            Ok(exit) => Some(exit),
            Err(_) => {
                error!("Alert consumer panicked");
                None
            }
        });

        let mut report = ShutdownReport::default();
        if let Some(mut exit) = exit {
            report.discarded = exit.discarded;
            report.timed_out_pins = exit.engine.stop(self.config.stop_timeout());
            for pin in &report.timed_out_pins {
                error!("PWM channel on pin {} missed its stop bound; forced off", pin);
                self.sink
                    .emit(&AlertEvent::system(EventKind::ChannelStopTimedOut { pin: *pin }));
            }
        }

        for handle in &self.handles {
            if let Err(e) = self.port.close(*handle) {
                warn!("Closing pin {} failed: {}", handle.pin(), e);
            }
        }

        self.running.store(false, Ordering::Release);
        self.sink.emit(&AlertEvent::system(EventKind::SystemStopped));
        info!(
            "Alert system stopped ({} discarded, {} channel timeouts)",
            report.discarded,
            report.timed_out_pins.len()
        );

        *report_slot = Some(report.clone());
        report
    }
}

impl Drop for AlertSystem {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ── Consumer worker ───────────────────────────────────────────

fn consume(
    engine: PatternEngine,
    rx: &Receiver<QueuedAlert>,
    control: &Control,
    sink: &dyn EventSink,
) -> ConsumerExit {
    let mut discarded = 0;

    // Ends once the queue is closed and its backlog is empty.
    for alert in rx {
        let Some(ctx) = control.begin(alert.clone()) else {
            info!("Discarding alert {} ({})", alert.id, alert.severity());
            sink.emit(&AlertEvent::for_alert(&alert, EventKind::Discarded));
            discarded += 1;
            continue;
        };

        info!("Executing alert {} ({})", alert.id, alert.severity());
        sink.emit(&AlertEvent::for_alert(&alert, EventKind::Started));

        let outcome = engine.execute(&ctx);
        let elapsed_ms = ctx.elapsed_ms();
        control.end();

        let kind = match outcome {
            Outcome::Finished => EventKind::Finished { elapsed_ms },
            Outcome::Cancelled => EventKind::Cancelled { elapsed_ms },
            Outcome::Aborted { pin } => {
                warn!("Alert {} aborted: pin {} keeps failing", alert.id, pin);
                EventKind::Aborted {
                    pin,
                    reason: "consecutive write failures".into(),
                }
            }
        };
        info!("Alert {} done: {:?} after {} ms", alert.id, outcome, elapsed_ms);
        sink.emit(&AlertEvent::for_alert(&alert, kind));
    }

    ConsumerExit { engine, discarded }
}
