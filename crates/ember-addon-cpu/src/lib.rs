//! CPU monitor addon
//!
//! ```text
//! cpu.start(usage => ..., 500)   // callback every 500 ms (default 1000)
//! cpu.isRunning()                // true
//! cpu.stop()
//! ```
//!
//! Sampling runs on a background thread. Each sample is dispatched to the
//! engine's owning thread, where the stored callback is invoked with the
//! usage percentage.

use std::time::Duration;

use ember_native::{addon, function, unload};
use ember_sdk::{
    Addon, AddonCell, AddonError, AddonResult, BackgroundLoop, Dispatcher, FunctionRef,
    OwnerHandle,
};

mod sampler;

pub use sampler::{usage_between, CpuSampler, CpuTimes};

/// Sampling settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Milliseconds between samples
    pub interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

impl MonitorConfig {
    /// Sampling interval
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Apply the optional interval argument of `start`
    pub fn with_interval_ms(self, interval_ms: Option<f64>) -> AddonResult<Self> {
        match interval_ms {
            None => Ok(self),
            Some(ms) if ms.is_finite() && ms >= 1.0 => Ok(Self {
                interval_ms: ms as u64,
            }),
            Some(ms) => Err(AddonError::Argument(format!(
                "interval must be at least 1 ms, got {ms}"
            ))),
        }
    }
}

struct Monitor {
    callback: FunctionRef,
    dispatcher: Dispatcher,
    worker: BackgroundLoop,
    config: MonitorConfig,
}

static MONITOR: AddonCell<Monitor> = AddonCell::new();

impl Monitor {
    fn new(dispatcher: Dispatcher) -> Self {
        Self {
            callback: FunctionRef::invalid(),
            dispatcher,
            worker: BackgroundLoop::new("ember-cpu-monitor"),
            config: MonitorConfig::default(),
        }
    }

    fn start(&mut self, callback: FunctionRef, interval_ms: Option<f64>) -> AddonResult<()> {
        let config = match self.config.with_interval_ms(interval_ms) {
            Ok(config) => config,
            Err(e) => {
                callback.release();
                return Err(e);
            }
        };
        std::mem::replace(&mut self.callback, callback).release();

        if self.worker.is_running() {
            // Only the callback changes while running.
            log::debug!("cpu: monitor already running; callback replaced");
            return Ok(());
        }

        self.config = config;
        let dispatcher = self.dispatcher.clone();
        let mut sampler = CpuSampler::new();
        self.worker.start(config.interval(), move || {
            let usage = sampler.sample();
            if !dispatcher.dispatch(move || deliver(usage)) {
                log::debug!("cpu: sample dropped; run loop unavailable");
            }
        })?;
        Ok(())
    }

    fn shutdown(self) {
        self.dispatcher.clear();
        self.worker.stop();
        // The callback is dropped without touching the engine.
    }
}

/// Runs on the owning thread.
fn deliver(usage: f64) {
    let callback = MONITOR
        .with(|m| m.worker.is_running().then(|| m.callback.clone()))
        .flatten();
    let Some(callback) = callback else {
        return;
    };
    if let Err(e) = callback.call_with_number(usage) {
        log::warn!("cpu: update callback failed: {e}");
    }
}

#[function]
fn start(callback: FunctionRef, interval_ms: Option<f64>) -> AddonResult<()> {
    MONITOR
        .with(|m| m.start(callback, interval_ms))
        .ok_or(AddonError::NotInitialized)?
}

#[function]
fn stop() {
    MONITOR.with(|m| m.worker.stop());
}

#[function]
fn is_running() -> bool {
    MONITOR.with(|m| m.worker.is_running()).unwrap_or(false)
}

#[addon("cpu")]
fn init(addon: &Addon, owner: OwnerHandle) -> AddonResult<()> {
    if owner.is_null() {
        return Err(AddonError::Failed(
            "the CPU monitor needs the owner-thread run loop".to_string(),
        ));
    }
    if let Some(previous) = MONITOR.install(Monitor::new(Dispatcher::new(owner))) {
        previous.shutdown();
    }

    addon
        .register_function("start", start_native, START_ARITY)
        .register_function("stop", stop_native, STOP_ARITY)
        .register_function("isRunning", is_running_native, IS_RUNNING_ARITY)
        .register_number(
            "defaultIntervalMs",
            MonitorConfig::default().interval_ms as f64,
        );
    Ok(())
}

#[unload("cpu")]
fn shutdown() {
    if let Some(monitor) = MONITOR.take() {
        monitor.shutdown();
    }
}
