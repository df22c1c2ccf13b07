//! Frame Cadence Adapter
//!
//! Runs a [`CadenceCore`] on a dedicated tokio task that serves as the
//! adapter's serialized execution context. Every operation, whichever thread
//! it comes from, is marshalled onto that task through a command channel, so
//! the core is only ever touched from one place.
//!
//! # Architecture
//!
//! ```text
//!  capture thread                 control plane
//!  ┌────────────┐                 ┌─────────────────────┐
//!  │ FrameSink  │                 │ FrameCadenceAdapter │
//!  └─────┬──────┘                 └──────────┬──────────┘
//!        │        Command channel (unbounded) │
//!        └──────────────┬─────────────────────┘
//!                       ▼
//!            ┌─────────────────────┐
//!            │    cadence task     │ ◄── select! { command, sleep_until(deadline) }
//!            │    (CadenceCore)    │
//!            └──────────┬──────────┘
//!                       ▼
//!            ┌─────────────────────┐
//!            │ FrameCadenceCallback│ ◄── on_frame / on_discarded_frame /
//!            └─────────────────────┘     request_refresh_frame
//! ```
//!
//! Time is read from the tokio clock, so a paused runtime
//! (`tokio::time::pause`) drives the adapter deterministically.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Instant;
//! use lamco_frame_cadence::{
//!     CadenceConfig, FrameCadenceAdapter, FrameCadenceCallback, VideoFrame,
//!     VideoSourceConstraints, ZeroHertzParams,
//! };
//!
//! struct Encoder;
//!
//! impl FrameCadenceCallback for Encoder {
//!     fn on_frame(&self, _delivery_time: Instant, _queue_overload: bool, frame: &VideoFrame) {
//!         println!("encode {}x{} repeat={}", frame.width, frame.height, frame.repeat);
//!     }
//!     fn on_discarded_frame(&self) {}
//!     fn request_refresh_frame(&self) {}
//! }
//!
//! # async fn example() -> lamco_frame_cadence::Result<()> {
//! let adapter = FrameCadenceAdapter::new(CadenceConfig::default())?;
//! adapter.initialize(Arc::new(Encoder));
//! adapter.set_zero_hertz_mode_enabled(Some(ZeroHertzParams::new(1)));
//! adapter.on_constraints_changed(VideoSourceConstraints::new(0.0, 30.0));
//!
//! let sink = adapter.sink();
//! sink.on_frame(VideoFrame::new(1920, 1080, vec![0u8; 16]));
//! # Ok(())
//! # }
//! ```

use std::future::pending;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::cadence::{CadenceCore, CadenceOutput};
use crate::callback::FrameCadenceCallback;
use crate::config::CadenceConfig;
use crate::error::{CadenceError, Result};
use crate::frame::{VideoFrame, VideoSourceConstraints, ZeroHertzParams};

/// Operations marshalled onto the cadence task
#[derive(Debug)]
enum Command {
    Frame { frame: VideoFrame, arrival: Instant },
    DiscardedFrame,
    UpdateFrameRate { at: Instant },
    QueryFrameRate { reply: oneshot::Sender<Option<u32>> },
    SetZeroHertzMode(Option<ZeroHertzParams>),
    ConstraintsChanged(VideoSourceConstraints),
    SourceRestrictions(Option<f64>),
    LayerStatus { index: usize, enabled: bool },
    LayerConvergence { index: usize, converged: bool },
    KeyFrameRequest,
}

/// Current time on the runtime clock
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// The bound pipeline callback
///
/// The cadence task only holds a weak reference and takes the lock for every
/// invocation, so clearing the slot guarantees no further callbacks.
#[derive(Default)]
struct CallbackSlot {
    callback: Mutex<Option<Arc<dyn FrameCadenceCallback>>>,
}

/// Cloneable frame entry point for capture sources
///
/// Frames submitted after the adapter is dropped are discarded.
#[derive(Debug, Clone)]
pub struct FrameSink {
    commands: mpsc::UnboundedSender<Command>,
    frames_scheduled: Arc<AtomicUsize>,
}

impl FrameSink {
    /// Submit a captured frame
    pub fn on_frame(&self, frame: VideoFrame) {
        self.frames_scheduled.fetch_add(1, Ordering::AcqRel);
        let command = Command::Frame {
            frame,
            arrival: now(),
        };
        if self.commands.send(command).is_err() {
            self.frames_scheduled.fetch_sub(1, Ordering::AcqRel);
            trace!("Frame submitted after adapter shutdown");
        }
    }

    /// Report a frame the source dropped before submission
    pub fn on_discarded_frame(&self) {
        self.send(Command::DiscardedFrame);
    }

    fn send(&self, command: Command) {
        if let Err(e) = self.commands.send(command) {
            trace!("Adapter closed, dropping {:?}", e.0);
        }
    }
}

/// Frame cadence adapter
///
/// Sits between a capture source and an encoder. In statistics mode it
/// passes frames straight through while measuring the input frame rate; in
/// zero-hertz mode it paces, repeats and requests frames so the encoder sees
/// a steady cadence even when the source goes quiet.
///
/// Must be created inside a tokio runtime. Dropping the adapter stops its
/// task; no callback runs after `drop` returns.
pub struct FrameCadenceAdapter {
    config: CadenceConfig,
    sink: FrameSink,
    callback: Arc<CallbackSlot>,
    task: JoinHandle<()>,
}

impl FrameCadenceAdapter {
    /// Create an adapter with default configuration
    pub fn with_default() -> Result<Self> {
        Self::new(CadenceConfig::default())
    }

    /// Create an adapter and spawn its task on the current runtime
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lamco_frame_cadence::{CadenceConfig, FrameCadenceAdapter};
    ///
    /// # async fn example() -> lamco_frame_cadence::Result<()> {
    /// let config = CadenceConfig::builder()
    ///     .refresh_grace_periods(2)
    ///     .build();
    /// let adapter = FrameCadenceAdapter::new(config)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: CadenceConfig) -> Result<Self> {
        if let Err(issues) = config.validate() {
            return Err(CadenceError::invalid_config(&issues));
        }
        let runtime = Handle::try_current()?;

        info!("Creating FrameCadenceAdapter with config: {:?}", config);

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let frames_scheduled = Arc::new(AtomicUsize::new(0));
        let callback = Arc::new(CallbackSlot::default());

        let task = CadenceTask {
            core: CadenceCore::new(config.clone()),
            commands: commands_rx,
            callback: Arc::downgrade(&callback),
            frames_scheduled: Arc::clone(&frames_scheduled),
        };
        let task = runtime.spawn(task.run());

        Ok(Self {
            config,
            sink: FrameSink {
                commands: commands_tx,
                frames_scheduled,
            },
            callback,
            task,
        })
    }

    /// Bind the pipeline callback, replacing any previous one
    pub fn initialize(&self, callback: Arc<dyn FrameCadenceCallback>) {
        *self.callback.callback.lock() = Some(callback);
        debug!("Frame cadence callback bound");
    }

    /// A frame entry point that can be handed to capture threads
    pub fn sink(&self) -> FrameSink {
        self.sink.clone()
    }

    /// Submit a captured frame
    pub fn on_frame(&self, frame: VideoFrame) {
        self.sink.on_frame(frame);
    }

    /// Report a frame the source dropped before submission
    pub fn on_discarded_frame(&self) {
        self.sink.on_discarded_frame();
    }

    /// Record one input frame for rate estimation
    pub fn update_frame_rate(&self) {
        self.sink.send(Command::UpdateFrameRate { at: now() });
    }

    /// Input frame rate to report to the encoder
    ///
    /// Answered after every operation submitted before this call has been
    /// applied.
    pub async fn input_frame_rate_fps(&self) -> Result<Option<u32>> {
        let (reply, response) = oneshot::channel();
        self.sink.send(Command::QueryFrameRate { reply });
        response.await.map_err(|_| CadenceError::AdapterClosed)
    }

    /// Set or clear zero-hertz mode parameters
    pub fn set_zero_hertz_mode_enabled(&self, params: Option<ZeroHertzParams>) {
        self.sink.send(Command::SetZeroHertzMode(params));
    }

    /// The source announced new frame rate constraints
    pub fn on_constraints_changed(&self, constraints: VideoSourceConstraints) {
        self.sink.send(Command::ConstraintsChanged(constraints));
    }

    /// Limit the unconverged repeat rate; `None` lifts the limit
    pub fn update_video_source_restrictions(&self, max_frame_rate: Option<f64>) {
        self.sink.send(Command::SourceRestrictions(max_frame_rate));
    }

    /// Enable or disable a spatial/simulcast layer
    pub fn update_layer_status(&self, spatial_index: usize, enabled: bool) {
        self.sink.send(Command::LayerStatus {
            index: spatial_index,
            enabled,
        });
    }

    /// Report whether a layer's quality has converged
    pub fn update_layer_quality_convergence(&self, spatial_index: usize, converged: bool) {
        self.sink.send(Command::LayerConvergence {
            index: spatial_index,
            converged,
        });
    }

    /// A downstream encoder asked for a key frame
    pub fn process_key_frame_request(&self) {
        self.sink.send(Command::KeyFrameRequest);
    }

    /// Adapter configuration
    pub fn config(&self) -> &CadenceConfig {
        &self.config
    }
}

impl Drop for FrameCadenceAdapter {
    fn drop(&mut self) {
        debug!("Dropping FrameCadenceAdapter");
        // Waits for an in-flight callback to return
        self.callback.callback.lock().take();
        self.task.abort();
    }
}

/// State owned by the cadence task
struct CadenceTask {
    core: CadenceCore,
    commands: mpsc::UnboundedReceiver<Command>,
    callback: Weak<CallbackSlot>,
    frames_scheduled: Arc<AtomicUsize>,
}

impl CadenceTask {
    async fn run(mut self) {
        loop {
            let deadline = self.core.next_deadline();
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                () = sleep_until(deadline) => {}
            }

            self.core.poll(now());
            if !self.dispatch() {
                break;
            }
        }
        debug!("Frame cadence task stopped");
    }

    fn handle(&mut self, command: Command) {
        let now = now();
        match command {
            Command::Frame { frame, arrival } => {
                let queue_overload = self.frames_scheduled.fetch_sub(1, Ordering::AcqRel) > 1;
                self.core.on_frame(frame, arrival, queue_overload, now);
            }
            Command::DiscardedFrame => self.core.on_discarded_frame(now),
            Command::UpdateFrameRate { at } => self.core.update_frame_rate(at),
            Command::QueryFrameRate { reply } => {
                // The caller may have stopped waiting
                let _ = reply.send(self.core.input_frame_rate_fps());
            }
            Command::SetZeroHertzMode(params) => self.core.set_zero_hertz_mode_enabled(params, now),
            Command::ConstraintsChanged(constraints) => {
                self.core.on_constraints_changed(constraints, now);
            }
            Command::SourceRestrictions(max_fps) => {
                self.core.update_video_source_restrictions(max_fps);
            }
            Command::LayerStatus { index, enabled } => {
                self.core.update_layer_status(index, enabled);
            }
            Command::LayerConvergence { index, converged } => {
                self.core.update_layer_quality_convergence(index, converged);
            }
            Command::KeyFrameRequest => self.core.process_key_frame_request(now),
        }
    }

    /// Hand pending outputs to the callback
    ///
    /// Returns false once the adapter has been dropped.
    fn dispatch(&mut self) -> bool {
        while let Some(output) = self.core.pop_output() {
            let Some(slot) = self.callback.upgrade() else {
                warn!("Frame cadence adapter gone, discarding pending output");
                return false;
            };
            let guard = slot.callback.lock();
            let Some(callback) = guard.as_ref() else {
                trace!("No callback bound, dropping {:?}", output);
                continue;
            };
            match output {
                CadenceOutput::Frame {
                    delivery_time,
                    queue_overload,
                    frame,
                } => callback.on_frame(delivery_time, queue_overload, &frame),
                CadenceOutput::DiscardedFrame => callback.on_discarded_frame(),
                CadenceOutput::RefreshFrameRequest => callback.request_refresh_frame(),
            }
        }
        self.callback.strong_count() > 0
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => pending().await,
    }
}
