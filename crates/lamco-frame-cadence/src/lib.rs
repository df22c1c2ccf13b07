//! # lamco-frame-cadence
//!
//! Frame cadence adaptation for screen capture pipelines.
//!
//! This crate is part of the [lamco-cadence](https://github.com/lamco-admin/lamco-cadence)
//! workspace. It sits between a capture source and a video encoder and
//! decides when frames reach the encoder.
//!
//! # Features
//!
//! - **Statistics Mode**: Frames pass straight through while the input frame
//!   rate is measured over a sliding window
//! - **Zero-Hertz Mode**: For sources that only produce frames on change,
//!   frames are paced at the maximum rate and repeated while the screen is
//!   static
//! - **Quality Convergence**: Short repeats until every enabled layer reports
//!   converged quality, then slow idle repeats
//! - **Refresh Requests**: The source is asked for a new frame when nothing
//!   is available to repeat
//! - **Drift-Free Timestamps**: Repeats advance capture and NTP timestamps
//!   from the original frame
//!
//! # Quick Start
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
//!     fn on_frame(&self, delivery_time: Instant, _queue_overload: bool, frame: &VideoFrame) {
//!         println!("{:?}: encode frame ts={}us", delivery_time, frame.timestamp_us);
//!     }
//!     fn on_discarded_frame(&self) {}
//!     fn request_refresh_frame(&self) {
//!         println!("source should capture a new frame");
//!     }
//! }
//!
//! # async fn example() -> lamco_frame_cadence::Result<()> {
//! let adapter = FrameCadenceAdapter::new(CadenceConfig::default())?;
//! adapter.initialize(Arc::new(Encoder));
//!
//! // Screenshare: at most 5 fps, no minimum rate
//! adapter.set_zero_hertz_mode_enabled(Some(ZeroHertzParams::new(1)));
//! adapter.on_constraints_changed(VideoSourceConstraints::new(0.0, 5.0));
//!
//! adapter.on_frame(VideoFrame::new(1920, 1080, vec![0u8; 1920 * 1080 * 4]));
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐
//! │  Capture source    │
//! │  (FrameSink)       │
//! └─────────┬──────────┘
//!           │
//!           ▼
//! ┌────────────────────┐
//! │ FrameCadenceAdapter│ ◄── Command channel + tokio task
//! │ (execution context)│
//! └─────────┬──────────┘
//!           │
//!           ▼
//! ┌────────────────────┐
//! │   CadenceCore      │ ◄── Mode routing, rate statistics
//! └────┬──────────┬────┘
//!      │          │
//!      ▼          ▼
//!  passthrough  ┌────────────────────┐
//!      │        │ ZeroHertzScheduler │ ◄── Forward, repeat, refresh
//!      │        └─────────┬──────────┘     Layer convergence
//!      ▼                  ▼
//! ┌────────────────────────────────┐
//! │  FrameCadenceCallback (encoder)│
//! └────────────────────────────────┘
//! ```
//!
//! [`CadenceCore`] and the components below it never read a clock; they take
//! the current [`Instant`](std::time::Instant) as an argument and report
//! their next deadline. That makes them usable from any event loop and
//! testable without real time passing.
//!
//! # Zero-Hertz Activation
//!
//! Zero-hertz mode is active when all of these hold:
//!
//! | Condition | Set by |
//! |-----------|--------|
//! | `zero_hertz_enabled` | [`CadenceConfig`] |
//! | parameters present | [`FrameCadenceAdapter::set_zero_hertz_mode_enabled`] |
//! | `max_fps > 0` | [`FrameCadenceAdapter::on_constraints_changed`] |
//! | `min_fps` unset or 0 | [`FrameCadenceAdapter::on_constraints_changed`] |

use std::time::Duration;

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod adapter;
pub mod cadence;
pub mod callback;
pub mod config;
pub mod error;
pub mod frame;
pub mod layers;
pub mod rate;
pub mod refresh;
pub mod task;
pub mod zero_hertz;

// =============================================================================
// RE-EXPORTS - PRIMARY API
// =============================================================================

pub use adapter::{FrameCadenceAdapter, FrameSink};
pub use cadence::{CadenceCore, CadenceOutput};
pub use callback::FrameCadenceCallback;
pub use config::{CadenceConfig, CadenceConfigBuilder};
pub use error::{CadenceError, Result};
pub use frame::{VideoFrame, VideoSourceConstraints, ZeroHertzParams};
pub use layers::{LayerConvergenceTracker, LayerState};
pub use rate::{FrameRateTracker, RateStatistics};
pub use refresh::RefreshFrameRequester;
pub use zero_hertz::{CadencePhase, ZeroHertzScheduler};

// =============================================================================
// CRATE-LEVEL ITEMS
// =============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default averaging window for the input frame rate estimate
pub const FRAME_RATE_AVERAGING_WINDOW: Duration = Duration::from_millis(1000);

/// Default number of frame periods to wait before requesting a refresh frame
pub const ON_DISCARDED_FRAME_REFRESH_FRAME_PERIOD: u32 = 3;

/// Default repeat period once quality has converged in zero-hertz mode
pub const ZERO_HERTZ_IDLE_REPEAT_RATE_PERIOD: Duration = Duration::from_secs(1);
