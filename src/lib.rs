//! # lamco-cadence
//!
//! Frame pacing for screen capture and real-time video pipelines.
//!
//! This crate provides a unified interface to the lamco cadence libraries:
//!
//! - **[`cadence`]** - Frame cadence adaptation with zero-hertz repeat scheduling
//!
//! # Features
//!
//! ```toml
//! # Everything (default)
//! lamco-cadence = "0.1"
//!
//! # Facade only, no sub-crates
//! lamco-cadence = { version = "0.1", default-features = false }
//! ```
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `adapter` | Yes | Frame cadence adapter |
//! | `full` | No | All features from all sub-crates |
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lamco_cadence::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let adapter = FrameCadenceAdapter::with_default()?;
//!     adapter.initialize(Arc::new(MyEncoder::new()));
//!
//!     // Static screenshare content: pace at up to 5 fps and repeat when idle
//!     adapter.set_zero_hertz_mode_enabled(Some(ZeroHertzParams::new(1)));
//!     adapter.on_constraints_changed(VideoSourceConstraints::new(0.0, 5.0));
//!
//!     let sink = adapter.sink();
//!     // hand `sink` to the capture thread
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  lamco-cadence                  │
//! ├─────────────────────────────────────────────────┤
//! │              lamco-frame-cadence                │
//! │                                                 │
//! │  FrameCadenceAdapter   CadenceCore              │
//! │  FrameSink             ZeroHertzScheduler       │
//! │  CadenceConfig         RateStatistics           │
//! └────────────────────────┬────────────────────────┘
//!                          │
//!                          ▼
//!              Encoder (FrameCadenceCallback)
//! ```
//!
//! # Related Crates
//!
//! You can also use the individual crates directly:
//!
//! - [`lamco-frame-cadence`](https://crates.io/crates/lamco-frame-cadence) - Frame cadence adapter only

#![cfg_attr(docsrs, feature(doc_cfg))]

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// RE-EXPORTS
// =============================================================================

/// Frame cadence adaptation between capture sources and encoders.
///
/// This module provides:
/// - Pass-through delivery with input frame rate statistics
/// - Zero-hertz pacing, repeating and refresh requests for static content
/// - Layer quality convergence tracking
///
/// See [`lamco_frame_cadence`] documentation for details.
#[cfg(feature = "adapter")]
#[cfg_attr(docsrs, doc(cfg(feature = "adapter")))]
pub use lamco_frame_cadence as cadence;

// =============================================================================
// PRELUDE - Common types for convenience
// =============================================================================

/// Prelude module with commonly used types.
///
/// ```rust
/// use lamco_cadence::prelude::*;
/// ```
pub mod prelude {
    #[cfg(feature = "adapter")]
    pub use lamco_frame_cadence::{
        CadenceConfig, CadenceError, FrameCadenceAdapter, FrameCadenceCallback, FrameSink,
        VideoFrame, VideoSourceConstraints, ZeroHertzParams,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    #[cfg(feature = "adapter")]
    fn test_adapter_reexport() {
        // Just verify the re-export works
        let config = cadence::CadenceConfig::default();
        assert!(config.validate().is_ok());
    }
}
