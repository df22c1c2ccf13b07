//! Zero-hertz screenshare example
//!
//! Simulates a capture source that produces a burst of frames and then goes
//! quiet, the way a desktop capturer behaves when the screen stops changing.
//! The adapter paces the burst at the configured maximum rate, repeats the
//! last frame while quality converges, and slows down to idle repeats once
//! the encoder reports convergence.
//!
//! Scheduling decisions are logged at debug level.

use std::sync::Arc;
use std::time::{Duration, Instant};

use lamco_frame_cadence::{
    CadenceConfig, FrameCadenceAdapter, FrameCadenceCallback, VideoFrame,
    VideoSourceConstraints, ZeroHertzParams,
};

/// Stand-in encoder that logs what it receives
struct PrintingEncoder {
    start: Instant,
}

impl FrameCadenceCallback for PrintingEncoder {
    fn on_frame(&self, delivery_time: Instant, queue_overload: bool, frame: &VideoFrame) {
        println!(
            "[{:>5}ms] {} frame ts={}us overload={}",
            delivery_time.saturating_duration_since(self.start).as_millis(),
            if frame.repeat { "repeat  " } else { "original" },
            frame.timestamp_us,
            queue_overload
        );
    }

    fn on_discarded_frame(&self) {
        println!("source discarded a frame");
    }

    fn request_refresh_frame(&self) {
        println!("refresh frame requested");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("lamco-frame-cadence v{}", lamco_frame_cadence::VERSION);

    let config = CadenceConfig::builder()
        .idle_repeat_period(Duration::from_millis(500))
        .build();
    let adapter = FrameCadenceAdapter::new(config)?;
    adapter.initialize(Arc::new(PrintingEncoder {
        start: Instant::now(),
    }));

    adapter.set_zero_hertz_mode_enabled(Some(ZeroHertzParams::new(1)));
    adapter.on_constraints_changed(VideoSourceConstraints::new(0.0, 10.0));
    adapter.update_layer_status(0, true);

    // Burst of three changes, captured faster than the 10 fps cap
    let sink = adapter.sink();
    for i in 0..3i64 {
        sink.on_frame(VideoFrame::new(1280, 720, vec![0u8; 64]).with_timestamps(1 + i * 40_000, 0));
        tokio::time::sleep(Duration::from_millis(40)).await;
    }

    // Encoder converges after a while; repeats slow down
    tokio::time::sleep(Duration::from_millis(600)).await;
    adapter.update_layer_quality_convergence(0, true);
    tokio::time::sleep(Duration::from_secs(2)).await;

    println!(
        "reported input rate: {:?} fps",
        adapter.input_frame_rate_fps().await?
    );

    Ok(())
}
