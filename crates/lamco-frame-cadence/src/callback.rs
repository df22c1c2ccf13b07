//! Pipeline callback interface

use std::time::Instant;

use crate::frame::VideoFrame;

/// Receiver of adapter output, typically the encoder stage
///
/// All methods are invoked on the adapter's execution context, one at a
/// time. Implementations should return quickly; the next repeat is already
/// scheduled when [`on_frame`](Self::on_frame) runs, but other adapter work
/// waits for the callback to return.
///
/// Dropping the [`FrameCadenceAdapter`](crate::FrameCadenceAdapter) from
/// inside a callback deadlocks, because the drop waits for in-flight
/// callbacks to finish.
pub trait FrameCadenceCallback: Send + Sync {
    /// A frame is ready for encoding
    ///
    /// `delivery_time` is the frame's arrival time for frames passed straight
    /// through, and the hand-off time for zero-hertz forwards and repeats.
    /// `queue_overload` is set when more frames were waiting behind this one.
    fn on_frame(&self, delivery_time: Instant, queue_overload: bool, frame: &VideoFrame);

    /// The capture source discarded a frame
    fn on_discarded_frame(&self);

    /// The capture source should produce a new frame
    fn request_refresh_frame(&self);
}
