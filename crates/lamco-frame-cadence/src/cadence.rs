//! Adapter core: mode routing without I/O
//!
//! [`CadenceCore`] owns every piece of adapter state and decides, per
//! operation, whether frames pass straight through (statistics mode) or go
//! through the [`ZeroHertzScheduler`]. It never reads a clock or spawns
//! timers: the current time is an argument, results are queued as
//! [`CadenceOutput`]s, and the next instant at which [`CadenceCore::poll`]
//! must run is reported by [`CadenceCore::next_deadline`].
//!
//! [`FrameCadenceAdapter`](crate::FrameCadenceAdapter) drives a core from a
//! tokio task; tests drive it directly with synthetic instants.

use std::collections::VecDeque;
use std::time::Instant;

use tracing::{info, trace};

use crate::config::CadenceConfig;
use crate::frame::{VideoFrame, VideoSourceConstraints, ZeroHertzParams};
use crate::rate::FrameRateTracker;
use crate::zero_hertz::ZeroHertzScheduler;

/// Work produced by the core for the pipeline callback
#[derive(Debug, Clone, PartialEq)]
pub enum CadenceOutput {
    /// Deliver a frame
    Frame {
        /// When the frame was handed off
        delivery_time: Instant,
        /// More frames were waiting behind this one
        queue_overload: bool,
        /// The frame, possibly a repeat
        frame: VideoFrame,
    },
    /// The source discarded a frame
    DiscardedFrame,
    /// Ask the source for a new frame
    RefreshFrameRequest,
}

/// Frame cadence state machine
#[derive(Debug)]
pub struct CadenceCore {
    config: CadenceConfig,
    frame_rate: FrameRateTracker,
    zero_hertz_params: Option<ZeroHertzParams>,
    constraints: Option<VideoSourceConstraints>,
    restriction_fps: Option<f64>,
    zero_hertz: Option<ZeroHertzScheduler>,
    outputs: VecDeque<CadenceOutput>,
}

impl CadenceCore {
    /// Create a core in statistics mode
    ///
    /// `config` is expected to have passed [`CadenceConfig::validate`].
    pub fn new(config: CadenceConfig) -> Self {
        Self {
            frame_rate: FrameRateTracker::new(config.frame_rate_window),
            config,
            zero_hertz_params: None,
            constraints: None,
            restriction_fps: None,
            zero_hertz: None,
            outputs: VecDeque::new(),
        }
    }

    /// Accept a frame submitted at `arrival`
    pub fn on_frame(
        &mut self,
        frame: VideoFrame,
        arrival: Instant,
        queue_overload: bool,
        now: Instant,
    ) {
        match self.zero_hertz.as_mut() {
            Some(scheduler) => scheduler.on_frame(frame, arrival, now),
            None => self.outputs.push_back(CadenceOutput::Frame {
                delivery_time: arrival,
                queue_overload,
                frame,
            }),
        }
    }

    /// The source discarded a frame
    pub fn on_discarded_frame(&mut self, now: Instant) {
        self.outputs.push_back(CadenceOutput::DiscardedFrame);
        if let Some(scheduler) = self.zero_hertz.as_mut() {
            scheduler.on_discarded_frame(now);
        }
    }

    /// Record one input frame for rate estimation
    pub fn update_frame_rate(&mut self, now: Instant) {
        self.frame_rate.record_frame(now);
    }

    /// Input frame rate to report to the encoder
    ///
    /// In zero-hertz mode this is the configured maximum rate, since that is
    /// the cadence frames are delivered at. Otherwise it is the measured
    /// input rate, if enough samples exist.
    pub fn input_frame_rate_fps(&self) -> Option<u32> {
        match &self.zero_hertz {
            Some(scheduler) => Some(scheduler.max_fps() as u32),
            None => self.frame_rate.frame_rate(),
        }
    }

    /// Set or clear zero-hertz parameters
    ///
    /// Setting parameters re-initializes layer tracking with the given layer
    /// count.
    pub fn set_zero_hertz_mode_enabled(&mut self, params: Option<ZeroHertzParams>, now: Instant) {
        self.zero_hertz_params = params;
        self.reconfigure(now);
        if let (Some(params), Some(scheduler)) = (params, self.zero_hertz.as_mut()) {
            scheduler.reset_layers(params.num_layers);
        }
    }

    /// The source announced new frame rate constraints
    pub fn on_constraints_changed(&mut self, constraints: VideoSourceConstraints, now: Instant) {
        trace!(
            "Source constraints min={:?} max={:?}",
            constraints.min_fps,
            constraints.max_fps
        );
        self.constraints = Some(constraints);
        self.reconfigure(now);
    }

    /// Limit the unconverged repeat rate; `None` or a non-positive rate
    /// lifts the limit
    pub fn update_video_source_restrictions(&mut self, max_fps: Option<f64>) {
        let max_fps = max_fps.filter(|fps| *fps > 0.0);
        if max_fps != self.restriction_fps {
            info!("Video source restriction set to {:?} fps", max_fps);
        }
        self.restriction_fps = max_fps;
        if let Some(scheduler) = self.zero_hertz.as_mut() {
            scheduler.set_restriction(max_fps);
        }
    }

    /// Enable or disable a layer; ignored outside zero-hertz mode
    pub fn update_layer_status(&mut self, index: usize, enabled: bool) {
        if let Some(scheduler) = self.zero_hertz.as_mut() {
            scheduler.set_layer_enabled(index, enabled);
        }
    }

    /// Record layer convergence feedback; ignored outside zero-hertz mode
    pub fn update_layer_quality_convergence(&mut self, index: usize, converged: bool) {
        if let Some(scheduler) = self.zero_hertz.as_mut() {
            scheduler.set_layer_converged(index, converged);
        }
    }

    /// A downstream encoder asked for a key frame
    pub fn process_key_frame_request(&mut self, now: Instant) {
        match self.zero_hertz.as_mut() {
            Some(scheduler) => scheduler.on_key_frame_request(now),
            None => trace!("Key frame request outside zero-hertz mode"),
        }
    }

    /// Run everything due at `now`
    pub fn poll(&mut self, now: Instant) {
        if let Some(scheduler) = self.zero_hertz.as_mut() {
            scheduler.poll(now, &mut self.outputs);
        }
    }

    /// When [`CadenceCore::poll`] next has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        self.zero_hertz.as_ref().and_then(ZeroHertzScheduler::next_deadline)
    }

    /// Take the oldest pending output
    pub fn pop_output(&mut self) -> Option<CadenceOutput> {
        self.outputs.pop_front()
    }

    /// Whether frames are routed through the zero-hertz scheduler
    pub fn is_zero_hertz_active(&self) -> bool {
        self.zero_hertz.is_some()
    }

    /// The zero-hertz scheduler, when active
    pub fn zero_hertz(&self) -> Option<&ZeroHertzScheduler> {
        self.zero_hertz.as_ref()
    }

    /// Maximum rate for zero-hertz operation, if its conditions hold
    fn zero_hertz_max_fps(&self) -> Option<f64> {
        if !self.config.zero_hertz_enabled || self.zero_hertz_params.is_none() {
            return None;
        }
        self.constraints?.zero_hertz_max_fps()
    }

    fn reconfigure(&mut self, now: Instant) {
        let max_fps = self.zero_hertz_max_fps();
        match (max_fps, self.zero_hertz.as_mut()) {
            (Some(max_fps), Some(scheduler)) => {
                if scheduler.max_fps() != max_fps {
                    scheduler.on_constraints_changed(max_fps, now);
                }
            }
            (Some(max_fps), None) => {
                let num_layers = self.zero_hertz_params.map_or(0, |params| params.num_layers);
                info!("Zero-hertz mode enabled, max {} fps", max_fps);
                self.zero_hertz = Some(ZeroHertzScheduler::new(
                    max_fps,
                    self.restriction_fps,
                    num_layers,
                    &self.config,
                    now,
                ));
            }
            (None, Some(_)) => {
                info!("Zero-hertz mode disabled, passing frames through");
                self.zero_hertz = None;
            }
            (None, None) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zero_hertz::CadencePhase;
    use std::time::Duration;

    /// Drives a core through simulated time, recording outputs with the
    /// offset at which they were produced
    struct Harness {
        core: CadenceCore,
        start: Instant,
        now: Instant,
        events: Vec<(u128, CadenceOutput)>,
    }

    impl Harness {
        fn new(config: CadenceConfig) -> Self {
            let start = Instant::now();
            Self {
                core: CadenceCore::new(config),
                start,
                now: start,
                events: Vec::new(),
            }
        }

        fn zero_hertz(max_fps: f64, num_layers: usize) -> Self {
            let mut harness = Self::new(CadenceConfig::default());
            let now = harness.now;
            harness
                .core
                .set_zero_hertz_mode_enabled(Some(ZeroHertzParams::new(num_layers)), now);
            harness
                .core
                .on_constraints_changed(VideoSourceConstraints::new(0.0, max_fps), now);
            harness
        }

        fn record(&mut self) {
            let at = (self.now - self.start).as_millis();
            while let Some(output) = self.core.pop_output() {
                self.events.push((at, output));
            }
        }

        /// Advance to `offset` from start, polling at every deadline on the way
        fn advance_to(&mut self, offset: Duration) {
            self.record();
            let target = self.start + offset;
            while let Some(deadline) = self.core.next_deadline().filter(|d| *d <= target) {
                self.now = deadline.max(self.now);
                self.core.poll(self.now);
                self.record();
            }
            self.now = target;
        }

        fn pass_frame(&mut self, frame: VideoFrame) {
            let now = self.now;
            self.core.on_frame(frame, now, false, now);
        }

        fn take_events(&mut self) -> Vec<(u128, CadenceOutput)> {
            self.record();
            std::mem::take(&mut self.events)
        }

        fn drain(&mut self) -> Vec<CadenceOutput> {
            self.take_events().into_iter().map(|(_, output)| output).collect()
        }

        /// Offsets from start, in ms, of delivered frames
        fn frame_times(&mut self) -> Vec<u128> {
            let start = self.start;
            self.take_events()
                .into_iter()
                .filter_map(|(_, output)| match output {
                    CadenceOutput::Frame { delivery_time, .. } => {
                        Some((delivery_time - start).as_millis())
                    }
                    _ => None,
                })
                .collect()
        }

        /// Offsets from start, in ms, of refresh requests
        fn refresh_times(&mut self) -> Vec<u128> {
            self.take_events()
                .into_iter()
                .filter(|(_, output)| *output == CadenceOutput::RefreshFrameRequest)
                .map(|(at, _)| at)
                .collect()
        }
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn frame() -> VideoFrame {
        VideoFrame::new(2, 2, vec![0u8; 4])
    }

    #[test]
    fn test_passthrough_delivers_immediately() {
        let mut harness = Harness::new(CadenceConfig::default());
        harness.advance_to(ms(40));
        harness.pass_frame(frame());
        let overloaded = harness.now;
        harness.core.on_frame(frame(), overloaded, true, overloaded);

        let outputs = harness.drain();
        assert_eq!(outputs.len(), 2);
        assert!(matches!(
            &outputs[0],
            CadenceOutput::Frame { delivery_time, queue_overload: false, .. }
                if *delivery_time == harness.start + ms(40)
        ));
        assert!(matches!(
            &outputs[1],
            CadenceOutput::Frame { queue_overload: true, .. }
        ));
        assert_eq!(harness.core.next_deadline(), None);
    }

    #[test]
    fn test_zero_hertz_requires_all_conditions() {
        let mut harness = Harness::new(CadenceConfig::default());
        let now = harness.now;
        harness
            .core
            .on_constraints_changed(VideoSourceConstraints::new(0.0, 30.0), now);
        assert!(!harness.core.is_zero_hertz_active());

        harness
            .core
            .set_zero_hertz_mode_enabled(Some(ZeroHertzParams::default()), now);
        assert!(harness.core.is_zero_hertz_active());

        harness
            .core
            .on_constraints_changed(VideoSourceConstraints::new(1.0, 30.0), now);
        assert!(!harness.core.is_zero_hertz_active());

        harness
            .core
            .on_constraints_changed(VideoSourceConstraints::new(0.0, 0.0), now);
        assert!(!harness.core.is_zero_hertz_active());

        let mut disabled = Harness::new(CadenceConfig::builder().zero_hertz_enabled(false).build());
        disabled
            .core
            .set_zero_hertz_mode_enabled(Some(ZeroHertzParams::default()), now);
        disabled
            .core
            .on_constraints_changed(VideoSourceConstraints::new(0.0, 30.0), now);
        assert!(!disabled.core.is_zero_hertz_active());
    }

    #[test]
    fn test_forwards_after_period_then_repeats_with_advanced_timestamps() {
        let mut harness = Harness::zero_hertz(1.0, 0);
        harness.pass_frame(frame().with_timestamps(1_000, 2_000));
        harness.advance_to(ms(3500));

        let start = harness.start;
        let frames: Vec<_> = harness
            .drain()
            .into_iter()
            .filter_map(|output| match output {
                CadenceOutput::Frame { delivery_time, frame, .. } => Some((
                    (delivery_time - start).as_millis(),
                    frame.timestamp_us,
                    frame.ntp_time_ms,
                    frame.repeat,
                )),
                _ => None,
            })
            .collect();
        assert_eq!(
            frames,
            vec![
                (1000, 1_000, 2_000, false),
                (2000, 1_001_000, 3_000, true),
                (3000, 2_001_000, 4_000, true),
            ]
        );
    }

    #[test]
    fn test_repeats_keep_unset_timestamps() {
        let mut harness = Harness::zero_hertz(1.0, 0);
        harness.pass_frame(frame());
        harness.advance_to(ms(2500));

        for output in harness.drain() {
            if let CadenceOutput::Frame { frame, .. } = output {
                assert_eq!(frame.timestamp_us, 0);
                assert_eq!(frame.ntp_time_ms, 0);
            }
        }
    }

    #[test]
    fn test_reports_max_fps_in_zero_hertz_mode() {
        let mut harness = Harness::new(CadenceConfig::default());
        for i in 0..50 {
            harness.advance_to(ms(i * 10));
            let now = harness.now;
            harness.core.update_frame_rate(now);
        }
        // 50 frames over 491ms
        assert_eq!(harness.core.input_frame_rate_fps(), Some(102));

        let now = harness.now;
        harness
            .core
            .set_zero_hertz_mode_enabled(Some(ZeroHertzParams::default()), now);
        harness
            .core
            .on_constraints_changed(VideoSourceConstraints::new(0.0, 24.0), now);
        assert_eq!(harness.core.input_frame_rate_fps(), Some(24));

        // Samples recorded while in zero-hertz mode count once it ends
        for i in 50..100 {
            harness.advance_to(ms(i * 10));
            let now = harness.now;
            harness.core.update_frame_rate(now);
        }
        harness.core.set_zero_hertz_mode_enabled(None, harness.now);
        assert_eq!(harness.core.input_frame_rate_fps(), Some(101));
    }

    #[test]
    fn test_requests_refresh_until_first_frame() {
        let mut harness = Harness::zero_hertz(10.0, 0);
        harness.advance_to(ms(1000));
        assert_eq!(
            harness.refresh_times(),
            vec![300, 400, 500, 600, 700, 800, 900, 1000]
        );
    }

    #[test]
    fn test_no_refresh_after_frame() {
        let mut harness = Harness::zero_hertz(10.0, 0);
        harness.pass_frame(frame());
        harness.advance_to(ms(5000));
        assert!(harness.refresh_times().is_empty());
    }

    #[test]
    fn test_discarded_frame_requests_refresh() {
        let mut harness = Harness::zero_hertz(10.0, 0);
        harness.pass_frame(frame());
        harness.advance_to(ms(1000));
        harness.drain();

        let now = harness.now;
        harness.core.on_discarded_frame(now);
        assert_eq!(harness.drain(), vec![CadenceOutput::DiscardedFrame]);

        harness.advance_to(ms(2350));
        let expected: Vec<u128> = (13..=23).map(|i| i * 100).collect();
        assert_eq!(harness.refresh_times(), expected);

        harness.pass_frame(frame());
        harness.advance_to(ms(5000));
        assert!(harness.refresh_times().is_empty());
    }

    #[test]
    fn test_initial_state_unconverged() {
        let mut harness = Harness::zero_hertz(10.0, 2);
        harness.pass_frame(frame());
        harness.advance_to(ms(350));
        assert_eq!(harness.frame_times(), vec![100, 200, 300]);
    }

    #[test]
    fn test_repeats_passed_frames_until_convergence() {
        let mut harness = Harness::zero_hertz(10.0, 2);
        harness.core.update_layer_status(0, true);
        harness.core.update_layer_status(1, true);
        harness.pass_frame(frame());

        harness.advance_to(ms(250));
        harness.core.update_layer_quality_convergence(1, true);
        harness.advance_to(ms(350));
        harness.core.update_layer_quality_convergence(0, true);
        harness.advance_to(ms(800));
        assert_eq!(harness.frame_times(), vec![100, 200, 300, 400]);
        assert_eq!(
            harness.core.zero_hertz().map(ZeroHertzScheduler::phase),
            Some(CadencePhase::Repeating { idle: true })
        );

        harness.pass_frame(frame());
        harness.advance_to(ms(950));
        harness.core.update_layer_quality_convergence(0, true);
        harness.advance_to(ms(1050));
        harness.core.update_layer_quality_convergence(1, true);
        harness.advance_to(ms(3200));
        assert_eq!(harness.frame_times(), vec![900, 1000, 1100, 2100, 3100]);
    }

    #[test]
    fn test_unconverged_repeat_rate_adapts_to_restriction() {
        let mut harness = Harness::zero_hertz(10.0, 2);
        harness.pass_frame(frame());
        harness.advance_to(ms(150));
        harness.core.update_video_source_restrictions(Some(5.0));
        harness.advance_to(ms(650));
        assert_eq!(harness.frame_times(), vec![100, 200, 400, 600]);

        harness.core.update_video_source_restrictions(None);
        harness.advance_to(ms(950));
        assert_eq!(harness.frame_times(), vec![800, 900]);
    }

    #[test]
    fn test_restriction_survives_constraint_change() {
        let mut harness = Harness::zero_hertz(10.0, 0);
        harness.core.update_video_source_restrictions(Some(2.0));
        harness.pass_frame(frame());
        harness.advance_to(ms(100));
        harness.core.on_constraints_changed(VideoSourceConstraints::new(0.0, 20.0), harness.now);
        harness.advance_to(ms(1200));
        // Re-forward one new period after the change, then restricted repeats
        assert_eq!(harness.frame_times(), vec![100, 150, 650, 1150]);
    }

    #[test]
    fn test_key_frame_ignored_while_short_repeating() {
        let mut harness = Harness::zero_hertz(8.0, 1);
        harness.core.update_layer_status(0, true);
        harness.pass_frame(frame());
        harness.advance_to(ms(250));
        harness.drain();

        harness.core.process_key_frame_request(harness.now);
        harness.advance_to(ms(1250));
        let outputs = harness.drain();
        assert!(!outputs.contains(&CadenceOutput::RefreshFrameRequest));
        assert_eq!(outputs.len(), 8);
    }

    #[test]
    fn test_key_frame_ignored_just_before_idle_repeat() {
        let mut harness = Harness::zero_hertz(8.0, 1);
        harness.core.update_layer_status(0, true);
        harness.pass_frame(frame());
        harness.advance_to(ms(130));
        harness.core.update_layer_quality_convergence(0, true);
        // Repeat at 250 switches to idle; next one due at 1250
        harness.advance_to(ms(1200));
        assert_eq!(harness.frame_times(), vec![125, 250]);

        harness.core.process_key_frame_request(harness.now);
        harness.advance_to(ms(1400));
        // Idle repeat still at 1250, then short repeats after the reset
        assert_eq!(harness.frame_times(), vec![1250, 1375]);
    }

    #[test]
    fn test_key_frame_switches_idle_to_short_repeats() {
        let mut harness = Harness::zero_hertz(8.0, 1);
        harness.core.update_layer_status(0, true);
        harness.pass_frame(frame());
        harness.advance_to(ms(130));
        harness.core.update_layer_quality_convergence(0, true);
        harness.advance_to(ms(300));
        assert_eq!(harness.frame_times(), vec![125, 250]);

        harness.core.process_key_frame_request(harness.now);
        harness.advance_to(ms(1300));
        let frames = harness.frame_times();
        assert_eq!(frames, vec![425, 550, 675, 800, 925, 1050, 1175, 1300]);
        assert!(harness.refresh_times().is_empty());
    }

    #[test]
    fn test_key_frame_before_first_frame_arms_refresh() {
        let mut harness = Harness::zero_hertz(10.0, 0);
        harness.advance_to(ms(350));
        assert_eq!(harness.refresh_times(), vec![300]);

        // Already requesting: the running cadence is kept
        harness.core.process_key_frame_request(harness.now);
        harness.advance_to(ms(450));
        assert_eq!(harness.refresh_times(), vec![400]);
    }

    #[test]
    fn test_layer_feedback_out_of_range_is_accepted() {
        let mut harness = Harness::zero_hertz(10.0, 0);
        harness.core.update_layer_status(2, true);
        harness.core.update_layer_quality_convergence(2, true);
        harness.core.update_layer_quality_convergence(7, false);
        let layers = harness.core.zero_hertz().map(|s| s.layers().len());
        assert_eq!(layers, Some(8));
    }

    #[test]
    fn test_layer_feedback_ignored_in_passthrough() {
        let mut harness = Harness::new(CadenceConfig::default());
        harness.core.update_layer_status(0, true);
        harness.core.update_layer_quality_convergence(0, true);
        harness.core.process_key_frame_request(harness.now);
        assert!(harness.drain().is_empty());
    }

    #[test]
    fn test_reenabling_resets_layer_tracking() {
        let mut harness = Harness::zero_hertz(10.0, 1);
        harness.core.update_layer_status(0, true);
        harness.core.update_layer_quality_convergence(0, true);
        assert!(harness.core.zero_hertz().is_some_and(|s| s.layers().is_settled()));

        let now = harness.now;
        harness
            .core
            .set_zero_hertz_mode_enabled(Some(ZeroHertzParams::new(3)), now);
        let scheduler = harness.core.zero_hertz();
        assert!(scheduler.is_some_and(|s| !s.layers().is_settled() && s.layers().len() == 3));
    }

    #[test]
    fn test_disabling_zero_hertz_cancels_pending_work() {
        let mut harness = Harness::zero_hertz(10.0, 0);
        harness.pass_frame(frame());
        harness.advance_to(ms(250));
        harness.drain();

        harness.core.set_zero_hertz_mode_enabled(None, harness.now);
        assert!(!harness.core.is_zero_hertz_active());
        assert_eq!(harness.core.next_deadline(), None);

        harness.pass_frame(frame());
        assert_eq!(harness.frame_times(), vec![250]);
    }

    #[test]
    fn test_constraint_change_reschedules_pending_forward() {
        let mut harness = Harness::zero_hertz(10.0, 0);
        harness.pass_frame(frame());
        harness.advance_to(ms(50));
        harness.core.on_constraints_changed(VideoSourceConstraints::new(0.0, 5.0), harness.now);
        harness.advance_to(ms(700));
        assert_eq!(harness.frame_times(), vec![250, 450, 650]);
    }

    #[test]
    fn test_reentering_zero_hertz_starts_awaiting_first_frame() {
        let mut harness = Harness::zero_hertz(10.0, 0);
        harness.pass_frame(frame());
        harness.advance_to(ms(250));

        let now = harness.now;
        harness
            .core
            .on_constraints_changed(VideoSourceConstraints::new(1.0, 10.0), now);
        harness
            .core
            .on_constraints_changed(VideoSourceConstraints::new(0.0, 10.0), now);
        assert_eq!(
            harness.core.zero_hertz().map(ZeroHertzScheduler::phase),
            Some(CadencePhase::AwaitingFirstFrame)
        );
        assert!(harness.core.zero_hertz().is_some_and(ZeroHertzScheduler::refresh_pending));
    }
}
