//! Per-document-lifetime agent state.
//!
//! One [`AgentContext`] exists per embedded document. It owns the readiness
//! latch, the rolling frame-time window and the metrics throttle, and is
//! passed explicitly between the interceptors and the message emitter
//! instead of living in ambient globals.

use std::collections::VecDeque;

use arcadescan_bridge::{CanvasSize, MetricsSample, ReadyPayload, Telemetry};

use crate::platform::{DocumentHost, TelemetrySink};

/// Tunable constants. Empirically chosen; kept in one place so calibration
/// does not mean re-deriving the algorithm.
#[derive(Clone, Copy, Debug)]
pub struct Tuning {
    /// Minimum spacing between two metrics messages.
    pub metrics_interval_ms: f64,
    /// Rolling window of most-recent inter-frame deltas used for fps.
    pub fps_window: usize,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            metrics_interval_ms: 100.0,
            fps_window: 60,
        }
    }
}

pub struct AgentContext {
    tuning: Tuning,
    ready: bool,
    paused: bool,
    frame_deltas: VecDeque<f64>,
    last_frame_ts: Option<f64>,
    frame_samples: u64,
    first_paint_ms: Option<f64>,
    last_metrics_ts: Option<f64>,
    canvas: Option<CanvasSize>,
    errors_reported: u64,
}

impl AgentContext {
    pub fn new(tuning: Tuning) -> Self {
        Self {
            tuning,
            ready: false,
            paused: false,
            frame_deltas: VecDeque::new(),
            last_frame_ts: None,
            frame_samples: 0,
            first_paint_ms: None,
            last_metrics_ts: None,
            canvas: None,
            errors_reported: 0,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn frame_samples(&self) -> u64 {
        self.frame_samples
    }

    pub fn errors_reported(&self) -> u64 {
        self.errors_reported
    }

    pub fn record_error(&mut self) {
        self.errors_reported += 1;
    }

    /// Called by the frame interceptor for every animation frame the
    /// embedded program schedules, before the program's own callback runs.
    pub fn on_frame(&mut self, ts: f64, host: &dyn DocumentHost, sink: &dyn TelemetrySink) {
        self.frame_samples += 1;
        if self.first_paint_ms.is_none() {
            self.first_paint_ms = Some(ts);
        }
        if let Some(last) = self.last_frame_ts {
            let delta = ts - last;
            if delta.is_finite() && delta >= 0.0 {
                if self.frame_deltas.len() == self.tuning.fps_window {
                    self.frame_deltas.pop_front();
                }
                self.frame_deltas.push_back(delta);
            }
        }
        self.last_frame_ts = Some(ts);

        self.try_emit_ready(host, sink);
        self.maybe_emit_metrics(ts, host, sink);
    }

    /// One-shot readiness emission. Safe to call from any trigger (frame
    /// interception, mutation observer, load event, fallback timer); the
    /// latch is monotonic for the document lifetime.
    pub fn try_emit_ready(&mut self, host: &dyn DocumentHost, sink: &dyn TelemetrySink) -> bool {
        if self.ready {
            return false;
        }
        let Some(canvas) = host.surface() else {
            return false;
        };
        self.ready = true;
        self.canvas = Some(canvas);
        sink.emit(Telemetry::Ready(ReadyPayload {
            canvas,
            device_pixel_ratio: host.device_pixel_ratio(),
        }));
        true
    }

    /// Mean inter-frame delta in milliseconds over the rolling window.
    pub fn frame_time_ms(&self) -> f64 {
        if self.frame_deltas.is_empty() {
            return 0.0;
        }
        self.frame_deltas.iter().sum::<f64>() / self.frame_deltas.len() as f64
    }

    pub fn fps(&self) -> f64 {
        let frame_time = self.frame_time_ms();
        if frame_time <= 0.0 {
            0.0
        } else {
            1000.0 / frame_time
        }
    }

    pub fn sample(&self, host: &dyn DocumentHost) -> MetricsSample {
        MetricsSample {
            fps: self.fps(),
            frame_time_ms: self.frame_time_ms(),
            frame_samples: self.frame_samples,
            canvas_size: self.canvas.or_else(|| host.surface()),
            first_paint_ms: self.first_paint_ms,
            device_pixel_ratio: host.device_pixel_ratio(),
        }
    }

    /// Emit a metrics message unless one went out within the throttle
    /// interval. Wall-clock spacing is enforced regardless of frame rate so
    /// a 240Hz renderer cannot flood the bridge.
    fn maybe_emit_metrics(&mut self, ts: f64, host: &dyn DocumentHost, sink: &dyn TelemetrySink) {
        if let Some(last) = self.last_metrics_ts {
            if ts - last < self.tuning.metrics_interval_ms {
                return;
            }
        }
        self.last_metrics_ts = Some(ts);
        sink.emit(Telemetry::Metrics(self.sample(host)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fakes::{CollectingSink, FakeHost};
    use arcadescan_bridge::Telemetry;

    fn count_metrics(sink: &CollectingSink) -> usize {
        sink.messages
            .borrow()
            .iter()
            .filter(|m| matches!(m, Telemetry::Metrics(_)))
            .count()
    }

    #[test]
    fn metrics_are_throttled_under_240hz_frames() {
        let host = FakeHost::with_surface(320, 240);
        let sink = CollectingSink::default();
        let mut ctx = AgentContext::new(Tuning::default());

        // One simulated second of 240Hz callbacks.
        let step = 1000.0 / 240.0;
        let mut ts = 0.0;
        while ts <= 1000.0 {
            ctx.on_frame(ts, host.as_ref(), &sink);
            ts += step;
        }

        // At >= 100ms spacing, one second fits at most 11 emissions.
        let metrics = count_metrics(&sink);
        assert!(metrics <= 11, "throttle leaked: {metrics} metrics messages");
        assert!(metrics >= 9, "throttle over-suppressed: {metrics}");
    }

    #[test]
    fn fps_uses_rolling_window() {
        let host = FakeHost::with_surface(320, 240);
        let sink = CollectingSink::default();
        let mut ctx = AgentContext::new(Tuning::default());

        // 100 slow frames (50ms), then enough fast frames (10ms) to fill
        // the 60-delta window; only the fast deltas should remain.
        let mut ts = 0.0;
        for _ in 0..100 {
            ctx.on_frame(ts, host.as_ref(), &sink);
            ts += 50.0;
        }
        for _ in 0..61 {
            ctx.on_frame(ts, host.as_ref(), &sink);
            ts += 10.0;
        }
        assert!((ctx.fps() - 100.0).abs() < 1.0, "fps = {}", ctx.fps());
    }

    #[test]
    fn readiness_fires_once_and_never_reverts() {
        let host = FakeHost::without_surface();
        let sink = CollectingSink::default();
        let mut ctx = AgentContext::new(Tuning::default());

        assert!(!ctx.try_emit_ready(host.as_ref(), &sink));
        assert!(!ctx.is_ready());

        *host.surface.borrow_mut() = Some(arcadescan_bridge::CanvasSize {
            width: 800,
            height: 600,
        });
        assert!(ctx.try_emit_ready(host.as_ref(), &sink));
        assert!(ctx.is_ready());

        // Further triggers are no-ops, even if the surface disappears.
        *host.surface.borrow_mut() = None;
        assert!(!ctx.try_emit_ready(host.as_ref(), &sink));
        assert!(ctx.is_ready());

        let ready_count = sink
            .messages
            .borrow()
            .iter()
            .filter(|m| matches!(m, Telemetry::Ready(_)))
            .count();
        assert_eq!(ready_count, 1);
    }

    #[test]
    fn first_paint_is_first_frame_timestamp() {
        let host = FakeHost::with_surface(64, 64);
        let sink = CollectingSink::default();
        let mut ctx = AgentContext::new(Tuning::default());
        ctx.on_frame(42.5, host.as_ref(), &sink);
        ctx.on_frame(58.2, host.as_ref(), &sink);
        assert_eq!(ctx.sample(host.as_ref()).first_paint_ms, Some(42.5));
    }
}
