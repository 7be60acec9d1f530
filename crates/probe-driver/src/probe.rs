//! The per-entry probe sequence.
//!
//! Navigation, a bounded readiness wait, a settle period, a driver-verified
//! tick count, motion snapshots, and an optional simulated key press. Every
//! wait past the readiness gate is fixed-duration, so a frozen game cannot
//! block the run. The output is one [`ProbeEvidence`] record.

use std::time::Duration;

use arcadescan_bridge::{decode_telemetry, encode_control, Control, Envelope, Telemetry};
use arcadescan_core_types::{GameEntry, ProbeEvidence};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ProbeConfig;
use crate::js;
use crate::keys::derive_movement_key;
use crate::session::ProbeBrowser;
use crate::signature::{motion_delta, FrameSignature};
use crate::ProbeError;

/// Query parameter appended to every probed URL so embedded code can
/// detect automation if it wants to.
pub const SCAN_MARKER_PARAM: &str = "arcadescan";

/// Telemetry gathered while waiting and observing.
#[derive(Debug, Default)]
struct AgentReport {
    ready: bool,
    last_fps: Option<f64>,
    first_paint_ms: Option<f64>,
    error_reports: u32,
}

impl AgentReport {
    fn absorb(&mut self, message: Telemetry) {
        match message {
            Telemetry::Ready(_) => self.ready = true,
            Telemetry::Metrics(sample) => {
                self.last_fps = Some(sample.fps);
                if self.first_paint_ms.is_none() {
                    self.first_paint_ms = sample.first_paint_ms;
                }
            }
            Telemetry::Error(payload) => {
                debug!(target: "probe", message = %payload.message, "agent reported error");
                self.error_reports += 1;
            }
            Telemetry::Console(_) | Telemetry::PauseState(_) | Telemetry::Highscores(_) => {}
        }
    }
}

#[derive(Debug, Deserialize)]
struct InboxItem {
    origin: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct CanvasProbe {
    found: bool,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
}

/// Drives one browser tab through the full evidence-gathering sequence.
pub struct HealthProbe {
    cfg: ProbeConfig,
}

impl HealthProbe {
    pub fn new(cfg: ProbeConfig) -> Self {
        Self { cfg }
    }

    /// Probe one entry at `entry_url`. Returns `Err` only for failures that
    /// prevented gathering evidence at all; the caller substitutes
    /// conservative failing evidence in that case.
    pub async fn probe(
        &self,
        browser: &dyn ProbeBrowser,
        entry: &GameEntry,
        entry_url: &Url,
    ) -> Result<ProbeEvidence, ProbeError> {
        let url = marked_url(entry_url);
        info!(target: "probe", id = %entry.id, %url, "probing entry");

        browser.reset_errors();
        browser.navigate(url.as_str()).await?;

        let embed_origin = self.document_origin(browser, &url).await;
        let mut report = AgentReport::default();

        let ready = self.wait_for_readiness(browser, &embed_origin, &mut report).await?;
        if !ready {
            // Stalled: the motion and response checks never ran, so the
            // only key-press flag we can honestly raise is none at all.
            return Ok(ProbeEvidence {
                id: entry.id.clone(),
                ready: false,
                avg_fps: report.last_fps.unwrap_or(0.0),
                ticks: 0,
                first_paint_ms: report.first_paint_ms,
                error_count: report.error_reports + browser.error_count(),
                no_motion: true,
                no_response: None,
                readiness_timeout_ms: self.cfg.readiness_timeout_ms,
            });
        }

        sleep(Duration::from_millis(self.cfg.settle_ms)).await;

        let sig_a = self.capture(browser).await?;
        sleep(Duration::from_millis(self.cfg.motion_gap_ms)).await;
        let sig_b = self.capture(browser).await?;
        let delta_ab = motion_delta(&sig_a, &sig_b);

        let (ticks, avg_fps) = self.verified_ticks(browser, &report).await;

        let static_pixels = matches!(delta_ab, Some(d) if d < self.cfg.motion_delta_min);
        if delta_ab.is_none() {
            debug!(target: "probe", id = %entry.id, "motion snapshots incomparable, relying on tick count");
        }
        let no_motion = static_pixels || ticks <= self.cfg.min_ticks;

        let no_response = self
            .response_check(browser, entry, &sig_b)
            .await;

        self.drain_telemetry(browser, &embed_origin, &mut report).await?;

        Ok(ProbeEvidence {
            id: entry.id.clone(),
            ready: true,
            avg_fps,
            ticks,
            first_paint_ms: report.first_paint_ms,
            error_count: report.error_reports + browser.error_count(),
            no_motion,
            no_response,
            readiness_timeout_ms: self.cfg.readiness_timeout_ms,
        })
    }

    /// Best-effort origin of the probed document, for telemetry filtering.
    async fn document_origin(&self, browser: &dyn ProbeBrowser, url: &Url) -> String {
        match browser.evaluate(js::DOCUMENT_ORIGIN, false).await {
            Ok(Value::String(origin)) => origin,
            Ok(_) | Err(_) => url.origin().ascii_serialization(),
        }
    }

    /// Poll for the agent's readiness signal until the timeout, then fall
    /// back to asking the DOM directly for a drawable surface.
    async fn wait_for_readiness(
        &self,
        browser: &dyn ProbeBrowser,
        embed_origin: &str,
        report: &mut AgentReport,
    ) -> Result<bool, ProbeError> {
        let deadline = Instant::now() + Duration::from_millis(self.cfg.readiness_timeout_ms);

        loop {
            self.drain_telemetry(browser, embed_origin, report).await?;
            if report.ready {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                break;
            }
            sleep(Duration::from_millis(self.cfg.readiness_poll_ms)).await;
        }

        let fallback = browser.evaluate(js::CANVAS_FALLBACK, false).await?;
        if let Some(text) = fallback.as_str() {
            if let Ok(probe) = serde_json::from_str::<CanvasProbe>(text) {
                if probe.found && probe.width > 0 && probe.height > 0 {
                    debug!(target: "probe", "readiness via DOM fallback");
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Count animation ticks with the driver's own loop. Falls back to the
    /// agent's last self-reported fps when the counting loop cannot run.
    async fn verified_ticks(&self, browser: &dyn ProbeBrowser, report: &AgentReport) -> (u32, f64) {
        let window_ms = self.cfg.tick_window_ms;
        let expr = js::tick_window_expr(window_ms);

        match browser.evaluate(&expr, true).await {
            Ok(value) => {
                let ticks = value.as_u64().unwrap_or(0) as u32;
                let avg_fps = f64::from(ticks) * 1000.0 / window_ms as f64;
                (ticks, avg_fps)
            }
            Err(err) => {
                warn!(target: "probe", ?err, "verified tick window failed, using agent-reported fps");
                let fps = report.last_fps.unwrap_or(0.0);
                let ticks = (fps * window_ms as f64 / 1000.0).round() as u32;
                (ticks, fps)
            }
        }
    }

    /// Press the derived movement key and compare snapshots around it.
    ///
    /// Returns `None` when the entry declares no derivable movement key,
    /// `Some(true)` when the press could not be confirmed to change
    /// anything (including dispatch failures and incomparable snapshots).
    async fn response_check(
        &self,
        browser: &dyn ProbeBrowser,
        entry: &GameEntry,
        before: &FrameSignature,
    ) -> Option<bool> {
        let key = entry.movement_input().and_then(derive_movement_key)?;

        // Embedded code commonly ignores input while it believes itself
        // blurred, so nudge focus before the press.
        self.send_control(browser, Control::Focus).await;

        if let Err(err) = browser.dispatch_key(&key).await {
            warn!(target: "probe", id = %entry.id, ?err, "key dispatch failed");
            return Some(true);
        }
        sleep(Duration::from_millis(self.cfg.response_wait_ms)).await;

        let after = match self.capture(browser).await {
            Ok(sig) => sig,
            Err(err) => {
                warn!(target: "probe", id = %entry.id, ?err, "post-press capture failed");
                return Some(true);
            }
        };

        match motion_delta(before, &after) {
            Some(delta) => Some(delta < self.cfg.motion_delta_min),
            None => Some(true),
        }
    }

    /// Post a host control into the document. Best effort: the press still
    /// proceeds when the post fails, and the failure is only logged.
    async fn send_control(&self, browser: &dyn ProbeBrowser, control: Control) {
        let envelope = encode_control(control);
        let json = match serde_json::to_string(&envelope) {
            Ok(json) => json,
            Err(err) => {
                debug!(target: "probe", ?err, "control envelope did not serialize");
                return;
            }
        };
        if let Err(err) = browser.evaluate(&js::post_control_expr(&json), false).await {
            debug!(target: "probe", ?err, "control post failed");
        }
    }

    async fn capture(&self, browser: &dyn ProbeBrowser) -> Result<FrameSignature, ProbeError> {
        let png = browser.capture_surface().await?;
        FrameSignature::from_png(&png, self.cfg.signature_cap)
    }

    async fn drain_telemetry(
        &self,
        browser: &dyn ProbeBrowser,
        embed_origin: &str,
        report: &mut AgentReport,
    ) -> Result<(), ProbeError> {
        let raw = browser.evaluate(js::DRAIN_INBOX, false).await?;
        let Some(text) = raw.as_str() else {
            return Ok(());
        };
        let items: Vec<InboxItem> = match serde_json::from_str(text) {
            Ok(items) => items,
            Err(err) => {
                debug!(target: "probe", ?err, "unparseable inbox drain");
                return Ok(());
            }
        };

        for item in items {
            let envelope: Envelope = match serde_json::from_str(&item.data) {
                Ok(envelope) => envelope,
                Err(_) => continue,
            };
            match decode_telemetry(&envelope, &item.origin, embed_origin) {
                Ok(message) => report.absorb(message),
                Err(dropped) => {
                    debug!(target: "probe", %dropped, "discarded inbound message");
                }
            }
        }
        Ok(())
    }
}

fn marked_url(entry_url: &Url) -> Url {
    let mut url = entry_url.clone();
    if !url
        .query_pairs()
        .any(|(key, _)| key == SCAN_MARKER_PARAM)
    {
        url.query_pairs_mut().append_pair(SCAN_MARKER_PARAM, "1");
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcadescan_bridge::{encode_telemetry, ConsoleLevel, ConsolePayload, ErrorPayload,
        MetricsSample, Telemetry};
    use arcadescan_core_types::{ControlBinding, Controls, EntryId, Status};
    use async_trait::async_trait;
    use image::{DynamicImage, Rgb, RgbImage};
    use serde_json::json;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::Mutex;

    const ORIGIN: &str = "http://localhost:8080";

    fn png_of(pixel: Rgb<u8>) -> Vec<u8> {
        let img = RgbImage::from_pixel(32, 32, pixel);
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn entry_with_movement(input: Option<&str>) -> GameEntry {
        let movement = input
            .map(|value| {
                vec![ControlBinding {
                    action: "move".to_string(),
                    input: value.to_string(),
                }]
            })
            .unwrap_or_default();
        GameEntry {
            id: EntryId::new("breakout"),
            title: "Breakout".to_string(),
            status: Status::Working,
            controls: Controls { movement },
            extra: Default::default(),
        }
    }

    fn inbox_json(messages: &[Telemetry]) -> String {
        let items: Vec<_> = messages
            .iter()
            .map(|message| {
                json!({
                    "origin": ORIGIN,
                    "data": serde_json::to_string(&encode_telemetry(message)).unwrap(),
                })
            })
            .collect();
        serde_json::to_string(&items).unwrap()
    }

    fn metrics(fps: f64) -> Telemetry {
        Telemetry::Metrics(MetricsSample {
            fps,
            frame_time_ms: 1000.0 / fps,
            frame_samples: 100,
            canvas_size: None,
            first_paint_ms: Some(42.0),
            device_pixel_ratio: 1.0,
        })
    }

    /// Scripted browser: each drain call returns the next inbox batch,
    /// each capture the next frame, tick evaluations a fixed count.
    struct ScriptedBrowser {
        inbox_batches: Mutex<Vec<String>>,
        captures: Mutex<Vec<Vec<u8>>>,
        ticks: Option<u64>,
        canvas_fallback: String,
        posted: Mutex<Vec<String>>,
        key_presses: AtomicUsize,
        errors: AtomicU32,
        resets: AtomicUsize,
        fail_dispatch: bool,
    }

    impl ScriptedBrowser {
        fn new(inbox_batches: Vec<String>, captures: Vec<Vec<u8>>, ticks: Option<u64>) -> Self {
            Self {
                inbox_batches: Mutex::new(inbox_batches),
                captures: Mutex::new(captures),
                ticks,
                canvas_fallback: r#"{"found":false}"#.to_string(),
                posted: Mutex::new(Vec::new()),
                key_presses: AtomicUsize::new(0),
                errors: AtomicU32::new(0),
                resets: AtomicUsize::new(0),
                fail_dispatch: false,
            }
        }
    }

    #[async_trait]
    impl ProbeBrowser for ScriptedBrowser {
        async fn navigate(&self, _url: &str) -> Result<(), ProbeError> {
            Ok(())
        }

        async fn evaluate(&self, expression: &str, await_promise: bool) -> Result<Value, ProbeError> {
            if expression == js::DOCUMENT_ORIGIN {
                return Ok(Value::String(ORIGIN.to_string()));
            }
            if expression == js::DRAIN_INBOX {
                let mut batches = self.inbox_batches.lock().unwrap();
                let batch = if batches.is_empty() {
                    "[]".to_string()
                } else {
                    batches.remove(0)
                };
                return Ok(Value::String(batch));
            }
            if expression == js::CANVAS_FALLBACK {
                return Ok(Value::String(self.canvas_fallback.clone()));
            }
            if expression.starts_with("window.postMessage(") {
                self.posted.lock().unwrap().push(expression.to_string());
                return Ok(Value::Null);
            }
            if await_promise {
                return match self.ticks {
                    Some(ticks) => Ok(json!(ticks)),
                    None => Err(ProbeError::Internal("tick loop unavailable".into())),
                };
            }
            Ok(Value::Null)
        }

        async fn capture_surface(&self) -> Result<Vec<u8>, ProbeError> {
            let mut captures = self.captures.lock().unwrap();
            if captures.is_empty() {
                return Err(ProbeError::Capture("no more frames scripted".into()));
            }
            Ok(captures.remove(0))
        }

        async fn dispatch_key(&self, _key: &crate::keys::KeyToken) -> Result<(), ProbeError> {
            if self.fail_dispatch {
                return Err(ProbeError::Dispatch("input domain unavailable".into()));
            }
            self.key_presses.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn error_count(&self) -> u32 {
            self.errors.load(Ordering::SeqCst)
        }

        fn reset_errors(&self) {
            // Pre-seeded counts stand for errors observed mid-probe, so the
            // fake only records that the probe asked for a fresh counter.
            self.resets.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fast_probe() -> HealthProbe {
        // Short windows keep the scripted runs quick without changing the
        // algorithm under test.
        HealthProbe::new(ProbeConfig {
            readiness_timeout_ms: 200,
            readiness_poll_ms: 10,
            settle_ms: 5,
            tick_window_ms: 2_000,
            min_ticks: 30,
            motion_gap_ms: 5,
            response_wait_ms: 5,
            motion_delta_min: 0.01,
            signature_cap: 128,
        })
    }

    fn url() -> Url {
        Url::parse("http://localhost:8080/games/breakout/").unwrap()
    }

    #[tokio::test]
    async fn stalled_when_readiness_never_arrives() {
        let browser = ScriptedBrowser::new(vec![], vec![], Some(120));
        let evidence = fast_probe()
            .probe(&browser, &entry_with_movement(None), &url())
            .await
            .unwrap();

        assert!(!evidence.ready);
        assert_eq!(evidence.ticks, 0);
        assert!(evidence.no_motion);
        assert_eq!(evidence.no_response, None);
        assert_eq!(browser.key_presses.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dom_fallback_rescues_missing_ready_signal() {
        let mut browser = ScriptedBrowser::new(
            vec![],
            vec![
                png_of(Rgb([0, 0, 0])),
                png_of(Rgb([255, 255, 255])),
            ],
            Some(120),
        );
        browser.canvas_fallback = r#"{"found":true,"width":640,"height":480}"#.to_string();

        let evidence = fast_probe()
            .probe(&browser, &entry_with_movement(None), &url())
            .await
            .unwrap();

        assert!(evidence.ready);
        assert!(!evidence.no_motion);
    }

    #[tokio::test]
    async fn moving_responsive_entry_passes_all_checks() {
        let ready = Telemetry::Ready(arcadescan_bridge::ReadyPayload {
            canvas: arcadescan_bridge::CanvasSize {
                width: 640,
                height: 480,
            },
            device_pixel_ratio: 1.0,
        });
        let browser = ScriptedBrowser::new(
            vec![inbox_json(&[ready, metrics(60.0)])],
            vec![
                png_of(Rgb([0, 0, 0])),
                png_of(Rgb([255, 255, 255])),
                png_of(Rgb([0, 0, 0])),
            ],
            Some(120),
        );

        let evidence = fast_probe()
            .probe(&browser, &entry_with_movement(Some("Arrow keys")), &url())
            .await
            .unwrap();

        assert!(evidence.ready);
        assert_eq!(evidence.ticks, 120);
        assert!((evidence.avg_fps - 60.0).abs() < f64::EPSILON);
        assert_eq!(evidence.first_paint_ms, Some(42.0));
        assert!(!evidence.no_motion);
        assert_eq!(evidence.no_response, Some(false));
        assert_eq!(browser.key_presses.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn static_frames_flag_no_motion() {
        let ready = Telemetry::Ready(arcadescan_bridge::ReadyPayload {
            canvas: arcadescan_bridge::CanvasSize {
                width: 320,
                height: 240,
            },
            device_pixel_ratio: 1.0,
        });
        let frame = png_of(Rgb([40, 40, 40]));
        let browser = ScriptedBrowser::new(
            vec![inbox_json(&[ready])],
            vec![frame.clone(), frame.clone(), frame],
            Some(120),
        );

        let evidence = fast_probe()
            .probe(&browser, &entry_with_movement(None), &url())
            .await
            .unwrap();

        assert!(evidence.no_motion);
        // No movement key declared, so responsiveness was never tested and
        // no control was posted either.
        assert_eq!(evidence.no_response, None);
        assert!(browser.posted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn focus_control_is_posted_before_the_key_press() {
        let ready = Telemetry::Ready(arcadescan_bridge::ReadyPayload {
            canvas: arcadescan_bridge::CanvasSize {
                width: 320,
                height: 240,
            },
            device_pixel_ratio: 1.0,
        });
        let browser = ScriptedBrowser::new(
            vec![inbox_json(&[ready])],
            vec![
                png_of(Rgb([0, 0, 0])),
                png_of(Rgb([255, 255, 255])),
                png_of(Rgb([0, 0, 0])),
            ],
            Some(120),
        );

        let evidence = fast_probe()
            .probe(&browser, &entry_with_movement(Some("Arrow keys")), &url())
            .await
            .unwrap();

        let posted = browser.posted.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert!(posted[0].contains("\\\"focus\\\""));
        assert_eq!(browser.key_presses.load(Ordering::SeqCst), 1);
        assert_eq!(evidence.no_response, Some(false));
    }

    #[tokio::test]
    async fn low_tick_count_flags_no_motion_despite_pixel_changes() {
        let ready = Telemetry::Ready(arcadescan_bridge::ReadyPayload {
            canvas: arcadescan_bridge::CanvasSize {
                width: 320,
                height: 240,
            },
            device_pixel_ratio: 1.0,
        });
        let browser = ScriptedBrowser::new(
            vec![inbox_json(&[ready])],
            vec![png_of(Rgb([0, 0, 0])), png_of(Rgb([255, 255, 255]))],
            Some(30),
        );

        let evidence = fast_probe()
            .probe(&browser, &entry_with_movement(None), &url())
            .await
            .unwrap();

        assert_eq!(evidence.ticks, 30);
        assert!(evidence.no_motion);
    }

    #[tokio::test]
    async fn dispatch_failure_is_conservative_no_response() {
        let ready = Telemetry::Ready(arcadescan_bridge::ReadyPayload {
            canvas: arcadescan_bridge::CanvasSize {
                width: 320,
                height: 240,
            },
            device_pixel_ratio: 1.0,
        });
        let mut browser = ScriptedBrowser::new(
            vec![inbox_json(&[ready])],
            vec![png_of(Rgb([0, 0, 0])), png_of(Rgb([255, 255, 255]))],
            Some(120),
        );
        browser.fail_dispatch = true;

        let evidence = fast_probe()
            .probe(&browser, &entry_with_movement(Some("A/D")), &url())
            .await
            .unwrap();

        assert_eq!(evidence.no_response, Some(true));
    }

    #[tokio::test]
    async fn sums_agent_and_driver_errors() {
        let ready = Telemetry::Ready(arcadescan_bridge::ReadyPayload {
            canvas: arcadescan_bridge::CanvasSize {
                width: 320,
                height: 240,
            },
            device_pixel_ratio: 1.0,
        });
        let agent_error = Telemetry::Error(ErrorPayload {
            message: "boom".to_string(),
            source: None,
            line: None,
            column: None,
            stack: None,
        });
        let console = Telemetry::Console(ConsolePayload {
            level: ConsoleLevel::Error,
            args: vec![json!("noise")],
        });
        let browser = ScriptedBrowser::new(
            vec![inbox_json(&[ready, agent_error.clone(), agent_error, console])],
            vec![png_of(Rgb([0, 0, 0])), png_of(Rgb([255, 255, 255]))],
            Some(120),
        );
        browser.errors.store(3, Ordering::SeqCst);

        let evidence = fast_probe()
            .probe(&browser, &entry_with_movement(None), &url())
            .await
            .unwrap();

        // Console telemetry is not an error report; the driver counts
        // console.error on its own side of the channel.
        assert_eq!(evidence.error_count, 5);
        assert_eq!(browser.resets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tick_loop_failure_falls_back_to_agent_fps() {
        let ready = Telemetry::Ready(arcadescan_bridge::ReadyPayload {
            canvas: arcadescan_bridge::CanvasSize {
                width: 320,
                height: 240,
            },
            device_pixel_ratio: 1.0,
        });
        let browser = ScriptedBrowser::new(
            vec![inbox_json(&[ready, metrics(50.0)])],
            vec![png_of(Rgb([0, 0, 0])), png_of(Rgb([255, 255, 255]))],
            None,
        );

        let evidence = fast_probe()
            .probe(&browser, &entry_with_movement(None), &url())
            .await
            .unwrap();

        assert!((evidence.avg_fps - 50.0).abs() < f64::EPSILON);
        assert_eq!(evidence.ticks, 100);
        assert!(!evidence.no_motion);
    }

    #[test]
    fn marker_param_is_appended_once() {
        let marked = marked_url(&url());
        assert_eq!(marked.query(), Some("arcadescan=1"));
        let remarked = marked_url(&marked);
        assert_eq!(remarked.query(), Some("arcadescan=1"));
    }

    #[tokio::test]
    async fn cross_origin_telemetry_is_discarded() {
        let ready = Telemetry::Ready(arcadescan_bridge::ReadyPayload {
            canvas: arcadescan_bridge::CanvasSize {
                width: 320,
                height: 240,
            },
            device_pixel_ratio: 1.0,
        });
        let foreign = json!([{
            "origin": "http://evil.example",
            "data": serde_json::to_string(&encode_telemetry(&ready)).unwrap(),
        }])
        .to_string();

        let mut browser = ScriptedBrowser::new(vec![foreign], vec![], Some(120));
        browser.canvas_fallback = r#"{"found":false}"#.to_string();

        let evidence = fast_probe()
            .probe(&browser, &entry_with_movement(None), &url())
            .await
            .unwrap();

        // The forged ready signal must not count.
        assert!(!evidence.ready);
    }
}
