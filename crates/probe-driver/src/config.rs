//! Probe tuning and browser transport configuration.

use std::env;
use std::path::{Path, PathBuf};

use which::which;

/// Empirically chosen probe thresholds and windows. Kept as configuration
/// rather than literals so calibration does not mean re-deriving the
/// algorithm. Known accepted risk: intentionally slow-animating games can
/// trip the motion thresholds; the values are deliberately not "fixed" by
/// guessing better ones.
#[derive(Clone, Copy, Debug)]
pub struct ProbeConfig {
    /// Bounded wait for the agent readiness signal.
    pub readiness_timeout_ms: u64,
    /// Poll interval while waiting for readiness.
    pub readiness_poll_ms: u64,
    /// Settle period after readiness before any measurement.
    pub settle_ms: u64,
    /// Driver-verified animation tick counting window.
    pub tick_window_ms: u64,
    /// Verified tick counts at or below this over the window count as
    /// not animating.
    pub min_ticks: u32,
    /// Gap between motion snapshots A and B.
    pub motion_gap_ms: u64,
    /// Wait after the simulated key press before snapshot C.
    pub response_wait_ms: u64,
    /// Mean luminance delta below which a pair of snapshots is "static".
    pub motion_delta_min: f64,
    /// Longer-dimension cap for downsampled frame signatures.
    pub signature_cap: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            readiness_timeout_ms: 10_000,
            readiness_poll_ms: 100,
            settle_ms: 500,
            tick_window_ms: 2_000,
            min_ticks: 30,
            motion_gap_ms: 500,
            response_wait_ms: 300,
            motion_delta_min: 0.01,
            signature_cap: 128,
        }
    }
}

impl ProbeConfig {
    pub fn with_readiness_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.readiness_timeout_ms = timeout_ms;
        self
    }
}

/// Configuration for launching and talking to the browser.
#[derive(Clone, Debug)]
pub struct TransportConfig {
    pub executable: PathBuf,
    pub user_data_dir: PathBuf,
    pub headless: bool,
    pub default_deadline_ms: u64,
    pub websocket_url: Option<String>,
    pub heartbeat_interval_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            executable: detect_chrome_executable().unwrap_or_default(),
            user_data_dir: default_profile_dir(),
            headless: resolve_headless_default(),
            default_deadline_ms: 30_000,
            websocket_url: None,
            heartbeat_interval_ms: 15_000,
        }
    }
}

fn resolve_headless_default() -> bool {
    match env::var("SCAN_HEADLESS") {
        Ok(value) => {
            let lower = value.to_ascii_lowercase();
            !matches!(lower.as_str(), "0" | "false" | "no" | "off")
        }
        Err(_) => true,
    }
}

fn default_profile_dir() -> PathBuf {
    if let Ok(path) = env::var("SCAN_CHROME_PROFILE") {
        return PathBuf::from(path);
    }
    Path::new("./.arcadescan-profile").into()
}

#[cfg(target_os = "windows")]
const PATH_NAMES: &[&str] = &["chrome.exe", "chromium.exe", "msedge.exe"];
#[cfg(not(target_os = "windows"))]
const PATH_NAMES: &[&str] = &[
    "google-chrome-stable",
    "google-chrome",
    "chromium",
    "chromium-browser",
];

/// Locate a Chrome/Chromium executable: `SCAN_CHROME` first, then PATH,
/// then well-known OS install locations (unless `SCAN_SKIP_OS_PATHS` says
/// otherwise).
pub fn detect_chrome_executable() -> Option<PathBuf> {
    if let Some(path) = env_override() {
        return Some(path);
    }
    if let Some(path) = PATH_NAMES.iter().find_map(|name| which(name).ok()) {
        return Some(path);
    }
    if env::var_os("SCAN_SKIP_OS_PATHS").is_some_and(|value| !value.is_empty()) {
        return None;
    }
    install_locations().into_iter().find(|path| path.exists())
}

fn env_override() -> Option<PathBuf> {
    let raw = env::var("SCAN_CHROME").ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let path = PathBuf::from(trimmed);
    path.exists().then_some(path)
}

#[cfg(target_os = "windows")]
fn install_locations() -> Vec<PathBuf> {
    ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"]
        .iter()
        .filter_map(|key| env::var(key).ok())
        .filter(|value| !value.trim().is_empty())
        .flat_map(|value| {
            let root = PathBuf::from(value.trim());
            [
                root.join("Google/Chrome/Application/chrome.exe"),
                root.join("Chromium/Application/chrome.exe"),
            ]
        })
        .collect()
}

#[cfg(target_os = "macos")]
fn install_locations() -> Vec<PathBuf> {
    vec![
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome".into(),
        "/Applications/Chromium.app/Contents/MacOS/Chromium".into(),
    ]
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn install_locations() -> Vec<PathBuf> {
    PATH_NAMES
        .iter()
        .map(|name| Path::new("/usr/bin").join(name))
        .collect()
}
