//! The scan loop: reachability pre-check, sequential probing, verdicts.

use std::sync::Arc;
use std::time::Duration;

use arcadescan_classifier::{classify, ClassifyConfig, HealthResult};
use arcadescan_core_types::{GameEntry, ProbeEvidence, ScanRunId, Status};
use arcadescan_probe::{HealthProbe, ProbeConfig, ProbeError, ProbeSession, ProbeTransport};
use async_trait::async_trait;
use tracing::{info, warn};
use url::Url;

use crate::errors::{ScanError, ScanResult};

/// Seam between the scan loop and the browser, so the loop is testable
/// without one.
#[async_trait]
pub trait EntryProber: Send + Sync {
    async fn probe_entry(&self, entry: &GameEntry, url: &Url) -> Result<ProbeEvidence, ProbeError>;
}

/// Real prober: one fresh tab per entry over a shared browser, so listener
/// state never leaks between entries.
pub struct SessionProber {
    transport: Arc<dyn ProbeTransport>,
    probe: HealthProbe,
}

impl SessionProber {
    pub fn new(transport: Arc<dyn ProbeTransport>, cfg: ProbeConfig) -> Self {
        Self {
            transport,
            probe: HealthProbe::new(cfg),
        }
    }
}

#[async_trait]
impl EntryProber for SessionProber {
    async fn probe_entry(&self, entry: &GameEntry, url: &Url) -> Result<ProbeEvidence, ProbeError> {
        let session = ProbeSession::open(self.transport.clone()).await?;
        let result = self.probe.probe(&session, entry, url).await;
        session.close().await;
        result
    }
}

pub struct ScanRunner {
    base_url: Url,
    probe_cfg: ProbeConfig,
    classify_cfg: ClassifyConfig,
}

impl ScanRunner {
    pub fn new(base_url: Url, probe_cfg: ProbeConfig) -> Self {
        Self {
            base_url,
            probe_cfg,
            classify_cfg: ClassifyConfig::default(),
        }
    }

    /// Confirm the serving endpoint answers at all. Any HTTP response,
    /// including 404, proves reachability; only transport-level failures
    /// abort the run.
    pub async fn check_reachable(&self) -> ScanResult<()> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|err| ScanError::Other(err.into()))?;

        match client.get(self.base_url.clone()).send().await {
            Ok(response) => {
                info!(target: "runner", status = %response.status(), "serving endpoint reachable");
                Ok(())
            }
            Err(err) => Err(ScanError::InfraUnreachable {
                url: self.base_url.to_string(),
                detail: err.to_string(),
            }),
        }
    }

    /// Embedding route for one entry.
    pub fn entry_url(&self, entry: &GameEntry) -> ScanResult<Url> {
        self.base_url
            .join(&format!("games/{}/", entry.id))
            .map_err(|err| ScanError::BadEndpoint(err.to_string()))
    }

    /// Probe and classify every entry, strictly sequentially. Per-entry
    /// probe failures become conservative failing evidence; the report
    /// always lists every entry exactly once.
    pub async fn run(
        &self,
        entries: &[GameEntry],
        prober: &dyn EntryProber,
    ) -> ScanResult<Vec<HealthResult>> {
        let run_id = ScanRunId::new();
        info!(target: "runner", %run_id, entries = entries.len(), "scan started");

        let mut results = Vec::with_capacity(entries.len());
        for entry in entries {
            let evidence = if entry.status == Status::MissingAssets {
                info!(target: "runner", id = %entry.id, "skipping entry with missing assets");
                ProbeEvidence::unprobed(entry.id.clone(), self.probe_cfg.readiness_timeout_ms)
            } else {
                match self.entry_url(entry) {
                    Ok(url) => match prober.probe_entry(entry, &url).await {
                        Ok(evidence) => evidence,
                        Err(err) => {
                            warn!(target: "runner", id = %entry.id, %err, "probe failed, recording failing evidence");
                            ProbeEvidence::unprobed(entry.id.clone(), self.probe_cfg.readiness_timeout_ms)
                        }
                    },
                    Err(err) => {
                        warn!(target: "runner", id = %entry.id, %err, "entry URL unusable, recording failing evidence");
                        ProbeEvidence::unprobed(entry.id.clone(), self.probe_cfg.readiness_timeout_ms)
                    }
                }
            };
            results.push(classify(entry, &evidence, &self.classify_cfg));
        }

        let broken = results.iter().filter(|r| r.is_broken()).count();
        info!(target: "runner", %run_id, broken, total = results.len(), "scan finished");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcadescan_core_types::EntryId;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn entry(id: &str, status: Status) -> GameEntry {
        GameEntry {
            id: EntryId::new(id),
            title: id.to_string(),
            status,
            controls: Default::default(),
            extra: Default::default(),
        }
    }

    fn passing(id: &str) -> ProbeEvidence {
        ProbeEvidence {
            id: EntryId::new(id),
            ready: true,
            avg_fps: 60.0,
            ticks: 120,
            first_paint_ms: Some(40.0),
            error_count: 0,
            no_motion: false,
            no_response: Some(false),
            readiness_timeout_ms: 10_000,
        }
    }

    struct MapProber {
        outcomes: Mutex<HashMap<String, Result<ProbeEvidence, ProbeError>>>,
        probed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EntryProber for MapProber {
        async fn probe_entry(
            &self,
            entry: &GameEntry,
            _url: &Url,
        ) -> Result<ProbeEvidence, ProbeError> {
            self.probed.lock().unwrap().push(entry.id.to_string());
            self.outcomes
                .lock()
                .unwrap()
                .remove(&entry.id.to_string())
                .unwrap_or_else(|| Ok(passing(&entry.id.to_string())))
        }
    }

    fn runner() -> ScanRunner {
        ScanRunner::new(
            Url::parse("http://localhost:8080/").unwrap(),
            ProbeConfig::default(),
        )
    }

    #[test]
    fn entry_urls_follow_the_per_id_route() {
        let url = runner().entry_url(&entry("breakout", Status::Working)).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/games/breakout/");
    }

    #[tokio::test]
    async fn missing_assets_entries_are_never_probed() {
        let prober = MapProber {
            outcomes: Mutex::new(HashMap::new()),
            probed: Mutex::new(Vec::new()),
        };
        let entries = vec![
            entry("breakout", Status::Working),
            entry("lost", Status::MissingAssets),
        ];

        let results = runner().run(&entries, &prober).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(prober.probed.lock().unwrap().as_slice(), ["breakout"]);
        assert_eq!(results[1].status, Status::MissingAssets);
    }

    #[tokio::test]
    async fn probe_failure_becomes_failing_evidence_not_an_abort() {
        let mut outcomes = HashMap::new();
        outcomes.insert(
            "snake".to_string(),
            Err(ProbeError::Capture("renderer gone".into())),
        );
        let prober = MapProber {
            outcomes: Mutex::new(outcomes),
            probed: Mutex::new(Vec::new()),
        };
        let entries = vec![entry("snake", Status::Working), entry("pong", Status::Working)];

        let results = runner().run(&entries, &prober).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].status, Status::Broken);
        assert!(results[0].stalled);
        assert_eq!(results[1].status, Status::Working);
    }

    #[tokio::test]
    async fn unjoinable_entry_url_becomes_failing_evidence_not_an_abort() {
        // A cannot-be-a-base URL makes every per-entry join fail.
        let runner = ScanRunner::new(
            Url::parse("mailto:ops@example.com").unwrap(),
            ProbeConfig::default(),
        );
        let prober = MapProber {
            outcomes: Mutex::new(HashMap::new()),
            probed: Mutex::new(Vec::new()),
        };
        let entries = vec![entry("snake", Status::Working)];

        let results = runner.run(&entries, &prober).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, Status::Broken);
        assert!(results[0].stalled);
        assert!(prober.probed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreachable_endpoint_aborts_before_probing() {
        // Port 9 (discard) refuses connections on any sane host.
        let runner = ScanRunner::new(
            Url::parse("http://127.0.0.1:9/").unwrap(),
            ProbeConfig::default(),
        );
        let err = runner.check_reachable().await.unwrap_err();
        assert!(matches!(err, ScanError::InfraUnreachable { .. }));
    }
}
