//! Verdicts from probe evidence.
//!
//! Everything in this crate is a pure function of one entry's persisted
//! status plus the evidence the driver gathered. The engine only ever
//! demotes: a failing probe marks an entry `broken`, a passing probe
//! leaves whatever status was persisted before, and `missing-assets`
//! entries pass through without being judged at all.

use arcadescan_core_types::{EntryId, GameEntry, ProbeEvidence, Status};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Thresholds the verdict depends on. Empirical, kept adjustable.
#[derive(Clone, Copy, Debug)]
pub struct ClassifyConfig {
    /// Error counts strictly above this mark an entry broken.
    pub max_error_count: u32,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self { max_error_count: 3 }
    }
}

/// The four demotion triggers, derived from evidence.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HealthFlags {
    pub stalled: bool,
    pub no_motion: bool,
    pub no_response: bool,
    pub too_many_errors: bool,
}

impl HealthFlags {
    pub fn from_evidence(evidence: &ProbeEvidence, cfg: &ClassifyConfig) -> Self {
        Self {
            stalled: !evidence.ready,
            no_motion: evidence.no_motion,
            no_response: evidence.no_response.unwrap_or(false),
            too_many_errors: evidence.error_count > cfg.max_error_count,
        }
    }
}

/// True iff any demotion trigger fired.
pub fn should_mark_broken(flags: HealthFlags) -> bool {
    flags.stalled || flags.no_motion || flags.no_response || flags.too_many_errors
}

/// One entry's verdict, carrying both the decision and the evidence that
/// produced it so reports need nothing else.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResult {
    pub id: EntryId,
    pub ready: bool,
    pub avg_fps: f64,
    pub first_paint_ms: Option<f64>,
    pub error_count: u32,
    pub stalled: bool,
    pub no_motion: bool,
    /// `None` when responsiveness was never tested.
    pub no_response: Option<bool>,
    pub status: Status,
    pub previous_status: Status,
    pub note: String,
}

impl HealthResult {
    pub fn is_broken(&self) -> bool {
        self.status == Status::Broken
    }

    /// Whether reconciliation should persist this verdict: only fresh
    /// demotions are written back.
    pub fn wants_write_back(&self) -> bool {
        self.status == Status::Broken && self.previous_status != Status::Broken
    }
}

/// Classify one entry. `missing-assets` entries are never judged; they
/// come back unchanged with conservative flags so the report still lists
/// them.
pub fn classify(entry: &GameEntry, evidence: &ProbeEvidence, cfg: &ClassifyConfig) -> HealthResult {
    if entry.status == Status::MissingAssets {
        return HealthResult {
            id: entry.id.clone(),
            ready: false,
            avg_fps: 0.0,
            first_paint_ms: None,
            error_count: 0,
            stalled: true,
            no_motion: true,
            no_response: Some(true),
            status: Status::MissingAssets,
            previous_status: Status::MissingAssets,
            note: "Skipped: assets missing".to_string(),
        };
    }

    let flags = HealthFlags::from_evidence(evidence, cfg);
    let broken = should_mark_broken(flags);
    let status = if broken { Status::Broken } else { entry.status };

    if broken && entry.status != Status::Broken {
        debug!(target: "classifier", id = %entry.id, previous = %entry.status, "demoting entry");
    }

    HealthResult {
        id: entry.id.clone(),
        ready: evidence.ready,
        avg_fps: evidence.avg_fps,
        first_paint_ms: evidence.first_paint_ms,
        error_count: evidence.error_count,
        stalled: flags.stalled,
        no_motion: flags.no_motion,
        no_response: evidence.no_response,
        status,
        previous_status: entry.status,
        note: render_note(flags, evidence, cfg),
    }
}

/// Ordered concatenation of triggered reasons, or "Pass".
fn render_note(flags: HealthFlags, evidence: &ProbeEvidence, cfg: &ClassifyConfig) -> String {
    let mut reasons = Vec::new();
    if flags.stalled {
        reasons.push(format!(
            "Canvas not observed within {}s",
            evidence.readiness_timeout_ms / 1000
        ));
    }
    if flags.no_motion {
        reasons.push("No animation detected".to_string());
    }
    if flags.no_response {
        reasons.push("No reaction to simulated input".to_string());
    }
    if flags.too_many_errors {
        reasons.push(format!(
            "{} errors (limit {})",
            evidence.error_count, cfg.max_error_count
        ));
    }

    if reasons.is_empty() {
        "Pass".to_string()
    } else {
        reasons.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(status: Status) -> GameEntry {
        GameEntry {
            id: EntryId::new("breakout"),
            title: "Breakout".to_string(),
            status,
            controls: Default::default(),
            extra: Default::default(),
        }
    }

    fn passing_evidence() -> ProbeEvidence {
        ProbeEvidence {
            id: EntryId::new("breakout"),
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

    #[test]
    fn broken_iff_any_flag_fires() {
        // Boolean identity over every flag combination.
        for bits in 0u8..16 {
            let flags = HealthFlags {
                stalled: bits & 1 != 0,
                no_motion: bits & 2 != 0,
                no_response: bits & 4 != 0,
                too_many_errors: bits & 8 != 0,
            };
            assert_eq!(should_mark_broken(flags), bits != 0, "bits={bits:04b}");
        }
    }

    #[test]
    fn stalled_entry_is_broken_with_timeout_note() {
        let mut evidence = passing_evidence();
        evidence.ready = false;
        evidence.no_motion = true;
        evidence.no_response = None;
        evidence.avg_fps = 0.0;

        let result = classify(&entry(Status::Working), &evidence, &ClassifyConfig::default());
        assert!(result.stalled);
        assert_eq!(result.status, Status::Broken);
        assert!(result.note.contains("not observed within 10s"));
    }

    #[test]
    fn static_entry_without_controls_is_broken() {
        let mut evidence = passing_evidence();
        evidence.no_motion = true;
        evidence.no_response = None;

        let result = classify(&entry(Status::Working), &evidence, &ClassifyConfig::default());
        assert!(result.no_motion);
        assert_eq!(result.no_response, None);
        assert_eq!(result.status, Status::Broken);
        assert_eq!(result.note, "No animation detected");
    }

    #[test]
    fn clean_probe_keeps_previous_status() {
        for previous in [Status::Working, Status::Unknown, Status::Flaky, Status::Broken] {
            let result = classify(
                &entry(previous),
                &passing_evidence(),
                &ClassifyConfig::default(),
            );
            assert_eq!(result.status, previous, "previous={previous}");
            assert_eq!(result.note, "Pass");
        }
    }

    #[test]
    fn engine_never_promotes_broken_entries() {
        let result = classify(
            &entry(Status::Broken),
            &passing_evidence(),
            &ClassifyConfig::default(),
        );
        assert_eq!(result.status, Status::Broken);
        assert!(!result.wants_write_back());
    }

    #[test]
    fn error_count_over_limit_is_broken() {
        let mut evidence = passing_evidence();
        evidence.error_count = 5;

        let result = classify(&entry(Status::Working), &evidence, &ClassifyConfig::default());
        assert_eq!(result.status, Status::Broken);
        assert_eq!(result.note, "5 errors (limit 3)");
        assert!(result.wants_write_back());
    }

    #[test]
    fn error_count_at_limit_passes() {
        let mut evidence = passing_evidence();
        evidence.error_count = 3;

        let result = classify(&entry(Status::Working), &evidence, &ClassifyConfig::default());
        assert_eq!(result.status, Status::Working);
    }

    #[test]
    fn missing_assets_passes_through_unjudged() {
        // Even obviously failing evidence must not affect the verdict.
        let evidence = ProbeEvidence::unprobed(EntryId::new("breakout"), 10_000);
        let result = classify(
            &entry(Status::MissingAssets),
            &evidence,
            &ClassifyConfig::default(),
        );
        assert_eq!(result.status, Status::MissingAssets);
        assert_eq!(result.previous_status, Status::MissingAssets);
        assert!(!result.wants_write_back());
        assert_eq!(result.note, "Skipped: assets missing");
        // Flags stay conservatively failing even though no judgement ran.
        assert!(result.stalled);
        assert!(result.no_motion);
        assert_eq!(result.no_response, Some(true));
    }

    #[test]
    fn notes_concatenate_in_trigger_order() {
        let mut evidence = passing_evidence();
        evidence.ready = false;
        evidence.no_motion = true;
        evidence.no_response = Some(true);
        evidence.error_count = 9;

        let result = classify(&entry(Status::Working), &evidence, &ClassifyConfig::default());
        assert_eq!(
            result.note,
            "Canvas not observed within 10s; No animation detected; \
             No reaction to simulated input; 9 errors (limit 3)"
        );
    }

    #[test]
    fn untested_response_never_counts_against_entry() {
        let mut evidence = passing_evidence();
        evidence.no_response = None;

        let result = classify(&entry(Status::Working), &evidence, &ClassifyConfig::default());
        assert_eq!(result.status, Status::Working);
    }
}
