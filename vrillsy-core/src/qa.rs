//! QA report — the diagnostic JSON document published alongside every
//! successfully rendered output.

use serde::{Deserialize, Serialize};

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaReport {
    pub job_id: String,
    pub target_s: f64,
    pub duration_out_s: f64,
    pub abs_err_s: f64,
    pub attention_segments: Vec<[f64; 2]>,
    pub attention_end_s: f64,
    pub beats_total: usize,
    pub beats_used: usize,
    pub segments_total: usize,
    pub fallback_used: bool,
    pub mean_abs_err_s: f64,
    pub sync_ratio_005: f64,
    pub profile: String,
    pub pre_time_s: f64,
    pub worker_version: String,
    pub timestamp_utc: String,
    pub elapsed_s: f64,
}

pub struct QaReportInputs {
    pub job_id: String,
    pub target_s: f64,
    pub duration_out_s: f64,
    pub attention_end_s: f64,
    pub beats_total: usize,
    pub beats_used: usize,
    pub cuts: Vec<f64>,
    /// The detected (post-filter) onset times, used to score how closely
    /// `cuts` actually lands on audible events.
    pub onsets: Vec<f64>,
    pub fallback_used: bool,
    pub profile_label: String,
    pub pre_time_s: f64,
    pub worker_version: String,
    pub timestamp_utc: String,
    pub elapsed_s: f64,
}

/// Beat-alignment scoring: for each cut, the distance to its nearest onset.
/// `mean_abs_err_s` is the mean of those distances; `sync_ratio_005` is the
/// fraction landing within a 0.05 s window of the nearest onset. With no
/// onsets to compare against, there is no misalignment to report.
fn beat_alignment(cuts: &[f64], onsets: &[f64]) -> (f64, f64) {
    if cuts.is_empty() || onsets.is_empty() {
        return (0.0, 1.0);
    }
    let nearest_dists: Vec<f64> = cuts
        .iter()
        .map(|&c| {
            onsets
                .iter()
                .fold(f64::INFINITY, |closest, &o| closest.min((o - c).abs()))
        })
        .collect();
    let mean_abs_err_s = nearest_dists.iter().sum::<f64>() / nearest_dists.len() as f64;
    let within_window = nearest_dists.iter().filter(|&&d| d <= 0.05).count();
    let sync_ratio_005 = within_window as f64 / nearest_dists.len() as f64;
    (mean_abs_err_s, sync_ratio_005)
}

impl QaReport {
    /// Builds the report from raw pipeline measurements, rounding every
    /// time field to 3 decimals as the external interface requires.
    pub fn build(inputs: QaReportInputs) -> Self {
        let abs_err_s = (inputs.duration_out_s - inputs.target_s).abs();
        let segments_total = inputs.cuts.len().saturating_sub(1);

        let (mean_abs_err_s, sync_ratio_005) = beat_alignment(&inputs.cuts, &inputs.onsets);

        QaReport {
            job_id: inputs.job_id,
            target_s: round3(inputs.target_s),
            duration_out_s: round3(inputs.duration_out_s),
            abs_err_s: round3(abs_err_s),
            attention_segments: vec![[0.0, round3(inputs.attention_end_s)]],
            attention_end_s: round3(inputs.attention_end_s),
            beats_total: inputs.beats_total,
            beats_used: inputs.beats_used,
            segments_total,
            fallback_used: inputs.fallback_used,
            mean_abs_err_s: round3(mean_abs_err_s),
            sync_ratio_005: round3(sync_ratio_005),
            profile: inputs.profile_label,
            pre_time_s: round3(inputs.pre_time_s),
            worker_version: inputs.worker_version,
            timestamp_utc: inputs.timestamp_utc,
            elapsed_s: round3(inputs.elapsed_s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_inputs() -> QaReportInputs {
        QaReportInputs {
            job_id: "job-1".to_string(),
            target_s: 10.0,
            duration_out_s: 10.02,
            attention_end_s: 1.2,
            beats_total: 40,
            beats_used: 36,
            cuts: vec![0.0, 1.2, 3.0, 5.5, 7.8, 10.0],
            onsets: vec![0.01, 1.18, 3.02, 5.46, 7.81, 9.99],
            fallback_used: false,
            profile_label: "1080x1920@30".to_string(),
            pre_time_s: 0.850,
            worker_version: "0.1.0".to_string(),
            timestamp_utc: "2026-07-28T00:00:00Z".to_string(),
            elapsed_s: 4.321,
        }
    }

    #[test]
    fn segments_total_is_cuts_len_minus_one() {
        let report = QaReport::build(sample_inputs());
        assert_eq!(report.segments_total, 5);
    }

    #[test]
    fn abs_err_matches_duration_minus_target() {
        let report = QaReport::build(sample_inputs());
        assert!((report.abs_err_s - 0.02).abs() < 1e-9);
    }

    #[test]
    fn attention_segments_starts_at_zero() {
        let report = QaReport::build(sample_inputs());
        assert_eq!(report.attention_segments[0][0], 0.0);
        assert_eq!(report.attention_segments[0][1], 1.2);
    }

    #[test]
    fn all_time_fields_rounded_to_three_decimals() {
        let mut inputs = sample_inputs();
        inputs.duration_out_s = 10.023456;
        let report = QaReport::build(inputs);
        assert_eq!(report.duration_out_s, 10.023);
    }

    #[test]
    fn tightly_aligned_cuts_score_near_zero_error_and_full_sync() {
        let report = QaReport::build(sample_inputs());
        assert!(report.mean_abs_err_s < 0.03);
        assert_eq!(report.sync_ratio_005, 1.0);
    }

    #[test]
    fn fallback_cuts_far_from_onsets_score_poor_sync() {
        let mut inputs = sample_inputs();
        inputs.cuts = vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0];
        inputs.onsets = vec![1.0, 3.0, 5.0, 7.0, 9.0];
        let report = QaReport::build(inputs);
        assert!(report.mean_abs_err_s >= 1.0);
        assert_eq!(report.sync_ratio_005, 0.0);
    }

    #[test]
    fn no_onsets_detected_yields_neutral_sync_score() {
        let mut inputs = sample_inputs();
        inputs.onsets = vec![];
        let report = QaReport::build(inputs);
        assert_eq!(report.mean_abs_err_s, 0.0);
        assert_eq!(report.sync_ratio_005, 1.0);
    }

    #[test]
    fn sync_ratio_counts_only_cuts_within_fifty_ms() {
        let mut inputs = sample_inputs();
        inputs.cuts = vec![0.0, 1.2, 3.0, 5.55, 7.8, 10.0];
        inputs.onsets = vec![0.0, 1.2, 3.0, 5.5, 7.8, 10.0];
        let report = QaReport::build(inputs);
        assert_eq!(report.sync_ratio_005, 5.0 / 6.0);
    }
}
