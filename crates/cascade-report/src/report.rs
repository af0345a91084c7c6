use cascade_core::CrimeReport;
use cascade_model::ApkInfo;
use serde::Serialize;

use crate::threat::ThreatLevel;

/// Top-level JSON report envelope: bundle identity plus every rule's
/// outcome.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub md5: String,
    pub apk_filename: String,
    pub size_bytes: u64,
    pub threat_level: ThreatLevel,
    pub total_score: f64,
    pub crimes: Vec<CrimeReport>,
}

impl RunReport {
    pub fn build(apkinfo: &dyn ApkInfo, score_sum: f64, weight_sum: f64, crimes: Vec<CrimeReport>) -> Self {
        Self {
            md5: apkinfo.md5().to_string(),
            apk_filename: apkinfo.filename().to_string(),
            size_bytes: apkinfo.filesize(),
            threat_level: ThreatLevel::from_scores(score_sum, weight_sum),
            total_score: score_sum,
            crimes,
        }
    }

    pub fn to_json_string_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
