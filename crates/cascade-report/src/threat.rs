use std::fmt;

/// Coarse risk banding derived from `score_sum / weight_sum`.
///
/// Thresholds (40% / 70%) are a deliberate, documented choice rather than
/// a value pulled from elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreatLevel {
    Low,
    Moderate,
    High,
}

impl ThreatLevel {
    pub fn from_scores(score_sum: f64, weight_sum: f64) -> Self {
        if weight_sum <= 0.0 {
            return Self::Low;
        }
        let percent = (score_sum / weight_sum) * 100.0;
        if percent > 70.0 {
            Self::High
        } else if percent > 40.0 {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low Risk",
            Self::Moderate => "Moderate Risk",
            Self::High => "High Risk",
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for ThreatLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_weight_is_low_risk() {
        assert_eq!(ThreatLevel::from_scores(0.0, 0.0), ThreatLevel::Low);
    }

    #[test]
    fn bands_follow_percent_thresholds() {
        assert_eq!(ThreatLevel::from_scores(3.0, 10.0), ThreatLevel::Low);
        assert_eq!(ThreatLevel::from_scores(5.0, 10.0), ThreatLevel::Moderate);
        assert_eq!(ThreatLevel::from_scores(8.0, 10.0), ThreatLevel::High);
    }
}
