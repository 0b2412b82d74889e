use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One severity assessment attached to a vulnerability record.
///
/// Records commonly carry several: a CVSS v3 vector from NVD plus a vendor
/// rating from the distro's security tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Severity {
    pub scheme: SeverityScheme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
}

impl Severity {
    pub fn cvss(scheme: SeverityScheme, score: f64) -> Self {
        Self {
            scheme,
            score: Some(score),
            rating: None,
        }
    }

    pub fn vendor(rating: &str) -> Self {
        Self {
            scheme: SeverityScheme::Vendor,
            score: None,
            rating: Some(rating.to_string()),
        }
    }

    /// Map this assessment to a severity bucket.
    pub fn bucket(&self) -> SeverityBucket {
        if let Some(score) = self.score {
            return SeverityBucket::from_score(score);
        }
        match &self.rating {
            Some(r) => SeverityBucket::from_rating(r),
            None => SeverityBucket::Unknown,
        }
    }
}

/// Scoring scheme of a severity assessment, ordered by trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityScheme {
    CvssV4,
    CvssV3,
    CvssV2,
    Vendor,
}

impl SeverityScheme {
    /// Precedence when a record carries several assessments:
    /// CVSS v4 > v3 > v2 > vendor string.
    pub fn precedence(&self) -> u8 {
        match self {
            SeverityScheme::CvssV4 => 3,
            SeverityScheme::CvssV3 => 2,
            SeverityScheme::CvssV2 => 1,
            SeverityScheme::Vendor => 0,
        }
    }
}

/// The presentation-facing severity bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityBucket {
    Critical,
    High,
    Medium,
    Low,
    Negligible,
    #[default]
    Unknown,
}

impl SeverityBucket {
    /// Bucket a CVSS base score: critical >= 9.0, high >= 7.0,
    /// medium >= 4.0, low > 0, negligible = 0.
    pub fn from_score(score: f64) -> Self {
        if !score.is_finite() || score < 0.0 {
            SeverityBucket::Unknown
        } else if score >= 9.0 {
            SeverityBucket::Critical
        } else if score >= 7.0 {
            SeverityBucket::High
        } else if score >= 4.0 {
            SeverityBucket::Medium
        } else if score > 0.0 {
            SeverityBucket::Low
        } else {
            SeverityBucket::Negligible
        }
    }

    pub fn from_rating(rating: &str) -> Self {
        match rating.to_ascii_lowercase().as_str() {
            "critical" => SeverityBucket::Critical,
            "high" | "important" => SeverityBucket::High,
            "medium" | "moderate" => SeverityBucket::Medium,
            "low" => SeverityBucket::Low,
            "negligible" | "none" => SeverityBucket::Negligible,
            _ => SeverityBucket::Unknown,
        }
    }

    /// Ordering rank; higher is more severe. Unknown ranks lowest so it
    /// never trips a fail-on threshold.
    pub fn rank(&self) -> u8 {
        match self {
            SeverityBucket::Unknown => 0,
            SeverityBucket::Negligible => 1,
            SeverityBucket::Low => 2,
            SeverityBucket::Medium => 3,
            SeverityBucket::High => 4,
            SeverityBucket::Critical => 5,
        }
    }

    /// Whether a finding at this severity meets a `--fail-on` threshold.
    pub fn meets_threshold(&self, threshold: SeverityBucket) -> bool {
        *self != SeverityBucket::Unknown && self.rank() >= threshold.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityBucket::Critical => "critical",
            SeverityBucket::High => "high",
            SeverityBucket::Medium => "medium",
            SeverityBucket::Low => "low",
            SeverityBucket::Negligible => "negligible",
            SeverityBucket::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SeverityBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeverityBucket {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Ok(SeverityBucket::Critical),
            "high" => Ok(SeverityBucket::High),
            "medium" => Ok(SeverityBucket::Medium),
            "low" => Ok(SeverityBucket::Low),
            "negligible" => Ok(SeverityBucket::Negligible),
            "unknown" => Ok(SeverityBucket::Unknown),
            _ => Err(()),
        }
    }
}
