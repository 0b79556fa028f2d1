//! Risk engine trait (C4).
//!
//! Generalizes the passwordless-only `RiskCalculator` (`risk.rs`, a 0.0–1.0
//! scale used only by the OAuth reducer's placeholder scorer) into the
//! full multi-factor, 0–100 scale assessment the orchestrator, MFA
//! continuation, and rate limiter all consult.

use crate::error::Result;
use crate::state::{DeviceId, UserId};
use std::net::IpAddr;

/// Default factor weights, summing to 1.0.
pub mod weights {
    /// Location factor weight.
    pub const LOCATION: f32 = 0.25;
    /// Device factor weight.
    pub const DEVICE: f32 = 0.25;
    /// Behavior factor weight.
    pub const BEHAVIOR: f32 = 0.20;
    /// Temporal factor weight.
    pub const TEMPORAL: f32 = 0.15;
    /// Network factor weight.
    pub const NETWORK: f32 = 0.15;
}

/// Risk level bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RiskLevel {
    /// `score < 30`.
    Low,
    /// `30 <= score < 60`.
    Medium,
    /// `60 <= score < 85`.
    High,
    /// `score >= 85`.
    Critical,
}

impl RiskLevel {
    /// Classify a `0..=100` score into a level.
    #[must_use]
    pub const fn from_score(score: f32) -> Self {
        if score >= 85.0 {
            Self::Critical
        } else if score >= 60.0 {
            Self::High
        } else if score >= 30.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// One contributing factor to the overall score.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RiskFactor {
    /// Factor name, e.g. `"location"`.
    pub name: String,
    /// Sub-score in `0..=100`.
    pub score: f32,
    /// Weight applied to this factor's contribution.
    pub weight: f32,
    /// Human-readable explanation.
    pub description: String,
}

/// Full risk assessment result.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Assessment {
    /// Overall weighted score in `0..=100`.
    pub overall_score: f32,
    /// Bucket derived from `overall_score`.
    pub level: RiskLevel,
    /// Per-factor breakdown.
    pub factors: Vec<RiskFactor>,
    /// `true` when `overall_score >= 60`.
    pub requires_mfa: bool,
    /// `true` when `overall_score < 95` (or a manual override applies).
    pub allow_access: bool,
    /// Free-form operator recommendations (e.g. `"log"` on fallback).
    pub recommendations: Vec<String>,
}

impl Assessment {
    /// Combine factor scores into the deterministic weighted assessment,
    /// applying the fixed thresholds from the risk engine's design.
    #[must_use]
    pub fn from_factors(factors: Vec<RiskFactor>) -> Self {
        let overall_score = factors
            .iter()
            .map(|f| f.score * f.weight)
            .sum::<f32>()
            .clamp(0.0, 100.0);
        let level = RiskLevel::from_score(overall_score);
        Self {
            overall_score,
            level,
            requires_mfa: overall_score >= 60.0,
            allow_access: overall_score < 95.0,
            recommendations: Vec::new(),
            factors,
        }
    }

    /// The conservative fallback used when a risk-engine dependency fails:
    /// never hard-fail authentication on a risk-engine error.
    #[must_use]
    pub fn conservative_fallback() -> Self {
        Self {
            overall_score: 50.0,
            level: RiskLevel::Medium,
            factors: Vec::new(),
            requires_mfa: false,
            allow_access: true,
            recommendations: vec!["log".to_string()],
        }
    }
}

/// Inputs to a risk assessment.
#[derive(Debug, Clone)]
pub struct RiskContext {
    /// User being assessed, if known (absent during enumeration-safe
    /// failures before a user is resolved).
    pub user_id: Option<UserId>,
    /// Device id, if the client is recognized.
    pub device_id: Option<DeviceId>,
    /// Client IP address.
    pub ip_address: IpAddr,
    /// User-Agent header value.
    pub user_agent: String,
    /// Assessment timestamp.
    pub now: chrono::DateTime<chrono::Utc>,
}

/// Multi-factor risk engine.
///
/// # Implementation Notes
///
/// Assessment must be deterministic given identical inputs and complete in
/// under 20 ms with no blocking I/O beyond cached lookups; implementations
/// should pre-warm any geolocation/reputation caches out of band rather
/// than fetching them inline.
pub trait RiskEngine: Send + Sync {
    /// Compute the weighted multi-factor assessment for `context`.
    ///
    /// On a dependency failure, implementations must return
    /// [`Assessment::conservative_fallback`] rather than propagating the
    /// error — the trait's `Result` exists only for
    /// catastrophic/programmer-error conditions, not for routine fallback.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InternalError` only if even the fallback cannot
    /// be constructed (should not occur in practice).
    fn assess(
        &self,
        context: &RiskContext,
    ) -> impl std::future::Future<Output = Result<Assessment>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factor(name: &str, score: f32, weight: f32) -> RiskFactor {
        RiskFactor {
            name: name.to_string(),
            score,
            weight,
            description: String::new(),
        }
    }

    #[test]
    fn weights_sum_to_one() {
        let total = weights::LOCATION
            + weights::DEVICE
            + weights::BEHAVIOR
            + weights::TEMPORAL
            + weights::NETWORK;
        assert!((total - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn boundary_59_no_mfa_60_requires_mfa() {
        let below = Assessment::from_factors(vec![factor("x", 59.0, 1.0)]);
        assert!(!below.requires_mfa);
        let at = Assessment::from_factors(vec![factor("x", 60.0, 1.0)]);
        assert!(at.requires_mfa);
    }

    #[test]
    fn boundary_94_allowed_95_blocked() {
        let allowed = Assessment::from_factors(vec![factor("x", 94.0, 1.0)]);
        assert!(allowed.allow_access);
        let blocked = Assessment::from_factors(vec![factor("x", 95.0, 1.0)]);
        assert!(!blocked.allow_access);
    }

    #[test]
    fn level_thresholds() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(29.9), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(30.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(59.9), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(60.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(84.9), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(85.0), RiskLevel::Critical);
    }

    #[test]
    fn conservative_fallback_never_blocks_or_requires_mfa() {
        let fallback = Assessment::conservative_fallback();
        assert!(fallback.allow_access);
        assert!(!fallback.requires_mfa);
        assert_eq!(fallback.overall_score, 50.0);
    }
}
