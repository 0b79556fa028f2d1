//! Mock risk engine for testing.

use crate::error::Result;
use crate::providers::risk_engine::{Assessment, RiskContext, RiskFactor};
use crate::providers::RiskEngine;

/// Mock risk engine returning a fixed score.
#[derive(Debug, Clone)]
pub struct MockRiskEngine {
    /// Score (`0..=100`) this mock always returns.
    pub score: f32,
}

impl MockRiskEngine {
    /// Low-risk mock (score 10).
    #[must_use]
    pub const fn new() -> Self {
        Self { score: 10.0 }
    }

    /// Score just under the MFA threshold (59).
    #[must_use]
    pub const fn medium_risk() -> Self {
        Self { score: 59.0 }
    }

    /// Score that requires step-up MFA but still allows access (70).
    #[must_use]
    pub const fn high_risk() -> Self {
        Self { score: 70.0 }
    }

    /// Score above the hard block threshold (96).
    #[must_use]
    pub const fn critical_risk() -> Self {
        Self { score: 96.0 }
    }
}

impl Default for MockRiskEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RiskEngine for MockRiskEngine {
    async fn assess(&self, _context: &RiskContext) -> Result<Assessment> {
        Ok(Assessment::from_factors(vec![RiskFactor {
            name: "mock".to_string(),
            score: self.score,
            weight: 1.0,
            description: "fixed score for testing".to_string(),
        }]))
    }
}
