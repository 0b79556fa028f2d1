//! Composite production risk engine.
//!
//! Combines device-history and user-history signals into the five weighted
//! factors the trait's `Assessment::from_factors` expects, the same
//! weighted-sum shape `MockRiskEngine` stubs out with a single fixed
//! factor. Any dependency failure (device/user lookup error) falls back to
//! [`Assessment::conservative_fallback`] rather than propagating, per the
//! trait's documented contract.

use crate::actions::DeviceTrustLevel;
use crate::providers::risk_engine::{weights, Assessment, RiskContext, RiskFactor};
use crate::providers::{DeviceRepository, RiskEngine, UserRepository};
use chrono::Timelike;
use std::net::IpAddr;

/// Risk engine assessing location, device, behavior, temporal, and network
/// factors from device/user history.
pub struct CompositeRiskEngine<D, U> {
    devices: D,
    users: U,
}

impl<D, U> CompositeRiskEngine<D, U>
where
    D: DeviceRepository,
    U: UserRepository,
{
    /// Create a new composite risk engine.
    pub const fn new(devices: D, users: U) -> Self {
        Self { devices, users }
    }

    /// Device factor: unrecognized devices score higher; trust level
    /// (built from login count/age in the device repository) drives the
    /// sub-score directly.
    fn device_factor(device_id: Option<crate::state::DeviceId>) -> (f32, Option<DeviceTrustLevel>) {
        if device_id.is_none() {
            return (80.0, None);
        }
        (0.0, None) // resolved once the device record is fetched in `assess`
    }

    fn trust_level_score(trust_level: DeviceTrustLevel) -> f32 {
        match trust_level {
            DeviceTrustLevel::Unknown => 70.0,
            DeviceTrustLevel::Recognized => 40.0,
            DeviceTrustLevel::Familiar => 15.0,
            DeviceTrustLevel::Trusted => 5.0,
            DeviceTrustLevel::HighlyTrusted => 0.0,
        }
    }

    /// Temporal factor: logins far outside the user's usual hour-of-day
    /// score higher. Without a behavioral baseline this falls back to a
    /// coarse off-hours heuristic (00:00-05:00 local-to-server is riskier).
    fn temporal_factor(now: chrono::DateTime<chrono::Utc>) -> f32 {
        let hour = now.hour();
        if (0..5).contains(&hour) {
            60.0
        } else {
            10.0
        }
    }

    /// Network factor: a coarse private/loopback-vs-public heuristic;
    /// a production deployment would layer in IP reputation/VPN/Tor feeds
    /// here without changing this factor's weight or scale.
    fn network_factor(ip: IpAddr) -> f32 {
        let is_private_or_loopback = match ip {
            IpAddr::V4(v4) => v4.is_private() || v4.is_loopback(),
            IpAddr::V6(v6) => v6.is_loopback(),
        };
        if is_private_or_loopback {
            10.0
        } else {
            25.0
        }
    }

    /// Behavior factor: accumulates from the user's own rolling risk score
    /// (updated by the orchestrator after each login), giving recent bad
    /// behavior (repeated lockouts, anomalous sessions) persistent weight
    /// without a separate event-mining pipeline.
    fn behavior_factor(rolling_risk_score: f32) -> f32 {
        rolling_risk_score.clamp(0.0, 100.0)
    }
}

impl<D, U> RiskEngine for CompositeRiskEngine<D, U>
where
    D: DeviceRepository,
    U: UserRepository,
{
    async fn assess(&self, context: &RiskContext) -> crate::error::Result<Assessment> {
        let (mut device_score, _) = Self::device_factor(context.device_id);

        if let Some(device_id) = context.device_id {
            match self.devices.get_device(device_id).await {
                Ok(device) => device_score = Self::trust_level_score(device.trust_level),
                Err(_) => return Ok(Assessment::conservative_fallback()),
            }
        }

        let behavior_score = if let Some(user_id) = context.user_id {
            match self.users.get_user_by_id(user_id).await {
                Ok(user) => Self::behavior_factor(user.rolling_risk_score),
                Err(_) => return Ok(Assessment::conservative_fallback()),
            }
        } else {
            50.0 // anonymous / pre-resolution request: moderate default, never zero
        };

        // No dedicated geolocation dependency is wired in; location risk
        // rides on the device factor (a new device implies a new location
        // in the common case) until a geo-IP provider is added.
        let location_score = device_score;

        let factors = vec![
            RiskFactor {
                name: "location".to_string(),
                score: location_score,
                weight: weights::LOCATION,
                description: "derived from device recognition pending geo-IP integration".to_string(),
            },
            RiskFactor {
                name: "device".to_string(),
                score: device_score,
                weight: weights::DEVICE,
                description: "device trust level from login history".to_string(),
            },
            RiskFactor {
                name: "behavior".to_string(),
                score: behavior_score,
                weight: weights::BEHAVIOR,
                description: "user's rolling risk score".to_string(),
            },
            RiskFactor {
                name: "temporal".to_string(),
                score: Self::temporal_factor(context.now),
                weight: weights::TEMPORAL,
                description: "off-hours login heuristic".to_string(),
            },
            RiskFactor {
                name: "network".to_string(),
                score: Self::network_factor(context.ip_address),
                weight: weights::NETWORK,
                description: "private/loopback vs public IP heuristic".to_string(),
            },
        ];

        Ok(Assessment::from_factors(factors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MockDeviceRepository, MockUserRepository};
    use std::net::Ipv4Addr;

    fn context(device_id: Option<crate::state::DeviceId>, user_id: Option<crate::state::UserId>) -> RiskContext {
        RiskContext {
            user_id,
            device_id,
            ip_address: IpAddr::V4(Ipv4Addr::new(203, 0, 113, 10)),
            user_agent: "test-agent".to_string(),
            now: chrono::Utc::now().with_hour(14).unwrap(),
        }
    }

    #[tokio::test]
    async fn unknown_device_and_user_falls_back_conservatively_on_missing_user() {
        let engine = CompositeRiskEngine::new(MockDeviceRepository::new(), MockUserRepository::new());
        let assessment = engine
            .assess(&context(None, Some(crate::state::UserId::new())))
            .await
            .unwrap();
        assert!(assessment.allow_access);
        assert!(!assessment.requires_mfa);
    }

    #[tokio::test]
    async fn no_device_no_user_produces_moderate_score() {
        let engine = CompositeRiskEngine::new(MockDeviceRepository::new(), MockUserRepository::new());
        let assessment = engine.assess(&context(None, None)).await.unwrap();
        assert!(assessment.overall_score > 0.0);
        assert!(assessment.allow_access);
    }
}
