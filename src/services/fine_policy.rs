//! Per-media-type loan duration and daily fine rate

use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::{
    config::{CirculationConfig, MediaPolicyConfig},
    models::MediaType,
};

/// Loan duration and daily fine for one media type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaPolicy {
    pub loan_days: i64,
    pub fine_per_day: Decimal,
}

impl From<MediaPolicyConfig> for MediaPolicy {
    fn from(config: MediaPolicyConfig) -> Self {
        Self {
            loan_days: config.loan_days,
            fine_per_day: config.fine_per_day,
        }
    }
}

/// Lookup table from media type to policy.
///
/// Types without an entry get the fallback policy, which the default
/// configuration sets to the shortest loan and the highest rate.
#[derive(Debug, Clone)]
pub struct FinePolicyRegistry {
    policies: HashMap<MediaType, MediaPolicy>,
    fallback: MediaPolicy,
}

impl FinePolicyRegistry {
    /// Empty registry: every type resolves to `fallback`
    pub fn new(fallback: MediaPolicy) -> Self {
        Self {
            policies: HashMap::new(),
            fallback,
        }
    }

    pub fn with_policy(mut self, media_type: MediaType, policy: MediaPolicy) -> Self {
        self.policies.insert(media_type, policy);
        self
    }

    pub fn from_config(config: &CirculationConfig) -> Self {
        Self::new(config.default.into())
            .with_policy(MediaType::Book, config.book.into())
            .with_policy(MediaType::Cd, config.cd.into())
            .with_policy(MediaType::Journal, config.journal.into())
    }

    pub fn policy(&self, media_type: MediaType) -> MediaPolicy {
        self.policies
            .get(&media_type)
            .copied()
            .unwrap_or(self.fallback)
    }

    pub fn rate_per_day(&self, media_type: MediaType) -> Decimal {
        self.policy(media_type).fine_per_day
    }

    pub fn borrow_duration_days(&self, media_type: MediaType) -> i64 {
        self.policy(media_type).loan_days
    }

    /// First-issue amount: daily rate times days late, zero when not late
    pub fn initial_fine(&self, media_type: MediaType, overdue_days: i64) -> Decimal {
        if overdue_days <= 0 {
            return Decimal::ZERO;
        }
        self.rate_per_day(media_type) * Decimal::from(overdue_days)
    }
}

impl Default for FinePolicyRegistry {
    fn default() -> Self {
        Self::from_config(&CirculationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rates() {
        let registry = FinePolicyRegistry::default();
        assert_eq!(registry.rate_per_day(MediaType::Book), Decimal::from(10));
        assert_eq!(registry.rate_per_day(MediaType::Cd), Decimal::from(20));
        assert_eq!(registry.rate_per_day(MediaType::Journal), Decimal::from(15));
    }

    #[test]
    fn test_default_durations() {
        let registry = FinePolicyRegistry::default();
        assert_eq!(registry.borrow_duration_days(MediaType::Book), 28);
        assert_eq!(registry.borrow_duration_days(MediaType::Cd), 7);
        assert_eq!(registry.borrow_duration_days(MediaType::Journal), 14);
    }

    #[test]
    fn test_missing_type_uses_fallback() {
        let fallback = MediaPolicy {
            loan_days: 3,
            fine_per_day: Decimal::from(50),
        };
        let registry = FinePolicyRegistry::new(fallback).with_policy(
            MediaType::Book,
            MediaPolicy {
                loan_days: 28,
                fine_per_day: Decimal::from(10),
            },
        );
        assert_eq!(registry.policy(MediaType::Journal), fallback);
        assert_eq!(registry.rate_per_day(MediaType::Book), Decimal::from(10));
    }

    #[test]
    fn test_initial_fine() {
        let registry = FinePolicyRegistry::default();
        assert_eq!(registry.initial_fine(MediaType::Cd, 3), Decimal::from(60));
        assert_eq!(registry.initial_fine(MediaType::Book, 0), Decimal::ZERO);
        assert_eq!(registry.initial_fine(MediaType::Book, -4), Decimal::ZERO);
    }
}
