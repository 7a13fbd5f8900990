//! Archetype classification
//!
//! A priority-ordered rule cascade. Rules are evaluated top to bottom and the
//! first match wins; `Moderate` is the fallthrough. Exclusion rules come first
//! so a region failing an exclusion threshold is never labelled a leader.

use crate::config::ClassifierThresholds;
use crate::types::{Archetype, PillarMetrics};

type Predicate = fn(&PillarMetrics, f64, &ClassifierThresholds) -> bool;

/// One entry of the cascade
pub struct Rule {
    pub name: &'static str,
    pub archetype: Archetype,
    predicate: Predicate,
}

impl Rule {
    pub fn matches(&self, m: &PillarMetrics, health: f64, t: &ClassifierThresholds) -> bool {
        (self.predicate)(m, health, t)
    }
}

/// Rule order is part of the classification policy.
pub static RULES: [Rule; 6] = [
    Rule {
        name: "youth_exclusion",
        archetype: Archetype::ExcludedYouth,
        predicate: |m, _, t| m.yir < t.youth_exclusion_yir,
    },
    Rule {
        name: "update_imbalance",
        archetype: Archetype::ExcludedUpdateImbalance,
        predicate: |m, _, t| m.ubi < t.ubi_low || m.ubi > t.ubi_high,
    },
    Rule {
        name: "geographic_concentration",
        archetype: Archetype::ExcludedGeographic,
        predicate: |m, _, t| m.gci > t.geographic_gci,
    },
    Rule {
        name: "sleepwalker",
        archetype: Archetype::Sleepwalker,
        predicate: |m, health, t| m.tcs < t.sleepwalker_tcs && health < t.sleepwalker_health,
    },
    Rule {
        name: "digital_leader",
        archetype: Archetype::DigitalLeader,
        predicate: |m, health, t| {
            health > t.leader_health
                && m.tcs > t.leader_tcs
                && m.gci < t.leader_gci
                && m.yir > t.leader_yir
        },
    },
    Rule {
        name: "sprinter",
        archetype: Archetype::Sprinter,
        predicate: |m, _, t| m.idi > t.sprinter_idi,
    },
];

/// Classifier applying [`RULES`] with a given set of thresholds
pub struct ArchetypeClassifier<'a> {
    thresholds: &'a ClassifierThresholds,
}

impl<'a> ArchetypeClassifier<'a> {
    pub fn new(thresholds: &'a ClassifierThresholds) -> Self {
        Self { thresholds }
    }

    /// First matching rule, if any
    pub fn matching_rule(&self, metrics: &PillarMetrics, health: f64) -> Option<&'static Rule> {
        RULES
            .iter()
            .find(|rule| rule.matches(metrics, health, self.thresholds))
    }

    /// Exactly one archetype per region
    pub fn classify(&self, metrics: &PillarMetrics, health: f64) -> Archetype {
        self.matching_rule(metrics, health)
            .map(|rule| rule.archetype)
            .unwrap_or(Archetype::Moderate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Metrics that trip no rule at all
    fn neutral() -> PillarMetrics {
        PillarMetrics {
            idi: 0.0,
            ubi: 0.45,
            yir: 1.0,
            gci: 0.5,
            tcs: 0.5,
        }
    }

    fn classify(m: PillarMetrics, health: f64) -> Archetype {
        let thresholds = ClassifierThresholds::default();
        ArchetypeClassifier::new(&thresholds).classify(&m, health)
    }

    #[test]
    fn test_rule_order() {
        let names: Vec<&str> = RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "youth_exclusion",
                "update_imbalance",
                "geographic_concentration",
                "sleepwalker",
                "digital_leader",
                "sprinter",
            ]
        );
    }

    #[test]
    fn test_fallthrough_is_moderate() {
        assert_eq!(classify(neutral(), 55.0), Archetype::Moderate);
    }

    #[test]
    fn test_youth_exclusion_dominates() {
        // Would otherwise match every later rule
        let m = PillarMetrics {
            idi: 0.5,
            ubi: 0.1,
            yir: 0.59,
            gci: 0.9,
            tcs: 0.1,
        };
        assert_eq!(classify(m, 10.0), Archetype::ExcludedYouth);
        assert_eq!(classify(m, 99.0), Archetype::ExcludedYouth);
    }

    #[test]
    fn test_youth_threshold_is_strict() {
        let m = PillarMetrics { yir: 0.6, ..neutral() };
        assert_eq!(classify(m, 55.0), Archetype::Moderate);
    }

    #[test]
    fn test_update_imbalance() {
        let low = PillarMetrics { ubi: 0.24, ..neutral() };
        let high = PillarMetrics { ubi: 0.66, ..neutral() };
        let edge = PillarMetrics { ubi: 0.65, ..neutral() };

        assert_eq!(classify(low, 55.0), Archetype::ExcludedUpdateImbalance);
        assert_eq!(classify(high, 55.0), Archetype::ExcludedUpdateImbalance);
        assert_eq!(classify(edge, 55.0), Archetype::Moderate);
    }

    #[test]
    fn test_update_imbalance_before_geographic() {
        let m = PillarMetrics {
            ubi: 0.9,
            gci: 0.9,
            ..neutral()
        };
        assert_eq!(classify(m, 55.0), Archetype::ExcludedUpdateImbalance);
    }

    #[test]
    fn test_geographic() {
        let m = PillarMetrics { gci: 0.61, ..neutral() };
        assert_eq!(classify(m, 90.0), Archetype::ExcludedGeographic);
    }

    #[test]
    fn test_sleepwalker_needs_both_conditions() {
        let m = PillarMetrics { tcs: 0.3, ..neutral() };
        assert_eq!(classify(m, 39.0), Archetype::Sleepwalker);
        assert_eq!(classify(m, 40.0), Archetype::Moderate);
    }

    #[test]
    fn test_digital_leader() {
        let m = PillarMetrics {
            tcs: 0.7,
            gci: 0.3,
            yir: 0.9,
            idi: 0.1,
            ..neutral()
        };
        assert_eq!(classify(m, 71.0), Archetype::DigitalLeader);
        // Not healthy enough: falls to the IDI rule
        assert_eq!(classify(m, 70.0), Archetype::Sprinter);
    }

    #[test]
    fn test_sprinter() {
        let m = PillarMetrics { idi: 0.031, ..neutral() };
        assert_eq!(classify(m, 55.0), Archetype::Sprinter);

        let m = PillarMetrics { idi: 0.03, ..neutral() };
        assert_eq!(classify(m, 55.0), Archetype::Moderate);
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds = ClassifierThresholds {
            youth_exclusion_yir: 1.2,
            ..Default::default()
        };
        let classifier = ArchetypeClassifier::new(&thresholds);

        assert_eq!(classifier.classify(&neutral(), 55.0), Archetype::ExcludedYouth);
        assert_eq!(
            classifier.matching_rule(&neutral(), 55.0).map(|r| r.name),
            Some("youth_exclusion")
        );
    }

    #[test]
    fn test_each_rule_individually() {
        let thresholds = ClassifierThresholds::default();
        let youth = PillarMetrics { yir: 0.1, ..neutral() };

        assert!(RULES[0].matches(&youth, 50.0, &thresholds));
        assert!(!RULES[1].matches(&youth, 50.0, &thresholds));
        assert!(!RULES[2].matches(&youth, 50.0, &thresholds));
        assert!(!RULES[3].matches(&youth, 50.0, &thresholds));
        assert!(!RULES[4].matches(&youth, 50.0, &thresholds));
        assert!(!RULES[5].matches(&youth, 50.0, &thresholds));
    }
}
