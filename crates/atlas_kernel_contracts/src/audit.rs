#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::common::validate_token;
use crate::lattice::COORDS_PER_CLASS;
use crate::ledger::{MissingKinds, StepRef, KIND_ACE_STEP, KIND_CHECKPOINT, KIND_PETC, MAX_KIND_LEN};
use crate::{ContractViolation, Validate};

pub const DEFAULT_WINDOW_SIZE: u32 = 768;
pub const DEFAULT_WINDOW_COUNT: u32 = 16;
pub const DEFAULT_AUDIT_INTERVAL: u64 = 768;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub window_size: u32,
    pub window_count: u32,
    pub audit_interval: u64,
}

impl ScheduleConfig {
    pub fn v1(
        window_size: u32,
        window_count: u32,
        audit_interval: u64,
    ) -> Result<Self, ContractViolation> {
        let cfg = Self {
            window_size,
            window_count,
            audit_interval,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Coordinates the schedule intends to visit per class.
    pub fn scheduled_coords(&self) -> u64 {
        u64::from(self.window_size) * u64::from(self.window_count)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            window_count: DEFAULT_WINDOW_COUNT,
            audit_interval: DEFAULT_AUDIT_INTERVAL,
        }
    }
}

impl Validate for ScheduleConfig {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.window_size == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "schedule_config.window_size",
                reason: "must be > 0",
            });
        }
        if self.window_count == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "schedule_config.window_count",
                reason: "must be > 0",
            });
        }
        if self.scheduled_coords() > u64::from(COORDS_PER_CLASS) {
            return Err(ContractViolation::InvalidRange {
                field: "schedule_config.window_size*window_count",
                min: 1,
                max: u64::from(COORDS_PER_CLASS),
                got: self.scheduled_coords(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditPolicy {
    pub class_skew_tolerance: u64,
    pub anchor_skew_tolerance: u64,
    /// Steps between required checkpoints; 0 defers to `ScheduleConfig::audit_interval`.
    pub audit_every: u64,
    pub per_step_kinds: BTreeSet<String>,
}

impl AuditPolicy {
    pub fn v1(
        class_skew_tolerance: u64,
        anchor_skew_tolerance: u64,
        audit_every: u64,
        per_step_kinds: BTreeSet<String>,
    ) -> Result<Self, ContractViolation> {
        let policy = Self {
            class_skew_tolerance,
            anchor_skew_tolerance,
            audit_every,
            per_step_kinds,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Checkpoint interval in force: the policy's own, else the schedule's. 0 disables.
    pub fn effective_interval(&self, schedule: &ScheduleConfig) -> u64 {
        if self.audit_every > 0 {
            self.audit_every
        } else {
            schedule.audit_interval
        }
    }

    /// `ace_step`, `petc` and `audit` are always valid ledger kinds; configured closing kinds
    /// extend the set.
    pub fn recognizes_kind(&self, kind: &str) -> bool {
        kind == KIND_ACE_STEP
            || kind == KIND_PETC
            || kind == KIND_CHECKPOINT
            || self.per_step_kinds.contains(kind)
    }
}

impl Default for AuditPolicy {
    fn default() -> Self {
        Self {
            class_skew_tolerance: 1,
            anchor_skew_tolerance: 1,
            audit_every: DEFAULT_AUDIT_INTERVAL,
            per_step_kinds: BTreeSet::from([KIND_PETC.to_string()]),
        }
    }
}

impl Validate for AuditPolicy {
    fn validate(&self) -> Result<(), ContractViolation> {
        for kind in &self.per_step_kinds {
            validate_token("audit_policy.per_step_kinds", kind, MAX_KIND_LEN)?;
            if kind == KIND_ACE_STEP || kind == KIND_CHECKPOINT {
                return Err(ContractViolation::InvalidValue {
                    field: "audit_policy.per_step_kinds",
                    reason: "must not name the step or checkpoint kind",
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub total_steps: u64,
    pub class_distribution: BTreeMap<u32, u64>,
    pub anchor_distribution: BTreeMap<u32, u64>,
    pub class_skew: u64,
    pub anchor_skew: u64,
    pub fair_classes_ok: bool,
    pub fair_anchors_ok: bool,
    /// Classes at the highest or lowest visit count when the class verdict fails.
    pub bad_classes: Vec<u32>,
    pub bad_anchors: Vec<u32>,
    pub missing_petc: Vec<StepRef>,
    pub missing_kinds: Vec<MissingKinds>,
    pub audit_entries: u64,
    pub audit_compliance_ok: bool,
    pub coords_visited: u64,
    pub scheduled_coords: u64,
    pub coverage_complete: bool,
}

impl AuditReport {
    /// True when every verdict passed and no step is missing a required kind.
    pub fn all_ok(&self) -> bool {
        self.fair_classes_ok
            && self.fair_anchors_ok
            && self.audit_compliance_ok
            && self.missing_petc.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_audit_contract_01_default_schedule_covers_one_class() {
        let cfg = ScheduleConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.scheduled_coords(), u64::from(COORDS_PER_CLASS));
    }

    #[test]
    fn at_audit_contract_02_schedule_rejects_zero_and_overflowing_windows() {
        assert!(ScheduleConfig::v1(0, 16, 768).is_err());
        assert!(ScheduleConfig::v1(768, 0, 768).is_err());
        assert!(ScheduleConfig::v1(768, 17, 768).is_err());
        assert!(ScheduleConfig::v1(512, 8, 0).is_ok());
    }

    #[test]
    fn at_audit_contract_03_policy_rejects_reserved_kinds() {
        assert!(AuditPolicy::v1(1, 1, 768, BTreeSet::from(["petc".to_string()])).is_ok());
        assert!(AuditPolicy::v1(1, 1, 768, BTreeSet::from(["ace_step".to_string()])).is_err());
        assert!(AuditPolicy::v1(1, 1, 768, BTreeSet::from(["audit".to_string()])).is_err());
        assert!(AuditPolicy::v1(1, 1, 768, BTreeSet::from([" ".to_string()])).is_err());
    }

    #[test]
    fn at_audit_contract_04_interval_falls_back_to_schedule() {
        let schedule = ScheduleConfig::v1(768, 16, 512).unwrap();
        let mut policy = AuditPolicy::default();
        assert_eq!(policy.effective_interval(&schedule), 768);
        policy.audit_every = 0;
        assert_eq!(policy.effective_interval(&schedule), 512);
    }

    #[test]
    fn at_audit_contract_05_recognized_kinds_follow_policy() {
        let policy = AuditPolicy::default();
        assert!(policy.recognizes_kind("ace_step"));
        assert!(policy.recognizes_kind("audit"));
        assert!(policy.recognizes_kind("petc"));
        assert!(!policy.recognizes_kind("heartbeat"));
    }

    #[test]
    fn at_audit_contract_06_petc_stays_valid_when_not_required() {
        let receipts = AuditPolicy::v1(1, 1, 768, BTreeSet::from(["receipt".to_string()])).unwrap();
        assert!(receipts.recognizes_kind("petc"));
        assert!(receipts.recognizes_kind("receipt"));
        let none = AuditPolicy::v1(1, 1, 768, BTreeSet::new()).unwrap();
        assert!(none.recognizes_kind("petc"));
        assert!(!none.recognizes_kind("receipt"));
    }
}
