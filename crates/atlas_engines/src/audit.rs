#![forbid(unsafe_code)]

//! Audit engine: replays a materialized ledger against schedule and policy configuration.
//!
//! Any malformed entry aborts the whole audit; a partial report could misstate fairness.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use atlas_kernel_contracts::audit::{AuditPolicy, AuditReport, ScheduleConfig};
use atlas_kernel_contracts::lattice::{LatticeError, LatticeField, ANCHORS, CLASSES};
use atlas_kernel_contracts::ledger::{
    LedgerContext, LedgerRecord, MissingKinds, StepRef, KIND_CHECKPOINT,
};
use atlas_kernel_contracts::Validate;
use tracing::{debug, info, warn};

use crate::guard::guard_address;

#[derive(Debug, Clone)]
pub struct AuditRuntime {
    schedule: ScheduleConfig,
    policy: AuditPolicy,
}

/// Class, anchor and (when logged) coordinate of one committed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StepCell {
    class_id: u32,
    anchor: u32,
    coord_idx: Option<u32>,
}

struct CommittedStep<'a> {
    step: StepRef,
    t: Option<u64>,
    entry_id: Option<&'a str>,
}

/// Closing entries indexed both ways a step can be linked: by `t` and by the step's id.
#[derive(Default)]
struct LinkIndex<'a> {
    by_t: HashMap<&'a str, HashSet<u64>>,
    by_ace: HashMap<&'a str, HashSet<&'a str>>,
}

impl<'a> LinkIndex<'a> {
    fn insert(&mut self, kind: &'a str, rec: &'a LedgerRecord) {
        if let Some(t) = rec.t {
            self.by_t.entry(kind).or_default().insert(t);
        }
        if let Some(ace) = rec.context.as_ref().and_then(|c| c.ace.as_deref()) {
            self.by_ace.entry(kind).or_default().insert(ace);
        }
    }

    fn has(&self, kind: &str, step: &CommittedStep<'_>) -> bool {
        let by_t = step
            .t
            .is_some_and(|t| self.by_t.get(kind).is_some_and(|set| set.contains(&t)));
        let by_ace = step
            .entry_id
            .is_some_and(|id| self.by_ace.get(kind).is_some_and(|set| set.contains(id)));
        by_t || by_ace
    }
}

fn invalid(index: usize, reason: impl Into<String>) -> LatticeError {
    LatticeError::LedgerValidation {
        index,
        reason: reason.into(),
    }
}

impl AuditRuntime {
    pub fn new(schedule: ScheduleConfig, policy: AuditPolicy) -> Result<Self, LatticeError> {
        schedule.validate()?;
        policy.validate()?;
        if policy.audit_every > 0
            && schedule.audit_interval > 0
            && policy.audit_every != schedule.audit_interval
        {
            warn!(
                audit_every = policy.audit_every,
                audit_interval = schedule.audit_interval,
                "audit policy interval overrides schedule interval"
            );
        }
        Ok(Self { schedule, policy })
    }

    pub fn run(&self, ledger: &[LedgerRecord]) -> Result<AuditReport, LatticeError> {
        let mut class_distribution: BTreeMap<u32, u64> = BTreeMap::new();
        let mut anchor_distribution: BTreeMap<u32, u64> = BTreeMap::new();
        let mut coords_seen: HashSet<u32> = HashSet::new();
        let mut committed: Vec<CommittedStep<'_>> = Vec::new();
        let mut links = LinkIndex::default();
        let mut checkpoints: Vec<u64> = Vec::new();

        for (index, rec) in ledger.iter().enumerate() {
            rec.validate().map_err(|e| invalid(index, e.to_string()))?;
            let kind = rec.kind.as_deref().unwrap_or_default();
            if !self.policy.recognizes_kind(kind) {
                return Err(invalid(index, format!("unrecognized kind '{kind}'")));
            }

            if kind == KIND_CHECKPOINT {
                if let Some(t) = rec.t {
                    checkpoints.push(t);
                }
            } else if rec.is_committed_step() {
                let context = rec
                    .context
                    .as_ref()
                    .ok_or_else(|| invalid(index, "committed step without context"))?;
                let cell = step_cell(index, context, rec.t)?;
                let step = rec
                    .step_ref()
                    .ok_or_else(|| invalid(index, "committed step needs entry_id or t"))?;

                *class_distribution.entry(cell.class_id).or_insert(0) += 1;
                *anchor_distribution.entry(cell.anchor).or_insert(0) += 1;
                if let Some(coord) = cell.coord_idx {
                    coords_seen.insert(coord);
                }
                committed.push(CommittedStep {
                    step,
                    t: rec.t,
                    entry_id: rec.entry_id.as_deref(),
                });
            } else if self.policy.per_step_kinds.contains(kind) {
                links.insert(kind, rec);
            }
        }
        debug!(
            entries = ledger.len(),
            committed = committed.len(),
            checkpoints = checkpoints.len(),
            "ledger validated"
        );

        let total_steps = committed.len() as u64;
        let class_skew = skew(&class_distribution);
        let anchor_skew = skew(&anchor_distribution);
        let fair_classes_ok = class_skew <= self.policy.class_skew_tolerance;
        let fair_anchors_ok = anchor_skew <= self.policy.anchor_skew_tolerance;
        let bad_classes = if fair_classes_ok {
            Vec::new()
        } else {
            extremes(&class_distribution)
        };
        let bad_anchors = if fair_anchors_ok {
            Vec::new()
        } else {
            extremes(&anchor_distribution)
        };

        let mut missing_petc = Vec::new();
        let mut missing_kinds = Vec::new();
        for step in &committed {
            let kinds: Vec<String> = self
                .policy
                .per_step_kinds
                .iter()
                .filter(|kind| !links.has(kind, step))
                .cloned()
                .collect();
            if !kinds.is_empty() {
                missing_petc.push(step.step.clone());
                missing_kinds.push(MissingKinds {
                    step: step.step.clone(),
                    kinds,
                });
            }
        }

        let interval = self.policy.effective_interval(&self.schedule);
        let audit_compliance_ok = checkpoints_cover(&checkpoints, total_steps, interval);

        let scheduled_coords = self.schedule.scheduled_coords();
        let coords_visited = coords_seen.len() as u64;
        let report = AuditReport {
            total_steps,
            class_distribution,
            anchor_distribution,
            class_skew,
            anchor_skew,
            fair_classes_ok,
            fair_anchors_ok,
            bad_classes,
            bad_anchors,
            missing_petc,
            missing_kinds,
            audit_entries: checkpoints.len() as u64,
            audit_compliance_ok,
            coords_visited,
            scheduled_coords,
            coverage_complete: coords_visited >= scheduled_coords,
        };

        if !report.all_ok() {
            warn!(
                fair_classes_ok,
                fair_anchors_ok,
                audit_compliance_ok,
                missing = report.missing_petc.len(),
                "audit found violations"
            );
        }
        info!(
            total_steps,
            class_skew,
            anchor_skew,
            coords_visited,
            "audit complete"
        );
        Ok(report)
    }
}

/// `audit(ledger, schedule, policy)` as a single call.
pub fn audit(
    ledger: &[LedgerRecord],
    schedule: &ScheduleConfig,
    policy: &AuditPolicy,
) -> Result<AuditReport, LatticeError> {
    AuditRuntime::new(*schedule, policy.clone())?.run(ledger)
}

/// Re-normalizes a logged step context. Contexts with a coordinate go back through the guard;
/// bare `class` + `anchor` contexts are range-checked only.
fn step_cell(
    index: usize,
    ctx: &LedgerContext,
    t: Option<u64>,
) -> Result<StepCell, LatticeError> {
    if ctx.has_coordinates() {
        let step = ctx
            .step_context(t)
            .map_err(|e| invalid(index, e.to_string()))?;
        let addr = guard_address(step.class_id, step.coordinates)
            .map_err(|e| invalid(index, e.to_string()))?;
        if let (Some(row), Some(col)) = (ctx.row, ctx.col) {
            let pos = addr.grid();
            if row != u32::from(pos.row) || col != u32::from(pos.col) {
                return Err(invalid(index, "logged row/col disagree with coord fold"));
            }
        }
        return Ok(StepCell {
            class_id: u32::from(addr.class_id()),
            anchor: u32::from(addr.anchor()),
            coord_idx: Some(u32::from(addr.coord_idx())),
        });
    }

    let class_id = ctx
        .class_id
        .ok_or_else(|| invalid(index, "missing class in context"))?;
    let anchor = ctx
        .anchor
        .ok_or_else(|| invalid(index, "context lacks both coord and anchor"))?;
    if class_id >= CLASSES {
        return Err(invalid(
            index,
            LatticeError::Range {
                field: LatticeField::ClassId,
                got: class_id,
                bound: CLASSES,
            }
            .to_string(),
        ));
    }
    if anchor >= ANCHORS {
        return Err(invalid(
            index,
            LatticeError::Range {
                field: LatticeField::Anchor,
                got: anchor,
                bound: ANCHORS,
            }
            .to_string(),
        ));
    }
    Ok(StepCell {
        class_id,
        anchor,
        coord_idx: None,
    })
}

fn skew(distribution: &BTreeMap<u32, u64>) -> u64 {
    let max = distribution.values().copied().max().unwrap_or(0);
    let min = distribution.values().copied().min().unwrap_or(0);
    max - min
}

/// Keys sitting at the highest or lowest count.
fn extremes(distribution: &BTreeMap<u32, u64>) -> Vec<u32> {
    let max = distribution.values().copied().max().unwrap_or(0);
    let min = distribution.values().copied().min().unwrap_or(0);
    distribution
        .iter()
        .filter(|(_, &count)| count == max || count == min)
        .map(|(&key, _)| key)
        .collect()
}

/// No stretch of more than `interval` steps, from 0 to `total_steps`, without a checkpoint.
fn checkpoints_cover(checkpoints: &[u64], total_steps: u64, interval: u64) -> bool {
    if interval == 0 {
        return true;
    }
    let positions: BTreeSet<u64> = checkpoints
        .iter()
        .copied()
        .filter(|&t| t <= total_steps)
        .collect();
    let mut last = 0u64;
    for t in positions {
        if t - last > interval {
            return false;
        }
        last = t;
    }
    total_steps - last <= interval
}
