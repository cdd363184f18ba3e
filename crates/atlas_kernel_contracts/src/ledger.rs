#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::validate_token;
use crate::lattice::{GuardedContext, LatticeError, StepContext, StepCoordinates};
use crate::{ContractViolation, Validate};

pub const KIND_ACE_STEP: &str = "ace_step";
pub const KIND_PETC: &str = "petc";
pub const KIND_CHECKPOINT: &str = "audit";
pub const STATUS_COMMITTED: &str = "committed";

pub const LINK_KEY_ACE: &str = "ace";

pub const MAX_KIND_LEN: usize = 64;
pub const MAX_ENTRY_ID_LEN: usize = 128;

/// Context object as it appears in a logged record.
///
/// Every field is optional on the wire; the audit engine decides which are required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerContext {
    #[serde(
        rename = "class",
        alias = "class_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub class_id: Option<u32>,
    #[serde(
        rename = "coord",
        alias = "coord_idx",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub coord_idx: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v_bits: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col: Option<u32>,
    /// `entry_id` of the ACE step a closing entry belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ace: Option<String>,
}

impl LedgerContext {
    /// Reassembles the guard input this context was logged from.
    pub fn step_context(&self, t: Option<u64>) -> Result<StepContext, LatticeError> {
        let class_id = self.class_id.ok_or(LatticeError::Incomplete {
            reason: "missing class in context",
        })?;
        let coordinates = StepCoordinates::from_parts(self.coord_idx, self.anchor, self.v_bits)?;
        let mut ctx = StepContext::new(class_id, coordinates);
        ctx.t = t;
        if let Some(ace) = &self.ace {
            ctx.metadata.insert(LINK_KEY_ACE.to_string(), ace.clone());
        }
        Ok(ctx)
    }

    pub fn has_coordinates(&self) -> bool {
        self.coord_idx.is_some() || (self.anchor.is_some() && self.v_bits.is_some())
    }
}

impl From<&GuardedContext> for LedgerContext {
    fn from(ctx: &GuardedContext) -> Self {
        let addr = ctx.address;
        Self {
            class_id: Some(u32::from(addr.class_id())),
            coord_idx: Some(u32::from(addr.coord_idx())),
            anchor: Some(u32::from(addr.anchor())),
            v_bits: Some(u32::from(addr.v_bits())),
            row: Some(u32::from(addr.row())),
            col: Some(u32::from(addr.col())),
            ace: ctx.metadata.get(LINK_KEY_ACE).cloned(),
        }
    }
}

/// One logged record, in the loose shape a ledger loader hands to the auditor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<LedgerContext>,
}

impl LedgerRecord {
    /// A committed ACE step carrying a guarded context.
    pub fn committed_step(
        entry_id: Option<String>,
        t: u64,
        ctx: &GuardedContext,
    ) -> Result<Self, ContractViolation> {
        let rec = Self {
            kind: Some(KIND_ACE_STEP.to_string()),
            status: Some(STATUS_COMMITTED.to_string()),
            entry_id,
            t: Some(t),
            context: Some(LedgerContext::from(ctx)),
        };
        rec.validate()?;
        Ok(rec)
    }

    /// A per-step closing entry (e.g. `petc`) linked to its step by `t` and, if known, by id.
    pub fn closing(
        kind: impl Into<String>,
        t: u64,
        ace_entry_id: Option<String>,
    ) -> Result<Self, ContractViolation> {
        let rec = Self {
            kind: Some(kind.into()),
            status: None,
            entry_id: None,
            t: Some(t),
            context: Some(LedgerContext {
                ace: ace_entry_id,
                ..LedgerContext::default()
            }),
        };
        rec.validate()?;
        Ok(rec)
    }

    pub fn checkpoint(t: u64) -> Self {
        Self {
            kind: Some(KIND_CHECKPOINT.to_string()),
            t: Some(t),
            ..Self::default()
        }
    }

    pub fn kind_is(&self, kind: &str) -> bool {
        self.kind.as_deref() == Some(kind)
    }

    pub fn is_committed_step(&self) -> bool {
        self.kind_is(KIND_ACE_STEP) && self.status.as_deref() == Some(STATUS_COMMITTED)
    }

    pub fn step_ref(&self) -> Option<StepRef> {
        match (&self.entry_id, self.t) {
            (Some(id), _) => Some(StepRef::EntryId(id.clone())),
            (None, Some(t)) => Some(StepRef::Step(t)),
            (None, None) => None,
        }
    }
}

impl Validate for LedgerRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        let kind = self.kind.as_deref().ok_or(ContractViolation::InvalidValue {
            field: "ledger_record.kind",
            reason: "must be present",
        })?;
        validate_token("ledger_record.kind", kind, MAX_KIND_LEN)?;
        if let Some(id) = &self.entry_id {
            validate_token("ledger_record.entry_id", id, MAX_ENTRY_ID_LEN)?;
        }
        if let Some(status) = &self.status {
            validate_token("ledger_record.status", status, MAX_KIND_LEN)?;
        }
        if kind != KIND_CHECKPOINT && self.context.is_none() {
            return Err(ContractViolation::InvalidValue {
                field: "ledger_record.context",
                reason: "must be present for non-checkpoint entries",
            });
        }
        if kind == KIND_CHECKPOINT && self.t.is_none() {
            return Err(ContractViolation::InvalidValue {
                field: "ledger_record.t",
                reason: "checkpoint entries must carry t",
            });
        }
        Ok(())
    }
}

/// Identifies a logged step in audit findings: its `entry_id` when it has one, else its `t`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepRef {
    EntryId(String),
    Step(u64),
}

impl fmt::Display for StepRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepRef::EntryId(id) => f.write_str(id),
            StepRef::Step(t) => write!(f, "t={t}"),
        }
    }
}

/// Required per-step kinds that were not found for one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingKinds {
    pub step: StepRef,
    pub kinds: Vec<String>,
}
