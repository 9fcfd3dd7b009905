//! The elaborated scheduling model: processor models, the ReadWrite table,
//! SchedClasses, the variant transition engine, resource collection, and the
//! completeness check (spec.md §2, items 3-11).
//!
//! [`SchedModels`] owns every table and drives the phases in dependency
//! order via [`SchedModels::elaborate`]. Mirrors `CodeGenSchedModels`: one
//! struct, append-only vectors, everything else addressed by index rather
//! than by reference (spec.md §9: "never hold a pointer/borrow into a table
//! across an operation that might grow it").

pub mod completeness;
pub mod proc_model;
pub mod resources;
pub mod rw_table;
pub mod sched_class;
pub mod variant;

use std::collections::HashMap;

use crate::error::{ElaborationError, Result};
use crate::record_db::{RecordDb, RecordId};
use crate::target::TargetInstructions;

pub use proc_model::ProcModel;
pub use rw_table::SchedRw;
pub use sched_class::{CodeGenSchedTransition, SchedClass};
pub use variant::PredCheck;

/// Owns every table the elaborator builds and grows. One instance per
/// elaboration run; never shared, never reused across runs (spec.md §5:
/// "every piece of mutable state ... is owned exclusively by the elaborator
/// instance").
#[derive(Debug)]
pub struct SchedModels {
    pub(crate) proc_models: Vec<ProcModel>,
    pub(crate) proc_model_map: HashMap<RecordId, usize>,

    pub(crate) sched_writes: Vec<SchedRw>,
    pub(crate) sched_reads: Vec<SchedRw>,
    pub(crate) write_def_index: HashMap<RecordId, usize>,
    pub(crate) read_def_index: HashMap<RecordId, usize>,

    pub(crate) sched_classes: Vec<SchedClass>,
    pub(crate) instr_class_map: HashMap<RecordId, usize>,
    pub(crate) num_instr_sched_classes: usize,

    /// `ProcResourceUnits`/`ProcResGroup` defs seen during resource
    /// collection; cleared after `collect_proc_resources` finishes (mirrors
    /// the original clearing `ProcResourceDefs`/`ProcResGroups` at the end of
    /// `collectProcResources` since they're a scratch scan, not output).
    pub(crate) all_proc_resource_units: Vec<RecordId>,
    pub(crate) all_proc_res_groups: Vec<RecordId>,

    pub(crate) growth_factor: usize,
    pub(crate) verify_resource_groups: bool,
    pub(crate) enforce_completeness: bool,
}

impl Default for SchedModels {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedModels {
    pub fn new() -> Self {
        SchedModels {
            proc_models: Vec::new(),
            proc_model_map: HashMap::new(),
            sched_writes: Vec::new(),
            sched_reads: Vec::new(),
            write_def_index: HashMap::new(),
            read_def_index: HashMap::new(),
            sched_classes: Vec::new(),
            instr_class_map: HashMap::new(),
            num_instr_sched_classes: 0,
            all_proc_resource_units: Vec::new(),
            all_proc_res_groups: Vec::new(),
            growth_factor: 6,
            verify_resource_groups: true,
            enforce_completeness: true,
        }
    }

    pub fn with_growth_factor(growth_factor: usize) -> Self {
        SchedModels {
            growth_factor,
            ..Self::new()
        }
    }

    /// Build an elaborator from a loaded [`crate::config::ElaborationConfig`]
    /// (growth factor, resource-group verification, completeness
    /// enforcement).
    pub fn with_config(config: &crate::config::ElaborationConfig) -> Self {
        SchedModels {
            growth_factor: config.growth_factor,
            verify_resource_groups: config.verify_resource_groups,
            enforce_completeness: config.enforce_completeness,
            ..Self::new()
        }
    }

    pub fn proc_models(&self) -> &[ProcModel] {
        &self.proc_models
    }

    pub fn sched_writes(&self) -> &[SchedRw] {
        &self.sched_writes
    }

    pub fn sched_reads(&self) -> &[SchedRw] {
        &self.sched_reads
    }

    pub fn sched_classes(&self) -> &[SchedClass] {
        &self.sched_classes
    }

    pub fn instr_class_map(&self) -> &HashMap<RecordId, usize> {
        &self.instr_class_map
    }

    pub(crate) fn get_sched_rw(&self, idx: usize, is_read: bool) -> &SchedRw {
        if is_read {
            &self.sched_reads[idx]
        } else {
            &self.sched_writes[idx]
        }
    }

    pub(crate) fn get_sched_rw_mut(&mut self, idx: usize, is_read: bool) -> &mut SchedRw {
        if is_read {
            &mut self.sched_reads[idx]
        } else {
            &mut self.sched_writes[idx]
        }
    }

    pub(crate) fn get_sched_rw_idx_by_def(&self, def: RecordId, is_read: bool) -> usize {
        let table = if is_read { &self.read_def_index } else { &self.write_def_index };
        table.get(&def).copied().unwrap_or(0)
    }

    pub(crate) fn get_proc_model_idx(&self, db: &impl RecordDb, model_def: RecordId) -> Result<usize> {
        self.proc_model_map.get(&model_def).copied().ok_or_else(|| ElaborationError::UndefinedSchedModel {
            loc: db.loc_of(model_def),
            name: db.name_of(model_def).to_string(),
        })
    }

    /// Run every phase in the dependency order spec.md §2 lists. Returns
    /// `Ok(())` once the model is fully elaborated and (if any processor
    /// declares `CompleteModel`) verified complete.
    pub fn elaborate(&mut self, db: &impl RecordDb, target: &TargetInstructions) -> Result<()> {
        tracing::debug!("collecting processor models");
        self.collect_proc_models(db)?;

        tracing::debug!("collecting read/write table");
        self.collect_sched_rw(db, target)?;

        tracing::debug!("collecting sched classes");
        self.collect_sched_classes(db, target)?;

        tracing::debug!("collecting processor itineraries");
        self.collect_proc_itins(db)?;
        self.collect_proc_itin_rw(db)?;
        self.collect_proc_unsupported_features(db);

        tracing::debug!(
            num_instr_sched_classes = self.num_instr_sched_classes,
            "inferring sched classes from variants"
        );
        self.infer_sched_classes(db, target)?;

        tracing::debug!("collecting processor resources");
        self.collect_proc_resources(db)?;

        tracing::debug!("checking completeness");
        self.check_completeness(db, target)?;

        Ok(())
    }
}
