//! Processor model table: one entry per unique `SchedMachineModel` (or bare
//! `ProcessorItineraries`) referenced by a `Processor` record (spec.md §2
//! item 4). Grounded on `collectProcModels`/`addProcModel` and
//! `collectProcItins`/`collectProcItinRW`/`collectProcUnsupportedFeatures`.

use crate::error::{ElaborationError, Result};
use crate::record_db::{RecordDb, RecordId};

use super::SchedModels;

/// A processor's scheduling identity: its model record, optional
/// itineraries, and everything collected about it in later phases.
#[derive(Debug, Clone)]
pub struct ProcModel {
    pub index: usize,
    pub name: String,
    /// The `SchedMachineModel` def. Index 0 is the synthetic
    /// `NoSchedModel` entry shared by every processor that declares none.
    pub model_def: RecordId,
    pub itins_def: Option<RecordId>,
    /// Per-sched-class itinerary data record, indexed by `SchedClass.index`.
    /// Empty unless `has_itineraries` is true.
    pub itin_def_list: Vec<Option<RecordId>>,
    pub itin_rw_defs: Vec<RecordId>,
    pub write_res_defs: Vec<RecordId>,
    pub read_advance_defs: Vec<RecordId>,
    pub proc_resource_defs: Vec<RecordId>,
    pub unsupported_features_defs: Vec<RecordId>,
}

impl ProcModel {
    fn new(index: usize, name: String, model_def: RecordId, itins_def: Option<RecordId>) -> Self {
        ProcModel {
            index,
            name,
            model_def,
            itins_def,
            itin_def_list: Vec::new(),
            itin_rw_defs: Vec::new(),
            write_res_defs: Vec::new(),
            read_advance_defs: Vec::new(),
            proc_resource_defs: Vec::new(),
            unsupported_features_defs: Vec::new(),
        }
    }

    pub fn has_itineraries(&self, db: &impl RecordDb) -> bool {
        match self.itins_def {
            Some(def) => !db.field_list_defs(def, "IID").is_empty(),
            None => false,
        }
    }

    /// Whether `inst` is excluded on this processor via its
    /// `UnsupportedFeatures` list. Predicates are matched by *name*, not
    /// record identity — a faithfully-ported quirk of the original
    /// (`isUnsupported`), since the same named predicate can be `def`ed
    /// more than once across a target description.
    pub fn is_unsupported(&self, db: &impl RecordDb, inst: RecordId) -> bool {
        if self.unsupported_features_defs.is_empty() {
            return false;
        }
        let preds = db.field_list_defs(inst, "Predicates");
        self.unsupported_features_defs
            .iter()
            .any(|u| preds.iter().any(|p| db.name_of(*p) == db.name_of(*u)))
    }
}

impl SchedModels {
    /// Resolve the record that identifies a `Processor`'s model for
    /// dedup purposes: its `SchedModel` if set to anything but
    /// `NoSchedModel`, else its `ProcItin` if set to anything but
    /// `NoItineraries`, else `NoSchedModel` itself. Mirrors
    /// `getModelOrItinDef`.
    fn get_model_or_itin_def(&self, db: &impl RecordDb, proc_def: RecordId) -> Result<RecordId> {
        let model_def = db.field_def(proc_def, "SchedModel").ok_or_else(|| ElaborationError::UndefinedField {
            loc: db.loc_of(proc_def),
            field: "SchedModel".to_string(),
        })?;
        if db.name_of(model_def) != "NoSchedModel" {
            return Ok(model_def);
        }
        let itins_def = db.field_def(proc_def, "ProcItin").ok_or_else(|| ElaborationError::UndefinedField {
            loc: db.loc_of(proc_def),
            field: "ProcItin".to_string(),
        })?;
        if db.name_of(itins_def) != "NoItineraries" {
            return Ok(itins_def);
        }
        Ok(model_def)
    }

    fn add_proc_model(&mut self, db: &impl RecordDb, proc_def: RecordId) -> Result<()> {
        let model_key = self.get_model_or_itin_def(db, proc_def)?;
        if self.proc_model_map.contains_key(&model_key) {
            return Ok(());
        }
        let index = self.proc_models.len();
        self.proc_model_map.insert(model_key, index);

        if db.is_subclass_of(model_key, "SchedMachineModel") {
            let itins_def = db.field_def(model_key, "Itineraries");
            self.proc_models.push(ProcModel::new(index, db.name_of(model_key).to_string(), model_key, itins_def));
        } else {
            // model_key is itself a bare ProcessorItineraries record: the
            // processor has no SchedMachineModel of its own.
            let mut name = db.name_of(model_key).to_string();
            if !db.field_list_defs(model_key, "IID").is_empty() {
                name.push_str("Model");
            }
            let model_def = db.field_def(proc_def, "SchedModel").expect("checked in get_model_or_itin_def");
            self.proc_models.push(ProcModel::new(index, name, model_def, Some(model_key)));
        }
        Ok(())
    }

    /// Seed the table with the synthetic `NoSchedModel` entry at index 0,
    /// then add one entry per unique processor model (spec.md §2 item 4).
    pub(crate) fn collect_proc_models(&mut self, db: &impl RecordDb) -> Result<()> {
        let no_model_def = db.get_def("NoSchedModel").ok_or_else(|| ElaborationError::Internal {
            loc: crate::record_db::SourceLoc::default(),
            message: "target description is missing the NoSchedModel record".to_string(),
        })?;
        let no_itins_def = db.get_def("NoItineraries").ok_or_else(|| ElaborationError::Internal {
            loc: crate::record_db::SourceLoc::default(),
            message: "target description is missing the NoItineraries record".to_string(),
        })?;
        self.proc_models.push(ProcModel::new(0, "NoSchedModel".to_string(), no_model_def, Some(no_itins_def)));
        self.proc_model_map.insert(no_model_def, 0);

        let mut proc_defs = db.all_derived_definitions("Processor");
        proc_defs.sort_by(|a, b| db.name_of(*a).cmp(db.name_of(*b)));
        for proc_def in proc_defs {
            self.add_proc_model(db, proc_def)?;
        }
        Ok(())
    }

    /// For every processor with itineraries, map each of its `IID` entries
    /// to the sched class whose `Itinerary` field matches the `IID`'s
    /// `TheClass`. Mirrors `collectProcItins`.
    pub(crate) fn collect_proc_itins(&mut self, db: &impl RecordDb) -> Result<()> {
        for p_idx in 0..self.proc_models.len() {
            if !self.proc_models[p_idx].has_itineraries(db) {
                continue;
            }
            let itins_def = self.proc_models[p_idx].itins_def.expect("has_itineraries implies itins_def");
            self.proc_models[p_idx].itin_def_list = vec![None; self.num_instr_sched_classes];
            for itin_data in db.field_list_defs(itins_def, "IID") {
                let itin_class_def = db.field_def(itin_data, "TheClass").ok_or_else(|| ElaborationError::UndefinedField {
                    loc: db.loc_of(itin_data),
                    field: "TheClass".to_string(),
                })?;
                for sc in &self.sched_classes {
                    if sc.itin_class_def == Some(itin_class_def) {
                        self.proc_models[p_idx].itin_def_list[sc.index] = Some(itin_data);
                    }
                }
            }
        }
        Ok(())
    }

    /// Attach every `ItinRW` record to the processor named by its
    /// `SchedModel`. Mirrors `collectProcItinRW`.
    pub(crate) fn collect_proc_itin_rw(&mut self, db: &impl RecordDb) -> Result<()> {
        let mut itin_rw_defs = db.all_derived_definitions("ItinRW");
        itin_rw_defs.sort_by(|a, b| db.name_of(*a).cmp(db.name_of(*b)));
        for rw_def in itin_rw_defs {
            let model_def = db.field_def(rw_def, "SchedModel").ok_or_else(|| ElaborationError::UndefinedField {
                loc: db.loc_of(rw_def),
                field: "SchedModel".to_string(),
            })?;
            let p_idx = self.get_proc_model_idx(db, model_def)?;
            self.proc_models[p_idx].itin_rw_defs.push(rw_def);
        }
        Ok(())
    }

    /// Copy each processor model's `UnsupportedFeatures` predicates onto
    /// its `ProcModel` entry. Mirrors `collectProcUnsupportedFeatures`.
    pub(crate) fn collect_proc_unsupported_features(&mut self, db: &impl RecordDb) {
        for p_idx in 0..self.proc_models.len() {
            let model_def = self.proc_models[p_idx].model_def;
            self.proc_models[p_idx].unsupported_features_defs = db.field_list_defs(model_def, "UnsupportedFeatures");
        }
    }
}
