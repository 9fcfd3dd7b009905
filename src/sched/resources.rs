//! Processor resource collection and verification: `collectProcResources`,
//! `addProcResource`, `addWriteRes`, `addReadAdvance`, and
//! `verifyProcResourceGroups` (spec.md §4.5).

use crate::error::{ElaborationError, Result};
use crate::record_db::{RecordDb, RecordId};

use super::SchedModels;

impl SchedModels {
    fn add_proc_resource(&mut self, db: &impl RecordDb, proc_res_kind: RecordId, pm_idx: usize) -> Result<()> {
        let mut kind = proc_res_kind;
        loop {
            let resolved = self.find_proc_res_units(db, kind, pm_idx)?;
            if self.proc_models[pm_idx].proc_resource_defs.contains(&resolved) {
                return Ok(());
            }
            self.proc_models[pm_idx].proc_resource_defs.push(resolved);

            if db.is_subclass_of(resolved, "ProcResGroup") {
                return Ok(());
            }
            match db.field_def(resolved, "Super") {
                Some(super_def) => kind = super_def,
                None => return Ok(()),
            }
        }
    }

    fn add_write_res(&mut self, db: &impl RecordDb, proc_write_res_def: RecordId, pm_idx: usize) -> Result<()> {
        if self.proc_models[pm_idx].write_res_defs.contains(&proc_write_res_def) {
            return Ok(());
        }
        self.proc_models[pm_idx].write_res_defs.push(proc_write_res_def);
        for res_def in db.field_list_defs(proc_write_res_def, "ProcResources") {
            self.add_proc_resource(db, res_def, pm_idx)?;
        }
        Ok(())
    }

    fn add_read_advance(&mut self, proc_read_advance_def: RecordId, pm_idx: usize) {
        if !self.proc_models[pm_idx].read_advance_defs.contains(&proc_read_advance_def) {
            self.proc_models[pm_idx].read_advance_defs.push(proc_read_advance_def);
        }
    }

    /// Resolve a resource "kind" reference to the concrete
    /// `ProcResourceUnits`/`ProcResGroup` record it names on this
    /// processor. A `ProcResGroup` is its own kind (no separate `Kind`
    /// field lookup); a `ProcResourceUnits` is resolved by its `Kind` field
    /// matching `pm`'s model. Mirrors `findProcResUnits`.
    fn find_proc_res_units(&self, db: &impl RecordDb, proc_res_kind: RecordId, pm_idx: usize) -> Result<RecordId> {
        if db.is_subclass_of(proc_res_kind, "ProcResourceUnits") {
            return Ok(proc_res_kind);
        }
        let model_def = self.proc_models[pm_idx].model_def;

        let mut found: Option<RecordId> = None;
        for &unit in &self.all_proc_resource_units {
            if db.field_def(unit, "Kind") == Some(proc_res_kind) && db.field_def(unit, "SchedModel") == Some(model_def) {
                if found.is_some() {
                    return Err(ElaborationError::MultipleResourceUnitsForKind {
                        loc: db.loc_of(unit),
                        kind: db.name_of(proc_res_kind).to_string(),
                        processor: self.proc_models[pm_idx].name.clone(),
                    });
                }
                found = Some(unit);
            }
        }
        for &group in &self.all_proc_res_groups {
            if group == proc_res_kind && db.field_def(group, "SchedModel") == Some(model_def) {
                if found.is_some() {
                    return Err(ElaborationError::MultipleResourceUnitsForKind {
                        loc: db.loc_of(group),
                        kind: db.name_of(proc_res_kind).to_string(),
                        processor: self.proc_models[pm_idx].name.clone(),
                    });
                }
                found = Some(group);
            }
        }
        found.ok_or_else(|| ElaborationError::NoResourceUnitsForKind {
            loc: db.loc_of(proc_res_kind),
            kind: db.name_of(proc_res_kind).to_string(),
        })
    }

    /// Collect resources touched by one RW and its aliases on the given
    /// processor set. Mirrors `collectRWResources(unsigned, bool,
    /// ArrayRef<unsigned>)`.
    fn collect_rw_resources(&mut self, db: &impl RecordDb, rw_idx: usize, is_read: bool, proc_indices: &[usize]) -> Result<()> {
        let rw = self.get_sched_rw(rw_idx, is_read).clone();
        if let Some(the_def) = rw.the_def {
            let is_res_def = if is_read {
                db.is_subclass_of(the_def, "SchedReadAdvance")
            } else {
                db.is_subclass_of(the_def, "SchedWriteRes")
            };
            if is_res_def {
                for &p_idx in proc_indices {
                    if is_read {
                        self.add_read_advance(the_def, p_idx);
                    } else {
                        self.add_write_res(db, the_def, p_idx)?;
                    }
                }
            }
        }
        for alias_def in rw.aliases.clone() {
            let alias_proc_indices: Vec<usize> = if db.field_is_complete(alias_def, "SchedModel") {
                let model_def = db.field_def(alias_def, "SchedModel").expect("checked complete");
                vec![self.get_proc_model_idx(db, model_def)?]
            } else {
                proc_indices.to_vec()
            };
            let alias_rw_def = db.field_def(alias_def, "AliasRW").expect("SchedAlias has AliasRW");
            let alias_idx = self.get_sched_rw_idx_by_def(alias_rw_def, is_read);
            for child in self.expand_rw_sequence_db(db, alias_idx, is_read) {
                self.collect_rw_resources(db, child, is_read, &alias_proc_indices)?;
            }
        }
        Ok(())
    }

    fn collect_rw_resources_for(&mut self, db: &impl RecordDb, writes: &[usize], reads: &[usize], proc_indices: &[usize]) -> Result<()> {
        for &w in writes {
            self.collect_rw_resources(db, w, false, proc_indices)?;
        }
        for &r in reads {
            self.collect_rw_resources(db, r, true, proc_indices)?;
        }
        Ok(())
    }

    fn collect_itin_proc_resources(&mut self, db: &impl RecordDb, itin_class_def: RecordId) -> Result<()> {
        for p_idx in 0..self.proc_models.len() {
            let itin_rw_defs = self.proc_models[p_idx].itin_rw_defs.clone();
            for rw_def in itin_rw_defs {
                let matched = db.field_list_defs(rw_def, "MatchedItinClasses");
                if !matched.contains(&itin_class_def) {
                    continue;
                }
                let rw_defs = db.field_list_defs(rw_def, "OperandReadWrites");
                let (writes, reads) = self.find_rws(db, &rw_defs);
                self.collect_rw_resources_for(db, &writes, &reads, &[p_idx])?;
            }
        }
        Ok(())
    }

    /// Whether any `ProcResGroup` in `pm.proc_resource_defs` lists every
    /// record in `sub_units` among its own `Resources`. Mirrors
    /// `hasSuperGroup`.
    fn has_super_group(&self, db: &impl RecordDb, sub_units: &[RecordId], pm_idx: usize) -> bool {
        for &group in &self.proc_models[pm_idx].proc_resource_defs {
            if !db.is_subclass_of(group, "ProcResGroup") {
                continue;
            }
            let resources = db.field_list_defs(group, "Resources");
            if sub_units.iter().all(|u| resources.contains(u)) {
                return true;
            }
        }
        false
    }

    /// Every pair of overlapping `ProcResGroup`s on this processor must have
    /// a supergroup that covers their union. Mirrors
    /// `verifyProcResourceGroups`: the check is a pairwise set intersection,
    /// not a transitive closure, so a chain of three overlapping groups with
    /// no single supergroup spanning all three is not itself flagged.
    fn verify_proc_resource_groups(&self, db: &impl RecordDb, pm_idx: usize) -> Result<()> {
        let groups: Vec<RecordId> = self.proc_models[pm_idx]
            .proc_resource_defs
            .iter()
            .copied()
            .filter(|&r| db.is_subclass_of(r, "ProcResGroup"))
            .collect();
        for (i, &group_a) in groups.iter().enumerate() {
            let res_a = db.field_list_defs(group_a, "Resources");
            for &group_b in &groups[i + 1..] {
                let res_b = db.field_list_defs(group_b, "Resources");
                let overlap: Vec<RecordId> = res_a.iter().copied().filter(|r| res_b.contains(r)).collect();
                if overlap.is_empty() {
                    continue;
                }
                let mut union = res_a.clone();
                for &r in &res_b {
                    if !union.contains(&r) {
                        union.push(r);
                    }
                }
                if !self.has_super_group(db, &union, pm_idx) {
                    return Err(ElaborationError::ResourceGroupOverlapNoSupergroup {
                        loc: db.loc_of(group_a),
                        other: db.name_of(group_b).to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Populate every `ProcModel`'s resource tables: per-class resources
    /// (from itineraries or `InstRW`), explicit `WriteRes`/`ReadAdvance`
    /// definitions, and resources/groups declared directly on a model.
    /// Mirrors `collectProcResources` (spec.md §4.5).
    pub(crate) fn collect_proc_resources(&mut self, db: &impl RecordDb) -> Result<()> {
        self.all_proc_resource_units = db.all_derived_definitions("ProcResourceUnits");
        self.all_proc_res_groups = db.all_derived_definitions("ProcResGroup");

        for sc_idx in 0..self.sched_classes.len() {
            let itin_class_def = self.sched_classes[sc_idx].itin_class_def;
            if let Some(itin_class_def) = itin_class_def {
                self.collect_itin_proc_resources(db, itin_class_def)?;
            } else if !self.sched_classes[sc_idx].inst_rws.is_empty() {
                let inst_rws = self.sched_classes[sc_idx].inst_rws.clone();
                for rw_def in inst_rws {
                    let model_def = db.field_def(rw_def, "SchedModel").ok_or_else(|| ElaborationError::UndefinedField {
                        loc: db.loc_of(rw_def),
                        field: "SchedModel".to_string(),
                    })?;
                    let p_idx = self.get_proc_model_idx(db, model_def)?;
                    let rw_defs = db.field_list_defs(rw_def, "OperandReadWrites");
                    let (writes, reads) = self.find_rws(db, &rw_defs);
                    self.collect_rw_resources_for(db, &writes, &reads, &[p_idx])?;
                }
            }
            let writes = self.sched_classes[sc_idx].writes.clone();
            let reads = self.sched_classes[sc_idx].reads.clone();
            let proc_indices = self.sched_classes[sc_idx].proc_indices.clone();
            self.collect_rw_resources_for(db, &writes, &reads, &proc_indices)?;
        }

        for &write_res_def in &db.all_derived_definitions("WriteRes") {
            let model_def = db.field_def(write_res_def, "SchedModel").ok_or_else(|| ElaborationError::UndefinedField {
                loc: db.loc_of(write_res_def),
                field: "SchedModel".to_string(),
            })?;
            let p_idx = self.get_proc_model_idx(db, model_def)?;
            self.add_write_res(db, write_res_def, p_idx)?;
        }
        for &write_res_def in &db.all_derived_definitions("SchedWriteRes") {
            let model_def = db.field_def(write_res_def, "SchedModel").ok_or_else(|| ElaborationError::UndefinedField {
                loc: db.loc_of(write_res_def),
                field: "SchedModel".to_string(),
            })?;
            let p_idx = self.get_proc_model_idx(db, model_def)?;
            self.add_write_res(db, write_res_def, p_idx)?;
        }
        for &read_advance_def in &db.all_derived_definitions("ReadAdvance") {
            let model_def = db.field_def(read_advance_def, "SchedModel").ok_or_else(|| ElaborationError::UndefinedField {
                loc: db.loc_of(read_advance_def),
                field: "SchedModel".to_string(),
            })?;
            let p_idx = self.get_proc_model_idx(db, model_def)?;
            self.add_read_advance(read_advance_def, p_idx);
        }
        // SchedReadAdvance's SchedModel is allowed to be unset, unlike
        // ReadAdvance's: silently skipped rather than a fatal lookup.
        for &read_advance_def in &db.all_derived_definitions("SchedReadAdvance") {
            if !db.field_is_complete(read_advance_def, "SchedModel") {
                continue;
            }
            let model_def = db.field_def(read_advance_def, "SchedModel").expect("checked complete");
            let p_idx = self.get_proc_model_idx(db, model_def)?;
            self.add_read_advance(read_advance_def, p_idx);
        }

        for p_idx in 0..self.proc_models.len() {
            let model_def = self.proc_models[p_idx].model_def;
            for group in db.all_derived_definitions("ProcResGroup") {
                if db.field_def(group, "SchedModel") == Some(model_def) && !self.proc_models[p_idx].proc_resource_defs.contains(&group) {
                    self.proc_models[p_idx].proc_resource_defs.push(group);
                }
            }
            for unit in db.all_derived_definitions("ProcResourceUnits") {
                if db.field_def(unit, "SchedModel") == Some(model_def) && !self.proc_models[p_idx].proc_resource_defs.contains(&unit) {
                    self.proc_models[p_idx].proc_resource_defs.push(unit);
                }
            }
        }

        for p_idx in 0..self.proc_models.len() {
            self.proc_models[p_idx].write_res_defs.sort_by(|a, b| db.name_of(*a).cmp(db.name_of(*b)));
            self.proc_models[p_idx].read_advance_defs.sort_by(|a, b| db.name_of(*a).cmp(db.name_of(*b)));
            self.proc_models[p_idx].proc_resource_defs.sort_by(|a, b| db.name_of(*a).cmp(db.name_of(*b)));
            if self.verify_resource_groups {
                self.verify_proc_resource_groups(db, p_idx)?;
            }
        }

        self.all_proc_resource_units.clear();
        self.all_proc_res_groups.clear();
        Ok(())
    }

    /// 1-based position of `pr_def` within `pm`'s resource table (0 is
    /// reserved as an invalid index). Mirrors
    /// `CodeGenProcModel::getProcResourceIdx`.
    pub fn get_proc_resource_idx(&self, pr_def: RecordId, pm_idx: usize) -> Result<usize> {
        self.proc_models[pm_idx]
            .proc_resource_defs
            .iter()
            .position(|&d| d == pr_def)
            .map(|i| i + 1)
            .ok_or(ElaborationError::Internal {
                loc: crate::record_db::SourceLoc::default(),
                message: "ProcResource not found in processor's resource table".to_string(),
            })
    }
}
