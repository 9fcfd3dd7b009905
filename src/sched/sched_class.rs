//! The SchedClass table: `collectSchedClasses`/`addSchedClass`/
//! `createInstRWClass` (spec.md §4.2).

use std::collections::HashMap;

use crate::error::{ElaborationError, Result};
use crate::record_db::{RecordDb, RecordId};
use crate::set_expander::SetExpander;
use crate::target::TargetInstructions;

use super::SchedModels;

/// One elaborated scheduling identity, keyed by `(itin_class_def, writes,
/// reads)`. Index 0 is the synthetic `NoInstrModel` class.
#[derive(Debug, Clone)]
pub struct SchedClass {
    pub index: usize,
    pub name: String,
    pub itin_class_def: Option<RecordId>,
    pub writes: Vec<usize>,
    pub reads: Vec<usize>,
    /// Sorted set of processor indices this class applies to. `[0, ...]`
    /// means "all processors" (spec.md §3 invariant).
    pub proc_indices: Vec<usize>,
    /// `InstRW` records that override this class's reads/writes on a
    /// specific processor.
    pub inst_rws: Vec<RecordId>,
    pub transitions: Vec<CodeGenSchedTransition>,
}

/// An edge produced by the variant expansion engine: a predicate-guarded
/// jump from one SchedClass to another, scoped to a set of processors.
#[derive(Debug, Clone)]
pub struct CodeGenSchedTransition {
    pub to_class_idx: usize,
    pub proc_indices: Vec<usize>,
    /// Deduplicated, in encounter order (mirrors `std::unique` after a
    /// stable transform, not a sorted set).
    pub pred_term: Vec<RecordId>,
}

impl SchedClass {
    fn new(index: usize, name: String, itin_class_def: Option<RecordId>) -> Self {
        SchedClass {
            index,
            name,
            itin_class_def,
            writes: Vec::new(),
            reads: Vec::new(),
            proc_indices: Vec::new(),
            inst_rws: Vec::new(),
            transitions: Vec::new(),
        }
    }

    fn is_key_equal(&self, itin_class_def: Option<RecordId>, writes: &[usize], reads: &[usize]) -> bool {
        self.itin_class_def == itin_class_def && self.writes == writes && self.reads == reads
    }
}

/// Sorted-set union, mirroring `std::set_union` over already-sorted
/// `ProcIndices` vectors.
fn set_union(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

fn sched_class_name(db: &impl RecordDb, itin_class_def: Option<RecordId>, writes: &[usize], reads: &[usize], models: &SchedModels) -> String {
    let mut name = String::new();
    if let Some(def) = itin_class_def {
        if db.name_of(def) != "NoItinerary" {
            name.push_str(db.name_of(def));
        }
    }
    for &idx in writes {
        if !name.is_empty() {
            name.push('_');
        }
        name.push_str(&models.get_sched_rw(idx, false).name);
    }
    for &idx in reads {
        name.push('_');
        name.push_str(&models.get_sched_rw(idx, true).name);
    }
    name
}

fn inst_defs_name(db: &impl RecordDb, inst_defs: &[RecordId]) -> String {
    inst_defs.iter().map(|d| db.name_of(*d)).collect::<Vec<_>>().join("_")
}

impl SchedModels {
    /// Look up an existing class with identical key, else `0`.
    fn find_sched_class_idx(&self, itin_class_def: Option<RecordId>, writes: &[usize], reads: &[usize]) -> usize {
        self.sched_classes
            .iter()
            .find(|c| c.is_key_equal(itin_class_def, writes, reads))
            .map_or(0, |c| c.index)
    }

    /// Find-or-create a SchedClass for this key, widening `proc_indices` if
    /// it already exists. Mirrors `addSchedClass` exactly, including the
    /// "class 0 is itself eligible for a key match" quirk (spec.md
    /// SPEC_FULL.md §3).
    pub(crate) fn add_sched_class(
        &mut self,
        db: &impl RecordDb,
        itin_class_def: Option<RecordId>,
        writes: &[usize],
        reads: &[usize],
        proc_indices: &[usize],
    ) -> usize {
        assert!(!proc_indices.is_empty(), "expect at least one ProcIdx");
        let idx = self.find_sched_class_idx(itin_class_def, writes, reads);
        if idx != 0 || self.sched_classes[0].is_key_equal(itin_class_def, writes, reads) {
            let union = set_union(&self.sched_classes[idx].proc_indices, proc_indices);
            self.sched_classes[idx].proc_indices = union;
            return idx;
        }
        let new_idx = self.sched_classes.len();
        let name = sched_class_name(db, itin_class_def, writes, reads, self);
        let mut sc = SchedClass::new(new_idx, name, itin_class_def);
        sc.writes = writes.to_vec();
        sc.reads = reads.to_vec();
        sc.proc_indices = proc_indices.to_vec();
        self.sched_classes.push(sc);
        new_idx
    }

    /// Build the initial per-instruction classes, then fold in every
    /// `InstRW` override (spec.md §4.2).
    pub(crate) fn collect_sched_classes(&mut self, db: &impl RecordDb, target: &TargetInstructions) -> Result<()> {
        assert!(self.sched_classes.is_empty(), "expected empty sched class table");
        let no_itinerary = db.get_def("NoItinerary").ok_or_else(|| ElaborationError::Internal {
            loc: crate::record_db::SourceLoc::default(),
            message: "target description is missing the NoItinerary record".to_string(),
        })?;
        let mut no_instr_model = SchedClass::new(0, "NoInstrModel".to_string(), Some(no_itinerary));
        no_instr_model.proc_indices.push(0);
        self.sched_classes.push(no_instr_model);

        for &inst in target.all() {
            let itin_def = db.field_def(inst, "Itinerary");
            let (writes, reads) = if db.field_is_complete(inst, "SchedRW") {
                let rw_defs = db.field_list_defs(inst, "SchedRW");
                self.find_rws(db, &rw_defs)
            } else {
                (Vec::new(), Vec::new())
            };
            let sc_idx = self.add_sched_class(db, itin_def, &writes, &reads, &[0]);
            self.instr_class_map.insert(inst, sc_idx);
        }

        let mut inst_rw_defs = db.all_derived_definitions("InstRW");
        inst_rw_defs.sort_by(|a, b| db.name_of(*a).cmp(db.name_of(*b)));
        for rw_def in inst_rw_defs {
            self.create_inst_rw_class(db, target, rw_def)?;
        }

        self.num_instr_sched_classes = self.sched_classes.len();
        Ok(())
    }

    /// Fold one `InstRW` override into the class table: group the matched
    /// instructions by current class, then reuse or fork a class per group
    /// (spec.md §4.2 "InstRW pass").
    fn create_inst_rw_class(&mut self, db: &impl RecordDb, target: &TargetInstructions, inst_rw_def: RecordId) -> Result<()> {
        let dag = db.field_dag(inst_rw_def, "Instrs").ok_or_else(|| ElaborationError::UndefinedField {
            loc: db.loc_of(inst_rw_def),
            field: "Instrs".to_string(),
        })?;
        let inst_defs = SetExpander::expand(db, target, dag, &db.loc_of(inst_rw_def))?;
        if inst_defs.is_empty() {
            return Err(ElaborationError::Internal {
                loc: db.loc_of(inst_rw_def),
                message: "No matching instruction opcodes".to_string(),
            });
        }

        // Group by current class, preserving first-seen order of classes
        // (SmallMapVector semantics in the original).
        let mut order: Vec<usize> = Vec::new();
        let mut groups: HashMap<usize, Vec<RecordId>> = HashMap::new();
        for inst_def in inst_defs {
            let sc_idx = *self.instr_class_map.get(&inst_def).ok_or_else(|| ElaborationError::NoSchedClassForInstruction {
                loc: db.loc_of(inst_def),
                name: db.name_of(inst_def).to_string(),
            })?;
            if !groups.contains_key(&sc_idx) {
                order.push(sc_idx);
            }
            groups.entry(sc_idx).or_default().push(inst_def);
        }

        let rw_model_def = db.field_def(inst_rw_def, "SchedModel").ok_or_else(|| ElaborationError::UndefinedField {
            loc: db.loc_of(inst_rw_def),
            field: "SchedModel".to_string(),
        })?;

        for old_sc_idx in order {
            let group_insts = groups.remove(&old_sc_idx).expect("just inserted");

            if old_sc_idx != 0 {
                let old_inst_rws = self.sched_classes[old_sc_idx].inst_rws.clone();
                if !old_inst_rws.is_empty() {
                    let orig_num_instrs = self
                        .instr_class_map
                        .iter()
                        .filter(|(_, &sc)| sc == old_sc_idx)
                        .count();
                    if orig_num_instrs == group_insts.len() {
                        assert_eq!(self.sched_classes[old_sc_idx].proc_indices.first(), Some(&0), "expected a generic SchedClass");
                        self.reject_inst_rw_collision(db, &old_inst_rws, rw_model_def, &group_insts, inst_rw_def)?;
                        self.sched_classes[old_sc_idx].inst_rws.push(inst_rw_def);
                        continue;
                    }
                }
            }

            let new_idx = self.sched_classes.len();
            let name = inst_defs_name(db, &group_insts);
            let mut sc = SchedClass::new(new_idx, name, self.sched_classes[old_sc_idx].itin_class_def);
            sc.writes = self.sched_classes[old_sc_idx].writes.clone();
            sc.reads = self.sched_classes[old_sc_idx].reads.clone();
            sc.proc_indices.push(0);

            if old_sc_idx != 0 {
                let old_inst_rws = self.sched_classes[old_sc_idx].inst_rws.clone();
                self.reject_inst_rw_collision(db, &old_inst_rws, rw_model_def, &group_insts, inst_rw_def)?;
                sc.inst_rws = old_inst_rws;
            }
            sc.inst_rws.push(inst_rw_def);
            self.sched_classes.push(sc);

            for inst_def in &group_insts {
                self.instr_class_map.insert(*inst_def, new_idx);
            }
        }
        Ok(())
    }

    fn reject_inst_rw_collision(
        &self,
        db: &impl RecordDb,
        old_inst_rws: &[RecordId],
        rw_model_def: RecordId,
        group_insts: &[RecordId],
        new_inst_rw_def: RecordId,
    ) -> Result<()> {
        for &old_rw_def in old_inst_rws {
            let same_model = db.field_def(old_rw_def, "SchedModel") == Some(rw_model_def);
            let overlap_check = db.field_bit(rw_model_def, "FullInstRWOverlapCheck");
            if same_model && overlap_check {
                let inst = group_insts.first().copied().unwrap_or(new_inst_rw_def);
                return Err(ElaborationError::OverlappingInstRw {
                    loc: db.loc_of(new_inst_rw_def),
                    inst: db.name_of(inst).to_string(),
                    other_instrs: db.name_of(old_rw_def).to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_db::{FieldValue, RecordDatabase, SourceLoc};

    fn base_db() -> RecordDatabase {
        let mut db = RecordDatabase::new();
        db.insert("NoSchedModel".into(), vec!["SchedMachineModel".into()], SourceLoc::default());
        db.insert("NoItineraries".into(), vec!["ProcessorItineraries".into()], SourceLoc::default());
        db.insert("NoItinerary".into(), vec!["InstrItinClass".into()], SourceLoc::default());
        db
    }

    #[test]
    fn trivial_write_creates_one_class() {
        let mut db = base_db();
        let w1 = db.insert("W1".into(), vec!["SchedWrite".into()], SourceLoc::default());
        let add = db.insert("ADD".into(), vec!["Instruction".into()], SourceLoc::default());
        db.set_field(add, "SchedRW", FieldValue::ListDefs(vec![w1]));
        let no_itin = db.get_def("NoItinerary").unwrap();
        db.set_field(add, "Itinerary", FieldValue::Def(no_itin));

        let target = TargetInstructions::new(&db, vec![add], 0);
        let mut models = SchedModels::new();
        models.collect_proc_models(&db).unwrap();
        models.collect_sched_rw(&db, &target).unwrap();
        models.collect_sched_classes(&db, &target).unwrap();

        assert_eq!(models.sched_classes.len(), 2);
        let sc_idx = *models.instr_class_map.get(&add).unwrap();
        assert_eq!(sc_idx, 1);
        assert_eq!(models.sched_classes[1].writes.len(), 1);
        assert!(models.sched_classes[1].reads.is_empty());
        assert_eq!(models.sched_classes[1].proc_indices, vec![0]);
    }

    #[test]
    fn add_sched_class_widens_existing_class_proc_indices() {
        let mut db = base_db();
        let no_itin = db.get_def("NoItinerary").unwrap();
        let mut models = SchedModels::new();
        models.collect_proc_models(&db).unwrap();
        let target = TargetInstructions::new(&db, vec![], 0);
        models.collect_sched_rw(&db, &target).unwrap();
        models.sched_classes.push(SchedClass::new(0, "NoInstrModel".into(), Some(no_itin)));
        models.sched_classes[0].proc_indices.push(0);

        let idx1 = models.add_sched_class(&db, Some(no_itin), &[], &[], &[0]);
        let idx2 = models.add_sched_class(&db, Some(no_itin), &[], &[], &[1]);
        assert_eq!(idx1, 0);
        assert_eq!(idx2, 0);
        assert_eq!(models.sched_classes[0].proc_indices, vec![0, 1]);
    }
}
