//! The breadth-first `SchedVariant` transition engine (spec.md §4.4) — the
//! algorithmic core of the elaborator. Mirrors `PredTransitions`,
//! `inferFromRW`, `inferFromInstRWs`, and `inferFromItinClass`.

use crate::error::{ElaborationError, Result};
use crate::record_db::{RecordDb, RecordId};
use crate::target::TargetInstructions;

use super::sched_class::CodeGenSchedTransition;
use super::SchedModels;

/// One conjunct of a `PredTransition`'s `PredTerm`: "RW `rw_idx` (read or
/// write) was resolved by choosing the variant guarded by `predicate`".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredCheck {
    pub is_read: bool,
    pub rw_idx: usize,
    pub predicate: RecordId,
}

/// A partially (or fully) resolved choice through nested `SchedVariant`s:
/// the predicates chosen so far, the flattened per-operand write/read
/// sequences built up under those choices, and the processor set the choice
/// is still valid for.
#[derive(Debug, Clone, Default)]
struct PredTransition {
    pred_term: Vec<PredCheck>,
    write_sequences: Vec<Vec<usize>>,
    read_sequences: Vec<Vec<usize>>,
    proc_indices: Vec<usize>,
}

/// A candidate variant (or aliased sequence) competing to replace one RW at
/// one transition index. Mirrors `TransVariant`.
struct TransVariant {
    var_or_seq_def: RecordId,
    rw_idx: usize,
    proc_idx: usize,
    trans_vec_idx: usize,
}

/// True when this predicate is mutually exclusive with the term: it guards a
/// different variant of a `SchedRW` some `PredCheck` in `term` already
/// decided (spec.md §4.4 "Mutual exclusion rule"). Identity of the
/// predicate record is the only test ever performed — the earlier choice's
/// own predicate short-circuits to "not exclusive" so a transition can keep
/// extending its own branch.
fn mutually_exclusive(db: &impl RecordDb, models: &SchedModels, pred_def: RecordId, term: &[PredCheck]) -> bool {
    for pc in term {
        if pc.predicate == pred_def {
            return false;
        }
        let rw = models.get_sched_rw(pc.rw_idx, pc.is_read);
        let the_def = rw.the_def.expect("PredCheck must refer to a SchedVariant");
        for variant in db.field_list_defs(the_def, "Variants") {
            if db.field_def(variant, "Predicate") == Some(pred_def) {
                return true;
            }
        }
    }
    false
}

fn has_aliased_variants(db: &impl RecordDb, models: &SchedModels, idx: usize, is_read: bool) -> bool {
    let rw = models.get_sched_rw(idx, is_read);
    if rw.has_variants {
        return true;
    }
    for &alias_def in &rw.aliases {
        let alias_rw_def = db.field_def(alias_def, "AliasRW").expect("SchedAlias has AliasRW");
        let alias_idx = models.get_sched_rw_idx_by_def(alias_rw_def, is_read);
        let alias_rw = models.get_sched_rw(alias_idx, is_read);
        if alias_rw.has_variants {
            return true;
        }
        if alias_rw.is_sequence {
            for si in models.expand_rw_sequence_db(db, alias_idx, is_read) {
                if has_aliased_variants(db, models, si, is_read) {
                    return true;
                }
            }
        }
    }
    false
}

fn has_variant(transitions: &[PredTransition], db: &impl RecordDb, models: &SchedModels) -> bool {
    transitions.iter().any(|t| {
        t.write_sequences.iter().flatten().any(|&w| has_aliased_variants(db, models, w, false))
            || t.read_sequences.iter().flatten().any(|&r| has_aliased_variants(db, models, r, true))
    })
}

/// Populate the list of variants/aliased sequences of `sched_rw_idx` whose
/// processor scope and predicate are not excluded by `trans_vec[trans_idx]`.
/// May append clones of `trans_vec[trans_idx]` to `trans_vec` (one per
/// surviving candidate beyond the first). Mirrors `getIntersectingVariants`.
fn get_intersecting_variants(
    db: &impl RecordDb,
    models: &SchedModels,
    sched_rw_idx: usize,
    is_read: bool,
    trans_idx: usize,
    trans_vec: &mut Vec<PredTransition>,
) -> Result<Vec<TransVariant>> {
    let mut generic_rw = false;
    let mut candidates: Vec<TransVariant> = Vec::new();

    let rw = models.get_sched_rw(sched_rw_idx, is_read).clone();
    if rw.has_variants {
        let the_def = rw.the_def.expect("has_variants implies a def");
        let mut var_proc_idx = 0;
        if let Some(model_def) = db.field_def(the_def, "SchedModel") {
            var_proc_idx = models.get_proc_model_idx(db, model_def)?;
        }
        for var_def in db.field_list_defs(the_def, "Variants") {
            candidates.push(TransVariant { var_or_seq_def: var_def, rw_idx: sched_rw_idx, proc_idx: var_proc_idx, trans_vec_idx: 0 });
        }
        if var_proc_idx == 0 {
            generic_rw = true;
        }
    }
    for &alias_def in &rw.aliases {
        let mut alias_proc_idx = 0;
        if let Some(model_def) = db.field_def(alias_def, "SchedModel") {
            alias_proc_idx = models.get_proc_model_idx(db, model_def)?;
        }
        let alias_rw_def = db.field_def(alias_def, "AliasRW").expect("SchedAlias has AliasRW");
        let alias_idx = models.get_sched_rw_idx_by_def(alias_rw_def, is_read);
        let alias_rw = models.get_sched_rw(alias_idx, is_read).clone();

        if alias_rw.has_variants {
            let the_def = alias_rw.the_def.expect("has_variants implies a def");
            for var_def in db.field_list_defs(the_def, "Variants") {
                candidates.push(TransVariant { var_or_seq_def: var_def, rw_idx: alias_idx, proc_idx: alias_proc_idx, trans_vec_idx: 0 });
            }
        }
        if alias_rw.is_sequence {
            let the_def = alias_rw.the_def.expect("sequence RW from an alias target has a def");
            candidates.push(TransVariant { var_or_seq_def: the_def, rw_idx: sched_rw_idx, proc_idx: alias_proc_idx, trans_vec_idx: 0 });
        }
        if alias_proc_idx == 0 {
            generic_rw = true;
        }
    }

    let mut intersecting: Vec<TransVariant> = Vec::new();
    for mut candidate in candidates {
        let proc_indices = &trans_vec[trans_idx].proc_indices;
        if proc_indices.first() != Some(&0) && candidate.proc_idx != 0 {
            let count = proc_indices.iter().filter(|&&p| p == candidate.proc_idx).count();
            if count == 0 {
                continue;
            }
            if count > 1 {
                return Err(ElaborationError::MultipleVariantsForProcessor {
                    loc: db.loc_of(candidate.var_or_seq_def),
                    processor: models.proc_models[candidate.proc_idx].name.clone(),
                });
            }
        }
        if db.is_subclass_of(candidate.var_or_seq_def, "SchedVar") {
            let pred_def = db.field_def(candidate.var_or_seq_def, "Predicate").expect("SchedVar has Predicate");
            if mutually_exclusive(db, models, pred_def, &trans_vec[trans_idx].pred_term) {
                continue;
            }
        }
        if intersecting.is_empty() {
            candidate.trans_vec_idx = trans_idx;
            intersecting.push(candidate);
        } else {
            candidate.trans_vec_idx = trans_vec.len();
            let clone = trans_vec[trans_idx].clone();
            intersecting.push(candidate);
            trans_vec.push(clone);
        }
    }
    if generic_rw && intersecting.is_empty() {
        let loc = rw.the_def.map(|d| db.loc_of(d)).unwrap_or_default();
        return Err(ElaborationError::NoMatchingVariant { loc });
    }
    Ok(intersecting)
}

/// Extend `trans_vec[candidate.trans_vec_idx]` with the reads/writes this
/// candidate selects, expanding sequences and fanning out variadic operand
/// positions. Mirrors `pushVariant`.
fn push_variant(
    db: &impl RecordDb,
    models: &mut SchedModels,
    trans_vec: &mut [PredTransition],
    candidate: &TransVariant,
    is_read: bool,
) -> Result<()> {
    let idx = candidate.trans_vec_idx;
    if candidate.proc_idx != 0 {
        trans_vec[idx].proc_indices = vec![candidate.proc_idx];
    }

    let mut selected_rws: Vec<usize> = Vec::new();
    if db.is_subclass_of(candidate.var_or_seq_def, "SchedVar") {
        let pred_def = db.field_def(candidate.var_or_seq_def, "Predicate").expect("SchedVar has Predicate");
        trans_vec[idx].pred_term.push(PredCheck { is_read, rw_idx: candidate.rw_idx, predicate: pred_def });
        let selected_defs = db.field_list_defs(candidate.var_or_seq_def, "Selected");
        let (writes, reads) = models.find_rws(db, &selected_defs);
        selected_rws = if is_read { reads } else { writes };
    } else {
        selected_rws.push(models.get_sched_rw_idx_by_def(candidate.var_or_seq_def, is_read));
    }

    let is_variadic = models.get_sched_rw(candidate.rw_idx, is_read).is_variadic;
    let rw_sequences = if is_read { &mut trans_vec[idx].read_sequences } else { &mut trans_vec[idx].write_sequences };

    if is_variadic {
        let oper_idx = rw_sequences.len() - 1;
        let last = rw_sequences[oper_idx].clone();
        for _ in 1..selected_rws.len() {
            rw_sequences.push(last.clone());
        }
        for (i, &rw_idx) in selected_rws.iter().enumerate() {
            let expanded = if is_read { vec![rw_idx] } else { models.expand_rw_sequence_db(db, rw_idx, is_read) };
            rw_sequences[oper_idx + i].extend(expanded);
        }
    } else {
        let mut expanded = Vec::new();
        for &rw_idx in &selected_rws {
            if is_read {
                expanded.push(rw_idx);
            } else {
                expanded.extend(models.expand_rw_sequence_db(db, rw_idx, is_read));
            }
        }
        rw_sequences.last_mut().expect("operand sequence pushed before substitution").extend(expanded);
    }
    Ok(())
}

/// Apply `rw_seq` (one original operand's flattened RW list) to every
/// transition in `trans_vec[start_idx..]`, distributing across intersecting
/// variants where an RW has any. Mirrors `substituteVariantOperand`.
fn substitute_variant_operand(
    db: &impl RecordDb,
    models: &mut SchedModels,
    trans_vec: &mut Vec<PredTransition>,
    rw_seq: &[usize],
    is_read: bool,
    start_idx: usize,
) -> Result<()> {
    for &rw_idx in rw_seq {
        let trans_end = trans_vec.len();
        let mut trans_idx = start_idx;
        while trans_idx != trans_end {
            if !has_aliased_variants(db, models, rw_idx, is_read) {
                if is_read {
                    trans_vec[trans_idx].read_sequences.last_mut().expect("operand seq exists").push(rw_idx);
                } else {
                    trans_vec[trans_idx].write_sequences.last_mut().expect("operand seq exists").push(rw_idx);
                }
                trans_idx += 1;
                continue;
            }
            let intersecting = get_intersecting_variants(db, models, rw_idx, is_read, trans_idx, trans_vec)?;
            for candidate in &intersecting {
                push_variant(db, models, trans_vec, candidate, is_read)?;
            }
            trans_idx += 1;
        }
    }
    Ok(())
}

/// One breadth-first step: expand every variant reachable from `trans` by
/// one level, appending the results to `trans_vec`. Mirrors
/// `substituteVariants`.
fn substitute_variants(db: &impl RecordDb, models: &mut SchedModels, trans_vec: &mut Vec<PredTransition>, trans: &PredTransition) -> Result<()> {
    let start_idx = trans_vec.len();
    trans_vec.push(PredTransition {
        pred_term: trans.pred_term.clone(),
        proc_indices: trans.proc_indices.clone(),
        write_sequences: Vec::new(),
        read_sequences: Vec::new(),
    });

    for write_seq in &trans.write_sequences {
        for t in &mut trans_vec[start_idx..] {
            t.write_sequences.push(Vec::new());
        }
        substitute_variant_operand(db, models, trans_vec, write_seq, false, start_idx)?;
    }
    for read_seq in &trans.read_sequences {
        for t in &mut trans_vec[start_idx..] {
            t.read_sequences.push(Vec::new());
        }
        substitute_variant_operand(db, models, trans_vec, read_seq, true, start_idx)?;
    }
    Ok(())
}

/// Once fixed point is reached, materialize each surviving transition as a
/// new SchedClass plus a `CodeGenSchedTransition` edge on the originating
/// class. Mirrors `inferFromTransitions`.
fn infer_from_transitions(db: &impl RecordDb, models: &mut SchedModels, transitions: &[PredTransition], from_class_idx: usize) {
    for t in transitions {
        let oper_writes: Vec<usize> = t.write_sequences.iter().map(|seq| models.find_or_insert_rw(seq, false)).collect();
        let oper_reads: Vec<usize> = t.read_sequences.iter().map(|seq| models.find_or_insert_rw(seq, true)).collect();
        let to_class_idx = models.add_sched_class(db, None, &oper_writes, &oper_reads, &t.proc_indices);

        // std::unique: only *consecutive* duplicates collapse.
        let mut preds: Vec<RecordId> = Vec::new();
        for pc in &t.pred_term {
            if preds.last() != Some(&pc.predicate) {
                preds.push(pc.predicate);
            }
        }
        models.sched_classes[from_class_idx].transitions.push(CodeGenSchedTransition {
            to_class_idx,
            proc_indices: t.proc_indices.clone(),
            pred_term: preds,
        });
    }
}

impl SchedModels {
    /// Breadth-first-expand `(oper_writes, oper_reads)` into zero or more
    /// new SchedClasses, recording each as a predicate-guarded transition
    /// from `from_class_idx`. A no-op if nothing under these RWs has
    /// variants. Mirrors `inferFromRW`.
    pub(crate) fn infer_from_rw(
        &mut self,
        db: &impl RecordDb,
        oper_writes: &[usize],
        oper_reads: &[usize],
        from_class_idx: usize,
        proc_indices: &[usize],
    ) -> Result<()> {
        let mut last_transitions = vec![PredTransition {
            proc_indices: proc_indices.to_vec(),
            ..PredTransition::default()
        }];
        for &write_idx in oper_writes {
            last_transitions[0].write_sequences.push(self.expand_rw_sequence_db(db, write_idx, false));
        }
        for &read_idx in oper_reads {
            last_transitions[0].read_sequences.push(self.expand_rw_sequence_db(db, read_idx, true));
        }

        while has_variant(&last_transitions, db, self) {
            let mut trans_vec = Vec::new();
            for trans in &last_transitions {
                substitute_variants(db, self, &mut trans_vec, trans)?;
            }
            last_transitions = trans_vec;
        }

        if last_transitions[0].pred_term.is_empty() {
            return Ok(());
        }
        infer_from_transitions(db, self, &last_transitions, from_class_idx);
        Ok(())
    }

    /// Infer classes from per-processor itinerary resources matched by
    /// `ItinRW`. Mirrors `inferFromItinClass`.
    fn infer_from_itin_class(&mut self, db: &impl RecordDb, itin_class_def: RecordId, from_class_idx: usize) -> Result<()> {
        for p_idx in 0..self.proc_models.len() {
            let itin_rw_defs = self.proc_models[p_idx].itin_rw_defs.clone();
            let mut has_match = false;
            for rw_def in itin_rw_defs {
                let matched = db.field_list_defs(rw_def, "MatchedItinClasses");
                if !matched.contains(&itin_class_def) {
                    continue;
                }
                if has_match {
                    return Err(ElaborationError::DuplicateItinRwMatch {
                        loc: db.loc_of(rw_def),
                        itin_class: db.name_of(itin_class_def).to_string(),
                        processor: self.proc_models[p_idx].name.clone(),
                    });
                }
                has_match = true;
                let rw_defs = db.field_list_defs(rw_def, "OperandReadWrites");
                let (writes, reads) = self.find_rws(db, &rw_defs);
                self.infer_from_rw(db, &writes, &reads, from_class_idx, &[p_idx])?;
            }
        }
        Ok(())
    }

    /// Infer classes from per-processor `InstRW` overrides attached to this
    /// class, skipping any whose matched instructions have all since moved
    /// to a different class. Mirrors `inferFromInstRWs`.
    fn infer_from_instr_rws(&mut self, db: &impl RecordDb, target: &TargetInstructions, sc_idx: usize) -> Result<()> {
        let inst_rws = self.sched_classes[sc_idx].inst_rws.clone();
        for rw_def in inst_rws {
            let dag = db.field_dag(rw_def, "Instrs").ok_or_else(|| ElaborationError::UndefinedField {
                loc: db.loc_of(rw_def),
                field: "Instrs".to_string(),
            })?;
            let inst_defs = crate::set_expander::SetExpander::expand(db, target, dag, &db.loc_of(rw_def))?;
            if !inst_defs.iter().any(|d| self.instr_class_map.get(d) == Some(&sc_idx)) {
                continue;
            }
            let rw_defs = db.field_list_defs(rw_def, "OperandReadWrites");
            let (writes, reads) = self.find_rws(db, &rw_defs);
            let model_def = db.field_def(rw_def, "SchedModel").ok_or_else(|| ElaborationError::UndefinedField {
                loc: db.loc_of(rw_def),
                field: "SchedModel".to_string(),
            })?;
            let p_idx = self.get_proc_model_idx(db, model_def)?;
            self.infer_from_rw(db, &writes, &reads, sc_idx, &[p_idx])?;
        }
        Ok(())
    }

    /// Drive inference over every class, including ones created during this
    /// same pass (the `while idx != len()` loop grows its own bound).
    /// Mirrors `inferSchedClasses`, including its defensive growth guard
    /// (spec.md §4.4/§9).
    pub(crate) fn infer_sched_classes(&mut self, db: &impl RecordDb, target: &TargetInstructions) -> Result<()> {
        let mut idx = 0;
        while idx != self.sched_classes.len() {
            debug_assert_eq!(self.sched_classes[idx].index, idx, "bad SCIdx");

            if let Some(itin_class_def) = self.sched_classes[idx].itin_class_def {
                self.infer_from_itin_class(db, itin_class_def, idx)?;
            }
            if !self.sched_classes[idx].inst_rws.is_empty() {
                self.infer_from_instr_rws(db, target, idx)?;
            }
            if !self.sched_classes[idx].writes.is_empty() {
                let writes = self.sched_classes[idx].writes.clone();
                let reads = self.sched_classes[idx].reads.clone();
                let proc_indices = self.sched_classes[idx].proc_indices.clone();
                self.infer_from_rw(db, &writes, &reads, idx, &proc_indices)?;
            }

            let limit = self.num_instr_sched_classes * self.growth_factor;
            if self.sched_classes.len() >= limit {
                return Err(ElaborationError::VariantGrowthLimitExceeded {
                    limit,
                    growth_factor: self.growth_factor,
                    base: self.num_instr_sched_classes,
                });
            }
            idx += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_db::{FieldValue, RecordDatabase, SourceLoc};
    use crate::target::TargetInstructions;

    fn base_db() -> RecordDatabase {
        let mut db = RecordDatabase::new();
        db.insert("NoSchedModel".into(), vec!["SchedMachineModel".into()], SourceLoc::default());
        db.insert("NoItineraries".into(), vec!["ProcessorItineraries".into()], SourceLoc::default());
        db.insert("NoItinerary".into(), vec!["InstrItinClass".into()], SourceLoc::default());
        db
    }

    /// Boundary scenario 4 (spec.md §8): a two-way `SchedVariant` fans out
    /// into exactly two new classes, each carrying one predicate.
    #[test]
    fn sched_variant_fans_out_into_two_classes() {
        let mut db = base_db();
        let no_itin = db.get_def("NoItinerary").unwrap();

        let pa = db.insert("PredA".into(), vec!["SchedPredicate".into()], SourceLoc::default());
        let pb = db.insert("PredB".into(), vec!["SchedPredicate".into()], SourceLoc::default());
        let wa = db.insert("WA".into(), vec!["SchedWrite".into()], SourceLoc::default());
        let wb = db.insert("WB".into(), vec!["SchedWrite".into()], SourceLoc::default());

        let var_a = db.insert("VarA".into(), vec!["SchedVar".into()], SourceLoc::default());
        db.set_field(var_a, "Predicate", FieldValue::Def(pa));
        db.set_field(var_a, "Selected", FieldValue::ListDefs(vec![wa]));
        let var_b = db.insert("VarB".into(), vec!["SchedVar".into()], SourceLoc::default());
        db.set_field(var_b, "Predicate", FieldValue::Def(pb));
        db.set_field(var_b, "Selected", FieldValue::ListDefs(vec![wb]));

        let w_var = db.insert("WVar".into(), vec!["SchedVariant".into(), "SchedWrite".into()], SourceLoc::default());
        db.set_field(w_var, "Variants", FieldValue::ListDefs(vec![var_a, var_b]));

        let br = db.insert("BR".into(), vec!["Instruction".into()], SourceLoc::default());
        db.set_field(br, "SchedRW", FieldValue::ListDefs(vec![w_var]));
        db.set_field(br, "Itinerary", FieldValue::Def(no_itin));

        let target = TargetInstructions::new(&db, vec![br], 0);
        let mut models = SchedModels::new();
        models.collect_proc_models(&db).unwrap();
        models.collect_sched_rw(&db, &target).unwrap();
        models.collect_sched_classes(&db, &target).unwrap();
        models.collect_proc_itins(&db).unwrap();
        models.collect_proc_itin_rw(&db).unwrap();
        models.collect_proc_unsupported_features(&db);
        models.infer_sched_classes(&db, &target).unwrap();

        let br_class = *models.instr_class_map.get(&br).unwrap();
        let transitions = &models.sched_classes[br_class].transitions;
        assert_eq!(transitions.len(), 2);

        let wa_idx = models.get_sched_rw_idx_by_def(wa, false);
        let wb_idx = models.get_sched_rw_idx_by_def(wb, false);
        let mut seen_writes: Vec<Vec<usize>> = transitions
            .iter()
            .map(|t| models.sched_classes[t.to_class_idx].writes.clone())
            .collect();
        seen_writes.sort();
        assert_eq!(seen_writes, vec![vec![wa_idx], vec![wb_idx]]);
        for t in transitions {
            assert_eq!(t.pred_term.len(), 1);
        }
    }

    /// Boundary scenario 5 (spec.md §8): a nested variant's branch guarded
    /// by a predicate that's already fired (on the *same outer RW*) gets
    /// pruned by mutual exclusion.
    #[test]
    fn mutual_exclusion_prunes_nested_branch_guarded_by_same_predicate() {
        let mut db = base_db();
        let no_itin = db.get_def("NoItinerary").unwrap();

        let p1 = db.insert("Pred1".into(), vec!["SchedPredicate".into()], SourceLoc::default());
        let p2 = db.insert("Pred2".into(), vec!["SchedPredicate".into()], SourceLoc::default());
        let w_leaf_a = db.insert("WLeafA".into(), vec!["SchedWrite".into()], SourceLoc::default());
        let w_leaf_b = db.insert("WLeafB".into(), vec!["SchedWrite".into()], SourceLoc::default());
        let w_leaf_2 = db.insert("WLeaf2".into(), vec!["SchedWrite".into()], SourceLoc::default());

        // W_inner1 is itself a variant with a branch guarded by P2.
        let inner_var_a = db.insert("InnerVarA".into(), vec!["SchedVar".into()], SourceLoc::default());
        db.set_field(inner_var_a, "Predicate", FieldValue::Def(p1));
        db.set_field(inner_var_a, "Selected", FieldValue::ListDefs(vec![w_leaf_a]));
        let inner_var_b = db.insert("InnerVarB".into(), vec!["SchedVar".into()], SourceLoc::default());
        db.set_field(inner_var_b, "Predicate", FieldValue::Def(p2));
        db.set_field(inner_var_b, "Selected", FieldValue::ListDefs(vec![w_leaf_b]));
        let w_inner1 = db.insert("WInner1".into(), vec!["SchedVariant".into(), "SchedWrite".into()], SourceLoc::default());
        db.set_field(w_inner1, "Variants", FieldValue::ListDefs(vec![inner_var_a, inner_var_b]));

        // W_outer selects [W_inner1] under P1, [W_leaf2] under P2.
        let outer_var_1 = db.insert("OuterVar1".into(), vec!["SchedVar".into()], SourceLoc::default());
        db.set_field(outer_var_1, "Predicate", FieldValue::Def(p1));
        db.set_field(outer_var_1, "Selected", FieldValue::ListDefs(vec![w_inner1]));
        let outer_var_2 = db.insert("OuterVar2".into(), vec!["SchedVar".into()], SourceLoc::default());
        db.set_field(outer_var_2, "Predicate", FieldValue::Def(p2));
        db.set_field(outer_var_2, "Selected", FieldValue::ListDefs(vec![w_leaf_2]));
        let w_outer = db.insert("WOuter".into(), vec!["SchedVariant".into(), "SchedWrite".into()], SourceLoc::default());
        db.set_field(w_outer, "Variants", FieldValue::ListDefs(vec![outer_var_1, outer_var_2]));

        let inst = db.insert("OP".into(), vec!["Instruction".into()], SourceLoc::default());
        db.set_field(inst, "SchedRW", FieldValue::ListDefs(vec![w_outer]));
        db.set_field(inst, "Itinerary", FieldValue::Def(no_itin));

        let target = TargetInstructions::new(&db, vec![inst], 0);
        let mut models = SchedModels::new();
        models.collect_proc_models(&db).unwrap();
        models.collect_sched_rw(&db, &target).unwrap();
        models.collect_sched_classes(&db, &target).unwrap();
        models.collect_proc_itins(&db).unwrap();
        models.collect_proc_itin_rw(&db).unwrap();
        models.collect_proc_unsupported_features(&db);
        models.infer_sched_classes(&db, &target).unwrap();

        let sc_idx = *models.instr_class_map.get(&inst).unwrap();
        let transitions = &models.sched_classes[sc_idx].transitions;
        // P1 branch descends into WInner1, which itself only offers its
        // P1-guarded leaf (WLeafA); its P2 branch is pruned. P2 branch picks
        // WLeaf2 directly. Two transitions total, not three.
        assert_eq!(transitions.len(), 2);

        let w_leaf_a_idx = models.get_sched_rw_idx_by_def(w_leaf_a, false);
        let w_leaf_2_idx = models.get_sched_rw_idx_by_def(w_leaf_2, false);
        let mut writes: Vec<Vec<usize>> = transitions
            .iter()
            .map(|t| models.sched_classes[t.to_class_idx].writes.clone())
            .collect();
        writes.sort();
        assert_eq!(writes, vec![vec![w_leaf_2_idx], vec![w_leaf_a_idx]]);
    }
}
