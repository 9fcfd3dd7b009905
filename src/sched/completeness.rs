//! The completeness checker: for every processor declaring itself a
//! `CompleteModel`, every (supported, scheduled) instruction must resolve to
//! a class that actually carries scheduling information for that processor.
//! Mirrors `checkCompleteness` (spec.md §4.6/§4.7).

use crate::error::{ElaborationError, Result};
use crate::record_db::RecordDb;
use crate::target::TargetInstructions;

use super::SchedModels;

const COMPLETENESS_HINT: &str = "\n\
Reasons a sched class may be considered incomplete are:\n\
1) No scheduling information was generated for an instruction, and it\n\
   wasn't marked as 'hasNoSchedulingInfo'.\n\
2) A sched class was derived from Instruction.Itinerary, and no\n\
   information was generated for the corresponding processor's itinerary\n\
   class.\n\
3) A superclass of Sched<[]> was not matched in an InstRW for the missing\n\
   processor.\n\
4) An instruction's predicate was not checked to exclude it from the\n\
   model, via an UnsupportedFeatures list on the processor, or\n\
   isUnsupported on the itinerary class.\n";

impl SchedModels {
    /// Verify every processor marked `CompleteModel` has scheduling
    /// information for every non-excluded instruction. Mirrors
    /// `checkCompleteness`, including its `HadCompleteModel` latch: the
    /// "no schedule information for instruction" message fires only for the
    /// first complete model a missing instruction is checked against, even
    /// though every complete model's pass still runs (and may still report
    /// its own "lacks information" errors for classes that do resolve).
    pub(crate) fn check_completeness(&self, db: &impl RecordDb, target: &TargetInstructions) -> Result<()> {
        let mut complete = true;
        let mut had_complete_model = false;
        let mut messages = String::new();

        let no_itinerary = db.get_def("NoItinerary");

        for proc_model in &self.proc_models {
            if !db.field_bit(proc_model.model_def, "CompleteModel") {
                continue;
            }
            for &inst in target.all() {
                if target.has_no_scheduling_info(db, inst) {
                    continue;
                }
                if proc_model.is_unsupported(db, inst) {
                    continue;
                }

                let sc_idx = self.instr_class_map.get(&inst).copied().unwrap_or(0);
                if sc_idx == 0 {
                    if !db.field_is_complete(inst, "SchedRW") && !had_complete_model {
                        messages.push_str(&format!("No schedule information for instruction '{}'\n", db.name_of(inst)));
                        complete = false;
                    }
                    continue;
                }

                let sc = &self.sched_classes[sc_idx];
                if !sc.writes.is_empty() {
                    continue;
                }
                if let Some(itin) = sc.itin_class_def {
                    if Some(itin) != no_itinerary {
                        continue;
                    }
                }

                let has_proc_inst_rw = sc.inst_rws.iter().any(|&rw_def| db.field_def(rw_def, "SchedModel") == Some(proc_model.model_def));
                if !has_proc_inst_rw {
                    messages.push_str(&format!("'{}' lacks information for '{}'\n", proc_model.name, db.name_of(inst)));
                    complete = false;
                }
            }
            had_complete_model = true;
        }

        if !complete {
            messages.push_str(COMPLETENESS_HINT);
            if self.enforce_completeness {
                return Err(ElaborationError::IncompleteModel(messages));
            }
            tracing::warn!("{}", ElaborationError::IncompleteModel(messages));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_db::{FieldValue, RecordDatabase, SourceLoc};
    use crate::sched::SchedModels;

    fn base_db() -> RecordDatabase {
        let mut db = RecordDatabase::new();
        db.insert("NoSchedModel".into(), vec!["SchedMachineModel".into()], SourceLoc::default());
        db.insert("NoItineraries".into(), vec!["ProcessorItineraries".into()], SourceLoc::default());
        db.insert("NoItinerary".into(), vec!["InstrItinClass".into()], SourceLoc::default());
        db
    }

    #[test]
    fn complete_model_with_full_coverage_passes() {
        let mut db = base_db();
        let model_a = db.insert("ModelA".into(), vec!["SchedMachineModel".into()], SourceLoc::default());
        db.set_field(model_a, "CompleteModel", FieldValue::Bit(true));
        let no_itins = db.get_def("NoItineraries").unwrap();
        let no_itin = db.get_def("NoItinerary").unwrap();
        let p1 = db.insert("P1".into(), vec!["Processor".into()], SourceLoc::default());
        db.set_field(p1, "SchedModel", FieldValue::Def(model_a));
        db.set_field(p1, "ProcItin", FieldValue::Def(no_itins));

        let w1 = db.insert("W1".into(), vec!["SchedWrite".into()], SourceLoc::default());
        let add = db.insert("ADD".into(), vec!["Instruction".into()], SourceLoc::default());
        db.set_field(add, "SchedRW", FieldValue::ListDefs(vec![w1]));
        db.set_field(add, "Itinerary", FieldValue::Def(no_itin));

        let target = TargetInstructions::new(&db, vec![add], 0);
        let mut models = SchedModels::new();
        models.collect_proc_models(&db).unwrap();
        models.collect_sched_rw(&db, &target).unwrap();
        models.collect_sched_classes(&db, &target).unwrap();
        models.collect_proc_itins(&db).unwrap();
        models.collect_proc_itin_rw(&db).unwrap();
        models.collect_proc_unsupported_features(&db);
        models.infer_sched_classes(&db, &target).unwrap();
        models.collect_proc_resources(&db).unwrap();

        assert!(models.check_completeness(&db, &target).is_ok());
    }

    #[test]
    fn complete_model_missing_an_instruction_is_fatal() {
        let mut db = base_db();
        let model_a = db.insert("ModelA".into(), vec!["SchedMachineModel".into()], SourceLoc::default());
        db.set_field(model_a, "CompleteModel", FieldValue::Bit(true));
        let no_itins = db.get_def("NoItineraries").unwrap();
        let no_itin = db.get_def("NoItinerary").unwrap();
        let p1 = db.insert("P1".into(), vec!["Processor".into()], SourceLoc::default());
        db.set_field(p1, "SchedModel", FieldValue::Def(model_a));
        db.set_field(p1, "ProcItin", FieldValue::Def(no_itins));

        // ADD has no SchedRW at all, so its class is 0 (NoInstrModel) and
        // its SchedRW field is incomplete: this is the fatal case.
        let add = db.insert("ADD".into(), vec!["Instruction".into()], SourceLoc::default());
        db.set_field(add, "Itinerary", FieldValue::Def(no_itin));

        let target = TargetInstructions::new(&db, vec![add], 0);
        let mut models = SchedModels::new();
        models.collect_proc_models(&db).unwrap();
        models.collect_sched_rw(&db, &target).unwrap();
        models.collect_sched_classes(&db, &target).unwrap();
        models.collect_proc_itins(&db).unwrap();
        models.collect_proc_itin_rw(&db).unwrap();
        models.collect_proc_unsupported_features(&db);
        models.infer_sched_classes(&db, &target).unwrap();
        models.collect_proc_resources(&db).unwrap();

        let err = models.check_completeness(&db, &target).unwrap_err();
        match err {
            ElaborationError::IncompleteModel(msg) => assert!(msg.contains("No schedule information for instruction 'ADD'")),
            other => panic!("expected IncompleteModel, got {other:?}"),
        }
    }

    /// An instruction explicitly marked `hasNoSchedulingInfo = 1` (the
    /// pseudo-instruction escape hatch) is exempt from the completeness
    /// check even though its `SchedRW` is unset, unlike the fatal case
    /// above where `hasNoSchedulingInfo` is left at its default of false.
    #[test]
    fn has_no_scheduling_info_exempts_an_instruction_with_unset_sched_rw() {
        let mut db = base_db();
        let model_a = db.insert("ModelA".into(), vec!["SchedMachineModel".into()], SourceLoc::default());
        db.set_field(model_a, "CompleteModel", FieldValue::Bit(true));
        let no_itins = db.get_def("NoItineraries").unwrap();
        let no_itin = db.get_def("NoItinerary").unwrap();
        let p1 = db.insert("P1".into(), vec!["Processor".into()], SourceLoc::default());
        db.set_field(p1, "SchedModel", FieldValue::Def(model_a));
        db.set_field(p1, "ProcItin", FieldValue::Def(no_itins));

        let pseudo = db.insert("PSEUDO_FLUSH".into(), vec!["Instruction".into()], SourceLoc::default());
        db.set_field(pseudo, "Itinerary", FieldValue::Def(no_itin));
        db.set_field(pseudo, "hasNoSchedulingInfo", FieldValue::Bit(true));

        let target = TargetInstructions::new(&db, vec![pseudo], 0);
        let mut models = SchedModels::new();
        models.collect_proc_models(&db).unwrap();
        models.collect_sched_rw(&db, &target).unwrap();
        models.collect_sched_classes(&db, &target).unwrap();
        models.collect_proc_itins(&db).unwrap();
        models.collect_proc_itin_rw(&db).unwrap();
        models.collect_proc_unsupported_features(&db);
        models.infer_sched_classes(&db, &target).unwrap();
        models.collect_proc_resources(&db).unwrap();

        assert!(models.check_completeness(&db, &target).is_ok());
    }

    /// `Config::elaboration.enforce_completeness = false` downgrades the
    /// same missing-instruction case to a logged warning instead of a fatal
    /// error.
    #[test]
    fn enforce_completeness_false_downgrades_to_a_warning() {
        let mut db = base_db();
        let model_a = db.insert("ModelA".into(), vec!["SchedMachineModel".into()], SourceLoc::default());
        db.set_field(model_a, "CompleteModel", FieldValue::Bit(true));
        let no_itins = db.get_def("NoItineraries").unwrap();
        let no_itin = db.get_def("NoItinerary").unwrap();
        let p1 = db.insert("P1".into(), vec!["Processor".into()], SourceLoc::default());
        db.set_field(p1, "SchedModel", FieldValue::Def(model_a));
        db.set_field(p1, "ProcItin", FieldValue::Def(no_itins));

        let add = db.insert("ADD".into(), vec!["Instruction".into()], SourceLoc::default());
        db.set_field(add, "Itinerary", FieldValue::Def(no_itin));

        let target = TargetInstructions::new(&db, vec![add], 0);
        let mut models = SchedModels::with_config(&crate::config::ElaborationConfig {
            growth_factor: 6,
            verify_resource_groups: true,
            enforce_completeness: false,
        });
        models.collect_proc_models(&db).unwrap();
        models.collect_sched_rw(&db, &target).unwrap();
        models.collect_sched_classes(&db, &target).unwrap();
        models.collect_proc_itins(&db).unwrap();
        models.collect_proc_itin_rw(&db).unwrap();
        models.collect_proc_unsupported_features(&db);
        models.infer_sched_classes(&db, &target).unwrap();
        models.collect_proc_resources(&db).unwrap();

        assert!(models.check_completeness(&db, &target).is_ok());
    }
}
