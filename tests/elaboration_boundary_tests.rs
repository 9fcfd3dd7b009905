//! Integration tests for the seed boundary scenarios (spec.md §8).
//!
//! Each test builds a minimal in-memory target description through the
//! public `RecordDatabase` API, runs the full `SchedModels::elaborate`
//! pipeline, and checks the elaborated tables match the scenario's
//! expectation. These exercise the crate end to end the way a real target
//! description would, rather than poking at individual phases.

use sched_elaborator::error::ElaborationError;
use sched_elaborator::record_db::{DagArg, DagExpr, FieldValue, RecordDatabase, RecordDb, SourceLoc};
use sched_elaborator::target::TargetInstructions;
use sched_elaborator::SchedModels;

fn base_db() -> RecordDatabase {
    let mut db = RecordDatabase::new();
    db.insert("NoSchedModel".into(), vec!["SchedMachineModel".into()], SourceLoc::default());
    db.insert("NoItineraries".into(), vec!["ProcessorItineraries".into()], SourceLoc::default());
    db.insert("NoItinerary".into(), vec!["InstrItinClass".into()], SourceLoc::default());
    db
}

/// Scenario 1: an empty target description elaborates to just the
/// synthetic sentinels, with no errors.
#[test]
fn empty_target_yields_only_sentinels() {
    let db = base_db();
    let target = TargetInstructions::new(&db, vec![], 0);
    let mut models = SchedModels::new();
    models.elaborate(&db, &target).expect("empty target elaborates cleanly");

    assert_eq!(models.proc_models().len(), 1);
    assert_eq!(models.proc_models()[0].name, "NoSchedModel");
    assert_eq!(models.sched_writes().len(), 1);
    assert_eq!(models.sched_reads().len(), 1);
    assert_eq!(models.sched_classes().len(), 1);
    assert_eq!(models.sched_classes()[0].name, "NoInstrModel");
}

/// Scenario 2: a single instruction with one trivial write gets its own
/// SchedClass, applicable to all processors.
#[test]
fn single_instruction_trivial_write() {
    let mut db = base_db();
    let p1_model = db.insert("P1Model".into(), vec!["SchedMachineModel".into()], SourceLoc::default());
    let no_itins = db.get_def("NoItineraries").unwrap();
    let p1 = db.insert("P1".into(), vec!["Processor".into()], SourceLoc::default());
    db.set_field(p1, "SchedModel", FieldValue::Def(p1_model));
    db.set_field(p1, "ProcItin", FieldValue::Def(no_itins));

    let w1 = db.insert("W1".into(), vec!["SchedWrite".into()], SourceLoc::default());
    let no_itin = db.get_def("NoItinerary").unwrap();
    let add = db.insert("ADD".into(), vec!["Instruction".into()], SourceLoc::default());
    db.set_field(add, "SchedRW", FieldValue::ListDefs(vec![w1]));
    db.set_field(add, "Itinerary", FieldValue::Def(no_itin));

    let target = TargetInstructions::new(&db, vec![add], 0);
    let mut models = SchedModels::new();
    models.elaborate(&db, &target).expect("elaborates");

    let sc_idx = *models.instr_class_map().get(&add).expect("ADD has a class");
    let sc = &models.sched_classes()[sc_idx];
    assert_eq!(sc.writes.len(), 1);
    assert!(sc.reads.is_empty());
    assert_eq!(sc.proc_indices, vec![0]);
}

/// Scenario 3: an `InstRW` override on a partial subset forks a new class
/// that inherits itinerary/writes/reads from the original and carries the
/// override.
#[test]
fn inst_rw_partial_subset_forks_a_new_class() {
    let mut db = base_db();
    let p1_model = db.insert("P1Model".into(), vec!["SchedMachineModel".into()], SourceLoc::default());
    let no_itins = db.get_def("NoItineraries").unwrap();
    let p1 = db.insert("P1".into(), vec!["Processor".into()], SourceLoc::default());
    db.set_field(p1, "SchedModel", FieldValue::Def(p1_model));
    db.set_field(p1, "ProcItin", FieldValue::Def(no_itins));

    let w1 = db.insert("W1".into(), vec!["SchedWrite".into()], SourceLoc::default());
    let w2 = db.insert("W2".into(), vec!["SchedWrite".into()], SourceLoc::default());
    let no_itin = db.get_def("NoItinerary").unwrap();
    let add = db.insert("ADD".into(), vec!["Instruction".into()], SourceLoc::default());
    db.set_field(add, "SchedRW", FieldValue::ListDefs(vec![w1]));
    db.set_field(add, "Itinerary", FieldValue::Def(no_itin));

    let inst_rw = db.insert("ADDOnP1".into(), vec!["InstRW".into()], SourceLoc::default());
    db.set_field(inst_rw, "SchedModel", FieldValue::Def(p1_model));
    db.set_field(inst_rw, "OperandReadWrites", FieldValue::ListDefs(vec![w2]));
    db.set_field(
        inst_rw,
        "Instrs",
        FieldValue::Dag(DagExpr {
            operator: "instrs".into(),
            args: vec![DagArg::Def(add)],
        }),
    );

    let target = TargetInstructions::new(&db, vec![add], 0);
    let mut models = SchedModels::new();
    models.elaborate(&db, &target).expect("elaborates");

    let original_class = 1; // the first class allocated, before InstRW folding
    let new_class = *models.instr_class_map().get(&add).expect("ADD has a class");
    assert_ne!(new_class, original_class, "InstRW override must remap ADD to a new class");
    assert_eq!(models.sched_classes()[new_class].inst_rws.len(), 1);
    assert_eq!(models.sched_classes()[new_class].reads, models.sched_classes()[original_class].reads);
}

/// Scenario 6: `instregex` prefix search finds exactly the matching
/// instructions, and a pattern with no matches is fatal.
#[test]
fn instregex_prefix_search_and_no_matches_error() {
    let mut db = base_db();
    // A leading generic opcode plus the one-past sentinel entry that
    // TargetInstructions::generics() always includes (matching the
    // original's INSTRUCTION_LIST_END slot); its name must not collide
    // with the pattern under test or it would be double-counted, once as
    // a "generic" scan hit and once via the sorted non-generic slice.
    let copy_generic = db.insert("COPY".into(), vec!["Instruction".into()], SourceLoc::default());
    let inst_list_end = db.insert("INSTRUCTION_LIST_END".into(), vec!["Instruction".into()], SourceLoc::default());
    let addi = db.insert("ADDi".into(), vec!["Instruction".into()], SourceLoc::default());
    let addr = db.insert("ADDr".into(), vec!["Instruction".into()], SourceLoc::default());
    let sub = db.insert("SUB".into(), vec!["Instruction".into()], SourceLoc::default());
    let no_itin = db.get_def("NoItinerary").unwrap();
    for inst in [copy_generic, inst_list_end, addi, addr, sub] {
        db.set_field(inst, "Itinerary", FieldValue::Def(no_itin));
    }

    let target = TargetInstructions::new(&db, vec![copy_generic, inst_list_end, addi, addr, sub], 1);

    let good = DagExpr {
        operator: "instregex".into(),
        args: vec![DagArg::Str("ADD.*".into())],
    };
    let matches = sched_elaborator::set_expander::SetExpander::expand(&db, &target, &good, &SourceLoc::default()).expect("ADD.* matches");
    assert_eq!(matches.len(), 2);
    assert!(matches.contains(&addi));
    assert!(matches.contains(&addr));

    let bad = DagExpr {
        operator: "instregex".into(),
        args: vec![DagArg::Str("XY".into())],
    };
    let err = sched_elaborator::set_expander::SetExpander::expand(&db, &target, &bad, &SourceLoc::default()).unwrap_err();
    assert!(matches!(err, ElaborationError::InstRegexNoMatches { .. }));
}

/// A `CompleteModel` processor missing scheduling info for one instruction
/// is a fatal, accumulated error (spec.md §4.6/§7).
#[test]
fn complete_model_missing_instruction_is_fatal_end_to_end() {
    let mut db = base_db();
    let model_a = db.insert("ModelA".into(), vec!["SchedMachineModel".into()], SourceLoc::default());
    db.set_field(model_a, "CompleteModel", FieldValue::Bit(true));
    let no_itins = db.get_def("NoItineraries").unwrap();
    let p1 = db.insert("P1".into(), vec!["Processor".into()], SourceLoc::default());
    db.set_field(p1, "SchedModel", FieldValue::Def(model_a));
    db.set_field(p1, "ProcItin", FieldValue::Def(no_itins));

    let no_itin = db.get_def("NoItinerary").unwrap();
    let add = db.insert("ADD".into(), vec!["Instruction".into()], SourceLoc::default());
    db.set_field(add, "Itinerary", FieldValue::Def(no_itin));

    let target = TargetInstructions::new(&db, vec![add], 0);
    let mut models = SchedModels::new();
    let err = models.elaborate(&db, &target).unwrap_err();
    assert!(matches!(err, ElaborationError::IncompleteModel(_)));
}
