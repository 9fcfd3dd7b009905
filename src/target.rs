//! Target instruction metadata.
//!
//! The elaborator needs three things from "the instruction table": an
//! ordered list of instructions, the count of target-independent generic
//! opcodes that precede the real ones, and per-instruction scheduling flags.
//! This is the minimal slice of it — no operand encodings, no asm strings.

use crate::record_db::{RecordDb, RecordId};

/// Ordered instruction metadata for one target.
///
/// Instructions are kept in declaration order, matching
/// `getInstructionsByEnumValue()`: generic opcodes first, then real
/// target instructions sorted by the order they were `def`ed.
pub struct TargetInstructions {
    /// All instructions, generics included, in enum-value order.
    instructions: Vec<RecordId>,
    /// Number of generic (target-independent, e.g. COPY, PHI) opcodes at
    /// the front of `instructions`.
    pub num_generic_opcodes: usize,
    /// Same instructions excluding generics, sorted by record name for
    /// binary search during `instregex` prefix matching.
    non_generic_sorted: Vec<RecordId>,
}

impl TargetInstructions {
    pub fn new(db: &impl RecordDb, instructions: Vec<RecordId>, num_generic_opcodes: usize) -> Self {
        let mut non_generic_sorted: Vec<RecordId> =
            instructions[num_generic_opcodes.min(instructions.len())..].to_vec();
        non_generic_sorted.sort_by(|a, b| db.name_of(*a).cmp(db.name_of(*b)));
        TargetInstructions {
            instructions,
            num_generic_opcodes,
            non_generic_sorted,
        }
    }

    pub fn all(&self) -> &[RecordId] {
        &self.instructions
    }

    /// The generic-opcode slice, scanned linearly by `instregex` rather than
    /// binary-searched. Matches the original's `0..=NumGenericOpcodes`
    /// range: one entry past the nominal generic count is included, since
    /// the original's sentinel opcode (`INSTRUCTION_LIST_END`) lives there.
    pub fn generics(&self) -> &[RecordId] {
        let end = (self.num_generic_opcodes + 1).min(self.instructions.len());
        &self.instructions[..end]
    }

    /// Non-generic instructions sorted by name, for prefix binary search.
    pub fn non_generic_sorted(&self) -> &[RecordId] {
        &self.non_generic_sorted
    }

    /// Mirrors `Inst->hasNoSchedulingInfo`: an instruction explicitly marked
    /// `hasNoSchedulingInfo = 1` (typically a pseudo instruction) is exempt
    /// from completeness checking regardless of whether `SchedRW` happens to
    /// be set. This is a distinct signal from an unset `SchedRW` field — the
    /// latter is a modeling gap the completeness checker must still catch.
    pub fn has_no_scheduling_info(&self, db: &impl RecordDb, inst: RecordId) -> bool {
        db.field_bit(inst, "hasNoSchedulingInfo")
    }

    pub fn predicates(&self, db: &impl RecordDb, inst: RecordId) -> Vec<RecordId> {
        db.field_list_defs(inst, "Predicates")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_db::{RecordDatabase, SourceLoc};

    fn db_with(names: &[&str]) -> (RecordDatabase, Vec<RecordId>) {
        let mut db = RecordDatabase::new();
        let mut ids = Vec::new();
        for name in names {
            ids.push(db.insert((*name).into(), vec!["Instruction".into()], SourceLoc::default()));
        }
        (db, ids)
    }

    #[test]
    fn generics_includes_one_sentinel_past_the_count() {
        let (db, ids) = db_with(&["G0", "G1", "RealA", "RealB"]);
        let target = TargetInstructions::new(&db, ids, 2);
        assert_eq!(target.generics().len(), 3);
        assert_eq!(target.non_generic_sorted().len(), 2);
    }
}
