//! Record database facade.
//!
//! The elaborator treats the target-description database as a read-only
//! store of named, typed records (spec.md section 1: "The record database
//! itself ... is consumed through a narrow lookup interface"). [`RecordDb`]
//! is that interface; [`RecordDatabase`] is a concrete, in-memory
//! implementation good enough to drive the engine end to end from a JSON
//! file (see [`loader`]).

pub mod loader;

use std::collections::HashMap;
use std::fmt;

/// Stable handle to a record. Indexes into a [`RecordDatabase`]'s arena;
/// never invalidated because the arena is append-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(pub u32);

/// Source location of a record, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct SourceLoc {
    pub file: String,
    pub line: u32,
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// An operand to a DAG field (e.g. `(instrs A, B)` or `(instregex "Add.*")`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DagArg {
    Def(RecordId),
    Str(String),
    Int(i64),
}

/// A DAG-valued field: `(operator arg1, arg2, ...)`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DagExpr {
    pub operator: String,
    pub args: Vec<DagArg>,
}

/// The value of one field on a record. `Unset` models tablegen's "bits are
/// uninitialized" / "value not assigned" state, distinct from an empty list
/// or a zero int.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Bit(bool),
    Str(String),
    Def(RecordId),
    ListDefs(Vec<RecordId>),
    Dag(DagExpr),
    Unset,
}

/// A single record: a named object with a superclass chain and typed
/// fields, as read from the target description.
#[derive(Debug, Clone)]
pub struct Record {
    pub id: RecordId,
    pub name: String,
    /// The full "derives from" chain (spec.md calls this the record's
    /// "derived-class" identity). Includes indirect superclasses.
    pub classes: Vec<String>,
    pub fields: HashMap<String, FieldValue>,
    pub loc: SourceLoc,
}

impl Record {
    pub fn is_subclass_of(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// Read-only queries the elaborator needs from the target description.
/// Deliberately narrow: only the operations spec.md section 6 names.
pub trait RecordDb {
    /// All records (in database declaration order) whose `classes` include
    /// `class`.
    fn all_derived_definitions(&self, class: &str) -> Vec<RecordId>;

    /// Look up a record by exact name.
    fn get_def(&self, name: &str) -> Option<RecordId>;

    fn record(&self, id: RecordId) -> &Record;

    fn name_of(&self, id: RecordId) -> &str {
        &self.record(id).name
    }

    fn loc_of(&self, id: RecordId) -> SourceLoc {
        self.record(id).loc.clone()
    }

    fn is_subclass_of(&self, id: RecordId, class: &str) -> bool {
        self.record(id).is_subclass_of(class)
    }

    fn field(&self, id: RecordId, field: &str) -> &FieldValue {
        self.record(id)
            .fields
            .get(field)
            .unwrap_or(&FieldValue::Unset)
    }

    fn field_is_complete(&self, id: RecordId, field: &str) -> bool {
        !matches!(self.field(id, field), FieldValue::Unset)
    }

    fn field_int(&self, id: RecordId, field: &str) -> Option<i64> {
        match self.field(id, field) {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Bits default to `false` when unset, matching tablegen's `bit`
    /// default-initialization behavior for fields like `CompleteModel`.
    fn field_bit(&self, id: RecordId, field: &str) -> bool {
        matches!(self.field(id, field), FieldValue::Bit(true))
    }

    fn field_str(&self, id: RecordId, field: &str) -> Option<&str> {
        match self.field(id, field) {
            FieldValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    fn field_def(&self, id: RecordId, field: &str) -> Option<RecordId> {
        match self.field(id, field) {
            FieldValue::Def(d) => Some(*d),
            _ => None,
        }
    }

    fn field_list_defs(&self, id: RecordId, field: &str) -> Vec<RecordId> {
        match self.field(id, field) {
            FieldValue::ListDefs(v) => v.clone(),
            _ => Vec::new(),
        }
    }

    fn field_dag(&self, id: RecordId, field: &str) -> Option<&DagExpr> {
        match self.field(id, field) {
            FieldValue::Dag(d) => Some(d),
            _ => None,
        }
    }
}

/// A simple in-memory, append-only arena of records with a class index
/// precomputed at construction time.
#[derive(Debug, Default)]
pub struct RecordDatabase {
    records: Vec<Record>,
    by_name: HashMap<String, RecordId>,
    by_class: HashMap<String, Vec<RecordId>>,
}

impl RecordDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning its freshly assigned id. The caller is
    /// responsible for resolving any `Def`/`ListDefs`/`Dag` references
    /// before or after insertion since ids are assigned sequentially.
    pub fn insert(&mut self, name: String, classes: Vec<String>, loc: SourceLoc) -> RecordId {
        let id = RecordId(self.records.len() as u32);
        for class in classes.iter().cloned().chain(std::iter::once(name.clone())) {
            self.by_class.entry(class).or_default().push(id);
        }
        self.by_name.insert(name.clone(), id);
        self.records.push(Record {
            id,
            name,
            classes,
            fields: HashMap::new(),
            loc,
        });
        id
    }

    pub fn set_field(&mut self, id: RecordId, field: impl Into<String>, value: FieldValue) {
        self.records[id.0 as usize].fields.insert(field.into(), value);
    }
}

impl RecordDb for RecordDatabase {
    fn all_derived_definitions(&self, class: &str) -> Vec<RecordId> {
        self.by_class.get(class).cloned().unwrap_or_default()
    }

    fn get_def(&self, name: &str) -> Option<RecordId> {
        self.by_name.get(name).copied()
    }

    fn record(&self, id: RecordId) -> &Record {
        &self.records[id.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_lookup_by_class() {
        let mut db = RecordDatabase::new();
        let loc = SourceLoc::default();
        let p1 = db.insert("P1".into(), vec!["Processor".into()], loc.clone());
        let _p2 = db.insert("P2".into(), vec!["Processor".into()], loc);

        let procs = db.all_derived_definitions("Processor");
        assert_eq!(procs.len(), 2);
        assert!(procs.contains(&p1));
    }

    #[test]
    fn field_defaults() {
        let mut db = RecordDatabase::new();
        let loc = SourceLoc::default();
        let id = db.insert("M".into(), vec!["SchedMachineModel".into()], loc);
        assert!(!db.field_bit(id, "CompleteModel"));
        assert!(!db.field_is_complete(id, "Itineraries"));
        db.set_field(id, "CompleteModel", FieldValue::Bit(true));
        assert!(db.field_bit(id, "CompleteModel"));
    }
}
