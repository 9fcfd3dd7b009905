//! JSON loading for a [`RecordDatabase`](super::RecordDatabase).
//!
//! This is the convenience on-ramp named in `SPEC_FULL.md` 2.1: a target
//! description handed to the CLI as a single JSON document. It carries no
//! scheduling semantics of its own — it only resolves name references into
//! [`RecordId`]s and hands the engine a populated database.

use std::collections::HashMap;

use serde::Deserialize;

use super::{DagArg, DagExpr, FieldValue, RecordDatabase, SourceLoc};

#[derive(Debug, Deserialize)]
pub struct RawDatabase {
    pub records: Vec<RawRecord>,
}

#[derive(Debug, Deserialize)]
pub struct RawRecord {
    pub name: String,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub fields: HashMap<String, RawField>,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub line: u32,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RawField {
    Int(i64),
    Bit(bool),
    Str(String),
    /// References another record by name.
    Def(String),
    ListDefs(Vec<String>),
    Dag { operator: String, args: Vec<RawDagArg> },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RawDagArg {
    Def(String),
    Str(String),
    Int(i64),
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("{0}: references undefined record '{1}'")]
    UndefinedReference(String, String),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Load a [`RecordDatabase`] from a JSON document.
///
/// Resolution happens in two passes, since a record's fields may reference
/// records declared later in the same document: pass one inserts every
/// record with empty fields, fixing each name's [`RecordId`]; pass two
/// resolves every field's name references against the now-complete name
/// index and fills them in.
pub fn load(json: &str) -> Result<RecordDatabase, LoadError> {
    let raw: RawDatabase = serde_json::from_str(json)?;
    let mut db = RecordDatabase::new();

    for record in &raw.records {
        db.insert(
            record.name.clone(),
            record.classes.clone(),
            SourceLoc {
                file: record.file.clone(),
                line: record.line,
            },
        );
    }

    for record in &raw.records {
        let id = db
            .get_def(&record.name)
            .expect("just inserted in pass one");
        for (field_name, raw_value) in &record.fields {
            let value = resolve_field(&db, &record.name, raw_value)?;
            db.set_field(id, field_name.clone(), value);
        }
    }

    Ok(db)
}

fn resolve_field(
    db: &RecordDatabase,
    owner: &str,
    raw: &RawField,
) -> Result<FieldValue, LoadError> {
    use super::RecordDb;

    Ok(match raw {
        RawField::Int(v) => FieldValue::Int(*v),
        RawField::Bit(v) => FieldValue::Bit(*v),
        RawField::Str(v) => FieldValue::Str(v.clone()),
        RawField::Def(name) => FieldValue::Def(
            db.get_def(name)
                .ok_or_else(|| LoadError::UndefinedReference(owner.to_string(), name.clone()))?,
        ),
        RawField::ListDefs(names) => {
            let mut ids = Vec::with_capacity(names.len());
            for name in names {
                ids.push(
                    db.get_def(name).ok_or_else(|| {
                        LoadError::UndefinedReference(owner.to_string(), name.clone())
                    })?,
                );
            }
            FieldValue::ListDefs(ids)
        }
        RawField::Dag { operator, args } => {
            let mut resolved = Vec::with_capacity(args.len());
            for arg in args {
                resolved.push(match arg {
                    RawDagArg::Def(name) => DagArg::Def(db.get_def(name).ok_or_else(|| {
                        LoadError::UndefinedReference(owner.to_string(), name.clone())
                    })?),
                    RawDagArg::Str(s) => DagArg::Str(s.clone()),
                    RawDagArg::Int(i) => DagArg::Int(*i),
                });
            }
            FieldValue::Dag(DagExpr {
                operator: operator.clone(),
                args: resolved,
            })
        }
    })
}
