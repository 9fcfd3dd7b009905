//! Error types for the scheduling-model elaborator.
//!
//! Every elaboration phase returns `Result<_, ElaborationError>`. There is no
//! recovery mid-phase: a fatal error aborts elaboration and no partial
//! tables are surfaced to the caller (mirrors the source's
//! `PrintFatalError` unwind, replaced here with typed results per the
//! project's error-handling convention).

use crate::record_db::SourceLoc;
use thiserror::Error;

/// All ways elaboration can fail.
///
/// Variants are grouped to match the error categories named in the
/// specification: shape, reference, ambiguity, coverage, and collision
/// errors.
#[derive(Debug, Error)]
pub enum ElaborationError {
    // --- Shape errors ---
    #[error("{loc}: instregex requires a pattern string, got {got}")]
    InstRegexNotAString { loc: SourceLoc, got: String },

    #[error("{loc}: unknown set-expression operator '{operator}'")]
    UnknownSetOperator { loc: SourceLoc, operator: String },

    #[error("{loc}: SchedAlias kind mismatch: '{match_name}' is a {match_kind} but '{alias_name}' is not")]
    SchedAliasKindMismatch {
        loc: SourceLoc,
        match_name: String,
        match_kind: &'static str,
        alias_name: String,
    },

    #[error("{loc}: {field} is undefined")]
    UndefinedField { loc: SourceLoc, field: String },

    // --- Reference errors ---
    #[error("{loc}: undefined SchedMachineModel '{name}'")]
    UndefinedSchedModel { loc: SourceLoc, name: String },

    #[error("{loc}: cannot alias an alias ('{name}')")]
    AliasOfAlias { loc: SourceLoc, name: String },

    #[error("{loc}: no sched class for instruction '{name}'")]
    NoSchedClassForInstruction { loc: SourceLoc, name: String },

    // --- Ambiguity errors ---
    #[error("{loc}: multiple variants/aliases defined for processor '{processor}'; ensure only one SchedAlias exists per read/write")]
    MultipleVariantsForProcessor { loc: SourceLoc, processor: String },

    #[error("{loc}: duplicate itinerary class '{itin_class}' in ItinRW for processor '{processor}'")]
    DuplicateItinRwMatch {
        loc: SourceLoc,
        itin_class: String,
        processor: String,
    },

    #[error("{loc}: processor resource group overlaps with '{other}' but no supergroup contains both")]
    ResourceGroupOverlapNoSupergroup { loc: SourceLoc, other: String },

    #[error("{loc}: multiple ProcessorResourceUnits associated with '{kind}' on processor '{processor}'")]
    MultipleResourceUnitsForKind {
        loc: SourceLoc,
        kind: String,
        processor: String,
    },

    #[error("{loc}: no variant of this read/write has a matching predicate on any processor")]
    NoMatchingVariant { loc: SourceLoc },

    #[error("{loc}: no ProcessorResources associated with '{kind}'")]
    NoResourceUnitsForKind { loc: SourceLoc, kind: String },

    // --- Coverage errors ---
    #[error("{loc}: instregex pattern '{pattern}' has no matches")]
    InstRegexNoMatches { loc: SourceLoc, pattern: String },

    /// Accumulated non-fatal completeness errors, reported together as one
    /// fatal summary once collection finishes (spec.md 4.6/7: a single
    /// missing entry is non-fatal, but any error at all is fatal overall).
    #[error("incomplete schedule model:\n{0}")]
    IncompleteModel(String),

    // --- Collision errors ---
    #[error("{loc}: overlapping InstRW def: instruction '{inst}' also matches '{other_instrs}'")]
    OverlappingInstRw {
        loc: SourceLoc,
        inst: String,
        other_instrs: String,
    },

    // --- Internal invariant violations (should never happen on valid input) ---
    #[error("{loc}: internal invariant violated: {message}")]
    Internal { loc: SourceLoc, message: String },

    #[error("too many SchedVariants: SchedClasses grew past {limit} (= {growth_factor} x {base} original instruction sched classes)")]
    VariantGrowthLimitExceeded {
        limit: usize,
        growth_factor: usize,
        base: usize,
    },
}

pub type Result<T> = std::result::Result<T, ElaborationError>;
