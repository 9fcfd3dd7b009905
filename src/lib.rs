//! # Scheduling-model elaborator
//!
//! Elaborates a declarative target-description database — processor
//! models, instructions, pipeline resources, and their read/write
//! semantics — into fully-expanded, predicate-guarded scheduling classes,
//! the way a compiler backend's scheduling infrastructure needs them.
//!
//! ## Pipeline
//!
//! ```text
//! RecordDatabase (target description)
//!     ↓
//! [collect_proc_models]        → one ProcModel per unique processor model
//!     ↓
//! [collect_sched_rw]           → the SchedWrite/SchedRead table, aliases resolved
//!     ↓
//! [collect_sched_classes]      → one SchedClass per instruction, InstRW folded in
//!     ↓
//! [collect_proc_itins / collect_proc_itin_rw / collect_proc_unsupported_features]
//!     ↓
//! [infer_sched_classes]        → breadth-first SchedVariant expansion (the core algorithm)
//!     ↓
//! [collect_proc_resources]     → per-processor ProcResource tables, WriteRes/ReadAdvance
//!     ↓
//! [check_completeness]         → every CompleteModel processor covers every instruction
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sched_elaborator::{SchedModels, record_db::loader, target::TargetInstructions};
//!
//! let db = loader::load(&json)?;
//! let target = TargetInstructions::new(&db, instructions, num_generic_opcodes);
//!
//! let mut models = SchedModels::new();
//! models.elaborate(&db, &target)?;
//!
//! for class in models.sched_classes() {
//!     println!("{}: {} writes, {} reads", class.name, class.writes.len(), class.reads.len());
//! }
//! ```
//!
//! ## Module organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `record_db` | Record database facade and JSON loader |
//! | `target` | Target instruction table metadata |
//! | `set_expander` | `instrs`/`instregex` set-expression evaluation |
//! | `sched` | Processor models, ReadWrite table, SchedClasses, variant engine, resources, completeness |
//! | `error` | `ElaborationError` and friends |
//! | `config` | Layered configuration (file + env) |

pub mod config;
pub mod error;
pub mod record_db;
pub mod sched;
pub mod set_expander;
pub mod target;

pub use error::{ElaborationError, Result};
pub use sched::{CodeGenSchedTransition, PredCheck, ProcModel, SchedClass, SchedModels, SchedRw};
