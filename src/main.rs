//! `sched-elaborate`: load a JSON target description, elaborate its
//! scheduling model, and print the elaborated tables as JSON.

use std::fs;
use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;

use sched_elaborator::config::Config;
use sched_elaborator::record_db::loader;
use sched_elaborator::record_db::{RecordDb, RecordId};
use sched_elaborator::target::TargetInstructions;
use sched_elaborator::SchedModels;

/// Elaborate a target description's scheduling model.
#[derive(Debug, Parser)]
#[command(name = "sched-elaborate", version, about)]
struct Args {
    /// Path to the JSON record database (see `record_db::loader`).
    record_db: PathBuf,

    /// Path to a JSON array of instruction record names, in enum-value
    /// order (generic opcodes first).
    #[arg(long)]
    instructions: PathBuf,

    /// Number of target-independent generic opcodes at the front of
    /// `--instructions`.
    #[arg(long, default_value_t = 0)]
    num_generic_opcodes: usize,

    /// Write elaborated tables here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Path to a config.toml to load instead of the default search path.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Serialize)]
struct ElaboratedOutput {
    proc_models: Vec<ProcModelOut>,
    sched_classes: Vec<SchedClassOut>,
    instr_class_map: Vec<(String, usize)>,
}

#[derive(Serialize)]
struct ProcModelOut {
    name: String,
    write_res_count: usize,
    read_advance_count: usize,
    proc_resource_count: usize,
}

#[derive(Serialize)]
struct SchedClassOut {
    name: String,
    writes: usize,
    reads: usize,
    proc_indices: Vec<usize>,
    transitions: usize,
}

fn run() -> sched_elaborator::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path.to_str().expect("config path must be valid UTF-8")),
        None => Config::load(),
    }
    .unwrap_or_default();

    init_tracing(&config);

    let json = fs::read_to_string(&args.record_db).unwrap_or_else(|e| {
        panic!("failed to read record database '{}': {e}", args.record_db.display())
    });
    let db = loader::load(&json).unwrap_or_else(|e| panic!("failed to load record database: {e}"));

    let inst_names_json = fs::read_to_string(&args.instructions)
        .unwrap_or_else(|e| panic!("failed to read instruction list '{}': {e}", args.instructions.display()));
    let inst_names: Vec<String> =
        serde_json::from_str(&inst_names_json).unwrap_or_else(|e| panic!("failed to parse instruction list: {e}"));
    let instructions: Vec<RecordId> = inst_names
        .iter()
        .map(|name| db.get_def(name).unwrap_or_else(|| panic!("unknown instruction '{name}'")))
        .collect();

    let target = TargetInstructions::new(&db, instructions, args.num_generic_opcodes);

    let mut models = SchedModels::with_config(&config.elaboration);
    models.elaborate(&db, &target)?;

    let output = ElaboratedOutput {
        proc_models: models
            .proc_models()
            .iter()
            .map(|pm| ProcModelOut {
                name: pm.name.clone(),
                write_res_count: pm.write_res_defs.len(),
                read_advance_count: pm.read_advance_defs.len(),
                proc_resource_count: pm.proc_resource_defs.len(),
            })
            .collect(),
        sched_classes: models
            .sched_classes()
            .iter()
            .map(|sc| SchedClassOut {
                name: sc.name.clone(),
                writes: sc.writes.len(),
                reads: sc.reads.len(),
                proc_indices: sc.proc_indices.clone(),
                transitions: sc.transitions.len(),
            })
            .collect(),
        instr_class_map: models
            .instr_class_map()
            .iter()
            .map(|(&inst, &sc_idx)| (db.name_of(inst).to_string(), sc_idx))
            .collect(),
    };

    let rendered = serde_json::to_string_pretty(&output).expect("output model serializes");
    match &args.out {
        Some(path) => fs::write(path, rendered).unwrap_or_else(|e| panic!("failed to write '{}': {e}", path.display())),
        None => {
            let mut stdout = std::io::stdout();
            writeln!(stdout, "{rendered}").expect("stdout is writable");
        }
    }
    Ok(())
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("sched-elaborate: {e}");
            ExitCode::FAILURE
        }
    }
}
