//! dynatask: test a model against its task I/O contract.
//!
//! Loads a task schema, generates synthetic examples for it, and drives the
//! reference oracle model through them, verifying every response.
//!
//! Usage:
//!   cargo run -p dynatask-cli -- test --task nli
//!   cargo run -p dynatask-cli -- test --task hs --batch --fault extra-field
//!   cargo run -p dynatask-cli -- test --name my-model --root ./my-model
//!   cargo run -p dynatask-cli -- sample-output --task qa
//!   cargo run -p dynatask-cli -- scenario tampered
//!   cargo run -p dynatask-cli -- validate-setup --name my-model
//!   cargo run -p dynatask-cli -- run-all

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use dynatask_config::{SchemaLoader, SetupConfig, ToolkitConfig};
use dynatask_contracts::{
    error::{TaskIoError, TaskIoResult},
    schema::TaskSchema,
};
use dynatask_core::{lifecycle::ServingContext, TestMode};
use dynatask_ref_models::{
    bundled_schema,
    scenarios::{self, batched, individual, tampered},
    Fault, Harness,
};
use dynatask_registry::{MockDataGenerator, TypeRegistry};

// ── CLI definition ────────────────────────────────────────────────────────────

/// dynatask: task I/O contract harness.
#[derive(Parser)]
#[command(
    name = "dynatask",
    about = "Test models against their task I/O contract",
    long_about = "Generates synthetic examples from a task schema, sends them to a model\n\
                  entry point one at a time or batched, and verifies every response\n\
                  for shape, field validity and signature."
)]
struct Cli {
    /// Toolkit configuration (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Test the oracle model against one task.
    Test {
        /// Task code, e.g. `nli`. Defaults to the setup config's task.
        #[arg(long, required_unless_present = "name")]
        task: Option<String>,
        /// Model whose setup config supplies the serving context.
        #[arg(long)]
        name: Option<String>,
        /// Model root directory holding `.dynalab/<name>/setup_config.json`.
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Explicit schema artifact. Overrides the search directories.
        #[arg(long)]
        schema: Option<PathBuf>,
        /// Send every example in a single newline-delimited request.
        #[arg(long)]
        batch: bool,
        /// Defect to inject into the oracle's responses.
        #[arg(long, value_enum, default_value_t = FaultArg::None)]
        fault: FaultArg,
        /// Print the full report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the mandatory and optional outputs of a task, with an example.
    SampleOutput {
        #[arg(long)]
        task: String,
        #[arg(long)]
        schema: Option<PathBuf>,
    },
    /// Run one reference scenario.
    Scenario {
        #[arg(value_enum)]
        which: ScenarioArg,
    },
    /// Check a model's setup config.
    ValidateSetup {
        /// Model name the config is stored under.
        #[arg(long)]
        name: String,
        /// Model root directory.
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Run every reference scenario in sequence.
    RunAll,
}

#[derive(Clone, Copy, ValueEnum)]
enum FaultArg {
    None,
    DropTarget,
    ExtraField,
    TamperSignature,
}

impl From<FaultArg> for Fault {
    fn from(arg: FaultArg) -> Self {
        match arg {
            FaultArg::None => Fault::None,
            FaultArg::DropTarget => Fault::DropTarget,
            FaultArg::ExtraField => Fault::ExtraField,
            FaultArg::TamperSignature => Fault::TamperSignature,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ScenarioArg {
    Individual,
    Batched,
    Tampered,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Command::Test {
            task,
            name,
            root,
            schema,
            batch,
            fault,
            json,
        } => {
            let target = TestTarget {
                task,
                name,
                root,
                schema,
            };
            run_test(&config, target, batch, fault.into(), json)
        }
        Command::SampleOutput { task, schema } => {
            print_sample_output(&config, &task, schema.as_deref())
        }
        Command::Scenario { which } => {
            print_banner();
            match which {
                ScenarioArg::Individual => individual::run_scenario(&config),
                ScenarioArg::Batched => batched::run_scenario(&config),
                ScenarioArg::Tampered => tampered::run_scenario(&config),
            }
        }
        Command::ValidateSetup { name, root } => validate_setup(&name, &root),
        Command::RunAll => {
            print_banner();
            scenarios::run_all(&config)
        }
    });

    if let Err(e) = result {
        eprintln!("dynatask error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> TaskIoResult<ToolkitConfig> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "loading toolkit config");
            ToolkitConfig::from_file(path)
        }
        None => Ok(ToolkitConfig::default()),
    }
}

/// Resolve a schema: explicit path first, then the search directories, then
/// the bundled tasks.
fn resolve_schema(
    config: &ToolkitConfig,
    task: &str,
    explicit: Option<&Path>,
) -> TaskIoResult<TaskSchema> {
    if let Some(path) = explicit {
        return SchemaLoader::load_path_for(task, path);
    }
    match SchemaLoader::from_config(config).load(task) {
        Err(TaskIoError::SchemaNotFound { searched, .. }) => {
            info!(task = %task, searched = searched.len(), "no schema on disk, using bundled task");
            bundled_schema(task)
        }
        other => other,
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// What `dynatask test` runs against.
struct TestTarget {
    task: Option<String>,
    name: Option<String>,
    root: PathBuf,
    schema: Option<PathBuf>,
}

impl TestTarget {
    /// The task code, and the serving context when a setup config is named.
    fn resolve(&self) -> TaskIoResult<(String, Option<ServingContext>)> {
        let Some(name) = &self.name else {
            let task = self.task.clone().ok_or_else(|| TaskIoError::ConfigError {
                reason: "either --task or --name is required".to_string(),
            })?;
            return Ok((task, None));
        };

        let setup = SetupConfig::load(&self.root, name)?.validate(&self.root)?;
        let task = match &self.task {
            Some(task) if *task != setup.task => {
                return Err(TaskIoError::ConfigError {
                    reason: format!(
                        "--task '{task}' does not match '{}' in the setup config for '{name}'",
                        setup.task
                    ),
                })
            }
            _ => setup.task.clone(),
        };
        let context = setup.serving_context(&self.root, name);
        info!(
            model = %name,
            model_dir = %context.model_dir.display(),
            "using serving context from setup config"
        );
        Ok((task, Some(context)))
    }
}

fn run_test(
    config: &ToolkitConfig,
    target: TestTarget,
    batch: bool,
    fault: Fault,
    json: bool,
) -> TaskIoResult<()> {
    let (task, context) = target.resolve()?;
    let schema = resolve_schema(config, &task, target.schema.as_deref())?;
    let mode = if batch {
        TestMode::Batched
    } else {
        TestMode::Individual
    };

    let mut harness = Harness::from_schema(schema, config)?;
    if let Some(context) = context {
        harness = harness.with_context(context);
    }
    let report = harness.run_oracle(fault, mode)?;

    if json {
        let rendered =
            serde_json::to_string_pretty(&report).map_err(|e| TaskIoError::Serialization {
                reason: e.to_string(),
            })?;
        println!("{rendered}");
    } else {
        let elapsed = report.finished_at - report.started_at;
        println!(
            "{}: {} example(s) passed ({:?}, {} ms)",
            report.task,
            report.passed(),
            report.mode,
            elapsed.num_milliseconds()
        );
    }
    Ok(())
}

fn print_sample_output(
    config: &ToolkitConfig,
    task: &str,
    schema: Option<&Path>,
) -> TaskIoResult<()> {
    let schema = resolve_schema(config, task, schema)?;
    let registry = TypeRegistry::builtin();
    let mut generator = match config.pool_seed {
        Some(seed) => MockDataGenerator::with_seed(&schema, &registry, seed),
        None => MockDataGenerator::new(&schema, &registry),
    };
    let sample = generator.sample_output()?;

    let rendered = serde_json::to_string_pretty(&sample).map_err(|e| TaskIoError::Serialization {
        reason: e.to_string(),
    })?;
    println!("{rendered}");
    Ok(())
}

fn validate_setup(name: &str, root: &Path) -> TaskIoResult<()> {
    let config = SetupConfig::load(root, name)?;
    let normalized = config.validate(root)?;

    println!("Setup config for '{name}' is valid.");
    println!("  task        {}", normalized.task);
    println!("  checkpoint  {}", normalized.checkpoint);
    println!("  handler     {}", normalized.handler);
    for file in &normalized.model_files {
        println!("  model file  {file}");
    }
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

/// The run pipeline, in the order the harness executes it.
const PIPELINE_STEPS: [&str; 5] = [
    "Mock data generator fills every input and context field from per-type pools",
    "Examples reach the model entry point singly or as one batch",
    "Each reply is decoded and checked against the response envelope and uid",
    "Signature recomputed from the shared secret and compared",
    "Every target present, no undeclared field, every value valid",
];

fn print_banner() {
    println!();
    println!("dynatask: Task I/O Contract Harness");
    println!("==================================");
    println!();
    println!("Pipeline per run:");
    for (i, step) in PIPELINE_STEPS.iter().enumerate() {
        println!("  [{}] {step}", i + 1);
    }
    println!();
}
