use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use grid_admission::{default_workload, validate_create, validate_update, Admissible};
use grid_core::{hash_workload, GridCluster, GridJob, SystemClock, Workload};
use grid_status::{PrincipalObservation, WorkloadStatus};
use grid_synth::{plan, ChangeAction};
use k8s_openapi::api::apps::v1::StatefulSetStatus;
use k8s_openapi::api::batch::v1::JobStatus;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "gridctl", version, about = "Grid CLI (M1)")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Workload manifest (YAML or JSON); kind GridCluster or GridJob
    #[arg(short = 'f', long = "file", global = true)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the child resources synthesized for the workload
    Render,
    /// Print the spec fingerprint
    Hash {
        /// Collision salt mixed into the digest
        #[arg(long = "salt")]
        salt: Option<i32>,
    },
    /// Apply admission defaults and print the result
    Default,
    /// Run admission validation as a create, or as an update from --previous
    Validate {
        #[arg(long = "previous")]
        previous: Option<PathBuf>,
    },
    /// Fold an observed StatefulSet/Job status into the workload status
    Status {
        /// Principal status document
        #[arg(long = "observed")]
        observed: Option<PathBuf>,
        /// Previously recorded workload status
        #[arg(long = "status")]
        status: Option<PathBuf>,
    },
    /// Show what applying the workload would change relative to --previous
    Diff {
        #[arg(long = "previous")]
        previous: PathBuf,
    },
}

fn init_tracing() {
    let env = std::env::var("GRID_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn read_doc<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn print<T: Serialize>(output: Output, value: &T) -> Result<()> {
    match output {
        Output::Human => print!("{}", serde_yaml::to_string(value)?),
        Output::Json => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

/// Kind-specific plumbing for the commands.
trait Manifest: Admissible + Serialize + DeserializeOwned {
    fn observation(doc: serde_yaml::Value) -> Result<PrincipalObservation>;
}

impl Manifest for GridCluster {
    fn observation(doc: serde_yaml::Value) -> Result<PrincipalObservation> {
        Ok(PrincipalObservation::StatefulSet(serde_yaml::from_value::<StatefulSetStatus>(doc)?))
    }
}

impl Manifest for GridJob {
    fn observation(doc: serde_yaml::Value) -> Result<PrincipalObservation> {
        Ok(PrincipalObservation::Job(serde_yaml::from_value::<JobStatus>(doc)?))
    }
}

fn run<W: Manifest>(cli: &Cli, doc: serde_yaml::Value) -> Result<()> {
    let mut w: W = serde_yaml::from_value(doc).with_context(|| format!("decoding {}", W::KIND))?;
    debug!(kind = W::KIND, workload = %w.name(), "manifest loaded");

    match &cli.command {
        Commands::Render => {
            let set = w.create_child_resources();
            match cli.output {
                Output::Human => {
                    println!("KIND          NAME");
                    for r in &set {
                        println!("{:<13} {}", r.kind(), r.name());
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&set)?),
            }
        }
        Commands::Hash { salt } => {
            let h = hash_workload(&w, *salt)?;
            match cli.output {
                Output::Human => println!("{h}"),
                Output::Json => println!("{}", serde_json::json!({ "hash": h })),
            }
        }
        Commands::Default => {
            default_workload(&mut w)?;
            print(cli.output, &w)?;
        }
        Commands::Validate { previous } => {
            let (warnings, result) = match previous {
                Some(p) => validate_update(&read_doc::<W>(p)?, &w),
                None => validate_create(&w),
            };
            for warning in &warnings {
                eprintln!("warning: {warning}");
            }
            result.map_err(|e| anyhow!(e)).with_context(|| format!("{} {} rejected", W::KIND, w.name()))?;
            info!(workload = %w.name(), "admitted");
            if cli.output == Output::Json {
                println!("{}", serde_json::json!({ "allowed": true, "warnings": warnings }));
            } else {
                println!("allowed");
            }
        }
        Commands::Status { observed, status } => {
            let mut current: WorkloadStatus = match status {
                Some(p) => read_doc(p)?,
                None => WorkloadStatus::default(),
            };
            let observation = observed.as_deref().map(|p| read_doc(p).and_then(W::observation)).transpose()?;
            let updated = grid_status::update(&mut current, &w, observation.as_ref(), &SystemClock);
            info!(workload = %w.name(), updated, phase = %current.phase_str(), "status folded");
            print(cli.output, &current)?;
        }
        Commands::Diff { previous } => {
            let before = read_doc::<W>(previous)?.create_child_resources();
            let changes = plan(&before, &w.create_child_resources());
            match cli.output {
                Output::Human => {
                    for c in changes.iter().filter(|c| c.action != ChangeAction::Unchanged) {
                        let s = &c.summary;
                        println!("{:?} {}/{} +{} ~{} -{}", c.action, c.kind, c.name, s.adds, s.updates, s.removes);
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&changes)?),
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let path = cli.file.as_deref().ok_or_else(|| anyhow!("a workload manifest is required (-f FILE)"))?;
    let doc: serde_yaml::Value = read_doc(path)?;

    let kind = doc.get("kind").and_then(serde_yaml::Value::as_str).unwrap_or(GridCluster::KIND).to_string();
    match kind.as_str() {
        k if k == GridCluster::KIND => run::<GridCluster>(&cli, doc),
        k if k == GridJob::KIND => run::<GridJob>(&cli, doc),
        other => bail!("unsupported kind {other:?}; expected GridCluster or GridJob"),
    }
}
