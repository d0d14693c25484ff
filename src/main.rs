//! `trueno-migrate` command line
//!
//! Copies runs and experiments between tracking stores, or moves them through
//! a directory with export/import. Prints a JSON summary on stdout; logs go to
//! stderr (`RUST_LOG`, default `info`).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use trueno_migrate::client::{self, TrackingClient};
use trueno_migrate::copy::{ExperimentCopier, RunCopier};
use trueno_migrate::export::{ExperimentExporter, ExperimentImporter, RunExporter, RunImporter};
use trueno_migrate::tags::TagPolicy;

#[derive(Debug, Parser)]
#[command(name = "trueno-migrate", version, about = "Copy experiment-tracking runs between tracking stores")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Copy one run into a destination experiment
    CopyRun {
        #[command(flatten)]
        stores: StoreArgs,
        /// Source run id
        #[arg(long)]
        src_run_id: String,
        /// Destination experiment name (created if missing)
        #[arg(long)]
        dst_experiment_name: String,
        #[command(flatten)]
        policy: PolicyArgs,
    },
    /// Copy every run of an experiment, re-linking parent runs
    CopyExperiment {
        #[command(flatten)]
        stores: StoreArgs,
        /// Source experiment name or id
        #[arg(long)]
        src_experiment: String,
        /// Destination experiment name (created if missing)
        #[arg(long)]
        dst_experiment_name: String,
        #[command(flatten)]
        policy: PolicyArgs,
    },
    /// Export one run into a directory
    ExportRun {
        /// Tracking URI to read from
        #[arg(long, env = "MLFLOW_TRACKING_URI")]
        tracking_uri: String,
        /// Run id
        #[arg(long)]
        run_id: String,
        /// Output directory
        #[arg(long)]
        output_dir: PathBuf,
        /// Record source provenance tags
        #[arg(long)]
        export_metadata_tags: bool,
    },
    /// Import one exported run
    ImportRun {
        /// Tracking URI to write to
        #[arg(long, env = "MLFLOW_TRACKING_URI")]
        tracking_uri: String,
        /// Destination experiment name (created if missing)
        #[arg(long)]
        experiment_name: String,
        /// Directory written by export-run
        #[arg(long)]
        input_dir: PathBuf,
        #[command(flatten)]
        import: ImportArgs,
    },
    /// Export every run of an experiment into a directory
    ExportExperiment {
        /// Tracking URI to read from
        #[arg(long, env = "MLFLOW_TRACKING_URI")]
        tracking_uri: String,
        /// Experiment name or id
        #[arg(long)]
        experiment: String,
        /// Output directory
        #[arg(long)]
        output_dir: PathBuf,
        /// Record source provenance tags
        #[arg(long)]
        export_metadata_tags: bool,
    },
    /// Import an exported experiment, re-linking parent runs
    ImportExperiment {
        /// Tracking URI to write to
        #[arg(long, env = "MLFLOW_TRACKING_URI")]
        tracking_uri: String,
        /// Destination experiment name (created if missing)
        #[arg(long)]
        experiment_name: String,
        /// Directory written by export-experiment
        #[arg(long)]
        input_dir: PathBuf,
        #[command(flatten)]
        import: ImportArgs,
    },
}

#[derive(Debug, Args)]
struct StoreArgs {
    /// Source tracking URI
    #[arg(long, env = "MLFLOW_TRACKING_URI")]
    src_uri: String,
    /// Destination tracking URI
    #[arg(long)]
    dst_uri: String,
    /// Directory for temporary artifact staging
    #[arg(long)]
    staging_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct PolicyArgs {
    /// Record source provenance tags
    #[arg(long)]
    export_metadata_tags: bool,
    /// Keep reserved mlflow.* tags
    #[arg(long)]
    import_mlflow_tags: bool,
    /// Attribute copied runs to the source owner
    #[arg(long)]
    use_src_user_id: bool,
}

impl PolicyArgs {
    const fn policy(&self) -> TagPolicy {
        TagPolicy::new()
            .export_metadata_tags(self.export_metadata_tags)
            .import_mlflow_tags(self.import_mlflow_tags)
            .use_src_user_id(self.use_src_user_id)
    }
}

#[derive(Debug, Args)]
struct ImportArgs {
    /// Keep reserved mlflow.* tags
    #[arg(long)]
    import_mlflow_tags: bool,
    /// Keep provenance tags written at export
    #[arg(long)]
    import_metadata_tags: bool,
    /// Attribute imported runs to the source owner
    #[arg(long)]
    use_src_user_id: bool,
}

impl ImportArgs {
    fn importer<'a>(&self, client: &'a dyn TrackingClient) -> RunImporter<'a> {
        RunImporter::new(client)
            .import_mlflow_tags(self.import_mlflow_tags)
            .import_metadata_tags(self.import_metadata_tags)
            .use_src_user_id(self.use_src_user_id)
    }
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let summary = run(cli.command)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn init_logging() {
    let default_level = "info";
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn open(uri: &str) -> Result<Box<dyn TrackingClient>> {
    client::from_uri(uri).with_context(|| format!("failed to open tracking store '{uri}'"))
}

fn run(command: Command) -> Result<serde_json::Value> {
    match command {
        Command::CopyRun {
            stores,
            src_run_id,
            dst_experiment_name,
            policy,
        } => {
            let src = open(&stores.src_uri)?;
            let dst = open(&stores.dst_uri)?;
            let mut copier = RunCopier::new(src.as_ref(), dst.as_ref()).with_policy(policy.policy());
            if let Some(dir) = stores.staging_dir {
                copier = copier.with_staging_root(dir);
            }
            let copied = copier
                .copy_run(&src_run_id, &dst_experiment_name)
                .with_context(|| format!("failed to copy run {src_run_id}"))?;
            Ok(serde_json::to_value(copied)?)
        }
        Command::CopyExperiment {
            stores,
            src_experiment,
            dst_experiment_name,
            policy,
        } => {
            let src = open(&stores.src_uri)?;
            let dst = open(&stores.dst_uri)?;
            let mut run_copier =
                RunCopier::new(src.as_ref(), dst.as_ref()).with_policy(policy.policy());
            if let Some(dir) = stores.staging_dir {
                run_copier = run_copier.with_staging_root(dir);
            }
            let report = ExperimentCopier::from_run_copier(run_copier)
                .copy_experiment(&src_experiment, &dst_experiment_name)
                .with_context(|| format!("failed to copy experiment '{src_experiment}'"))?;
            Ok(serde_json::to_value(report)?)
        }
        Command::ExportRun {
            tracking_uri,
            run_id,
            output_dir,
            export_metadata_tags,
        } => {
            let client = open(&tracking_uri)?;
            let exported = RunExporter::new(client.as_ref())
                .export_metadata_tags(export_metadata_tags)
                .export_run(&run_id, &output_dir)
                .with_context(|| format!("failed to export run {run_id}"))?;
            Ok(serde_json::to_value(exported)?)
        }
        Command::ImportRun {
            tracking_uri,
            experiment_name,
            input_dir,
            import,
        } => {
            let client = open(&tracking_uri)?;
            let imported = import
                .importer(client.as_ref())
                .import_run(&experiment_name, &input_dir)
                .with_context(|| format!("failed to import run from {}", input_dir.display()))?;
            Ok(serde_json::to_value(imported)?)
        }
        Command::ExportExperiment {
            tracking_uri,
            experiment,
            output_dir,
            export_metadata_tags,
        } => {
            let client = open(&tracking_uri)?;
            let manifest = ExperimentExporter::new(client.as_ref())
                .export_metadata_tags(export_metadata_tags)
                .export_experiment(&experiment, &output_dir)
                .with_context(|| format!("failed to export experiment '{experiment}'"))?;
            Ok(serde_json::to_value(manifest)?)
        }
        Command::ImportExperiment {
            tracking_uri,
            experiment_name,
            input_dir,
            import,
        } => {
            let client = open(&tracking_uri)?;
            let report = ExperimentImporter::from_run_importer(import.importer(client.as_ref()))
                .import_experiment(&experiment_name, &input_dir)
                .with_context(|| {
                    format!("failed to import experiment from {}", input_dir.display())
                })?;
            Ok(serde_json::to_value(report)?)
        }
    }
}
