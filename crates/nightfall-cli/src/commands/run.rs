use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use nightfall_core::pipeline::{run_config, Execution, NoOpReporter, ProgressReporter, SequenceConfig};
use nightfall_core::registry::BlockRegistry;

use crate::progress::BarReporter;
use crate::summary::{print_config_summary, print_run_summary};

#[derive(Args)]
pub struct RunArgs {
    /// Sequence config file (TOML)
    pub config: PathBuf,

    /// Folder to scan instead of the one named in the config
    #[arg(long)]
    pub input_dir: Option<PathBuf>,

    /// Telescope overriding image headers
    #[arg(long)]
    pub telescope: Option<String>,

    /// Run in parallel with this many workers
    #[arg(short, long, conflicts_with = "sequential")]
    pub workers: Option<usize>,

    /// Force a sequential run
    #[arg(long)]
    pub sequential: bool,

    /// Report every discarded image as it happens
    #[arg(long)]
    pub live_discard: bool,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

fn load_config(args: &RunArgs) -> Result<SequenceConfig> {
    let contents = std::fs::read_to_string(&args.config)
        .with_context(|| format!("Failed to read config {}", args.config.display()))?;
    let mut config: SequenceConfig = toml::from_str(&contents).context("Invalid sequence config")?;

    if let Some(ref dir) = args.input_dir {
        config.input_dir = Some(dir.clone());
    }
    if let Some(ref telescope) = args.telescope {
        config.telescope = Some(telescope.clone());
    }
    if let Some(workers) = args.workers {
        config.execution = Execution::Parallel {
            workers: Some(workers),
        };
    } else if args.sequential {
        config.execution = Execution::Sequential;
    }
    config.live_discard |= args.live_discard;
    config.show_progress &= !args.no_progress;
    Ok(config)
}

pub fn run(args: &RunArgs) -> Result<()> {
    let config = load_config(args)?;
    print_config_summary(&config);

    let registry = BlockRegistry::with_builtin();
    let bar = if !config.show_progress {
        None
    } else {
        Some(Arc::new(BarReporter::new()?))
    };
    let reporter: Arc<dyn ProgressReporter> = match &bar {
        Some(bar) => bar.clone() as Arc<dyn ProgressReporter>,
        None => Arc::new(NoOpReporter),
    };

    let summary = run_config(&config, &registry, reporter)
        .with_context(|| format!("Sequence '{}' failed", config.name))?;
    if let Some(bar) = bar {
        bar.finish();
    }

    print_run_summary(&summary);
    Ok(())
}
