//! 资源池运维工具 - 主入口
//!
//! Runs one pool operation against a configured pool and prints the result
//! as JSON. The controlling context is a current-thread runtime; every
//! backend call goes through the worker bridge. Transient backend failures
//! are retried here, never inside the pool. `init` writes a starter
//! configuration instead of opening a pool.

use clap::{Args, Parser, Subcommand};
use eyre::{bail, WrapErr};
use resource_pool::infrastructure::{init_logging, LoggingConfig};
use resource_pool::utils::{retry_async, RetryPolicy};
use resource_pool::{
    BackendConnection, Checksum, PoolConfiguration, PoolController, PoolOutput,
    ResourceDescriptor,
};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "resource-pool")]
#[command(about = "Inspect and maintain a content-addressed resource pool")]
#[command(version)]
struct Cli {
    /// Path to the pool configuration (TOML or JSON)
    #[arg(short, long, env = "RESOURCE_POOL_CONFIG", default_value = "resource_pool.toml")]
    config: PathBuf,

    /// Retries for transient backend failures
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Print pool counters to stderr when the command finishes
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a local-backend configuration to `--config`
    Init(InitArgs),
    #[command(flatten)]
    Pool(PoolCommand),
}

#[derive(Args)]
struct InitArgs {
    /// Directory holding the pool's namespaces
    #[arg(long)]
    root: PathBuf,
    #[arg(long, default_value = "cc-resources")]
    namespace_key: String,
    #[arg(long, default_value_t = 512 * 1024 * 1024)]
    maximum_size: u64,
    /// Replace an existing configuration file
    #[arg(long)]
    force: bool,
}

#[derive(Subcommand)]
enum PoolCommand {
    /// Classify the descriptors in a JSON manifest (`[{"sha1": ..., "size": ...}]`)
    Match {
        manifest: PathBuf,
    },
    /// Add one file
    Add {
        path: PathBuf,
    },
    /// Add every file below a directory
    AddDir {
        path: PathBuf,
    },
    /// Write an entry to a file, or to stdout
    Get {
        sha1: Checksum,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Remove an entry
    Delete {
        sha1: Checksum,
    },
    /// Show the stored size of an entry
    Stat {
        sha1: Checksum,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();

    let command = match cli.command {
        Command::Init(args) => {
            // 配置尚不存在，使用默认日志设置
            let _log_guard = init_logging(&LoggingConfig::default())?;
            return write_initial_config(&cli.config, args);
        }
        Command::Pool(command) => command,
    };

    let configuration = PoolConfiguration::load(&cli.config)
        .wrap_err_with(|| format!("loading {}", cli.config.display()))?;
    let _log_guard = init_logging(&configuration.logging)?;
    configuration.log_loaded(&cli.config);

    info!(
        "Resource Pool v{} - namespace {}",
        env!("CARGO_PKG_VERSION"),
        configuration.namespace_key
    );

    let controller = PoolController::start(&configuration)?;
    let policy = RetryPolicy {
        max_retries: cli.retries,
        base_delay: Duration::from_millis(200),
        max_delay: Duration::from_secs(5),
    };

    match command {
        PoolCommand::Match { manifest } => {
            let content = std::fs::read_to_string(&manifest)
                .wrap_err_with(|| format!("reading manifest {}", manifest.display()))?;
            let descriptors: Vec<ResourceDescriptor> =
                serde_json::from_str(&content).wrap_err("parsing manifest")?;

            let report = retry_async(&policy, "match_resources", || {
                controller.match_resources(descriptors.clone())
            })
            .await?;
            print_json(&report)?;
        }
        PoolCommand::Add { path } => {
            let stored = retry_async(&policy, "add_resource", || {
                let path = path.clone();
                controller.submit(move |pool| {
                    let (checksum, size) = Checksum::compute_reader(File::open(&path)?)?;
                    let descriptor = ResourceDescriptor::new(checksum, size);
                    pool.add_resource(File::open(&path)?, &descriptor)
                        .map(PoolOutput::Stored)
                })
            })
            .await?;
            match stored {
                PoolOutput::Stored(descriptor) => print_json(&descriptor)?,
                other => bail!("unexpected output: {:?}", other),
            }
        }
        PoolCommand::AddDir { path } => {
            let stored = retry_async(&policy, "add_directory", || {
                controller.add_directory(path.clone())
            })
            .await?;
            print_json(&stored)?;
        }
        PoolCommand::Get { sha1, output } => match output {
            Some(destination) => {
                let descriptor = ResourceDescriptor::new(sha1, 0);
                let written = retry_async(&policy, "copy", || {
                    controller.copy(descriptor, destination.clone())
                })
                .await?;
                info!(bytes = written, destination = %destination.display(), "Wrote resource");
            }
            None => {
                let content = retry_async(&policy, "get", || controller.get(sha1)).await?;
                std::io::stdout().write_all(&content)?;
            }
        },
        PoolCommand::Delete { sha1 } => {
            retry_async(&policy, "delete", || controller.delete(sha1)).await?;
            print_json(&serde_json::json!({ "sha1": sha1, "deleted": true }))?;
        }
        PoolCommand::Stat { sha1 } => {
            let size = retry_async(&policy, "stat", || controller.stat(sha1)).await?;
            print_json(&serde_json::json!({ "sha1": sha1, "size": size }))?;
        }
    }

    tracing::debug!(metrics = ?controller.metrics().snapshot(), "Pool metrics");
    if cli.metrics {
        eprint!("{}", controller.metrics().export());
    }
    Ok(())
}

fn write_initial_config(path: &Path, args: InitArgs) -> eyre::Result<()> {
    if path.exists() && !args.force {
        bail!("{} already exists, pass --force to replace it", path.display());
    }

    let configuration = PoolConfiguration::new(
        args.namespace_key,
        args.maximum_size,
        BackendConnection::local(args.root),
    );
    configuration.validate_all()?;
    configuration.save_to_toml(path)?;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
