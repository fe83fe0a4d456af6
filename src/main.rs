// src/main.rs

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::io;
use std::path::PathBuf;
use sysroot_forge::repository::{PackageIndex, RepositoryClient};
use sysroot_forge::runtime::{DryRunner, RuntimeBuilder, SystemRunner};
use sysroot_forge::sysroot::SysrootAssembler;
use sysroot_forge::{toolchain, Architecture, BuildContext, Distro};
use tracing::info;

#[derive(Parser)]
#[command(name = "sysroot-forge")]
#[command(author, version, about = "Cross-compilation sysroot provisioner with a self-contained LLVM C++ runtime", long_about = None)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Target selection shared by every provisioning command
#[derive(Args, Debug, Clone)]
struct TargetArgs {
    /// Distribution id (see `sysroot-forge list`)
    distro: String,
    /// Target architecture
    #[arg(short, long, default_value = "amd64")]
    arch: String,
    /// Directory holding caches, sysroots, toolchains and cross files
    #[arg(short, long, env = "SYSROOT_FORGE_WORK_DIR", default_value = "build")]
    work_dir: PathBuf,
    /// Mirror root overriding the distribution's default (http, https or file URL)
    #[arg(short, long, env = "SYSROOT_FORGE_MIRROR")]
    mirror: Option<String>,
}

/// Options of the LLVM runtime build
#[derive(Args, Debug, Clone)]
struct RuntimeArgs {
    /// LLVM release whose runtimes are built
    #[arg(long, default_value = sysroot_forge::context::DEFAULT_LLVM_VERSION)]
    llvm_version: String,
    /// Parallel build jobs
    #[arg(short, long)]
    jobs: Option<usize>,
    /// Print the build commands instead of running them
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble the sysroot and write the cross file
    Provision {
        #[command(flatten)]
        target: TargetArgs,
        /// Also build the LLVM C++ runtime
        #[arg(long)]
        with_runtime: bool,
        #[command(flatten)]
        runtime: RuntimeArgs,
    },
    /// Assemble and normalize the sysroot only
    Sysroot {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Print the mirror path of a package
    Resolve {
        #[command(flatten)]
        target: TargetArgs,
        /// Package name
        package: String,
    },
    /// Regenerate the cross-compilation descriptor
    Descriptor {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Build the LLVM C++ runtime against an assembled sysroot
    Runtime {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        runtime: RuntimeArgs,
    },
    /// List supported distributions
    List {
        /// Print profiles as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        shell: Shell,
    },
}

/// Build the immutable context for one run
///
/// The work directory is made absolute here: its paths end up in the cross
/// file and cmake flags, which are read from other working directories.
fn build_context(target: &TargetArgs, runtime: Option<&RuntimeArgs>) -> Result<BuildContext> {
    let distro: Distro = target.distro.parse()?;
    let arch: Architecture = target.arch.parse()?;
    let work_dir = std::path::absolute(&target.work_dir)
        .with_context(|| format!("Failed to resolve work directory {}", target.work_dir.display()))?;

    let mut ctx = BuildContext::new(distro, arch, work_dir);
    if let Some(mirror) = &target.mirror {
        ctx = ctx.with_mirror(mirror.clone());
    }
    if let Some(runtime) = runtime {
        ctx = ctx.with_llvm_version(runtime.llvm_version.clone());
        if let Some(jobs) = runtime.jobs {
            ctx = ctx.with_jobs(jobs);
        }
    }
    Ok(ctx)
}

fn assemble(ctx: &BuildContext, client: &RepositoryClient) -> Result<()> {
    let report = SysrootAssembler::new(ctx, client).assemble_default()?;

    println!("Sysroot: {}", report.sysroot.display());
    println!("  Installed: {}", report.installed.join(", "));
    if !report.skipped.is_empty() {
        println!("  Skipped (not in index): {}", report.skipped.join(", "));
    }
    println!("  Symlinks rewritten: {}", report.rewritten_links);
    Ok(())
}

fn build_runtime(ctx: &BuildContext, client: &RepositoryClient, dry_run: bool) -> Result<()> {
    let builder = RuntimeBuilder::new(ctx);
    let prefix = if dry_run {
        builder.build(&builder.source_dir(), &DryRunner)?
    } else {
        let source = builder.prepare_source(client)?;
        builder.build(&source, &SystemRunner)?
    };
    println!("Runtime prefix: {}", prefix.display());
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Some(Commands::Provision {
            target,
            with_runtime,
            runtime,
        }) => {
            let ctx = build_context(&target, Some(&runtime))?;
            info!("Provisioning {}", ctx.target_key());
            let client = RepositoryClient::new()?;

            assemble(&ctx, &client)?;
            let descriptor = toolchain::write_descriptor(&ctx)?;
            println!("Cross file: {}", descriptor.display());

            if with_runtime {
                build_runtime(&ctx, &client, runtime.dry_run)?;
            }
            Ok(())
        }
        Some(Commands::Sysroot { target }) => {
            let ctx = build_context(&target, None)?;
            let client = RepositoryClient::new()?;
            assemble(&ctx, &client)
        }
        Some(Commands::Resolve { target, package }) => {
            let ctx = build_context(&target, None)?;
            let client = RepositoryClient::new()?;
            let index = PackageIndex::open(&client, &ctx)?;
            let path = index
                .resolve(&package)?
                .with_context(|| format!("Package '{}' not found in {} index", package, ctx.target_key()))?;
            println!("{}/{}", ctx.mirror_url(), path);
            Ok(())
        }
        Some(Commands::Descriptor { target }) => {
            let ctx = build_context(&target, None)?;
            let path = toolchain::write_descriptor(&ctx)?;
            println!("Cross file: {}", path.display());
            Ok(())
        }
        Some(Commands::Runtime { target, runtime }) => {
            let ctx = build_context(&target, Some(&runtime))?;
            let client = RepositoryClient::new()?;
            build_runtime(&ctx, &client, runtime.dry_run)
        }
        Some(Commands::List { json }) => {
            let profiles: Vec<_> = Distro::ALL.iter().map(|d| d.profile()).collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&profiles)?);
            } else {
                for profile in profiles {
                    println!(
                        "{:<18} {:<10} {:<6} {}",
                        profile.id, profile.codename, profile.architecture, profile.mirror_url
                    );
                }
            }
            Ok(())
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "sysroot-forge", &mut io::stdout());
            Ok(())
        }
        None => {
            // No command provided, show help
            println!("sysroot-forge v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'sysroot-forge --help' for usage information");
            Ok(())
        }
    }
}
