// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn target_args(cmd: Command) -> Command {
    cmd.arg(Arg::new("distro").required(true).help("Distribution id (see `sysroot-forge list`)"))
        .arg(
            Arg::new("arch")
                .short('a')
                .long("arch")
                .default_value("amd64")
                .help("Target architecture"),
        )
        .arg(
            Arg::new("work_dir")
                .short('w')
                .long("work-dir")
                .value_name("PATH")
                .default_value("build")
                .help("Directory holding caches, sysroots, toolchains and cross files"),
        )
        .arg(
            Arg::new("mirror")
                .short('m')
                .long("mirror")
                .value_name("URL")
                .help("Mirror root overriding the distribution's default"),
        )
}

fn runtime_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("llvm_version")
            .long("llvm-version")
            .default_value("17.0.6")
            .help("LLVM release whose runtimes are built"),
    )
    .arg(Arg::new("jobs").short('j').long("jobs").help("Parallel build jobs"))
    .arg(
        Arg::new("dry_run")
            .long("dry-run")
            .action(ArgAction::SetTrue)
            .help("Print the build commands instead of running them"),
    )
}

fn build_cli() -> Command {
    Command::new("sysroot-forge")
        .version(env!("CARGO_PKG_VERSION"))
        .author("sysroot-forge Contributors")
        .about("Cross-compilation sysroot provisioner with a self-contained LLVM C++ runtime")
        .subcommand_required(false)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable debug logging (overridden by RUST_LOG)"),
        )
        .subcommand(runtime_args(target_args(
            Command::new("provision")
                .about("Assemble the sysroot and write the cross file")
                .arg(
                    Arg::new("with_runtime")
                        .long("with-runtime")
                        .action(ArgAction::SetTrue)
                        .help("Also build the LLVM C++ runtime"),
                ),
        )))
        .subcommand(target_args(
            Command::new("sysroot").about("Assemble and normalize the sysroot only"),
        ))
        .subcommand(target_args(
            Command::new("resolve")
                .about("Print the mirror path of a package")
                .arg(Arg::new("package").required(true).help("Package name")),
        ))
        .subcommand(target_args(
            Command::new("descriptor").about("Regenerate the cross-compilation descriptor"),
        ))
        .subcommand(runtime_args(target_args(
            Command::new("runtime").about("Build the LLVM C++ runtime against an assembled sysroot"),
        )))
        .subcommand(
            Command::new("list").about("List supported distributions").arg(
                Arg::new("json")
                    .long("json")
                    .action(ArgAction::SetTrue)
                    .help("Print profiles as JSON"),
            ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "zsh", "fish", "powershell", "elvish"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("sysroot-forge.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
