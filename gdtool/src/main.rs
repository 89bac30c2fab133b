use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use log::{debug, info};

use gdsc_core::pck::{PckEntry, PckFile};
use gdsc_core::{compile, decompile, detect, Registry};

#[derive(ClapParser, Debug)]
#[command(version, about = "Decode, rebuild and probe engine resource packs and compiled scripts", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract a resource pack, optionally decompiling compiled scripts.
    Decode {
        /// The pack file to extract.
        #[arg(short, long, alias = "in")]
        input: PathBuf,

        /// Commit hash of the bytecode version to use (7 or 40 hex chars).
        #[arg(short, long)]
        bytecode_version: Option<String>,

        /// Decompile .gdc files to .gd source while extracting.
        #[arg(short, long)]
        decompile: bool,

        /// Output directory (defaults to the pack's name next to it).
        #[arg(short, long, alias = "out")]
        output: Option<PathBuf>,
    },
    /// Pack a project directory into a resource pack, compiling .gd
    /// scripts to bytecode.
    Build {
        /// The project directory to pack (must contain project.binary).
        #[arg(short, long, alias = "in")]
        input: PathBuf,

        /// Commit hash of the bytecode version to use (7 or 40 hex chars).
        #[arg(short, long)]
        bytecode_version: String,

        /// Engine version recorded in the pack header, as major.minor.patch.
        #[arg(short, long, default_value = "3.3.3")]
        engine_version: String,

        /// Output pack file (defaults to the directory name + ".pck").
        #[arg(short, long, alias = "out")]
        output: Option<PathBuf>,
    },
    /// Probe a game executable for its bytecode version without running it.
    Detect {
        /// The game executable to probe.
        #[arg(short, long, alias = "in")]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let registry = Registry::builtin()?;
    match args.command {
        Command::Decode {
            input,
            bytecode_version,
            decompile,
            output,
        } => decode(&registry, &input, bytecode_version.as_deref(), decompile, output),
        Command::Build {
            input,
            bytecode_version,
            engine_version,
            output,
        } => build(&registry, &input, &bytecode_version, &engine_version, output),
        Command::Detect { input } => detect_version(&registry, &input),
    }
}

fn decode(
    registry: &Registry,
    input: &Path,
    bytecode_version: Option<&str>,
    decompile_scripts: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let provider = match bytecode_version {
        Some(hash) => Some(registry.by_commit_hash(hash)?),
        None if decompile_scripts => {
            bail!("--decompile requires --bytecode-version")
        }
        None => None,
    };

    let bytes = fs::read(input)
        .with_context(|| format!("failed to read pack file {}", input.display()))?;
    let pck = PckFile::parse(&bytes)
        .with_context(|| format!("failed to parse pack file {}", input.display()))?;
    info!(
        "pack format {} (engine {}.{}.{}), {} files",
        pck.pack_format_version,
        pck.version_major,
        pck.version_minor,
        pck.version_patch,
        pck.entries.len()
    );

    let output_dir = output.unwrap_or_else(|| input.with_extension(""));
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    for entry in &pck.entries {
        let relative = entry.path.strip_prefix("res://").unwrap_or(&entry.path);
        let mut target = output_dir.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        if decompile_scripts && relative.ends_with(".gdc") {
            let provider = provider.context("--decompile requires --bytecode-version")?;
            let source = decompile(&entry.data, provider)
                .with_context(|| format!("error while decoding file: {relative}"))?;
            target.set_extension("gd");
            fs::write(&target, source)
                .with_context(|| format!("failed to write {}", target.display()))?;
        } else {
            fs::write(&target, &entry.data)
                .with_context(|| format!("failed to write {}", target.display()))?;
        }
        debug!("unpacked {relative}");
    }

    println!(
        "Unpacked {} files to {}",
        pck.entries.len(),
        output_dir.display()
    );
    Ok(())
}

fn parse_engine_version(version: &str) -> Result<(u32, u32, u32)> {
    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() != 3 {
        bail!("engine version must be major.minor.patch, got {version:?}");
    }
    let parse = |s: &str| {
        s.parse::<u32>()
            .with_context(|| format!("invalid engine version component {s:?}"))
    };
    Ok((parse(parts[0])?, parse(parts[1])?, parse(parts[2])?))
}

fn build(
    registry: &Registry,
    input: &Path,
    bytecode_version: &str,
    engine_version: &str,
    output: Option<PathBuf>,
) -> Result<()> {
    if !input.is_dir() {
        bail!("invalid directory (does not exist): {}", input.display());
    }
    if !input.join("project.binary").is_file() {
        bail!(
            "invalid project (project.binary not present in directory): {}",
            input.display()
        );
    }

    let provider = registry.by_commit_hash(bytecode_version)?;
    let (major, minor, patch) = parse_engine_version(engine_version)?;

    let pattern = format!("{}/**/*", input.display());
    let mut entries = Vec::new();
    for path in glob::glob(&pattern)? {
        let path = path?;
        if !path.is_file() {
            continue;
        }
        let relative = path
            .strip_prefix(input)
            .context("glob returned a path outside the input directory")?;
        let relative = relative.to_string_lossy().replace('\\', "/");

        let mut pack_path = format!("res://{relative}");
        let data = if relative.ends_with(".gd") {
            let source = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            pack_path.push('c');
            compile(&source, provider)
                .with_context(|| format!("error while building file: {relative}"))?
        } else {
            fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?
        };

        debug!("packed {pack_path}");
        entries.push(PckEntry {
            path: pack_path,
            data,
        });
    }

    let pck = PckFile {
        pack_format_version: 1,
        version_major: major,
        version_minor: minor,
        version_patch: patch,
        entries,
    };

    let output_file = output.unwrap_or_else(|| input.with_extension("pck"));
    fs::write(&output_file, pck.to_bytes()?)
        .with_context(|| format!("failed to write {}", output_file.display()))?;
    println!(
        "Packed {} files into {}",
        pck.entries.len(),
        output_file.display()
    );
    Ok(())
}

fn detect_version(registry: &Registry, input: &Path) -> Result<()> {
    let binary = fs::read(input)
        .with_context(|| format!("failed to read executable {}", input.display()))?;
    match detect(registry, &binary)? {
        Some(provider) => {
            println!(
                "Bytecode version hash: {} ({})",
                &provider.commit_hash()[..7],
                provider.commit_hash()
            );
            println!("{}", provider.description());
            Ok(())
        }
        None => {
            bail!(
                "a known commit hash could not be found within the binary; \
                 it may be built from a version newer than this tool supports"
            );
        }
    }
}
