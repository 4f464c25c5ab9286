//! treesum: record, verify, and synchronize directory-tree checksums
//!
//! One binary, both sides of the wire:
//! - `scan` hashes a tree and records a manifest
//! - `compare` verifies a manifest against one or more directories
//! - `check` / `transfer` reconcile a tree with a remote server
//! - `listen` serves the other end of the protocol

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::builder::styling::{AnsiColor, Effects};
use clap::{builder::Styles, Parser, Subcommand};
use color_eyre::Result;
use humansize::{format_size, BINARY};
use tracing::info;

use treesum_core::entry::{Coze, Entry};
use treesum_core::hash;
use treesum_core::manifest::FileInfo;
use treesum_core::{Comparer, Scanner};
use treesum_transport::{serve, Client, ServerConfig};

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default())
    .valid(AnsiColor::Green.on_default())
    .invalid(AnsiColor::Red.on_default());

#[derive(Parser)]
#[command(name = "treesum")]
#[command(version)]
#[command(styles = STYLES)]
#[command(about = "Record, verify, and synchronize directory-tree checksums")]
#[command(long_about = r#"
treesum checks the integrity of files after a transfer across the network.

Every run folds file bytes into two running digests: one per file, one for
the whole session, so a single pass verifies files individually and the
tree collectively.

Examples:
  treesum scan -a sha256 -w tree.sum ./data     Record a manifest
  treesum compare tree.sum ./data ./mirror      Verify it later
  treesum check -t server:9090 ./data           Reconcile with a server
  treesum listen server.toml                    Serve the other side
"#)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash files under a directory, optionally recording a manifest
    Scan {
        /// Directory to scan
        base: PathBuf,

        /// Hash algorithm (see `treesum hashes`)
        #[arg(short, long, default_value = "md5")]
        algorithm: String,

        /// Only hash files matching this glob pattern
        #[arg(short, long)]
        pattern: Option<String>,

        /// Write the manifest to this file
        #[arg(short = 'w', long = "write")]
        manifest: Option<PathBuf>,

        /// Print every hashed file
        #[arg(short, long)]
        verbose: bool,

        /// Print the full statistics block
        #[arg(short, long)]
        stats: bool,
    },

    /// Verify a manifest against candidate directories
    Compare {
        /// Manifest file written by scan
        manifest: PathBuf,

        /// Candidate directories; the first one holding a file wins
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// Check presence and size only, skip re-hashing
        #[arg(short, long)]
        list: bool,

        /// Print every verified file
        #[arg(short, long)]
        verbose: bool,

        /// Print the full statistics block
        #[arg(short, long)]
        stats: bool,
    },

    /// Check local files against a remote server
    Check {
        /// Server address (host:port)
        remote: String,

        /// Directory to check
        base: PathBuf,

        /// Hash algorithm (see `treesum hashes`)
        #[arg(short, long, default_value = "md5")]
        algorithm: String,

        /// Only check files matching this glob pattern
        #[arg(short, long)]
        pattern: Option<String>,

        /// Copy missing or diverging files to the server
        #[arg(short = 't', long = "transfer")]
        sync: bool,

        /// Print every checked file
        #[arg(short, long)]
        verbose: bool,
    },

    /// Copy local files to a remote server
    Transfer {
        /// Server address (host:port)
        remote: String,

        /// Directories to transfer, one session each
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// Hash algorithm (see `treesum hashes`)
        #[arg(short, long, default_value = "md5")]
        algorithm: String,

        /// Only transfer files matching this glob pattern
        #[arg(short, long)]
        pattern: Option<String>,

        /// Print every transferred file
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run the server side of the protocol
    Listen {
        /// TOML configuration file
        config: PathBuf,
    },

    /// Print the list of supported hash algorithms
    Hashes,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Scan {
            base,
            algorithm,
            pattern,
            manifest,
            verbose,
            stats,
        } => scan_command(&base, &algorithm, pattern.as_deref(), manifest, verbose, stats),
        Commands::Compare {
            manifest,
            dirs,
            list,
            verbose,
            stats,
        } => compare_command(&manifest, &dirs, list, verbose, stats),
        Commands::Check {
            remote,
            base,
            algorithm,
            pattern,
            sync,
            verbose,
        } => check_command(&remote, &base, &algorithm, pattern.as_deref(), sync, verbose),
        Commands::Transfer {
            remote,
            dirs,
            algorithm,
            pattern,
            verbose,
        } => transfer_command(&remote, &dirs, &algorithm, pattern.as_deref(), verbose),
        Commands::Listen { config } => listen_command(&config),
        Commands::Hashes => hashes_command(),
    }
}

fn scan_command(
    base: &Path,
    algorithm: &str,
    pattern: Option<&str>,
    manifest: Option<PathBuf>,
    verbose: bool,
    stats: bool,
) -> Result<()> {
    let started = Instant::now();
    let mut scanner = match manifest {
        Some(path) => Scanner::with_manifest(algorithm, File::create(&path)?)?,
        None => Scanner::new(algorithm)?,
    };

    let cz = scanner.scan(base, pattern, entry_line(verbose))?;
    report(&cz, &scanner.checksum(), started, stats);
    Ok(())
}

fn compare_command(
    manifest: &Path,
    dirs: &[PathBuf],
    list: bool,
    verbose: bool,
    stats: bool,
) -> Result<()> {
    let started = Instant::now();
    let mut comparer = Comparer::open(manifest)?;

    let cz = if list {
        comparer.list(dirs, record_line(verbose))?
    } else {
        comparer.compare(dirs, record_line(verbose))?
    };
    report(&cz, &comparer.checksum(), started, stats);
    Ok(())
}

fn check_command(
    remote: &str,
    base: &Path,
    algorithm: &str,
    pattern: Option<&str>,
    sync: bool,
    verbose: bool,
) -> Result<()> {
    let started = Instant::now();
    let mut client = Client::connect(remote, algorithm)?;
    let mut scanner = Scanner::new(algorithm)?;

    let cz = scanner.synchronize(&mut client, base, pattern, sync, entry_line(verbose))?;
    report(&cz, &scanner.checksum(), started, false);
    Ok(())
}

fn transfer_command(
    remote: &str,
    dirs: &[PathBuf],
    algorithm: &str,
    pattern: Option<&str>,
    verbose: bool,
) -> Result<()> {
    // One session per directory: the aggregate COMPARE covers exactly the
    // files of that walk.
    for dir in dirs {
        let started = Instant::now();
        let mut client = Client::connect(remote, algorithm)?;
        let mut scanner = Scanner::new(algorithm)?;

        info!("transferring {}", dir.display());
        let cz = scanner.transfer(&mut client, dir, pattern, entry_line(verbose))?;
        report(&cz, &scanner.checksum(), started, false);
    }
    Ok(())
}

fn listen_command(config: &Path) -> Result<()> {
    let config = ServerConfig::load(config)?;
    serve(&config)
}

fn hashes_command() -> Result<()> {
    println!("{:<6} {}", "size", "algorithm");
    for name in hash::FAMILIES {
        let width = hash::size_of(name)?;
        println!("{width:<6} {name}");
    }
    Ok(())
}

fn entry_line(verbose: bool) -> impl FnMut(&Entry, &[u8]) {
    move |entry, digest| {
        if verbose {
            println!(
                "{:<10}  {}  {}",
                format_size(entry.size, BINARY),
                hex::encode(digest),
                entry.path.display()
            );
        }
    }
}

fn record_line(verbose: bool) -> impl FnMut(&FileInfo, &Path) {
    move |info, path| {
        if verbose {
            println!(
                "{:<10}  {}  {}",
                format_size(info.size, BINARY),
                hex::encode(&info.local),
                path.display()
            );
        }
    }
}

fn report(cz: &Coze, checksum: &[u8], started: Instant, stats: bool) {
    if stats {
        let (min, max) = cz.range();
        println!("Files  : {} ({})", cz.count, hex::encode(checksum));
        println!("Size   : {}", format_size(cz.size, BINARY));
        println!("Average: {}", format_size(cz.avg() as u64, BINARY));
        println!(
            "Range  : {} - {}",
            format_size(min, BINARY),
            format_size(max, BINARY)
        );
        println!("Elapsed: {:.2?}", started.elapsed());
    } else {
        println!(
            "{} - {} files {} ({:.2?})",
            format_size(cz.size, BINARY),
            cz.count,
            hex::encode(checksum),
            started.elapsed()
        );
    }
}
