#![forbid(unsafe_code)]

use clap::{Args, Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hashpak::pak::{self, Codec, FileType, PakResult, ResolveOptions, VfsPath};

#[derive(Debug, Parser)]
#[command(name = "hashpak", version, about = "Rebuild a readable tree from hash-addressed game archives")]
struct Cli {
    /// More logging (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Args)]
struct ResolveArgs {
    /// Archive files, or directories searched for .scs/.zip archives.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// File of known paths, one per line (repeatable).
    #[arg(long)]
    dictionary: Vec<PathBuf>,
    /// Parse entries on a single thread.
    #[arg(long, default_value_t = false)]
    no_parallel: bool,
    /// Only prune empty directories below this path.
    #[arg(long, default_value = "")]
    root: String,
}

impl ResolveArgs {
    fn options(&self) -> PakResult<ResolveOptions> {
        let mut seeds = BTreeSet::new();
        for dict in &self.dictionary {
            seeds.extend(pak::load_dictionary(dict)?);
        }
        Ok(ResolveOptions {
            parallel: !self.no_parallel,
            root: VfsPath::new(&self.root),
            seeds,
        })
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve archives and list their entries.
    List {
        #[command(flatten)]
        resolve: ResolveArgs,
        /// Only list paths containing this substring (repeatable).
        #[arg(long)]
        filter: Vec<String>,
        /// Print type, size and compression too.
        #[arg(long, default_value_t = false)]
        long: bool,
    },

    /// Resolve archives and write their files to an output directory.
    Extract {
        #[command(flatten)]
        resolve: ResolveArgs,
        #[arg(long)]
        output: PathBuf,
        /// Only extract paths containing this substring (repeatable).
        #[arg(long)]
        filter: Vec<String>,
        /// Also dump unresolved entries under `_unresolved/<hash>`.
        #[arg(long, default_value_t = false)]
        unresolved: bool,
    },

    /// Print the salted hash of each string.
    Hash {
        strings: Vec<String>,
        #[arg(long, default_value_t = 0)]
        salt: u16,
    },

    /// Print the paths an extractor finds in loose files.
    Parse {
        files: Vec<PathBuf>,
        /// Force a file type instead of guessing from the extension.
        #[arg(long = "type")]
        file_type: Option<FileType>,
    },

    /// Compress files to `<file>.compressed`.
    Compress {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// zlib, gzip or raw (headerless deflate).
        #[arg(short = 't', long = "type")]
        codec: Codec,
    },

    /// Decompress files to `<file>.decompressed`.
    Decompress {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// zlib, gzip or raw (headerless deflate).
        #[arg(short = 't', long = "type")]
        codec: Codec,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn run(cmd: Command) -> PakResult<()> {
    match cmd {
        Command::List { resolve, filter, long } => {
            let resolved = pak::resolve_inputs(&resolve.inputs, resolve.options()?)?;
            pak::list(&resolved, &filter, long)
        }
        Command::Extract {
            resolve,
            output,
            filter,
            unresolved,
        } => {
            let resolved = pak::resolve_inputs(&resolve.inputs, resolve.options()?)?;
            let summary = pak::extract(&resolved, &output, &filter, unresolved)?;
            println!(
                "wrote {} files to {} ({} skipped, {} unresolved)",
                summary.written,
                output.display(),
                summary.skipped,
                resolved.report.unresolved
            );
            Ok(())
        }
        Command::Hash { strings, salt } => {
            for (s, h) in pak::hash_strings(&strings, salt) {
                println!("{h:016x}  {s}");
            }
            Ok(())
        }
        Command::Parse { files, file_type } => {
            for (file, paths) in pak::parse_files(&files, file_type)? {
                println!("{}:", file.display());
                for p in paths {
                    println!("  {p}");
                }
            }
            Ok(())
        }
        Command::Compress { files, codec } => {
            for out in pak::compress_files(&files, codec)? {
                println!("{}", out.display());
            }
            Ok(())
        }
        Command::Decompress { files, codec } => {
            for out in pak::decompress_files(&files, codec)? {
                println!("{}", out.display());
            }
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli.cmd) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
