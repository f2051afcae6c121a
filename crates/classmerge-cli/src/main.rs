mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_FAILURE, EXIT_MANIFEST_ERROR, EXIT_MERGE_ERROR};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "classmerge",
    version,
    about = "Assemble a deduplicated resource archive from files, directories, and dependency jars"
)]
struct Cli {
    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run every merge request of a build manifest into its output archive.
    Merge {
        /// Path to manifest TOML file.
        #[arg(default_value = "classmerge.toml")]
        manifest: PathBuf,
        /// Record failed requests and keep merging (overrides merge.keep_going).
        #[arg(long, default_value_t = false)]
        keep_going: bool,
    },
    /// Report which archive on the search path provides a logical path.
    Locate {
        /// Class file path (a/b/C.class) or package prefix (a/b/).
        path: String,
        /// Search path archives, in order (repeat or separate with ':').
        #[arg(short, long, value_delimiter = ':')]
        classpath: Vec<PathBuf>,
        /// Use the search path of this manifest instead of --classpath.
        #[arg(long, conflicts_with = "classpath")]
        manifest: Option<PathBuf>,
    },
    /// List the entries of an archive.
    Entries {
        /// Archive to list.
        archive: PathBuf,
        /// Only show entries whose name starts with this prefix.
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("CLASSMERGE_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let json_output = cli.json;

    let result = match cli.command {
        Commands::Merge {
            manifest,
            keep_going,
        } => commands::merge::run(&manifest, keep_going, json_output),
        Commands::Locate {
            path,
            classpath,
            manifest,
        } => commands::locate::run(&path, &classpath, manifest.as_deref(), json_output),
        Commands::Entries { archive, prefix } => {
            commands::entries::run(&archive, prefix.as_deref(), json_output)
        }
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("manifest error:")
                || msg.starts_with("failed to parse manifest")
                || msg.starts_with("failed to read manifest")
            {
                EXIT_MANIFEST_ERROR
            } else if msg.starts_with("merge error:")
                || msg.starts_with("merge of")
                || msg.starts_with("resource not found")
                || msg.starts_with("cannot read")
            {
                EXIT_MERGE_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
