use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod config;

/// Managed/native interop bridge driver.
///
/// Calls native library functions from managed code, exposes managed
/// functions as native exports, and launches native programs that call back
/// into those exports.
///
/// EXAMPLES:
///     interop demo                     Run both directions end to end
///     interop add 2 3                  Call the native addition function
///     interop random --len 32          Fill a buffer with native random bytes
///     interop exports --json           List managed exports as JSON
///     interop launch ./probe -- -v     Launch a native program and wait
///
/// ENVIRONMENT VARIABLES:
///     INTEROP_LOG          Log filter (e.g. 'debug', 'interop_runtime=trace')
///     INTEROP_LIBRARY      Native library used for runtime-marshaled calls
///     INTEROP_SEARCH_PATH  Extra library search directories
///     INTEROP_PROBE        Native executable launched by 'demo'
#[derive(Parser)]
#[command(name = "interop")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Native library for runtime-marshaled calls (name or path)
    #[arg(long, short = 'l', global = true)]
    library: Option<String>,

    /// Additional library search directory (repeatable)
    #[arg(long = "search-path", short = 'L', global = true)]
    search_path: Vec<PathBuf>,

    /// Path to an interop.toml (default: search upward from the current directory)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge in both directions
    ///
    /// Calls into the native library with a static import and a
    /// runtime-marshaled buffer fill, then launches the native probe which
    /// calls back into the managed exports.
    ///
    /// EXAMPLES:
    ///     interop demo
    ///     interop demo --skip-launch
    Demo {
        /// Only run the managed-to-native half
        #[arg(long)]
        skip_launch: bool,
    },

    /// Add two integers in native code
    ///
    /// EXAMPLES:
    ///     interop add 37 58
    Add {
        #[arg(allow_negative_numbers = true)]
        a: i32,
        #[arg(allow_negative_numbers = true)]
        b: i32,
    },

    /// Fill a buffer with native random bytes
    ///
    /// EXAMPLES:
    ///     interop random
    ///     interop random --len 64
    Random {
        /// Number of bytes to fill
        #[arg(long, short = 'n', default_value_t = 16)]
        len: usize,
    },

    /// Call an import declared in interop.toml
    ///
    /// Arguments are parsed by the declared parameter types. A buffer
    /// parameter takes a length; the filled buffer is printed after the call.
    ///
    /// EXAMPLES:
    ///     interop call c_abs -- -5
    ///     interop call fill 16
    Call {
        /// Import name as declared in interop.toml
        import: String,
        /// Arguments, one per declared parameter
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// List or call the managed exports
    ///
    /// EXAMPLES:
    ///     interop exports
    ///     interop exports --json
    ///     interop exports --call aot_add 37 58
    ///     interop exports --loaded --call aot_add 37 58
    Exports {
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Call an export through its native entry point
        #[arg(long, num_args = 1.., value_name = "NAME ARGS", allow_hyphen_values = true)]
        call: Option<Vec<String>>,
        /// Call through the compiled exports library, loaded by name
        #[arg(long, requires = "call")]
        loaded: bool,
    },

    /// Launch a native executable and wait for it to exit
    ///
    /// The child shares this terminal. Its exit code is reported and
    /// becomes the exit status of this command.
    ///
    /// EXAMPLES:
    ///     interop launch ./probe
    ///     interop launch --timeout-ms 5000 ./probe --exit-code 3
    Launch {
        /// Path to the executable
        path: PathBuf,
        /// Arguments passed to the executable
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
        /// Terminate the child if it runs longer than this
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let settings = config::Settings::load(cli.config.as_deref(), cli.library, cli.search_path)?;
    config::init_logging(settings.config.log_level());

    if !interop_runtime::ffi::configure_global_resolver(settings.search_paths.clone()) {
        tracing::debug!("global resolver already configured");
    }

    match cli.command {
        Commands::Demo { skip_launch } => commands::demo::run(&settings, skip_launch)?,
        Commands::Add { a, b } => commands::add::run(&settings, a, b)?,
        Commands::Random { len } => commands::random::run(&settings, len)?,
        Commands::Call { import, args } => commands::call::run(&settings, &import, &args)?,
        Commands::Exports { json, call, loaded } => {
            commands::exports::run(&settings, json, call.as_deref(), loaded)?
        }
        Commands::Launch {
            path,
            args,
            timeout_ms,
        } => return commands::launch::run(&settings, &path, &args, timeout_ms),
    }

    Ok(ExitCode::SUCCESS)
}
