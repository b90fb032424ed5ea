use anyhow::Result;
use clap::Parser;
use mta_shim::commands::{self, config::Config};
use mta_shim::manifest::{DEFAULT_DOWNLOADER, DEFAULT_LOCAL_NAME, LocalVariantOptions};
use mta_shim::resolver::SupportedPlatforms;
use mta_shim::runtime::RealRuntime;
use mta_shim::wrapper::DEFAULT_BINARY;
use std::path::PathBuf;

/// mta-shim - npm packaging shim for the cloud-mta "mta" executable
///
/// Rewrites package.json for the local distribution variant, resolves the
/// release archive for the host platform, and installs and runs the binary.
///
/// If the GITHUB_TOKEN environment variable is set, it is sent with downloads.
///
/// Examples:
///   mta-shim local --relocate-downloader   # build the mta-local package.json
///   mta-shim run -- validate mta.yaml      # download on first use, then run mta
#[derive(Parser, Debug)]
#[command(author, version = env!("MTA_SHIM_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to package.json
    #[arg(
        long = "manifest",
        short = 'm',
        env = "MTA_SHIM_MANIFEST",
        value_name = "PATH",
        default_value = "package.json",
        global = true
    )]
    manifest: PathBuf,

    /// Release download base URL
    #[arg(
        long = "release-url",
        env = "MTA_SHIM_RELEASE_URL",
        value_name = "URL",
        global = true
    )]
    release_url: Option<String>,

    /// Supported platforms: "current", "legacy", or <os>-<arch>=<suffix>,...
    #[arg(
        long = "platforms",
        env = "MTA_SHIM_PLATFORMS",
        value_name = "LIST",
        default_value = "current",
        global = true
    )]
    platforms: SupportedPlatforms,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Rewrite package.json into the local distribution variant
    Local(LocalArgs),

    /// Set the "main" entry point of package.json
    SetMain(SetMainArgs),

    /// Print the release archive URL of every supported platform
    Urls,

    /// Download and unpack the binary for this platform
    Install(InstallArgs),

    /// Run the binary, downloading it first if needed
    Run(RunArgs),

    /// Verify that every release archive URL is reachable
    Check,
}

#[derive(clap::Args, Debug)]
struct LocalArgs {
    /// Also move this dependency from "dependencies" to "devDependencies"
    #[arg(
        long = "relocate-downloader",
        value_name = "NAME",
        num_args = 0..=1,
        default_missing_value = DEFAULT_DOWNLOADER
    )]
    relocate_downloader: Option<String>,

    /// Package name of the local variant
    #[arg(long = "local-name", value_name = "NAME", default_value = DEFAULT_LOCAL_NAME)]
    local_name: String,
}

#[derive(clap::Args, Debug)]
struct SetMainArgs {
    /// Entry point; defaults to index.js
    #[arg(value_name = "ENTRY")]
    entry: Option<String>,
}

#[derive(clap::Args, Debug)]
struct InstallArgs {
    /// Directory to unpack into (defaults to the manifest's directory)
    #[arg(long = "dir", value_name = "DIR")]
    dir: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Directory the binary is unpacked into (defaults to the manifest's directory)
    #[arg(long = "dir", value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Binary to run
    #[arg(long = "bin", value_name = "NAME", default_value = DEFAULT_BINARY)]
    bin: String,

    /// Arguments passed to the binary
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = RealRuntime;

    match cli.command {
        Commands::Local(args) => {
            let options = LocalVariantOptions {
                local_name: args.local_name,
                relocate_downloader: args.relocate_downloader,
            };
            commands::local(&runtime, &cli.manifest, &options)?
        }
        Commands::SetMain(args) => {
            commands::set_main(&runtime, &cli.manifest, args.entry.as_deref())?
        }
        Commands::Urls => {
            let config = Config::new(runtime, cli.manifest, cli.release_url, cli.platforms)?;
            commands::urls(&config)?
        }
        Commands::Install(args) => {
            let config = Config::new(runtime, cli.manifest, cli.release_url, cli.platforms)?;
            commands::install(&config, args.dir.as_deref()).await?
        }
        Commands::Run(args) => {
            let config = Config::new(runtime, cli.manifest, cli.release_url, cli.platforms)?;
            let code = commands::run(&config, args.dir.as_deref(), &args.bin, &args.args).await?;
            std::process::exit(code);
        }
        Commands::Check => {
            let config = Config::new(runtime, cli.manifest, cli.release_url, cli.platforms)?;
            commands::check(&config).await?
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_local_parsing() {
        let cli = Cli::try_parse_from(["mta-shim", "local"]).unwrap();
        match cli.command {
            Commands::Local(args) => {
                assert_eq!(args.relocate_downloader, None);
                assert_eq!(args.local_name, "mta-local");
            }
            _ => panic!("Expected Local command"),
        }
        assert_eq!(cli.manifest, PathBuf::from("package.json"));
        assert_eq!(cli.platforms, SupportedPlatforms::current());
    }

    #[test]
    fn test_cli_relocate_downloader_default_name() {
        let cli = Cli::try_parse_from(["mta-shim", "local", "--relocate-downloader"]).unwrap();
        match cli.command {
            Commands::Local(args) => {
                assert_eq!(args.relocate_downloader.as_deref(), Some("binwrap"));
            }
            _ => panic!("Expected Local command"),
        }
    }

    #[test]
    fn test_cli_relocate_downloader_custom_name() {
        let cli =
            Cli::try_parse_from(["mta-shim", "local", "--relocate-downloader", "other"]).unwrap();
        match cli.command {
            Commands::Local(args) => {
                assert_eq!(args.relocate_downloader.as_deref(), Some("other"));
            }
            _ => panic!("Expected Local command"),
        }
    }

    #[test]
    fn test_cli_set_main_optional_entry() {
        let cli = Cli::try_parse_from(["mta-shim", "set-main"]).unwrap();
        match cli.command {
            Commands::SetMain(args) => assert_eq!(args.entry, None),
            _ => panic!("Expected SetMain command"),
        }

        let cli = Cli::try_parse_from(["mta-shim", "set-main", "dist/index.js"]).unwrap();
        match cli.command {
            Commands::SetMain(args) => assert_eq!(args.entry.as_deref(), Some("dist/index.js")),
            _ => panic!("Expected SetMain command"),
        }
    }

    #[test]
    fn test_cli_run_forwards_hyphenated_args() {
        let cli = Cli::try_parse_from(["mta-shim", "run", "--", "validate", "-m", "mta.yaml"])
            .unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.bin, "mta");
                assert_eq!(args.args, vec!["validate", "-m", "mta.yaml"]);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_global_options() {
        let cli = Cli::try_parse_from([
            "mta-shim",
            "urls",
            "--manifest",
            "/tmp/package.json",
            "--platforms",
            "legacy",
            "--release-url",
            "http://localhost:1234",
        ])
        .unwrap();
        assert_eq!(cli.manifest, PathBuf::from("/tmp/package.json"));
        assert_eq!(cli.platforms, SupportedPlatforms::legacy());
        assert_eq!(cli.release_url.as_deref(), Some("http://localhost:1234"));
    }

    #[test]
    fn test_cli_rejects_bad_platform_list() {
        let result = Cli::try_parse_from(["mta-shim", "urls", "--platforms", "linux"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        assert!(Cli::try_parse_from(["mta-shim"]).is_err());
    }
}
