use appman::{commands, profile::Mode, runtime::RealRuntime};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// appman - application manager
///
/// Install, update and remove a catalogue of programs, resolving their dependencies.
///
/// Examples:
///   appman install selenium-server   # Installs webdriver-firefox first
///   appman update all                # Updates every installed program
///   appman install webdrivers        # Expands the meta-program
#[derive(Parser, Debug)]
#[command(author, version = env!("APPMAN_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Install root directory (overrides defaults; also via APPMAN_ROOT)
    #[arg(
        long = "root",
        short = 'r',
        env = "APPMAN_ROOT",
        value_name = "PATH",
        global = true
    )]
    pub install_root: Option<PathBuf>,

    /// Print debug output
    #[arg(long, short = 'd', global = true)]
    pub debug: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Install programs and their dependencies
    Install(ProgramArgs),

    /// Remove programs that nothing else depends on
    Remove(ProgramArgs),

    /// Update installed programs ("all" updates every one of them)
    Update(ProgramArgs),

    /// List the programs and meta-programs that can be installed
    Available,

    /// List installed programs
    Installed,
}

#[derive(clap::Args, Debug)]
pub struct ProgramArgs {
    /// Program or meta-program names
    #[arg(value_name = "PROGRAM", required = true)]
    pub programs: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let runtime = Arc::new(RealRuntime);
    let result = match cli.command {
        Commands::Install(args) => {
            commands::run(runtime, Mode::Install, &args.programs, cli.install_root).await
        }
        Commands::Remove(args) => {
            commands::run(runtime, Mode::Remove, &args.programs, cli.install_root).await
        }
        Commands::Update(args) => {
            commands::run(runtime, Mode::Update, &args.programs, cli.install_root).await
        }
        Commands::Available => commands::available(runtime, cli.install_root),
        Commands::Installed => commands::installed(runtime, cli.install_root),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if commands::is_interrupt(&e) => ExitCode::from(130),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_install_parsing() {
        let cli = Cli::try_parse_from(["appman", "install", "a", "b"]).unwrap();
        match cli.command {
            Commands::Install(args) => {
                assert_eq!(args.programs, vec!["a", "b"]);
            }
            _ => panic!("Expected Install command"),
        }
        assert!(!cli.debug);
    }

    #[test]
    fn test_cli_install_requires_programs() {
        let result = Cli::try_parse_from(["appman", "install"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_available_rejects_arguments() {
        let result = Cli::try_parse_from(["appman", "available", "foo"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_update_all_parsing() {
        let cli = Cli::try_parse_from(["appman", "update", "all", "-d"]).unwrap();
        match cli.command {
            Commands::Update(args) => assert_eq!(args.programs, vec!["all"]),
            _ => panic!("Expected Update command"),
        }
        assert!(cli.debug);
    }

    #[test]
    fn test_cli_global_root_parsing() {
        let cli = Cli::try_parse_from(["appman", "--root", "/tmp", "installed"]).unwrap();
        assert_eq!(cli.install_root, Some(PathBuf::from("/tmp")));
        assert!(matches!(cli.command, Commands::Installed));
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        let result = Cli::try_parse_from(["appman", "a"]);
        assert!(result.is_err());
    }
}
