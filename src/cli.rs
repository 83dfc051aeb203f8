use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "firstboot")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Land first-boot config files and links under the target root", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only report errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Runtime settings file (TOML)
    #[arg(long, global = true, env = "FIRSTBOOT_SETTINGS")]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Read the config blob from QEMU firmware config
    FetchConfig(FetchConfigArgs),

    /// Write the files and links of a document under the target root
    Files(FilesArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct FetchConfigArgs {
    /// Write the config here instead of stdout
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct FilesArgs {
    /// JSON document with `files` and `links`
    #[arg(short, long)]
    pub document: PathBuf,

    /// Target root (overrides the settings file)
    #[arg(long)]
    pub root: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_files() {
        let cli = Cli::parse_from([
            "firstboot",
            "-vv",
            "files",
            "--document",
            "/run/doc.json",
            "--root",
            "/mnt",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Files(args) => {
                assert_eq!(args.document, PathBuf::from("/run/doc.json"));
                assert_eq!(args.root, Some(PathBuf::from("/mnt")));
            }
            _ => panic!("expected files"),
        }
    }
}
