use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;

use crate::commands::{command_create, command_dump, command_lookup, command_scan, command_verify};

mod commands;

#[derive(Parser)]
#[command(version, about, arg_required_else_help(true))]
struct Cli {
    #[command(subcommand)]
    commands: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an idmap for a target and an overlay apk
    Create {
        #[arg(long, help = "apk whose resources are overlaid")]
        target_apk_path: PathBuf,

        #[arg(long, help = "apk providing the replacement resources")]
        overlay_apk_path: PathBuf,

        #[arg(long, help = "Output idmap file")]
        idmap_path: PathBuf,

        #[arg(
            long = "policy",
            required = true,
            value_delimiter = ',',
            help = "policy the overlay fulfills, repeatable"
        )]
        policies: Vec<String>,

        #[arg(long, default_value_t = false, help = "don't enforce <overlayable> declarations")]
        ignore_overlayable: bool,
    },
    /// Print the contents of an idmap file
    Dump {
        #[arg(long)]
        idmap_path: PathBuf,

        #[arg(long, default_value_t = false, help = "print parsed idmap as json")]
        json: bool,
    },
    /// Show the value an overlay provides for a target resource
    Lookup {
        #[arg(long)]
        idmap_path: PathBuf,

        #[arg(long, default_value = "", help = "configuration qualifier, e.g. en-rUS-land")]
        config: String,

        #[arg(long, help = "type/name, @type/name or 0x7f010000")]
        resid: String,
    },
    /// Find static overlays for a package and create their idmaps
    Scan {
        #[arg(long = "input-directory", required = true)]
        input_directories: Vec<PathBuf>,

        #[arg(long, default_value_t = false, help = "descend into subdirectories")]
        recursive: bool,

        #[arg(long)]
        target_package_name: String,

        #[arg(long)]
        target_apk_path: PathBuf,

        #[arg(long)]
        output_directory: PathBuf,

        #[arg(
            long = "policy",
            required = true,
            value_delimiter = ',',
            help = "policy the overlays fulfill, repeatable"
        )]
        policies: Vec<String>,

        #[arg(long, default_value_t = false, help = "don't enforce <overlayable> declarations")]
        ignore_overlayable: bool,
    },
    /// Check that an idmap is up to date with its packages
    Verify {
        #[arg(long)]
        idmap_path: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();

    let result = match &cli.commands {
        Some(Commands::Create {
            target_apk_path,
            overlay_apk_path,
            idmap_path,
            policies,
            ignore_overlayable,
        }) => command_create(
            target_apk_path,
            overlay_apk_path,
            idmap_path,
            policies,
            *ignore_overlayable,
        ),
        Some(Commands::Dump { idmap_path, json }) => command_dump(idmap_path, *json),
        Some(Commands::Lookup {
            idmap_path,
            config,
            resid,
        }) => command_lookup(idmap_path, config, resid),
        Some(Commands::Scan {
            input_directories,
            recursive,
            target_package_name,
            target_apk_path,
            output_directory,
            policies,
            ignore_overlayable,
        }) => command_scan(
            input_directories,
            *recursive,
            target_package_name,
            target_apk_path,
            output_directory,
            policies,
            *ignore_overlayable,
        ),
        Some(Commands::Verify { idmap_path }) => command_verify(idmap_path),
        None => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}: {:#}", "error".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn repeated_and_comma_separated_policies() {
        let cli = Cli::try_parse_from([
            "idmap",
            "create",
            "--target-apk-path",
            "/system/app/Target.apk",
            "--overlay-apk-path",
            "/vendor/overlay/Overlay.apk",
            "--idmap-path",
            "/tmp/overlay.idmap",
            "--policy",
            "system,vendor",
            "--policy",
            "public",
        ])
        .unwrap();

        let Some(Commands::Create { policies, ignore_overlayable, .. }) = cli.commands else {
            panic!("expected create");
        };
        assert_eq!(policies, ["system", "vendor", "public"]);
        assert!(!ignore_overlayable);
    }

    #[test]
    fn create_requires_policy() {
        let result = Cli::try_parse_from([
            "idmap",
            "create",
            "--target-apk-path",
            "a.apk",
            "--overlay-apk-path",
            "b.apk",
            "--idmap-path",
            "c.idmap",
        ]);
        assert!(result.is_err());
    }
}
