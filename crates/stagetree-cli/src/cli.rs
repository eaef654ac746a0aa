//! Command-line definition

use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;

/// Build the `stagetree` command
#[must_use]
pub fn build() -> Command {
    Command::new("stagetree")
        .version(crate::VERSION)
        .about("Validate persona manifests and drive stagetree sessions")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("sessions-root")
                .long("sessions-root")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Override the sessions root"),
        )
        .arg(
            Arg::new("manifests-dir")
                .long("manifests-dir")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Override the manifests directory"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .default_value("text")
                .value_parser(["text", "json"])
                .help("Log output format"),
        )
        .subcommand(
            Command::new("validate")
                .about("Parse a manifest and print its shape")
                .arg(manifest_arg()),
        )
        .subcommand(
            Command::new("paths")
                .about("Print the default stage paths of a manifest")
                .arg(manifest_arg()),
        )
        .subcommand(
            Command::new("materialize")
                .about("Materialize one stage into a session")
                .arg(persona_arg())
                .arg(session_arg())
                .arg(
                    Arg::new("stage")
                        .long("stage")
                        .required(true)
                        .help("Stage id"),
                )
                .arg(
                    Arg::new("content")
                        .long("content")
                        .conflicts_with("content-file")
                        .required_unless_present("content-file")
                        .help("Stage payload as JSON text"),
                )
                .arg(
                    Arg::new("content-file")
                        .long("content-file")
                        .value_parser(value_parser!(PathBuf))
                        .help("File holding the stage payload as JSON"),
                ),
        )
        .subcommand(
            Command::new("status")
                .about("Show completed, current and stale stages of a session")
                .arg(persona_arg())
                .arg(session_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("scenario")
                .about("Drive a session end-to-end with synthetic payloads")
                .arg(manifest_arg())
                .arg(session_arg())
                .arg(
                    Arg::new("skip")
                        .long("skip")
                        .action(ArgAction::Append)
                        .help("Optional stage to leave out (repeatable)"),
                ),
        )
}

fn manifest_arg() -> Arg {
    Arg::new("manifest")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Manifest file (.yaml, .yml or .json)")
}

fn persona_arg() -> Arg {
    Arg::new("persona")
        .long("persona")
        .required(true)
        .help("Persona id")
}

fn session_arg() -> Arg {
    Arg::new("session")
        .long("session")
        .required(true)
        .help("Session id")
}
