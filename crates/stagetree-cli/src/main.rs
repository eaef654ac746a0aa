use anyhow::{bail, Result};
use clap::ArgMatches;
use stagetree_cli::commands::{self, Content, Context};
use stagetree_cli::{cli, logging};
use std::path::PathBuf;

fn main() {
    let matches = cli::build().get_matches();

    let format = matches
        .get_one::<String>("log-format")
        .map_or(logging::LogFormat::Text, |f| logging::LogFormat::from_flag(f));
    if let Err(e) = logging::init(format) {
        eprintln!("warning: {e}");
    }

    if let Err(e) = run(&matches) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    let ctx = Context::load(
        matches.get_one::<PathBuf>("config").map(PathBuf::as_path),
        matches.get_one::<PathBuf>("sessions-root").map(PathBuf::as_path),
        matches.get_one::<PathBuf>("manifests-dir").map(PathBuf::as_path),
    )?;
    let mut out = std::io::stdout().lock();

    match matches.subcommand() {
        Some(("validate", args)) => commands::validate(manifest(args)?, &mut out),
        Some(("paths", args)) => commands::paths(manifest(args)?, &mut out),
        Some(("materialize", args)) => {
            let content = match (
                args.get_one::<String>("content"),
                args.get_one::<PathBuf>("content-file"),
            ) {
                (Some(text), _) => Content::Inline(text.clone()),
                (None, Some(path)) => Content::File(path.clone()),
                (None, None) => bail!("one of --content or --content-file is required"),
            };
            commands::materialize(
                &ctx,
                required(args, "persona")?,
                required(args, "session")?,
                required(args, "stage")?,
                &content,
                &mut out,
            )
        }
        Some(("status", args)) => commands::status(
            &ctx,
            required(args, "persona")?,
            required(args, "session")?,
            args.get_flag("json"),
            &mut out,
        ),
        Some(("scenario", args)) => {
            let skips: Vec<String> = args
                .get_many::<String>("skip")
                .map(|values| values.cloned().collect())
                .unwrap_or_default();
            commands::scenario(&ctx, manifest(args)?, required(args, "session")?, &skips, &mut out)
                .map(|_| ())
        }
        Some((other, _)) => bail!("unknown command '{other}'"),
        None => bail!("no command given"),
    }
}

fn manifest(args: &ArgMatches) -> Result<&std::path::Path> {
    args.get_one::<PathBuf>("manifest")
        .map(PathBuf::as_path)
        .ok_or_else(|| anyhow::anyhow!("missing manifest path"))
}

fn required<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a str> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("missing --{name}"))
}
