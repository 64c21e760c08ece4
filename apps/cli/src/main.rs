mod commands;
mod pages;
mod route;
mod session;

use anyhow::{Context, Result};
use getopts::Options;
use std::{env, path::PathBuf};
use tracing_subscriber::EnvFilter;

use session::Preferences;

fn print_usage(program: &str, opts: &Options) {
    let brief = format!(
        "Usage: {program} <command> [options]\n\n\
         Commands:\n    \
         open <path>     render a page, e.g. /live/ana/abc or /burritoleague/101\n    \
         watch           keep the live map current until Ctrl+C\n    \
         league <csv>    Burrito League standings from a Strava effort export\n    \
         prefs           show or change display preferences"
    );
    print!("{}", opts.usage(&brief));
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    // stdout carries rendered pages
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    let program = args.first().cloned().unwrap_or_else(|| "corsa".into());

    let mut opts = Options::new();
    opts.optopt("s", "segment", "segment to rank (league)", "SEGMENT_ID");
    opts.optopt("o", "out", "write the leaderboard as CSV (league)", "FILE");
    opts.optopt("e", "efforts", "effort export to rank on league pages (open)", "FILE");
    opts.optopt("", "theme", "light or dark (prefs)", "THEME");
    opts.optopt("", "units", "imperial or metric (prefs)", "UNITS");
    opts.optopt("", "prefs-file", "preferences file (default: config dir)", "FILE");
    opts.optflag("v", "verbose", "debug logging");
    opts.optflag("h", "help", "print this help menu");
    let matches = opts.parse(args.get(1..).unwrap_or_default()).context("bad arguments")?;
    if matches.opt_present("h") || matches.free.is_empty() {
        print_usage(&program, &opts);
        return Ok(());
    }
    init_logging(matches.opt_present("v"));

    let prefs_path = matches
        .opt_str("prefs-file")
        .map(PathBuf::from)
        .or_else(Preferences::default_path)
        .context("no config directory; pass --prefs-file")?;

    let output = match matches.free[0].as_str() {
        "open" => {
            let path = matches.free.get(1).context("open needs a path")?;
            let preferences = Preferences::load(&prefs_path)?;
            let efforts = matches.opt_str("e").map(PathBuf::from);
            commands::open(path, preferences, efforts.as_deref()).await?
        }
        "watch" => {
            commands::watch(Preferences::load(&prefs_path)?).await?;
            return Ok(());
        }
        "league" => {
            let csv = matches.free.get(1).map(PathBuf::from).context("league needs a CSV file")?;
            let out = matches.opt_str("o").map(PathBuf::from);
            commands::league(&csv, matches.opt_str("s").as_deref(), out.as_deref())?
        }
        "prefs" => commands::prefs(
            &prefs_path,
            matches.opt_str("theme").as_deref(),
            matches.opt_str("units").as_deref(),
        )?,
        other => {
            print_usage(&program, &opts);
            anyhow::bail!("unknown command `{other}`");
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
