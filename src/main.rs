//! Command-line front end.
//!
//! Usage:
//!   bazi-fortune <command> [args]
//!
//! Commands:
//!   markers <day> <target> [label]   - Markers of a pillar against a day pillar
//!   chart <request.json>             - Marker report for the natal pillars and decades
//!   fortune <request.json> [--out [dir]] - Hundred-year series, optionally exported
//!   summary <request.json>           - Peak, trough and mean of the series
//!
//! Pillars are written as two glyphs, e.g. 甲子.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;

use bazi_fortune::calendar::Pillar;
use bazi_fortune::chart::chart_report;
use bazi_fortune::config::Config;
use bazi_fortune::export::write_series;
use bazi_fortune::fortune::{project_fortune, summarize};
use bazi_fortune::input::{ChartRequest, ResolvedChart};
use bazi_fortune::logging::{log, obj, v_str, Domain, Level};
use bazi_fortune::shensha::evaluate_pillar;

fn print_usage() {
    eprintln!("Usage: bazi-fortune <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  markers <day> <target> [label]");
    eprintln!("  chart <request.json>");
    eprintln!("  fortune <request.json> [--out [dir]]");
    eprintln!("  summary <request.json>");
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_pillar(arg: &str) -> Result<Pillar> {
    arg.parse().with_context(|| format!("bad pillar {:?}", arg))
}

fn load(cfg: &Config, path: &str) -> Result<ResolvedChart> {
    ChartRequest::from_path(Path::new(path))?.resolve(cfg)
}

/// `--out` with no directory falls back to the configured one.
fn out_dir(cfg: &Config, rest: &[String]) -> Option<PathBuf> {
    let pos = rest.iter().position(|a| a == "--out")?;
    match rest.get(pos + 1) {
        Some(dir) if !dir.starts_with("--") => Some(PathBuf::from(dir)),
        _ => Some(PathBuf::from(&cfg.out_dir)),
    }
}

fn run(args: &[String]) -> Result<()> {
    let cfg = Config::from_env();
    let cmd = args.get(1).ok_or_else(|| anyhow!("missing command"))?;
    let arg = |i: usize| args.get(i).map(String::as_str).ok_or_else(|| anyhow!("{}: missing argument {}", cmd, i - 1));

    log(Level::Debug, Domain::System, "command", obj(&[("cmd", v_str(cmd))]));

    match cmd.as_str() {
        "markers" => {
            let day = parse_pillar(arg(2)?)?;
            let target = parse_pillar(arg(3)?)?;
            let label = args.get(4).map(String::as_str).unwrap_or("");
            print_json(&evaluate_pillar(day, target, label))
        }
        "chart" => {
            let r = load(&cfg, arg(2)?)?;
            print_json(&chart_report(&r.chart, &r.cycle, r.birth_year, cfg.report_decades))
        }
        "fortune" => {
            let r = load(&cfg, arg(2)?)?;
            let points = project_fortune(&r.chart, &r.cycle, r.birth_year);
            if let Some(dir) = out_dir(&cfg, &args[3..]) {
                let manifest = write_series(&dir, r.birth_year, &points)?;
                eprintln!("wrote {} ({})", manifest.path, manifest.sha256);
            }
            print_json(&points)
        }
        "summary" => {
            let r = load(&cfg, arg(2)?)?;
            let points = project_fortune(&r.chart, &r.cycle, r.birth_year);
            let summary = summarize(&points).ok_or_else(|| anyhow!("empty series"))?;
            print_json(&summary)
        }
        other => bail!("unknown command {:?}", other),
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }
    if let Err(err) = run(&args) {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}
