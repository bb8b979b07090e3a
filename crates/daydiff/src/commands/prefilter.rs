use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use daydiff_core::config::Settings;
use daydiff_core::prefilter::{process_directory, process_file, MatchMode, PrefilterConfig};

#[derive(Args, Debug)]
pub struct PrefilterArgs {
    /// File or directory to filter
    input: PathBuf,
    /// Output file, or output directory when the input is a directory
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Sheet type to filter for; detected from the data when omitted
    #[arg(short, long)]
    sheet: Option<String>,
    /// Keep only exact column-name matches (default)
    #[arg(long, conflicts_with = "fuzzy")]
    strict: bool,
    /// Keep columns whose names contain, or are contained in, a required name
    #[arg(long)]
    fuzzy: bool,
    /// Column mapping JSON; defaults to the configured mapping file
    #[arg(long)]
    mapping: Option<PathBuf>,
}

impl PrefilterArgs {
    fn match_mode(&self) -> MatchMode {
        if self.strict {
            MatchMode::Strict
        } else if self.fuzzy {
            MatchMode::Fuzzy
        } else {
            MatchMode::default()
        }
    }
}

pub fn handle_prefilter(args: PrefilterArgs, settings: &Settings) -> Result<bool> {
    let mode = args.match_mode();
    let mapping = args.mapping.unwrap_or_else(|| settings.prefilter_mapping());
    let config = PrefilterConfig::load(&mapping);

    if args.input.is_dir() {
        let results = process_directory(&args.input, args.output.as_deref(), mode, &config)
            .with_context(|| format!("failed to pre-filter {}", args.input.display()))?;
        let passed = results.values().filter(|ok| **ok).count();
        for (name, ok) in &results {
            println!("  {} {name}", if *ok { "ok    " } else { "FAILED" });
        }
        println!("Pre-filtered {passed}/{} files", results.len());
        return Ok(passed == results.len());
    }

    let outcome = process_file(
        &args.input,
        args.output.as_deref(),
        args.sheet.as_deref(),
        mode,
        &config,
    )
    .with_context(|| format!("failed to pre-filter {}", args.input.display()))?;

    let report = &outcome.report;
    println!("Sheet type: {}", report.sheet_name);
    println!(
        "Kept {}/{} columns ({:.1}%)",
        report.kept_columns.len(),
        report.total_columns,
        report.kept_pct()
    );
    if !report.missing_columns.is_empty() {
        println!("Missing required columns: {}", report.missing_columns.join(", "));
    }
    println!("Saved: {}", outcome.output.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser, Debug)]
    struct PrefilterCli {
        #[command(flatten)]
        args: PrefilterArgs,
    }

    fn parse(flags: &[&str]) -> std::result::Result<PrefilterArgs, clap::Error> {
        let argv = ["prefilter", "QnA.xlsx"].iter().chain(flags.iter());
        PrefilterCli::try_parse_from(argv).map(|cli| cli.args)
    }

    #[test]
    fn match_mode_follows_flags() {
        assert_eq!(parse(&[]).unwrap().match_mode(), MatchMode::Strict);
        assert_eq!(parse(&["--strict"]).unwrap().match_mode(), MatchMode::Strict);
        assert_eq!(parse(&["--fuzzy"]).unwrap().match_mode(), MatchMode::Fuzzy);
    }

    #[test]
    fn strict_and_fuzzy_conflict() {
        let err = parse(&["--strict", "--fuzzy"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }
}
