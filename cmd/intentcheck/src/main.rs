//! intentcheck - Load skill manifests and match utterances against them.

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use giztoy_intent::{IntentService, MatchContext, MatchResult, ServiceConfig, SkillManifest};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Load skill manifests and match utterances against them.
///
/// Utterances come from the command line, or one per line on stdin when
/// none are given. Each result is printed as one JSON line.
#[derive(Parser, Debug)]
#[command(name = "intentcheck")]
#[command(about = "Match utterances against skill manifests")]
#[command(version)]
struct Args {
    /// Skill manifest directory (JSON/YAML, searched recursively)
    #[arg(short, long)]
    skills: PathBuf,

    /// Service config file (YAML or JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Language for matching (default: config lang)
    #[arg(short, long)]
    lang: Option<String>,

    /// Override the minimum confidence
    #[arg(long)]
    min_confidence: Option<f64>,

    /// Treat all utterances as candidates of one utterance and print the best
    #[arg(long)]
    best: bool,

    /// Print registered intents and exit
    #[arg(long)]
    list: bool,

    /// Verbose output
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Utterances to match
    utterances: Vec<String>,
}

#[derive(Serialize)]
struct Line<'a> {
    input: &'a str,
    #[serde(rename = "match")]
    result: Option<MatchResult>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => ServiceConfig::load(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => ServiceConfig::default(),
    };
    let svc = IntentService::new(config)?;

    let manifests = SkillManifest::load_dir(&args.skills)
        .with_context(|| format!("load skills from {}", args.skills.display()))?;
    for m in &manifests {
        svc.load_manifest(m)
            .with_context(|| format!("register skill {}", m.skill_id))?;
    }
    info!("loaded {} skills", manifests.len());

    if args.list {
        for r in svc.registrar().registered_intents() {
            println!("{}\t{}\t{}\t{}", r.lang, r.skill_id, r.name, r.samples.join(" | "));
        }
        return Ok(());
    }

    let utterances = if args.utterances.is_empty() {
        read_stdin()?
    } else {
        args.utterances.clone()
    };

    let ctx = MatchContext {
        min_confidence: args.min_confidence,
        session_id: None,
    };
    let lang = args.lang.as_deref();

    if args.best {
        let result = svc.match_utterances(utterances.as_slice(), lang, &ctx);
        let input = utterances.join(" | ");
        print_line(&Line { input: &input, result })?;
        return Ok(());
    }

    for utterance in &utterances {
        let result = svc.match_utterances(std::slice::from_ref(utterance), lang, &ctx);
        print_line(&Line { input: utterance, result })?;
    }
    Ok(())
}

fn read_stdin() -> Result<Vec<String>> {
    let mut lines = Vec::new();
    for line in std::io::stdin().lock().lines() {
        let line = line.context("read stdin")?;
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}

fn print_line(line: &Line<'_>) -> Result<()> {
    println!("{}", serde_json::to_string(line)?);
    Ok(())
}
