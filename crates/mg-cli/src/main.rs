//! MindGate CLI
//!
//! CLI tool for compiling blocklists and checking filter decisions outside
//! the browser.

mod lists;
mod replay;

use std::io::Read;
use std::path::Path;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use mg_core::matcher::Matcher;
use mg_core::redirect::resolve_redirect_target;
use mg_core::scrubber::{RandomPhrases, Scrubber};
use mg_core::types::ReplacementMode;

use lists::{load_config, load_map, ListSources};

#[derive(Parser)]
#[command(name = "mg-cli")]
#[command(about = "MindGate blocklist compiler and tools")]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Default)]
struct SourceArgs {
    /// JSON dump of the extension's stored settings
    #[arg(long)]
    settings: Option<String>,

    /// Blocked words list (text or JSON array)
    #[arg(short, long)]
    words: Option<String>,

    /// Blocked sites list (text or JSON array)
    #[arg(short, long)]
    sites: Option<String>,

    /// Store the lists as salted hashes
    #[arg(long)]
    hashed: bool,

    /// Salt for hashed lists (random when omitted)
    #[arg(long)]
    salt: Option<String>,
}

impl From<SourceArgs> for ListSources {
    fn from(args: SourceArgs) -> Self {
        Self {
            settings: args.settings,
            words: args.words,
            sites: args.sites,
            hashed: args.hashed,
            salt: args.salt,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check URLs against the blocklists
    Check {
        #[command(flatten)]
        sources: SourceArgs,

        /// Also check search queries (as on a committed navigation)
        #[arg(long)]
        search: bool,

        /// URLs to check
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Scrub text (argument or stdin)
    Scrub {
        #[command(flatten)]
        sources: SourceArgs,

        /// Erase matches instead of substituting a phrase
        #[arg(long)]
        erase: bool,

        /// Seed for replacement phrase selection
        #[arg(long)]
        seed: Option<u64>,

        /// Text to scrub; read from stdin when omitted
        text: Option<String>,
    },

    /// Compile lists into storage entries
    Hash {
        #[command(flatten)]
        sources: SourceArgs,

        /// Output file
        #[arg(short, long, default_value = "blocklists.json")]
        output: String,
    },

    /// Show where a blocked URL would be redirected
    Redirect {
        #[command(flatten)]
        sources: SourceArgs,

        url: String,
    },

    /// Replay a navigation trace
    Replay {
        #[command(flatten)]
        sources: SourceArgs,

        /// Trace file (JSON array or JSON lines)
        #[arg(short, long)]
        trace: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let result = match cli.command {
        Commands::Check { sources, search, urls } => cmd_check(sources.into(), search, &urls),
        Commands::Scrub {
            sources,
            erase,
            seed,
            text,
        } => cmd_scrub(sources.into(), erase, seed, text),
        Commands::Hash { sources, output } => cmd_hash(sources.into(), &output),
        Commands::Redirect { sources, url } => cmd_redirect(sources.into(), &url),
        Commands::Replay { sources, trace } => cmd_replay(sources.into(), &trace),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_check(sources: ListSources, search: bool, urls: &[String]) -> Result<(), String> {
    let config = load_config(&sources)?;
    let mut matcher = Matcher::new();

    let mut blocked = 0usize;
    for url in urls {
        match matcher.check_url(url, &config, search) {
            Some(reason) => {
                blocked += 1;
                println!("BLOCK  {:<7} {}", format!("{:?}", reason).to_lowercase(), url);
            }
            None => println!("allow          {}", url),
        }
    }
    println!();
    println!("{} of {} blocked", blocked, urls.len());
    Ok(())
}

fn cmd_scrub(sources: ListSources, erase: bool, seed: Option<u64>, text: Option<String>) -> Result<(), String> {
    let mut config = load_config(&sources)?;
    if erase {
        config.replacement_mode = ReplacementMode::Erase;
    }

    let text = match text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| format!("Failed to read stdin: {}", e))?;
            buf
        }
    };

    let mut phrases = match seed {
        Some(seed) => RandomPhrases::seeded(&config.replacement_phrases, seed),
        None => RandomPhrases::for_config(&config),
    };
    let result = Scrubber::new().scrub(&text, &config.blocked_words, &config, &mut phrases);

    print!("{}", result.text);
    if !result.text.ends_with('\n') {
        println!();
    }
    eprintln!("{} occurrence(s) replaced", result.match_count);
    Ok(())
}

fn cmd_hash(sources: ListSources, output: &str) -> Result<(), String> {
    if sources.words.is_none() && sources.sites.is_none() {
        return Err("No list files specified (use --words and/or --sites)".to_string());
    }

    let start = Instant::now();
    let (map, stats) = load_map(&sources)?;
    lists::write_json(Path::new(output), &Value::Object(map))?;

    let mode = if sources.hashed { "hashed" } else { "plaintext" };
    println!("Compiled lists to '{}' ({})", output, mode);
    println!(
        "  Words:    {} -> {} (invalid {}, duplicate {}, subsumed {})",
        stats.words.before, stats.words.after, stats.words.invalid, stats.words.deduped, stats.words.subsumed
    );
    println!(
        "  Sites:    {} -> {} (invalid {}, duplicate {}, subsumed {})",
        stats.sites.before, stats.sites.after, stats.sites.invalid, stats.sites.deduped, stats.sites.subsumed
    );
    println!("  Time:     {:.1}ms", start.elapsed().as_secs_f64() * 1000.0);
    Ok(())
}

fn cmd_redirect(sources: ListSources, url: &str) -> Result<(), String> {
    let config = load_config(&sources)?;
    println!("{}", resolve_redirect_target(url, &config));
    Ok(())
}

fn cmd_replay(sources: ListSources, trace: &str) -> Result<(), String> {
    let (settings, _) = load_map(&sources)?;
    let steps = replay::parse_trace(&lists::read_text(trace)?)?;
    let summary = replay::replay(settings, &steps);

    for step in &summary.steps {
        match &step.outcome {
            Some(outcome) => println!("{:>8}ms  {}  => {:?}", step.at, step.label, outcome),
            None => println!("{:>8}ms  {}", step.at, step.label),
        }
        for call in &step.calls {
            println!("            host: {:?}", call);
        }
    }
    println!();
    println!(
        "{} steps, {} blocked, {} redirects, {} counted",
        summary.steps.len(),
        summary.blocked,
        summary.redirects,
        summary.counted
    );
    Ok(())
}
