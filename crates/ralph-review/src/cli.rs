//! Command-line surface, modeled on `cli-sub-agent`'s `clap::Parser`
//! derive (`cli.rs`): a flat struct of global flags plus per-review-mode
//! options, rather than a subcommand tree — this binary runs exactly one
//! review cycle per invocation.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "ralph-review", version, about = "Iterative reviewer/fixer loop over a local source tree")]
pub struct Cli {
    /// Project directory to review (defaults to the current directory).
    #[arg(long)]
    pub cd: Option<PathBuf>,

    /// Review a diff against this branch instead of uncommitted changes.
    #[arg(long, conflicts_with_all = ["commit", "custom"])]
    pub base: Option<String>,

    /// Review a single commit instead of uncommitted changes.
    #[arg(long, conflicts_with_all = ["base", "custom"])]
    pub commit: Option<String>,

    /// Review under custom free-form instructions instead of a diff mode.
    #[arg(long, conflicts_with_all = ["base", "commit"])]
    pub custom: Option<String>,

    /// Run the one-shot code-simplifier pass before the reviewer loop.
    #[arg(long)]
    pub simplifier: bool,

    /// Keep iterating to `max_iterations` even after a stop signal.
    #[arg(long)]
    pub force_max_iterations: bool,

    /// Explicit config file path; missing file is a fatal error, unlike
    /// the auto-resolved XDG path which silently falls back to defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Resume under this session id instead of generating a new one.
    #[arg(long)]
    pub session: Option<String>,

    /// Increase log verbosity (-v, -vv, -vvv); overridden by `RUST_LOG`.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
