use agent_review::app::{NavigationEngine, NavigationTarget, ReviewState};
use agent_review::config::{self, ReviewConfig};
use agent_review::diff::{inline_pairs, join_diff_sources, parse_diff};
use agent_review::review::{
    load_comments, parse_included_ids, parse_review, write_requests, CommentTag, ReviewRequest,
};
use agent_review::watch::{DiffWatcher, WatchEvent};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Review agent-produced diffs: navigate, comment, and send feedback
#[derive(Parser)]
#[command(name = "ar", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse diff files (joined in order) and list the changed files
    Parse {
        /// Per-turn diff files, oldest first ("-" reads stdin)
        diffs: Vec<PathBuf>,

        /// Live diff of the running turn, skipped if identical to the last turn
        #[arg(long)]
        live: Option<PathBuf>,

        /// Print the parsed model as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the navigation targets of a diff
    Targets {
        diff: PathBuf,

        /// Collapse files matching these paths or ids
        #[arg(long = "collapse")]
        collapse: Vec<String>,

        /// Put the cursor on PATH or PATH:LINE
        #[arg(long)]
        goto: Option<String>,
    },

    /// Show inline changed spans for 1:1 replaced lines
    Inline { diff: PathBuf },

    /// Create a comment on PATH:LINE (or a range with --to) and print the request
    Comment {
        diff: PathBuf,

        /// Anchor as PATH:LINE
        #[arg(long)]
        at: String,

        /// Last new-side line of a range comment
        #[arg(long)]
        to: Option<usize>,

        /// Tag: clarity, scope, risk, nit
        #[arg(short, long)]
        tag: Option<String>,

        body: String,
    },

    /// Build the review message from a comment snapshot
    Message {
        diff: PathBuf,

        /// Comment snapshot (JSON array)
        #[arg(short, long)]
        comments: PathBuf,

        /// Comma-separated comment ids (default: every open comment)
        #[arg(long, value_delimiter = ',')]
        ids: Option<Vec<String>>,

        /// Session receiving the message
        #[arg(long, default_value = "local")]
        session: String,

        /// Print the outgoing requests as JSON lines instead of the text
        #[arg(long)]
        requests: bool,
    },

    /// Parse a review message back into sections
    ReadMessage {
        /// Message file ("-" reads stdin)
        file: PathBuf,
    },

    /// Watch a growing diff file and report the followed file
    Follow {
        diff: PathBuf,

        /// Debounce interval in milliseconds
        #[arg(long, default_value_t = 300)]
        debounce_ms: u64,
    },

    /// Write the effective configuration to the global config file
    SaveConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("failed to resolve current directory")?;
    let config = config::load_config(&cwd);
    init_logging(&config);

    match cli.command {
        Commands::Parse { diffs, live, json } => cmd_parse(&diffs, live.as_deref(), json),
        Commands::Targets { diff, collapse, goto } => cmd_targets(&config, &diff, &collapse, goto.as_deref()),
        Commands::Inline { diff } => cmd_inline(&diff),
        Commands::Comment {
            diff,
            at,
            to,
            tag,
            body,
        } => cmd_comment(&config, &diff, &at, to, tag.as_deref(), &body),
        Commands::Message {
            diff,
            comments,
            ids,
            session,
            requests,
        } => cmd_message(&config, &diff, &comments, ids.as_deref(), &session, requests),
        Commands::ReadMessage { file } => cmd_read_message(&file),
        Commands::Follow { diff, debounce_ms } => cmd_follow(&config, &diff, debounce_ms),
        Commands::SaveConfig => {
            let path = config::save_config(&config)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}

/// `AR_LOG` wins over the configured filter
fn init_logging(config: &ReviewConfig) {
    let filter = EnvFilter::try_from_env("AR_LOG")
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).context("failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn load_state(config: &ReviewConfig, diff: &Path) -> Result<ReviewState> {
    let raw = read_input(diff)?;
    let mut state = ReviewState::from_config("local", config);
    state.nav_mut().set_following(false);
    state.update_diff(&raw);
    Ok(state)
}

/// "src/a.rs:12" -> ("src/a.rs", Some(12)); a trailing non-number stays in the path
fn split_location(spec: &str) -> (&str, Option<usize>) {
    match spec.rsplit_once(':') {
        Some((path, line)) => match line.parse() {
            Ok(n) => (path, Some(n)),
            Err(_) => (spec, None),
        },
        None => (spec, None),
    }
}

// ── Commands ──

fn cmd_parse(diffs: &[PathBuf], live: Option<&Path>, json: bool) -> Result<()> {
    let accumulated = diffs.iter().map(|p| read_input(p)).collect::<Result<Vec<_>>>()?;
    let live = live.map(read_input).transpose()?;
    let files = parse_diff(&join_diff_sources(accumulated.as_slice(), live.as_deref()));

    let mut out = io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &files).context("failed to encode diff")?;
        writeln!(out)?;
        return Ok(());
    }
    for file in &files {
        writeln!(
            out,
            "{} {}  +{} -{}  {} hunk{}  [{}]",
            file.change_type.symbol(),
            file.path(),
            file.stats.additions,
            file.stats.deletions,
            file.hunks.len(),
            if file.hunks.len() == 1 { "" } else { "s" },
            file.id
        )?;
    }
    Ok(())
}

fn cmd_targets(config: &ReviewConfig, diff: &Path, collapse: &[String], goto: Option<&str>) -> Result<()> {
    let mut state = load_state(config, diff)?;
    for key in collapse {
        let found = state
            .nav()
            .files()
            .iter()
            .position(|f| f.id == *key || f.path() == key.as_str());
        match found {
            Some(file) => {
                if !state.nav().is_file_collapsed(file) {
                    state.nav_mut().toggle_collapse(NavigationTarget::FileHeader { file });
                }
            }
            None => tracing::warn!(key = %key, "no such file to collapse"),
        }
    }
    if let Some(goto) = goto {
        let (path, line) = split_location(goto);
        if !state.request_navigation(path, line) {
            eprintln!("No match for {goto}");
        }
    }

    let nav = state.nav();
    let mut out = io::stdout().lock();
    for (idx, target) in nav.targets().iter().enumerate() {
        let marker = if idx == nav.cursor() { '>' } else { ' ' };
        writeln!(out, "{marker} {}", describe_target(nav, target))?;
    }
    Ok(())
}

fn describe_target(nav: &NavigationEngine, target: &NavigationTarget) -> String {
    let Some(file) = nav.files().get(target.file()) else {
        return String::new();
    };
    match *target {
        NavigationTarget::FileHeader { file: idx } => format!(
            "{} {} ({}, +{} -{}){}",
            file.change_type.symbol(),
            file.path(),
            file.change_type.label(),
            file.stats.additions,
            file.stats.deletions,
            if nav.is_file_collapsed(idx) { " [collapsed]" } else { "" }
        ),
        NavigationTarget::HunkHeader { file: idx, hunk } => match file.hunks.get(hunk) {
            Some(h) => format!(
                "  {}{}",
                h.header,
                if nav.is_hunk_collapsed(idx, hunk) { " [collapsed]" } else { "" }
            ),
            None => String::new(),
        },
        NavigationTarget::Line { hunk, line, .. } => match file.line(hunk, line) {
            Some(l) => format!(
                "    {:>5} {:>5} {}{}",
                l.old_num.map(|n| n.to_string()).unwrap_or_default(),
                l.new_num.map(|n| n.to_string()).unwrap_or_default(),
                l.prefix,
                l.content
            ),
            None => String::new(),
        },
    }
}

fn cmd_inline(diff: &Path) -> Result<()> {
    let files = parse_diff(&read_input(diff)?);
    let mut out = io::stdout().lock();
    for file in &files {
        for hunk in &file.hunks {
            for pair in inline_pairs(hunk) {
                let old = &hunk.lines[pair.removed_idx];
                let new = &hunk.lines[pair.added_idx];
                writeln!(out, "{} {}", file.path(), hunk.header)?;
                writeln!(out, "  -{}  {:?}", old.content, pair.diff.old_ranges)?;
                writeln!(out, "  +{}  {:?}", new.content, pair.diff.new_ranges)?;
            }
        }
    }
    Ok(())
}

fn cmd_comment(
    config: &ReviewConfig,
    diff: &Path,
    at: &str,
    to: Option<usize>,
    tag: Option<&str>,
    body: &str,
) -> Result<()> {
    let tag = match tag {
        Some(t) => Some(CommentTag::parse(t).with_context(|| {
            let known: Vec<&str> = CommentTag::ALL.iter().map(|t| t.as_str()).collect();
            format!("unknown tag '{t}' (expected one of: {})", known.join(", "))
        })?),
        None => None,
    };
    let (path, line) = split_location(at);
    let line = line.with_context(|| format!("expected PATH:LINE, got '{at}'"))?;

    let mut state = load_state(config, diff)?;
    let request = draft_comment(&mut state, path, line, to, tag, body)?;
    write_requests(&mut io::stdout().lock(), &[request])
}

/// Put the cursor on new-side `line` of `path`; a fallback to a header is an error
fn focus_line(state: &mut ReviewState, path: &str, line: usize) -> Result<()> {
    if !state.request_navigation(path, Some(line)) {
        anyhow::bail!("{path} is not in the diff");
    }
    if state.cursor_line_number() != Some(line) {
        anyhow::bail!("line {line} of {path} is not a commentable line in the diff");
    }
    Ok(())
}

fn draft_comment(
    state: &mut ReviewState,
    path: &str,
    line: usize,
    to: Option<usize>,
    tag: Option<CommentTag>,
    body: &str,
) -> Result<ReviewRequest> {
    focus_line(state, path, line)?;
    if let Some(end) = to {
        state.set_mark();
        focus_line(state, path, end).context("invalid --to line")?;
    }
    if !state.open_composer() {
        anyhow::bail!("{path}:{line} is not a commentable line");
    }
    state.set_draft(body, tag);
    state.submit_comment().context("comment body is empty")
}

fn cmd_message(
    config: &ReviewConfig,
    diff: &Path,
    comments: &Path,
    ids: Option<&[String]>,
    session: &str,
    requests: bool,
) -> Result<()> {
    let raw = read_input(diff)?;
    let mut state = ReviewState::from_config(session, config);
    state.update_diff(&raw);
    state.update_comments(load_comments(comments));

    let mut out = io::stdout().lock();
    if requests {
        let requests = state.send_review(ids);
        if requests.is_empty() {
            eprintln!("No comments to send");
        }
        return write_requests(&mut out, &requests);
    }
    match state.review_message(ids) {
        Some(message) => writeln!(out, "{}", message.text)?,
        None => eprintln!("No comments to send"),
    }
    Ok(())
}

fn cmd_read_message(file: &Path) -> Result<()> {
    let text = read_input(file)?;
    let mut out = io::stdout().lock();
    for section in parse_review(&text) {
        writeln!(out, "{}", section.file_path)?;
        for comment in &section.comments {
            let tag = comment.tag.as_deref().map(|t| format!(" [{t}]")).unwrap_or_default();
            writeln!(out, "  {}{tag}: {}", comment.line_ref, comment.body.replace('\n', " / "))?;
            if let Some(code) = &comment.code {
                let lang = code.language.as_deref().unwrap_or("text");
                writeln!(out, "    ({} lines of {lang})", code.code.lines().count())?;
            }
        }
    }
    let ids = parse_included_ids(&text);
    if !ids.is_empty() {
        writeln!(out, "ids: {}", ids.join(","))?;
    }
    Ok(())
}

fn cmd_follow(config: &ReviewConfig, diff: &Path, debounce_ms: u64) -> Result<()> {
    let (tx, rx) = mpsc::channel::<WatchEvent>();
    let _watcher = DiffWatcher::new(diff, debounce_ms, tx)?;

    let mut state = ReviewState::from_config("follow", config);
    state.nav_mut().set_following(true);
    refresh_followed(&mut state, diff);
    report_cursor(&state);

    for event in rx {
        match event {
            WatchEvent::DiffChanged => {
                let before = state.nav().current_target();
                let count = state.nav().files().len();
                refresh_followed(&mut state, diff);
                if state.nav().current_target() != before || state.nav().files().len() != count {
                    report_cursor(&state);
                }
            }
            WatchEvent::Error(e) => eprintln!("watch error: {e}"),
        }
    }
    Ok(())
}

/// A diff that briefly disappears while being rewritten keeps the last model
fn refresh_followed(state: &mut ReviewState, diff: &Path) {
    match std::fs::read_to_string(diff) {
        Ok(raw) => state.update_diff(&raw),
        Err(e) => tracing::warn!(path = %diff.display(), error = %e, "could not read diff"),
    }
}

fn report_cursor(state: &ReviewState) {
    let nav = state.nav();
    match nav.current_file() {
        Some(file) => println!(
            "{} files · following {} (+{} -{})",
            nav.files().len(),
            file.path(),
            file.stats.additions,
            file.stats.deletions
        ),
        None => println!("waiting for changes"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_review::review::NewComment;

    const DIFF: &str = "diff --git a/src/a.rs b/src/a.rs\n@@ -1,3 +1,4 @@\n one\n-two\n+deux\n+trois\n four\n";

    fn make_state() -> ReviewState {
        let mut state = ReviewState::from_config("t", &ReviewConfig::default());
        state.nav_mut().set_following(false);
        state.update_diff(DIFF);
        state
    }

    #[test]
    fn draft_comment_covers_requested_range() {
        let mut state = make_state();
        let request = draft_comment(&mut state, "src/a.rs", 2, Some(4), Some(CommentTag::Risk), "why?").unwrap();
        assert_eq!(
            request,
            ReviewRequest::CreateComment(NewComment {
                file_path: "src/a.rs".to_string(),
                line_start: 2,
                line_end: Some(4),
                body: "why?".to_string(),
                tag: Some(CommentTag::Risk),
            })
        );
    }

    #[test]
    fn draft_comment_rejects_end_line_outside_diff() {
        let mut state = make_state();
        let err = draft_comment(&mut state, "src/a.rs", 2, Some(9), None, "why?").unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("--to"), "{message}");
        assert!(message.contains("line 9 of src/a.rs"), "{message}");
    }

    #[test]
    fn file_header_description_names_change() {
        let state = make_state();
        let text = describe_target(state.nav(), &NavigationTarget::FileHeader { file: 0 });
        assert_eq!(text, "~ src/a.rs (modified, +2 -1)");
    }

    #[test]
    fn draft_comment_rejects_start_line_outside_diff() {
        let mut state = make_state();
        assert!(draft_comment(&mut state, "src/a.rs", 9, Some(3), None, "why?").is_err());
        assert!(draft_comment(&mut state, "src/b.rs", 1, None, None, "why?").is_err());
    }

    #[test]
    fn split_location_parses_trailing_line() {
        assert_eq!(split_location("src/a.rs:12"), ("src/a.rs", Some(12)));
        assert_eq!(split_location("src/a.rs"), ("src/a.rs", None));
        assert_eq!(split_location("C:dir"), ("C:dir", None));
    }

    #[test]
    fn cli_parses_message_ids() {
        let cli = Cli::try_parse_from(["ar", "message", "d.diff", "-c", "c.json", "--ids", "a,b"]).unwrap();
        match cli.command {
            Commands::Message { ids, requests, .. } => {
                assert_eq!(ids, Some(vec!["a".to_string(), "b".to_string()]));
                assert!(!requests);
            }
            _ => panic!("expected message command"),
        }
    }
}
