//! Purpose: `treewatch` CLI entry point.
//! Role: Binary crate root; parses args, replays a construction script under watches, emits JSON lines.
//! Invariants: stdout carries only JSON lines (events, then gave-up records, then one summary).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
use std::cell::Cell;
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};
use tracing::info;
use tracing_subscriber::EnvFilter;

use treewatch::api::{
    BlockingClock, Clock, Document, Error, ErrorKind, NodeSet, Selector, SystemClock,
    VirtualClock, WatchOptions, WatchSettings, Watcher, to_exit_code,
};
use treewatch::script::{Script, ScriptBuilder, replay};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run(std::env::args_os()) {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run<I>(args: I) -> Result<RunOutcome, Error>
where
    I: IntoIterator<Item = OsString>,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Run `treewatch --help` for usage."));
            }
        },
    };

    match cli.command {
        Command::Run(args) => run_script(args),
        Command::CheckSelector { selector } => check_selector(&selector),
    }
}

#[derive(Parser)]
#[command(
    name = "treewatch",
    version,
    about = "Watch a document tree for nodes while it is being built",
    long_about = None,
    after_help = r#"EXAMPLES
  $ treewatch run page.json --watch '#menu li' --complete footer
  $ treewatch run page.json --watch .late --attempts 20 --interval-ms 10
  $ treewatch check-selector 'ul.menu li'

Scripts are JSON: {"steps": [{"at_ms": 0, "op": "open", "tag": "body"}, ...]}
Ops: open, leaf, close, inject (after + element), finish."#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a construction script while watching for selectors
    Run(RunArgs),
    /// Validate a selector and print its normalized form
    CheckSelector {
        /// Selector such as `div#main.note` or `ul.menu li`
        selector: String,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Construction script (JSON)
    #[arg(value_hint = ValueHint::FilePath)]
    script: PathBuf,
    /// Fire as soon as the selector matches (repeatable)
    #[arg(long = "watch", value_name = "SELECTOR")]
    watch: Vec<String>,
    /// Fire once the first match's subtree is complete (repeatable)
    #[arg(long = "complete", value_name = "SELECTOR")]
    complete: Vec<String>,
    /// Also report the whole-document ready signal
    #[arg(long)]
    document_ready: bool,
    /// Settings file (JSON with interval_ms / default_attempts)
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,
    /// Milliseconds between evaluation passes (overrides --config)
    #[arg(long)]
    interval_ms: Option<u64>,
    /// Passes before a watch gives up (overrides --config)
    #[arg(long)]
    attempts: Option<u32>,
    /// Replay against wall-clock time instead of virtual time
    #[arg(long)]
    realtime: bool,
    /// Exit non-zero when any watch gave up
    #[arg(long)]
    require_all: bool,
}

struct Registration {
    selector: String,
    complete: bool,
    fired: Rc<Cell<bool>>,
}

fn run_script(args: RunArgs) -> Result<RunOutcome, Error> {
    if args.watch.is_empty() && args.complete.is_empty() && !args.document_ready {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("nothing to watch")
            .with_hint("Pass --watch <SELECTOR>, --complete <SELECTOR>, or --document-ready."));
    }
    for selector in args.watch.iter().chain(&args.complete) {
        Selector::parse(selector)?;
    }

    let settings = resolve_settings(&args)?;
    let script = Script::from_path(&args.script)?;
    info!(
        steps = script.steps.len(),
        interval_ms = settings.interval_ms,
        attempts = settings.default_attempts,
        realtime = args.realtime,
        "replaying script"
    );

    if args.realtime {
        replay_with(&script, settings, SystemClock::new(), &args)
    } else {
        replay_with(&script, settings, VirtualClock::new(), &args)
    }
}

fn resolve_settings(args: &RunArgs) -> Result<WatchSettings, Error> {
    let mut settings = match &args.config {
        Some(path) => WatchSettings::from_path(path)?,
        None => WatchSettings::default(),
    };
    if let Some(interval_ms) = args.interval_ms {
        settings = settings.with_interval_ms(interval_ms);
    }
    if let Some(attempts) = args.attempts {
        settings = settings.with_default_attempts(attempts);
    }
    Ok(settings)
}

fn replay_with<C>(
    script: &Script,
    settings: WatchSettings,
    clock: C,
    args: &RunArgs,
) -> Result<RunOutcome, Error>
where
    C: BlockingClock + Clone + 'static,
{
    let document = Rc::new(Document::new());
    let watcher = Watcher::with_settings(document.clone(), clock.clone(), settings);

    let requested = args
        .watch
        .iter()
        .map(|selector| (selector, false))
        .chain(args.complete.iter().map(|selector| (selector, true)));
    let mut registrations = Vec::new();
    for (selector, complete) in requested {
        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        let doc = document.clone();
        let at = clock.clone();
        let label = selector.clone();
        let options = if complete {
            WatchOptions::complete()
        } else {
            WatchOptions::new()
        };
        watcher.watch_with(selector.as_str(), options, move |node| {
            flag.set(true);
            emit_line(&json!({
                "event": "found",
                "selector": label,
                "complete": complete,
                "node": doc.describe(*node),
                "at_ms": millis(at.now()),
            }));
        });
        registrations.push(Registration {
            selector: selector.clone(),
            complete,
            fired,
        });
    }

    if args.document_ready {
        let at = clock.clone();
        watcher.ready(NodeSet::from_nodes([document.root()]), move |_| {
            emit_line(&json!({"event": "document_ready", "at_ms": millis(at.now())}));
        });
    }

    let mut builder = ScriptBuilder::new(document);
    replay(script, &mut builder, &watcher)?;

    let mut found = 0;
    let mut gave_up = 0;
    for registration in &registrations {
        if registration.fired.get() {
            found += 1;
            continue;
        }
        gave_up += 1;
        emit_line(&json!({
            "event": "gave_up",
            "selector": registration.selector,
            "complete": registration.complete,
        }));
    }
    emit_line(&json!({
        "summary": {
            "found": found,
            "gave_up": gave_up,
            "passes": watcher.passes(),
            "elapsed_ms": millis(clock.now()),
        }
    }));

    if args.require_all && gave_up > 0 {
        return Err(Error::new(ErrorKind::NotFound)
            .with_message(format!("{gave_up} watch(es) gave up before matching"))
            .with_hint("Raise --attempts or check the selectors against the script."));
    }
    Ok(RunOutcome::ok())
}

fn check_selector(input: &str) -> Result<RunOutcome, Error> {
    let selector = Selector::parse(input)?;
    emit_line(&json!({
        "selector": selector.to_string(),
        "compounds": selector.compounds().len(),
    }));
    Ok(RunOutcome::ok())
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn emit_line(value: &Value) {
    println!("{value}");
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let first = rendered.lines().next().unwrap_or("invalid arguments").trim();
    first.strip_prefix("error: ").unwrap_or(first).to_string()
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    err.message()
        .map(str::to_string)
        .unwrap_or_else(|| format!("{:?}", err.kind()))
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(path) = err.path() {
        lines.push(format!("path: {}", path.display()));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, error_json, error_text, resolve_settings, run};
    use clap::Parser;
    use std::ffi::OsString;
    use std::io::Write;
    use treewatch::api::{Error, ErrorKind};

    fn args(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn error_json_carries_kind_hint_and_path() {
        let err = Error::new(ErrorKind::NotFound)
            .with_message("failed to read script")
            .with_hint("check the path")
            .with_path("/tmp/x.json");
        let value = error_json(&err);
        assert_eq!(value["error"]["kind"], "NotFound");
        assert_eq!(value["error"]["message"], "failed to read script");
        assert_eq!(value["error"]["hint"], "check the path");
        assert_eq!(value["error"]["path"], "/tmp/x.json");
    }

    #[test]
    fn error_text_lists_hint() {
        let err = Error::new(ErrorKind::Usage)
            .with_message("bad input")
            .with_hint("try again");
        assert_eq!(error_text(&err), "error: bad input\nhint: try again");
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = dir.path().join("settings.json");
        let mut file = std::fs::File::create(&config).expect("create");
        file.write_all(br#"{"interval_ms": 5, "default_attempts": 7}"#)
            .expect("write");

        let cli = Cli::try_parse_from(args(&[
            "treewatch",
            "run",
            "page.json",
            "--watch",
            "p",
            "--config",
            config.to_str().expect("utf8"),
            "--attempts",
            "3",
        ]))
        .expect("parse");
        let Command::Run(run_args) = cli.command else {
            panic!("expected run");
        };
        let settings = resolve_settings(&run_args).expect("settings");
        assert_eq!(settings.interval_ms, 5);
        assert_eq!(settings.default_attempts, 3);
    }

    #[test]
    fn run_without_watches_is_usage_error() {
        let err = run(args(&["treewatch", "run", "page.json"])).expect_err("usage");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn unknown_flag_is_usage_error() {
        let err = run(args(&["treewatch", "run", "--bogus"])).expect_err("usage");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(err.message().is_some());
    }
}
