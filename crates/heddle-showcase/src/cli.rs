#![forbid(unsafe_code)]

//! Command-line argument parsing for the showcase.
//!
//! Parses args manually (no external dependencies) to keep the binary lean.
//! Supports environment variable overrides via `HEDDLE_DEMO_*` prefix.

use std::env;
use std::process;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP_TEXT: &str = "\
Heddle Showcase: reactive runtime demos

USAGE:
    heddle-showcase [OPTIONS]

OPTIONS:
    --screen=NAME   Screen to run: 'counter', 'remote', 'todo', or 'all'
                    (default: all)
    --clicks=N      Simulated interactions for the counter screen
                    (default: 5)
    --quiet         Only warnings and errors on stderr
    --help, -h      Show this help message
    --version, -V   Show version

SCREENS:
    counter   Reducer-driven counter; shows batching and updater composition
    remote    Simulated remote fetch; shows cleanup-driven cancellation
    todo      Reducer-backed todo list with a memoized summary

ENVIRONMENT:
    HEDDLE_DEMO_SCREEN   Same as --screen
    HEDDLE_DEMO_CLICKS   Same as --clicks
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Counter,
    Remote,
    Todo,
    All,
}

impl Screen {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "counter" => Some(Self::Counter),
            "remote" => Some(Self::Remote),
            "todo" => Some(Self::Todo),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Options {
    pub screen: Screen,
    pub clicks: u32,
    pub quiet: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            screen: Screen::All,
            clicks: 5,
            quiet: false,
        }
    }
}

impl Options {
    /// Parse process args and env overrides; print help/version and exit
    /// where requested, exit non-zero on invalid input.
    pub fn parse_or_exit() -> Self {
        let mut options = Self::default();

        if let Ok(raw) = env::var("HEDDLE_DEMO_SCREEN") {
            match Screen::parse(&raw) {
                Some(screen) => options.screen = screen,
                None => fail(&format!("invalid HEDDLE_DEMO_SCREEN: {raw}")),
            }
        }
        if let Ok(raw) = env::var("HEDDLE_DEMO_CLICKS") {
            match raw.parse() {
                Ok(clicks) => options.clicks = clicks,
                Err(_) => fail(&format!("invalid HEDDLE_DEMO_CLICKS: {raw}")),
            }
        }

        for arg in env::args().skip(1) {
            if arg == "--help" || arg == "-h" {
                print!("{HELP_TEXT}");
                process::exit(0);
            } else if arg == "--version" || arg == "-V" {
                println!("heddle-showcase {VERSION}");
                process::exit(0);
            } else if arg == "--quiet" {
                options.quiet = true;
            } else if let Some(raw) = arg.strip_prefix("--screen=") {
                match Screen::parse(raw) {
                    Some(screen) => options.screen = screen,
                    None => fail(&format!("invalid --screen: {raw}")),
                }
            } else if let Some(raw) = arg.strip_prefix("--clicks=") {
                match raw.parse() {
                    Ok(clicks) => options.clicks = clicks,
                    Err(_) => fail(&format!("invalid --clicks: {raw}")),
                }
            } else {
                fail(&format!("unknown argument: {arg}"));
            }
        }

        options
    }
}

fn fail(message: &str) -> ! {
    eprintln!("error: {message}");
    eprintln!("run with --help for usage");
    process::exit(2);
}
