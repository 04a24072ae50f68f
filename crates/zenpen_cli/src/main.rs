//! `zenpen` host executable.
//!
//! # Responsibility
//! - Open the SQLite-backed pen store and run one pen command.
//! - Register the editor and UI views as active-pen listeners.
//!
//! # Invariants
//! - Every command runs `init` first (via `PenStore::open`).
//! - Failures print to stderr and exit with status 1.

mod views;

use clap::{value_parser, Arg, ArgMatches, Command};
use log::info;
use serde_json::Value;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use views::{EditorView, UiView};
use zenpen_core::model::pen::{PROP_CONTENT, PROP_HEADER};
use zenpen_core::{init_logging, PenStore, SqliteBackend, StoreConfig};

const TEXT_PROPS: [&str; 2] = [PROP_HEADER, PROP_CONTENT];

fn build_cli() -> Command {
    Command::new("zenpen")
        .about("Manage ZenPen pens stored on this machine")
        .version(zenpen_core::core_version())
        .subcommand_required(true)
        .arg(
            Arg::new("db")
                .long("db")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("SQLite file holding pens (default: $ZENPEN_DB_PATH)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .help("trace|debug|info|warn|error"),
        )
        .arg(
            Arg::new("log-dir")
                .long("log-dir")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Absolute directory for rolling log files"),
        )
        .subcommand(Command::new("list").about("List pens with their index"))
        .subcommand(Command::new("show").about("Print the active pen as JSON"))
        .subcommand(Command::new("new").about("Create a pen and make it active"))
        .subcommand(
            Command::new("switch").about("Make another pen active").arg(
                Arg::new("index")
                    .required(true)
                    .value_parser(value_parser!(usize)),
            ),
        )
        .subcommand(
            Command::new("get")
                .about("Print one property of the active pen")
                .arg(Arg::new("prop").required(true)),
        )
        .subcommand(
            Command::new("set")
                .about("Set one property of the active pen (JSON, or plain text)")
                .arg(Arg::new("prop").required(true))
                .arg(Arg::new("value").required(true)),
        )
}

fn resolve_config(matches: &ArgMatches) -> StoreConfig {
    let mut config = StoreConfig::from_env();
    if let Some(path) = matches.get_one::<PathBuf>("db") {
        config.db_path = path.clone();
    }
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.log_level = level.clone();
    }
    if let Some(dir) = matches.get_one::<PathBuf>("log-dir") {
        config.log_dir = Some(dir.clone());
    }
    config
}

fn run(matches: &ArgMatches) -> Result<(), String> {
    let config = resolve_config(matches);
    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, log_dir).map_err(|err| err.to_string())?;
    }

    let backend = SqliteBackend::open(&config.db_path)
        .map_err(|err| format!("cannot open `{}`: {err}", config.db_path.display()))?;
    let mut store = PenStore::open(backend).map_err(|err| err.to_string())?;
    store
        .register_listener(Arc::new(EditorView))
        .map_err(|err| err.to_string())?;
    store
        .register_listener(Arc::new(UiView))
        .map_err(|err| err.to_string())?;

    if let Some((command, _)) = matches.subcommand() {
        info!("event=cli_command module=cli status=start command={command}");
    }

    match matches.subcommand() {
        Some(("list", _)) => {
            let active = store.active_pen_index();
            for summary in store.pen_list() {
                let marker = if summary.index == active { '*' } else { ' ' };
                println!("{marker} {:>3}  {}", summary.index, summary.title);
            }
        }
        Some(("show", _)) => {
            let rendered = serde_json::to_string_pretty(store.active_pen())
                .map_err(|err| err.to_string())?;
            println!("{rendered}");
        }
        Some(("new", _)) => {
            let index = store.create_new_pen().map_err(|err| err.to_string())?;
            println!("created pen {index}");
        }
        Some(("switch", sub)) => {
            let index = sub.get_one::<usize>("index").copied().unwrap_or_default();
            store.set_active_pen(index).map_err(|err| err.to_string())?;
        }
        Some(("get", sub)) => {
            let prop = required(sub, "prop")?;
            match store.load_prop(prop) {
                Some(Value::String(text)) => println!("{text}"),
                Some(other) => println!("{other}"),
                None => eprintln!("`{prop}` is not set on pen {}", store.active_pen_index()),
            }
        }
        Some(("set", sub)) => {
            let prop = required(sub, "prop")?;
            let raw = required(sub, "value")?;
            store
                .save_prop(prop, parse_value(prop, raw))
                .map_err(|err| err.to_string())?;
        }
        _ => return Err("unknown command".to_string()),
    }

    Ok(())
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str, String> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| format!("missing argument `{name}`"))
}

/// Text fields take the argument verbatim; others parse as JSON, falling
/// back to a string.
fn parse_value(prop: &str, raw: &str) -> Value {
    if TEXT_PROPS.contains(&prop) {
        return Value::String(raw.to_string());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn main() {
    let matches = build_cli().get_matches();
    if let Err(message) = run(&matches) {
        eprintln!("zenpen: {message}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{build_cli, parse_value};
    use serde_json::json;

    #[test]
    fn cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn parse_value_prefers_json_and_falls_back_to_text() {
        assert_eq!(parse_value("targetWordCount", "500"), json!(500));
        assert_eq!(parse_value("tags", "[\"a\"]"), json!(["a"]));
        assert_eq!(parse_value("mood", "calm"), json!("calm"));
        assert_eq!(parse_value("header", "1984"), json!("1984"));
    }

    #[test]
    fn switch_parses_index() {
        let matches = build_cli()
            .try_get_matches_from(["zenpen", "switch", "2"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "switch");
        assert_eq!(sub.get_one::<usize>("index"), Some(&2));
    }
}
