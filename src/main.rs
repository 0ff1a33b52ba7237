//! Command-line front end: snapshot HTML in, JSON turns out.
//!
//! Reads a saved page snapshot (file argument or stdin), extracts the
//! chat turns, and prints them as a JSON array. The "no turns" case is
//! reported through the error sentinel on stderr with a non-zero exit,
//! so wrapping scripts can tell an empty page from a broken one.

use std::io::Read;
use std::process::ExitCode;

use aichat_export::{ExportError, Extractor, NoopRasterizer, SelectorProfile, Tunables};

struct Args {
    input: Option<String>,
    page_url: Option<String>,
    profile: Option<String>,
    pretty: bool,
}

const USAGE: &str = "usage: aichat-export [--url <page-url>] [--profile <profile.json>] [--pretty] [<snapshot.html>]

Reads the snapshot from the file argument, or stdin when omitted.
  --url <page-url>        address the snapshot was captured from; its `q`
                          query parameter backs up the question when the
                          page has none
  --profile <file>        selector profile as JSON, replacing the built-in
                          defaults when the page layout has changed
  --pretty                pretty-print the JSON output";

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        input: None,
        page_url: None,
        profile: None,
        pretty: false,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--url" => {
                args.page_url = Some(
                    iter.next()
                        .ok_or_else(|| "--url requires a value".to_string())?,
                );
            }
            "--profile" => {
                args.profile = Some(
                    iter.next()
                        .ok_or_else(|| "--profile requires a value".to_string())?,
                );
            }
            "--pretty" => args.pretty = true,
            "--help" | "-h" => return Err(USAGE.to_string()),
            _ if arg.starts_with('-') => {
                return Err(format!("unknown option: {arg}\n\n{USAGE}"));
            }
            _ if args.input.is_none() => args.input = Some(arg),
            _ => return Err(format!("unexpected argument: {arg}\n\n{USAGE}")),
        }
    }
    Ok(args)
}

fn read_input(path: Option<&str>) -> std::io::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}

fn load_profile(path: Option<&str>) -> Result<SelectorProfile, String> {
    let Some(path) = path else {
        return Ok(SelectorProfile::default());
    };
    let raw = std::fs::read_to_string(path)
        .map_err(|error| format!("failed to read profile {path}: {error}"))?;
    serde_json::from_str(&raw).map_err(|error| format!("invalid profile {path}: {error}"))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    let profile = match load_profile(args.profile.as_deref()) {
        Ok(profile) => profile,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    let html = match read_input(args.input.as_deref()) {
        Ok(html) => html,
        Err(error) => {
            eprintln!("failed to read snapshot: {error}");
            return ExitCode::FAILURE;
        }
    };

    let tunables = Tunables::default();
    let rasterizer = NoopRasterizer;
    let extractor = Extractor::new(&profile, &tunables, &rasterizer);

    let turns = match extractor.parse_chat(&html, args.page_url.as_deref()) {
        Ok(turns) => turns,
        Err(error @ ExportError::NoTurns) => {
            eprintln!("{error}");
            return ExitCode::FAILURE;
        }
        Err(error) => {
            eprintln!("export failed: {error}");
            return ExitCode::FAILURE;
        }
    };

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&turns)
    } else {
        serde_json::to_string(&turns)
    };
    match rendered {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("failed to serialize turns: {error}");
            ExitCode::FAILURE
        }
    }
}
