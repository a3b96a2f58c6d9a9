mod render;
mod settings;

use crate::settings::Settings;
use anyhow::Context;
use frc_playoff_engine::advancement::DoubleElimMatches;
use frc_playoff_engine::organizer;
use frc_playoff_engine::playoffs::{ApiAdvancementLevel, ApiBracketSeries, api_advancement, api_bracket};
use frc_playoff_engine::snapshot::EventSnapshot;
use frc_playoff_engine::status::team_status_with;
use frc_playoff_engine::{
    Event, MatchRecord, PlayoffTemplate, TeamEventStatus, TeamKey, generate_playoff_advancement,
};
use log::{debug, error, info};
use serde::Serialize;
use std::path::PathBuf;

const DEFAULT_LIST_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq)]
struct Options {
    json: bool,
    team: Option<TeamKey>,
    recent: usize,
    upcoming: usize,
    snapshot: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            json: false,
            team: None,
            recent: DEFAULT_LIST_LEN,
            upcoming: DEFAULT_LIST_LEN,
            snapshot: None,
        }
    }
}

#[derive(Debug, PartialEq)]
enum CliAction {
    Run(Options),
    Help,
    Version,
}

fn main() -> anyhow::Result<()> {
    let options = match handle_cli_args(std::env::args().skip(1)) {
        Ok(CliAction::Run(options)) => options,
        Ok(CliAction::Help) => {
            println!("{}", usage_text());
            return Ok(());
        }
        Ok(CliAction::Version) => {
            println!("frc-playoffs {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Err(message) => {
            eprintln!("{message}\n\n{}", usage_text());
            std::process::exit(2);
        }
    };

    better_panic::install();

    let settings = Settings::load();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.log_level.as_str()),
    )
    .format_timestamp(None)
    .init();

    let snapshot = load_snapshot(&options, &settings).inspect_err(|e| error!("{e:#}"))?;
    run(&options, &snapshot)
}

fn handle_cli_args(args: impl IntoIterator<Item = String>) -> Result<CliAction, String> {
    let mut options = Options::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(CliAction::Help),
            "-V" | "--version" => return Ok(CliAction::Version),
            "--json" => options.json = true,
            "--team" => {
                let raw = args.next().ok_or("--team needs a team number")?;
                let team = TeamKey::parse(&raw).ok_or_else(|| format!("Invalid team: {raw}"))?;
                options.team = Some(team);
            }
            "--recent" | "--upcoming" => {
                let raw = args.next().ok_or_else(|| format!("{arg} needs a count"))?;
                let n = raw
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid count for {arg}: {raw}"))?;
                if arg == "--recent" {
                    options.recent = n;
                } else {
                    options.upcoming = n;
                }
            }
            flag if flag.starts_with('-') => return Err(format!("Unknown argument: {flag}")),
            path => {
                if options.snapshot.is_some() {
                    return Err(format!("Unexpected argument: {path}"));
                }
                options.snapshot = Some(PathBuf::from(path));
            }
        }
    }
    Ok(CliAction::Run(options))
}

fn usage_text() -> &'static str {
    "frc-playoffs - FRC playoff brackets and advancement tables

Usage:
  frc-playoffs [OPTIONS] [SNAPSHOT.json]
  frc-playoffs --help
  frc-playoffs --version

Options:
  --json           Print API-shaped JSON instead of text
  --team <N>       Show one team's event status (254 or frc254)
  --recent <N>     Recent matches to list (default 5)
  --upcoming <N>   Upcoming matches to list (default 5)

Environment:
  FRC_PLAYOFFS_SNAPSHOT   Snapshot path used when none is given
  FRC_PLAYOFFS_LOG        Log level (default warn)

Without a snapshot an embedded sample event is shown."
}

/// Snapshot fallback chain: command line path, `FRC_PLAYOFFS_SNAPSHOT`, then
/// the embedded sample event.
fn load_snapshot(options: &Options, settings: &Settings) -> anyhow::Result<EventSnapshot> {
    let path = options
        .snapshot
        .clone()
        .or_else(|| settings.snapshot_path.clone());
    match path {
        Some(path) => EventSnapshot::load(&path)
            .with_context(|| format!("could not load snapshot {}", path.display())),
        None => {
            info!("no snapshot given, using the embedded sample event");
            EventSnapshot::embedded_sample().context("embedded sample snapshot is invalid")
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    event: &'a Event,
    name: Option<&'a str>,
    playoff_template: Option<PlayoffTemplate>,
    bracket: Vec<ApiBracketSeries>,
    advancement: Vec<ApiAdvancementLevel>,
    double_elim: Option<&'a DoubleElimMatches>,
    recent: Vec<&'a MatchRecord>,
    upcoming: Vec<&'a MatchRecord>,
    team_status: Option<&'a TeamEventStatus>,
}

fn run(options: &Options, snapshot: &EventSnapshot) -> anyhow::Result<()> {
    let event = &snapshot.event;
    let matches: Vec<MatchRecord> =
        organizer::prune_decided_series(&snapshot.matches, event.playoff_type)
            .into_iter()
            .cloned()
            .collect();
    debug!(
        "{}: {} of {} matches still relevant",
        event.key,
        matches.len(),
        snapshot.matches.len()
    );

    let result = generate_playoff_advancement(event, &matches);
    let status = options
        .team
        .map(|team| team_status_with(team, event, &matches, snapshot.rankings(), &result));

    let published: Vec<MatchRecord> = match options.team {
        Some(team) => organizer::team_matches(&matches, team)
            .into_iter()
            .filter(|m| !m.has_placeholder_team())
            .cloned()
            .collect(),
        None => organizer::publishable(&matches).cloned().collect(),
    };
    let recent = organizer::recent(&published, options.recent);
    let upcoming = organizer::upcoming(&published, options.upcoming);

    if options.json {
        let report = JsonReport {
            event,
            name: snapshot.name.as_deref(),
            playoff_template: result.template,
            bracket: api_bracket(&result),
            advancement: api_advancement(&result),
            double_elim: result.double_elim.as_ref(),
            recent,
            upcoming,
            team_status: status.as_ref(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let mut lines = render::event_header(snapshot, &result);
    if let Some(status) = &status {
        lines.extend(render::team_status(status));
    }
    lines.extend(render::bracket(&result));
    lines.extend(render::advancement(&result));
    if let Some(rounds) = &result.double_elim {
        lines.extend(render::double_elim(rounds));
    }
    lines.extend(render::match_list("Recent matches", &recent));
    lines.extend(render::match_list("Upcoming matches", &upcoming));
    println!("{}", lines.join("\n"));
    Ok(())
}
