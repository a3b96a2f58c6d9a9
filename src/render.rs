//! Plain-text tables for the terminal.
use chrono::{DateTime, Utc};
use frc_playoff_engine::advancement::{
    AverageScoreAdvancement, DoubleElimMatches, PlayoffAdvancement, RoundRobinAdvancement,
    TiebreakerMetric,
};
use frc_playoff_engine::bracket::BracketSlot;
use frc_playoff_engine::snapshot::EventSnapshot;
use frc_playoff_engine::{AllianceColor, MatchRecord, PlayoffAdvancementResult, TeamEventStatus, TeamKey};

const RULE: &str = "--------------------------------------------------------------------------------";

/// `254-971-1678`, or `TBD` before the teams are known.
pub fn teams_label(teams: &[TeamKey]) -> String {
    if teams.is_empty() {
        return "TBD".to_string();
    }
    teams
        .iter()
        .map(|t| t.number().to_string())
        .collect::<Vec<_>>()
        .join("-")
}

pub fn clock(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format("%a %H:%M UTC").to_string())
        .unwrap_or_default()
}

fn heading(title: &str) -> Vec<String> {
    vec![String::new(), title.to_string(), RULE.to_string()]
}

pub fn event_header(snapshot: &EventSnapshot, result: &PlayoffAdvancementResult) -> Vec<String> {
    let name = snapshot.name.as_deref().unwrap_or(&snapshot.event.key);
    let format = result
        .playoff_type
        .map(|pt| pt.label())
        .unwrap_or("Unknown playoff format");
    vec![format!("{name} ({})", snapshot.event.key), format.to_string()]
}

fn side_label(slot: &BracketSlot, color: AllianceColor) -> String {
    let teams = teams_label(slot.alliance(color));
    match slot.name(color) {
        Some(name) => format!("{name} ({teams})"),
        None => teams,
    }
}

pub fn bracket(result: &PlayoffAdvancementResult) -> Vec<String> {
    if result.bracket.is_empty() {
        return Vec::new();
    }
    let mut lines = heading("Bracket");
    for (key, slot) in &result.bracket {
        let mark = |color| {
            if slot.winning_alliance == Some(color) { "*" } else { " " }
        };
        lines.push(format!(
            "{:<4} {}{:<34} {:>6}   vs   {}{:<34} {:>6}",
            key.to_string(),
            mark(AllianceColor::Red),
            side_label(slot, AllianceColor::Red),
            slot.red_record.to_string(),
            mark(AllianceColor::Blue),
            side_label(slot, AllianceColor::Blue),
            slot.blue_record.to_string(),
        ));
    }
    lines
}

fn average_score(avg: &AverageScoreAdvancement) -> Vec<String> {
    let mut lines = Vec::new();
    for (level, rows) in &avg.levels {
        lines.extend(heading(&format!("{} (average score)", level.name())));
        for row in rows {
            lines.push(format!(
                "{:>2}. {:<24} {:>8.2}  {:>2} played  {}",
                row.rank,
                teams_label(&row.teams),
                row.average,
                row.matches_played(),
                if row.advances { "advances" } else { "" }
            ));
        }
    }
    lines
}

fn round_robin(rr: &RoundRobinAdvancement) -> Vec<String> {
    let state = if rr.complete { "complete" } else { "in progress" };
    let mut lines = heading(&format!("Round Robin ({state})"));
    let [tb1, tb2] = rr.tiebreakers;
    lines.push(format!(
        "    {:<24} {:<8} {:>4} {:>14} {:>14}",
        "Alliance",
        "W-L-T",
        "Pts",
        tb1.label(),
        tb2.label()
    ));
    for row in &rr.rows {
        let second = if tb2 == TiebreakerMetric::Unused {
            String::new()
        } else {
            format!("{:.0}", row.tiebreaker2)
        };
        lines.push(format!(
            "{:>2}. {:<24} {:<8} {:>4} {:>14.0} {:>14} {}",
            row.rank,
            row.name.clone().unwrap_or_else(|| teams_label(&row.teams)),
            row.record.to_string(),
            row.champ_points,
            row.tiebreaker1,
            second,
            if row.advances { "*" } else { "" }
        ));
    }
    lines
}

pub fn advancement(result: &PlayoffAdvancementResult) -> Vec<String> {
    match &result.advancement {
        None => Vec::new(),
        Some(PlayoffAdvancement::AverageScore(avg)) => average_score(avg),
        Some(PlayoffAdvancement::RoundRobin(rr)) => round_robin(rr),
    }
}

pub fn double_elim(rounds: &DoubleElimMatches) -> Vec<String> {
    let mut lines = Vec::new();
    for round in &rounds.rounds {
        lines.extend(heading(&round.label));
        lines.extend(round.matches.iter().map(match_line));
    }
    lines
}

fn score(m: &MatchRecord, color: AllianceColor) -> String {
    m.score(color).map(|s| s.to_string()).unwrap_or_else(|| "--".to_string())
}

pub fn match_line(m: &MatchRecord) -> String {
    let line = format!(
        "{:<22} {:>18} {:>4} - {:<4} {:<18} {}",
        m.short_name(),
        teams_label(&m.red.teams),
        score(m, AllianceColor::Red),
        score(m, AllianceColor::Blue),
        teams_label(&m.blue.teams),
        clock(m.actual_time.or(m.time)),
    );
    line.trim_end().to_string()
}

pub fn match_list(title: &str, matches: &[&MatchRecord]) -> Vec<String> {
    if matches.is_empty() {
        return Vec::new();
    }
    let mut lines = heading(title);
    lines.extend(matches.iter().map(|m| match_line(m)));
    lines
}

pub fn team_status(status: &TeamEventStatus) -> Vec<String> {
    let mut lines = heading(&format!("Team {}", status.team_key.number()));
    lines.push(status.plain_text());
    lines
}
