//! Where one team stands at an event, as data and as a sentence.
//!
//! Everything here is read off the organized matches, the bracket and the
//! advancement tables; nothing is stored between calls.
use crate::advancement::{PlayoffAdvancement, double_elim_round};
use crate::alliance::is_same_alliance;
use crate::bracket::{BracketSlot, SlotKey};
use crate::playoffs::{PlayoffAdvancementResult, generate_playoff_advancement};
use crate::{
    AllianceColor, AllianceSelection, Backup, CompLevel, Event, MatchRecord, PlayoffType, TeamKey,
    TeamRanking, WltRecord,
};
use log::debug;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualStatus {
    pub rank: Option<u32>,
    pub num_teams: usize,
    pub record: Option<WltRecord>,
    pub matches_played: u32,
    pub qual_average: Option<f64>,
    /// Every qualification match at the event has been played.
    pub complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllianceStatus {
    /// 1-based alliance number.
    pub number: usize,
    pub name: String,
    /// Draft position, captain is 0. `None` for a backup robot.
    pub pick: Option<usize>,
    pub backup: Option<Backup>,
}

impl AllianceStatus {
    pub fn pick_label(&self) -> String {
        match self.pick {
            None => "Backup".to_string(),
            Some(0) => "Captain".to_string(),
            Some(1) => "1st Pick".to_string(),
            Some(2) => "2nd Pick".to_string(),
            Some(3) => "3rd Pick".to_string(),
            Some(n) => format!("{n}th Pick"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayoffOutcome {
    Playing,
    Won,
    Eliminated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayoffStatus {
    pub level: CompLevel,
    pub outcome: PlayoffOutcome,
    pub current_level_record: Option<WltRecord>,
    pub record: Option<WltRecord>,
    /// Average-score format only.
    pub playoff_average: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "level", rename_all = "snake_case")]
pub enum TeamState {
    NotStarted,
    Qualifying,
    AwaitingPlayoffs,
    Playoffs(CompLevel),
    /// Won `level`, waiting on the next one.
    Advanced(CompLevel),
    /// `Eliminated(Qm)` means not picked for an alliance.
    Eliminated(CompLevel),
    WonEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamEventStatus {
    pub team_key: TeamKey,
    pub event_key: String,
    pub state: TeamState,
    pub qual: Option<QualStatus>,
    pub alliance: Option<AllianceStatus>,
    pub playoff: Option<PlayoffStatus>,
    pub alliance_status_str: Option<String>,
    pub playoff_status_str: Option<String>,
    pub overall_status_str: String,
}

impl TeamEventStatus {
    /// The overall sentence without markup.
    pub fn plain_text(&self) -> String {
        self.render(false).overall
    }

    pub fn render(&self, bold: bool) -> StatusStrings {
        let fmt = Markup { bold };
        let qual = self
            .qual
            .as_ref()
            .and_then(|q| qual_phrase(q, &fmt));
        let alliance = self
            .alliance
            .as_ref()
            .map(|a| alliance_phrase(a, self.state, &fmt));
        let playoff = self
            .playoff
            .as_ref()
            .map(|p| playoff_phrase(p, self.state, &fmt));

        let subject = format!("Team {}", self.team_key.number());
        let overall = if self.state == TeamState::NotStarted && qual.is_none() {
            format!("{subject} is waiting for the event to begin.")
        } else {
            let parts: Vec<&str> = [&qual, &alliance, &playoff]
                .into_iter()
                .filter_map(|p| p.as_deref())
                .collect();
            match parts.as_slice() {
                [] => format!("{subject} is waiting for the event to begin."),
                [only] => format!("{subject} {only}."),
                [first, second] => format!("{subject} {first} and {second}."),
                [init @ .., last] => format!("{subject} {}, and {last}.", init.join(", ")),
            }
        };

        StatusStrings {
            alliance: alliance.map(|a| format!("{subject} {a}.")),
            playoff: playoff.map(|p| format!("{subject} {p}.")),
            overall,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusStrings {
    pub alliance: Option<String>,
    pub playoff: Option<String>,
    pub overall: String,
}

struct Markup {
    bold: bool,
}

impl Markup {
    fn b(&self, text: impl AsRef<str>) -> String {
        if self.bold {
            format!("<b>{}</b>", text.as_ref())
        } else {
            text.as_ref().to_string()
        }
    }
}

fn qual_phrase(qual: &QualStatus, fmt: &Markup) -> Option<String> {
    if qual.matches_played == 0 && qual.rank.is_none() {
        return None;
    }
    let (is, has) = if qual.complete { ("was", "had") } else { ("is", "has") };
    let phrase = match (qual.rank, qual.record) {
        (Some(rank), Some(record)) => format!(
            "{is} {} with a record of {} in quals",
            fmt.b(format!("Rank {rank}/{}", qual.num_teams)),
            fmt.b(record.to_string())
        ),
        (Some(rank), None) => format!("{is} {} in quals", fmt.b(format!("Rank {rank}/{}", qual.num_teams))),
        (None, Some(record)) => format!("{has} a record of {} in quals", fmt.b(record.to_string())),
        (None, None) => return None,
    };
    Some(phrase)
}

fn alliance_phrase(alliance: &AllianceStatus, state: TeamState, fmt: &Markup) -> String {
    let verb = match state {
        TeamState::WonEvent | TeamState::Eliminated(_) => "competed",
        TeamState::Playoffs(_) | TeamState::Advanced(_) => "is competing",
        TeamState::NotStarted | TeamState::Qualifying | TeamState::AwaitingPlayoffs => "will be competing",
    };
    format!(
        "{verb} in the playoffs as the {} of {}",
        fmt.b(alliance.pick_label()),
        fmt.b(&alliance.name)
    )
}

fn playoff_phrase(playoff: &PlayoffStatus, state: TeamState, fmt: &Markup) -> String {
    let level = playoff.level.name();
    let with_record = |phrase: String| match playoff.record {
        Some(record) => format!("{phrase} with a playoff record of {}", fmt.b(record.to_string())),
        None => phrase,
    };
    match state {
        TeamState::WonEvent => with_record(fmt.b("won the event")),
        TeamState::Eliminated(_) => with_record(format!("was {}", fmt.b(format!("eliminated in the {level}")))),
        TeamState::Advanced(_) => with_record(fmt.b(format!("won the {level}"))),
        _ => match playoff.current_level_record {
            Some(record) => format!("is {}", fmt.b(format!("currently {record} in the {level}"))),
            None => format!("is {}", fmt.b(format!("currently competing in the {level}"))),
        },
    }
}

// ---------------------------------------------------------------------------
// Computation
// ---------------------------------------------------------------------------

/// Status for `team` at `event`. Computes the playoff result internally; use
/// [`team_status_with`] when one is already at hand.
pub fn team_status(
    team: TeamKey,
    event: &Event,
    matches: &[MatchRecord],
    rankings: Option<&[TeamRanking]>,
) -> TeamEventStatus {
    let result = generate_playoff_advancement(event, matches);
    team_status_with(team, event, matches, rankings, &result)
}

pub fn team_status_with(
    team: TeamKey,
    event: &Event,
    matches: &[MatchRecord],
    rankings: Option<&[TeamRanking]>,
    result: &PlayoffAdvancementResult,
) -> TeamEventStatus {
    let qual = qual_status(team, matches, rankings);
    let alliance = alliance_status(team, event.selections());
    let picks = event
        .selections()
        .and_then(|s| alliance.as_ref().and_then(|a| s.get(a.number - 1)))
        .map(alliance_identity)
        .unwrap_or_default();

    let playoff = match result.playoff_type {
        Some(PlayoffType::RoundRobin6Team) => round_robin_status(team, &picks, result),
        Some(PlayoffType::AvgScore8Team) => average_score_status(team, &picks, matches, result),
        Some(pt) if pt.is_double_elim() => double_elim_status(team, &picks, pt, result),
        _ => bracket_status(team, &picks, result),
    };

    let state = classify(qual.as_ref(), alliance.as_ref(), playoff.as_ref(), event);
    debug!("{team} at {}: {state:?}", event.key);

    let mut status = TeamEventStatus {
        team_key: team,
        event_key: event.key.clone(),
        state,
        qual,
        alliance,
        playoff,
        alliance_status_str: None,
        playoff_status_str: None,
        overall_status_str: String::new(),
    };
    let strings = status.render(true);
    status.alliance_status_str = strings.alliance;
    status.playoff_status_str = strings.playoff;
    status.overall_status_str = strings.overall;
    status
}

fn classify(
    qual: Option<&QualStatus>,
    alliance: Option<&AllianceStatus>,
    playoff: Option<&PlayoffStatus>,
    event: &Event,
) -> TeamState {
    if let Some(p) = playoff {
        return match (p.outcome, p.level) {
            (PlayoffOutcome::Won, CompLevel::F) => TeamState::WonEvent,
            (PlayoffOutcome::Won, level) => TeamState::Advanced(level),
            (PlayoffOutcome::Eliminated, level) => TeamState::Eliminated(level),
            (PlayoffOutcome::Playing, level) => TeamState::Playoffs(level),
        };
    }
    let Some(qual) = qual else {
        return TeamState::NotStarted;
    };
    if !qual.complete {
        return if qual.matches_played > 0 || qual.rank.is_some() {
            TeamState::Qualifying
        } else {
            TeamState::NotStarted
        };
    }
    if alliance.is_none() && event.alliance_selections.is_some() {
        TeamState::Eliminated(CompLevel::Qm)
    } else {
        TeamState::AwaitingPlayoffs
    }
}

fn qual_status(team: TeamKey, matches: &[MatchRecord], rankings: Option<&[TeamRanking]>) -> Option<QualStatus> {
    let quals: Vec<&MatchRecord> = matches.iter().filter(|m| m.comp_level == CompLevel::Qm).collect();
    let complete = !quals.is_empty() && quals.iter().all(|m| m.has_been_played());
    let field: HashSet<TeamKey> = quals
        .iter()
        .flat_map(|m| AllianceColor::BOTH.map(|c| m.alliance(c)))
        .flat_map(|a| a.teams.iter().copied())
        .collect();

    if let Some(rankings) = rankings
        && let Some(ranking) = rankings.iter().find(|r| r.team_key == team)
    {
        return Some(QualStatus {
            rank: Some(ranking.rank),
            num_teams: rankings.len().max(field.len()),
            record: ranking.record,
            matches_played: ranking.matches_played,
            qual_average: ranking.qual_average,
            complete,
        });
    }

    let mut record = WltRecord::default();
    let mut total = 0u64;
    let mut scheduled = false;
    for m in &quals {
        let Some(color) = m.color_of(team) else {
            continue;
        };
        scheduled = true;
        if !m.has_been_played() {
            continue;
        }
        record.record(color, m.winning_alliance());
        total += u64::from(m.score(color).unwrap_or(0));
    }
    if !scheduled {
        return None;
    }
    let played = record.played();
    Some(QualStatus {
        rank: None,
        num_teams: field.len(),
        record: (played > 0).then_some(record),
        matches_played: played,
        qual_average: (played > 0).then(|| total as f64 / f64::from(played)),
        complete,
    })
}

fn alliance_status(team: TeamKey, selections: Option<&[AllianceSelection]>) -> Option<AllianceStatus> {
    selections
        .unwrap_or_default()
        .iter()
        .enumerate()
        .find_map(|(i, selection)| {
            let pick = match selection.picks.iter().position(|&t| t == team) {
                Some(p) => Some(p),
                None if selection.backup.map(|b| b.team_in) == Some(team) => None,
                None => return None,
            };
            Some(AllianceStatus {
                number: i + 1,
                name: selection.display_name(i + 1),
                pick,
                backup: selection.backup,
            })
        })
}

fn alliance_identity(selection: &AllianceSelection) -> Vec<TeamKey> {
    let mut teams = selection.picks.clone();
    if let Some(backup) = selection.backup {
        teams.push(backup.team_in);
    }
    teams
}

/// `team` is on `teams`, either as a player or through its alliance.
fn plays_for(teams: &[TeamKey], team: TeamKey, picks: &[TeamKey]) -> bool {
    teams.contains(&team) || (!picks.is_empty() && is_same_alliance(teams, picks))
}

fn side_in(slot: &BracketSlot, team: TeamKey, picks: &[TeamKey]) -> Option<AllianceColor> {
    AllianceColor::BOTH
        .into_iter()
        .find(|&c| plays_for(slot.alliance(c), team, picks))
}

fn team_series<'r>(
    team: TeamKey,
    picks: &'r [TeamKey],
    result: &'r PlayoffAdvancementResult,
) -> impl Iterator<Item = (SlotKey, &'r BracketSlot, AllianceColor)> + 'r {
    result
        .bracket
        .iter()
        .filter_map(move |(&key, slot)| side_in(slot, team, picks).map(|color| (key, slot, color)))
}

fn sum_records(records: impl Iterator<Item = WltRecord>) -> WltRecord {
    records.fold(WltRecord::default(), |acc, r| WltRecord {
        wins: acc.wins + r.wins,
        losses: acc.losses + r.losses,
        ties: acc.ties + r.ties,
    })
}

/// Outcome of a ranked table level: nobody is out until every match is in.
fn table_outcome(complete: bool, advances: bool) -> PlayoffOutcome {
    match (complete, advances) {
        (false, _) => PlayoffOutcome::Playing,
        (true, true) => PlayoffOutcome::Won,
        (true, false) => PlayoffOutcome::Eliminated,
    }
}

fn series_outcome(slot: &BracketSlot, color: AllianceColor) -> PlayoffOutcome {
    match slot.winning_alliance {
        Some(w) if w == color => PlayoffOutcome::Won,
        Some(_) => PlayoffOutcome::Eliminated,
        None => PlayoffOutcome::Playing,
    }
}

/// Single elimination: the deepest series the team reached decides.
fn bracket_status(
    team: TeamKey,
    picks: &[TeamKey],
    result: &PlayoffAdvancementResult,
) -> Option<PlayoffStatus> {
    let series: Vec<_> = team_series(team, picks, result).collect();
    let (key, slot, color) = series.iter().max_by_key(|(key, _, _)| *key).copied()?;
    Some(PlayoffStatus {
        level: key.level,
        outcome: series_outcome(slot, color),
        current_level_record: Some(slot.record(color)),
        record: Some(sum_records(series.iter().map(|(_, s, c)| s.record(*c)))),
        playoff_average: None,
    })
}

/// Double elimination: out on the second lost series, or on losing the finals.
fn double_elim_status(
    team: TeamKey,
    picks: &[TeamKey],
    playoff_type: PlayoffType,
    result: &PlayoffAdvancementResult,
) -> Option<PlayoffStatus> {
    let series: Vec<_> = team_series(team, picks, result).collect();
    let (last_key, last_slot, last_color) = series.iter().max_by_key(|(key, _, _)| *key).copied()?;
    let record = Some(sum_records(series.iter().map(|(_, s, c)| s.record(*c))));

    let finals = series.iter().find(|(key, _, _)| {
        double_elim_round(playoff_type, key.level, key.set_number).is_some_and(|r| r.is_finals())
    });
    if let Some(&(key, slot, color)) = finals {
        return Some(PlayoffStatus {
            level: key.level,
            outcome: series_outcome(slot, color),
            current_level_record: Some(slot.record(color)),
            record,
            playoff_average: None,
        });
    }

    let losses = series
        .iter()
        .filter(|(_, slot, color)| series_outcome(slot, *color) == PlayoffOutcome::Eliminated)
        .count();
    let outcome = if losses >= 2 {
        PlayoffOutcome::Eliminated
    } else {
        PlayoffOutcome::Playing
    };
    Some(PlayoffStatus {
        level: last_key.level,
        outcome,
        current_level_record: Some(last_slot.record(last_color)),
        record,
        playoff_average: None,
    })
}

/// Round robin: playing until every round-robin match is in, then the top
/// two alliances move on to the finals series.
fn round_robin_status(
    team: TeamKey,
    picks: &[TeamKey],
    result: &PlayoffAdvancementResult,
) -> Option<PlayoffStatus> {
    if let Some(status) = bracket_status(team, picks, result) {
        let rr_record = result
            .round_robin()
            .and_then(|rr| rr.row_for(team))
            .map(|row| row.record)
            .unwrap_or_default();
        let finals_record = status.record.unwrap_or_default();
        return Some(PlayoffStatus {
            record: Some(sum_records([rr_record, finals_record].into_iter())),
            ..status
        });
    }

    let rr = result.round_robin()?;
    let row = rr.rows.iter().find(|r| plays_for(&r.teams, team, picks))?;
    Some(PlayoffStatus {
        level: rr.level,
        outcome: table_outcome(rr.complete, row.advances),
        current_level_record: Some(row.record),
        record: Some(row.record),
        playoff_average: None,
    })
}

/// Average score: no win-loss records outside the finals series.
fn average_score_status(
    team: TeamKey,
    picks: &[TeamKey],
    matches: &[MatchRecord],
    result: &PlayoffAdvancementResult,
) -> Option<PlayoffStatus> {
    if let Some(mut status) = bracket_status(team, picks, result) {
        status.record = None;
        status.playoff_average = finals_average(team, picks, matches);
        return Some(status);
    }

    let Some(PlayoffAdvancement::AverageScore(avg)) = &result.advancement else {
        return None;
    };
    for level in [CompLevel::Sf, CompLevel::Qf, CompLevel::Ef] {
        let Some(row) = avg.level(level).iter().find(|r| plays_for(&r.teams, team, picks)) else {
            continue;
        };
        let complete = matches
            .iter()
            .filter(|m| m.comp_level == level)
            .all(|m| m.has_been_played());
        return Some(PlayoffStatus {
            level,
            outcome: table_outcome(complete, row.advances),
            current_level_record: None,
            record: None,
            playoff_average: Some(row.average),
        });
    }
    None
}

fn finals_average(team: TeamKey, picks: &[TeamKey], matches: &[MatchRecord]) -> Option<f64> {
    let scores: Vec<u32> = matches
        .iter()
        .filter(|m| m.comp_level == CompLevel::F && m.has_been_played())
        .filter_map(|m| {
            let color = AllianceColor::BOTH
                .into_iter()
                .find(|&c| plays_for(&m.alliance(c).teams, team, picks))?;
            m.score(color)
        })
        .collect();
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().map(|&s| f64::from(s)).sum::<f64>() / scores.len() as f64)
}
