/// Event snapshot wire types: serde shapes for the JSON an event export is
/// read from. They map to the clean domain types in `lib.rs` via
/// `EventSnapshot::from_json`.
use crate::{
    AllianceSelection, Backup, CompLevel, Event, MatchAlliance, MatchRecord, PlayoffType,
    ScoreBreakdown, TeamKey, TeamRanking, WltRecord,
};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

pub type SnapshotResult<T> = Result<T, SnapshotError>;

const SAMPLE_SNAPSHOT_JSON: &str = include_str!("../fixtures/sample_event.json");
const SAMPLE_SNAPSHOT_SOURCE: &str = "embedded sample";

#[derive(Debug)]
pub enum SnapshotError {
    Io(std::io::Error, String),
    Parsing(serde_json::Error, String),
    InvalidTeamKey(String, String),
    InvalidMatch(String, String),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::Io(e, path) => write!(f, "Could not read {path}: {e}"),
            SnapshotError::Parsing(e, source) => write!(f, "Parse error in {source}: {e}"),
            SnapshotError::InvalidTeamKey(raw, context) => {
                write!(f, "Invalid team key {raw:?} in {context}")
            }
            SnapshotError::InvalidMatch(key, msg) => write!(f, "Invalid match {key}: {msg}"),
        }
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SnapshotError::Io(e, _) => Some(e),
            SnapshotError::Parsing(e, _) => Some(e),
            SnapshotError::InvalidTeamKey(..) | SnapshotError::InvalidMatch(..) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct SnapshotFile {
    pub event: WireEvent,
    #[serde(default)]
    pub alliances: Option<Vec<WireAlliance>>,
    #[serde(default)]
    pub matches: Vec<WireMatch>,
    #[serde(default)]
    pub rankings: Option<Vec<WireRanking>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WireEvent {
    pub key: String,
    pub name: Option<String>,
    pub year: Option<u16>,
    /// Integer format code; unknown codes are tolerated.
    pub playoff_type: Option<i64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WireAlliance {
    #[serde(default)]
    pub picks: Vec<String>,
    pub name: Option<String>,
    pub backup: Option<WireBackup>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WireBackup {
    #[serde(rename = "in")]
    pub team_in: String,
    #[serde(rename = "out")]
    pub team_out: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WireMatch {
    pub key: Option<String>,
    pub comp_level: String,
    pub set_number: u32,
    pub match_number: u32,
    pub alliances: WireMatchAlliances,
    pub score_breakdown: Option<WireBreakdown>,
    /// Unix seconds.
    pub time: Option<i64>,
    pub actual_time: Option<i64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WireMatchAlliances {
    pub red: WireMatchAlliance,
    pub blue: WireMatchAlliance,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WireMatchAlliance {
    #[serde(default)]
    pub team_keys: Vec<Option<String>>,
    /// `-1` until the match is scored.
    pub score: Option<i64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WireBreakdown {
    pub red: Option<Map<String, Value>>,
    pub blue: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WireRanking {
    pub team_key: String,
    pub rank: u32,
    pub record: Option<WltRecord>,
    pub qual_average: Option<f64>,
    pub matches_played: Option<u32>,
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// Everything the engine needs about one event, already validated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSnapshot {
    pub event: Event,
    pub name: Option<String>,
    pub matches: Vec<MatchRecord>,
    pub rankings: Option<Vec<TeamRanking>>,
}

impl EventSnapshot {
    pub fn from_json(raw: &str, source: &str) -> SnapshotResult<Self> {
        let file: SnapshotFile =
            serde_json::from_str(raw).map_err(|e| SnapshotError::Parsing(e, source.to_string()))?;
        Self::try_from(file)
    }

    pub fn load(path: impl AsRef<Path>) -> SnapshotResult<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let content =
            std::fs::read_to_string(path).map_err(|e| SnapshotError::Io(e, display.clone()))?;
        debug!("loaded snapshot from {display} ({} bytes)", content.len());
        Self::from_json(&content, &display)
    }

    /// Sample event compiled into the binary, for running without any data.
    pub fn embedded_sample() -> SnapshotResult<Self> {
        Self::from_json(SAMPLE_SNAPSHOT_JSON, SAMPLE_SNAPSHOT_SOURCE)
    }

    pub fn rankings(&self) -> Option<&[TeamRanking]> {
        self.rankings.as_deref()
    }
}

impl TryFrom<SnapshotFile> for EventSnapshot {
    type Error = SnapshotError;

    fn try_from(file: SnapshotFile) -> SnapshotResult<Self> {
        let event_key = file.event.key.clone();
        let year = file.event.year.unwrap_or_else(|| year_from_key(&event_key));
        let playoff_type = file.event.playoff_type.and_then(|code| {
            let parsed = PlayoffType::from_code(code);
            if parsed.is_none() {
                warn!("{event_key}: unknown playoff type code {code}");
            }
            parsed
        });

        let alliance_selections = file
            .alliances
            .map(|alliances| {
                alliances
                    .into_iter()
                    .enumerate()
                    .map(|(i, a)| selection(a, &format!("{event_key} alliance {}", i + 1)))
                    .collect::<SnapshotResult<Vec<_>>>()
            })
            .transpose()?;

        let matches = file
            .matches
            .into_iter()
            .map(|m| match_record(m, &event_key))
            .collect::<SnapshotResult<Vec<_>>>()?;

        let rankings = file
            .rankings
            .map(|rows| {
                rows.into_iter()
                    .map(|r| ranking(r, &event_key))
                    .collect::<SnapshotResult<Vec<_>>>()
            })
            .transpose()?;

        Ok(EventSnapshot {
            event: Event {
                key: event_key,
                year,
                playoff_type,
                alliance_selections,
            },
            name: file.event.name,
            matches,
            rankings,
        })
    }
}

/// `2019casj` -> 2019; 0 when the key has no year prefix.
fn year_from_key(key: &str) -> u16 {
    let digits: String = key.chars().take(4).collect();
    digits.parse().unwrap_or_else(|_| {
        warn!("{key}: no year in event key");
        0
    })
}

fn team_key(raw: &str, context: &str) -> SnapshotResult<TeamKey> {
    TeamKey::parse(raw).ok_or_else(|| SnapshotError::InvalidTeamKey(raw.to_string(), context.to_string()))
}

fn is_placeholder(raw: Option<&str>) -> bool {
    match raw.map(str::trim) {
        None => true,
        Some(s) => matches!(s, "" | "None" | "null" | "frc0" | "0"),
    }
}

fn selection(wire: WireAlliance, context: &str) -> SnapshotResult<AllianceSelection> {
    let picks = wire
        .picks
        .iter()
        .map(|p| team_key(p, context))
        .collect::<SnapshotResult<Vec<_>>>()?;
    let backup = match wire.backup {
        Some(b) => Some(Backup {
            team_in: team_key(&b.team_in, context)?,
            team_out: team_key(&b.team_out, context)?,
        }),
        None => None,
    };
    Ok(AllianceSelection { picks, name: wire.name, backup })
}

fn match_alliance(wire: WireMatchAlliance, context: &str) -> SnapshotResult<MatchAlliance> {
    let mut alliance = MatchAlliance::new(Vec::new(), wire.score.and_then(|s| u32::try_from(s).ok()));
    for raw in &wire.team_keys {
        if is_placeholder(raw.as_deref()) {
            alliance.placeholders += 1;
            continue;
        }
        let raw = raw.as_deref().unwrap_or_default();
        alliance.teams.push(team_key(raw, context)?);
    }
    Ok(alliance)
}

/// Keeps numeric fields only; booleans and enum strings are dropped.
fn numeric_fields(fields: Option<Map<String, Value>>) -> BTreeMap<String, f64> {
    fields
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(k, v)| v.as_f64().map(|n| (k, n)))
        .collect()
}

fn timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
}

fn match_record(wire: WireMatch, event_key: &str) -> SnapshotResult<MatchRecord> {
    let key = wire.key.clone().unwrap_or_else(|| {
        format!(
            "{event_key}_{}{}m{}",
            wire.comp_level, wire.set_number, wire.match_number
        )
    });
    let comp_level: CompLevel = wire
        .comp_level
        .parse()
        .map_err(|e: String| SnapshotError::InvalidMatch(key.clone(), e))?;
    if wire.match_number == 0 {
        return Err(SnapshotError::InvalidMatch(key, "match number 0".into()));
    }

    let red = match_alliance(wire.alliances.red, &key)?;
    let blue = match_alliance(wire.alliances.blue, &key)?;
    if red.placeholders > 0 || blue.placeholders > 0 {
        debug!("{key}: teams not yet known");
    }

    let mut record = MatchRecord::new(event_key, comp_level, wire.set_number, wire.match_number, red, blue);
    record.score_breakdown = wire.score_breakdown.map(|b| ScoreBreakdown {
        red: numeric_fields(b.red),
        blue: numeric_fields(b.blue),
    });
    record.time = timestamp(wire.time);
    record.actual_time = timestamp(wire.actual_time);
    Ok(record)
}

fn ranking(wire: WireRanking, event_key: &str) -> SnapshotResult<TeamRanking> {
    let context = format!("{event_key} rankings");
    Ok(TeamRanking {
        team_key: team_key(&wire.team_key, &context)?,
        rank: wire.rank,
        matches_played: wire
            .matches_played
            .or_else(|| wire.record.map(|r| r.played()))
            .unwrap_or(0),
        record: wire.record,
        qual_average: wire.qual_average,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use crate::AllianceColor;

    #[test]
    fn embedded_sample_parses() {
        let snapshot = EventSnapshot::embedded_sample().expect("sample snapshot should parse");
        assert_eq!(snapshot.event.key, "2019casj");
        assert_eq!(snapshot.event.year, 2019);
        assert_eq!(snapshot.event.playoff_type, Some(PlayoffType::Bracket8Team));
        assert_eq!(snapshot.event.selections().map(<[_]>::len), Some(8));
        assert_eq!(snapshot.matches.len(), 36);
        assert_eq!(snapshot.rankings().map(<[_]>::len), Some(30));
    }

    #[test]
    fn sample_backup_is_declared() {
        let snapshot = EventSnapshot::embedded_sample().unwrap();
        let third = &snapshot.event.selections().unwrap()[2];
        assert_eq!(
            third.backup,
            Some(Backup { team_in: team(971), team_out: team(649) })
        );
    }

    fn minimal(matches: &str) -> String {
        format!(r#"{{"event": {{"key": "2018cmptx", "playoff_type": 4}}, "matches": [{matches}]}}"#)
    }

    #[test]
    fn unplayed_scores_and_placeholders() {
        let raw = minimal(
            r#"{"comp_level": "f", "set_number": 1, "match_number": 1,
                "alliances": {"red": {"team_keys": ["frc1", "frc2", "frc3"], "score": -1},
                              "blue": {"team_keys": ["None", null, ""], "score": -1}}}"#,
        );
        let snapshot = EventSnapshot::from_json(&raw, "test").unwrap();
        let m = &snapshot.matches[0];
        assert!(!m.has_been_played());
        assert_eq!(m.red.teams, teams(&[1, 2, 3]));
        assert!(m.blue.teams.is_empty());
        assert_eq!(m.blue.placeholders, 3);
        assert!(m.has_placeholder_team());
        assert_eq!(snapshot.event.year, 2018, "year falls back to the key");
        assert_eq!(snapshot.event.playoff_type, Some(PlayoffType::RoundRobin6Team));
    }

    #[test]
    fn breakdown_keeps_numeric_fields() {
        let raw = minimal(
            r#"{"comp_level": "sf", "set_number": 1, "match_number": 2, "time": 1524000000,
                "alliances": {"red": {"team_keys": ["frc1"], "score": 10},
                              "blue": {"team_keys": ["frc2"], "score": 12}},
                "score_breakdown": {"red": {"endgamePoints": 30, "autoRobot1": "AutoRun", "rp": true},
                                    "blue": {"endgamePoints": 5.5}}}"#,
        );
        let snapshot = EventSnapshot::from_json(&raw, "test").unwrap();
        let m = &snapshot.matches[0];
        let breakdown = m.score_breakdown.as_ref().unwrap();
        assert_eq!(breakdown.metric(AllianceColor::Red, "endgamePoints"), Some(30.0));
        assert_eq!(breakdown.metric(AllianceColor::Blue, "endgamePoints"), Some(5.5));
        assert_eq!(breakdown.red.len(), 1);
        assert_eq!(m.time.map(|t| t.timestamp()), Some(1_524_000_000));
        assert_eq!(m.winning_alliance(), Some(AllianceColor::Blue));
    }

    #[test]
    fn unknown_playoff_type_is_tolerated() {
        let raw = r#"{"event": {"key": "2020test", "year": 2020, "playoff_type": 42}}"#;
        let snapshot = EventSnapshot::from_json(raw, "test").unwrap();
        assert_eq!(snapshot.event.playoff_type, None);
        assert!(snapshot.matches.is_empty());
    }

    #[test]
    fn bad_team_key_is_an_error() {
        let raw = minimal(
            r#"{"comp_level": "qm", "set_number": 1, "match_number": 1,
                "alliances": {"red": {"team_keys": ["frcABC"], "score": 1},
                              "blue": {"team_keys": [], "score": 0}}}"#,
        );
        let err = EventSnapshot::from_json(&raw, "test").unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidTeamKey(ref k, _) if k == "frcABC"), "{err}");
    }

    #[test]
    fn bad_comp_level_is_an_error() {
        let raw = minimal(
            r#"{"key": "2018cmptx_xx1m1", "comp_level": "xx", "set_number": 1, "match_number": 1,
                "alliances": {"red": {"team_keys": [], "score": 1},
                              "blue": {"team_keys": [], "score": 0}}}"#,
        );
        let err = EventSnapshot::from_json(&raw, "test").unwrap_err();
        assert_eq!(err.to_string(), "Invalid match 2018cmptx_xx1m1: unknown comp level: xx");
    }

    #[test]
    fn malformed_json_reports_source() {
        let err = EventSnapshot::from_json("{", "snapshot.json").unwrap_err();
        assert!(err.to_string().starts_with("Parse error in snapshot.json"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = EventSnapshot::load("/nonexistent/snapshot.json").unwrap_err();
        assert!(matches!(err, SnapshotError::Io(..)));
    }
}
