pub mod advancement;
pub mod alliance;
pub mod bracket;
pub mod organizer;
pub mod playoffs;
pub mod snapshot;
pub mod status;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub use playoffs::{PlayoffAdvancementResult, PlayoffTemplate, generate_playoff_advancement};
pub use status::{TeamEventStatus, team_status};

// ---------------------------------------------------------------------------
// Domain types, independent of the snapshot wire format
// ---------------------------------------------------------------------------

/// A team identity, e.g. `frc254`. Stored as the bare team number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TeamKey(u32);

impl TeamKey {
    pub fn new(number: u32) -> Self {
        Self(number)
    }

    pub fn number(self) -> u32 {
        self.0
    }

    /// Parse `"frc254"` or `"254"`. Placeholder slots (`"None"`, `""`, `"frc0"`)
    /// yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let digits = raw.strip_prefix("frc").unwrap_or(raw);
        match digits.parse::<u32>() {
            Ok(0) | Err(_) => None,
            Ok(n) => Some(Self(n)),
        }
    }
}

impl fmt::Display for TeamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frc{}", self.0)
    }
}

impl From<TeamKey> for String {
    fn from(key: TeamKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for TeamKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TeamKey::parse(&value).ok_or_else(|| format!("invalid team key: {value:?}"))
    }
}

/// Competition stage. Declaration order is play order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompLevel {
    Qm,
    Ef,
    Qf,
    Sf,
    F,
}

impl CompLevel {
    pub const ALL: [CompLevel; 5] = [
        CompLevel::Qm,
        CompLevel::Ef,
        CompLevel::Qf,
        CompLevel::Sf,
        CompLevel::F,
    ];

    pub const ELIMS: [CompLevel; 4] = [CompLevel::Ef, CompLevel::Qf, CompLevel::Sf, CompLevel::F];

    pub fn as_str(&self) -> &'static str {
        match self {
            CompLevel::Qm => "qm",
            CompLevel::Ef => "ef",
            CompLevel::Qf => "qf",
            CompLevel::Sf => "sf",
            CompLevel::F => "f",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CompLevel::Qm => "Qualifications",
            CompLevel::Ef => "Octo-finals",
            CompLevel::Qf => "Quarterfinals",
            CompLevel::Sf => "Semifinals",
            CompLevel::F => "Finals",
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            CompLevel::Qm => "Quals",
            CompLevel::Ef => "Eighths",
            CompLevel::Qf => "Quarters",
            CompLevel::Sf => "Semis",
            CompLevel::F => "Finals",
        }
    }

    /// Rank used by `MatchRecord::play_order`.
    pub fn play_order_rank(&self) -> u64 {
        match self {
            CompLevel::Qm => 1,
            CompLevel::Ef => 2,
            CompLevel::Qf => 3,
            CompLevel::Sf => 4,
            CompLevel::F => 5,
        }
    }

    pub fn is_elim(&self) -> bool {
        !matches!(self, CompLevel::Qm)
    }
}

impl fmt::Display for CompLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "qm" => Ok(CompLevel::Qm),
            "ef" => Ok(CompLevel::Ef),
            "qf" => Ok(CompLevel::Qf),
            "sf" => Ok(CompLevel::Sf),
            "f" => Ok(CompLevel::F),
            other => Err(format!("unknown comp level: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllianceColor {
    Red,
    Blue,
}

impl AllianceColor {
    pub const BOTH: [AllianceColor; 2] = [AllianceColor::Red, AllianceColor::Blue];

    pub fn as_str(&self) -> &'static str {
        match self {
            AllianceColor::Red => "red",
            AllianceColor::Blue => "blue",
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            AllianceColor::Red => AllianceColor::Blue,
            AllianceColor::Blue => AllianceColor::Red,
        }
    }
}

impl fmt::Display for AllianceColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Win-loss-tie record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WltRecord {
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
}

impl WltRecord {
    pub fn played(&self) -> u32 {
        self.wins + self.losses + self.ties
    }

    /// Count a played match from the point of view of `color`.
    pub fn record(&mut self, color: AllianceColor, winner: Option<AllianceColor>) {
        match winner {
            Some(w) if w == color => self.wins += 1,
            Some(_) => self.losses += 1,
            None => self.ties += 1,
        }
    }
}

impl fmt::Display for WltRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.wins, self.losses, self.ties)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchAlliance {
    pub teams: Vec<TeamKey>,
    /// Team slots still unknown ("None" in incomplete elimination schedules).
    pub placeholders: usize,
    /// `None` until the match has been scored.
    pub score: Option<u32>,
}

impl MatchAlliance {
    pub fn new(teams: Vec<TeamKey>, score: Option<u32>) -> Self {
        Self { teams, placeholders: 0, score }
    }
}

/// Numeric score breakdown fields per alliance, as reported by FMS.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub red: BTreeMap<String, f64>,
    pub blue: BTreeMap<String, f64>,
}

impl ScoreBreakdown {
    pub fn metric(&self, color: AllianceColor, field: &str) -> Option<f64> {
        match color {
            AllianceColor::Red => self.red.get(field).copied(),
            AllianceColor::Blue => self.blue.get(field).copied(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRecord {
    pub event_key: String,
    pub comp_level: CompLevel,
    pub set_number: u32,
    pub match_number: u32,
    pub red: MatchAlliance,
    pub blue: MatchAlliance,
    pub score_breakdown: Option<ScoreBreakdown>,
    pub time: Option<DateTime<Utc>>,
    pub actual_time: Option<DateTime<Utc>>,
}

impl MatchRecord {
    pub fn new(
        event_key: impl Into<String>,
        comp_level: CompLevel,
        set_number: u32,
        match_number: u32,
        red: MatchAlliance,
        blue: MatchAlliance,
    ) -> Self {
        Self {
            event_key: event_key.into(),
            comp_level,
            set_number,
            match_number,
            red,
            blue,
            score_breakdown: None,
            time: None,
            actual_time: None,
        }
    }

    pub fn alliance(&self, color: AllianceColor) -> &MatchAlliance {
        match color {
            AllianceColor::Red => &self.red,
            AllianceColor::Blue => &self.blue,
        }
    }

    pub fn score(&self, color: AllianceColor) -> Option<u32> {
        self.alliance(color).score
    }

    pub fn has_been_played(&self) -> bool {
        self.red.score.is_some() && self.blue.score.is_some()
    }

    /// `None` for ties and for matches not yet played.
    pub fn winning_alliance(&self) -> Option<AllianceColor> {
        match (self.red.score, self.blue.score) {
            (Some(r), Some(b)) if r > b => Some(AllianceColor::Red),
            (Some(r), Some(b)) if b > r => Some(AllianceColor::Blue),
            _ => None,
        }
    }

    pub fn is_tie(&self) -> bool {
        self.has_been_played() && self.red.score == self.blue.score
    }

    /// `2019casj_qm12`, `2019casj_qf1m2`.
    pub fn key_name(&self) -> String {
        match self.comp_level {
            CompLevel::Qm => format!("{}_qm{}", self.event_key, self.match_number),
            level => format!(
                "{}_{}{}m{}",
                self.event_key, level, self.set_number, self.match_number
            ),
        }
    }

    /// `Quals 12`, `Quarters 1 Match 2`.
    pub fn short_name(&self) -> String {
        match self.comp_level {
            CompLevel::Qm => format!("Quals {}", self.match_number),
            level => format!(
                "{} {} Match {}",
                level.short_name(),
                self.set_number,
                self.match_number
            ),
        }
    }

    /// Total ordering across levels in the order matches are actually played.
    pub fn play_order(&self) -> u64 {
        self.comp_level.play_order_rank() * 1_000_000
            + u64::from(self.match_number) * 1_000
            + u64::from(self.set_number)
    }

    pub fn teams(&self) -> impl Iterator<Item = TeamKey> + '_ {
        self.red.teams.iter().chain(self.blue.teams.iter()).copied()
    }

    pub fn color_of(&self, team: TeamKey) -> Option<AllianceColor> {
        AllianceColor::BOTH
            .into_iter()
            .find(|&color| self.alliance(color).teams.contains(&team))
    }

    pub fn has_placeholder_team(&self) -> bool {
        self.red.placeholders > 0 || self.blue.placeholders > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backup {
    #[serde(rename = "in")]
    pub team_in: TeamKey,
    #[serde(rename = "out")]
    pub team_out: TeamKey,
}

/// One alliance from the alliance-selection draft, captain first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllianceSelection {
    pub picks: Vec<TeamKey>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub backup: Option<Backup>,
}

impl AllianceSelection {
    pub fn new(picks: Vec<TeamKey>) -> Self {
        Self { picks, name: None, backup: None }
    }

    /// `number` is 1-based.
    pub fn display_name(&self, number: usize) -> String {
        self.name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Alliance {number}"))
    }
}

/// Playoff format of an event. Codes match the public FRC data APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayoffType {
    Bracket8Team,
    Bracket16Team,
    Bracket4Team,
    AvgScore8Team,
    RoundRobin6Team,
    LegacyDoubleElim8Team,
    Bo5Finals,
    Bo3Finals,
    Custom,
    DoubleElim8Team,
    DoubleElim4Team,
}

impl PlayoffType {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(PlayoffType::Bracket8Team),
            1 => Some(PlayoffType::Bracket16Team),
            2 => Some(PlayoffType::Bracket4Team),
            3 => Some(PlayoffType::AvgScore8Team),
            4 => Some(PlayoffType::RoundRobin6Team),
            5 => Some(PlayoffType::LegacyDoubleElim8Team),
            6 => Some(PlayoffType::Bo5Finals),
            7 => Some(PlayoffType::Bo3Finals),
            8 => Some(PlayoffType::Custom),
            10 => Some(PlayoffType::DoubleElim8Team),
            11 => Some(PlayoffType::DoubleElim4Team),
            _ => None,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            PlayoffType::Bracket8Team => 0,
            PlayoffType::Bracket16Team => 1,
            PlayoffType::Bracket4Team => 2,
            PlayoffType::AvgScore8Team => 3,
            PlayoffType::RoundRobin6Team => 4,
            PlayoffType::LegacyDoubleElim8Team => 5,
            PlayoffType::Bo5Finals => 6,
            PlayoffType::Bo3Finals => 7,
            PlayoffType::Custom => 8,
            PlayoffType::DoubleElim8Team => 10,
            PlayoffType::DoubleElim4Team => 11,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PlayoffType::Bracket8Team => "Elimination Bracket (8 Alliances)",
            PlayoffType::Bracket16Team => "Elimination Bracket (16 Alliances)",
            PlayoffType::Bracket4Team => "Elimination Bracket (4 Alliances)",
            PlayoffType::AvgScore8Team => "Average Score (8 Alliances)",
            PlayoffType::RoundRobin6Team => "Round Robin (6 Alliances)",
            PlayoffType::LegacyDoubleElim8Team => "Legacy Double Elimination Bracket (8 Alliances)",
            PlayoffType::Bo5Finals => "Best of 5 Finals",
            PlayoffType::Bo3Finals => "Best of 3 Finals",
            PlayoffType::Custom => "Custom",
            PlayoffType::DoubleElim8Team => "Double Elimination Bracket (8 Alliances)",
            PlayoffType::DoubleElim4Team => "Double Elimination Bracket (4 Alliances)",
        }
    }

    /// Series wins needed to take a set at `level`.
    pub fn win_threshold(&self, level: CompLevel) -> u32 {
        match (self, level) {
            (PlayoffType::Bo5Finals, _) => 3,
            (PlayoffType::DoubleElim8Team | PlayoffType::DoubleElim4Team, CompLevel::F) => 2,
            (PlayoffType::DoubleElim8Team | PlayoffType::DoubleElim4Team, _) => 1,
            _ => 2,
        }
    }

    /// Levels that get a slot in the bracket table. Formats that rank
    /// alliances in a table only get the finals series.
    pub fn bracket_levels(&self) -> &'static [CompLevel] {
        match self {
            PlayoffType::Bracket16Team | PlayoffType::LegacyDoubleElim8Team => &CompLevel::ELIMS,
            PlayoffType::AvgScore8Team | PlayoffType::RoundRobin6Team => &[CompLevel::F],
            _ => &[CompLevel::Qf, CompLevel::Sf, CompLevel::F],
        }
    }

    pub fn is_double_elim(&self) -> bool {
        matches!(
            self,
            PlayoffType::LegacyDoubleElim8Team
                | PlayoffType::DoubleElim8Team
                | PlayoffType::DoubleElim4Team
        )
    }
}

/// The event-level inputs the engine needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Event {
    pub key: String,
    pub year: u16,
    pub playoff_type: Option<PlayoffType>,
    pub alliance_selections: Option<Vec<AllianceSelection>>,
}

impl Event {
    pub fn selections(&self) -> Option<&[AllianceSelection]> {
        self.alliance_selections.as_deref()
    }
}

/// Qualification ranking row supplied by the rankings collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRanking {
    pub team_key: TeamKey,
    pub rank: u32,
    #[serde(default)]
    pub record: Option<WltRecord>,
    #[serde(default)]
    pub qual_average: Option<f64>,
    #[serde(default)]
    pub matches_played: u32,
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub fn team(n: u32) -> TeamKey {
        TeamKey::new(n)
    }

    pub fn teams(ns: &[u32]) -> Vec<TeamKey> {
        ns.iter().copied().map(TeamKey::new).collect()
    }

    /// A played match; pass `None` scores for an unplayed one.
    pub fn elim(
        level: CompLevel,
        set: u32,
        number: u32,
        red: &[u32],
        blue: &[u32],
        scores: Option<(u32, u32)>,
    ) -> MatchRecord {
        MatchRecord::new(
            "2019test",
            level,
            set,
            number,
            MatchAlliance::new(teams(red), scores.map(|s| s.0)),
            MatchAlliance::new(teams(blue), scores.map(|s| s.1)),
        )
    }

    pub fn qual(number: u32, red: &[u32], blue: &[u32], scores: Option<(u32, u32)>) -> MatchRecord {
        elim(CompLevel::Qm, 1, number, red, blue, scores)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn team_key_parses_prefixed_and_bare_numbers() {
        assert_eq!(TeamKey::parse("frc254"), Some(team(254)));
        assert_eq!(TeamKey::parse("1678"), Some(team(1678)));
        assert_eq!(team(254).to_string(), "frc254");
        assert_eq!(team(254).number(), 254);
    }

    #[test]
    fn placeholder_team_strings_are_not_teams() {
        assert_eq!(TeamKey::parse("None"), None);
        assert_eq!(TeamKey::parse(""), None);
        assert_eq!(TeamKey::parse("frc0"), None);
    }

    #[test]
    fn team_key_serializes_as_display_key() {
        let json = serde_json::to_string(&team(971)).unwrap();
        assert_eq!(json, "\"frc971\"");
        let back: TeamKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, team(971));
    }

    #[test]
    fn winning_alliance_handles_ties_and_unplayed() {
        let red_win = elim(CompLevel::Qf, 1, 1, &[1, 2, 3], &[4, 5, 6], Some((50, 40)));
        let tie = elim(CompLevel::Qf, 1, 2, &[1, 2, 3], &[4, 5, 6], Some((40, 40)));
        let unplayed = elim(CompLevel::Qf, 1, 3, &[1, 2, 3], &[4, 5, 6], None);

        assert_eq!(red_win.winning_alliance(), Some(AllianceColor::Red));
        assert_eq!(tie.winning_alliance(), None);
        assert!(tie.is_tie());
        assert_eq!(unplayed.winning_alliance(), None);
        assert!(!unplayed.has_been_played());
        assert!(!unplayed.is_tie());
    }

    #[test]
    fn key_and_short_names() {
        let m = elim(CompLevel::Qf, 3, 2, &[1, 2, 3], &[4, 5, 6], None);
        assert_eq!(m.key_name(), "2019test_qf3m2");
        assert_eq!(m.short_name(), "Quarters 3 Match 2");
        let q = qual(12, &[1, 2, 3], &[4, 5, 6], None);
        assert_eq!(q.key_name(), "2019test_qm12");
        assert_eq!(q.short_name(), "Quals 12");
    }

    #[test]
    fn play_order_interleaves_sets_within_a_level() {
        let qf1m2 = elim(CompLevel::Qf, 1, 2, &[], &[], None);
        let qf4m1 = elim(CompLevel::Qf, 4, 1, &[], &[], None);
        let sf1m1 = elim(CompLevel::Sf, 1, 1, &[], &[], None);
        assert!(qf4m1.play_order() < qf1m2.play_order());
        assert!(qf1m2.play_order() < sf1m1.play_order());
    }

    #[test]
    fn playoff_type_codes_round_trip() {
        for code in [0, 1, 2, 3, 4, 5, 6, 7, 8, 10, 11] {
            let pt = PlayoffType::from_code(code).expect("known code");
            assert_eq!(pt.code(), code);
        }
        assert_eq!(PlayoffType::from_code(9), None);
        assert_eq!(PlayoffType::from_code(-1), None);
    }

    #[test]
    fn win_thresholds_follow_format() {
        assert_eq!(PlayoffType::Bracket8Team.win_threshold(CompLevel::Qf), 2);
        assert_eq!(PlayoffType::Bo5Finals.win_threshold(CompLevel::F), 3);
        assert_eq!(PlayoffType::DoubleElim8Team.win_threshold(CompLevel::Sf), 1);
        assert_eq!(PlayoffType::DoubleElim8Team.win_threshold(CompLevel::F), 2);
    }

    #[test]
    fn alliance_display_name_falls_back_to_number() {
        let mut a = AllianceSelection::new(teams(&[254, 971, 1678]));
        assert_eq!(a.display_name(3), "Alliance 3");
        a.name = Some("Alliance Three".into());
        assert_eq!(a.display_name(3), "Alliance Three");
    }
}
