//! One call from an event and its matches to everything a playoff page needs.
use crate::advancement::{
    self, AverageScoreRow, DoubleElimMatches, PlayoffAdvancement, RoundRobinRow, TiebreakerMetric,
};
use crate::bracket::{self, BracketTable, SeriesStatus, SlotKey};
use crate::organizer::organize;
use crate::{AllianceColor, CompLevel, Event, MatchRecord, PlayoffType, TeamKey, WltRecord};
use log::debug;
use serde::{Serialize, Serializer};
use std::fmt;

/// Series wins used when the event's format is unknown.
pub const DEFAULT_WIN_THRESHOLD: u32 = 2;

/// Which rendering template fits the event's format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayoffTemplate {
    Bracket8Team,
    Bracket16Team,
    Bracket4Team,
    AverageScoreTable,
    RoundRobin6Team,
    LegacyDoubleElim8Team,
    DoubleElim8Team,
    DoubleElim4Team,
    Bo5Finals,
    Bo3Finals,
}

impl PlayoffTemplate {
    /// Custom formats have no template.
    pub fn for_playoff_type(playoff_type: PlayoffType) -> Option<Self> {
        let template = match playoff_type {
            PlayoffType::Bracket8Team => PlayoffTemplate::Bracket8Team,
            PlayoffType::Bracket16Team => PlayoffTemplate::Bracket16Team,
            PlayoffType::Bracket4Team => PlayoffTemplate::Bracket4Team,
            PlayoffType::AvgScore8Team => PlayoffTemplate::AverageScoreTable,
            PlayoffType::RoundRobin6Team => PlayoffTemplate::RoundRobin6Team,
            PlayoffType::LegacyDoubleElim8Team => PlayoffTemplate::LegacyDoubleElim8Team,
            PlayoffType::DoubleElim8Team => PlayoffTemplate::DoubleElim8Team,
            PlayoffType::DoubleElim4Team => PlayoffTemplate::DoubleElim4Team,
            PlayoffType::Bo5Finals => PlayoffTemplate::Bo5Finals,
            PlayoffType::Bo3Finals => PlayoffTemplate::Bo3Finals,
            PlayoffType::Custom => return None,
        };
        Some(template)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlayoffTemplate::Bracket8Team => "bracket_8_team",
            PlayoffTemplate::Bracket16Team => "bracket_16_team",
            PlayoffTemplate::Bracket4Team => "bracket_4_team",
            PlayoffTemplate::AverageScoreTable => "playoff_table",
            PlayoffTemplate::RoundRobin6Team => "round_robin_6_team",
            PlayoffTemplate::LegacyDoubleElim8Team => "legacy_double_elim_8_team",
            PlayoffTemplate::DoubleElim8Team => "double_elim_8_team",
            PlayoffTemplate::DoubleElim4Team => "double_elim_4_team",
            PlayoffTemplate::Bo5Finals => "bo5_finals",
            PlayoffTemplate::Bo3Finals => "bo3_finals",
        }
    }
}

impl fmt::Display for PlayoffTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PlayoffTemplate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayoffAdvancementResult {
    pub playoff_type: Option<PlayoffType>,
    pub bracket: BracketTable,
    /// Only the average-score and round-robin formats rank alliances.
    pub advancement: Option<PlayoffAdvancement>,
    pub double_elim: Option<DoubleElimMatches>,
    pub template: Option<PlayoffTemplate>,
}

impl PlayoffAdvancementResult {
    pub fn round_robin(&self) -> Option<&advancement::RoundRobinAdvancement> {
        match &self.advancement {
            Some(PlayoffAdvancement::RoundRobin(rr)) => Some(rr),
            _ => None,
        }
    }

    pub fn average_score(&self) -> Option<&advancement::AverageScoreAdvancement> {
        match &self.advancement {
            Some(PlayoffAdvancement::AverageScore(avg)) => Some(avg),
            _ => None,
        }
    }
}

/// Build the bracket over the format's levels and run its advancement
/// engine.
///
/// Never fails: an event without a known playoff type still gets a
/// best-of-3 bracket, just no advancement data or template.
pub fn generate_playoff_advancement(event: &Event, matches: &[MatchRecord]) -> PlayoffAdvancementResult {
    let organized = organize(matches);
    let selections = event.selections();

    let Some(playoff_type) = event.playoff_type else {
        debug!("{}: no playoff type, bracket only", event.key);
        return PlayoffAdvancementResult {
            playoff_type: None,
            bracket: bracket::build(&organized, DEFAULT_WIN_THRESHOLD, selections),
            advancement: None,
            double_elim: None,
            template: None,
        };
    };

    let bracket = bracket::build_for(&organized, playoff_type, selections);

    let (playoff_advancement, double_elim) = match playoff_type {
        PlayoffType::AvgScore8Team => (
            Some(PlayoffAdvancement::AverageScore(
                advancement::average_score_advancement(&organized, selections),
            )),
            None,
        ),
        PlayoffType::RoundRobin6Team => (
            Some(PlayoffAdvancement::RoundRobin(advancement::round_robin_advancement(
                &organized, event.year, selections,
            ))),
            None,
        ),
        PlayoffType::LegacyDoubleElim8Team
        | PlayoffType::DoubleElim8Team
        | PlayoffType::DoubleElim4Team => (
            None,
            Some(advancement::organize_double_elim(&organized, playoff_type)),
        ),
        PlayoffType::Bracket8Team
        | PlayoffType::Bracket16Team
        | PlayoffType::Bracket4Team
        | PlayoffType::Bo5Finals
        | PlayoffType::Bo3Finals
        | PlayoffType::Custom => (None, None),
    };

    debug!(
        "{}: {} bracket series for {}",
        event.key,
        bracket.len(),
        playoff_type.label()
    );

    PlayoffAdvancementResult {
        playoff_type: Some(playoff_type),
        bracket,
        advancement: playoff_advancement,
        double_elim,
        template: PlayoffTemplate::for_playoff_type(playoff_type),
    }
}

// ---------------------------------------------------------------------------
// API-shaped output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortOrderInfo {
    pub name: String,
    pub precision: u8,
}

impl SortOrderInfo {
    fn new(name: &str, precision: u8) -> Self {
        Self { name: name.to_string(), precision }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiAdvancementRow {
    pub rank: usize,
    pub team_keys: Vec<TeamKey>,
    pub alliance_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<WltRecord>,
    pub matches_played: u32,
    pub sort_orders: Vec<f64>,
    pub advances: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiAdvancementLevel {
    pub level: CompLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complete: Option<bool>,
    pub sort_order_info: Vec<SortOrderInfo>,
    pub rankings: Vec<ApiAdvancementRow>,
}

impl From<&AverageScoreRow> for ApiAdvancementRow {
    fn from(row: &AverageScoreRow) -> Self {
        Self {
            rank: row.rank,
            team_keys: row.teams.clone(),
            alliance_name: row.name.clone(),
            record: None,
            matches_played: row.scores.len() as u32,
            sort_orders: vec![row.average],
            advances: row.advances,
        }
    }
}

fn round_robin_row(row: &RoundRobinRow, tiebreakers: &[TiebreakerMetric; 2]) -> ApiAdvancementRow {
    let mut sort_orders = vec![f64::from(row.champ_points), row.tiebreaker1];
    if tiebreakers[1] != TiebreakerMetric::Unused {
        sort_orders.push(row.tiebreaker2);
    }
    ApiAdvancementRow {
        rank: row.rank,
        team_keys: row.teams.clone(),
        alliance_name: row.name.clone(),
        record: Some(row.record),
        matches_played: row.matches_played,
        sort_orders,
        advances: row.advances,
    }
}

/// Advancement tables as ranking rows with named sort orders.
pub fn api_advancement(result: &PlayoffAdvancementResult) -> Vec<ApiAdvancementLevel> {
    match &result.advancement {
        None => Vec::new(),
        Some(PlayoffAdvancement::AverageScore(avg)) => avg
            .levels
            .iter()
            .map(|(&level, rows)| ApiAdvancementLevel {
                level,
                complete: None,
                sort_order_info: vec![SortOrderInfo::new("Average Score", 2)],
                rankings: rows.iter().map(ApiAdvancementRow::from).collect(),
            })
            .collect(),
        Some(PlayoffAdvancement::RoundRobin(rr)) => {
            let mut info = vec![SortOrderInfo::new("Champ Points", 0)];
            for metric in rr.tiebreakers.iter().filter(|m| **m != TiebreakerMetric::Unused) {
                info.push(SortOrderInfo::new(metric.label(), 0));
            }
            vec![ApiAdvancementLevel {
                level: rr.level,
                complete: Some(rr.complete),
                sort_order_info: info,
                rankings: rr
                    .rows
                    .iter()
                    .map(|row| round_robin_row(row, &rr.tiebreakers))
                    .collect(),
            }]
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiBracketSeries {
    pub key: SlotKey,
    pub level: CompLevel,
    pub set_number: u32,
    pub red_alliance: Vec<TeamKey>,
    pub blue_alliance: Vec<TeamKey>,
    pub red_name: Option<String>,
    pub blue_name: Option<String>,
    pub red_record: WltRecord,
    pub blue_record: WltRecord,
    pub winner: Option<AllianceColor>,
    pub status: SeriesStatus,
}

/// Bracket series in level then set order.
pub fn api_bracket(result: &PlayoffAdvancementResult) -> Vec<ApiBracketSeries> {
    result
        .bracket
        .iter()
        .map(|(&key, slot)| ApiBracketSeries {
            key,
            level: key.level,
            set_number: key.set_number,
            red_alliance: slot.red_alliance.clone(),
            blue_alliance: slot.blue_alliance.clone(),
            red_name: slot.red_name.clone(),
            blue_name: slot.blue_name.clone(),
            red_record: slot.red_record,
            blue_record: slot.blue_record,
            winner: slot.winning_alliance,
            status: slot.status(),
        })
        .collect()
}
