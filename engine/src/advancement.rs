//! Format-specific advancement tables.
//!
//! Bracket formats need no table of their own: who advances is read straight
//! off the bracket's series winners. The average-score and round-robin formats
//! rank alliances across many matches, and double elimination needs its
//! matches regrouped into upper/lower bracket rounds.
use crate::alliance::AllianceRegistry;
use crate::organizer::OrganizedMatches;
use crate::{AllianceColor, AllianceSelection, CompLevel, MatchRecord, PlayoffType, TeamKey, WltRecord};
use log::{debug, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Alliances advancing out of each average-score level.
pub fn average_score_advance_count(level: CompLevel) -> usize {
    match level {
        CompLevel::Ef => 8,
        CompLevel::Qf => 4,
        CompLevel::Sf => 2,
        CompLevel::Qm | CompLevel::F => 0,
    }
}

/// Finalists taken from the round-robin table.
pub const ROUND_ROBIN_ADVANCE: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum PlayoffAdvancement {
    AverageScore(AverageScoreAdvancement),
    RoundRobin(RoundRobinAdvancement),
}

// ---------------------------------------------------------------------------
// Average score (through 2015)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AverageScoreRow {
    pub rank: usize,
    pub teams: Vec<TeamKey>,
    pub name: Option<String>,
    pub scores: Vec<u32>,
    pub average: f64,
    pub advances: bool,
}

impl AverageScoreRow {
    pub fn matches_played(&self) -> usize {
        self.scores.len()
    }

    /// Average after each match, in play order.
    pub fn running_averages(&self) -> Vec<f64> {
        running_averages(&self.scores)
    }
}

pub fn running_averages(scores: &[u32]) -> Vec<f64> {
    let mut total = 0u64;
    scores
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            total += u64::from(s);
            total as f64 / (i + 1) as f64
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AverageScoreAdvancement {
    pub levels: BTreeMap<CompLevel, Vec<AverageScoreRow>>,
}

impl AverageScoreAdvancement {
    pub fn level(&self, level: CompLevel) -> &[AverageScoreRow] {
        self.levels.get(&level).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Rank alliances within each of ef/qf/sf by average played score.
///
/// Unplayed matches are skipped rather than counted as zero.
pub fn average_score_advancement(
    organized: &OrganizedMatches<'_>,
    selections: Option<&[AllianceSelection]>,
) -> AverageScoreAdvancement {
    let mut registry = AllianceRegistry::with_selections(selections);
    let mut advancement = AverageScoreAdvancement::default();

    for level in [CompLevel::Ef, CompLevel::Qf, CompLevel::Sf] {
        // (alliance index, scores) in first-seen order
        let mut entries: Vec<(usize, Vec<u32>)> = Vec::new();
        for m in organized.get(level).iter().filter(|m| m.has_been_played()) {
            for color in AllianceColor::BOTH {
                let alliance = m.alliance(color);
                let (Some(score), false) = (alliance.score, alliance.teams.is_empty()) else {
                    continue;
                };
                let id = registry.identify(&alliance.teams);
                match entries.iter_mut().find(|(index, _)| *index == id.index) {
                    Some((_, scores)) => scores.push(score),
                    None => entries.push((id.index, vec![score])),
                }
            }
        }

        if entries.is_empty() {
            continue;
        }

        let mut rows: Vec<AverageScoreRow> = entries
            .into_iter()
            .filter(|(_, scores)| !scores.is_empty())
            .filter_map(|(index, scores)| {
                let alliance = registry.get(index)?;
                let average = scores.iter().map(|&s| f64::from(s)).sum::<f64>() / scores.len() as f64;
                Some(AverageScoreRow {
                    rank: 0,
                    teams: alliance.played_teams(),
                    name: alliance.name.clone(),
                    scores,
                    average,
                    advances: false,
                })
            })
            .collect();
        rows.sort_by(|a, b| b.average.total_cmp(&a.average));

        let advancing = average_score_advance_count(level);
        for (i, row) in rows.iter_mut().enumerate() {
            row.rank = i + 1;
            row.advances = row.rank <= advancing;
        }
        debug!("average score {level}: {} alliances ranked", rows.len());
        advancement.levels.insert(level, rows);
    }

    advancement
}

// ---------------------------------------------------------------------------
// Round robin (6 alliances)
// ---------------------------------------------------------------------------

/// One round-robin tiebreaker: a summed per-match quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TiebreakerMetric {
    /// A numeric field of the alliance's score breakdown.
    Breakdown {
        field: &'static str,
        label: &'static str,
    },
    AllianceScore,
    Unused,
}

impl TiebreakerMetric {
    pub fn label(&self) -> &'static str {
        match self {
            TiebreakerMetric::Breakdown { label, .. } => label,
            TiebreakerMetric::AllianceScore => "Match Points",
            TiebreakerMetric::Unused => "",
        }
    }

    /// Value for one alliance in one played match; missing data counts as 0.
    pub fn value(&self, m: &MatchRecord, color: AllianceColor) -> f64 {
        match self {
            TiebreakerMetric::Breakdown { field, .. } => m
                .score_breakdown
                .as_ref()
                .and_then(|b| b.metric(color, field))
                .unwrap_or(0.0),
            TiebreakerMetric::AllianceScore => m.score(color).map(f64::from).unwrap_or(0.0),
            TiebreakerMetric::Unused => 0.0,
        }
    }
}

pub fn round_robin_tiebreakers(year: u16) -> [TiebreakerMetric; 2] {
    match year {
        2018 => [
            TiebreakerMetric::Breakdown { field: "endgamePoints", label: "Endgame Points" },
            TiebreakerMetric::Breakdown { field: "autoPoints", label: "Auto Points" },
        ],
        2019 => [
            TiebreakerMetric::Breakdown { field: "cargoPoints", label: "Cargo Points" },
            TiebreakerMetric::Breakdown { field: "hatchPanelPoints", label: "Hatch Panel Points" },
        ],
        _ => [TiebreakerMetric::AllianceScore, TiebreakerMetric::Unused],
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundRobinRow {
    pub rank: usize,
    pub teams: Vec<TeamKey>,
    pub name: Option<String>,
    pub record: WltRecord,
    pub champ_points: u32,
    pub tiebreaker1: f64,
    pub tiebreaker2: f64,
    pub matches_played: u32,
    pub advances: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundRobinAdvancement {
    pub level: CompLevel,
    pub rows: Vec<RoundRobinRow>,
    /// True once every match at the level has been played.
    pub complete: bool,
    pub tiebreakers: [TiebreakerMetric; 2],
}

impl RoundRobinAdvancement {
    pub fn row_for(&self, team: TeamKey) -> Option<&RoundRobinRow> {
        self.rows.iter().find(|r| r.teams.contains(&team))
    }
}

pub fn champ_points(color: AllianceColor, winner: Option<AllianceColor>) -> u32 {
    match winner {
        Some(w) if w == color => 2,
        Some(_) => 0,
        None => 1,
    }
}

#[derive(Debug, Default)]
struct RoundRobinTally {
    record: WltRecord,
    champ_points: u32,
    tiebreaker1: f64,
    tiebreaker2: f64,
}

/// Rank the six round-robin alliances by champ points, then the year's two
/// tiebreakers, all descending.
pub fn round_robin_advancement(
    organized: &OrganizedMatches<'_>,
    year: u16,
    selections: Option<&[AllianceSelection]>,
) -> RoundRobinAdvancement {
    let level = CompLevel::Sf;
    let tiebreakers = round_robin_tiebreakers(year);
    let mut registry = AllianceRegistry::with_selections(selections);
    let mut tallies: Vec<(usize, RoundRobinTally)> = Vec::new();
    let mut complete = true;

    for m in organized.get(level) {
        let played = m.has_been_played();
        if !played {
            complete = false;
        }
        for color in AllianceColor::BOTH {
            let teams = &m.alliance(color).teams;
            if teams.is_empty() {
                continue;
            }
            let id = registry.identify(teams);
            let position = match tallies.iter().position(|(index, _)| *index == id.index) {
                Some(p) => p,
                None => {
                    tallies.push((id.index, RoundRobinTally::default()));
                    tallies.len() - 1
                }
            };
            if !played {
                continue;
            }
            let tally = &mut tallies[position].1;
            let winner = m.winning_alliance();
            tally.record.record(color, winner);
            tally.champ_points += champ_points(color, winner);
            tally.tiebreaker1 += tiebreakers[0].value(m, color);
            tally.tiebreaker2 += tiebreakers[1].value(m, color);
        }
    }

    let mut rows: Vec<RoundRobinRow> = tallies
        .into_iter()
        .filter_map(|(index, tally)| {
            let alliance = registry.get(index)?;
            Some(RoundRobinRow {
                rank: 0,
                teams: alliance.played_teams(),
                name: alliance.name.clone(),
                record: tally.record,
                champ_points: tally.champ_points,
                tiebreaker1: tally.tiebreaker1,
                tiebreaker2: tally.tiebreaker2,
                matches_played: tally.record.played(),
                advances: false,
            })
        })
        .collect();
    rows.sort_by(|a, b| {
        b.champ_points
            .cmp(&a.champ_points)
            .then_with(|| b.tiebreaker1.total_cmp(&a.tiebreaker1))
            .then_with(|| b.tiebreaker2.total_cmp(&a.tiebreaker2))
    });
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i + 1;
        row.advances = row.rank <= ROUND_ROBIN_ADVANCE;
    }

    RoundRobinAdvancement { level, rows, complete, tiebreakers }
}

// ---------------------------------------------------------------------------
// Double elimination
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DoubleElimBracket {
    Winner,
    Loser,
    Finals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DoubleElimRound {
    pub bracket: DoubleElimBracket,
    pub round: u8,
}

impl DoubleElimRound {
    const fn winner(round: u8) -> Self {
        Self { bracket: DoubleElimBracket::Winner, round }
    }

    const fn loser(round: u8) -> Self {
        Self { bracket: DoubleElimBracket::Loser, round }
    }

    const FINALS: Self = Self { bracket: DoubleElimBracket::Finals, round: 1 };

    pub fn is_finals(&self) -> bool {
        self.bracket == DoubleElimBracket::Finals
    }
}

impl fmt::Display for DoubleElimRound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bracket {
            DoubleElimBracket::Winner => write!(f, "Upper Bracket Round {}", self.round),
            DoubleElimBracket::Loser => write!(f, "Lower Bracket Round {}", self.round),
            DoubleElimBracket::Finals => f.write_str("Finals"),
        }
    }
}

/// Round a double-elimination series belongs to, by format and series key.
pub fn double_elim_round(
    playoff_type: PlayoffType,
    level: CompLevel,
    set_number: u32,
) -> Option<DoubleElimRound> {
    use CompLevel::*;
    let round = match (playoff_type, level, set_number) {
        (PlayoffType::LegacyDoubleElim8Team, Ef, 1..=4) => DoubleElimRound::winner(1),
        (PlayoffType::LegacyDoubleElim8Team, Ef, 5 | 6) => DoubleElimRound::loser(1),
        (PlayoffType::LegacyDoubleElim8Team, Qf, 1 | 2) => DoubleElimRound::winner(2),
        (PlayoffType::LegacyDoubleElim8Team, Qf, 3 | 4) => DoubleElimRound::loser(2),
        (PlayoffType::LegacyDoubleElim8Team, Sf, 1) => DoubleElimRound::winner(3),
        (PlayoffType::LegacyDoubleElim8Team, Sf, 2) => DoubleElimRound::loser(3),
        (PlayoffType::LegacyDoubleElim8Team, F, 1) => DoubleElimRound::loser(4),
        (PlayoffType::LegacyDoubleElim8Team, F, 2) => DoubleElimRound::FINALS,

        (PlayoffType::DoubleElim8Team, Sf, 1..=4) => DoubleElimRound::winner(1),
        (PlayoffType::DoubleElim8Team, Sf, 5 | 6) => DoubleElimRound::winner(2),
        (PlayoffType::DoubleElim8Team, Sf, 7 | 8) => DoubleElimRound::loser(2),
        (PlayoffType::DoubleElim8Team, Sf, 9 | 10) => DoubleElimRound::loser(3),
        (PlayoffType::DoubleElim8Team, Sf, 11) => DoubleElimRound::winner(4),
        (PlayoffType::DoubleElim8Team, Sf, 12) => DoubleElimRound::loser(4),
        (PlayoffType::DoubleElim8Team, Sf, 13) => DoubleElimRound::loser(5),

        (PlayoffType::DoubleElim4Team, Sf, 1 | 2) => DoubleElimRound::winner(1),
        (PlayoffType::DoubleElim4Team, Sf, 3) => DoubleElimRound::winner(2),
        (PlayoffType::DoubleElim4Team, Sf, 4) => DoubleElimRound::loser(2),
        (PlayoffType::DoubleElim4Team, Sf, 5) => DoubleElimRound::loser(3),

        (PlayoffType::DoubleElim8Team | PlayoffType::DoubleElim4Team, F, _) => DoubleElimRound::FINALS,
        _ => return None,
    };
    Some(round)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoubleElimRoundMatches {
    pub round: DoubleElimRound,
    pub label: String,
    pub matches: Vec<MatchRecord>,
}

/// Double-elimination matches grouped by round, upper bracket first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DoubleElimMatches {
    pub rounds: Vec<DoubleElimRoundMatches>,
}

impl DoubleElimMatches {
    pub fn round(&self, round: DoubleElimRound) -> &[MatchRecord] {
        self.rounds
            .iter()
            .find(|r| r.round == round)
            .map(|r| r.matches.as_slice())
            .unwrap_or_default()
    }
}

pub fn organize_double_elim(
    organized: &OrganizedMatches<'_>,
    playoff_type: PlayoffType,
) -> DoubleElimMatches {
    let mut rounds: BTreeMap<DoubleElimRound, Vec<MatchRecord>> = BTreeMap::new();
    for level in CompLevel::ELIMS {
        for &m in organized.get(level) {
            match double_elim_round(playoff_type, m.comp_level, m.set_number) {
                Some(round) => rounds.entry(round).or_default().push(m.clone()),
                None => warn!(
                    "{} has no round in the {} bracket",
                    m.key_name(),
                    playoff_type.label()
                ),
            }
        }
    }

    DoubleElimMatches {
        rounds: rounds
            .into_iter()
            .map(|(round, matches)| DoubleElimRoundMatches {
                round,
                label: round.to_string(),
                matches,
            })
            .collect(),
    }
}
