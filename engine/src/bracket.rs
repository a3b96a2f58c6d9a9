use crate::alliance::{AllianceRegistry, SAME_ALLIANCE_OVERLAP, format_teams, ordered_alliance};
use crate::organizer::OrganizedMatches;
use crate::{AllianceColor, AllianceSelection, CompLevel, MatchRecord, PlayoffType, TeamKey, WltRecord};
use log::{debug, warn};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Bracket series identity, displayed as `qf1`, `sf2`, `f1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub level: CompLevel,
    pub set_number: u32,
}

impl SlotKey {
    pub fn new(level: CompLevel, set_number: u32) -> Self {
        Self { level, set_number }
    }

    pub fn of(m: &MatchRecord) -> Self {
        Self::new(m.comp_level, m.set_number)
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.level, self.set_number)
    }
}

impl Serialize for SlotKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesStatus {
    NotStarted,
    InProgress,
    Complete,
}

/// One series in the bracket. Team lists hold everyone who has played for
/// each side, backups last.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BracketSlot {
    #[serde(serialize_with = "team_numbers")]
    pub red_alliance: Vec<TeamKey>,
    #[serde(serialize_with = "team_numbers")]
    pub blue_alliance: Vec<TeamKey>,
    pub red_name: Option<String>,
    pub blue_name: Option<String>,
    pub red_record: WltRecord,
    pub blue_record: WltRecord,
    pub winning_alliance: Option<AllianceColor>,
}

impl BracketSlot {
    pub fn alliance(&self, color: AllianceColor) -> &[TeamKey] {
        match color {
            AllianceColor::Red => &self.red_alliance,
            AllianceColor::Blue => &self.blue_alliance,
        }
    }

    pub fn name(&self, color: AllianceColor) -> Option<&str> {
        match color {
            AllianceColor::Red => self.red_name.as_deref(),
            AllianceColor::Blue => self.blue_name.as_deref(),
        }
    }

    pub fn record(&self, color: AllianceColor) -> WltRecord {
        match color {
            AllianceColor::Red => self.red_record,
            AllianceColor::Blue => self.blue_record,
        }
    }

    pub fn red_wins(&self) -> u32 {
        self.red_record.wins
    }

    pub fn blue_wins(&self) -> u32 {
        self.blue_record.wins
    }

    pub fn ties(&self) -> u32 {
        self.red_record.ties
    }

    /// Played matches counted toward this series.
    pub fn matches_counted(&self) -> u32 {
        self.red_wins() + self.blue_wins() + self.ties()
    }

    pub fn status(&self) -> SeriesStatus {
        if self.winning_alliance.is_some() {
            SeriesStatus::Complete
        } else if self.matches_counted() > 0 {
            SeriesStatus::InProgress
        } else {
            SeriesStatus::NotStarted
        }
    }

    fn alliance_mut(&mut self, color: AllianceColor) -> &mut Vec<TeamKey> {
        match color {
            AllianceColor::Red => &mut self.red_alliance,
            AllianceColor::Blue => &mut self.blue_alliance,
        }
    }

    fn name_mut(&mut self, color: AllianceColor) -> &mut Option<String> {
        match color {
            AllianceColor::Red => &mut self.red_name,
            AllianceColor::Blue => &mut self.blue_name,
        }
    }
}

fn team_numbers<S: Serializer>(teams: &[TeamKey], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(teams.iter().map(|t| t.number()))
}

pub type BracketTable = BTreeMap<SlotKey, BracketSlot>;

#[derive(Debug, Clone, Copy)]
enum WinThreshold {
    Uniform(u32),
    Format(PlayoffType),
}

impl WinThreshold {
    fn for_level(self, level: CompLevel) -> u32 {
        match self {
            WinThreshold::Uniform(n) => n,
            WinThreshold::Format(pt) => pt.win_threshold(level),
        }
    }
}

/// Folds matches into a bracket table one at a time.
///
/// Alliance identity is resolved per slot, so a backup only joins the side of
/// the series it actually played in.
#[derive(Debug)]
pub struct BracketBuilder<'s> {
    selections: Option<&'s [AllianceSelection]>,
    threshold: WinThreshold,
    table: BracketTable,
    registries: HashMap<SlotKey, AllianceRegistry>,
}

impl<'s> BracketBuilder<'s> {
    pub fn new(win_threshold: u32, selections: Option<&'s [AllianceSelection]>) -> Self {
        Self::with_threshold(WinThreshold::Uniform(win_threshold), selections)
    }

    pub fn for_playoff_type(
        playoff_type: PlayoffType,
        selections: Option<&'s [AllianceSelection]>,
    ) -> Self {
        Self::with_threshold(WinThreshold::Format(playoff_type), selections)
    }

    fn with_threshold(threshold: WinThreshold, selections: Option<&'s [AllianceSelection]>) -> Self {
        Self {
            selections,
            threshold,
            table: BracketTable::new(),
            registries: HashMap::new(),
        }
    }

    pub fn push(&mut self, m: &MatchRecord) {
        let key = SlotKey::of(m);
        let selections = self.selections;
        let registry = self
            .registries
            .entry(key)
            .or_insert_with(|| AllianceRegistry::with_selections(selections));
        let slot = self.table.entry(key).or_default();

        for color in AllianceColor::BOTH {
            let teams = &m.alliance(color).teams;
            if teams.len() < SAME_ALLIANCE_OVERLAP {
                append_missing(slot.alliance_mut(color), teams);
                continue;
            }
            let id = registry.identify(teams);
            if !id.backups_in.is_empty() {
                debug!(
                    "{key} {color}: backup {} in, {} out",
                    format_teams(&id.backups_in),
                    id.backup_out.map_or_else(|| "unknown".to_string(), |t| t.to_string())
                );
            }
            append_missing(slot.alliance_mut(color), &ordered_alliance(teams, selections));
            if slot.name(color).is_none()
                && let Some(alliance) = registry.get(id.index)
            {
                *slot.name_mut(color) = alliance.name.clone();
            }
        }

        if !m.has_been_played() {
            return;
        }
        if let Some(winner) = slot.winning_alliance {
            warn!(
                "{} played after {key} was decided for {winner}; not counted",
                m.key_name()
            );
            return;
        }

        let winner = m.winning_alliance();
        slot.red_record.record(AllianceColor::Red, winner);
        slot.blue_record.record(AllianceColor::Blue, winner);

        let needed = self.threshold.for_level(m.comp_level);
        if let Some(color) = winner {
            if slot.record(color).wins >= needed {
                debug!("{key} won by {color}");
                slot.winning_alliance = Some(color);
            }
        }
    }

    pub fn finish(self) -> BracketTable {
        self.table
    }
}

fn append_missing(list: &mut Vec<TeamKey>, teams: &[TeamKey]) {
    for &team in teams {
        if !list.contains(&team) {
            list.push(team);
        }
    }
}

/// Bracket over quarterfinals, semifinals and finals with one win threshold
/// for every series.
pub fn build(
    organized: &OrganizedMatches<'_>,
    win_threshold: u32,
    selections: Option<&[AllianceSelection]>,
) -> BracketTable {
    let mut builder = BracketBuilder::new(win_threshold, selections);
    for level in [CompLevel::Qf, CompLevel::Sf, CompLevel::F] {
        for m in organized.get(level) {
            builder.push(m);
        }
    }
    builder.finish()
}

/// Bracket over the levels and thresholds of a playoff format.
pub fn build_for(
    organized: &OrganizedMatches<'_>,
    playoff_type: PlayoffType,
    selections: Option<&[AllianceSelection]>,
) -> BracketTable {
    let mut builder = BracketBuilder::for_playoff_type(playoff_type, selections);
    for &level in playoff_type.bracket_levels() {
        for m in organized.get(level) {
            builder.push(m);
        }
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::organizer::organize;
    use crate::testing::*;

    fn qf1() -> SlotKey {
        SlotKey::new(CompLevel::Qf, 1)
    }

    #[test]
    fn single_elimination_two_nil() {
        let matches = vec![
            elim(CompLevel::Qf, 1, 1, &[1, 2, 3], &[4, 5, 6], Some((100, 50))),
            elim(CompLevel::Qf, 1, 2, &[1, 2, 3], &[4, 5, 6], Some((90, 60))),
        ];
        let bracket = build(&organize(&matches), 2, None);
        let slot = &bracket[&qf1()];
        assert_eq!(slot.winning_alliance, Some(AllianceColor::Red));
        assert_eq!(slot.red_wins(), 2);
        assert_eq!(slot.blue_record.losses, 2);
        assert_eq!(slot.red_alliance, teams(&[1, 2, 3]));
        assert_eq!(slot.status(), SeriesStatus::Complete);
    }

    #[test]
    fn tie_counts_for_both_sides_without_a_winner() {
        let matches = vec![
            elim(CompLevel::Qf, 1, 1, &[1, 2, 3], &[4, 5, 6], Some((100, 50))),
            elim(CompLevel::Qf, 1, 2, &[1, 2, 3], &[4, 5, 6], Some((70, 70))),
        ];
        let bracket = build(&organize(&matches), 2, None);
        let slot = &bracket[&qf1()];
        assert_eq!(slot.winning_alliance, None);
        assert_eq!(slot.red_record.ties, 1);
        assert_eq!(slot.blue_record.ties, 1);
        assert_eq!(slot.red_wins(), 1);
        assert_eq!(slot.status(), SeriesStatus::InProgress);
    }

    #[test]
    fn backup_substitution_extends_the_same_side() {
        let matches = vec![
            elim(CompLevel::Qf, 1, 1, &[1, 2, 3], &[4, 5, 6], Some((100, 50))),
            elim(CompLevel::Qf, 1, 2, &[1, 2, 7], &[4, 5, 6], Some((40, 50))),
        ];
        let bracket = build(&organize(&matches), 2, None);
        let slot = &bracket[&qf1()];
        assert_eq!(slot.red_alliance, teams(&[1, 2, 3, 7]));
        assert_eq!(slot.blue_alliance, teams(&[4, 5, 6]));
    }

    #[test]
    fn win_counts_match_played_matches() {
        let matches = vec![
            elim(CompLevel::Sf, 1, 1, &[1, 2, 3], &[4, 5, 6], Some((10, 50))),
            elim(CompLevel::Sf, 1, 2, &[1, 2, 3], &[4, 5, 6], Some((60, 50))),
            elim(CompLevel::Sf, 1, 3, &[1, 2, 3], &[4, 5, 6], Some((55, 55))),
            elim(CompLevel::Sf, 1, 4, &[1, 2, 3], &[4, 5, 6], Some((10, 50))),
            elim(CompLevel::Sf, 1, 5, &[1, 2, 3], &[4, 5, 6], None),
        ];
        let bracket = build(&organize(&matches), 2, None);
        let slot = &bracket[&SlotKey::new(CompLevel::Sf, 1)];
        assert_eq!(slot.matches_counted(), 4);
        assert!(slot.red_wins() <= 2 && slot.blue_wins() <= 2);
        assert_eq!(slot.winning_alliance, Some(AllianceColor::Blue));
    }

    #[test]
    fn matches_after_decision_are_not_counted() {
        let matches = vec![
            elim(CompLevel::Qf, 1, 1, &[1, 2, 3], &[4, 5, 6], Some((100, 50))),
            elim(CompLevel::Qf, 1, 2, &[1, 2, 3], &[4, 5, 6], Some((100, 50))),
            elim(CompLevel::Qf, 1, 3, &[1, 2, 3], &[4, 5, 6], Some((100, 50))),
        ];
        let bracket = build(&organize(&matches), 2, None);
        assert_eq!(bracket[&qf1()].red_wins(), 2);
    }

    #[test]
    fn best_of_five_needs_three() {
        let matches = vec![
            elim(CompLevel::F, 1, 1, &[1, 2, 3], &[4, 5, 6], Some((100, 50))),
            elim(CompLevel::F, 1, 2, &[1, 2, 3], &[4, 5, 6], Some((100, 50))),
        ];
        let organized = organize(&matches);
        let bracket = build_for(&organized, PlayoffType::Bo5Finals, None);
        assert_eq!(bracket[&SlotKey::new(CompLevel::F, 1)].winning_alliance, None);

        let bracket = build(&organized, 2, None);
        assert_eq!(
            bracket[&SlotKey::new(CompLevel::F, 1)].winning_alliance,
            Some(AllianceColor::Red)
        );
    }

    #[test]
    fn selections_order_teams_and_name_sides() {
        let mut selections = vec![
            AllianceSelection::new(teams(&[3, 1, 2])),
            AllianceSelection::new(teams(&[6, 5, 4])),
        ];
        selections[1].name = Some("Alliance Two".into());
        let matches = vec![elim(CompLevel::Qf, 1, 1, &[1, 2, 3], &[4, 5, 6], None)];
        let bracket = build(&organize(&matches), 2, Some(&selections));
        let slot = &bracket[&qf1()];
        assert_eq!(slot.red_alliance, teams(&[3, 1, 2]));
        assert_eq!(slot.blue_alliance, teams(&[6, 5, 4]));
        assert_eq!(slot.red_name.as_deref(), Some("Alliance 1"));
        assert_eq!(slot.blue_name.as_deref(), Some("Alliance Two"));
        assert_eq!(slot.status(), SeriesStatus::NotStarted);
    }

    #[test]
    fn undeclared_backup_joins_pick_ordered_side() {
        let selections = vec![AllianceSelection::new(teams(&[40, 50, 60]))];
        let matches = vec![
            elim(CompLevel::Qf, 1, 1, &[60, 70, 50], &[4, 5, 6], Some((100, 50))),
            elim(CompLevel::Qf, 1, 2, &[50, 40, 60], &[4, 5, 6], Some((100, 50))),
        ];
        let bracket = build(&organize(&matches), 2, Some(&selections));
        let slot = &bracket[&qf1()];
        assert_eq!(slot.red_alliance, teams(&[50, 60, 70, 40]));
        assert_eq!(slot.red_name.as_deref(), Some("Alliance 1"));
    }

    #[test]
    fn table_formats_only_build_the_finals() {
        let matches = vec![
            elim(CompLevel::Sf, 1, 1, &[1, 2, 3], &[4, 5, 6], Some((50, 40))),
            elim(CompLevel::Sf, 1, 2, &[7, 8, 9], &[1, 2, 3], Some((50, 40))),
            elim(CompLevel::Sf, 1, 3, &[4, 5, 6], &[7, 8, 9], Some((50, 40))),
            elim(CompLevel::F, 1, 1, &[7, 8, 9], &[1, 2, 3], None),
        ];
        let organized = organize(&matches);
        for pt in [PlayoffType::RoundRobin6Team, PlayoffType::AvgScore8Team] {
            let bracket = build_for(&organized, pt, None);
            assert_eq!(bracket.keys().copied().collect::<Vec<_>>(), vec![SlotKey::new(CompLevel::F, 1)]);
        }
    }

    #[test]
    fn placeholder_slots_still_create_the_series() {
        let mut tbd = elim(CompLevel::Sf, 1, 1, &[1, 2, 3], &[], None);
        tbd.blue.placeholders = 3;
        let matches = vec![tbd];
        let bracket = build(&organize(&matches), 2, None);
        let slot = &bracket[&SlotKey::new(CompLevel::Sf, 1)];
        assert_eq!(slot.red_alliance, teams(&[1, 2, 3]));
        assert!(slot.blue_alliance.is_empty());
    }

    #[test]
    fn octofinals_are_skipped_by_default() {
        let matches = vec![
            elim(CompLevel::Ef, 1, 1, &[1, 2, 3], &[4, 5, 6], Some((1, 0))),
            elim(CompLevel::Qm, 1, 1, &[1, 2, 3], &[4, 5, 6], Some((1, 0))),
        ];
        let organized = organize(&matches);
        assert!(build(&organized, 2, None).is_empty());
        let sixteen = build_for(&organized, PlayoffType::Bracket16Team, None);
        assert!(sixteen.contains_key(&SlotKey::new(CompLevel::Ef, 1)));
    }

    #[test]
    fn rebuilding_is_idempotent() {
        let matches = vec![
            elim(CompLevel::Qf, 1, 1, &[1, 2, 3], &[4, 5, 6], Some((100, 50))),
            elim(CompLevel::Qf, 1, 2, &[1, 2, 7], &[4, 5, 6], Some((40, 50))),
            elim(CompLevel::Sf, 1, 1, &[1, 2, 7], &[8, 9, 10], None),
        ];
        let first = build(&organize(&matches), 2, None);
        let second = build(&organize(&matches), 2, None);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn slot_serializes_with_plain_team_numbers() {
        let matches = vec![elim(CompLevel::Qf, 2, 1, &[254, 971, 1678], &[4, 5, 6], Some((10, 5)))];
        let bracket = build(&organize(&matches), 2, None);
        let json = serde_json::to_value(&bracket).unwrap();
        assert_eq!(json["qf2"]["red_alliance"], serde_json::json!([254, 971, 1678]));
        assert_eq!(json["qf2"]["red_record"]["wins"], 1);
    }
}
