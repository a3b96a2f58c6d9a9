//! Alliance identity across matches.
//!
//! Two team sets are the same alliance when they share at least two teams.
//! That one rule is what reconciles backup robots: a substitute shows up next
//! to at least two original picks, so it folds into the existing alliance
//! rather than starting a new one.
use crate::{AllianceSelection, TeamKey};
use log::warn;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

/// Shared teams needed for two team sets to denote the same alliance.
pub const SAME_ALLIANCE_OVERLAP: usize = 2;

/// Backup matches that must agree on a missing pick before it counts as out.
pub const BACKUP_OUT_CONFIRMATIONS: u32 = 2;

/// Number of distinct teams present in both sets.
pub fn overlap(a: &[TeamKey], b: &[TeamKey]) -> usize {
    let a: HashSet<TeamKey> = a.iter().copied().collect();
    let b: HashSet<TeamKey> = b.iter().copied().collect();
    a.intersection(&b).count()
}

pub fn is_same_alliance(a: &[TeamKey], b: &[TeamKey]) -> bool {
    overlap(a, b) >= SAME_ALLIANCE_OVERLAP
}

/// Pick-ordered version of `teams` when it belongs to an official alliance.
/// Teams that are not picks follow in match order, whether or not the backup
/// was declared. Otherwise `teams` unchanged.
pub fn ordered_alliance(teams: &[TeamKey], selections: Option<&[AllianceSelection]>) -> Vec<TeamKey> {
    let Some(selection) = selections
        .unwrap_or_default()
        .iter()
        .find(|s| is_same_alliance(&s.picks, teams))
    else {
        return teams.to_vec();
    };

    let mut ordered: Vec<TeamKey> = selection
        .picks
        .iter()
        .copied()
        .filter(|t| teams.contains(t))
        .collect();
    ordered.extend(teams.iter().copied().filter(|t| !selection.picks.contains(t)));
    ordered
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllianceOrigin {
    /// Seeded from the official alliance selection at this index.
    Selection(usize),
    /// Discovered from match team lists.
    Observed,
}

/// Everyone who has ever played for one alliance. Grows, never shrinks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompleteAlliance {
    pub origin: AllianceOrigin,
    pub name: Option<String>,
    /// Picks first (selection order), backups appended as they appear.
    teams: Vec<TeamKey>,
    /// Team set other matches are compared against (selection alliances only).
    #[serde(skip)]
    identity: Vec<TeamKey>,
    #[serde(skip)]
    picks: Vec<TeamKey>,
    #[serde(skip)]
    played: HashSet<TeamKey>,
    #[serde(skip)]
    declared_backup_out: Option<TeamKey>,
    /// Picks absent from every match a backup has played in so far.
    #[serde(skip)]
    absent_with_backup: Option<BTreeSet<TeamKey>>,
    #[serde(skip)]
    backup_matches: u32,
}

impl CompleteAlliance {
    fn observed(teams: &[TeamKey]) -> Self {
        let mut alliance = Self {
            origin: AllianceOrigin::Observed,
            name: None,
            teams: Vec::new(),
            identity: Vec::new(),
            picks: Vec::new(),
            played: HashSet::new(),
            declared_backup_out: None,
            absent_with_backup: None,
            backup_matches: 0,
        };
        alliance.append(teams);
        alliance
    }

    fn from_selection(index: usize, selection: &AllianceSelection) -> Self {
        let mut identity = selection.picks.clone();
        if let Some(backup) = selection.backup {
            if !identity.contains(&backup.team_in) {
                identity.push(backup.team_in);
            }
        }
        Self {
            origin: AllianceOrigin::Selection(index),
            name: Some(selection.display_name(index + 1)),
            teams: identity.clone(),
            identity,
            picks: selection.picks.clone(),
            played: HashSet::new(),
            declared_backup_out: selection.backup.map(|b| b.team_out),
            absent_with_backup: None,
            backup_matches: 0,
        }
    }

    /// Append unseen teams in order; returns the ones that were new.
    fn append(&mut self, teams: &[TeamKey]) -> Vec<TeamKey> {
        let mut added = Vec::new();
        for &team in teams {
            if !self.teams.contains(&team) {
                self.teams.push(team);
                added.push(team);
            }
        }
        added
    }

    pub fn teams(&self) -> &[TeamKey] {
        &self.teams
    }

    /// Teams in alliance order, limited to those that have taken the field.
    pub fn played_teams(&self) -> Vec<TeamKey> {
        self.teams
            .iter()
            .copied()
            .filter(|t| self.played.contains(t))
            .collect()
    }

    pub fn selection_index(&self) -> Option<usize> {
        match self.origin {
            AllianceOrigin::Selection(i) => Some(i),
            AllianceOrigin::Observed => None,
        }
    }

    /// Declared backup-out, or the one pick missing from every backup match
    /// once at least [`BACKUP_OUT_CONFIRMATIONS`] of them have been seen.
    pub fn backup_out(&self) -> Option<TeamKey> {
        if self.declared_backup_out.is_some() {
            return self.declared_backup_out;
        }
        if self.backup_matches < BACKUP_OUT_CONFIRMATIONS {
            return None;
        }
        let absent = self.absent_with_backup.as_ref()?;
        if absent.len() == 1 {
            absent.iter().next().copied()
        } else {
            None
        }
    }

    fn is_same(&self, teams: &[TeamKey]) -> bool {
        match self.origin {
            AllianceOrigin::Selection(_) => is_same_alliance(&self.identity, teams),
            AllianceOrigin::Observed => is_same_alliance(&self.teams, teams),
        }
    }
}

/// Result of resolving one match alliance's team list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identification {
    pub index: usize,
    /// Teams in this match that are not original members.
    pub backups_in: Vec<TeamKey>,
    pub backup_out: Option<TeamKey>,
    pub created: bool,
}

/// Accumulates alliances over a sequence of matches.
///
/// Official selections come first, so they are always preferred over
/// alliances discovered from match data. Resolution is first-match-wins in
/// registry order.
#[derive(Debug, Clone, Default)]
pub struct AllianceRegistry {
    alliances: Vec<CompleteAlliance>,
}

impl AllianceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_selections(selections: Option<&[AllianceSelection]>) -> Self {
        let alliances = selections
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(i, s)| CompleteAlliance::from_selection(i, s))
            .collect();
        Self { alliances }
    }

    pub fn alliances(&self) -> &[CompleteAlliance] {
        &self.alliances
    }

    pub fn get(&self, index: usize) -> Option<&CompleteAlliance> {
        self.alliances.get(index)
    }

    pub fn identify(&mut self, teams: &[TeamKey]) -> Identification {
        let found = self.alliances.iter().position(|a| a.is_same(teams));

        let Some(index) = found else {
            let mut alliance = CompleteAlliance::observed(teams);
            alliance.played.extend(teams.iter().copied());
            self.alliances.push(alliance);
            return Identification {
                index: self.alliances.len() - 1,
                backups_in: Vec::new(),
                backup_out: None,
                created: true,
            };
        };

        let others: Vec<usize> = self
            .alliances
            .iter()
            .enumerate()
            .skip(index + 1)
            .filter(|(_, a)| a.is_same(teams))
            .map(|(i, _)| i)
            .collect();
        if !others.is_empty() {
            warn!(
                "ambiguous alliance identity for {}: matches alliance {index} and {others:?}; using {index}",
                format_teams(teams)
            );
        }

        let alliance = &mut self.alliances[index];
        let appended = alliance.append(teams);
        alliance.played.extend(teams.iter().copied());

        let backups_in = match alliance.origin {
            AllianceOrigin::Selection(_) => teams
                .iter()
                .copied()
                .filter(|t| !alliance.picks.contains(t))
                .collect(),
            AllianceOrigin::Observed => appended,
        };

        if matches!(alliance.origin, AllianceOrigin::Selection(_)) && !backups_in.is_empty() {
            let absent: BTreeSet<TeamKey> = alliance
                .picks
                .iter()
                .copied()
                .filter(|p| !teams.contains(p))
                .collect();
            let narrowed = match alliance.absent_with_backup.take() {
                Some(previous) => previous.intersection(&absent).copied().collect(),
                None => absent,
            };
            alliance.absent_with_backup = Some(narrowed);
            alliance.backup_matches += 1;
        }

        Identification {
            index,
            backups_in,
            backup_out: alliance.backup_out(),
            created: false,
        }
    }
}

pub(crate) fn format_teams(teams: &[TeamKey]) -> String {
    teams
        .iter()
        .map(|t| t.number().to_string())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Backup;
    use crate::testing::*;

    #[test]
    fn overlap_counts_distinct_shared_teams() {
        assert_eq!(overlap(&teams(&[1, 2, 3]), &teams(&[3, 2, 9])), 2);
        assert_eq!(overlap(&teams(&[1, 1, 2]), &teams(&[1])), 1);
        assert!(is_same_alliance(&teams(&[1, 2, 3]), &teams(&[1, 2, 4])));
        assert!(!is_same_alliance(&teams(&[1, 2, 3]), &teams(&[1, 5, 4])));
    }

    #[test]
    fn backup_is_appended_to_observed_alliance() {
        let mut registry = AllianceRegistry::new();
        let first = registry.identify(&teams(&[1, 2, 3]));
        assert!(first.created);

        let second = registry.identify(&teams(&[1, 2, 4]));
        assert!(!second.created);
        assert_eq!(second.index, first.index);
        assert_eq!(second.backups_in, teams(&[4]));
        assert_eq!(registry.get(0).unwrap().teams(), teams(&[1, 2, 3, 4]).as_slice());
    }

    #[test]
    fn existing_members_are_never_reordered() {
        let mut registry = AllianceRegistry::new();
        registry.identify(&teams(&[1, 2, 3]));
        registry.identify(&teams(&[3, 2, 4]));
        registry.identify(&teams(&[4, 1, 5]));
        assert_eq!(registry.get(0).unwrap().teams(), teams(&[1, 2, 3, 4, 5]).as_slice());
        assert_eq!(registry.alliances().len(), 1);
    }

    #[test]
    fn disjoint_team_sets_are_different_alliances() {
        let mut registry = AllianceRegistry::new();
        let a = registry.identify(&teams(&[1, 2, 3]));
        let b = registry.identify(&teams(&[4, 5, 6]));
        assert_ne!(a.index, b.index);
        assert!(b.created);
    }

    #[test]
    fn first_sufficient_match_wins_when_ambiguous() {
        let mut registry = AllianceRegistry::new();
        registry.identify(&teams(&[1, 2, 3]));
        registry.identify(&teams(&[4, 5, 6]));
        let ambiguous = registry.identify(&teams(&[1, 2, 4, 5]));
        assert_eq!(ambiguous.index, 0);
        assert_eq!(registry.get(0).unwrap().teams(), teams(&[1, 2, 3, 4, 5]).as_slice());
        assert_eq!(registry.get(1).unwrap().teams(), teams(&[4, 5, 6]).as_slice());
    }

    #[test]
    fn official_selection_is_preferred_and_records_backups() {
        let selections = vec![
            AllianceSelection::new(teams(&[10, 20, 30])),
            AllianceSelection::new(teams(&[40, 50, 60])),
        ];
        let mut registry = AllianceRegistry::with_selections(Some(&selections));

        let id = registry.identify(&teams(&[50, 60, 70]));
        assert_eq!(id.index, 1);
        assert_eq!(id.backups_in, teams(&[70]));
        assert!(!id.created);
        assert_eq!(registry.get(1).unwrap().selection_index(), Some(1));
        assert_eq!(registry.get(1).unwrap().name.as_deref(), Some("Alliance 2"));
    }

    #[test]
    fn one_backup_match_does_not_pin_backup_out() {
        let selections = vec![AllianceSelection::new(teams(&[40, 50, 60]))];
        let mut registry = AllianceRegistry::with_selections(Some(&selections));

        let first = registry.identify(&teams(&[50, 60, 70]));
        assert_eq!(first.backup_out, None);

        let second = registry.identify(&teams(&[60, 70, 50]));
        assert_eq!(second.backup_out, Some(team(40)));
    }

    #[test]
    fn backup_out_needs_consistent_absence() {
        let selections = vec![AllianceSelection::new(teams(&[1, 2, 3, 4]))];
        let mut registry = AllianceRegistry::with_selections(Some(&selections));

        let first = registry.identify(&teams(&[1, 2, 9]));
        assert_eq!(first.backup_out, None, "3 and 4 both absent");

        let second = registry.identify(&teams(&[1, 4, 9]));
        assert_eq!(second.backup_out, Some(team(3)));
    }

    #[test]
    fn declared_backup_is_used_directly() {
        let mut selection = AllianceSelection::new(teams(&[1, 2, 3]));
        selection.backup = Some(Backup { team_in: team(9), team_out: team(2) });
        let selections = vec![selection];
        let mut registry = AllianceRegistry::with_selections(Some(&selections));

        let id = registry.identify(&teams(&[1, 9, 3]));
        assert_eq!(id.index, 0);
        assert_eq!(id.backup_out, Some(team(2)));
        assert_eq!(registry.get(0).unwrap().played_teams(), teams(&[1, 3, 9]));
    }

    #[test]
    fn unmatched_team_set_falls_back_to_observed() {
        let selections = vec![AllianceSelection::new(teams(&[1, 2, 3]))];
        let mut registry = AllianceRegistry::with_selections(Some(&selections));
        let id = registry.identify(&teams(&[7, 8, 9]));
        assert!(id.created);
        assert_eq!(id.index, 1);
        assert_eq!(registry.get(1).unwrap().origin, AllianceOrigin::Observed);
    }

    #[test]
    fn ordered_alliance_uses_pick_order() {
        let mut selection = AllianceSelection::new(teams(&[3, 1, 2, 4]));
        selection.backup = Some(Backup { team_in: team(9), team_out: team(4) });
        let selections = vec![selection];
        assert_eq!(ordered_alliance(&teams(&[1, 2, 3]), Some(&selections)), teams(&[3, 1, 2]));
        assert_eq!(ordered_alliance(&teams(&[2, 9, 1]), Some(&selections)), teams(&[1, 2, 9]));
        assert_eq!(ordered_alliance(&teams(&[7, 8]), Some(&selections)), teams(&[7, 8]));
        assert_eq!(ordered_alliance(&teams(&[7, 8]), None), teams(&[7, 8]));
    }

    #[test]
    fn ordered_alliance_keeps_undeclared_backups() {
        let selections = vec![AllianceSelection::new(teams(&[40, 50, 60]))];
        assert_eq!(
            ordered_alliance(&teams(&[60, 70, 50]), Some(&selections)),
            teams(&[50, 60, 70])
        );
    }
}
