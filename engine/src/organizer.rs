//! Grouping and ordering of an event's flat match list.
use crate::{CompLevel, MatchRecord, PlayoffType, TeamKey};
use log::debug;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Matches bucketed by competition level, each bucket in natural key order.
#[derive(Debug, Clone, Default)]
pub struct OrganizedMatches<'a> {
    levels: HashMap<CompLevel, Vec<&'a MatchRecord>>,
    num: usize,
}

impl<'a> OrganizedMatches<'a> {
    pub fn get(&self, level: CompLevel) -> &[&'a MatchRecord] {
        self.levels.get(&level).map(Vec::as_slice).unwrap_or_default()
    }

    /// Total number of matches across all levels.
    pub fn num(&self) -> usize {
        self.num
    }

    pub fn is_empty(&self) -> bool {
        self.num == 0
    }

    /// Level buckets in play order, skipping empty levels.
    pub fn iter(&self) -> impl Iterator<Item = (CompLevel, &[&'a MatchRecord])> + '_ {
        CompLevel::ALL
            .into_iter()
            .map(|level| (level, self.get(level)))
            .filter(|(_, matches)| !matches.is_empty())
    }
}

/// Group matches by level, sorted by natural key name (`qm10` after `qm9`).
pub fn organize(matches: &[MatchRecord]) -> OrganizedMatches<'_> {
    organize_refs(matches.iter())
}

fn organize_refs<'a>(matches: impl Iterator<Item = &'a MatchRecord>) -> OrganizedMatches<'a> {
    let mut sorted: Vec<(&'a MatchRecord, String)> = matches.map(|m| (m, m.key_name())).collect();
    sorted.sort_by(|(a, ka), (b, kb)| {
        natural_cmp(ka, kb).then_with(|| a.play_order().cmp(&b.play_order()))
    });

    let mut organized = OrganizedMatches { levels: HashMap::new(), num: sorted.len() };
    for (m, _) in sorted {
        organized.levels.entry(m.comp_level).or_default().push(m);
    }
    organized
}

/// Compare strings treating runs of ASCII digits as integers.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = chunks(a);
    let mut right = chunks(b);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| l.len().cmp(&r.len())),
                    _ => l.cmp(r),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Split into alternating digit / non-digit runs.
fn chunks(s: &str) -> impl Iterator<Item = &str> {
    let mut rest = s;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let digit = first.is_ascii_digit();
        let end = rest
            .find(|c: char| c.is_ascii_digit() != digit)
            .unwrap_or(rest.len());
        let (chunk, tail) = rest.split_at(end);
        rest = tail;
        Some(chunk)
    })
}

/// Levels concatenated in play order, each level ordered by `play_order`.
fn play_ordered<'a>(matches: impl Iterator<Item = &'a MatchRecord>) -> Vec<&'a MatchRecord> {
    let organized = organize_refs(matches);
    organized
        .iter()
        .flat_map(|(_, bucket)| {
            let mut bucket = bucket.to_vec();
            bucket.sort_by_key(|m| m.play_order());
            bucket
        })
        .collect()
}

/// The next `n` unplayed matches.
pub fn upcoming(matches: &[MatchRecord], n: usize) -> Vec<&MatchRecord> {
    let mut ordered = play_ordered(matches.iter().filter(|m| !m.has_been_played()));
    ordered.truncate(n);
    ordered
}

/// The last `n` played matches, oldest first.
pub fn recent(matches: &[MatchRecord], n: usize) -> Vec<&MatchRecord> {
    let ordered = play_ordered(matches.iter().filter(|m| m.has_been_played()));
    let skip = ordered.len().saturating_sub(n);
    ordered.into_iter().skip(skip).collect()
}

/// Matches fit for team-facing lists: no placeholder team slots.
pub fn publishable(matches: &[MatchRecord]) -> impl Iterator<Item = &MatchRecord> {
    matches.iter().filter(|m| !m.has_placeholder_team())
}

pub fn team_matches(matches: &[MatchRecord], team: TeamKey) -> Vec<&MatchRecord> {
    matches.iter().filter(|m| m.color_of(team).is_some()).collect()
}

/// Drop unplayed elimination matches whose series has already been decided.
///
/// Round-robin semifinals are never pruned since every pairing is played.
pub fn prune_decided_series(
    matches: &[MatchRecord],
    playoff_type: Option<PlayoffType>,
) -> Vec<&MatchRecord> {
    let mut red_wins: HashMap<(CompLevel, u32), u32> = HashMap::new();
    let mut blue_wins: HashMap<(CompLevel, u32), u32> = HashMap::new();
    for m in matches.iter().filter(|m| m.comp_level.is_elim() && m.has_been_played()) {
        let key = (m.comp_level, m.set_number);
        match m.winning_alliance() {
            Some(crate::AllianceColor::Red) => *red_wins.entry(key).or_default() += 1,
            Some(crate::AllianceColor::Blue) => *blue_wins.entry(key).or_default() += 1,
            None => {}
        }
    }

    matches
        .iter()
        .filter(|m| {
            if !m.comp_level.is_elim() || m.has_been_played() {
                return true;
            }
            if playoff_type == Some(PlayoffType::RoundRobin6Team) && m.comp_level != CompLevel::F {
                return true;
            }
            let key = (m.comp_level, m.set_number);
            let needed = playoff_type
                .map(|pt| pt.win_threshold(m.comp_level))
                .unwrap_or(2);
            let decided = red_wins.get(&key).copied().unwrap_or(0) >= needed
                || blue_wins.get(&key).copied().unwrap_or(0) >= needed;
            if decided {
                debug!("pruning {}: series already decided", m.key_name());
            }
            !decided
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    #[test]
    fn natural_ordering_compares_numeric_runs_as_integers() {
        assert_eq!(natural_cmp("qm9", "qm10"), Ordering::Less);
        assert_eq!(natural_cmp("2019casj_qf1m2", "2019casj_qf2m1"), Ordering::Less);
        assert_eq!(natural_cmp("qf1m10", "qf1m9"), Ordering::Greater);
        assert_eq!(natural_cmp("abc", "abc"), Ordering::Equal);
        assert_eq!(natural_cmp("qm", "qm1"), Ordering::Less);
    }

    #[test]
    fn organize_buckets_by_level_and_counts() {
        let matches = vec![
            qual(10, &[1, 2, 3], &[4, 5, 6], Some((1, 0))),
            elim(CompLevel::Qf, 1, 1, &[1, 2, 3], &[4, 5, 6], None),
            qual(9, &[1, 2, 3], &[4, 5, 6], Some((1, 0))),
            qual(1, &[1, 2, 3], &[4, 5, 6], Some((1, 0))),
        ];
        let organized = organize(&matches);
        assert_eq!(organized.num(), 4);
        let quals: Vec<u32> = organized.get(CompLevel::Qm).iter().map(|m| m.match_number).collect();
        assert_eq!(quals, vec![1, 9, 10]);
        assert_eq!(organized.get(CompLevel::Qf).len(), 1);
        assert!(organized.get(CompLevel::Sf).is_empty());
    }

    #[test]
    fn elim_bucket_is_set_major() {
        let matches = vec![
            elim(CompLevel::Qf, 2, 1, &[], &[], None),
            elim(CompLevel::Qf, 1, 2, &[], &[], None),
            elim(CompLevel::Qf, 1, 1, &[], &[], None),
        ];
        let organized = organize(&matches);
        let keys: Vec<String> = organized.get(CompLevel::Qf).iter().map(|m| m.key_name()).collect();
        assert_eq!(keys, vec!["2019test_qf1m1", "2019test_qf1m2", "2019test_qf2m1"]);
    }

    #[test]
    fn upcoming_uses_play_order_within_level() {
        let matches = vec![
            elim(CompLevel::Qf, 1, 1, &[], &[], Some((10, 5))),
            elim(CompLevel::Qf, 1, 2, &[], &[], None),
            elim(CompLevel::Qf, 2, 1, &[], &[], Some((10, 5))),
            elim(CompLevel::Qf, 2, 2, &[], &[], None),
            elim(CompLevel::Sf, 1, 1, &[], &[], None),
        ];
        let next: Vec<String> = upcoming(&matches, 2).iter().map(|m| m.key_name()).collect();
        assert_eq!(next, vec!["2019test_qf1m2", "2019test_qf2m2"]);
    }

    #[test]
    fn recent_returns_last_played() {
        let matches = vec![
            qual(1, &[], &[], Some((1, 0))),
            qual(2, &[], &[], Some((1, 0))),
            qual(3, &[], &[], Some((1, 0))),
            qual(4, &[], &[], None),
        ];
        let last: Vec<u32> = recent(&matches, 2).iter().map(|m| m.match_number).collect();
        assert_eq!(last, vec![2, 3]);
        assert_eq!(recent(&matches, 10).len(), 3);
    }

    #[test]
    fn placeholder_matches_are_not_publishable() {
        let mut tbd = elim(CompLevel::Sf, 1, 1, &[1, 2, 3], &[], None);
        tbd.blue.placeholders = 3;
        let matches = vec![tbd, elim(CompLevel::Qf, 1, 1, &[1, 2, 3], &[4, 5, 6], None)];
        let published: Vec<CompLevel> = publishable(&matches).map(|m| m.comp_level).collect();
        assert_eq!(published, vec![CompLevel::Qf]);
    }

    #[test]
    fn decided_series_drops_leftover_matches() {
        let matches = vec![
            elim(CompLevel::Qf, 1, 1, &[1, 2, 3], &[4, 5, 6], Some((10, 5))),
            elim(CompLevel::Qf, 1, 2, &[1, 2, 3], &[4, 5, 6], Some((10, 5))),
            elim(CompLevel::Qf, 1, 3, &[1, 2, 3], &[4, 5, 6], None),
            elim(CompLevel::Qf, 2, 3, &[7, 8, 9], &[10, 11, 12], None),
        ];
        let kept = prune_decided_series(&matches, Some(PlayoffType::Bracket8Team));
        let keys: Vec<String> = kept.iter().map(|m| m.key_name()).collect();
        assert_eq!(keys, vec!["2019test_qf1m1", "2019test_qf1m2", "2019test_qf2m3"]);
    }

    #[test]
    fn round_robin_semis_are_never_pruned() {
        let matches = vec![
            elim(CompLevel::Sf, 1, 1, &[1, 2, 3], &[4, 5, 6], Some((10, 5))),
            elim(CompLevel::Sf, 1, 2, &[1, 2, 3], &[7, 8, 9], Some((10, 5))),
            elim(CompLevel::Sf, 1, 3, &[4, 5, 6], &[7, 8, 9], None),
        ];
        let kept = prune_decided_series(&matches, Some(PlayoffType::RoundRobin6Team));
        assert_eq!(kept.len(), 3);
    }
}
