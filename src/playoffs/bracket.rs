use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::{MatchId, PlayerId, SkillTier};
use crate::errors::{EngineError, EngineResult};
use crate::standings::StandingsEntry;

/// How qualifiers are divided into parallel brackets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum SplitPolicy {
    /// One bracket with every qualifier
    #[default]
    Single,
    /// Consecutive ranks in near-equal groups, strongest group in A
    Consecutive { brackets: usize },
    /// Alternating A,B,B,A,A,B... so brackets get comparable strength
    Snake { brackets: usize },
    /// One bracket per skill tier; a lone qualifier joins a neighbouring tier
    ByTier,
}

impl fmt::Display for SplitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitPolicy::Single => write!(f, "single"),
            SplitPolicy::Consecutive { brackets } => write!(f, "consecutive:{}", brackets),
            SplitPolicy::Snake { brackets } => write!(f, "snake:{}", brackets),
            SplitPolicy::ByTier => write!(f, "tier"),
        }
    }
}

impl FromStr for SplitPolicy {
    type Err = EngineError;

    /// Accepts `single`, `tier`, `consecutive:N` and `snake:N`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let (kind, count) = match lowered.split_once(':') {
            Some((kind, count)) => (kind, Some(count)),
            None => (lowered.as_str(), None),
        };

        let brackets = |count: Option<&str>| -> EngineResult<usize> {
            let raw = count.unwrap_or("2");
            match raw.trim().parse::<usize>() {
                Ok(n) if n >= 1 => Ok(n),
                _ => Err(EngineError::validation(format!(
                    "Invalid bracket count '{}' in split policy",
                    raw
                ))),
            }
        };

        match kind {
            "single" => Ok(SplitPolicy::Single),
            "tier" | "by_tier" => Ok(SplitPolicy::ByTier),
            "consecutive" => Ok(SplitPolicy::Consecutive {
                brackets: brackets(count)?,
            }),
            "snake" => Ok(SplitPolicy::Snake {
                brackets: brackets(count)?,
            }),
            other => Err(EngineError::validation(format!(
                "Unknown split policy '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seeded {
    pub seed: u32,
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketMatch {
    pub first: Option<Seeded>,
    pub second: Option<Seeded>,
    pub winner: Option<PlayerId>,
    /// Stored match backing this slot, once both players are known
    pub match_id: Option<MatchId>,
    pub bye: bool,
}

impl BracketMatch {
    fn empty() -> Self {
        Self {
            first: None,
            second: None,
            winner: None,
            match_id: None,
            bye: false,
        }
    }

    fn winner_seed(&self) -> Option<Seeded> {
        let winner = self.winner?;
        [self.first, self.second]
            .into_iter()
            .flatten()
            .find(|s| s.player_id == winner)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketRound {
    pub name: String,
    pub matches: Vec<BracketMatch>,
}

impl BracketRound {
    fn is_complete(&self) -> bool {
        self.matches.iter().all(|m| m.winner.is_some())
    }
}

/// A match slot whose two players are known but which has no stored match
/// yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingMatch {
    pub round_index: usize,
    pub slot: usize,
    pub first: PlayerId,
    pub second: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bracket {
    pub name: String,
    pub size: usize,
    pub rounds: Vec<BracketRound>,
    pub champion: Option<PlayerId>,
}

impl Bracket {
    /// Seeds `qualifiers` (already in rank order) into a single-elimination
    /// bracket sized to the next power of two. Missing seeds become byes for
    /// the top seeds, which advance immediately.
    pub fn seeded(name: impl Into<String>, qualifiers: &[PlayerId]) -> EngineResult<Self> {
        let name = name.into();
        if qualifiers.len() < 2 {
            return Err(EngineError::validation(format!(
                "Bracket {} needs at least two qualifiers, got {}",
                name,
                qualifiers.len()
            )));
        }

        let size = qualifiers.len().next_power_of_two();
        let seed_at = |seed: usize| {
            qualifiers.get(seed - 1).map(|&player_id| Seeded {
                seed: seed as u32,
                player_id,
            })
        };

        let order = seed_order(size);
        let first_round: Vec<BracketMatch> = order
            .chunks(2)
            .map(|pair| {
                let first = seed_at(pair[0]);
                let second = seed_at(pair[1]);
                let bye = first.is_none() || second.is_none();
                BracketMatch {
                    winner: if bye {
                        first.or(second).map(|s| s.player_id)
                    } else {
                        None
                    },
                    first,
                    second,
                    match_id: None,
                    bye,
                }
            })
            .collect();

        let mut rounds = vec![BracketRound {
            name: round_name(first_round.len()),
            matches: first_round,
        }];
        let mut width = size / 4;
        while width >= 1 {
            rounds.push(BracketRound {
                name: round_name(width),
                matches: vec![BracketMatch::empty(); width],
            });
            width /= 2;
        }

        let mut bracket = Self {
            name,
            size,
            rounds,
            champion: None,
        };
        bracket.advance();
        Ok(bracket)
    }

    /// Number of match slots across all rounds, byes included.
    pub fn total_matches(&self) -> usize {
        self.rounds.iter().map(|r| r.matches.len()).sum()
    }

    pub fn is_finished(&self) -> bool {
        self.champion.is_some()
    }

    /// Slots ready to be played that have no stored match yet.
    pub fn pending_matches(&self) -> Vec<PendingMatch> {
        let mut pending = Vec::new();
        for (round_index, round) in self.rounds.iter().enumerate() {
            for (slot, m) in round.matches.iter().enumerate() {
                if let (Some(first), Some(second), None, None) =
                    (m.first, m.second, m.winner, m.match_id)
                {
                    pending.push(PendingMatch {
                        round_index,
                        slot,
                        first: first.player_id,
                        second: second.player_id,
                    });
                }
            }
        }
        pending
    }

    pub fn assign_match(&mut self, round_index: usize, slot: usize, match_id: MatchId) -> EngineResult<()> {
        let m = self
            .rounds
            .get_mut(round_index)
            .and_then(|r| r.matches.get_mut(slot))
            .ok_or_else(|| {
                EngineError::validation(format!(
                    "Bracket {} has no slot {} in round {}",
                    self.name,
                    slot,
                    round_index + 1
                ))
            })?;
        m.match_id = Some(match_id);
        Ok(())
    }

    pub fn contains_match(&self, match_id: MatchId) -> bool {
        self.locate(match_id).is_some()
    }

    fn locate(&self, match_id: MatchId) -> Option<(usize, usize)> {
        self.rounds.iter().enumerate().find_map(|(r, round)| {
            round
                .matches
                .iter()
                .position(|m| m.match_id == Some(match_id))
                .map(|slot| (r, slot))
        })
    }

    /// Records the winner of a stored playoff match and advances the bracket
    /// if that completed its round.
    pub fn record_result(&mut self, match_id: MatchId, winner: PlayerId) -> EngineResult<()> {
        let (round_index, slot) = self.locate(match_id).ok_or_else(|| {
            EngineError::validation(format!(
                "Match {} is not part of bracket {}",
                match_id, self.name
            ))
        })?;

        let m = &mut self.rounds[round_index].matches[slot];
        if m.winner.is_some() {
            return Err(EngineError::conflict(format!(
                "Bracket {} already has a winner for match {}",
                self.name, match_id
            )));
        }
        let plays = [m.first, m.second]
            .into_iter()
            .flatten()
            .any(|s| s.player_id == winner);
        if !plays {
            return Err(EngineError::validation(format!(
                "Player {} does not play in match {}",
                winner, match_id
            )));
        }
        m.winner = Some(winner);

        if round_index + 1 == self.rounds.len() {
            self.champion = Some(winner);
            info!("Bracket {} won by player {}", self.name, winner);
        } else {
            self.advance();
        }
        Ok(())
    }

    /// Moves winners of every completed round into their fixed slot in the
    /// next round. Returns true when any slot was filled.
    pub fn advance(&mut self) -> bool {
        let mut changed = false;
        for r in 0..self.rounds.len().saturating_sub(1) {
            if !self.rounds[r].is_complete() {
                break;
            }
            let winners: Vec<Option<Seeded>> = self.rounds[r]
                .matches
                .iter()
                .map(BracketMatch::winner_seed)
                .collect();
            for (idx, winner) in winners.into_iter().enumerate() {
                let target = &mut self.rounds[r + 1].matches[idx / 2];
                let seat = if idx % 2 == 0 {
                    &mut target.first
                } else {
                    &mut target.second
                };
                if seat.is_none() && winner.is_some() {
                    *seat = winner;
                    changed = true;
                }
            }
        }
        changed
    }
}

/// Standard seeding positions: 1 meets `size`, and the top two seeds can only
/// meet in the final. For 8 this is 1,8,4,5,2,7,3,6.
pub fn seed_order(size: usize) -> Vec<usize> {
    let mut order = vec![1];
    while order.len() < size {
        let mirror = order.len() * 2 + 1;
        order = order.iter().flat_map(|&s| [s, mirror - s]).collect();
    }
    order
}

fn round_name(matches: usize) -> String {
    match matches {
        1 => "Final".to_string(),
        2 => "Semifinal".to_string(),
        4 => "Quarterfinal".to_string(),
        n => format!("Round of {}", n * 2),
    }
}

fn bracket_label(index: usize) -> String {
    let letter = (b'A' + (index % 26) as u8) as char;
    if index < 26 {
        letter.to_string()
    } else {
        format!("{}{}", letter, index / 26)
    }
}

/// Builds the playoff brackets from final standings.
///
/// The top `qualifier_count` entries qualify; seeding is applied
/// independently inside each bracket after the split.
pub fn build_bracket(
    standings: &[StandingsEntry],
    qualifier_count: usize,
    policy: SplitPolicy,
) -> EngineResult<Vec<Bracket>> {
    if qualifier_count < 2 {
        return Err(EngineError::validation(
            "A playoff needs at least two qualifiers",
        ));
    }
    let take = qualifier_count.min(standings.len());
    if take < qualifier_count {
        warn!(
            "Only {} ranked players available for {} playoff places",
            take, qualifier_count
        );
    }

    let mut ranked: Vec<&StandingsEntry> = standings.iter().collect();
    ranked.sort_by_key(|e| e.rank);
    let qualifiers = &ranked[..take];

    let groups: Vec<(String, Vec<PlayerId>)> = match policy {
        SplitPolicy::Single => vec![("Main".to_string(), ids(qualifiers))],
        SplitPolicy::Consecutive { brackets } => {
            let brackets = bracket_count(brackets, take)?;
            let (base, extra) = (take / brackets, take % brackets);
            let mut rest = qualifiers;
            (0..brackets)
                .map(|i| {
                    let (group, tail) = rest.split_at(base + usize::from(i < extra));
                    rest = tail;
                    (bracket_label(i), ids(group))
                })
                .collect()
        }
        SplitPolicy::Snake { brackets } => {
            let brackets = bracket_count(brackets, take)?;
            let mut groups: Vec<Vec<PlayerId>> = vec![Vec::new(); brackets];
            for (i, entry) in qualifiers.iter().enumerate() {
                let pass = i / brackets;
                let pos = i % brackets;
                let target = if pass % 2 == 0 { pos } else { brackets - 1 - pos };
                groups[target].push(entry.player_id);
            }
            groups
                .into_iter()
                .enumerate()
                .map(|(i, g)| (bracket_label(i), g))
                .collect()
        }
        SplitPolicy::ByTier => tier_groups(qualifiers),
    };

    let brackets = groups
        .into_iter()
        .map(|(name, members)| Bracket::seeded(name, &members))
        .collect::<EngineResult<Vec<_>>>()?;

    info!(
        "Built {} playoff bracket(s) for {} qualifiers ({})",
        brackets.len(),
        take,
        policy
    );
    Ok(brackets)
}

fn ids(entries: &[&StandingsEntry]) -> Vec<PlayerId> {
    entries.iter().map(|e| e.player_id).collect()
}

/// Every bracket needs at least two players.
fn bracket_count(brackets: usize, qualifiers: usize) -> EngineResult<usize> {
    if brackets == 0 {
        return Err(EngineError::validation("Bracket count must be at least 1"));
    }
    if qualifiers < brackets * 2 {
        return Err(EngineError::validation(format!(
            "{} qualifiers cannot fill {} brackets of at least two players",
            qualifiers, brackets
        )));
    }
    Ok(brackets)
}

/// Gold, Silver and Bronze groups, skipping empty tiers. A tier left with a
/// single qualifier joins its neighbour: the tier above, or Silver for a
/// lone Gold.
fn tier_groups(qualifiers: &[&StandingsEntry]) -> Vec<(String, Vec<PlayerId>)> {
    let mut groups: Vec<(SkillTier, Vec<&StandingsEntry>)> =
        [SkillTier::Gold, SkillTier::Silver, SkillTier::Bronze]
            .into_iter()
            .map(|tier| {
                let members: Vec<&StandingsEntry> =
                    qualifiers.iter().copied().filter(|e| e.tier == tier).collect();
                (tier, members)
            })
            .filter(|(_, members)| !members.is_empty())
            .collect();

    while groups.len() > 1 {
        let Some(lone) = groups.iter().position(|(_, members)| members.len() == 1) else {
            break;
        };
        let (tier, members) = groups.remove(lone);
        let target = lone.saturating_sub(1);
        warn!(
            "Only one {} qualifier, seeding them into the {} bracket",
            tier.as_str(),
            groups[target].0.as_str()
        );
        groups[target].1.extend(members);
        groups[target].1.sort_by_key(|e| e.rank);
    }

    groups
        .into_iter()
        .map(|(tier, members)| (capitalize(tier.as_str()), ids(&members)))
        .collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standings(n: usize) -> Vec<StandingsEntry> {
        (1..=n)
            .map(|i| StandingsEntry {
                rank: i,
                player_id: i as PlayerId * 10,
                points: (30 - i) as i32,
                matches_played: 5,
                matches_won: 0,
                matches_lost: 0,
                sets_won: 0,
                sets_lost: 0,
                set_differential: 0,
                byes: 0,
                rating: 1500 - i as i32 * 20,
                tier: if i <= 3 {
                    SkillTier::Gold
                } else if i <= 6 {
                    SkillTier::Silver
                } else {
                    SkillTier::Bronze
                },
            })
            .collect()
    }

    fn seeds(m: &BracketMatch) -> (Option<u32>, Option<u32>) {
        (m.first.map(|s| s.seed), m.second.map(|s| s.seed))
    }

    /// Plays every pending match, higher seed wins, and returns games played.
    fn play_out(bracket: &mut Bracket) -> usize {
        let mut next_id = 1;
        let mut played = 0;
        loop {
            let pending = bracket.pending_matches();
            if pending.is_empty() {
                break;
            }
            for p in pending {
                bracket.assign_match(p.round_index, p.slot, next_id).unwrap();
                let m = &bracket.rounds[p.round_index].matches[p.slot];
                let winner = match (m.first, m.second) {
                    (Some(a), Some(b)) if a.seed < b.seed => a.player_id,
                    (_, Some(b)) => b.player_id,
                    _ => unreachable!(),
                };
                bracket.record_result(next_id, winner).unwrap();
                next_id += 1;
                played += 1;
            }
        }
        played
    }

    #[test]
    fn test_seed_order() {
        assert_eq!(seed_order(2), vec![1, 2]);
        assert_eq!(seed_order(4), vec![1, 4, 2, 3]);
        assert_eq!(seed_order(8), vec![1, 8, 4, 5, 2, 7, 3, 6]);
    }

    #[test]
    fn test_eight_qualifiers_seed_one_against_eight() {
        let brackets = build_bracket(&standings(10), 8, SplitPolicy::Single).unwrap();
        assert_eq!(brackets.len(), 1);
        let bracket = &brackets[0];
        assert_eq!(bracket.size, 8);
        let names: Vec<&str> = bracket.rounds.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Quarterfinal", "Semifinal", "Final"]);
        let first_round: Vec<_> = bracket.rounds[0].matches.iter().map(seeds).collect();
        assert_eq!(
            first_round,
            vec![
                (Some(1), Some(8)),
                (Some(4), Some(5)),
                (Some(2), Some(7)),
                (Some(3), Some(6))
            ]
        );
        assert_eq!(bracket.pending_matches().len(), 4);
    }

    #[test]
    fn test_power_of_two_has_n_minus_one_matches() {
        for n in [2, 4, 8, 16] {
            let mut bracket = build_bracket(&standings(16), n, SplitPolicy::Single)
                .unwrap()
                .remove(0);
            assert_eq!(bracket.total_matches(), n - 1);
            assert_eq!(play_out(&mut bracket), n - 1);
            assert_eq!(bracket.champion, Some(10));
        }
    }

    #[test]
    fn test_byes_go_to_top_seeds() {
        let bracket = build_bracket(&standings(6), 6, SplitPolicy::Single)
            .unwrap()
            .remove(0);
        assert_eq!(bracket.size, 8);
        let byes: Vec<u32> = bracket.rounds[0]
            .matches
            .iter()
            .filter(|m| m.bye)
            .filter_map(|m| m.first.map(|s| s.seed))
            .collect();
        assert_eq!(byes, vec![1, 2]);
        // Semifinal slots wait until the whole first round is decided
        assert!(bracket.rounds[1].matches.iter().all(|m| m.first.is_none()));
        assert_eq!(bracket.pending_matches().len(), 2);
    }

    #[test]
    fn test_byes_advance_after_round_completes() {
        let mut bracket = build_bracket(&standings(6), 6, SplitPolicy::Single)
            .unwrap()
            .remove(0);
        let played = play_out(&mut bracket);
        assert_eq!(played, 5);
        assert_eq!(bracket.champion, Some(10));
    }

    #[test]
    fn test_round_waits_for_all_matches() {
        let mut bracket = Bracket::seeded("Main", &[1, 2, 3, 4]).unwrap();
        bracket.assign_match(0, 0, 100).unwrap();
        bracket.assign_match(0, 1, 101).unwrap();
        bracket.record_result(100, 1).unwrap();
        assert!(bracket.rounds[1].matches[0].first.is_none());
        bracket.record_result(101, 3).unwrap();
        let fin = &bracket.rounds[1].matches[0];
        assert_eq!(fin.first.map(|s| s.player_id), Some(1));
        assert_eq!(fin.second.map(|s| s.player_id), Some(3));
    }

    #[test]
    fn test_record_result_rejects_outsiders_and_repeats() {
        let mut bracket = Bracket::seeded("Main", &[1, 2]).unwrap();
        bracket.assign_match(0, 0, 7).unwrap();
        assert!(matches!(
            bracket.record_result(7, 99),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            bracket.record_result(8, 1),
            Err(EngineError::Validation(_))
        ));
        bracket.record_result(7, 2).unwrap();
        assert_eq!(bracket.champion, Some(2));
        assert!(matches!(
            bracket.record_result(7, 1),
            Err(EngineError::StateConflict(_))
        ));
    }

    #[test]
    fn test_consecutive_split() {
        let brackets =
            build_bracket(&standings(8), 8, SplitPolicy::Consecutive { brackets: 2 }).unwrap();
        assert_eq!(brackets.len(), 2);
        assert_eq!(brackets[0].name, "A");
        assert_eq!(brackets[1].name, "B");
        let a = &brackets[0].rounds[0].matches[0];
        assert_eq!(a.first.map(|s| s.player_id), Some(10));
        assert_eq!(a.second.map(|s| s.player_id), Some(40));
        let b = &brackets[1].rounds[0].matches[0];
        assert_eq!(b.first.map(|s| s.player_id), Some(50));
        assert_eq!(b.first.map(|s| s.seed), Some(1));
    }

    #[test]
    fn test_snake_split_balances_strength() {
        let brackets = build_bracket(&standings(8), 8, SplitPolicy::Snake { brackets: 2 }).unwrap();
        let members = |b: &Bracket| -> Vec<PlayerId> {
            let mut ids: Vec<PlayerId> = b.rounds[0]
                .matches
                .iter()
                .flat_map(|m| [m.first, m.second])
                .flatten()
                .map(|s| s.player_id)
                .collect();
            ids.sort();
            ids
        };
        assert_eq!(members(&brackets[0]), vec![10, 40, 50, 80]);
        assert_eq!(members(&brackets[1]), vec![20, 30, 60, 70]);
    }

    #[test]
    fn test_tier_split() {
        let brackets = build_bracket(&standings(8), 8, SplitPolicy::ByTier).unwrap();
        let names: Vec<&str> = brackets.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Gold", "Silver", "Bronze"]);
        assert_eq!(brackets[0].size, 4);
        assert_eq!(brackets[2].size, 2);
    }

    #[test]
    fn test_split_too_thin_is_rejected() {
        let err = build_bracket(&standings(3), 3, SplitPolicy::Consecutive { brackets: 3 })
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let err = build_bracket(&standings(4), 4, SplitPolicy::Consecutive { brackets: 3 })
            .unwrap_err();
        assert!(err.to_string().contains("cannot fill 3 brackets"));
        assert!(build_bracket(&standings(5), 5, SplitPolicy::Snake { brackets: 3 }).is_err());
    }

    #[test]
    fn test_consecutive_split_builds_every_requested_bracket() {
        let brackets =
            build_bracket(&standings(7), 7, SplitPolicy::Consecutive { brackets: 3 }).unwrap();
        let names: Vec<&str> = brackets.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        let sizes: Vec<usize> = brackets.iter().map(|b| b.size).collect();
        assert_eq!(sizes, vec![4, 2, 2]);
        let c = &brackets[2].rounds[0].matches[0];
        assert_eq!(c.first.map(|s| s.player_id), Some(60));
        assert_eq!(c.second.map(|s| s.player_id), Some(70));
    }

    #[test]
    fn test_lone_bronze_joins_silver() {
        let brackets = build_bracket(&standings(7), 7, SplitPolicy::ByTier).unwrap();
        let names: Vec<&str> = brackets.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Gold", "Silver"]);
        assert_eq!(brackets[1].size, 4);
        // Rank 7 is the weakest seed of the merged bracket
        let opener = &brackets[1].rounds[0].matches[0];
        assert_eq!(opener.first.map(|s| s.player_id), Some(40));
        assert_eq!(opener.second.map(|s| (s.seed, s.player_id)), Some((4, 70)));
    }

    #[test]
    fn test_lone_gold_joins_silver_as_top_seed() {
        let mut table = standings(6);
        table[1].tier = SkillTier::Silver;
        table[2].tier = SkillTier::Silver;
        let brackets = build_bracket(&table, 6, SplitPolicy::ByTier).unwrap();
        assert_eq!(brackets.len(), 1);
        assert_eq!(brackets[0].name, "Silver");
        let opener = &brackets[0].rounds[0].matches[0];
        assert_eq!(opener.first.map(|s| (s.seed, s.player_id)), Some((1, 10)));
    }

    #[test]
    fn test_qualifier_count_is_clamped() {
        let brackets = build_bracket(&standings(5), 8, SplitPolicy::Single).unwrap();
        assert_eq!(brackets[0].size, 8);
        assert_eq!(brackets[0].rounds[0].matches.iter().filter(|m| m.bye).count(), 3);
        assert!(build_bracket(&standings(1), 8, SplitPolicy::Single).is_err());
    }

    #[test]
    fn test_split_policy_parsing() {
        assert_eq!("single".parse::<SplitPolicy>().unwrap(), SplitPolicy::Single);
        assert_eq!(
            "Snake:3".parse::<SplitPolicy>().unwrap(),
            SplitPolicy::Snake { brackets: 3 }
        );
        assert_eq!(
            "consecutive".parse::<SplitPolicy>().unwrap(),
            SplitPolicy::Consecutive { brackets: 2 }
        );
        assert_eq!("tier".parse::<SplitPolicy>().unwrap(), SplitPolicy::ByTier);
        assert!("snake:0".parse::<SplitPolicy>().is_err());
        assert!("random".parse::<SplitPolicy>().is_err());
    }
}
