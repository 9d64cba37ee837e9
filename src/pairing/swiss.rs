use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::domain::{Match, MatchStage, MatchStatus, PlayerId};
use crate::errors::{EngineError, EngineResult};

/// A player as seen by the pairing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwissPlayer {
    pub player_id: PlayerId,
    pub points: i32,
    pub rating: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum Pairing {
    Game {
        first: PlayerId,
        second: PlayerId,
        /// Set only when rematches were explicitly allowed and forced
        rematch: bool,
    },
    Bye {
        player: PlayerId,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PairingOptions {
    /// Fall back to repeat pairings when no rematch-free round exists
    pub allow_rematches: bool,
}

/// Who has played whom this season and how many BYEs each player received.
#[derive(Debug, Clone, Default)]
pub struct PairingHistory {
    opponents: HashMap<PlayerId, HashSet<PlayerId>>,
    byes: HashMap<PlayerId, u32>,
}

impl PairingHistory {
    /// Builds history from regular-season matches; cancelled matches are
    /// ignored, scheduled ones already count as a meeting.
    pub fn from_matches(matches: &[Match]) -> Self {
        let mut history = Self::default();
        for m in matches {
            if m.stage != MatchStage::Regular || m.status == MatchStatus::Cancelled {
                continue;
            }
            match m.second_player_id {
                Some(second) => history.record_game(m.first_player_id, second),
                None => history.record_bye(m.first_player_id),
            }
        }
        history
    }

    pub fn record_game(&mut self, a: PlayerId, b: PlayerId) {
        self.opponents.entry(a).or_default().insert(b);
        self.opponents.entry(b).or_default().insert(a);
    }

    pub fn record_bye(&mut self, player: PlayerId) {
        *self.byes.entry(player).or_insert(0) += 1;
    }

    pub fn have_met(&self, a: PlayerId, b: PlayerId) -> bool {
        self.opponents.get(&a).is_some_and(|set| set.contains(&b))
    }

    pub fn byes(&self, player: PlayerId) -> u32 {
        self.byes.get(&player).copied().unwrap_or(0)
    }
}

/// Produces the pairings of the next Swiss round.
///
/// Players are ranked by points then rating. With an odd count the BYE goes
/// to the lowest-ranked player among those with the fewest BYEs so far, so
/// nobody gets a second BYE while someone still has none. Pairing walks down
/// the ranking giving each top unpaired player the nearest-ranked opponent
/// they have not met whose pairing still leaves the rest pairable.
///
/// Games are returned top boards first (ascending average rank index),
/// followed by the BYE.
pub fn generate_round(
    players: &[SwissPlayer],
    history: &PairingHistory,
    round_number: u32,
    options: &PairingOptions,
) -> EngineResult<Vec<Pairing>> {
    if round_number == 0 {
        return Err(EngineError::validation("Round numbers start at 1"));
    }
    if players.len() < 2 {
        return Err(EngineError::PairingImpossible(format!(
            "Round {} needs at least two active players, found {}",
            round_number,
            players.len()
        )));
    }
    ensure_unique(players)?;

    let ranked = rank(players);
    let strict = attempt(&ranked, history, false);
    let (pairs, bye) = match strict {
        Some(found) => found,
        None if options.allow_rematches => {
            info!("Round {}: no rematch-free pairing, pairing with rematches allowed", round_number);
            attempt(&ranked, history, true).ok_or_else(|| {
                EngineError::PairingImpossible(format!(
                    "Round {} cannot be paired even with rematches",
                    round_number
                ))
            })?
        }
        None => {
            return Err(EngineError::PairingImpossible(format!(
                "Every remaining pairing for round {} would repeat an earlier match",
                round_number
            )));
        }
    };

    let mut pairs = pairs;
    pairs.sort_by_key(|&(a, b)| a + b);

    let mut pairings: Vec<Pairing> = pairs
        .into_iter()
        .map(|(a, b)| Pairing::Game {
            first: ranked[a].player_id,
            second: ranked[b].player_id,
            rematch: history.have_met(ranked[a].player_id, ranked[b].player_id),
        })
        .collect();
    if let Some(idx) = bye {
        pairings.push(Pairing::Bye {
            player: ranked[idx].player_id,
        });
    }

    info!(
        "Round {}: paired {} players into {} games{}",
        round_number,
        ranked.len(),
        pairings.len() - usize::from(bye.is_some()),
        if bye.is_some() { " plus a BYE" } else { "" }
    );
    Ok(pairings)
}

fn ensure_unique(players: &[SwissPlayer]) -> EngineResult<()> {
    let mut seen = HashSet::new();
    for p in players {
        if !seen.insert(p.player_id) {
            return Err(EngineError::validation(format!(
                "Player {} is listed twice",
                p.player_id
            )));
        }
    }
    Ok(())
}

fn rank(players: &[SwissPlayer]) -> Vec<SwissPlayer> {
    let mut ranked = players.to_vec();
    ranked.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then(b.rating.cmp(&a.rating))
            .then(a.player_id.cmp(&b.player_id))
    });
    ranked
}

type Solution = (Vec<(usize, usize)>, Option<usize>);

fn attempt(
    ranked: &[SwissPlayer],
    history: &PairingHistory,
    allow_rematches: bool,
) -> Option<Solution> {
    let search = Search::new(ranked, history, allow_rematches);
    let all: Vec<usize> = (0..ranked.len()).collect();
    if ranked.len() % 2 == 0 {
        return search.pair(&all).map(|pairs| (pairs, None));
    }

    for candidate in bye_candidates(ranked, history) {
        let rest: Vec<usize> = all.iter().copied().filter(|&i| i != candidate).collect();
        if let Some(pairs) = search.pair(&rest) {
            return Some((pairs, Some(candidate)));
        }
        debug!(
            "BYE for player {} leaves the rest unpairable, trying the next candidate",
            ranked[candidate].player_id
        );
    }
    None
}

/// Lowest-ranked first, restricted to the players with the fewest BYEs.
fn bye_candidates(ranked: &[SwissPlayer], history: &PairingHistory) -> Vec<usize> {
    let fewest = ranked
        .iter()
        .map(|p| history.byes(p.player_id))
        .min()
        .unwrap_or(0);
    (0..ranked.len())
        .rev()
        .filter(|&i| history.byes(ranked[i].player_id) == fewest)
        .collect()
}

/// Greedy nearest-rank pairing guarded by an exact feasibility check.
///
/// Players are indexed by rank. A pair is only committed when the players
/// left over still admit a perfect matching, so the walk never dead-ends
/// and finds a pairing whenever one exists.
struct Search<'a> {
    ranked: &'a [SwissPlayer],
    history: &'a PairingHistory,
    /// Allowed opponents per rank index, nearest first
    adj: Vec<Vec<usize>>,
}

impl<'a> Search<'a> {
    fn new(ranked: &'a [SwissPlayer], history: &'a PairingHistory, allow_rematches: bool) -> Self {
        let adj = (0..ranked.len())
            .map(|a| {
                (0..ranked.len())
                    .filter(|&b| {
                        b != a
                            && (allow_rematches
                                || !history.have_met(ranked[a].player_id, ranked[b].player_id))
                    })
                    .collect()
            })
            .collect();
        Self {
            ranked,
            history,
            adj,
        }
    }

    /// Pairs every index in `pool`, which must be in rank order.
    fn pair(&self, pool: &[usize]) -> Option<Vec<(usize, usize)>> {
        let mut active = vec![false; self.ranked.len()];
        for &i in pool {
            active[i] = true;
        }
        let mut mate = self.perfect_matching(&active, vec![UNMATCHED; self.ranked.len()])?;

        let mut pairs = Vec::with_capacity(pool.len() / 2);
        for &top in pool {
            if !active[top] {
                continue;
            }
            active[top] = false;
            let (candidate, next) = self
                .candidate_order(top, &active)
                .into_iter()
                .find_map(|c| self.reserve(top, c, &active, &mate).map(|m| (c, m)))?;
            active[candidate] = false;
            mate = next;
            pairs.push((top, candidate));
        }
        Some(pairs)
    }

    /// Remaining opponents below `top`, nearest first; fresh opponents come
    /// before repeats.
    fn candidate_order(&self, top: usize, active: &[bool]) -> Vec<usize> {
        let top_id = self.ranked[top].player_id;
        let (fresh, repeats): (Vec<usize>, Vec<usize>) = self.adj[top]
            .iter()
            .copied()
            .filter(|&j| active[j])
            .partition(|&j| !self.history.have_met(top_id, self.ranked[j].player_id));
        fresh.into_iter().chain(repeats).collect()
    }

    /// Matching of the still-active players once `top` plays `candidate`,
    /// repaired from the current one.
    fn reserve(&self, top: usize, candidate: usize, active: &[bool], mate: &[usize]) -> Option<Vec<usize>> {
        if mate[top] == candidate {
            return Some(mate.to_vec());
        }
        let mut rest = active.to_vec();
        rest[candidate] = false;
        let mut seed = mate.to_vec();
        for v in [top, candidate] {
            let partner = seed[v];
            seed[v] = UNMATCHED;
            if partner != UNMATCHED {
                seed[partner] = UNMATCHED;
            }
        }
        self.perfect_matching(&rest, seed)
    }

    fn perfect_matching(&self, active: &[bool], seed: Vec<usize>) -> Option<Vec<usize>> {
        let mate = Blossom::new(&self.adj, active, seed).run();
        active
            .iter()
            .zip(&mate)
            .all(|(&on, &m)| !on || m != UNMATCHED)
            .then_some(mate)
    }
}

const UNMATCHED: usize = usize::MAX;

/// Maximum-cardinality matching on a general graph (Edmonds' blossom
/// algorithm). Only vertices flagged in `active` take part, and `mate` may
/// start from a partial matching that is then extended.
struct Blossom<'a> {
    adj: &'a [Vec<usize>],
    active: &'a [bool],
    mate: Vec<usize>,
    parent: Vec<usize>,
    base: Vec<usize>,
    used: Vec<bool>,
    in_blossom: Vec<bool>,
    queue: VecDeque<usize>,
}

impl<'a> Blossom<'a> {
    fn new(adj: &'a [Vec<usize>], active: &'a [bool], mate: Vec<usize>) -> Self {
        let n = adj.len();
        Self {
            adj,
            active,
            mate,
            parent: vec![UNMATCHED; n],
            base: (0..n).collect(),
            used: vec![false; n],
            in_blossom: vec![false; n],
            queue: VecDeque::with_capacity(n),
        }
    }

    fn run(mut self) -> Vec<usize> {
        for root in 0..self.adj.len() {
            if self.active[root] && self.mate[root] == UNMATCHED {
                if let Some(end) = self.find_path(root) {
                    self.augment(end);
                }
            }
        }
        self.mate
    }

    fn augment(&mut self, mut v: usize) {
        while v != UNMATCHED {
            let pv = self.parent[v];
            let next = self.mate[pv];
            self.mate[v] = pv;
            self.mate[pv] = v;
            v = next;
        }
    }

    /// Grows an alternating tree from `root`; returns the exposed vertex an
    /// augmenting path ends at.
    fn find_path(&mut self, root: usize) -> Option<usize> {
        let adj = self.adj;
        self.used.fill(false);
        self.parent.fill(UNMATCHED);
        for (i, b) in self.base.iter_mut().enumerate() {
            *b = i;
        }
        self.queue.clear();
        self.used[root] = true;
        self.queue.push_back(root);

        while let Some(v) = self.queue.pop_front() {
            for &to in &adj[v] {
                if !self.active[to] || self.base[v] == self.base[to] || self.mate[v] == to {
                    continue;
                }
                let odd_cycle = to == root
                    || (self.mate[to] != UNMATCHED && self.parent[self.mate[to]] != UNMATCHED);
                if odd_cycle {
                    let top = self.lowest_common_base(v, to);
                    self.in_blossom.fill(false);
                    self.mark_path(v, top, to);
                    self.mark_path(to, top, v);
                    for i in 0..adj.len() {
                        if self.in_blossom[self.base[i]] {
                            self.base[i] = top;
                            if !self.used[i] {
                                self.used[i] = true;
                                self.queue.push_back(i);
                            }
                        }
                    }
                } else if self.parent[to] == UNMATCHED {
                    self.parent[to] = v;
                    if self.mate[to] == UNMATCHED {
                        return Some(to);
                    }
                    let next = self.mate[to];
                    self.used[next] = true;
                    self.queue.push_back(next);
                }
            }
        }
        None
    }

    fn lowest_common_base(&self, mut a: usize, mut b: usize) -> usize {
        let mut seen = vec![false; self.adj.len()];
        loop {
            a = self.base[a];
            seen[a] = true;
            if self.mate[a] == UNMATCHED {
                break;
            }
            a = self.parent[self.mate[a]];
        }
        loop {
            b = self.base[b];
            if seen[b] {
                return b;
            }
            b = self.parent[self.mate[b]];
        }
    }

    fn mark_path(&mut self, mut v: usize, top: usize, mut child: usize) {
        while self.base[v] != top {
            let m = self.mate[v];
            self.in_blossom[self.base[v]] = true;
            self.in_blossom[self.base[m]] = true;
            self.parent[v] = child;
            child = m;
            v = self.parent[m];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players(n: i64) -> Vec<SwissPlayer> {
        (1..=n)
            .map(|id| SwissPlayer {
                player_id: id,
                points: 0,
                rating: 1600 - id as i32 * 10,
            })
            .collect()
    }

    fn games(pairings: &[Pairing]) -> Vec<(PlayerId, PlayerId)> {
        pairings
            .iter()
            .filter_map(|p| match p {
                Pairing::Game { first, second, .. } => Some((*first, *second)),
                Pairing::Bye { .. } => None,
            })
            .collect()
    }

    fn bye_of(pairings: &[Pairing]) -> Option<PlayerId> {
        pairings.iter().find_map(|p| match p {
            Pairing::Bye { player } => Some(*player),
            _ => None,
        })
    }

    fn record(history: &mut PairingHistory, pairings: &[Pairing]) {
        for p in pairings {
            match p {
                Pairing::Game { first, second, .. } => history.record_game(*first, *second),
                Pairing::Bye { player } => history.record_bye(*player),
            }
        }
    }

    #[test]
    fn test_first_round_pairs_neighbours_by_rating() {
        let pairings = generate_round(&players(4), &PairingHistory::default(), 1, &PairingOptions::default()).unwrap();
        assert_eq!(games(&pairings), vec![(1, 2), (3, 4)]);
    }

    #[test]
    fn test_points_rank_before_rating() {
        let mut ps = players(4);
        ps[3].points = 3;
        ps[2].points = 3;
        let pairings = generate_round(&ps, &PairingHistory::default(), 2, &PairingOptions::default()).unwrap();
        assert_eq!(games(&pairings), vec![(3, 4), (1, 2)]);
    }

    #[test]
    fn test_seven_players_three_games_and_a_bye() {
        let pairings = generate_round(&players(7), &PairingHistory::default(), 1, &PairingOptions::default()).unwrap();
        assert_eq!(games(&pairings).len(), 3);
        assert_eq!(bye_of(&pairings), Some(7));
        assert!(matches!(pairings.last(), Some(Pairing::Bye { .. })));
    }

    #[test]
    fn test_avoids_rematches_by_moving_outward() {
        let mut history = PairingHistory::default();
        history.record_game(1, 2);
        history.record_game(3, 4);
        let pairings = generate_round(&players(4), &history, 2, &PairingOptions::default()).unwrap();
        assert_eq!(games(&pairings), vec![(1, 3), (2, 4)]);
    }

    #[test]
    fn test_backtracks_when_greedy_dead_ends() {
        // Greedy 1-2 would leave 3-4 who already met
        let mut history = PairingHistory::default();
        history.record_game(3, 4);
        history.record_game(1, 3);
        let pairings = generate_round(&players(4), &history, 2, &PairingOptions::default()).unwrap();
        let g = games(&pairings);
        assert_eq!(g.len(), 2);
        for (a, b) in g {
            assert!(!history.have_met(a, b));
        }
    }

    #[test]
    fn test_impossible_round_is_reported() {
        let mut history = PairingHistory::default();
        for (a, b) in [(1, 2), (1, 3), (1, 4), (2, 3), (2, 4), (3, 4)] {
            history.record_game(a, b);
        }
        let err = generate_round(&players(4), &history, 4, &PairingOptions::default()).unwrap_err();
        assert!(matches!(err, EngineError::PairingImpossible(_)));
    }

    #[test]
    fn test_rematches_are_flagged_when_allowed() {
        let mut history = PairingHistory::default();
        for (a, b) in [(1, 2), (1, 3), (1, 4), (2, 3), (2, 4), (3, 4)] {
            history.record_game(a, b);
        }
        let options = PairingOptions {
            allow_rematches: true,
        };
        let pairings = generate_round(&players(4), &history, 4, &options).unwrap();
        assert_eq!(pairings.len(), 2);
        assert!(pairings
            .iter()
            .all(|p| matches!(p, Pairing::Game { rematch: true, .. })));
    }

    #[test]
    fn test_bye_rotates_through_everyone() {
        let ps = players(5);
        let mut history = PairingHistory::default();
        let mut byes = Vec::new();
        for round in 1..=4 {
            let pairings = generate_round(&ps, &history, round, &PairingOptions::default()).unwrap();
            byes.push(bye_of(&pairings).unwrap());
            record(&mut history, &pairings);
        }
        let unique: HashSet<_> = byes.iter().collect();
        assert_eq!(unique.len(), 4);
        for p in &ps {
            assert!(history.byes(p.player_id) <= 1);
        }
    }

    #[test]
    fn test_no_repeat_across_full_round_robin() {
        let ps = players(6);
        let mut history = PairingHistory::default();
        for round in 1..=5 {
            let pairings = generate_round(&ps, &history, round, &PairingOptions::default()).unwrap();
            for (a, b) in games(&pairings) {
                assert!(!history.have_met(a, b), "round {} repeated {}-{}", round, a, b);
            }
            record(&mut history, &pairings);
        }
    }

    #[test]
    fn test_history_ignores_cancelled_and_playoff_matches() {
        use crate::domain::{Schedule, SeasonKey};
        use chrono::NaiveDate;

        let key = SeasonKey::new(1, 1);
        let base = Match {
            id: 1,
            league_id: key.league_id,
            season_id: key.season_id,
            round_number: 1,
            stage: MatchStage::Regular,
            bracket_name: None,
            first_player_id: 1,
            second_player_id: Some(2),
            status: MatchStatus::Cancelled,
            schedule: Schedule::with_deadline(NaiveDate::from_ymd_opt(2026, 5, 1).unwrap()),
            result: None,
            elo_deltas: None,
            rematch: false,
            imported: false,
            completed_at: None,
        };
        let mut playoff = base.clone();
        playoff.stage = MatchStage::Playoff;
        playoff.status = MatchStatus::Scheduled;
        let mut bye = base.clone();
        bye.second_player_id = None;
        bye.status = MatchStatus::Completed;

        let history = PairingHistory::from_matches(&[base, playoff, bye]);
        assert!(!history.have_met(1, 2));
        assert_eq!(history.byes(1), 1);
    }

    #[test]
    fn test_rejects_tiny_or_duplicate_fields() {
        let err = generate_round(&players(1), &PairingHistory::default(), 1, &PairingOptions::default()).unwrap_err();
        assert!(matches!(err, EngineError::PairingImpossible(_)));

        let mut ps = players(3);
        ps[2].player_id = 1;
        let err = generate_round(&ps, &PairingHistory::default(), 1, &PairingOptions::default()).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_large_field_with_clustered_history_is_paired() {
        // The bottom eight have all met each other, so each must face a top player
        let mut history = PairingHistory::default();
        for a in 23..=30 {
            for b in (a + 1)..=30 {
                history.record_game(a, b);
            }
        }
        let ps = players(30);
        let pairings = generate_round(&ps, &history, 8, &PairingOptions::default()).unwrap();
        let g = games(&pairings);
        assert_eq!(g.len(), 15);
        for (a, b) in &g {
            assert!(!history.have_met(*a, *b), "{}-{} already met", a, b);
        }
        let seen: HashSet<PlayerId> = g.iter().flat_map(|&(a, b)| [a, b]).collect();
        assert_eq!(seen.len(), 30);
        // Nearest-rank order still holds at the top of the table
        assert_eq!(g[0], (1, 2));

        let relaxed = PairingOptions {
            allow_rematches: true,
        };
        let pairings = generate_round(&ps, &history, 8, &relaxed).unwrap();
        assert!(pairings
            .iter()
            .all(|p| matches!(p, Pairing::Game { rematch: false, .. })));
    }

    #[test]
    fn test_odd_clustered_field_moves_the_bye() {
        // 5, 6 and 7 have all met, so only one of them can sit out and the
        // other two must be drawn up against 1-4
        let mut history = PairingHistory::default();
        for (a, b) in [(5, 6), (5, 7), (6, 7)] {
            history.record_game(a, b);
        }
        let pairings = generate_round(&players(7), &history, 3, &PairingOptions::default()).unwrap();
        assert_eq!(bye_of(&pairings), Some(7));
        for (a, b) in games(&pairings) {
            assert!(!history.have_met(a, b));
        }
    }

    #[test]
    fn test_blossom_finds_matching_through_odd_cycle() {
        // Triangle 0-1-2 with a tail 2-3: the only perfect matching is 0-1, 2-3
        let adj = vec![vec![1, 2], vec![0, 2], vec![0, 1, 3], vec![2]];
        let active = vec![true; 4];
        let mate = Blossom::new(&adj, &active, vec![UNMATCHED; 4]).run();
        assert_eq!(mate, vec![1, 0, 3, 2]);
    }
}
