//! Standings derived on demand from match history.
//!
//! Nothing here is persisted: every call recomputes from completed
//! regular-season matches, so partial seasons simply reflect what has been
//! played so far.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::{Match, MatchStage, MatchStatus, PlayerId, Registration, SkillTier, sets_won};

/// League points per result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsTable {
    pub win: i32,
    pub loss: i32,
    pub bye: i32,
}

impl Default for PointsTable {
    fn default() -> Self {
        Self {
            win: 3,
            loss: 0,
            bye: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandingsEntry {
    pub rank: usize,
    pub player_id: PlayerId,
    pub points: i32,
    pub matches_played: u32,
    pub matches_won: u32,
    pub matches_lost: u32,
    pub sets_won: u32,
    pub sets_lost: u32,
    pub set_differential: i64,
    pub byes: u32,
    pub rating: i32,
    pub tier: SkillTier,
}

impl StandingsEntry {
    fn blank(reg: &Registration) -> Self {
        Self {
            rank: 0,
            player_id: reg.player_id,
            points: 0,
            matches_played: 0,
            matches_won: 0,
            matches_lost: 0,
            sets_won: 0,
            sets_lost: 0,
            set_differential: 0,
            byes: 0,
            rating: reg.rating,
            tier: reg.tier,
        }
    }
}

/// Ranks `players` by points, then head-to-head among the tied group, then
/// set differential, then ELO rating.
pub fn compute_standings(
    matches: &[Match],
    players: &[Registration],
    points: &PointsTable,
) -> Vec<StandingsEntry> {
    let mut table: HashMap<PlayerId, StandingsEntry> = players
        .iter()
        .map(|reg| (reg.player_id, StandingsEntry::blank(reg)))
        .collect();

    let counted: Vec<&Match> = matches
        .iter()
        .filter(|m| m.stage == MatchStage::Regular && m.status == MatchStatus::Completed)
        .collect();

    for m in &counted {
        accumulate(&mut table, m, points);
    }

    let h2h = head_to_head_wins(&counted);
    let mut entries: Vec<StandingsEntry> = table.into_values().collect();
    entries.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then(b.rating.cmp(&a.rating))
            .then(a.player_id.cmp(&b.player_id))
    });

    let mut ranked = Vec::with_capacity(entries.len());
    for mut group in group_by_points(entries) {
        if group.len() > 1 {
            order_tied_group(&mut group, &h2h);
        }
        ranked.extend(group);
    }

    for (idx, entry) in ranked.iter_mut().enumerate() {
        entry.rank = idx + 1;
    }
    ranked
}

fn accumulate(table: &mut HashMap<PlayerId, StandingsEntry>, m: &Match, points: &PointsTable) {
    let Some(result) = &m.result else {
        return;
    };

    let Some(second_id) = m.second_player_id else {
        if let Some(entry) = table.get_mut(&m.first_player_id) {
            entry.byes += 1;
            entry.points += points.bye;
        }
        return;
    };

    let (first_sets, second_sets) = sets_won(&result.sets);
    let sides = [
        (m.first_player_id, first_sets, second_sets),
        (second_id, second_sets, first_sets),
    ];
    for (player_id, won, lost) in sides {
        let Some(entry) = table.get_mut(&player_id) else {
            continue;
        };
        entry.matches_played += 1;
        entry.sets_won += won;
        entry.sets_lost += lost;
        entry.set_differential = entry.sets_won as i64 - entry.sets_lost as i64;
        if result.winner_id == player_id {
            entry.matches_won += 1;
            entry.points += points.win;
        } else {
            entry.matches_lost += 1;
            entry.points += points.loss;
        }
    }
}

/// (winner, loser) -> number of wins
fn head_to_head_wins(matches: &[&Match]) -> HashMap<(PlayerId, PlayerId), u32> {
    let mut wins = HashMap::new();
    for m in matches {
        let (Some(second_id), Some(result)) = (m.second_player_id, &m.result) else {
            continue;
        };
        let loser = if result.winner_id == m.first_player_id {
            second_id
        } else {
            m.first_player_id
        };
        *wins.entry((result.winner_id, loser)).or_insert(0) += 1;
    }
    wins
}

fn group_by_points(entries: Vec<StandingsEntry>) -> Vec<Vec<StandingsEntry>> {
    let mut groups: Vec<Vec<StandingsEntry>> = Vec::new();
    for entry in entries {
        match groups.last_mut() {
            Some(group) if group[0].points == entry.points => group.push(entry),
            _ => groups.push(vec![entry]),
        }
    }
    groups
}

/// Head-to-head is scored as a mini-table over matches between members of
/// the tied group only, which keeps the ordering total for three-way ties.
fn order_tied_group(group: &mut [StandingsEntry], h2h: &HashMap<(PlayerId, PlayerId), u32>) {
    let members: Vec<PlayerId> = group.iter().map(|e| e.player_id).collect();
    let mini_wins: HashMap<PlayerId, u32> = members
        .iter()
        .map(|&p| {
            let won = members
                .iter()
                .filter(|&&q| q != p)
                .map(|&q| h2h.get(&(p, q)).copied().unwrap_or(0))
                .sum();
            (p, won)
        })
        .collect();

    group.sort_by(|a, b| {
        mini_wins[&b.player_id]
            .cmp(&mini_wins[&a.player_id])
            .then(b.set_differential.cmp(&a.set_differential))
            .then(b.rating.cmp(&a.rating))
            .then(a.player_id.cmp(&b.player_id))
    });
}
