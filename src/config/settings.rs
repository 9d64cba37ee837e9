use crate::rating::{EloParams, TierThresholds};
use crate::standings::PointsTable;

#[derive(Debug, Clone)]
pub struct LeagueSettings {
    pub initial_rating: i32,
    pub k_factor: f64,
    pub rating_floor: i32,
    pub win_points: i32,
    pub loss_points: i32,
    pub bye_points: i32,
    pub postponement_credits: u32,
    pub postponement_days: i64,
    pub round_length_days: i64,
    /// When false, a round whose only open matches are postponed counts as closed
    pub postponed_blocks_round_close: bool,
    pub playoff_qualifiers: usize,
    pub gold_threshold: i32,
    pub silver_threshold: i32,
}

impl Default for LeagueSettings {
    fn default() -> Self {
        Self {
            initial_rating: 1200,
            k_factor: 32.0,
            rating_floor: 100,
            win_points: 3,
            loss_points: 0,
            bye_points: 3,
            postponement_credits: 3,
            postponement_days: 7,
            round_length_days: 14,
            postponed_blocks_round_close: true,
            playoff_qualifiers: 8,
            gold_threshold: 1400,
            silver_threshold: 1200,
        }
    }
}

impl LeagueSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            initial_rating: env_or("LEAGUE_INITIAL_RATING", defaults.initial_rating),
            k_factor: env_or("LEAGUE_K_FACTOR", defaults.k_factor),
            win_points: env_or("LEAGUE_WIN_POINTS", defaults.win_points),
            loss_points: env_or("LEAGUE_LOSS_POINTS", defaults.loss_points),
            bye_points: env_or("LEAGUE_BYE_POINTS", defaults.bye_points),
            postponement_credits: env_or("LEAGUE_POSTPONEMENTS", defaults.postponement_credits),
            postponement_days: env_or("LEAGUE_POSTPONEMENT_DAYS", defaults.postponement_days),
            round_length_days: env_or("LEAGUE_ROUND_DAYS", defaults.round_length_days),
            playoff_qualifiers: env_or("LEAGUE_PLAYOFF_QUALIFIERS", defaults.playoff_qualifiers),
            ..defaults
        }
    }

    /// ELO parameters for a season; `k_factor` comes from the season record.
    pub fn elo_params(&self, k_factor: f64) -> EloParams {
        EloParams {
            k_factor,
            rating_floor: self.rating_floor,
        }
    }

    pub fn tiers(&self) -> TierThresholds {
        TierThresholds {
            gold: self.gold_threshold,
            silver: self.silver_threshold,
        }
    }

    pub fn points(&self) -> PointsTable {
        PointsTable {
            win: self.win_points,
            loss: self.loss_points,
            bye: self.bye_points,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub database_path: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            database_path: "tennis_league.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub league: LeagueSettings,
    pub server: ServerSettings,
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with environment variables.
    pub fn from_env() -> Self {
        let database_path = std::env::var("DATABASE_PATH")
            .unwrap_or_else(|_| ServerSettings::default().database_path);

        Self {
            league: LeagueSettings::from_env(),
            server: ServerSettings { database_path },
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!("Ignoring invalid value '{}' for {}", raw, key);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = LeagueSettings::default();
        assert_eq!(settings.initial_rating, 1200);
        assert_eq!(settings.postponement_credits, 3);
        assert_eq!(settings.postponement_days, 7);
        assert_eq!(settings.bye_points, 3);
        assert_eq!(settings.playoff_qualifiers, 8);
    }

    #[test]
    fn test_season_k_factor_flows_into_params() {
        let settings = LeagueSettings::default();
        let params = settings.elo_params(24.0);
        assert_eq!(params.k_factor, 24.0);
        assert_eq!(params.rating_floor, 100);
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        assert_eq!(env_or("TENNIS_LEAGUE_TEST_UNSET_KEY", 5_u32), 5);
    }
}
