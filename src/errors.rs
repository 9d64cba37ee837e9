use serde::Serialize;
use thiserror::Error;

use crate::domain::{LeagueId, SeasonId};

/// Engine errors surfaced to admins and API clients.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad input shape: missing CSV column, invalid score, unknown enum value
    #[error("{0}")]
    Validation(String),

    /// The Swiss engine could not build a legal round
    #[error("Pairing impossible: {0}")]
    PairingImpossible(String),

    /// Operation not allowed in the current state of a match, round or season
    #[error("{0}")]
    StateConflict(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Optimistic concurrency token mismatch on the season document
    #[error("Season {league_id}/{season_id} was modified concurrently, retry the operation")]
    Conflict {
        league_id: LeagueId,
        season_id: SeasonId,
    },

    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

/// Closed classification used by callers to choose a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    PairingImpossible,
    StateConflict,
    NotFound,
    Conflict,
    Internal,
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::StateConflict(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::PairingImpossible(_) => ErrorKind::PairingImpossible,
            EngineError::StateConflict(_) => ErrorKind::StateConflict,
            EngineError::NotFound { .. } => ErrorKind::NotFound,
            EngineError::Conflict { .. } => ErrorKind::Conflict,
            EngineError::Storage(_) => ErrorKind::Internal,
        }
    }

    /// Human-readable reason that is safe to show to a client.
    ///
    /// Storage errors are reduced to a generic message so SQL details never
    /// leave the engine.
    pub fn client_message(&self) -> String {
        match self {
            EngineError::Storage(_) => "Internal storage error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        EngineError::Storage(err.into())
    }
}

impl From<r2d2::Error> for EngineError {
    fn from(err: r2d2::Error) -> Self {
        EngineError::Storage(anyhow::Error::new(err).context("Failed to get database connection from pool"))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Context string for a CSV import row (1-based, header excluded).
pub fn row_context(row: usize) -> String {
    format!("row {}", row)
}
