pub mod api;
pub mod cli;
pub mod config;
pub mod database;
pub mod domain;
pub mod errors;
pub mod pairing;
pub mod playoffs;
pub mod rating;
pub mod services;
pub mod standings;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use log::info;
use serde::Serialize;
use std::fs::File;
use std::path::Path;

use crate::cli::Command;
use crate::config::settings::AppConfig;
use crate::domain::SeasonKey;
use crate::playoffs::SplitPolicy;
use crate::services::server::ServerService;
use crate::services::{BuildBracket, GenerateRound, LeagueEngine};

pub fn interpret() -> Command {
    let cli = Cli::parse();
    cli.command
}

fn open_engine(config: &AppConfig) -> Result<LeagueEngine> {
    let pool = database::create_pool(&config.server.database_path)?;
    {
        let conn = database::get_connection(&pool)?;
        database::initialize_database(&conn)?;
    }
    Ok(LeagueEngine::new(pool, config.league.clone()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn handle_serve(port: u16) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let config = AppConfig::from_env();
        let service = ServerService::new(port, config);
        service.run().await
    })
}

pub fn handle_init_db() -> Result<()> {
    let config = AppConfig::from_env();
    open_engine(&config)?;
    info!("Database ready at {}", config.server.database_path);
    Ok(())
}

pub fn handle_generate_round(key: SeasonKey, allow_rematches: bool) -> Result<()> {
    let engine = open_engine(&AppConfig::from_env())?;
    let plan = engine.generate_round(
        key,
        GenerateRound {
            allow_rematches,
            ..Default::default()
        },
    )?;
    print_json(&plan)
}

pub fn handle_standings(key: SeasonKey) -> Result<()> {
    let engine = open_engine(&AppConfig::from_env())?;
    print_json(&engine.get_standings(key)?)
}

pub fn handle_build_bracket(key: SeasonKey, qualifiers: Option<usize>, policy: &str) -> Result<()> {
    let policy: SplitPolicy = policy.parse()?;
    let engine = open_engine(&AppConfig::from_env())?;
    let brackets = engine.build_playoff_bracket(
        key,
        BuildBracket {
            qualifier_count: qualifiers,
            policy,
            expected_version: None,
        },
    )?;
    print_json(&brackets)
}

pub fn handle_import(key: SeasonKey, file: &Path) -> Result<()> {
    let reader = File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
    let engine = open_engine(&AppConfig::from_env())?;
    let report = engine.import_matches(key, reader)?;
    info!(
        "Imported {}: {} created, {} updated, {} rejected",
        file.display(),
        report.created,
        report.updated,
        report.errors.len()
    );
    print_json(&report)
}
