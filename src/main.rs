use anyhow::Result;

use tennis_league::cli::Command;
use tennis_league::domain::SeasonKey;
use tennis_league::{
    handle_build_bracket, handle_generate_round, handle_import, handle_init_db, handle_serve,
    handle_standings, interpret,
};

fn main() {
    setup_logging();
    parse_and_execute().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
}

fn setup_logging() {
    sensible_env_logger::init!();
}

fn parse_and_execute() -> Result<()> {
    let command = interpret();
    execute_command(&command)
}

fn execute_command(command: &Command) -> Result<()> {
    match command {
        Command::Serve { port } => handle_serve(*port),
        Command::InitDb => handle_init_db(),
        Command::GenerateRound {
            league,
            season,
            allow_rematches,
        } => handle_generate_round(SeasonKey::new(*league, *season), *allow_rematches),
        Command::Standings { league, season } => handle_standings(SeasonKey::new(*league, *season)),
        Command::BuildBracket {
            league,
            season,
            qualifiers,
            policy,
        } => handle_build_bracket(SeasonKey::new(*league, *season), *qualifiers, policy),
        Command::Import {
            league,
            season,
            file,
        } => handle_import(SeasonKey::new(*league, *season), file),
    }
}
