use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Tennis league engine: Swiss rounds, ELO and playoffs")]
pub struct Cli {
    /// Command
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    /// Start the league server
    Serve {
        /// Port number (optional, defaults to 3000)
        #[arg(short, long, default_value_t = 3000)]
        port: u16,
    },
    /// Create the database schema if it does not exist
    InitDb,
    /// Pair the next round of a season
    GenerateRound {
        #[arg(long)]
        league: i64,
        #[arg(long)]
        season: i64,
        /// Fall back to rematches when no fresh pairing exists
        #[arg(long)]
        allow_rematches: bool,
    },
    /// Print the current standings of a season
    Standings {
        #[arg(long)]
        league: i64,
        #[arg(long)]
        season: i64,
    },
    /// Seed the playoff brackets from the final standings
    BuildBracket {
        #[arg(long)]
        league: i64,
        #[arg(long)]
        season: i64,
        /// Number of qualifiers (defaults to the league setting)
        #[arg(short, long)]
        qualifiers: Option<usize>,
        /// single, tier, consecutive[:N] or snake[:N]
        #[arg(long, default_value = "single")]
        policy: String,
    },
    /// Import match results from a CSV file
    Import {
        #[arg(long)]
        league: i64,
        #[arg(long)]
        season: i64,
        file: PathBuf,
    },
}
