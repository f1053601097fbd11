use clap::Parser;
use log::{error, info};
use server::engine::{MatchConfig, RoundEngine};
use server::rules;
use server::session::{accept_players, HandshakePolicy};
use std::time::Duration;
use tokio::net::TcpListener;

/// Hosts exactly one match, then exits.
/// Parses command-line arguments, accepts the required players and runs
/// the round engine to completion.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Address to bind the match listener on
        #[clap(short = 'H', long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[clap(short, long, default_value = "9000")]
        port: u16,
        /// Game to host (card3p, tictactoe)
        #[clap(short, long, default_value = "card3p")]
        game: String,
        /// Expected player count; must match the game's requirement
        #[clap(long)]
        players: Option<u8>,
        /// Abort the match if a round's moves take longer than this many seconds
        #[clap(long)]
        move_timeout_secs: Option<u64>,
        /// Keep a seat open after an invalid or duplicate role claim
        /// instead of aborting the match
        #[clap(long)]
        lenient_handshake: bool,
    }

    env_logger::init();
    let args = Args::parse();

    let game_rules = rules::create(&args.game)?;
    let required = game_rules.required_players();
    if let Some(players) = args.players {
        if players != required {
            return Err(format!(
                "{} is a {}-player game, got --players {}",
                game_rules.name(),
                required,
                players
            )
            .into());
        }
    }

    let address = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&address).await?;
    info!(
        "Hosting {} for {} players on {}",
        game_rules.name(),
        required,
        address
    );

    let policy = if args.lenient_handshake {
        HandshakePolicy::Retry
    } else {
        HandshakePolicy::Abort
    };
    let channels = accept_players(&listener, required, policy).await?;

    let config = MatchConfig {
        move_timeout: args.move_timeout_secs.map(Duration::from_secs),
    };
    let mut engine = RoundEngine::new(channels, game_rules, config);

    match engine.run().await {
        Ok(winner) => {
            info!("Match complete, winner: {}", winner);
            Ok(())
        }
        Err(err) => {
            error!("Match aborted: {}", err);
            Err(err.into())
        }
    }
}
