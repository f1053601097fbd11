use clap::Parser;
use client::game::{describe_round, format_board, parse_move};
use client::network::GameClient;
use shared::{MatchWinner, Move, Role, ServerUpdate, Turn};
use std::io;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// Terminal player client: joins a hosted match as the given role,
/// renders server broadcasts as text and reads moves from stdin.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Game server host
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Game server port
        #[clap(short, long, default_value = "9000")]
        port: u16,
        /// Role to claim (P1, P2, ...)
        #[clap(short, long)]
        role: String,
    }

    env_logger::init();
    let args = Args::parse();
    let role: Role = args.role.parse()?;

    let address = format!("{}:{}", args.host, args.port);
    let mut client = GameClient::connect(&address, role).await?;
    println!("Joined {} as {}", address, role);

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut hand: Vec<u8> = Vec::new();

    loop {
        let update = match client.next_update().await? {
            Some(update) => update,
            None => {
                println!("Server closed the connection");
                break;
            }
        };

        match update {
            ServerUpdate::Start(start) => {
                hand = start.hand;
                if hand.is_empty() {
                    println!("Match starting, you are {}", start.role);
                } else {
                    println!("Match starting, you are {} with hand {:?}", start.role, hand);
                }
            }
            ServerUpdate::Round(round) => {
                print!("{}", describe_round(&round, &hand));
                let mine = round.turn == Turn::All || round.turn == Turn::Player(role);
                if !mine {
                    println!("Waiting for {}...", round.turn);
                    continue;
                }

                let board_game = round.board.is_some();
                let submitted = prompt_move(&mut stdin, &hand, board_game).await?;
                if let Move::Card(play) = &submitted {
                    // The card leaves the hand as soon as it is played.
                    if let Some(position) = hand.iter().position(|card| card == &play.card) {
                        hand.remove(position);
                    }
                }
                client.submit(&submitted).await?;
                println!("Move sent, waiting for the round to resolve...");
            }
            ServerUpdate::End(end) => {
                if let Some(board) = &end.board {
                    print!("{}", format_board(board));
                }
                match end.winner {
                    MatchWinner::Draw => println!("Match over: draw"),
                    MatchWinner::Player(winner) if winner == role => {
                        println!("Match over: you win!")
                    }
                    MatchWinner::Player(winner) => println!("Match over: {} wins", winner),
                }
                let totals: Vec<String> = end
                    .total_wins
                    .iter()
                    .map(|(who, wins)| format!("{}:{}", who, wins))
                    .collect();
                println!("Final totals: {}", totals.join(" "));
                break;
            }
        }
    }

    Ok(())
}

/// Prompts until the player types a move the local checks accept. The
/// server still has the final say; a rejected move just comes back as
/// another round broadcast.
async fn prompt_move(
    stdin: &mut Lines<BufReader<Stdin>>,
    hand: &[u8],
    board_game: bool,
) -> io::Result<Move> {
    loop {
        if board_game {
            println!("Your move, pick a free cell (0-8):");
        } else {
            println!("Play a card and a mode, e.g. \"10 MAX\":");
        }

        let line = match stdin.next_line().await? {
            Some(line) => line,
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stdin closed before a move was entered",
                ));
            }
        };

        match parse_move(line.trim(), hand, board_game) {
            Ok(submitted) => return Ok(submitted),
            Err(reason) => println!("{}", reason),
        }
    }
}
