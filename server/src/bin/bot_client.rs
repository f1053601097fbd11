use clap::Parser;
use rand::{thread_rng, Rng};
use shared::{CardMove, Cell, Mode, Move, Role, RoundUpdate, ServerUpdate, Turn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Headless scripted player for smoke-testing a live game server: joins
/// as the given role and plays legal moves until the match ends.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server host
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port
    #[clap(short, long, default_value = "9000")]
    port: u16,
    /// Role to claim (P1, P2, ...)
    #[clap(short, long)]
    role: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let role: Role = args.role.parse()?;

    let stream = TcpStream::connect(format!("{}:{}", args.host, args.port)).await?;
    println!("Connected as {} to {}:{}", role, args.host, args.port);

    let (read_half, mut writer) = stream.into_split();
    writer.write_all(format!("{}\n", role).as_bytes()).await?;

    let mut lines = BufReader::new(read_half).lines();
    let mut hand: Vec<u8> = Vec::new();

    while let Some(line) = lines.next_line().await? {
        let update: ServerUpdate = serde_json::from_str(&line)?;
        match update {
            ServerUpdate::Start(start) => {
                hand = start.hand;
                println!("Deal received, hand: {:?}", hand);
            }
            ServerUpdate::Round(round) => {
                let my_turn =
                    round.turn == Turn::All || round.turn == Turn::Player(role);
                println!(
                    "Round {}, totals {:?}, turn {}",
                    round.round, round.total_wins, round.turn
                );
                if !my_turn {
                    continue;
                }
                let chosen = pick_move(&mut hand, &round);
                match chosen {
                    Some(submitted) => {
                        println!("Playing {:?}", submitted);
                        let mut payload = serde_json::to_string(&submitted)?;
                        payload.push('\n');
                        writer.write_all(payload.as_bytes()).await?;
                    }
                    None => {
                        println!("No legal move available, idling");
                    }
                }
            }
            ServerUpdate::End(end) => {
                println!("Match over, winner: {}, totals {:?}", end.winner, end.total_wins);
                break;
            }
        }
    }

    println!("Bot finished");
    Ok(())
}

/// Picks a legal move: a random card from the remaining hand, or the
/// first free cell of the broadcast board.
fn pick_move(hand: &mut Vec<u8>, round: &RoundUpdate) -> Option<Move> {
    if !hand.is_empty() {
        let mut rng = thread_rng();
        let card = hand.remove(rng.gen_range(0..hand.len()));
        let mode = if rng.gen_bool(0.5) { Mode::Max } else { Mode::Min };
        return Some(Move::Card(CardMove { card, mode }));
    }

    let board = round.board.as_ref()?;
    let free = board
        .cells()
        .iter()
        .position(|&cell| cell == Cell::Empty)?;
    Some(Move::Cell(free as u8))
}
