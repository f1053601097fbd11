//! The local, text-mode view of a match: parsing the player's typed moves
//! and rendering server broadcasts for the terminal.

use shared::{Board, CardMove, MatchWinner, Mode, Move, RoundUpdate};
use std::fmt::Write as _;

/// Parses a typed move. Board games take a bare cell index; the card game
/// takes `"<card> [MAX|MIN]"` with MAX as the default, and the card must
/// still be in `hand`. Errors are messages fit to show the player.
pub fn parse_move(input: &str, hand: &[u8], board_game: bool) -> Result<Move, String> {
    if board_game {
        return input
            .parse::<u8>()
            .ok()
            .filter(|index| *index <= 8)
            .map(Move::Cell)
            .ok_or_else(|| "enter a cell index between 0 and 8".to_string());
    }

    let mut parts = input.split_whitespace();
    let card = parts
        .next()
        .and_then(|word| word.parse::<u8>().ok())
        .ok_or_else(|| "enter a card value from your hand".to_string())?;
    if !hand.contains(&card) {
        return Err(format!("card {} is not in your hand", card));
    }
    let mode = match parts.next() {
        None => Mode::Max,
        Some(word) if word.eq_ignore_ascii_case("MAX") => Mode::Max,
        Some(word) if word.eq_ignore_ascii_case("MIN") => Mode::Min,
        Some(other) => return Err(format!("unknown mode {:?}, use MAX or MIN", other)),
    };
    Ok(Move::Card(CardMove { card, mode }))
}

/// Renders the board as a three-row grid.
pub fn format_board(board: &Board) -> String {
    let cells = board.cells();
    let mut out = String::new();
    for row in 0..3 {
        let _ = writeln!(
            out,
            " {} | {} | {}",
            cells[row * 3],
            cells[row * 3 + 1],
            cells[row * 3 + 2]
        );
        if row < 2 {
            out.push_str("---+---+---\n");
        }
    }
    out
}

/// Renders one round broadcast: round header, last round's outcome,
/// running totals, the board for board games and the hand for card games.
pub fn describe_round(round: &RoundUpdate, hand: &[u8]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "--- Round {} ---", round.round);

    if let Some(result) = &round.round_result {
        match result.winner {
            MatchWinner::Player(role) => {
                let _ = writeln!(out, "Last round went to {}", role);
            }
            MatchWinner::Draw => {
                let _ = writeln!(out, "Last round was drawn");
            }
        }
    }

    let totals: Vec<String> = round
        .total_wins
        .iter()
        .map(|(role, wins)| format!("{}:{}", role, wins))
        .collect();
    let _ = writeln!(out, "Total wins: {}", totals.join(" "));

    if let Some(board) = &round.board {
        out.push_str(&format_board(board));
    }
    if !hand.is_empty() {
        let _ = writeln!(out, "Your hand: {:?}", hand);
    }
    out
}
