//! Pluggable rule strategies.
//!
//! Every game variant supplies one [`GameRules`] implementation and the
//! engine stays identical: the trait is the seam between "how a match is
//! coordinated" and "who wins". Resolution must be deterministic for a
//! given move set, independent of arrival order; the engine hands moves
//! over keyed by role, already normalized.

pub mod card;
pub mod tictactoe;

use shared::{Board, MatchWinner, Move, Role, Turn};
use std::collections::BTreeMap;
use std::fmt;

/// Outcome of resolving one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundVerdict {
    /// This role won the round; its total is incremented.
    Winner(Role),
    /// The round (and for some games the match) ended level.
    Draw,
    /// Nothing to score yet; play continues.
    Undecided,
}

/// A move that decoded fine but the game cannot accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleViolation {
    /// The move is of a shape this game never accepts. Fatal: the client
    /// is not speaking this game's protocol.
    WrongShape { role: Role },
    /// Legal shape, illegal play (occupied square, index out of range).
    /// The round is replayed without penalty.
    Illegal { role: Role, reason: String },
}

impl fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleViolation::WrongShape { role } => {
                write!(f, "{} sent a move this game does not accept", role)
            }
            RuleViolation::Illegal { role, reason } => {
                write!(f, "illegal move from {}: {}", role, reason)
            }
        }
    }
}

impl std::error::Error for RuleViolation {}

/// The capability interface one game variant implements.
pub trait GameRules: Send + fmt::Debug {
    /// Short name used in logs and on the command line.
    fn name(&self) -> &'static str;

    fn required_players(&self) -> u8;

    /// Private state dealt to each role when the match starts. Games
    /// without private state return an empty map.
    fn initial_deal(&mut self, _roles: &[Role]) -> BTreeMap<Role, Vec<u8>> {
        BTreeMap::new()
    }

    /// Who acts in the given round (1-based).
    fn turn(&self, round: u32) -> Turn;

    /// Resolves a complete move set for one round. Must be deterministic
    /// for a given `moves` map.
    fn resolve_round(
        &mut self,
        moves: &BTreeMap<Role, Move>,
    ) -> Result<RoundVerdict, RuleViolation>;

    /// Checks for a match decision after a round has been resolved.
    /// `None` means the match continues.
    fn resolve_match(&self, totals: &BTreeMap<Role, u32>, rounds_played: u32)
        -> Option<MatchWinner>;

    /// Game-specific public state included in every broadcast.
    fn public_state(&self) -> Option<Board> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownGame(pub String);

impl fmt::Display for UnknownGame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown game {:?} (available: card3p, tictactoe)", self.0)
    }
}

impl std::error::Error for UnknownGame {}

/// Creates the rule strategy registered under `name`.
pub fn create(name: &str) -> Result<Box<dyn GameRules>, UnknownGame> {
    match name {
        "card3p" | "card" => Ok(Box::new(card::CardRules::new())),
        "tictactoe" | "ttt" => Ok(Box::new(tictactoe::TicTacToeRules::new())),
        other => Err(UnknownGame(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_knows_both_games() {
        assert_eq!(create("card3p").unwrap().name(), "card3p");
        assert_eq!(create("card").unwrap().name(), "card3p");
        assert_eq!(create("tictactoe").unwrap().name(), "tictactoe");
        assert_eq!(create("ttt").unwrap().name(), "tictactoe");
    }

    #[test]
    fn test_registry_rejects_unknown_names() {
        let err = create("chess").unwrap_err();
        assert_eq!(err, UnknownGame("chess".to_string()));
    }

    #[test]
    fn test_player_counts() {
        assert_eq!(create("card3p").unwrap().required_players(), 3);
        assert_eq!(create("tictactoe").unwrap().required_players(), 2);
    }
}
