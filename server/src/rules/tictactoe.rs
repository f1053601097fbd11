//! Two-player tic-tac-toe.
//!
//! Roles alternate single-cell placements, `P1` playing `O` and moving
//! first. The match ends the moment a line is completed or the board
//! fills without one. An unplayable cell is rejected and the same player
//! moves again; totals only ever record the single decisive round.

use super::{GameRules, RoundVerdict, RuleViolation};
use shared::{Board, Cell, MatchWinner, Move, Role, Turn};
use std::collections::BTreeMap;

#[derive(Debug)]
pub struct TicTacToeRules {
    board: Board,
    outcome: Option<MatchWinner>,
}

impl TicTacToeRules {
    pub fn new() -> Self {
        TicTacToeRules {
            board: Board::new(),
            outcome: None,
        }
    }

    fn mark_for(role: Role) -> Option<Cell> {
        match role.seat() {
            1 => Some(Cell::O),
            2 => Some(Cell::X),
            _ => None,
        }
    }

    fn role_for(mark: Cell) -> Role {
        if mark == Cell::O {
            Role::new(1)
        } else {
            Role::new(2)
        }
    }
}

impl Default for TicTacToeRules {
    fn default() -> Self {
        TicTacToeRules::new()
    }
}

impl GameRules for TicTacToeRules {
    fn name(&self) -> &'static str {
        "tictactoe"
    }

    fn required_players(&self) -> u8 {
        2
    }

    fn turn(&self, round: u32) -> Turn {
        // P1 opens; turns alternate with the round counter.
        if round % 2 == 1 {
            Turn::Player(Role::new(1))
        } else {
            Turn::Player(Role::new(2))
        }
    }

    fn resolve_round(
        &mut self,
        moves: &BTreeMap<Role, Move>,
    ) -> Result<RoundVerdict, RuleViolation> {
        // Exactly one role acts per round.
        let (role, submitted) = match moves.iter().next() {
            Some((role, submitted)) => (*role, submitted),
            None => return Ok(RoundVerdict::Undecided),
        };

        let index = match submitted {
            Move::Cell(index) => *index as usize,
            Move::Card(_) => return Err(RuleViolation::WrongShape { role }),
        };

        let mark = match Self::mark_for(role) {
            Some(mark) => mark,
            None => {
                return Err(RuleViolation::Illegal {
                    role,
                    reason: "role has no mark in this game".to_string(),
                });
            }
        };

        if !self.board.place(index, mark) {
            return Err(RuleViolation::Illegal {
                role,
                reason: format!("cell {} is not playable", index),
            });
        }

        if let Some(winning_mark) = self.board.winner() {
            let winner = Self::role_for(winning_mark);
            self.outcome = Some(MatchWinner::Player(winner));
            return Ok(RoundVerdict::Winner(winner));
        }
        if self.board.is_full() {
            self.outcome = Some(MatchWinner::Draw);
            return Ok(RoundVerdict::Draw);
        }
        Ok(RoundVerdict::Undecided)
    }

    fn resolve_match(
        &self,
        _totals: &BTreeMap<Role, u32>,
        _rounds_played: u32,
    ) -> Option<MatchWinner> {
        self.outcome
    }

    fn public_state(&self) -> Option<Board> {
        Some(self.board.clone())
    }
}
