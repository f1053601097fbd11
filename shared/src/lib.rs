//! Wire protocol shared between the game server, clients and the lobby
//! tooling: player roles, move payloads, the newline-delimited JSON update
//! messages, and the length-prefixed framing layer in [`framing`].

pub mod framing;

use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::ser::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Upper bound on a framed control message payload. Length headers above
/// this are treated as protocol violations, not allocation requests.
pub const MAX_MESSAGE_LEN: u32 = 65536;

/// Files are streamed in chunks of this size rather than buffered whole.
pub const FILE_CHUNK_SIZE: usize = 4096;

/// The `status` value sent with the initial deal.
pub const START_STATUS: &str = "START";

/// A per-match player identity, `P1..PN`. Roles are bound to exactly one
/// connection for the lifetime of a match. The derived ordering (`P1` first)
/// is the canonical role order used for deterministic tie-breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Role(u8);

impl Role {
    /// Creates the role for a 1-based seat number.
    ///
    /// Panics if `seat` is zero; roles are always `P1` or higher.
    pub fn new(seat: u8) -> Self {
        assert!(seat >= 1, "roles are numbered from P1");
        Role(seat)
    }

    pub fn seat(self) -> u8 {
        self.0
    }

    /// The first `count` roles in canonical order, `P1..=Pcount`.
    pub fn first(count: u8) -> Vec<Role> {
        (1..=count).map(Role).collect()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidRole(pub String);

impl fmt::Display for InvalidRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid role {:?}", self.0)
    }
}

impl std::error::Error for InvalidRole {}

impl FromStr for Role {
    type Err = InvalidRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let seat = s
            .strip_prefix('P')
            .and_then(|digits| digits.parse::<u8>().ok())
            .filter(|&seat| seat >= 1)
            .ok_or_else(|| InvalidRole(s.to_string()))?;
        Ok(Role(seat))
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RoleVisitor;

        impl<'de> Visitor<'de> for RoleVisitor {
            type Value = Role;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a role string like \"P1\"")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Role, E> {
                value.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(RoleVisitor)
    }
}

/// Whose move the server is waiting on, as carried in the `turn` field:
/// `"ALL"` for simultaneous rounds, a role string for alternating games,
/// `"END"` on the terminal message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    All,
    End,
    Player(Role),
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Turn::All => f.write_str("ALL"),
            Turn::End => f.write_str("END"),
            Turn::Player(role) => write!(f, "{}", role),
        }
    }
}

impl FromStr for Turn {
    type Err = InvalidRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALL" => Ok(Turn::All),
            "END" => Ok(Turn::End),
            _ => s.parse().map(Turn::Player),
        }
    }
}

impl Serialize for Turn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Turn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TurnVisitor;

        impl<'de> Visitor<'de> for TurnVisitor {
            type Value = Turn;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("\"ALL\", \"END\" or a role string")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Turn, E> {
                value.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(TurnVisitor)
    }
}

/// Final outcome of a match (or of a single round in `RoundResult`):
/// a winning role or `"Draw"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchWinner {
    Player(Role),
    Draw,
}

impl fmt::Display for MatchWinner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchWinner::Player(role) => write!(f, "{}", role),
            MatchWinner::Draw => f.write_str("Draw"),
        }
    }
}

impl FromStr for MatchWinner {
    type Err = InvalidRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Draw" => Ok(MatchWinner::Draw),
            _ => s.parse().map(MatchWinner::Player),
        }
    }
}

impl Serialize for MatchWinner {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MatchWinner {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct WinnerVisitor;

        impl<'de> Visitor<'de> for WinnerVisitor {
            type Value = MatchWinner;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a role string or \"Draw\"")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<MatchWinner, E> {
                value.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(WinnerVisitor)
    }
}

/// Card-game comparison mode voted alongside each card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Mode {
    #[serde(rename = "MAX")]
    Max,
    #[serde(rename = "MIN")]
    Min,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CardMove {
    pub card: u8,
    pub mode: Mode,
}

/// A decoded move submission. Each game accepts exactly one variant; the
/// shapes are validated at the wire boundary instead of passing raw JSON
/// into the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Move {
    /// `{"card": 10, "mode": "MAX"}`
    Card(CardMove),
    /// A bare board index, `0..=8`.
    Cell(u8),
}

/// One tic-tac-toe square. On the wire a cell is the single-character
/// string the board has always used: `" "`, `"O"` or `"X"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Empty,
    O,
    X,
}

impl Cell {
    fn as_str(self) -> &'static str {
        match self {
            Cell::Empty => " ",
            Cell::O => "O",
            Cell::X => "X",
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CellVisitor;

        impl<'de> Visitor<'de> for CellVisitor {
            type Value = Cell;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("\" \", \"O\" or \"X\"")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Cell, E> {
                match value {
                    " " => Ok(Cell::Empty),
                    "O" => Ok(Cell::O),
                    "X" => Ok(Cell::X),
                    other => Err(E::custom(format!("invalid cell {:?}", other))),
                }
            }
        }

        deserializer.deserialize_str(CellVisitor)
    }
}

/// The nine-cell tic-tac-toe board in row-major order.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Board(pub [Cell; 9]);

impl Board {
    const WIN_LINES: [[usize; 3]; 8] = [
        [0, 1, 2],
        [3, 4, 5],
        [6, 7, 8],
        [0, 3, 6],
        [1, 4, 7],
        [2, 5, 8],
        [0, 4, 8],
        [2, 4, 6],
    ];

    pub fn new() -> Self {
        Board([Cell::Empty; 9])
    }

    pub fn cells(&self) -> &[Cell; 9] {
        &self.0
    }

    /// Places `mark` at `index`. Returns false without touching the board
    /// when the index is out of range or the square is taken.
    pub fn place(&mut self, index: usize, mark: Cell) -> bool {
        if mark == Cell::Empty || index >= 9 || self.0[index] != Cell::Empty {
            return false;
        }
        self.0[index] = mark;
        true
    }

    /// The mark owning three in a row, if any line is complete.
    pub fn winner(&self) -> Option<Cell> {
        for [a, b, c] in Self::WIN_LINES {
            if self.0[a] != Cell::Empty && self.0[a] == self.0[b] && self.0[b] == self.0[c] {
                return Some(self.0[a]);
            }
        }
        None
    }

    pub fn is_full(&self) -> bool {
        self.0.iter().all(|&cell| cell != Cell::Empty)
    }
}

impl Default for Board {
    fn default() -> Self {
        Board::new()
    }
}

/// Outcome of one resolved round, broadcast with the following round's
/// state and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RoundResult {
    pub winner: MatchWinner,
    pub moves: BTreeMap<Role, Move>,
}

/// Initial deal, sent once per role. `hand` carries only the receiving
/// role's private cards and is omitted for games without private state.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StartUpdate {
    pub status: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hand: Vec<u8>,
}

impl StartUpdate {
    pub fn new(role: Role, hand: Vec<u8>) -> Self {
        StartUpdate {
            status: START_STATUS.to_string(),
            role,
            hand,
        }
    }
}

/// Public round state, broadcast identically to every role before their
/// moves are collected.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RoundUpdate {
    pub round: u32,
    pub total_wins: BTreeMap<Role, u32>,
    pub turn: Turn,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_result: Option<RoundResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board: Option<Board>,
}

/// Terminal message, broadcast exactly once when the match resolves.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EndUpdate {
    pub turn: Turn,
    pub winner: MatchWinner,
    pub total_wins: BTreeMap<Role, u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board: Option<Board>,
}

impl EndUpdate {
    pub fn new(winner: MatchWinner, total_wins: BTreeMap<Role, u32>, board: Option<Board>) -> Self {
        EndUpdate {
            turn: Turn::End,
            winner,
            total_wins,
            board,
        }
    }
}

/// Any server-to-client line. The variants have disjoint required fields,
/// so the untagged decode is unambiguous.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ServerUpdate {
    Start(StartUpdate),
    End(EndUpdate),
    Round(RoundUpdate),
}
