//! The round state machine driving one match.
//!
//! A match moves through `AwaitingPlayers -> Dealing -> RoundActive ->
//! Resolving -> (RoundActive | Finished)`. The engine owns all match state
//! on a single coordinating task; one reader task per role performs that
//! role's blocking line reads and forwards tagged events into an mpsc
//! channel. Collecting a round is a fan-in barrier on that channel: the
//! round resolves only once every role on turn has submitted, and any
//! disconnect or malformed payload aborts the whole match. Rounds are
//! strictly sequential; round N+1 is never broadcast before round N has
//! resolved.

use crate::rules::{GameRules, RoundVerdict, RuleViolation};
use crate::session::SessionChannel;
use log::{debug, info, warn};
use serde::Serialize;
use shared::{EndUpdate, MatchWinner, Move, Role, RoundResult, RoundUpdate, StartUpdate, Turn};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Engine knobs. The baseline protocol has no move timeout: a silent peer
/// stalls the match until it disconnects.
#[derive(Debug, Clone, Default)]
pub struct MatchConfig {
    pub move_timeout: Option<Duration>,
}

/// Why a match aborted. Any of these tears down every connection.
#[derive(Debug)]
pub enum MatchError {
    /// A peer hung up (or its connection failed) mid-match.
    PeerDisconnect(Role),
    /// A peer sent a payload the protocol forbids.
    Protocol { role: Role, detail: String },
    /// The move-collection barrier timed out waiting on these roles.
    MoveTimeout { waiting_on: Vec<Role> },
    /// Every reader task is gone; the match cannot make progress.
    ChannelClosed,
}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchError::PeerDisconnect(role) => write!(f, "{} disconnected", role),
            MatchError::Protocol { role, detail } => {
                write!(f, "protocol violation from {}: {}", role, detail)
            }
            MatchError::MoveTimeout { waiting_on } => {
                write!(f, "timed out waiting for moves from ")?;
                for (index, role) in waiting_on.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", role)?;
                }
                Ok(())
            }
            MatchError::ChannelClosed => f.write_str("all reader tasks stopped"),
        }
    }
}

impl std::error::Error for MatchError {}

/// Events produced by the per-role reader tasks.
#[derive(Debug)]
enum ReaderEvent {
    Line { role: Role, line: String },
    Closed { role: Role },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitingPlayers,
    Dealing,
    RoundActive,
    Resolving,
    Finished,
}

/// Coordinates one match to completion. Exclusive owner of the per-role
/// write halves, the round counter and the running totals; reader tasks
/// communicate only through the event channel.
pub struct RoundEngine {
    rules: Box<dyn GameRules>,
    config: MatchConfig,
    roles: Vec<Role>,
    writers: BTreeMap<Role, OwnedWriteHalf>,
    events: mpsc::UnboundedReceiver<ReaderEvent>,
    round: u32,
    rounds_played: u32,
    totals: BTreeMap<Role, u32>,
    last_result: Option<RoundResult>,
    phase: Phase,
}

impl RoundEngine {
    /// Builds the engine from fully-handshaken channels and spawns one
    /// reader task per role. Construction is the `AwaitingPlayers ->
    /// Dealing` transition: it must only happen once all roles are bound.
    pub fn new(
        channels: BTreeMap<Role, SessionChannel>,
        rules: Box<dyn GameRules>,
        config: MatchConfig,
    ) -> Self {
        let (event_tx, events) = mpsc::unbounded_channel();
        let mut roles = Vec::new();
        let mut writers = BTreeMap::new();
        let mut totals = BTreeMap::new();

        for (role, channel) in channels {
            let (_, reader, writer) = channel.into_parts();
            roles.push(role);
            writers.insert(role, writer);
            totals.insert(role, 0);
            spawn_reader(role, reader, event_tx.clone());
        }

        RoundEngine {
            rules,
            config,
            roles,
            writers,
            events,
            round: 1,
            rounds_played: 0,
            totals,
            last_result: None,
            phase: Phase::AwaitingPlayers,
        }
    }

    /// Runs the match to its terminal state. Every channel is released on
    /// return, whether the match finished or aborted.
    pub async fn run(&mut self) -> Result<MatchWinner, MatchError> {
        let outcome = self.play().await;
        self.shutdown().await;
        outcome
    }

    async fn play(&mut self) -> Result<MatchWinner, MatchError> {
        self.enter(Phase::Dealing);
        let hands = self.rules.initial_deal(&self.roles);
        for role in self.roles.clone() {
            let hand = hands.get(&role).cloned().unwrap_or_default();
            let update = StartUpdate::new(role, hand);
            self.send(role, &update).await?;
        }

        loop {
            self.enter(Phase::RoundActive);
            let turn = self.rules.turn(self.round);
            let update = RoundUpdate {
                round: self.round,
                total_wins: self.totals.clone(),
                turn,
                round_result: self.last_result.clone(),
                board: self.rules.public_state(),
            };
            self.broadcast(&update).await?;

            let moves = self.collect_moves(turn).await?;

            self.enter(Phase::Resolving);
            let verdict = match self.rules.resolve_round(&moves) {
                Ok(verdict) => verdict,
                Err(RuleViolation::WrongShape { role }) => {
                    return Err(MatchError::Protocol {
                        role,
                        detail: "move shape not accepted by this game".to_string(),
                    });
                }
                Err(violation @ RuleViolation::Illegal { .. }) => {
                    // The round is replayed: same round number, same state.
                    warn!("round {}: {}", self.round, violation);
                    continue;
                }
            };

            self.rounds_played += 1;
            match verdict {
                RoundVerdict::Winner(winner) => {
                    *self.totals.entry(winner).or_insert(0) += 1;
                    info!("round {} won by {}", self.round, winner);
                    self.last_result = Some(RoundResult {
                        winner: MatchWinner::Player(winner),
                        moves,
                    });
                }
                RoundVerdict::Draw => {
                    info!("round {} drawn", self.round);
                    self.last_result = Some(RoundResult {
                        winner: MatchWinner::Draw,
                        moves,
                    });
                }
                RoundVerdict::Undecided => {
                    self.last_result = None;
                }
            }

            if let Some(winner) = self.rules.resolve_match(&self.totals, self.rounds_played) {
                self.enter(Phase::Finished);
                let update =
                    EndUpdate::new(winner, self.totals.clone(), self.rules.public_state());
                self.broadcast(&update).await?;
                info!("match finished, winner: {}", winner);
                return Ok(winner);
            }

            self.round += 1;
        }
    }

    /// The fan-in barrier for one round. Completes only when every role on
    /// turn has one accepted move; duplicates and out-of-turn submissions
    /// are ignored, disconnects and undecodable payloads abort.
    async fn collect_moves(&mut self, turn: Turn) -> Result<BTreeMap<Role, Move>, MatchError> {
        let expected: Vec<Role> = match turn {
            Turn::All => self.roles.clone(),
            Turn::Player(role) => vec![role],
            Turn::End => Vec::new(),
        };

        let mut moves = BTreeMap::new();
        let outcome = match self.config.move_timeout {
            Some(limit) => {
                match timeout(limit, gather(&mut self.events, &expected, &mut moves)).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        let waiting_on = expected
                            .iter()
                            .filter(|role| !moves.contains_key(*role))
                            .copied()
                            .collect();
                        Err(MatchError::MoveTimeout { waiting_on })
                    }
                }
            }
            None => gather(&mut self.events, &expected, &mut moves).await,
        };
        outcome.map(|_| moves)
    }

    async fn send<T: Serialize>(&mut self, role: Role, update: &T) -> Result<(), MatchError> {
        let writer = match self.writers.get_mut(&role) {
            Some(writer) => writer,
            None => return Err(MatchError::PeerDisconnect(role)),
        };
        match write_line(writer, update).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::InvalidData => Err(MatchError::Protocol {
                role,
                detail: err.to_string(),
            }),
            Err(err) => {
                debug!("write to {} failed: {}", role, err);
                Err(MatchError::PeerDisconnect(role))
            }
        }
    }

    /// Sends the same update to every role, in canonical role order.
    async fn broadcast<T: Serialize>(&mut self, update: &T) -> Result<(), MatchError> {
        for role in self.roles.clone() {
            self.send(role, update).await?;
        }
        Ok(())
    }

    fn enter(&mut self, phase: Phase) {
        debug!("phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Unconditional resource release: closes every write half and stops
    /// accepting reader events. Runs on normal finish and on abort alike.
    async fn shutdown(&mut self) {
        for (role, writer) in self.writers.iter_mut() {
            if let Err(err) = writer.shutdown().await {
                debug!("closing channel to {}: {}", role, err);
            }
        }
        self.writers.clear();
        self.events.close();
    }
}

/// Drains reader events into `moves` until every expected role has one.
async fn gather(
    events: &mut mpsc::UnboundedReceiver<ReaderEvent>,
    expected: &[Role],
    moves: &mut BTreeMap<Role, Move>,
) -> Result<(), MatchError> {
    while moves.len() < expected.len() {
        let event = match events.recv().await {
            Some(event) => event,
            None => return Err(MatchError::ChannelClosed),
        };
        match event {
            ReaderEvent::Closed { role } => return Err(MatchError::PeerDisconnect(role)),
            ReaderEvent::Line { role, line } => {
                if !expected.contains(&role) {
                    warn!("{} submitted out of turn, ignoring", role);
                    continue;
                }
                if moves.contains_key(&role) {
                    warn!("{} already moved this round, ignoring duplicate", role);
                    continue;
                }
                match serde_json::from_str::<Move>(line.trim()) {
                    Ok(submitted) => {
                        debug!("{} submitted {:?}", role, submitted);
                        moves.insert(role, submitted);
                    }
                    Err(err) => {
                        return Err(MatchError::Protocol {
                            role,
                            detail: err.to_string(),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

/// Spawns the task owning one role's blocking line reads. Exactly one
/// terminal `Closed` event is emitted when the peer hangs up or the read
/// fails; the task also stops once the engine drops the receiver.
fn spawn_reader(
    role: Role,
    reader: BufReader<OwnedReadHalf>,
    events: mpsc::UnboundedSender<ReaderEvent>,
) {
    tokio::spawn(async move {
        let mut lines = reader.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if events.send(ReaderEvent::Line { role, line }).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    let _ = events.send(ReaderEvent::Closed { role });
                    break;
                }
                Err(err) => {
                    debug!("reader for {} failed: {}", role, err);
                    let _ = events.send(ReaderEvent::Closed { role });
                    break;
                }
            }
        }
    });
}

async fn write_line<T: Serialize>(writer: &mut OwnedWriteHalf, update: &T) -> io::Result<()> {
    let mut line = serde_json::to_string(update)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await
}
