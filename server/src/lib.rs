//! # Game Session Server Library
//!
//! This library hosts one live match of a turn-based game between TCP
//! clients. A session process binds a listening socket, performs the
//! identity handshake for every required role, then drives repeated
//! rounds of broadcast, move collection and resolution until the match
//! reaches a terminal state.
//!
//! ## Core Responsibilities
//!
//! ### Identity Handshake
//! Every accepted connection must claim a role (`P1..PN`) as its first
//! line. Exactly one live connection exists per role; invalid or
//! duplicate claims are rejected, and the match does not start until all
//! roles are bound.
//!
//! ### Round Synchronization
//! The engine broadcasts identical public state to all roles before any
//! role may act, then blocks on a fan-in barrier until one move per role
//! on turn has arrived. Rounds are strictly sequential: round N resolves
//! before round N+1 is ever announced.
//!
//! ### Failure Containment
//! A peer disconnect, an undecodable payload or an optional move timeout
//! aborts the match for everyone; there is no spectator or forfeit mode
//! and no reconnection. Channel teardown is unconditional on every exit
//! path.
//!
//! ## Architecture Design
//!
//! All match state lives on a single coordinating task that owns the
//! write half of every connection. One reader task per role performs that
//! role's blocking line reads and reports tagged events over an mpsc
//! channel, so no game state is ever mutated from a reader. Game variants
//! plug in through the [`rules::GameRules`] trait and share the one
//! engine implementation.
//!
//! ## Module Organization
//!
//! ### Session Module (`session`)
//! Connection acceptance, the role handshake and the newline-delimited
//! JSON channel wrapper.
//!
//! ### Engine Module (`engine`)
//! The round state machine: dealing, broadcasting, the move-collection
//! barrier, resolution and teardown.
//!
//! ### Rules Module (`rules`)
//! The pluggable rule strategies: the three-player card game,
//! tic-tac-toe, and the registry used by the command line.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::engine::{MatchConfig, RoundEngine};
//! use server::rules;
//! use server::session::{accept_players, HandshakePolicy};
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let rules = rules::create("card3p")?;
//!     let listener = TcpListener::bind("0.0.0.0:9000").await?;
//!     let channels =
//!         accept_players(&listener, rules.required_players(), HandshakePolicy::Abort).await?;
//!
//!     let mut engine = RoundEngine::new(channels, rules, MatchConfig::default());
//!     let winner = engine.run().await?;
//!     println!("winner: {}", winner);
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod rules;
pub mod session;
