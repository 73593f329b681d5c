//! # mwsync - client-side multiworld randomizer state
//!
//! A remote multiworld service places one item at every location of every
//! connected game and pushes grants to clients as other players find them.
//! This crate is the client half that has to stay consistent through all of
//! that: which locations are in play and checked, which items are owned,
//! what is still queued for the player, and when the slot's goal is met.
//!
//! ## Features
//!
//! - **Location table**: fixed 1023-slot registry of location flags, one-shot checks.
//! - **Item catalog**: typed item definitions with a per-slot override layer.
//! - **Receive queue and applier**: FIFO grants applied once per tick, progressive
//!   chains, level-scoped keys, capacity clamps, order-independent rebuilds.
//! - **Save sync**: startup snapshot gate with a hard deadline, debounced write-back.
//! - **Goal evaluator** and **trap scheduler** driven by the same tick.
//! - **Local world**: offline single-player seeds backed by sled.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mwsync::effects::LogEffects;
//! use mwsync::game::GameConfig;
//! use mwsync::local::{LocalTransport, LocalWorld};
//! use mwsync::session::Session;
//! use mwsync::storage::SaveStore;
//! use mwsync::sync::SyncOptions;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let game = GameConfig::load("game.json").await?;
//!     let world = LocalWorld::load("world.json").await?;
//!     let store = SaveStore::open("./data")?;
//!     let transport = LocalTransport::new(world, store, game.game_id, "Player1");
//!
//!     let mut session = Session::new(&game, transport, LogEffects::default(), SyncOptions::default());
//!     session.connect().await?;
//!     session.enter_level("E1L1");
//!     session.tick();
//!     session.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`session`] - the context object tying everything together
//! - [`location`], [`catalog`], [`progress`], [`queue`], [`applier`] - core state
//! - [`sync`], [`goal`], [`trap`] - per-tick machinery
//! - [`transport`], [`effects`] - seams towards the network client and the game engine
//! - [`game`], [`settings`], [`player`] - static config, slot data and derived player state
//! - [`local`], [`storage`] - offline play
//! - [`config`] - TOML configuration for the binary

pub mod applier;
pub mod catalog;
pub mod config;
pub mod effects;
pub mod errors;
pub mod game;
pub mod goal;
pub mod ids;
pub mod local;
pub mod location;
pub mod logutil;
pub mod metrics;
pub mod player;
pub mod progress;
pub mod queue;
pub mod session;
pub mod settings;
pub mod storage;
pub mod sync;
pub mod transport;
pub mod trap;

pub use errors::CoreError;
pub use ids::{LocationId, NetId};
pub use session::{Session, TickReport};
