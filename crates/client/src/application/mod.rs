//! What the client does with the connection: keep a merged model of the game
//! and derive per-player views from it.

pub mod refresher;
pub mod state;
pub mod summary;

pub use refresher::StateRefresher;
pub use state::{GameStateModel, PartialGameState, StateField, StateUpdate};
pub use summary::{build_queues, unit_counts, GameSummary};
