pub mod leaderboard;
pub mod net;
pub mod player;
pub mod puzzle;
pub mod registry;
pub mod session;
pub mod time;

pub use player::{PlayerId, PlayerStatus};
pub use puzzle::{Puzzle, TILE_COUNT};
pub use session::{Delivery, GameSession, Outbound, SessionSnapshot, SessionStatus};
