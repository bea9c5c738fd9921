pub mod grid;
pub mod level;
pub mod player;
pub mod pool;

pub use grid::{Cell, CellId, Earth, RowShape, Sprite, Strip};
pub use level::LevelDirector;
pub use player::{Player, PlayerSignal, Volley};
