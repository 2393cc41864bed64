pub mod grid;
pub mod layout;

pub use grid::{Cell, GridWorld, PerceivedGrid, Position, Tile};
pub use layout::ObstacleLayout;
