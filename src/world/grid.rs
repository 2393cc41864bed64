use std::fmt;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Grid coordinate. `x` is the column, `y` the row.
///
/// Coordinates are signed so that positions past the border (sensor readings,
/// caller mistakes) can be expressed and then ignored by the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Ground-truth state of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cell {
    Dirty,
    Clean,
    Obstacle,
    Robot,
}

/// What the robot believes about a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Tile {
    #[default]
    Unknown,
    Dirty,
    Clean,
    Obstacle,
    Robot,
    /// Given up on by the planner; never targeted again.
    Unreachable,
}

impl Tile {
    pub fn is_passable(self) -> bool {
        !matches!(self, Tile::Obstacle)
    }

    /// Work still outstanding: dirt we have seen or ground we have not.
    pub fn is_pending(self) -> bool {
        matches!(self, Tile::Dirty | Tile::Unknown)
    }

    pub fn as_char(self) -> char {
        match self {
            Tile::Unknown => '?',
            Tile::Dirty => 'D',
            Tile::Clean => '.',
            Tile::Obstacle => '#',
            Tile::Robot => 'R',
            Tile::Unreachable => 'X',
        }
    }
}

impl From<Cell> for Tile {
    fn from(cell: Cell) -> Self {
        match cell {
            Cell::Dirty => Tile::Dirty,
            Cell::Clean => Tile::Clean,
            Cell::Obstacle => Tile::Obstacle,
            Cell::Robot => Tile::Robot,
        }
    }
}

/// Square grid of perceived tiles, stored row-major.
///
/// This is also the copy carried by every status snapshot, so cloning it is
/// always a deep copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerceivedGrid {
    size: usize,
    tiles: Vec<Tile>,
}

impl PerceivedGrid {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            tiles: vec![Tile::Unknown; size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn tile(&self, pos: Position) -> Option<Tile> {
        index_of(self.size, pos).map(|i| self.tiles[i])
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Tile]> {
        self.tiles.chunks(self.size.max(1))
    }

    pub fn count(&self, tile: Tile) -> usize {
        self.tiles.iter().filter(|&&t| t == tile).count()
    }

    /// First position holding `tile`, scanning row by row.
    pub fn first(&self, tile: Tile) -> Option<Position> {
        self.tiles
            .iter()
            .position(|&t| t == tile)
            .map(|i| position_of(self.size, i))
    }

    fn set(&mut self, pos: Position, tile: Tile) -> bool {
        match index_of(self.size, pos) {
            Some(i) => {
                self.tiles[i] = tile;
                true
            }
            None => false,
        }
    }
}

impl fmt::Display for PerceivedGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            let line: Vec<String> = row.iter().map(|t| t.as_char().to_string()).collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}

fn index_of(size: usize, pos: Position) -> Option<usize> {
    let (x, y) = (usize::try_from(pos.x).ok()?, usize::try_from(pos.y).ok()?);
    (x < size && y < size).then(|| y * size + x)
}

fn position_of(size: usize, index: usize) -> Position {
    Position::new((index % size) as i32, (index / size) as i32)
}

/// Ground truth plus the robot's perceived copy of it.
///
/// Out-of-range coordinates are never an error here: every mutator simply
/// ignores them.
#[derive(Debug, Clone)]
pub struct GridWorld {
    size: usize,
    ground: Vec<Cell>,
    perceived: PerceivedGrid,
    robot: Position,
    origin: Position,
}

impl GridWorld {
    /// A fully dirty, fully unknown world with the robot in the top-left corner.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let mut world = Self {
            size,
            ground: vec![Cell::Dirty; size * size],
            perceived: PerceivedGrid::new(size),
            robot: Position::new(0, 0),
            origin: Position::new(0, 0),
        };
        world.tag_robot(world.robot);
        world
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        index_of(self.size, pos).is_some()
    }

    pub fn robot_position(&self) -> Position {
        self.robot
    }

    /// Where the robot was placed; the charging station.
    pub fn origin(&self) -> Position {
        self.origin
    }

    pub fn cell(&self, pos: Position) -> Option<Cell> {
        index_of(self.size, pos).map(|i| self.ground[i])
    }

    pub fn tile(&self, pos: Position) -> Option<Tile> {
        self.perceived.tile(pos)
    }

    pub fn perceived(&self) -> &PerceivedGrid {
        &self.perceived
    }

    /// Returns how many cells were actually turned into obstacles.
    pub fn place_obstacles<I>(&mut self, positions: I) -> usize
    where
        I: IntoIterator<Item = Position>,
    {
        let mut placed = 0;
        for pos in positions {
            if pos == self.robot {
                debug!("Skipping obstacle on robot cell {}", pos);
                continue;
            }
            if let Some(i) = index_of(self.size, pos) {
                self.ground[i] = Cell::Obstacle;
                placed += 1;
            }
        }
        placed
    }

    /// Puts the robot down and makes that cell the charging origin.
    pub fn place_robot(&mut self, pos: Position) {
        if !self.in_bounds(pos) {
            warn!("Ignoring robot placement outside the grid at {}", pos);
            return;
        }
        if pos != self.robot {
            self.set_ground(self.robot, Cell::Dirty);
            self.perceived.set(self.robot, Tile::Unknown);
        }
        self.tag_robot(pos);
        self.origin = pos;
    }

    /// Moves the robot if `target` is on the grid and not an obstacle.
    /// The vacated cell becomes clean in both grids.
    pub fn move_robot(&mut self, target: Position) -> bool {
        match self.cell(target) {
            None | Some(Cell::Obstacle) => false,
            Some(_) => {
                self.set_ground(self.robot, Cell::Clean);
                self.perceived.set(self.robot, Tile::Clean);
                self.tag_robot(target);
                true
            }
        }
    }

    pub fn update_perceived<I>(&mut self, observations: I)
    where
        I: IntoIterator<Item = (Position, Tile)>,
    {
        for (pos, tile) in observations {
            self.perceived.set(pos, tile);
        }
    }

    pub fn is_fully_clean(&self) -> bool {
        !self.ground.contains(&Cell::Dirty)
    }

    pub fn has_unknown(&self) -> bool {
        self.perceived.count(Tile::Unknown) > 0
    }

    pub fn has_pending(&self) -> bool {
        self.perceived.tiles.iter().any(|t| t.is_pending())
    }

    /// Gives up on every perceived dirty or unknown cell. Returns how many were marked.
    pub fn mark_unreachable(&mut self) -> usize {
        let mut marked = 0;
        for tile in self.perceived.tiles.iter_mut().filter(|t| t.is_pending()) {
            *tile = Tile::Unreachable;
            marked += 1;
        }
        marked
    }

    fn tag_robot(&mut self, pos: Position) {
        self.set_ground(pos, Cell::Robot);
        self.perceived.set(pos, Tile::Robot);
        self.robot = pos;
    }

    fn set_ground(&mut self, pos: Position, cell: Cell) {
        if let Some(i) = index_of(self.size, pos) {
            self.ground[i] = cell;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_ground(world: &GridWorld, cell: Cell) -> usize {
        world.ground.iter().filter(|&&c| c == cell).count()
    }

    #[test]
    fn test_new_world_is_dirty_and_unknown() {
        let world = GridWorld::new(4);
        assert_eq!(count_ground(&world, Cell::Dirty), 15);
        assert_eq!(world.perceived().count(Tile::Unknown), 15);
        assert_eq!(world.robot_position(), Position::new(0, 0));
        assert!(world.has_unknown());
        assert!(!world.is_fully_clean());
    }

    #[test]
    fn test_place_obstacles_ignores_out_of_range() {
        let mut world = GridWorld::new(3);
        let placed = world.place_obstacles([
            Position::new(1, 1),
            Position::new(-1, 0),
            Position::new(3, 2),
            Position::new(2, 7),
        ]);
        assert_eq!(placed, 1);
        assert_eq!(world.cell(Position::new(1, 1)), Some(Cell::Obstacle));
        assert_eq!(count_ground(&world, Cell::Obstacle), 1);
    }

    #[test]
    fn test_place_robot_sets_origin_and_moves_tag() {
        let mut world = GridWorld::new(5);
        world.place_robot(Position::new(2, 3));
        assert_eq!(world.origin(), Position::new(2, 3));
        assert_eq!(world.cell(Position::new(2, 3)), Some(Cell::Robot));
        assert_eq!(world.tile(Position::new(2, 3)), Some(Tile::Robot));
        assert_eq!(world.cell(Position::new(0, 0)), Some(Cell::Dirty));
        assert_eq!(count_ground(&world, Cell::Robot), 1);
        assert_eq!(world.perceived().count(Tile::Robot), 1);
    }

    #[test]
    fn test_place_robot_out_of_range_is_noop() {
        let mut world = GridWorld::new(5);
        world.place_robot(Position::new(1, 1));
        world.place_robot(Position::new(5, 0));
        assert_eq!(world.origin(), Position::new(1, 1));
        assert_eq!(world.robot_position(), Position::new(1, 1));
    }

    #[test]
    fn test_move_robot_cleans_previous_cell() {
        let mut world = GridWorld::new(3);
        assert!(world.move_robot(Position::new(1, 0)));
        assert_eq!(world.cell(Position::new(0, 0)), Some(Cell::Clean));
        assert_eq!(world.tile(Position::new(0, 0)), Some(Tile::Clean));
        assert_eq!(world.cell(Position::new(1, 0)), Some(Cell::Robot));
        assert_eq!(world.tile(Position::new(1, 0)), Some(Tile::Robot));
        assert_eq!(world.origin(), Position::new(0, 0));
    }

    #[test]
    fn test_move_robot_refuses_obstacle_and_out_of_range() {
        let mut world = GridWorld::new(3);
        world.place_obstacles([Position::new(1, 0)]);
        assert!(!world.move_robot(Position::new(1, 0)));
        assert!(!world.move_robot(Position::new(0, -1)));
        assert_eq!(world.robot_position(), Position::new(0, 0));
        assert_eq!(world.cell(Position::new(0, 0)), Some(Cell::Robot));
    }

    #[test]
    fn test_exactly_one_robot_after_moves() {
        let mut world = GridWorld::new(4);
        world.place_obstacles([Position::new(2, 2)]);
        let targets = [(1, 0), (1, 1), (2, 2), (2, 1), (9, 9), (2, 0), (1, 0)];
        for (x, y) in targets {
            world.move_robot(Position::new(x, y));
            assert_eq!(count_ground(&world, Cell::Robot), 1);
            assert_eq!(world.perceived().count(Tile::Robot), 1);
        }
    }

    #[test]
    fn test_update_perceived_leaves_ground_truth() {
        let mut world = GridWorld::new(3);
        world.update_perceived([
            (Position::new(1, 1), Tile::Obstacle),
            (Position::new(4, 4), Tile::Dirty),
        ]);
        assert_eq!(world.tile(Position::new(1, 1)), Some(Tile::Obstacle));
        assert_eq!(world.cell(Position::new(1, 1)), Some(Cell::Dirty));
    }

    #[test]
    fn test_mark_unreachable_only_touches_pending_tiles() {
        let mut world = GridWorld::new(3);
        world.update_perceived([
            (Position::new(1, 0), Tile::Dirty),
            (Position::new(2, 0), Tile::Clean),
            (Position::new(0, 1), Tile::Obstacle),
        ]);
        let marked = world.mark_unreachable();
        assert_eq!(marked, 6);
        assert_eq!(world.tile(Position::new(1, 0)), Some(Tile::Unreachable));
        assert_eq!(world.tile(Position::new(2, 0)), Some(Tile::Clean));
        assert_eq!(world.tile(Position::new(0, 1)), Some(Tile::Obstacle));
        assert!(!world.has_unknown());
        assert!(!world.has_pending());
    }

    #[test]
    fn test_first_scans_row_major() {
        let mut grid = PerceivedGrid::new(3);
        grid.set(Position::new(0, 2), Tile::Dirty);
        grid.set(Position::new(2, 1), Tile::Dirty);
        assert_eq!(grid.first(Tile::Dirty), Some(Position::new(2, 1)));
        assert_eq!(grid.first(Tile::Robot), None);
    }

    #[test]
    fn test_display_renders_rows() {
        let world = GridWorld::new(2);
        assert_eq!(world.perceived().to_string(), "R ?\n? ?\n");
    }
}
