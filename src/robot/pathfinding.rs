use std::collections::{HashMap, HashSet, VecDeque};

use crate::world::{PerceivedGrid, Position, Tile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Right,
    Down,
    Left,
    Up,
}

impl Direction {
    /// Fixed neighbour order; keeps every search reproducible.
    pub const EXPANSION_ORDER: [Direction; 4] =
        [Direction::Right, Direction::Down, Direction::Left, Direction::Up];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Up => (0, -1),
        }
    }
}

pub fn next_position(pos: Position, dir: Direction) -> Position {
    let (dx, dy) = dir.delta();
    pos.offset(dx, dy)
}

fn passable(grid: &PerceivedGrid, pos: Position) -> bool {
    grid.tile(pos).is_some_and(Tile::is_passable)
}

fn neighbours(grid: &PerceivedGrid, pos: Position) -> impl Iterator<Item = Position> + '_ {
    Direction::EXPANSION_ORDER
        .into_iter()
        .map(move |dir| next_position(pos, dir))
        .filter(move |&n| passable(grid, n))
}

/// Shortest 4-connected path from `start` to `goal`, both included.
///
/// Only perceived obstacles block; unknown cells are assumed walkable.
pub fn find_path(grid: &PerceivedGrid, start: Position, goal: Position) -> Option<Vec<Position>> {
    grid.tile(start)?;
    if start == goal {
        return Some(vec![start]);
    }
    if !passable(grid, goal) {
        return None;
    }

    let mut came_from: HashMap<Position, Position> = HashMap::new();
    let mut queue = VecDeque::from([start]);
    came_from.insert(start, start);

    while let Some(current) = queue.pop_front() {
        for next in neighbours(grid, current) {
            if came_from.contains_key(&next) {
                continue;
            }
            came_from.insert(next, current);
            if next == goal {
                return Some(rebuild_path(&came_from, start, goal));
            }
            queue.push_back(next);
        }
    }
    None
}

fn rebuild_path(came_from: &HashMap<Position, Position>, start: Position, goal: Position) -> Vec<Position> {
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        current = came_from[&current];
        path.push(current);
    }
    path.reverse();
    path
}

/// Length of the shortest path counted in cells, endpoints included, which
/// leaves one unit of reserve when compared against the battery.
/// `None` means unreachable.
pub fn required_steps(grid: &PerceivedGrid, start: Position, goal: Position) -> Option<usize> {
    find_path(grid, start, goal).map(|path| path.len())
}

/// First cell in breadth-first order from `start` whose tile satisfies `matches`.
pub fn find_nearest<F>(grid: &PerceivedGrid, start: Position, matches: F) -> Option<Position>
where
    F: Fn(Tile) -> bool,
{
    let tile = grid.tile(start)?;
    if matches(tile) {
        return Some(start);
    }

    let mut seen = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        for next in neighbours(grid, current) {
            if !seen.insert(next) {
                continue;
            }
            if grid.tile(next).is_some_and(&matches) {
                return Some(next);
            }
            queue.push_back(next);
        }
    }
    None
}
