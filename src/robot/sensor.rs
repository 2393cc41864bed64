use std::collections::BTreeMap;

use crate::world::{Cell, GridWorld, Position, Tile};

/// The eight cells around the robot, row above first.
const NEIGHBOUR_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reading {
    Cell(Cell),
    OutOfBounds,
}

pub type Surroundings = BTreeMap<Position, Reading>;

/// Reads the ground truth around `pos`. Never touches the perceived grid.
pub fn sense(world: &GridWorld, pos: Position) -> Surroundings {
    NEIGHBOUR_OFFSETS
        .iter()
        .map(|&(dx, dy)| {
            let neighbour = pos.offset(dx, dy);
            let reading = world
                .cell(neighbour)
                .map_or(Reading::OutOfBounds, Reading::Cell);
            (neighbour, reading)
        })
        .collect()
}

/// The in-bounds part of a reading, ready for `GridWorld::update_perceived`.
pub fn observations(surroundings: &Surroundings) -> impl Iterator<Item = (Position, Tile)> + '_ {
    surroundings.iter().filter_map(|(&pos, reading)| match reading {
        Reading::Cell(cell) => Some((pos, Tile::from(*cell))),
        Reading::OutOfBounds => None,
    })
}

/// Senses around the robot and merges the result into its perceived grid.
pub fn survey(world: &mut GridWorld) {
    let surroundings = sense(world, world.robot_position());
    world.update_perceived(observations(&surroundings));
}
