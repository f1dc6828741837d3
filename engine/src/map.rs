use crate::grid::Coordinate;
use std::collections::{HashMap, HashSet};

/// Tile classes that matter to the simulation. Anything else is empty floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileKind {
    Wall,
    Spawn,
}

const WALL_GLYPH: char = '█';
const SPAWN_GLYPH: char = 'S';

/// The stock 40x40 arena. `█` is a wall, `S` a spawn point, space is floor.
const DEFAULT_ARENA: &str = "\
████████████████████████████████████████
█                                      █
█                                      █
█                             ███████ S█
█                                   █  █
█  S                                █  █
█                                   █  █
█                                   █  █
█                                   █  █
█                                   █  █
█                                      █
█                 █   █                █
█                 █████                █
█                                      █
█                                      █
█                          █           █
█                          █           █
█                          █           █
█                          █           █
█                                      █
█                   S                  █
█                                      █
█            █                         █
█            █                         █
█            █                         █
█            █                         █
█  ████                                █
█     █                                █
█     █           █████                █
█     █           █   █                █
█     █                                █
█     █                                █
█  S  █                             S  █
█     █                                █
█     █                                █
█     █                                █
█     █                                █
█                                      █
█                                      █
████████████████████████████████████████";

/// Static arena geometry: wall cells and spawn points in world coordinates.
///
/// The glyph grid's centre maps to (0, 0); a glyph at (map_x, map_y) lands at
/// `(map_x - width / 2, map_y - height / 2)`.
#[derive(Debug, Clone)]
pub struct ArenaMap {
    width: i32,
    height: i32,
    walls: HashSet<Coordinate>,
    spawns: Vec<Coordinate>,
}

impl ArenaMap {
    pub fn parse(text: &str) -> Self {
        let rows: Vec<&str> = text.lines().collect();
        let height = rows.len() as i32;
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0) as i32;

        let mut walls = HashSet::new();
        let mut spawns = Vec::new();
        for (map_y, row) in rows.iter().enumerate() {
            for (map_x, glyph) in row.chars().enumerate() {
                let position = Coordinate::new(
                    map_x as i32 - width / 2,
                    map_y as i32 - height / 2,
                );
                match glyph {
                    WALL_GLYPH => {
                        walls.insert(position);
                    }
                    SPAWN_GLYPH => spawns.push(position),
                    _ => {}
                }
            }
        }

        Self {
            width,
            height,
            walls,
            spawns,
        }
    }

    pub fn is_wall(&self, position: Coordinate) -> bool {
        self.walls.contains(&position)
    }

    /// Spawn points in scan order. Round-robin respawn indexes into this.
    pub fn spawn_points(&self) -> &[Coordinate] {
        &self.spawns
    }

    pub fn by_type(&self) -> HashMap<TileKind, Vec<Coordinate>> {
        let mut tiles = HashMap::new();
        tiles.insert(TileKind::Wall, self.walls.iter().copied().collect());
        tiles.insert(TileKind::Spawn, self.spawns.clone());
        tiles
    }

    /// Largest arena dimension, the travel cap for stray lasers.
    pub fn max_extent(&self) -> i32 {
        self.width.max(self.height)
    }
}

impl Default for ArenaMap {
    fn default() -> Self {
        Self::parse(DEFAULT_ARENA)
    }
}
