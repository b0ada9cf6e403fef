//! Map construction contract.
//!
//! Procedural generation is a collaborator of the core: anything that
//! implements `MapGenerator` may supply the grid, provided it returns the
//! same map for the same (seed, config), wraps the grid in a one-tile VOID
//! ring, and keeps special tiles at least `min_special_distance` apart.
//! `validate_map` enforces the contract before a match is built on it.
//!
//! `StandardMapGenerator` is the stock implementation.

use crate::{
    config::MapConfig,
    error::{SimError, SimResult},
    rng::{RngBank, RngSlot, SubsystemRng},
    state::{TileSource, TileState, TileType},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpecialKind {
    NaturalPond,
    House,
    TrainDepot,
}

impl SpecialKind {
    pub fn tile_type(&self) -> TileType {
        match self {
            Self::NaturalPond => TileType::Pond,
            Self::House => TileType::House,
            Self::TrainDepot => TileType::Train,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpecialPoint {
    pub kind: SpecialKind,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedMap {
    pub width: u32,
    pub height: u32,
    pub tiles: Vec<TileState>,
    pub special_points: Vec<SpecialPoint>,
}

pub trait MapGenerator {
    fn generate(&self, seed: u64, config: &MapConfig) -> SimResult<GeneratedMap>;
}

fn manhattan(ax: i32, ay: i32, bx: i32, by: i32) -> u32 {
    ax.abs_diff(bx) + ay.abs_diff(by)
}

fn is_border(x: i32, y: i32, width: u32, height: u32) -> bool {
    x == 0 || y == 0 || x as u32 == width - 1 || y as u32 == height - 1
}

/// Check a map against the generator contract.
pub fn validate_map(map: &GeneratedMap, min_special_distance: u32) -> SimResult<()> {
    if map.width < 3 || map.height < 3 {
        return Err(SimError::invalid_map(format!(
            "{}x{} grid cannot hold a border ring",
            map.width, map.height
        )));
    }
    let expected = map.width as usize * map.height as usize;
    if map.tiles.len() != expected {
        return Err(SimError::invalid_map(format!(
            "expected {expected} tiles, got {}",
            map.tiles.len()
        )));
    }
    for (i, tile) in map.tiles.iter().enumerate() {
        let x = (i % map.width as usize) as i32;
        let y = (i / map.width as usize) as i32;
        if tile.x != x || tile.y != y {
            return Err(SimError::invalid_map(format!(
                "tile {i} claims ({}, {}) but sits at ({x}, {y})",
                tile.x, tile.y
            )));
        }
        let border = is_border(x, y, map.width, map.height);
        if border != (tile.tile_type == TileType::Void) {
            return Err(SimError::invalid_map(format!(
                "VOID must form exactly the border ring; ({x}, {y}) is {:?}",
                tile.tile_type
            )));
        }
    }
    for (i, a) in map.special_points.iter().enumerate() {
        let on_grid = a.x >= 0 && a.y >= 0 && (a.x as u32) < map.width && (a.y as u32) < map.height;
        let matches_grid = on_grid
            && map.tiles[a.y as usize * map.width as usize + a.x as usize].tile_type
                == a.kind.tile_type();
        if !matches_grid {
            return Err(SimError::invalid_map(format!(
                "special point {:?} at ({}, {}) does not match the grid",
                a.kind, a.x, a.y
            )));
        }
        for b in &map.special_points[i + 1..] {
            if manhattan(a.x, a.y, b.x, b.y) < min_special_distance {
                return Err(SimError::invalid_map(format!(
                    "special tiles ({}, {}) and ({}, {}) are closer than {min_special_distance}",
                    a.x, a.y, b.x, b.y
                )));
            }
        }
    }
    Ok(())
}

/// Stock generator: grass with scattered forest, then the train depot,
/// houses and natural ponds placed with a minimum spacing.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardMapGenerator;

impl StandardMapGenerator {
    fn place(
        rng: &mut SubsystemRng,
        config: &MapConfig,
        placed: &[SpecialPoint],
        kind: SpecialKind,
    ) -> SimResult<SpecialPoint> {
        let min_dist = |x: i32, y: i32| {
            placed
                .iter()
                .map(|p| manhattan(x, y, p.x, p.y))
                .min()
                .unwrap_or(u32::MAX)
        };

        for _ in 0..config.placement_attempts {
            let x = rng.range_u32(1, config.width - 1) as i32;
            let y = rng.range_u32(1, config.height - 1) as i32;
            if min_dist(x, y) >= config.min_special_distance.max(1) {
                return Ok(SpecialPoint { kind, x, y });
            }
        }

        // Deterministic scan fallback: the interior tile farthest from
        // everything placed so far, first in row-major order on ties.
        let mut best: Option<(u32, i32, i32)> = None;
        for y in 1..config.height as i32 - 1 {
            for x in 1..config.width as i32 - 1 {
                let d = min_dist(x, y);
                if best.is_none_or(|(bd, _, _)| d > bd) {
                    best = Some((d, x, y));
                }
            }
        }
        match best {
            Some((d, x, y)) if d >= config.min_special_distance.max(1) => {
                Ok(SpecialPoint { kind, x, y })
            }
            _ => Err(SimError::invalid_map(format!(
                "no room for {kind:?} at spacing {}",
                config.min_special_distance
            ))),
        }
    }
}

impl MapGenerator for StandardMapGenerator {
    fn generate(&self, seed: u64, config: &MapConfig) -> SimResult<GeneratedMap> {
        if config.width < 3 || config.height < 3 {
            return Err(SimError::invalid_map("map must be at least 3x3"));
        }
        let bank = RngBank::new(seed);
        let mut terrain = bank.for_slot(RngSlot::Terrain);
        let mut specials_rng = bank.for_slot(RngSlot::SpecialTiles);

        let mut tiles = Vec::with_capacity(config.width as usize * config.height as usize);
        for y in 0..config.height as i32 {
            for x in 0..config.width as i32 {
                let tile_type = if is_border(x, y, config.width, config.height) {
                    TileType::Void
                } else if terrain.percent(config.forest_percent) {
                    TileType::Forest
                } else {
                    TileType::Grass
                };
                tiles.push(TileState {
                    x,
                    y,
                    tile_type,
                    source: TileSource::MapGenerated,
                    owner_id: None,
                    current_price: 0,
                });
            }
        }

        let plan = std::iter::repeat_n(SpecialKind::TrainDepot, config.train_depots as usize)
            .chain(std::iter::repeat_n(SpecialKind::House, config.houses as usize))
            .chain(std::iter::repeat_n(SpecialKind::NaturalPond, config.natural_ponds as usize));

        let mut special_points: Vec<SpecialPoint> = Vec::new();
        for kind in plan {
            let point = Self::place(&mut specials_rng, config, &special_points, kind)?;
            let index = point.y as usize * config.width as usize + point.x as usize;
            tiles[index].tile_type = kind.tile_type();
            special_points.push(point);
        }

        log::debug!(
            "map: seed={seed} {}x{} specials={}",
            config.width,
            config.height,
            special_points.len()
        );

        let map = GeneratedMap {
            width: config.width,
            height: config.height,
            tiles,
            special_points,
        };
        validate_map(&map, config.min_special_distance)?;
        Ok(map)
    }
}
