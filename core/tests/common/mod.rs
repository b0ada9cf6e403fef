//! Shared fixtures for the integration tests.

use floe_core::{
    map::{GeneratedMap, SpecialKind, SpecialPoint},
    state::{TileSource, TileState, TileType},
};

/// 8x6 grid: VOID ring, pond (1,1), house (4,1), train (1,4), grass elsewhere.
pub fn build_map() -> GeneratedMap {
    let (width, height) = (8u32, 6u32);
    let mut tiles = Vec::new();
    for y in 0..height as i32 {
        for x in 0..width as i32 {
            let border = x == 0 || y == 0 || x == width as i32 - 1 || y == height as i32 - 1;
            let tile_type = match (border, x, y) {
                (true, _, _) => TileType::Void,
                (_, 1, 1) => TileType::Pond,
                (_, 4, 1) => TileType::House,
                (_, 1, 4) => TileType::Train,
                _ => TileType::Grass,
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
    GeneratedMap {
        width,
        height,
        tiles,
        special_points: vec![
            SpecialPoint { kind: SpecialKind::NaturalPond, x: 1, y: 1 },
            SpecialPoint { kind: SpecialKind::House, x: 4, y: 1 },
            SpecialPoint { kind: SpecialKind::TrainDepot, x: 1, y: 4 },
        ],
    }
}
