use serde::{Deserialize, Serialize};

use crate::ledger::{clamp_between, clamp_index};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileKind {
    Forest,
    Wetland,
    Urban,
    Solar,
    Water,
    Polluted,
    Wildflower,
    Farmland,
}

impl TileKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TileKind::Forest => "forest",
            TileKind::Wetland => "wetland",
            TileKind::Urban => "urban",
            TileKind::Solar => "solar",
            TileKind::Water => "water",
            TileKind::Polluted => "polluted",
            TileKind::Wildflower => "wildflower",
            TileKind::Farmland => "farmland",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Plant,
    Clean,
    Solar,
    Wetland,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        ActionKind::Plant,
        ActionKind::Clean,
        ActionKind::Solar,
        ActionKind::Wetland,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Plant => "plant",
            ActionKind::Clean => "clean",
            ActionKind::Solar => "solar",
            ActionKind::Wetland => "wetland",
        }
    }
}

/// Minimum pollution a tile must carry before it can be cleaned.
pub const CLEANABLE_POLLUTION: f64 = 20.0;

/// One cell of the region map. Attributes may sit above 100 (energy on solar
/// farms, for instance); [`Tile::display`] clamps them for read models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TileKind,
    pub health: f64,
    pub pollution: f64,
    pub energy: f64,
    pub biodiversity: f64,
}

impl Tile {
    pub fn supports(&self, action: ActionKind) -> bool {
        use TileKind::*;
        match action {
            ActionKind::Plant => !matches!(self.kind, Forest | Wetland | Water),
            ActionKind::Clean => self.pollution > CLEANABLE_POLLUTION,
            ActionKind::Solar | ActionKind::Wetland => !matches!(self.kind, Water | Wetland),
        }
    }

    /// The tile after `action`, or `None` when the tile cannot host it.
    pub fn transformed(&self, action: ActionKind) -> Option<Tile> {
        if !self.supports(action) {
            return None;
        }
        let mut next = self.clone();
        match action {
            ActionKind::Plant => {
                next.kind = TileKind::Forest;
                next.health = clamp_index(self.health + 18.0);
                next.pollution = clamp_index(self.pollution - 12.0);
                next.biodiversity = clamp_index(self.biodiversity + 16.0);
                next.energy = clamp_between(self.energy - 6.0, 0.0, 120.0);
            }
            ActionKind::Clean => {
                if self.kind == TileKind::Polluted {
                    next.kind = TileKind::Farmland;
                }
                next.pollution = clamp_index(self.pollution - 24.0);
                next.health = clamp_index(self.health + 12.0);
                next.biodiversity = clamp_index(self.biodiversity + 10.0);
            }
            ActionKind::Solar => {
                next.kind = TileKind::Solar;
                next.energy = clamp_between(self.energy + 42.0, 0.0, 160.0);
                next.pollution = clamp_index(self.pollution - 10.0);
                next.biodiversity = clamp_between(self.biodiversity - 6.0, 0.0, 120.0);
                next.health = clamp_index(self.health + 6.0);
            }
            ActionKind::Wetland => {
                next.kind = TileKind::Wetland;
                next.health = clamp_index(self.health + 10.0);
                next.pollution = clamp_index(self.pollution - 14.0);
                next.biodiversity = clamp_index(self.biodiversity + 18.0);
                next.energy = clamp_between(self.energy - 8.0, 0.0, 120.0);
            }
        }
        Some(next)
    }

    pub fn display(&self) -> Tile {
        Tile {
            id: self.id.clone(),
            kind: self.kind,
            health: clamp_index(self.health),
            pollution: clamp_index(self.pollution),
            energy: clamp_index(self.energy),
            biodiversity: clamp_index(self.biodiversity),
        }
    }
}
