//! Items and the stat effects they carry.

use serde::{Deserialize, Serialize};
use skirmish_grid::Position;

use crate::Player;
use crate::rules::ITEM_BONUS;

/// Every item a map can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemKind {
    Sword,
    Armor,
    Boots,
    Amulet,
    /// Capture-the-flag objective. No stat effect.
    Flag,
}

/// An item lying on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPlacement {
    pub position: Position,
    pub kind: ItemKind,
}

/// Applies and removes the stat effects of items.
///
/// Called by the room whenever an item enters or leaves an inventory.
/// Effects are independent of combat: a bonus stays for as long as the
/// item is carried.
pub trait ItemEffects: Send + Sync {
    fn activate(&self, player: &mut Player, item: ItemKind);
    fn deactivate(&self, player: &mut Player, item: ItemKind);
}

/// The stock effects: sword +attack, armor +defense, boots +speed,
/// amulet +max life.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardItemEffects;

impl ItemEffects for StandardItemEffects {
    fn activate(&self, player: &mut Player, item: ItemKind) {
        let stats = &mut player.stats;
        match item {
            ItemKind::Sword => stats.attack += ITEM_BONUS,
            ItemKind::Armor => stats.defense += ITEM_BONUS,
            ItemKind::Boots => stats.speed += ITEM_BONUS.unsigned_abs(),
            ItemKind::Amulet => {
                stats.max_life += ITEM_BONUS.unsigned_abs();
                stats.life += ITEM_BONUS.unsigned_abs();
            }
            ItemKind::Flag => {}
        }
    }

    fn deactivate(&self, player: &mut Player, item: ItemKind) {
        let stats = &mut player.stats;
        match item {
            ItemKind::Sword => stats.attack -= ITEM_BONUS,
            ItemKind::Armor => stats.defense -= ITEM_BONUS,
            ItemKind::Boots => {
                stats.speed = stats.speed.saturating_sub(ITEM_BONUS.unsigned_abs());
            }
            ItemKind::Amulet => {
                stats.max_life = stats.max_life.saturating_sub(ITEM_BONUS.unsigned_abs());
                stats.life = stats.life.min(stats.max_life);
            }
            ItemKind::Flag => {}
        }
    }
}
