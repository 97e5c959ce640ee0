//! Game Context
//!
//! Mutable state and collaborators that event scripts act on. The engine
//! passes the context explicitly through every call; there is no global
//! flag state.

use std::collections::BTreeMap;

use tracing::info;

use crate::dialogue::DialogueResolver;
use crate::error::CollaboratorError;
use crate::flags::FlagStore;

/// Item bookkeeping
pub trait Inventory {
    fn add(&mut self, item: &str, qty: i64) -> Result<(), CollaboratorError>;
    fn remove(&mut self, item: &str, qty: i64) -> Result<(), CollaboratorError>;
    fn has(&self, item: &str, qty: i64) -> bool;
}

/// Presents dialogue and collects choices
pub trait DialogueUi {
    fn show_dialogue(&mut self, speaker: &str, text: &str) -> Result<(), CollaboratorError>;
    /// Index of the chosen option
    fn choose(&mut self, options: &[String]) -> Result<usize, CollaboratorError>;
}

/// Result of a battle as reported by the battle system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleOutcome {
    Won,
    Lost,
    Fled,
}

/// Runs battles
pub trait BattleManager {
    fn start(&mut self, battle_id: &str, context: Option<&str>) -> Result<BattleOutcome, CollaboratorError>;
}

/// Everything a script can touch
pub struct GameContext {
    pub flags: FlagStore,
    pub dialogue: DialogueResolver,
    pub inventory: Box<dyn Inventory>,
    pub ui: Box<dyn DialogueUi>,
    pub battle_manager: Box<dyn BattleManager>,
}

impl GameContext {
    pub fn new(
        dialogue: DialogueResolver,
        inventory: Box<dyn Inventory>,
        ui: Box<dyn DialogueUi>,
        battle_manager: Box<dyn BattleManager>,
    ) -> Self {
        Self {
            flags: FlagStore::new(),
            dialogue,
            inventory,
            ui,
            battle_manager,
        }
    }

    /// Story log line
    pub fn log(&self, message: &str) {
        info!(target: "narrative_engine::script", "{}", message);
    }
}

/// Inventory kept in memory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryInventory {
    items: BTreeMap<String, i64>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, item: &str) -> i64 {
        self.items.get(item).copied().unwrap_or(0)
    }

    pub fn items(&self) -> impl Iterator<Item = (&str, i64)> {
        self.items.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl Inventory for MemoryInventory {
    /// A negative quantity removes items
    fn add(&mut self, item: &str, qty: i64) -> Result<(), CollaboratorError> {
        if qty < 0 {
            return self.remove(item, -qty);
        }
        if qty == 0 {
            return Err(CollaboratorError::InvalidQuantity {
                item: item.to_string(),
                qty,
            });
        }
        *self.items.entry(item.to_string()).or_insert(0) += qty;
        Ok(())
    }

    fn remove(&mut self, item: &str, qty: i64) -> Result<(), CollaboratorError> {
        if qty <= 0 {
            return Err(CollaboratorError::InvalidQuantity {
                item: item.to_string(),
                qty,
            });
        }

        let have = self.count(item);
        if have < qty {
            return Err(CollaboratorError::InventoryUnderflow {
                item: item.to_string(),
                have,
                requested: qty,
            });
        }

        if have == qty {
            self.items.remove(item);
        } else {
            self.items.insert(item.to_string(), have - qty);
        }
        Ok(())
    }

    fn has(&self, item: &str, qty: i64) -> bool {
        self.count(item) >= qty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_add_and_consume() {
        let mut bag = MemoryInventory::new();
        bag.add("poke_ball", 5).unwrap();
        bag.add("poke_ball", 3).unwrap();
        assert_eq!(bag.count("poke_ball"), 8);

        bag.remove("poke_ball", 3).unwrap();
        assert!(bag.has("poke_ball", 5));
        assert!(!bag.has("poke_ball", 6));

        let err = bag.remove("poke_ball", 10).unwrap_err();
        assert!(matches!(err, CollaboratorError::InventoryUnderflow { have: 5, requested: 10, .. }));
        assert_eq!(bag.count("poke_ball"), 5);

        bag.remove("poke_ball", 5).unwrap();
        assert_eq!(bag.items().count(), 0);
    }

    #[test]
    fn test_negative_grant_removes() {
        let mut bag = MemoryInventory::new();
        bag.add("potion", 2).unwrap();
        bag.add("potion", -1).unwrap();
        assert_eq!(bag.count("potion"), 1);
        assert!(bag.add("potion", -4).is_err());
        assert!(bag.add("potion", 0).is_err());
    }
}
