//! # Cold Entity Data
//!
//! Per-kind data blocks touched only by the systems that own them, stored
//! SoA-style: one dense array per kind family, indexed by the hot slot's
//! `type_local_index`. Removal is swap-remove with back-link patching so
//! the arrays stay dense.

use emberwake_shared::{EntityHandle, EntityId, EntityKind, ResourceHandle};

/// Entries in a character's interaction memory ring.
pub const INTERACTION_MEMORY_LEN: usize = 8;

/// One remembered interaction with another entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InteractionRecord {
    /// The other entity involved
    pub other: EntityId,
    /// Disposition change from the interaction (negative = hostile)
    pub delta: i16,
    /// Tick the interaction happened on
    pub tick: u64,
}

/// Cold data for player and NPC characters.
#[derive(Clone, Debug, Default)]
pub struct CharacterData {
    /// Current health
    pub health: f32,
    /// Maximum health
    pub max_health: f32,
    /// State machine bits owned by gameplay code
    pub state_flags: u32,
    /// AI behavior tag (meaningless for players)
    pub behavior: u8,
    /// Inventory pool index, `u32::MAX` when the character has none
    pub inventory_index: u32,
    /// Ring of recent interactions, newest at `memory_head - 1`
    pub memory: [InteractionRecord; INTERACTION_MEMORY_LEN],
    /// Next ring write position
    pub memory_head: u8,
}

impl CharacterData {
    /// Creates a character with full health and no inventory.
    #[must_use]
    pub fn new(max_health: f32) -> Self {
        Self {
            health: max_health,
            max_health,
            state_flags: 0,
            behavior: 0,
            inventory_index: u32::MAX,
            memory: [InteractionRecord::default(); INTERACTION_MEMORY_LEN],
            memory_head: 0,
        }
    }

    /// Records an interaction, overwriting the oldest entry once full.
    pub fn remember(&mut self, other: EntityId, delta: i16, tick: u64) {
        self.memory[self.memory_head as usize] = InteractionRecord { other, delta, tick };
        self.memory_head = (self.memory_head + 1) % INTERACTION_MEMORY_LEN as u8;
    }

    /// Sums remembered disposition toward `other`.
    #[must_use]
    pub fn disposition(&self, other: EntityId) -> i32 {
        self.memory
            .iter()
            .filter(|r| r.other == other)
            .map(|r| i32::from(r.delta))
            .sum()
    }
}

/// Cold data for dropped items.
#[derive(Clone, Debug, Default)]
pub struct ItemData {
    /// Template the item instantiates
    pub resource: ResourceHandle,
    /// Stack size lying in the world
    pub quantity: u32,
    /// World the item was dropped in
    pub world_id: String,
}

/// Cold data for harvestable nodes (trees, ore, gathering spots).
#[derive(Clone, Debug, Default)]
pub struct HarvestableData {
    /// Resource the node yields
    pub yield_resource: ResourceHandle,
    /// Minimum units per harvest
    pub yield_min: u32,
    /// Maximum units per harvest
    pub yield_max: u32,
    /// Seconds from depletion to respawn
    pub respawn_time: f32,
    /// Remaining respawn countdown; meaningful while depleted
    pub current_respawn: f32,
    /// Node has been harvested and is waiting to respawn
    pub is_depleted: bool,
}

/// Cold data for containers (chests, barrels, corpse loot).
#[derive(Clone, Debug, Default)]
pub struct ContainerData {
    /// Inventory pool index
    pub inventory_index: u32,
    /// Lid state for rendering and interaction gating
    pub is_open: bool,
    /// Loot table rolled on first open (0 = none)
    pub loot_table: u32,
}

/// Cold data for projectiles.
#[derive(Clone, Debug, Default)]
pub struct ProjectileData {
    /// Entity that fired the projectile
    pub owner: EntityHandle,
    /// Damage on hit
    pub damage: f32,
    /// Remaining lifetime in seconds
    pub lifetime: f32,
    /// Velocity magnitude cap
    pub max_speed: f32,
}

/// One dense cold array plus back-links to the owning hot slots.
///
/// `owner[i]` is the dense hot index of the entity whose
/// `type_local_index == i`; the two must agree at all times.
#[derive(Default)]
pub struct ColdBucket<T> {
    data: Vec<T>,
    owner: Vec<u32>,
}

impl<T> ColdBucket<T> {
    /// Appends an entry for hot slot `owner_index`, returning its
    /// type-local index.
    pub fn push(&mut self, value: T, owner_index: u32) -> u32 {
        let local = u32::try_from(self.data.len()).unwrap_or(u32::MAX);
        self.data.push(value);
        self.owner.push(owner_index);
        local
    }

    /// Swap-removes `local`, returning the hot index of the entry that was
    /// moved into its place (whose back-link the store must patch).
    pub fn swap_remove(&mut self, local: u32) -> Option<u32> {
        let local = local as usize;
        debug_assert!(local < self.data.len(), "type-local index out of range");
        if local >= self.data.len() {
            return None;
        }
        self.data.swap_remove(local);
        self.owner.swap_remove(local);
        // If something was swapped into the hole, its owner needs patching.
        self.owner.get(local).copied()
    }

    /// Shared access by type-local index.
    #[inline]
    #[must_use]
    pub fn get(&self, local: u32) -> Option<&T> {
        self.data.get(local as usize)
    }

    /// Mutable access by type-local index.
    #[inline]
    pub fn get_mut(&mut self, local: u32) -> Option<&mut T> {
        self.data.get_mut(local as usize)
    }

    /// Back-link: the hot index owning `local`.
    #[inline]
    #[must_use]
    pub fn owner_of(&self, local: u32) -> Option<u32> {
        self.owner.get(local as usize).copied()
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the bucket holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// All cold buckets, one per kind family.
///
/// Players and NPCs share the character family; kinds without cold data
/// (props, triggers, area effects, static obstacles) have none.
#[derive(Default)]
pub struct ColdStore {
    /// Player + NPC data
    pub characters: ColdBucket<CharacterData>,
    /// Dropped item data
    pub items: ColdBucket<ItemData>,
    /// Harvestable node data
    pub harvestables: ColdBucket<HarvestableData>,
    /// Container data
    pub containers: ColdBucket<ContainerData>,
    /// Projectile data
    pub projectiles: ColdBucket<ProjectileData>,
}

impl ColdStore {
    /// True when `kind` stores per-entity cold data.
    #[must_use]
    pub const fn has_cold_data(kind: EntityKind) -> bool {
        matches!(
            kind,
            EntityKind::Player
                | EntityKind::Npc
                | EntityKind::DroppedItem
                | EntityKind::Harvestable
                | EntityKind::Container
                | EntityKind::Projectile
        )
    }

    /// Swap-removes the cold entry for `kind`/`local`.
    ///
    /// Returns the hot index whose `type_local_index` back-link must be
    /// patched to `local`, if an entry was moved.
    pub fn remove(&mut self, kind: EntityKind, local: u32) -> Option<u32> {
        match kind {
            EntityKind::Player | EntityKind::Npc => self.characters.swap_remove(local),
            EntityKind::DroppedItem => self.items.swap_remove(local),
            EntityKind::Harvestable => self.harvestables.swap_remove(local),
            EntityKind::Container => self.containers.swap_remove(local),
            EntityKind::Projectile => self.projectiles.swap_remove(local),
            _ => None,
        }
    }
}
