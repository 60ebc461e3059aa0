//! # Resource Templates
//!
//! Immutable definitions of everything an inventory can hold: weapons,
//! potions, ore, currency. Runtime items reference a template through a
//! [`ResourceHandle`]; nothing copies template data around.
//!
//! The old engine modeled this as a deep inheritance tree
//! (Resource -> Item -> Equipment / Consumable, Currency -> Gold / Gem).
//! Here a template is one flat record plus a tagged [`CategoryData`]
//! variant, so templates pack into a contiguous registry and dispatch is a
//! match instead of a virtual call.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::handle::ResourceHandle;

/// Coarse resource grouping for filtering and UI tabs.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceCategory {
    /// Equipment, consumables, quest items
    #[default]
    Item = 0,
    /// Crafting components, raw resources
    Material = 1,
    /// Gold, gems, faction tokens
    Currency = 2,
    /// Energy, mana, building materials, ammunition
    GameResource = 3,
}

impl ResourceCategory {
    /// Debug name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Item => "Item",
            Self::Material => "Material",
            Self::Currency => "Currency",
            Self::GameResource => "GameResource",
        }
    }
}

/// Category-specific template payload.
///
/// Exactly one variant per former subclass branch; properties that only
/// one branch needs live here instead of in nullable base fields.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum CategoryData {
    /// No category-specific data
    #[default]
    None,
    /// Wearable gear
    Equipment {
        /// Equip slot name ("head", "chest", "main_hand", ...)
        slot: String,
        /// Flat stat bonus applied while equipped
        bonus: i32,
    },
    /// Single-use item
    Consumable {
        /// Effect identifier resolved by gameplay code
        effect: String,
        /// Effect magnitude
        power: i32,
        /// Effect duration in milliseconds (0 = instant)
        duration_ms: u32,
    },
    /// Item bound to a quest
    QuestItem {
        /// Owning quest identifier
        quest_id: String,
    },
    /// Tradeable currency
    Currency {
        /// Exchange rate relative to gold
        exchange_rate: f32,
    },
    /// Gem currency with quality grading
    Gem {
        /// Gem family ("ruby", "sapphire", ...)
        kind: String,
        /// Clarity grade 0-100
        clarity: u8,
    },
    /// Crafting material
    Material {
        /// Material tier for recipe gating
        tier: u8,
    },
}

/// Sprite-atlas rectangle for world rendering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtlasRect {
    /// X offset in the atlas
    pub x: i32,
    /// Y offset in the atlas
    pub y: i32,
    /// Width in the atlas
    pub w: i32,
    /// Height in the atlas
    pub h: i32,
}

/// Immutable resource definition.
///
/// Loaded once at startup by the external template loader; the simulation
/// only ever reads these through handle lookups.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceTemplate {
    /// Stable string id ("iron_ore", "healing_potion")
    pub id: String,
    /// Display name
    pub name: String,
    /// Flavor / tooltip text
    pub description: String,
    /// Coarse grouping
    pub category: ResourceCategory,
    /// Category payload
    pub category_data: CategoryData,
    /// Base economic value
    pub value: f32,
    /// Carry weight per unit
    pub weight: f32,
    /// Maximum units per inventory slot (>= 1)
    pub max_stack_size: u32,
    /// True when `max_stack_size > 1`
    pub is_stackable: bool,
    /// Consumed on use
    pub is_consumable: bool,
    /// UI icon texture id
    pub icon_texture_id: String,
    /// In-world sprite texture id
    pub world_texture_id: String,
    /// Animation frame count
    pub num_frames: u32,
    /// Milliseconds per animation frame
    pub anim_speed_ms: u32,
    /// Atlas rectangle
    pub atlas: AtlasRect,
}

impl ResourceTemplate {
    /// Creates a minimal template; the loader fills in the rest.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, category: ResourceCategory) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            max_stack_size: 1,
            ..Self::default()
        }
    }

    /// Sets the stack cap, keeping `is_stackable` consistent.
    pub fn set_max_stack_size(&mut self, max_stack: u32) {
        self.max_stack_size = max_stack.max(1);
        self.is_stackable = self.max_stack_size > 1;
    }
}

/// Errors from template registration and lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// A template with this string id is already registered.
    #[error("duplicate template id: {0}")]
    DuplicateId(String),

    /// The registry reached its fixed capacity.
    #[error("template registry full: capacity {0}")]
    OutOfCapacity(usize),
}

/// Handle-indexed store of resource templates.
///
/// Handles are assigned at registration; slot generations detect handles
/// that survived a registry reload. String lookup exists only for the load
/// boundary - everything at runtime goes through handles.
pub struct TemplateRegistry {
    templates: Vec<ResourceTemplate>,
    generations: Vec<u16>,
    by_name: HashMap<String, ResourceHandle>,
    capacity: usize,
}

impl TemplateRegistry {
    /// Creates a registry with a fixed capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            templates: Vec::with_capacity(capacity),
            generations: Vec::with_capacity(capacity),
            by_name: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    /// Registers a template, returning its handle.
    ///
    /// # Errors
    ///
    /// `DuplicateId` when the string id is taken, `OutOfCapacity` when the
    /// registry is full.
    pub fn register(&mut self, template: ResourceTemplate) -> Result<ResourceHandle, TemplateError> {
        if self.by_name.contains_key(&template.id) {
            return Err(TemplateError::DuplicateId(template.id));
        }
        if self.templates.len() >= self.capacity {
            return Err(TemplateError::OutOfCapacity(self.capacity));
        }

        // Slot 0 would make an id of 0, which is the invalid sentinel, so
        // handle ids are slot + 1.
        let slot = self.templates.len();
        let id = u32::try_from(slot + 1).unwrap_or(u32::MAX);
        let generation = 1u16;
        let handle = ResourceHandle::new(id, generation);

        self.by_name.insert(template.id.clone(), handle);
        self.templates.push(template);
        self.generations.push(generation);
        Ok(handle)
    }

    /// Looks a template up by handle; `None` when stale or unknown.
    #[must_use]
    pub fn get(&self, handle: ResourceHandle) -> Option<&ResourceTemplate> {
        if !handle.is_valid() {
            return None;
        }
        let slot = handle.id as usize - 1;
        let generation = handle.generation;
        if self.generations.get(slot).copied() != Some(generation) {
            return None;
        }
        self.templates.get(slot)
    }

    /// Load-boundary convenience: resolves a string id to a handle.
    #[must_use]
    pub fn handle_by_name(&self, id: &str) -> Option<ResourceHandle> {
        self.by_name.get(id).copied()
    }

    /// Maximum stack size for a resource, 1 when the handle is stale.
    #[must_use]
    pub fn max_stack_size(&self, handle: ResourceHandle) -> u32 {
        self.get(handle).map_or(1, |t| t.max_stack_size)
    }

    /// Number of registered templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// True when no templates are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
