//! # Simulation Event Bus
//!
//! Inter-unit communication for the simulation core.
//!
//! ```text
//! ┌─────────────┐      ┌─────────────┐      ┌─────────────┐
//! │  Collision  │─────>│   Event     │─────>│ Pathfinding │
//! │   Engine    │      │   Channel   │      │  (invalidate│
//! └─────────────┘      └─────────────┘      │  cached     │
//!       │                    │              │  paths)     │
//!       │              ┌─────┴─────┐        └─────────────┘
//!       └─────────────>│  World    │
//!                      │ Registry  │
//!                      └───────────┘
//! ```
//!
//! Events flow FROM the producers (collision, inventories, world loader)
//! TO interested consumers. Uses crossbeam channels; publishing never
//! blocks - a full channel drops the event and counts the drop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::handle::{EntityHandle, EntityId, ResourceHandle};
use crate::math::Vec2;

/// Which side of a trigger volume transition happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerPhase {
    /// First overlapping tick
    Enter,
    /// First non-overlapping tick after an Enter
    Exit,
}

/// Direction of a static-obstacle set change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObstacleChange {
    /// A static body appeared
    Added,
    /// A static body was removed
    Removed,
}

/// Events that flow between simulation units.
///
/// These events are the "API" between units. Each unit only processes
/// events relevant to it.
#[derive(Clone, Debug)]
pub enum SimEvent {
    /// The static collision set changed.
    ///
    /// Emitted by: collision engine (static body add/remove)
    /// Consumed by: pathfinding (cached-path invalidation)
    ObstacleChanged {
        /// Center of the changed body
        position: Vec2,
        /// Influence radius: max half extent plus safety margin
        radius: f32,
        /// Added or removed
        change: ObstacleChange,
        /// Diagnostic description ("tile 12,7", "door")
        description: String,
    },

    /// A body crossed a trigger volume boundary.
    WorldTrigger {
        /// Body that crossed the boundary (usually the player)
        entity: EntityId,
        /// The trigger volume's body id
        trigger: EntityId,
        /// Trigger tag discriminant (water, lava, door, ...)
        tag: u8,
        /// Contact position (entity center)
        position: Vec2,
        /// Enter or Exit
        phase: TriggerPhase,
    },

    /// An inventory quantity changed.
    ResourceChange {
        /// Entity owning the inventory
        owner: EntityHandle,
        /// Resource that changed
        resource: ResourceHandle,
        /// Quantity before
        old_quantity: u32,
        /// Quantity after
        new_quantity: u32,
        /// Why ("picked_up", "consumed", "traded", ...)
        reason: &'static str,
    },

    /// A world finished loading and became active.
    WorldLoaded {
        /// World identifier
        world: String,
    },

    /// A world was unloaded; spatial data for it must be dropped.
    WorldUnloaded {
        /// World identifier
        world: String,
    },
}

/// Sending half of the event bus. Cheap to clone.
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<SimEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventSender {
    /// Publishes an event without blocking.
    ///
    /// Returns `false` when the channel was full and the event was dropped.
    /// Drops are counted; a rising drop count means a consumer stalled.
    pub fn publish(&self, event: SimEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Number of events dropped because the channel was full.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Receiving half of the event bus.
pub struct EventReceiver {
    rx: Receiver<SimEvent>,
}

impl EventReceiver {
    /// Drains every pending event into `out`. Returns the number drained.
    pub fn drain(&self, out: &mut Vec<SimEvent>) -> usize {
        let before = out.len();
        while let Ok(event) = self.rx.try_recv() {
            out.push(event);
        }
        out.len() - before
    }

    /// Receives one pending event, if any.
    #[must_use]
    pub fn try_recv(&self) -> Option<SimEvent> {
        self.rx.try_recv().ok()
    }

    /// Number of events currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// True when no events are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Bounded event bus connecting simulation units.
pub struct EventBus;

impl EventBus {
    /// Creates a connected sender/receiver pair with the given capacity.
    #[must_use]
    pub fn channel(capacity: usize) -> (EventSender, EventReceiver) {
        let (tx, rx) = bounded(capacity);
        (
            EventSender {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            EventReceiver { rx },
        )
    }
}
