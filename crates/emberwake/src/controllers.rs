//! # Controller Registry
//!
//! Game states own a grab bag of small helper objects - weather bridge,
//! trade logic, render-event forwarding - that need identical lifecycle
//! plumbing: subscribe on enter, unsubscribe on exit, suspend over pause
//! states, and a per-frame update for the few that want one.
//!
//! The registry stores them type-keyed and dispatches the batch
//! operations idempotently. Update capability is recorded ONCE at
//! insertion (composition instead of capability inheritance), so the
//! per-frame loop touches only controllers that opted in and never does a
//! type check.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use tracing::debug;

/// Per-frame update capability. Implement alongside [`Controller`] and
/// surface it through [`Controller::as_updatable`].
pub trait Updatable {
    /// Called once per frame while the owning state is active and the
    /// controller is not suspended.
    fn update(&mut self, dt: f32);
}

/// A state-scoped helper with lifecycle hooks.
///
/// Controllers bridge events to actions; they do not own game data.
/// Suspension defaults to unsubscribing (and resume to resubscribing);
/// override [`Controller::on_suspend`] / [`Controller::on_resume`] to
/// keep subscriptions alive through a pause instead.
pub trait Controller: Any {
    /// Registers event handlers. Called once by `subscribe_all`.
    fn subscribe(&mut self);

    /// Removes event handlers. Called by `unsubscribe_all` and `clear`.
    fn unsubscribe(&mut self);

    /// Pause-state hook; the default drops subscriptions.
    fn on_suspend(&mut self) {
        self.unsubscribe();
    }

    /// Resume hook; the default restores subscriptions.
    fn on_resume(&mut self) {
        self.subscribe();
    }

    /// The update capability, when this controller has one. Implementors
    /// that are [`Updatable`] return `Some(self)`.
    fn as_updatable(&mut self) -> Option<&mut dyn Updatable> {
        None
    }

    /// Upcast for type-keyed retrieval.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for type-keyed retrieval.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct ControllerEntry {
    controller: Box<dyn Controller>,
    // Capability record, probed once at insertion.
    updatable: bool,
    subscribed: bool,
    suspended: bool,
}

/// Type-keyed container dispatching controller lifecycles.
#[derive(Default)]
pub struct ControllerRegistry {
    entries: Vec<ControllerEntry>,
    by_type: HashMap<TypeId, usize>,
}

impl ControllerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a controller, returning a reference to it.
    ///
    /// Idempotent: when a controller of the same type is already
    /// registered, the new instance is dropped and the existing one is
    /// returned.
    pub fn add<T: Controller>(&mut self, controller: T) -> &mut T {
        let type_id = TypeId::of::<T>();
        let index = match self.by_type.get(&type_id) {
            Some(&index) => index,
            None => {
                let mut boxed: Box<dyn Controller> = Box::new(controller);
                let updatable = boxed.as_updatable().is_some();
                let index = self.entries.len();
                self.entries.push(ControllerEntry {
                    controller: boxed,
                    updatable,
                    subscribed: false,
                    suspended: false,
                });
                self.by_type.insert(type_id, index);
                index
            }
        };
        self.entries[index]
            .controller
            .as_any_mut()
            .downcast_mut::<T>()
            .unwrap_or_else(|| unreachable!("type map and storage out of sync"))
    }

    /// Retrieves a controller by type; `None` when absent.
    #[must_use]
    pub fn get<T: Controller>(&self) -> Option<&T> {
        let &index = self.by_type.get(&TypeId::of::<T>())?;
        self.entries[index].controller.as_any().downcast_ref::<T>()
    }

    /// Mutable retrieval by type.
    pub fn get_mut<T: Controller>(&mut self) -> Option<&mut T> {
        let &index = self.by_type.get(&TypeId::of::<T>())?;
        self.entries[index].controller.as_any_mut().downcast_mut::<T>()
    }

    /// True when a controller of this type is registered.
    #[must_use]
    pub fn has<T: Controller>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    /// Subscribes every controller that is not already subscribed.
    pub fn subscribe_all(&mut self) {
        for entry in &mut self.entries {
            if !entry.subscribed {
                entry.controller.subscribe();
                entry.subscribed = true;
            }
        }
    }

    /// Unsubscribes every subscribed controller.
    pub fn unsubscribe_all(&mut self) {
        for entry in &mut self.entries {
            if entry.subscribed {
                entry.controller.unsubscribe();
                entry.subscribed = false;
            }
        }
    }

    /// Suspends every running controller (pause state pushed).
    pub fn suspend_all(&mut self) {
        for entry in &mut self.entries {
            if !entry.suspended {
                entry.controller.on_suspend();
                entry.suspended = true;
            }
        }
    }

    /// Resumes every suspended controller (pause state popped).
    pub fn resume_all(&mut self) {
        for entry in &mut self.entries {
            if entry.suspended {
                entry.controller.on_resume();
                entry.suspended = false;
            }
        }
    }

    /// Updates every controller that opted into per-frame updates and is
    /// not currently suspended.
    pub fn update_all(&mut self, dt: f32) {
        for entry in &mut self.entries {
            if entry.updatable && !entry.suspended {
                if let Some(updatable) = entry.controller.as_updatable() {
                    updatable.update(dt);
                }
            }
        }
    }

    /// Registered controller count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no controllers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unsubscribes and destroys every controller.
    pub fn clear(&mut self) {
        self.unsubscribe_all();
        debug!(count = self.entries.len(), "controller registry cleared");
        self.entries.clear();
        self.by_type.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Counters {
        subscribes: AtomicU32,
        unsubscribes: AtomicU32,
        updates: AtomicU32,
    }

    struct WeatherController {
        counters: Arc<Counters>,
    }

    impl Controller for WeatherController {
        fn subscribe(&mut self) {
            self.counters.subscribes.fetch_add(1, Ordering::Relaxed);
        }
        fn unsubscribe(&mut self) {
            self.counters.unsubscribes.fetch_add(1, Ordering::Relaxed);
        }
        fn as_updatable(&mut self) -> Option<&mut dyn Updatable> {
            Some(self)
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    impl Updatable for WeatherController {
        fn update(&mut self, _dt: f32) {
            self.counters.updates.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Event-only controller: no update capability.
    struct TradeController {
        counters: Arc<Counters>,
    }

    impl Controller for TradeController {
        fn subscribe(&mut self) {
            self.counters.subscribes.fetch_add(1, Ordering::Relaxed);
        }
        fn unsubscribe(&mut self) {
            self.counters.unsubscribes.fetch_add(1, Ordering::Relaxed);
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn test_add_is_idempotent() {
        let counters = Arc::new(Counters::default());
        let mut registry = ControllerRegistry::new();
        registry.add(WeatherController { counters: Arc::clone(&counters) });
        registry.add(WeatherController { counters: Arc::clone(&counters) });
        assert_eq!(registry.len(), 1);
        assert!(registry.has::<WeatherController>());
        assert!(registry.get::<TradeController>().is_none());
    }

    #[test]
    fn test_update_only_reaches_updatables() {
        let counters = Arc::new(Counters::default());
        let mut registry = ControllerRegistry::new();
        registry.add(WeatherController { counters: Arc::clone(&counters) });
        registry.add(TradeController { counters: Arc::clone(&counters) });

        registry.update_all(0.016);
        registry.update_all(0.016);
        assert_eq!(counters.updates.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_double_subscribe_is_noop() {
        let counters = Arc::new(Counters::default());
        let mut registry = ControllerRegistry::new();
        registry.add(TradeController { counters: Arc::clone(&counters) });

        registry.subscribe_all();
        registry.subscribe_all();
        assert_eq!(counters.subscribes.load(Ordering::Relaxed), 1);

        registry.unsubscribe_all();
        registry.unsubscribe_all();
        assert_eq!(counters.unsubscribes.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_suspend_gates_update_and_is_idempotent() {
        let counters = Arc::new(Counters::default());
        let mut registry = ControllerRegistry::new();
        registry.add(WeatherController { counters: Arc::clone(&counters) });
        registry.subscribe_all();

        registry.suspend_all();
        registry.suspend_all();
        // Default suspend behavior unsubscribed exactly once.
        assert_eq!(counters.unsubscribes.load(Ordering::Relaxed), 1);

        registry.update_all(0.016);
        assert_eq!(counters.updates.load(Ordering::Relaxed), 0);

        registry.resume_all();
        registry.resume_all();
        assert_eq!(counters.subscribes.load(Ordering::Relaxed), 2);

        registry.update_all(0.016);
        assert_eq!(counters.updates.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_clear_unsubscribes_first() {
        let counters = Arc::new(Counters::default());
        let mut registry = ControllerRegistry::new();
        registry.add(TradeController { counters: Arc::clone(&counters) });
        registry.subscribe_all();

        registry.clear();
        assert_eq!(counters.unsubscribes.load(Ordering::Relaxed), 1);
        assert!(registry.is_empty());
        assert!(!registry.has::<TradeController>());
    }

    #[test]
    fn test_get_mut_returns_same_instance() {
        let counters = Arc::new(Counters::default());
        let mut registry = ControllerRegistry::new();
        registry.add(WeatherController { counters: Arc::clone(&counters) });

        let weather = registry.get_mut::<WeatherController>().unwrap();
        weather.update(0.016);
        assert_eq!(counters.updates.load(Ordering::Relaxed), 1);
    }
}
