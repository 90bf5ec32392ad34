//! Model lifecycle management
//!
//! [`ModelManager`] owns the current [`ModelResource`] and is the only
//! component that installs or retires one.
//!
//! - Readers clone the current `Arc` under a short read lock and hold it for
//!   one prediction.
//! - A reload builds the replacement while the old resource keeps serving,
//!   swaps the pointer under the write lock, then waits for every reader of
//!   the old resource to finish before releasing it.
//! - Status reads an atomic and never touches either lock.

use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};
use serde::Serialize;

use crate::engine::resource::ModelResource;
use crate::engine::{AccessError, LoadError};
use crate::loader::ResourceLoader;

/// Default interval between drain progress checks
const DEFAULT_DRAIN_POLL: Duration = Duration::from_millis(100);

/// Lifecycle state of the current model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// No resource installed
    Unloaded,
    /// A resource is installed and serving
    Loaded,
    /// A replacement is being built; the installed resource keeps serving
    Reloading,
    /// Shut down; every further operation fails
    Closed,
}

impl LifecycleState {
    fn as_u8(self) -> u8 {
        match self {
            LifecycleState::Unloaded => 0,
            LifecycleState::Loaded => 1,
            LifecycleState::Reloading => 2,
            LifecycleState::Closed => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => LifecycleState::Loaded,
            2 => LifecycleState::Reloading,
            3 => LifecycleState::Closed,
            _ => LifecycleState::Unloaded,
        }
    }

    /// Whether predictions can be served in this state
    pub fn is_ready(self) -> bool {
        matches!(self, LifecycleState::Loaded | LifecycleState::Reloading)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LifecycleState::Unloaded => "unloaded",
            LifecycleState::Loaded => "loaded",
            LifecycleState::Reloading => "reloading",
            LifecycleState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Wakes a draining writer whenever a reader lets go of a resource
#[derive(Default)]
struct DrainSignal {
    lock: Mutex<()>,
    released: Condvar,
}

impl DrainSignal {
    fn notify(&self) {
        let _lock = self.lock.lock();
        self.released.notify_all();
    }
}

struct DrainNotifier<'a>(&'a DrainSignal);

impl Drop for DrainNotifier<'_> {
    fn drop(&mut self) {
        self.0.notify();
    }
}

/// Scoped borrow of the current model resource.
///
/// The resource stays valid and unchanged until the guard is dropped, even
/// if a reload swaps in a replacement meanwhile.
pub struct ResourceGuard<'a> {
    // Field order matters: the Arc must be dropped before the notifier runs.
    resource: Arc<ModelResource>,
    _notifier: DrainNotifier<'a>,
}

impl Deref for ResourceGuard<'_> {
    type Target = ModelResource;

    fn deref(&self) -> &ModelResource {
        &self.resource
    }
}

/// Owner of the current model resource
pub struct ModelManager {
    loader: Arc<dyn ResourceLoader>,
    current: RwLock<Option<Arc<ModelResource>>>,
    state: AtomicU8,
    /// Held by load, reload and shutdown; at most one writer at a time
    writer: Mutex<()>,
    drain: DrainSignal,
    last_generation: AtomicU64,
    drain_poll: Duration,
}

impl ModelManager {
    /// Create an unloaded manager. Nothing is read from disk until
    /// [`ModelManager::load`] is called.
    pub fn new(loader: Arc<dyn ResourceLoader>) -> Self {
        Self {
            loader,
            current: RwLock::new(None),
            state: AtomicU8::new(LifecycleState::Unloaded.as_u8()),
            writer: Mutex::new(()),
            drain: DrainSignal::default(),
            last_generation: AtomicU64::new(0),
            drain_poll: DEFAULT_DRAIN_POLL,
        }
    }

    /// Set how often a draining writer re-checks for stragglers
    pub fn with_drain_poll(mut self, poll: Duration) -> Self {
        self.drain_poll = poll;
        self
    }

    /// Current lifecycle state; never blocks
    pub fn status(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether a resource is installed and serving; never blocks
    pub fn is_ready(&self) -> bool {
        self.status().is_ready()
    }

    /// Generation of the installed resource, if any
    pub fn current_generation(&self) -> Option<u64> {
        self.current.read().as_ref().map(|r| r.generation())
    }

    /// Description of where resources are loaded from
    pub fn source(&self) -> String {
        self.loader.describe()
    }

    fn set_state(&self, state: LifecycleState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Load the model if none is installed.
    ///
    /// Missing files leave the manager `Unloaded` and are not fatal. Calling
    /// this while a model is already loaded does nothing.
    pub fn load(&self) -> Result<(), LoadError> {
        let _writer = self.writer.try_lock().ok_or(LoadError::InProgress)?;

        match self.status() {
            LifecycleState::Closed => Err(LoadError::Closed),
            LifecycleState::Loaded | LifecycleState::Reloading => Ok(()),
            LifecycleState::Unloaded => self.install_first(),
        }
    }

    /// Re-read the resource files and atomically replace the current model.
    ///
    /// The previous model keeps serving while the replacement is built and is
    /// released only after its in-flight predictions finish. On failure the
    /// previous model is left untouched. When nothing is loaded this behaves
    /// like [`ModelManager::load`].
    pub fn reload(&self) -> Result<(), LoadError> {
        let _writer = self.writer.try_lock().ok_or(LoadError::InProgress)?;

        match self.status() {
            LifecycleState::Closed => return Err(LoadError::Closed),
            LifecycleState::Unloaded => return self.install_first(),
            LifecycleState::Loaded | LifecycleState::Reloading => {}
        }

        tracing::info!("Reloading model ({})", self.loader.describe());
        self.set_state(LifecycleState::Reloading);

        let resource = match self.build() {
            Ok(resource) => resource,
            Err(e) => {
                self.set_state(LifecycleState::Loaded);
                return Err(e);
            }
        };
        let generation = resource.generation();

        let previous = self.current.write().replace(Arc::new(resource));
        self.set_state(LifecycleState::Loaded);
        tracing::info!("Model generation {} installed", generation);

        if let Some(old) = previous {
            self.drain_and_release(old);
        }
        Ok(())
    }

    /// Borrow the current resource for the duration of `f`.
    pub fn with_current<R>(&self, f: impl FnOnce(&ModelResource) -> R) -> Result<R, AccessError> {
        let guard = self.acquire()?;
        Ok(f(&*guard))
    }

    /// Take a scoped borrow of the current resource.
    ///
    /// Prefer [`ModelManager::with_current`]; a long-lived guard delays
    /// the release of a retired resource.
    pub fn acquire(&self) -> Result<ResourceGuard<'_>, AccessError> {
        if self.status() == LifecycleState::Closed {
            return Err(AccessError::Closed);
        }

        let current = self.current.read();
        match current.as_ref() {
            Some(resource) => Ok(ResourceGuard {
                resource: Arc::clone(resource),
                _notifier: DrainNotifier(&self.drain),
            }),
            None if self.status() == LifecycleState::Closed => Err(AccessError::Closed),
            None => Err(AccessError::NotLoaded),
        }
    }

    /// Release the current model and refuse all further work.
    ///
    /// Waits for an in-flight reload and for every in-flight prediction.
    pub fn shutdown(&self) {
        let _writer = self.writer.lock();

        if self.status() == LifecycleState::Closed {
            return;
        }
        self.set_state(LifecycleState::Closed);

        let previous = self.current.write().take();
        if let Some(old) = previous {
            self.drain_and_release(old);
        }
        tracing::info!("Model manager closed");
    }

    /// Build and install the first resource. Caller holds the writer lock.
    fn install_first(&self) -> Result<(), LoadError> {
        let resource = self.build()?;
        let generation = resource.generation();

        *self.current.write() = Some(Arc::new(resource));
        self.set_state(LifecycleState::Loaded);
        tracing::info!(
            "Model generation {} loaded ({})",
            generation,
            self.loader.describe()
        );
        Ok(())
    }

    fn build(&self) -> Result<ModelResource, LoadError> {
        let start = Instant::now();
        match self.loader.load() {
            Ok(parts) => {
                let generation = self.last_generation.fetch_add(1, Ordering::AcqRel) + 1;
                tracing::debug!(
                    "Built model generation {} in {:?}",
                    generation,
                    start.elapsed()
                );
                Ok(ModelResource::new(parts, generation))
            }
            Err(e @ LoadError::ResourcesMissing { .. }) => {
                tracing::warn!(
                    "{}. Prediction endpoints stay unavailable until the files are provided.",
                    e
                );
                Err(e)
            }
            Err(e) => {
                tracing::error!("Model load failed: {}", e);
                Err(e)
            }
        }
    }

    /// Wait until `old` has no readers left, then release it.
    ///
    /// The pointer has already been swapped, so no new reader can reach it.
    fn drain_and_release(&self, old: Arc<ModelResource>) {
        let generation = old.generation();
        let start = Instant::now();

        {
            let mut lock = self.drain.lock.lock();
            while Arc::strong_count(&old) > 1 {
                let waited = self.drain.released.wait_for(&mut lock, self.drain_poll);
                if waited.timed_out() {
                    tracing::debug!(
                        "Draining model generation {}: {} reader(s) still active",
                        generation,
                        Arc::strong_count(&old) - 1
                    );
                }
            }
        }

        tracing::debug!(
            "Model generation {} drained in {:?}",
            generation,
            start.elapsed()
        );

        match Arc::try_unwrap(old) {
            Ok(resource) => resource.release(),
            Err(_) => tracing::warn!(
                "Model generation {} still referenced after drain",
                generation
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::MockLoader;
    use std::sync::atomic::Ordering;

    fn manager_with(loader: &Arc<MockLoader>) -> ModelManager {
        ModelManager::new(loader.clone()).with_drain_poll(Duration::from_millis(10))
    }

    #[test]
    fn test_new_manager_is_unloaded() {
        let loader = Arc::new(MockLoader::new([0.1, 2.3]));
        let manager = manager_with(&loader);

        assert_eq!(manager.status(), LifecycleState::Unloaded);
        assert!(!manager.is_ready());
        assert_eq!(
            manager.with_current(|_| ()).unwrap_err(),
            AccessError::NotLoaded
        );
        assert_eq!(loader.counters.builds.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_load_missing_resources_is_recoverable() {
        let loader = Arc::new(MockLoader::new([0.1, 2.3]));
        loader.set_missing(true);
        let manager = manager_with(&loader);

        assert!(matches!(
            manager.load(),
            Err(LoadError::ResourcesMissing { .. })
        ));
        assert_eq!(manager.status(), LifecycleState::Unloaded);

        loader.set_missing(false);
        manager.load().unwrap();
        assert_eq!(manager.status(), LifecycleState::Loaded);
        assert_eq!(manager.current_generation(), Some(1));
    }

    #[test]
    fn test_load_when_loaded_is_noop() {
        let loader = Arc::new(MockLoader::new([0.1, 2.3]));
        let manager = manager_with(&loader);

        manager.load().unwrap();
        manager.load().unwrap();
        assert_eq!(loader.counters.builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reload_swaps_generation_and_releases_old() {
        let loader = Arc::new(MockLoader::new([0.1, 2.3]));
        let manager = manager_with(&loader);
        manager.load().unwrap();

        manager.reload().unwrap();
        assert_eq!(manager.status(), LifecycleState::Loaded);
        assert_eq!(manager.current_generation(), Some(2));
        // Only the current session + tokenizer remain
        assert_eq!(loader.counters.outstanding(), 2);
    }

    #[test]
    fn test_reload_when_unloaded_loads() {
        let loader = Arc::new(MockLoader::new([0.1, 2.3]));
        let manager = manager_with(&loader);

        manager.reload().unwrap();
        assert_eq!(manager.status(), LifecycleState::Loaded);
        assert_eq!(manager.current_generation(), Some(1));
    }

    #[test]
    fn test_reload_missing_keeps_previous_resource() {
        let loader = Arc::new(MockLoader::new([0.1, 2.3]));
        let manager = manager_with(&loader);
        manager.load().unwrap();

        loader.set_missing(true);
        assert!(matches!(
            manager.reload(),
            Err(LoadError::ResourcesMissing { .. })
        ));
        assert_eq!(manager.status(), LifecycleState::Loaded);
        assert_eq!(manager.with_current(|r| r.generation()).unwrap(), 1);
    }

    #[test]
    fn test_reload_malformed_keeps_previous_resource() {
        let loader = Arc::new(MockLoader::new([0.1, 2.3]));
        let manager = manager_with(&loader);
        manager.load().unwrap();

        loader.set_malformed(true);
        assert!(matches!(
            manager.reload(),
            Err(LoadError::ConstructionFailed(_))
        ));
        assert_eq!(manager.status(), LifecycleState::Loaded);
        assert_eq!(manager.current_generation(), Some(1));
        assert_eq!(loader.counters.outstanding(), 2);
    }

    #[test]
    fn test_repeated_reloads_do_not_leak() {
        let loader = Arc::new(MockLoader::new([0.1, 2.3]));
        let manager = manager_with(&loader);
        manager.load().unwrap();

        manager.reload().unwrap();
        manager.reload().unwrap();

        assert_eq!(loader.counters.acquired.load(Ordering::SeqCst), 6);
        assert_eq!(loader.counters.released.load(Ordering::SeqCst), 4);

        manager.shutdown();
        assert_eq!(loader.counters.outstanding(), 0);
    }

    #[test]
    fn test_reload_waits_for_in_flight_reader() {
        let loader = Arc::new(MockLoader::new([0.1, 2.3]));
        let manager = manager_with(&loader);
        manager.load().unwrap();

        std::thread::scope(|s| {
            let reader = s.spawn(|| {
                manager
                    .with_current(|r| {
                        let before = r.generation();
                        std::thread::sleep(Duration::from_millis(200));
                        // The old resource must not be released while borrowed
                        let released = loader.counters.released.load(Ordering::SeqCst);
                        (before, r.generation(), released)
                    })
                    .unwrap()
            });

            std::thread::sleep(Duration::from_millis(50));
            manager.reload().unwrap();

            let (before, after, released) = reader.join().unwrap();
            assert_eq!(before, 1);
            assert_eq!(after, 1);
            assert_eq!(released, 0);
        });

        // New readers see the replacement; old parts released after the drain
        assert_eq!(manager.current_generation(), Some(2));
        assert_eq!(loader.counters.released.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_concurrent_reload_is_rejected() {
        let loader =
            Arc::new(MockLoader::new([0.1, 2.3]).with_build_delay(Duration::from_millis(200)));
        let manager = manager_with(&loader);
        manager.load().unwrap();

        std::thread::scope(|s| {
            let first = s.spawn(|| manager.reload());

            std::thread::sleep(Duration::from_millis(50));
            assert_eq!(manager.status(), LifecycleState::Reloading);
            assert!(manager.is_ready());
            // Old resource keeps serving while the replacement is built
            assert_eq!(manager.with_current(|r| r.generation()).unwrap(), 1);
            assert!(matches!(manager.reload(), Err(LoadError::InProgress)));

            first.join().unwrap().unwrap();
        });

        assert_eq!(manager.current_generation(), Some(2));
    }

    #[test]
    fn test_shutdown_closes_manager() {
        let loader = Arc::new(MockLoader::new([0.1, 2.3]));
        let manager = manager_with(&loader);
        manager.load().unwrap();

        manager.shutdown();
        assert_eq!(manager.status(), LifecycleState::Closed);
        assert!(!manager.is_ready());
        assert_eq!(loader.counters.outstanding(), 0);

        assert_eq!(manager.with_current(|_| ()).unwrap_err(), AccessError::Closed);
        assert!(matches!(manager.load(), Err(LoadError::Closed)));
        assert!(matches!(manager.reload(), Err(LoadError::Closed)));

        // Idempotent
        manager.shutdown();
        assert_eq!(manager.status(), LifecycleState::Closed);
    }

    #[test]
    fn test_shutdown_unloaded_manager() {
        let loader = Arc::new(MockLoader::new([0.1, 2.3]));
        let manager = manager_with(&loader);

        manager.shutdown();
        assert_eq!(manager.status(), LifecycleState::Closed);
        assert_eq!(manager.acquire().err(), Some(AccessError::Closed));
    }

    #[test]
    fn test_state_round_trips_through_u8() {
        for state in [
            LifecycleState::Unloaded,
            LifecycleState::Loaded,
            LifecycleState::Reloading,
            LifecycleState::Closed,
        ] {
            assert_eq!(LifecycleState::from_u8(state.as_u8()), state);
        }
        assert_eq!(LifecycleState::Reloading.to_string(), "reloading");
    }
}
