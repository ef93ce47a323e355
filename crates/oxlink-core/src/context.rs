//! Configuration handle shared by every constructor in the crate
//!
//! A [`Context`] carries the plug points the engine consults while it builds
//! and runs pipelines: the mutex provider guarding the handler registries,
//! an optional parallel scheduler, the error sink, the default adaptation
//! state and the alarm codes used by gamut checking.
//!
//! Cloning a `Context` is cheap and shares the registries. [`Context::derive`]
//! produces an independent copy whose registries can be changed without
//! affecting the parent.
//!
//! # Example
//!
//! ```
//! use oxlink_core::Context;
//!
//! let ctx = Context::new()
//!     .with_adaptation_state(0.5)
//!     .with_alarm_codes([0xffff, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
//! assert_eq!(ctx.adaptation_state(), 0.5);
//! ```

use std::fmt;
use std::sync::{Arc, Condvar, Mutex};

use crate::error::{Error, ErrorCode};
use crate::icc::Signature;
use crate::icc::tags::{ElementHandler, TagDescriptor, TagTypeHandler};
use crate::intent::{Intent, IntentEntry, IntentHandler};
use crate::registry::TwoTierRegistry;
use crate::transform::ParallelScheduler;

/// Maximum number of channels any pixel carries through a transform
pub const MAX_CHANNELS: usize = 16;

/// Callback receiving every error signalled through a context
pub type ErrorHandler = Arc<dyn Fn(ErrorCode, &str) + Send + Sync>;

/// A lock created by a [`MutexProvider`]
pub trait ContextMutex: Send + Sync {
    fn lock(&self);
    fn unlock(&self);
}

/// Factory for the locks guarding context-level mutable state
///
/// Dropping the returned box destroys the lock.
pub trait MutexProvider: Send + Sync {
    fn create(&self) -> Box<dyn ContextMutex>;
}

/// Default provider backed by a process mutex
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessMutexProvider;

impl MutexProvider for ProcessMutexProvider {
    fn create(&self) -> Box<dyn ContextMutex> {
        Box::new(ProcessMutex::default())
    }
}

/// Binary lock with explicit lock/unlock calls
#[derive(Default)]
struct ProcessMutex {
    locked: Mutex<bool>,
    released: Condvar,
}

impl ContextMutex for ProcessMutex {
    fn lock(&self) {
        let mut locked = self.locked.lock().unwrap_or_else(|e| e.into_inner());
        while *locked {
            locked = self
                .released
                .wait(locked)
                .unwrap_or_else(|e| e.into_inner());
        }
        *locked = true;
    }

    fn unlock(&self) {
        let mut locked = self.locked.lock().unwrap_or_else(|e| e.into_inner());
        *locked = false;
        self.released.notify_one();
    }
}

/// Value guarded by a pluggable [`ContextMutex`]
///
/// The pluggable lock is a hook around every access; exclusivity itself comes
/// from the inner process mutex, so a provider whose lock does nothing cannot
/// break it.
pub(crate) struct Guarded<T> {
    hook: Box<dyn ContextMutex>,
    value: Mutex<T>,
}

struct UnlockOnDrop<'a>(&'a dyn ContextMutex);

impl Drop for UnlockOnDrop<'_> {
    fn drop(&mut self) {
        self.0.unlock();
    }
}

impl<T> Guarded<T> {
    pub(crate) fn new(hook: Box<dyn ContextMutex>, value: T) -> Self {
        Self {
            hook,
            value: Mutex::new(value),
        }
    }

    /// Run `f` with exclusive access. `f` must not re-enter the same guard.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        self.hook.lock();
        let _unlock = UnlockOnDrop(self.hook.as_ref());
        let mut value = self.value.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut value)
    }
}

/// Handler tables owned by a context
#[derive(Clone)]
pub(crate) struct Registries {
    pub tag_types: TwoTierRegistry<Signature, Arc<dyn TagTypeHandler>>,
    pub elements: TwoTierRegistry<Signature, Arc<dyn ElementHandler>>,
    pub tags: TwoTierRegistry<Signature, TagDescriptor>,
    pub intents: TwoTierRegistry<Intent, IntentEntry>,
}

impl Registries {
    fn builtin() -> Self {
        Self {
            tag_types: TwoTierRegistry::with_builtins(
                crate::icc::tags::builtin_type_handlers()
                    .into_iter()
                    .map(|h| (h.signature(), h)),
            ),
            elements: TwoTierRegistry::with_builtins(
                crate::icc::tags::builtin_element_handlers()
                    .into_iter()
                    .map(|h| (h.signature(), h)),
            ),
            tags: TwoTierRegistry::with_builtins(crate::icc::tags::builtin_tag_descriptors()),
            intents: TwoTierRegistry::with_builtins(
                crate::intent::builtin_intents()
                    .into_iter()
                    .map(|e| (e.intent, e)),
            ),
        }
    }
}

/// Engine configuration
#[derive(Clone)]
pub struct Context {
    mutex_provider: Arc<dyn MutexProvider>,
    scheduler: Option<Arc<dyn ParallelScheduler>>,
    error_handler: Option<ErrorHandler>,
    adaptation_state: f64,
    alarm_codes: [u16; MAX_CHANNELS],
    registries: Arc<Guarded<Registries>>,
}

impl Context {
    /// Create a context with built-in handlers and the process mutex
    pub fn new() -> Self {
        let provider: Arc<dyn MutexProvider> = Arc::new(ProcessMutexProvider);
        let registries = Arc::new(Guarded::new(provider.create(), Registries::builtin()));
        let mut alarm_codes = [0u16; MAX_CHANNELS];
        alarm_codes[..3].fill(0x7F00);
        Self {
            mutex_provider: provider,
            scheduler: None,
            error_handler: None,
            adaptation_state: 1.0,
            alarm_codes,
            registries,
        }
    }

    /// Independent copy: same settings, registries copied under a fresh lock
    pub fn derive(&self) -> Self {
        let snapshot = self.registries.with(|r| r.clone());
        Self {
            registries: Arc::new(Guarded::new(self.mutex_provider.create(), snapshot)),
            ..self.clone()
        }
    }

    /// Replace the mutex provider; registries move under a lock it creates
    pub fn with_mutex_provider(mut self, provider: Arc<dyn MutexProvider>) -> Self {
        let snapshot = self.registries.with(|r| r.clone());
        self.registries = Arc::new(Guarded::new(provider.create(), snapshot));
        self.mutex_provider = provider;
        self
    }

    /// Hand batch execution to `scheduler`
    pub fn with_scheduler(mut self, scheduler: Arc<dyn ParallelScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Install an error sink
    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Default adaptation state for absolute colorimetric links, clamped to [0, 1]
    pub fn with_adaptation_state(mut self, state: f64) -> Self {
        self.adaptation_state = if state.is_nan() {
            1.0
        } else {
            state.clamp(0.0, 1.0)
        };
        self
    }

    /// Output values written for out-of-gamut pixels
    pub fn with_alarm_codes(mut self, codes: [u16; MAX_CHANNELS]) -> Self {
        self.alarm_codes = codes;
        self
    }

    pub fn scheduler(&self) -> Option<&Arc<dyn ParallelScheduler>> {
        self.scheduler.as_ref()
    }

    pub fn adaptation_state(&self) -> f64 {
        self.adaptation_state
    }

    pub fn alarm_codes(&self) -> [u16; MAX_CHANNELS] {
        self.alarm_codes
    }

    /// Report `err` to the installed sink and hand it back for propagation
    pub fn signal(&self, err: Error) -> Error {
        let message = err.to_string();
        match &self.error_handler {
            Some(handler) => handler(err.code(), &message),
            None => tracing::warn!(code = ?err.code(), "{message}"),
        }
        err
    }

    pub(crate) fn registries<R>(&self, f: impl FnOnce(&mut Registries) -> R) -> R {
        self.registries.with(f)
    }

    /// Replace the plugin tier of tag type handlers; an empty list restores built-ins
    pub fn register_tag_types(&self, handlers: Vec<Arc<dyn TagTypeHandler>>) {
        self.registries(|r| {
            r.tag_types
                .set_plugins(handlers.into_iter().map(|h| (h.signature(), h)))
        });
    }

    /// Replace the plugin tier of MPE element handlers; an empty list restores built-ins
    pub fn register_elements(&self, handlers: Vec<Arc<dyn ElementHandler>>) {
        self.registries(|r| {
            r.elements
                .set_plugins(handlers.into_iter().map(|h| (h.signature(), h)))
        });
    }

    /// Replace the plugin tier of tag descriptors; an empty list restores built-ins
    pub fn register_tags(&self, tags: Vec<(Signature, TagDescriptor)>) {
        self.registries(|r| r.tags.set_plugins(tags));
    }

    /// Replace the plugin tier of rendering intents; an empty list restores built-ins
    pub fn register_intents(&self, intents: Vec<(Intent, &'static str, Arc<dyn IntentHandler>)>) {
        self.registries(|r| {
            r.intents.set_plugins(intents.into_iter().map(|(intent, name, handler)| {
                (
                    intent,
                    IntentEntry {
                        intent,
                        name,
                        handler,
                    },
                )
            }))
        });
    }

    pub(crate) fn tag_type_handler(&self, sig: Signature) -> Option<Arc<dyn TagTypeHandler>> {
        self.registries(|r| r.tag_types.get(&sig).cloned())
    }

    pub(crate) fn element_handler(&self, sig: Signature) -> Option<Arc<dyn ElementHandler>> {
        self.registries(|r| r.elements.get(&sig).cloned())
    }

    pub(crate) fn tag_descriptor(&self, sig: Signature) -> Option<TagDescriptor> {
        self.registries(|r| r.tags.get(&sig).cloned())
    }

    pub(crate) fn intent_entry(&self, intent: Intent) -> Option<IntentEntry> {
        self.registries(|r| r.intents.get(&intent).cloned())
    }

    /// Supported intents with their names, plugins first
    pub fn supported_intents(&self) -> Vec<(Intent, &'static str)> {
        self.registries(|r| r.intents.values().map(|e| (e.intent, e.name)).collect())
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("adaptation_state", &self.adaptation_state)
            .field("alarm_codes", &self.alarm_codes)
            .field("scheduler", &self.scheduler.is_some())
            .field("error_handler", &self.error_handler.is_some())
            .finish_non_exhaustive()
    }
}
