//! Backend manager.
//!
//! `BackendManager` owns at most one converter context per scheme family and
//! the debounce state that defers saving learned data. Contexts are created
//! on first use, re-configured on every allocation, and finalized once at
//! teardown.
//!
//! Saving is debounced: `notify_modified` records the time of the change and
//! arms a repeating timeout (interval = save delay) if none is armed. Each
//! tick measures elapsed time from the reference point chosen by
//! `FlushPolicy` and saves once it reaches the delay. With the default
//! `FlushPolicy::Idle` the reference point is the latest modification, so a
//! burst of modifications arriving faster than the delay keeps postponing the
//! save until the burst ends.
//!
//! `BackendSlot` holds the one manager of a process and refuses a second
//! initialization.

use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{
    BackendConfig, ConfigSnapshot, ConfigSource, FlushPolicy, DEFAULT_SAVE_TIMEOUT_SECS,
};
use crate::converter::{ConverterContext, ConverterLibrary};
use crate::error::BackendError;
use crate::paths;
use crate::scheme::SchemeFamily;
use crate::timer::{Clock, EventLoop, SourceId};

/// Static settings of a manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    /// System-wide converter data directory
    pub data_dir: PathBuf,
    /// Root for per-user directories; `None` disables them
    pub cache_root: Option<PathBuf>,
    /// Debounce delay and tick interval
    pub save_timeout: Duration,
    pub flush_policy: FlushPolicy,
}

impl BackendSettings {
    /// Settings from a loaded configuration. The cache root falls back to
    /// `$HOME/.cache`.
    pub fn from_config(config: &BackendConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            cache_root: config
                .cache_dir
                .clone()
                .or_else(paths::default_cache_root),
            save_timeout: config.save_timeout(),
            flush_policy: config.flush_policy,
        }
    }
}

/// An instance allocated by the manager, tagged with its owning family.
#[derive(Debug)]
pub struct ConverterInstance<I> {
    family: SchemeFamily,
    inner: I,
}

impl<I> ConverterInstance<I> {
    pub fn family(&self) -> SchemeFamily {
        self.family
    }

    pub fn get(&self) -> &I {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut I {
        &mut self.inner
    }
}

type Instance<L> = <<L as ConverterLibrary>::Context as ConverterContext>::Instance;

/// Owner of the converter contexts and the debounced save timer.
pub struct BackendManager<L: ConverterLibrary> {
    library: L,
    settings: BackendSettings,
    config: Box<dyn ConfigSource>,
    event_loop: Box<dyn EventLoop>,
    clock: Box<dyn Clock>,

    contexts: [Option<L::Context>; 2],
    outstanding: [usize; 2],

    /// Clock reading at the latest modification
    last_modified: Duration,
    /// Clock reading at the first modification since the last save
    first_unsaved: Option<Duration>,
    timeout_id: Option<SourceId>,
    torn_down: bool,
}

impl<L: ConverterLibrary> BackendManager<L> {
    /// A zero `save_timeout` is replaced by the default delay.
    pub fn new(
        library: L,
        mut settings: BackendSettings,
        config: Box<dyn ConfigSource>,
        event_loop: Box<dyn EventLoop>,
        clock: Box<dyn Clock>,
    ) -> Self {
        if settings.save_timeout.is_zero() {
            tracing::warn!(
                default_secs = DEFAULT_SAVE_TIMEOUT_SECS,
                "zero save timeout, using the default"
            );
            settings.save_timeout = Duration::from_secs(DEFAULT_SAVE_TIMEOUT_SECS);
        }
        let now = clock.now();
        Self {
            library,
            settings,
            config,
            event_loop,
            clock,
            contexts: [None, None],
            outstanding: [0, 0],
            last_modified: now,
            first_unsaved: None,
            timeout_id: None,
            torn_down: false,
        }
    }

    pub fn settings(&self) -> &BackendSettings {
        &self.settings
    }

    pub fn library(&self) -> &L {
        &self.library
    }

    pub fn has_context(&self, family: SchemeFamily) -> bool {
        self.contexts[family.index()].is_some()
    }

    pub fn context(&self, family: SchemeFamily) -> Option<&L::Context> {
        self.contexts[family.index()].as_ref()
    }

    /// Instances handed out and not yet released.
    pub fn outstanding_instances(&self, family: SchemeFamily) -> usize {
        self.outstanding[family.index()]
    }

    /// Whether a debounce timeout is armed.
    pub fn is_save_pending(&self) -> bool {
        self.timeout_id.is_some()
    }

    pub fn pending_source(&self) -> Option<SourceId> {
        self.timeout_id
    }

    /// Allocate a converter instance for `family`.
    ///
    /// The family's context is created on first use. The current
    /// configuration is applied on every call.
    pub fn allocate_instance(
        &mut self,
        family: SchemeFamily,
    ) -> Result<ConverterInstance<Instance<L>>, BackendError> {
        if self.contexts[family.index()].is_none() {
            let user_dir = self
                .settings
                .cache_root
                .as_deref()
                .and_then(|root| paths::prepare_user_dir(root, family));
            let context = self
                .library
                .init(&self.settings.data_dir, user_dir.as_deref())?;
            tracing::info!(
                family = %family,
                data_dir = %self.settings.data_dir.display(),
                user_dir = ?user_dir,
                "converter context created"
            );
            self.contexts[family.index()] = Some(context);
        }

        let snapshot = self.config.snapshot(family);
        self.apply_configuration(&snapshot, family);

        let context = self.contexts[family.index()]
            .as_mut()
            .ok_or_else(|| BackendError::library("alloc_instance", "context missing"))?;
        let inner = context.alloc_instance()?;
        self.outstanding[family.index()] += 1;
        Ok(ConverterInstance { family, inner })
    }

    /// Return an instance to the context it came from.
    pub fn release_instance(&mut self, instance: ConverterInstance<Instance<L>>) {
        let idx = instance.family.index();
        if let Some(context) = self.contexts[idx].as_mut() {
            context.free_instance(instance.inner);
            self.outstanding[idx] = self.outstanding[idx].saturating_sub(1);
        }
    }

    /// Push `snapshot` into the family's context.
    ///
    /// Returns `false` when the context has not been created yet. An
    /// unmapped keyboard layout leaves the current scheme in place.
    pub fn apply_configuration(&mut self, snapshot: &ConfigSnapshot, family: SchemeFamily) -> bool {
        let Some(context) = self.contexts[family.index()].as_mut() else {
            return false;
        };

        match family.lookup_scheme(snapshot.keyboard_layout) {
            Some(scheme) => context.set_scheme(scheme),
            None => tracing::debug!(
                family = %family,
                layout = snapshot.keyboard_layout,
                "keyboard layout not mapped, scheme unchanged"
            ),
        }
        context.set_options(snapshot.options | family.mandatory_options());
        true
    }

    /// Record that user-adapted state changed and must be saved eventually.
    pub fn notify_modified(&mut self) {
        let now = self.clock.now();
        self.last_modified = now;
        self.first_unsaved.get_or_insert(now);

        if self.timeout_id.is_some() {
            return;
        }
        let id = self.event_loop.add_timeout(self.settings.save_timeout);
        tracing::debug!(source = ?id, delay = ?self.settings.save_timeout, "save timer armed");
        self.timeout_id = Some(id);
    }

    /// Route a fired timeout. Sources other than the armed one are stopped.
    pub fn on_timeout(&mut self, source: SourceId) -> ControlFlow<()> {
        if self.timeout_id != Some(source) {
            return ControlFlow::Break(());
        }
        self.debounce_tick()
    }

    /// One timer tick: save if the delay has elapsed.
    ///
    /// Returns `Break` once a save succeeded (timer disarmed), `Continue`
    /// while the delay has not elapsed or the save failed.
    pub fn debounce_tick(&mut self) -> ControlFlow<()> {
        let reference = match self.settings.flush_policy {
            FlushPolicy::Idle => self.last_modified,
            FlushPolicy::FirstChange => self.first_unsaved.unwrap_or(self.last_modified),
        };
        let elapsed = self.clock.now().saturating_sub(reference);

        if elapsed < self.settings.save_timeout {
            return ControlFlow::Continue(());
        }
        match self.save_user_data() {
            Ok(()) => {
                self.timeout_id = None;
                ControlFlow::Break(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "saving user data failed, retrying on next tick");
                ControlFlow::Continue(())
            }
        }
    }

    /// Save every existing context.
    ///
    /// Contexts are saved independently; a failure in one does not skip the
    /// other. The first error is returned.
    pub fn save_user_data(&mut self) -> Result<(), BackendError> {
        let mut result = Ok(());
        for family in SchemeFamily::ALL {
            let Some(context) = self.contexts[family.index()].as_mut() else {
                continue;
            };
            if let Err(e) = context.save() {
                tracing::error!(family = %family, error = %e, "saving user data failed");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        if result.is_ok() {
            self.first_unsaved = None;
            tracing::info!("user data saved");
        }
        result
    }

    /// Flush, cancel the timer and finalize both contexts.
    pub fn teardown(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        if let Some(id) = self.timeout_id.take() {
            if let Err(e) = self.save_user_data() {
                tracing::error!(error = %e, "final save failed, learned data may be lost");
            }
            self.event_loop.remove_source(id);
        }

        for family in SchemeFamily::ALL {
            if let Some(context) = self.contexts[family.index()].take() {
                let outstanding = self.outstanding[family.index()];
                if outstanding > 0 {
                    tracing::warn!(
                        family = %family,
                        outstanding,
                        "finalizing context with outstanding instances"
                    );
                }
                context.finalize();
            }
        }
        tracing::debug!("backend torn down");
    }
}

impl<L: ConverterLibrary> Drop for BackendManager<L> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Holder of the single backend manager.
pub struct BackendSlot<L: ConverterLibrary> {
    manager: Option<BackendManager<L>>,
}

impl<L: ConverterLibrary> BackendSlot<L> {
    pub fn new() -> Self {
        Self { manager: None }
    }

    /// Install `manager`.
    ///
    /// # Panics
    ///
    /// If a manager is already installed.
    pub fn init(&mut self, manager: BackendManager<L>) -> &mut BackendManager<L> {
        assert!(
            self.manager.is_none(),
            "backend manager initialized twice without finalize"
        );
        self.manager.insert(manager)
    }

    pub fn is_initialized(&self) -> bool {
        self.manager.is_some()
    }

    pub fn get(&self) -> Option<&BackendManager<L>> {
        self.manager.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut BackendManager<L>> {
        self.manager.as_mut()
    }

    /// Tear down the installed manager, if any.
    pub fn finalize(&mut self) {
        if let Some(manager) = self.manager.take() {
            manager.teardown();
        }
    }
}

impl<L: ConverterLibrary> Default for BackendSlot<L> {
    fn default() -> Self {
        Self::new()
    }
}
