//! Recording converter library shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use libchinese_backend::{
    BackendError, BackendManager, BackendSettings, ConfigSource, ConverterContext,
    ConverterLibrary, ConverterOptions, FlushPolicy, ManualClock, Scheme, SharedConfig,
    SimulatedLoop,
};

pub const DELAY: Duration = Duration::from_secs(300);

/// Everything the converter was asked to do.
#[derive(Debug, Default)]
pub struct Log {
    pub inits: Vec<Option<PathBuf>>,
    pub schemes: Vec<(usize, Scheme)>,
    pub options: Vec<(usize, ConverterOptions)>,
    pub saves: usize,
    pub frees: usize,
    pub finalized: usize,
    pub fail_saves: bool,
}

#[derive(Clone, Default)]
pub struct RecordingLibrary {
    pub log: Rc<RefCell<Log>>,
}

pub struct RecordingContext {
    id: usize,
    log: Rc<RefCell<Log>>,
}

#[derive(Debug)]
pub struct RecordingInstance {
    pub context_id: usize,
}

impl ConverterLibrary for RecordingLibrary {
    type Context = RecordingContext;

    fn init(
        &mut self,
        _data_dir: &Path,
        user_dir: Option<&Path>,
    ) -> Result<RecordingContext, BackendError> {
        let mut log = self.log.borrow_mut();
        log.inits.push(user_dir.map(Path::to_path_buf));
        Ok(RecordingContext {
            id: log.inits.len() - 1,
            log: Rc::clone(&self.log),
        })
    }
}

impl ConverterContext for RecordingContext {
    type Instance = RecordingInstance;

    fn alloc_instance(&mut self) -> Result<RecordingInstance, BackendError> {
        Ok(RecordingInstance {
            context_id: self.id,
        })
    }

    fn free_instance(&mut self, instance: RecordingInstance) {
        assert_eq!(instance.context_id, self.id);
        self.log.borrow_mut().frees += 1;
    }

    fn set_scheme(&mut self, scheme: Scheme) {
        self.log.borrow_mut().schemes.push((self.id, scheme));
    }

    fn set_options(&mut self, options: ConverterOptions) {
        self.log.borrow_mut().options.push((self.id, options));
    }

    fn save(&mut self) -> Result<(), BackendError> {
        let mut log = self.log.borrow_mut();
        log.saves += 1;
        if log.fail_saves {
            return Err(BackendError::library("save", "disk full"));
        }
        Ok(())
    }

    fn finalize(self) {
        self.log.borrow_mut().finalized += 1;
    }
}

/// A manager over the recording library plus the handles a test needs.
pub struct Harness {
    pub manager: BackendManager<RecordingLibrary>,
    pub log: Rc<RefCell<Log>>,
    pub event_loop: SimulatedLoop,
    pub clock: ManualClock,
    pub config: SharedConfig,
}

impl Harness {
    pub fn new(cache_root: Option<PathBuf>, policy: FlushPolicy) -> Self {
        Self::with_delay(cache_root, policy, DELAY)
    }

    pub fn with_delay(cache_root: Option<PathBuf>, policy: FlushPolicy, delay: Duration) -> Self {
        let library = RecordingLibrary::default();
        let log = Rc::clone(&library.log);
        let clock = ManualClock::new();
        let event_loop = SimulatedLoop::new(clock.clone());
        let config = SharedConfig::default();
        let settings = BackendSettings {
            data_dir: PathBuf::from("/usr/share/libpinyin/data"),
            cache_root,
            save_timeout: delay,
            flush_policy: policy,
        };
        let manager = BackendManager::new(
            library,
            settings,
            Box::new(config.clone()) as Box<dyn ConfigSource>,
            Box::new(event_loop.handle()),
            Box::new(clock.clone()),
        );
        Self {
            manager,
            log,
            event_loop,
            clock,
            config,
        }
    }

    pub fn idle() -> Self {
        Self::new(None, FlushPolicy::Idle)
    }

    /// Advance simulated time, dispatching fired timeouts to the manager.
    pub fn advance(&mut self, by: Duration) -> usize {
        let manager = &mut self.manager;
        self.event_loop.advance(by, |id| manager.on_timeout(id))
    }

    pub fn saves(&self) -> usize {
        self.log.borrow().saves
    }
}

pub fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}
