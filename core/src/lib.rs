//! libchinese-backend
//!
//! Glue between an input-method framework and a phonetic conversion library.
//! The crate lazily creates one converter context per scheme family (pinyin,
//! bopomofo), translates configuration into converter schemes and option
//! flags, and saves learned user data on a debounced timer.
//!
//! Public API:
//! - `BackendManager` / `BackendSlot` - context ownership and debounced saving
//! - `ConverterLibrary` / `ConverterContext` - interface to the conversion library
//! - `HistoryLibrary` - bundled backend that learns and persists phrase history
//! - `BackendConfig` / `ConfigSource` - TOML configuration and per-allocation snapshots
//! - `EventLoop` / `Clock` / `SimulatedLoop` - timer collaborators
//!
//! ```rust
//! use libchinese_backend::{
//!     BackendConfig, BackendManager, BackendSettings, HistoryLibrary, ManualClock,
//!     SchemeFamily, SharedConfig, SimulatedLoop,
//! };
//! use std::time::Duration;
//!
//! let clock = ManualClock::new();
//! let event_loop = SimulatedLoop::new(clock.clone());
//! let config = SharedConfig::new(BackendConfig::default());
//! let settings = BackendSettings {
//!     cache_root: None,
//!     ..BackendSettings::from_config(&config.get())
//! };
//!
//! let mut manager = BackendManager::new(
//!     HistoryLibrary::new(),
//!     settings,
//!     Box::new(config),
//!     Box::new(event_loop.handle()),
//!     Box::new(clock),
//! );
//!
//! let session = manager.allocate_instance(SchemeFamily::Pinyin).unwrap();
//! session.get().commit("你好");
//! manager.notify_modified();
//! event_loop.advance(Duration::from_secs(300), |id| manager.on_timeout(id));
//! assert!(!manager.is_save_pending());
//!
//! manager.release_instance(session);
//! manager.teardown();
//! ```

pub mod backend;
pub mod config;
pub mod converter;
pub mod error;
pub mod history;
pub mod options;
pub mod paths;
pub mod scheme;
pub mod timer;

pub use backend::{BackendManager, BackendSettings, BackendSlot, ConverterInstance};
pub use config::{
    BackendConfig, BopomofoConfig, ConfigSnapshot, ConfigSource, FlushPolicy, PinyinConfig,
    SharedConfig, DEFAULT_DATA_DIR, DEFAULT_SAVE_TIMEOUT_SECS,
};
pub use converter::{ConverterContext, ConverterLibrary};
pub use error::BackendError;
pub use history::{HistoryContext, HistoryLibrary, HistorySession, PhraseHistory};
pub use options::ConverterOptions;
pub use scheme::{ChewingScheme, DoublePinyinScheme, Scheme, SchemeFamily};
pub use timer::{Clock, EventLoop, LoopHandle, ManualClock, SimulatedLoop, SourceId, SystemClock};
