//! Backend configuration.
//!
//! `BackendConfig` is the TOML-facing configuration: where the system data
//! lives, where per-user directories go, how long to wait before saving, and
//! one section per scheme family. The manager never keeps a copy of the
//! family sections; it asks a `ConfigSource` for a fresh `ConfigSnapshot`
//! every time it hands out an instance.
//!
//! # Example
//!
//! ```rust
//! use libchinese_backend::{BackendConfig, ConfigSource, SchemeFamily};
//!
//! let cfg = BackendConfig::from_toml_str("[pinyin]\ndouble_pinyin_schema = 2\n").unwrap();
//! let snap = cfg.snapshot(SchemeFamily::Pinyin);
//! assert_eq!(snap.keyboard_layout, 2);
//! ```

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use crate::error::BackendError;
use crate::options::ConverterOptions;
use crate::scheme::SchemeFamily;

/// Fixed delay before learned data is flushed, in seconds.
pub const DEFAULT_SAVE_TIMEOUT_SECS: u64 = 5 * 60;

/// System-wide read-only converter data.
pub const DEFAULT_DATA_DIR: &str = "/usr/share/libpinyin/data";

/// Which modification the save delay is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlushPolicy {
    /// Measure from the most recent modification. A steady stream of
    /// modifications keeps postponing the save.
    #[default]
    Idle,
    /// Measure from the first modification since the last successful save.
    ///
    /// A direct `save_user_data` call resets that point but leaves an armed
    /// timer running. Its next tick measures from the first modification
    /// after the save, or from the latest one if there was none.
    FirstChange,
}

/// Read-only view of one family's settings, taken at allocation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigSnapshot {
    /// Keyboard layout index as stored by the framework configuration
    pub keyboard_layout: i32,
    /// Option bits requested by the user (mandatory flags not included)
    pub options: ConverterOptions,
}

/// Configuration collaborator consulted on every instance allocation.
pub trait ConfigSource {
    fn snapshot(&self, family: SchemeFamily) -> ConfigSnapshot;
}

/// Pinyin family settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PinyinConfig {
    /// Double pinyin layout index (0 = Microsoft ... 5 = XiaoHe)
    pub double_pinyin_schema: i32,

    /// Allow incomplete syllables (e.g. "zh" without a final)
    pub incomplete: bool,
    pub use_tone: bool,
    pub dynamic_adjust: bool,

    // Pinyin correction options for common misspellings
    pub correct_gn_ng: bool,  // bagn ↔ bang
    pub correct_mg_ng: bool,  // bamg ↔ bang
    pub correct_iou_iu: bool, // liou ↔ liu
    pub correct_uei_ui: bool, // guei ↔ gui
    pub correct_uen_un: bool, // juen ↔ jun
    pub correct_ue_ve: bool,  // nue ↔ nve
    pub correct_v_u: bool,    // nv ↔ nu
    pub correct_on_ong: bool, // gon ↔ gong

    /// Fuzzy equivalence rules (e.g. "zh=z", "an=ang")
    pub fuzzy: Vec<String>,
}

impl Default for PinyinConfig {
    fn default() -> Self {
        Self {
            double_pinyin_schema: 0,
            incomplete: true,
            use_tone: true,
            dynamic_adjust: true,
            correct_gn_ng: true,
            correct_mg_ng: true,
            correct_iou_iu: true,
            correct_uei_ui: true,
            correct_uen_un: true,
            correct_ue_ve: true,
            correct_v_u: true,
            correct_on_ong: true,
            fuzzy: Vec::new(),
        }
    }
}

impl PinyinConfig {
    /// Option word for this configuration.
    pub fn option(&self) -> ConverterOptions {
        use ConverterOptions as O;

        let mut o = O::IS_PINYIN;
        o.set(O::PINYIN_INCOMPLETE, self.incomplete);
        o.set(O::USE_TONE, self.use_tone);
        o.set(O::DYNAMIC_ADJUST, self.dynamic_adjust);
        o.set(O::CORRECT_GN_NG, self.correct_gn_ng);
        o.set(O::CORRECT_MG_NG, self.correct_mg_ng);
        o.set(O::CORRECT_IOU_IU, self.correct_iou_iu);
        o.set(O::CORRECT_UEI_UI, self.correct_uei_ui);
        o.set(O::CORRECT_UEN_UN, self.correct_uen_un);
        o.set(O::CORRECT_UE_VE, self.correct_ue_ve);
        o.set(O::CORRECT_V_U, self.correct_v_u);
        o.set(O::CORRECT_ON_ONG, self.correct_on_ong);
        o | fuzzy_options(&self.fuzzy)
    }

    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            keyboard_layout: self.double_pinyin_schema,
            options: self.option(),
        }
    }
}

/// Bopomofo family settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BopomofoConfig {
    /// Keyboard mapping index (0 = Standard, 1 = GinYieh, 2 = ETEN, 3 = IBM)
    pub keyboard_mapping: i32,

    /// Allow incomplete syllables (e.g. "ㄓ" without a final)
    pub incomplete: bool,
    pub use_tone: bool,
    pub dynamic_adjust: bool,

    /// Fuzzy equivalence rules
    pub fuzzy: Vec<String>,
}

impl Default for BopomofoConfig {
    fn default() -> Self {
        Self {
            keyboard_mapping: 0,
            incomplete: true,
            use_tone: true,
            dynamic_adjust: true,
            fuzzy: Vec::new(),
        }
    }
}

impl BopomofoConfig {
    pub fn option(&self) -> ConverterOptions {
        use ConverterOptions as O;

        let mut o = O::IS_CHEWING;
        o.set(O::CHEWING_INCOMPLETE, self.incomplete);
        o.set(O::USE_TONE, self.use_tone);
        o.set(O::DYNAMIC_ADJUST, self.dynamic_adjust);
        o | fuzzy_options(&self.fuzzy)
    }

    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            keyboard_layout: self.keyboard_mapping,
            options: self.option(),
        }
    }
}

fn fuzzy_options(rules: &[String]) -> ConverterOptions {
    let mut o = ConverterOptions::empty();
    for rule in rules {
        match ConverterOptions::from_fuzzy_rule(rule) {
            Some(flag) => o |= flag,
            None => tracing::warn!(rule = %rule, "ignoring unsupported fuzzy rule"),
        }
    }
    o
}

/// Top-level backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// System-wide converter data directory
    pub data_dir: PathBuf,

    /// Root for per-user directories. Defaults to `$HOME/.cache`.
    pub cache_dir: Option<PathBuf>,

    /// Delay before a modification is flushed (also the tick interval)
    pub save_timeout_secs: u64,

    pub flush_policy: FlushPolicy,

    pub pinyin: PinyinConfig,
    pub bopomofo: BopomofoConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            cache_dir: None,
            save_timeout_secs: DEFAULT_SAVE_TIMEOUT_SECS,
            flush_policy: FlushPolicy::Idle,
            pinyin: PinyinConfig::default(),
            bopomofo: BopomofoConfig::default(),
        }
    }
}

impl BackendConfig {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self, BackendError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| BackendError::io(path, e))?;
        Self::from_toml_str(&content)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), BackendError> {
        let path = path.as_ref();
        let content = self.to_toml_string()?;
        std::fs::write(path, content).map_err(|e| BackendError::io(path, e))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, BackendError> {
        let config: BackendConfig = toml::from_str(content)?;
        if config.save_timeout_secs == 0 {
            return Err(BackendError::Config(
                "save_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, BackendError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save_timeout(&self) -> Duration {
        Duration::from_secs(self.save_timeout_secs)
    }
}

impl ConfigSource for BackendConfig {
    fn snapshot(&self, family: SchemeFamily) -> ConfigSnapshot {
        match family {
            SchemeFamily::Pinyin => self.pinyin.snapshot(),
            SchemeFamily::Bopomofo => self.bopomofo.snapshot(),
        }
    }
}

/// Live configuration shared between the framework and the manager.
///
/// Edits made through `edit` are visible to the next allocation.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig(Rc<RefCell<BackendConfig>>);

impl SharedConfig {
    pub fn new(config: BackendConfig) -> Self {
        Self(Rc::new(RefCell::new(config)))
    }

    pub fn edit<R>(&self, f: impl FnOnce(&mut BackendConfig) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }

    pub fn get(&self) -> BackendConfig {
        self.0.borrow().clone()
    }
}

impl ConfigSource for SharedConfig {
    fn snapshot(&self, family: SchemeFamily) -> ConfigSnapshot {
        self.0.borrow().snapshot(family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConverterOptions as O;

    #[test]
    fn defaults_present() {
        let cfg = BackendConfig::default();
        assert_eq!(cfg.save_timeout(), Duration::from_secs(300));
        assert_eq!(cfg.flush_policy, FlushPolicy::Idle);
        assert_eq!(cfg.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        assert!(cfg.pinyin.option().contains(O::IS_PINYIN | O::PINYIN_INCOMPLETE));
        assert!(cfg.bopomofo.option().contains(O::IS_CHEWING));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = BackendConfig::from_toml_str(
            r#"
            save_timeout_secs = 60
            flush_policy = "first-change"

            [bopomofo]
            keyboard_mapping = 3
            incomplete = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.save_timeout_secs, 60);
        assert_eq!(cfg.flush_policy, FlushPolicy::FirstChange);
        assert_eq!(cfg.bopomofo.keyboard_mapping, 3);
        assert!(!cfg.bopomofo.option().contains(O::CHEWING_INCOMPLETE));
        assert_eq!(cfg.pinyin.double_pinyin_schema, 0);
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = BackendConfig::from_toml_str("save_timeout_secs = 0").unwrap_err();
        assert!(matches!(err, BackendError::Config(_)));
    }

    #[test]
    fn toml_string_roundtrip() {
        let mut cfg = BackendConfig::default();
        cfg.cache_dir = Some(PathBuf::from("/tmp/cache"));
        cfg.pinyin.fuzzy = vec!["zh=z".into()];
        let text = cfg.to_toml_string().unwrap();
        let back = BackendConfig::from_toml_str(&text).unwrap();
        assert_eq!(back.cache_dir, cfg.cache_dir);
        assert_eq!(back.pinyin.option(), cfg.pinyin.option());
    }

    #[test]
    fn fuzzy_rules_become_ambiguity_bits() {
        let pinyin = PinyinConfig {
            fuzzy: vec!["zh=z".into(), "an=ang".into(), "zi=zhi".into()],
            ..PinyinConfig::default()
        };
        let o = pinyin.option();
        assert!(o.contains(O::AMB_Z_ZH | O::AMB_AN_ANG));
        assert!(!o.contains(O::AMB_L_N));
    }

    #[test]
    fn shared_config_reflects_edits() {
        let shared = SharedConfig::new(BackendConfig::default());
        assert_eq!(shared.snapshot(SchemeFamily::Pinyin).keyboard_layout, 0);
        shared.edit(|c| c.pinyin.double_pinyin_schema = 5);
        assert_eq!(shared.snapshot(SchemeFamily::Pinyin).keyboard_layout, 5);
        assert_eq!(shared.get().pinyin.double_pinyin_schema, 5);
    }
}
