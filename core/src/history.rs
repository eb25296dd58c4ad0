//! Phrase-history converter backend.
//!
//! A self-contained `ConverterLibrary` that does no conversion of its own but
//! carries everything the manager interacts with: scheme and option state per
//! context, sessions that learn committed phrases, and a `save` that writes
//! the learned frequencies to `<user_dir>/user_history.bin` with `bincode`.
//!
//! Sessions share their context's history through `Rc<RefCell<_>>`; all of it
//! lives on the event-loop thread.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::converter::{ConverterContext, ConverterLibrary};
use crate::error::BackendError;
use crate::options::ConverterOptions;
use crate::scheme::Scheme;

/// File name of the persisted history inside a user directory.
pub const HISTORY_FILE: &str = "user_history.bin";

/// Learned phrase frequencies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhraseHistory {
    counts: HashMap<String, u64>,
    #[serde(skip)]
    dirty: bool,
}

impl PhraseHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn a phrase: increment its count by 1.
    pub fn learn(&mut self, phrase: &str) {
        self.learn_with_count(phrase, 1);
    }

    /// Learn a phrase with a custom increment (useful for import or batch updates).
    pub fn learn_with_count(&mut self, phrase: &str, delta: u64) {
        if delta == 0 {
            return;
        }
        let entry = self.counts.entry(phrase.to_string()).or_insert(0);
        *entry = entry.saturating_add(delta);
        self.dirty = true;
    }

    pub fn frequency(&self, phrase: &str) -> u64 {
        self.counts.get(phrase).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Whether there are changes not yet written by `save`.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Entries sorted by descending count, then phrase.
    pub fn entries(&self) -> Vec<(String, u64)> {
        let mut out: Vec<_> = self.counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
        out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        out
    }

    pub fn load(path: &Path) -> Result<Self, BackendError> {
        let bytes = std::fs::read(path).map_err(|e| BackendError::io(path, e))?;
        Ok(bincode::deserialize(&bytes)?)
    }

    /// Write through a temp file so a crash never leaves a truncated history.
    pub fn store(&mut self, path: &Path) -> Result<(), BackendError> {
        let bytes = bincode::serialize(self)?;
        let tmp = path.with_extension("bin.tmp");
        std::fs::write(&tmp, bytes).map_err(|e| BackendError::io(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| BackendError::io(path, e))?;
        self.dirty = false;
        Ok(())
    }
}

/// `ConverterLibrary` producing `HistoryContext`s.
#[derive(Debug, Default)]
pub struct HistoryLibrary {
    contexts_created: usize,
}

impl HistoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contexts_created(&self) -> usize {
        self.contexts_created
    }
}

impl ConverterLibrary for HistoryLibrary {
    type Context = HistoryContext;

    fn init(
        &mut self,
        data_dir: &Path,
        user_dir: Option<&Path>,
    ) -> Result<HistoryContext, BackendError> {
        if !data_dir.is_dir() {
            tracing::debug!(path = %data_dir.display(), "system data directory not present");
        }

        let history_path = user_dir.map(|dir| dir.join(HISTORY_FILE));
        let history = match &history_path {
            Some(path) if path.exists() => PhraseHistory::load(path).unwrap_or_else(|e| {
                // Replaced by the next save.
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "unreadable user history, starting empty"
                );
                PhraseHistory::new()
            }),
            _ => PhraseHistory::new(),
        };
        tracing::debug!(
            user_dir = ?user_dir,
            phrases = history.len(),
            "history context initialized"
        );

        self.contexts_created += 1;
        Ok(HistoryContext {
            data_dir: data_dir.to_path_buf(),
            history_path,
            scheme: None,
            options: ConverterOptions::empty(),
            history: Rc::new(RefCell::new(history)),
            next_session: 0,
            live_sessions: 0,
        })
    }
}

/// One loaded context with its learned history.
#[derive(Debug)]
pub struct HistoryContext {
    data_dir: PathBuf,
    history_path: Option<PathBuf>,
    scheme: Option<Scheme>,
    options: ConverterOptions,
    history: Rc<RefCell<PhraseHistory>>,
    next_session: u64,
    live_sessions: usize,
}

impl HistoryContext {
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Where `save` writes, or `None` without a user directory.
    pub fn history_path(&self) -> Option<&Path> {
        self.history_path.as_deref()
    }

    /// Last scheme set; `None` until a layout mapped to one.
    pub fn scheme(&self) -> Option<Scheme> {
        self.scheme
    }

    pub fn options(&self) -> ConverterOptions {
        self.options
    }

    pub fn live_sessions(&self) -> usize {
        self.live_sessions
    }

    pub fn frequency(&self, phrase: &str) -> u64 {
        self.history.borrow().frequency(phrase)
    }

    pub fn history_entries(&self) -> Vec<(String, u64)> {
        self.history.borrow().entries()
    }
}

impl ConverterContext for HistoryContext {
    type Instance = HistorySession;

    fn alloc_instance(&mut self) -> Result<HistorySession, BackendError> {
        self.next_session += 1;
        self.live_sessions += 1;
        Ok(HistorySession {
            id: self.next_session,
            history: Rc::clone(&self.history),
        })
    }

    fn free_instance(&mut self, instance: HistorySession) {
        tracing::trace!(session = instance.id, "session released");
        self.live_sessions = self.live_sessions.saturating_sub(1);
    }

    fn set_scheme(&mut self, scheme: Scheme) {
        self.scheme = Some(scheme);
    }

    fn set_options(&mut self, options: ConverterOptions) {
        self.options = options;
    }

    fn save(&mut self) -> Result<(), BackendError> {
        let Some(path) = &self.history_path else {
            return Ok(());
        };
        let mut history = self.history.borrow_mut();
        if !history.is_dirty() {
            return Ok(());
        }
        history.store(path)?;
        tracing::debug!(path = %path.display(), phrases = history.len(), "history saved");
        Ok(())
    }

    fn finalize(self) {
        if self.live_sessions > 0 {
            tracing::warn!(
                sessions = self.live_sessions,
                "history context finalized with live sessions"
            );
        }
    }
}

/// A conversion session handed out by `HistoryContext`.
#[derive(Debug)]
pub struct HistorySession {
    id: u64,
    history: Rc<RefCell<PhraseHistory>>,
}

impl HistorySession {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Record a phrase the user committed.
    pub fn commit(&self, phrase: &str) {
        self.history.borrow_mut().learn(phrase);
    }

    pub fn frequency(&self, phrase: &str) -> u64 {
        self.history.borrow().frequency(phrase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learn_and_frequency() {
        let mut h = PhraseHistory::new();
        assert_eq!(h.frequency("你好"), 0);
        h.learn("你好");
        assert_eq!(h.frequency("你好"), 1);
        h.learn_with_count("你好", 4);
        assert_eq!(h.frequency("你好"), 5);
        h.learn_with_count("中国", 0);
        assert_eq!(h.len(), 1);
        assert!(h.is_dirty());
    }

    #[test]
    fn entries_sorted_by_count() {
        let mut h = PhraseHistory::new();
        h.learn_with_count("b", 1);
        h.learn_with_count("a", 3);
        h.learn_with_count("c", 1);
        assert_eq!(
            h.entries(),
            vec![("a".into(), 3), ("b".into(), 1), ("c".into(), 1)]
        );
    }

    #[test]
    fn history_survives_context_recreation() {
        let tmp = tempfile::tempdir().unwrap();
        let mut lib = HistoryLibrary::new();

        let mut ctx = lib.init(tmp.path(), Some(tmp.path())).unwrap();
        let session = ctx.alloc_instance().unwrap();
        session.commit("你好");
        session.commit("你好");
        ctx.free_instance(session);
        ctx.save().unwrap();
        ctx.finalize();

        let ctx = lib.init(tmp.path(), Some(tmp.path())).unwrap();
        assert_eq!(ctx.frequency("你好"), 2);
        assert_eq!(lib.contexts_created(), 2);
    }

    #[test]
    fn save_without_user_dir_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ctx = HistoryLibrary::new().init(tmp.path(), None).unwrap();
        ctx.alloc_instance().unwrap().commit("中国");
        ctx.save().unwrap();
        assert!(ctx.history_path().is_none());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn corrupt_history_starts_empty_and_is_overwritten() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(HISTORY_FILE);
        std::fs::write(&path, b"\xff\xff\xff\xff\xff\xff\xff\xff\xff").unwrap();
        assert!(PhraseHistory::load(&path).is_err());

        let mut lib = HistoryLibrary::new();
        let mut ctx = lib.init(tmp.path(), Some(tmp.path())).unwrap();
        assert!(ctx.history_entries().is_empty());
        ctx.alloc_instance().unwrap().commit("你好");
        ctx.save().unwrap();

        let ctx = lib.init(tmp.path(), Some(tmp.path())).unwrap();
        assert_eq!(ctx.frequency("你好"), 1);
    }

    #[test]
    fn settings_recorded() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ctx = HistoryLibrary::new().init(tmp.path(), None).unwrap();
        assert_eq!(ctx.scheme(), None);
        ctx.set_scheme(Scheme::Chewing(crate::scheme::ChewingScheme::Eten));
        ctx.set_options(ConverterOptions::IS_CHEWING);
        assert_eq!(ctx.scheme(), Some(Scheme::Chewing(crate::scheme::ChewingScheme::Eten)));
        assert_eq!(ctx.options(), ConverterOptions::IS_CHEWING);
    }
}
