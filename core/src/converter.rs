//! Narrow interface to the phonetic conversion library.
//!
//! The backend manager never talks to a conversion engine directly. It only
//! needs to create and finalize contexts, hand out instances, push scheme and
//! option settings, and ask a context to persist what it learned.

use std::path::Path;

use crate::error::BackendError;
use crate::options::ConverterOptions;
use crate::scheme::Scheme;

/// Factory for converter contexts.
pub trait ConverterLibrary {
    type Context: ConverterContext;

    /// Create a context over the read-only `data_dir`.
    ///
    /// `user_dir` is the writable per-user directory; `None` means the
    /// context runs without user-specific storage.
    fn init(
        &mut self,
        data_dir: &Path,
        user_dir: Option<&Path>,
    ) -> Result<Self::Context, BackendError>;
}

/// A loaded conversion context. Instances must not outlive it.
pub trait ConverterContext {
    type Instance;

    fn alloc_instance(&mut self) -> Result<Self::Instance, BackendError>;

    fn free_instance(&mut self, instance: Self::Instance);

    fn set_scheme(&mut self, scheme: Scheme);

    fn set_options(&mut self, options: ConverterOptions);

    /// Persist user-adapted state to the context's user directory.
    fn save(&mut self) -> Result<(), BackendError>;

    /// Release the context. Called exactly once.
    fn finalize(self);
}
