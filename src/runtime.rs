mod context;
mod error;
mod id_gen;
mod settings;
mod single_processor;
pub(crate) mod sync;
#[cfg(test)]
mod tests;

pub use context::AppContext;
pub use error::{AppError, Result};
pub use id_gen::IdGenerator;
pub use settings::{DEFAULT_HISTORY_SIZE, REDACTED, Settings, load_settings, save_settings};
pub use single_processor::SingleProcessor;
