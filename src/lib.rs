pub mod config;
pub mod error;
pub mod features;
pub mod inventory;
pub mod llm;
pub mod normalize;
pub mod oracle;
pub mod pipeline;
pub mod record;
pub mod resolution;
pub mod retry;
pub mod shaping;
pub mod store;

pub use error::{CanonError, Result};
pub use pipeline::Pipeline;
pub use record::Record;
