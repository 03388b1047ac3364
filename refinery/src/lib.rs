pub mod assemble;
pub mod clamp;
pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod lenient;
pub mod merge;
pub mod normalize;
pub mod pipeline;
pub mod pyjson;
pub mod template;

pub use error::RecordError;
pub use pipeline::{ConvertMode, RunStats, ShuffleOptions};
