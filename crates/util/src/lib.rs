//! Collaborators shared by the engine and the CLI: the data catalogue,
//! path helpers and progress reporting.

pub mod catalog;
pub mod path_processing;
pub mod progress;

pub use catalog::*;
pub use path_processing::*;
pub use progress::*;
