//! CLI subcommand implementations.

pub mod import;
pub mod recompute;
pub mod rects;
pub mod status;
pub mod util;
