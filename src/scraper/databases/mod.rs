//! Metadata databases: title search and descriptions only.

mod baka_updates;
mod novel_updates;

pub use baka_updates::BakaUpdates;
pub use novel_updates::NovelUpdates;
