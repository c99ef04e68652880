//! Built-in site adapters. Each one owns its selectors and URL shapes; nothing here is
//! shared between sites except the helpers in the parent module.

mod box_novel;
mod fan_mtl;
mod light_novels_translations;
mod mtl_novel;

pub use box_novel::BoxNovel;
pub use fan_mtl::FanMtl;
pub use light_novels_translations::LightNovelsTranslations;
pub use mtl_novel::MtlNovel;
