//! Shipped site adapters.

pub mod danshigohan;
pub mod nhk_kobara_ka_2;
pub mod nhk_kobara_ta;
pub mod nhk_umai;
pub mod tbs_obigohan;

use crate::adapter::{AdapterRegistry, RecipeStream};
use crate::error::ExtractError;

pub use danshigohan::Danshigohan;
pub use nhk_kobara_ka_2::NhkKobaraKa2;
pub use nhk_kobara_ta::NhkKobaraTa;
pub use nhk_umai::NhkUmai;
pub use tbs_obigohan::TbsObigohan;

/// Registry of every shipped adapter.
pub fn default_registry() -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    registry.register(danshigohan::SITE_NAME, Danshigohan::factory);
    registry.register(nhk_kobara_ka_2::SITE_NAME, NhkKobaraKa2::factory);
    registry.register(nhk_kobara_ta::SITE_NAME, NhkKobaraTa::factory);
    registry.register(nhk_umai::SITE_NAME, NhkUmai::factory);
    registry.register(tbs_obigohan::SITE_NAME, TbsObigohan::factory);
    registry
}

/// A detail stream that fails immediately.
pub(crate) fn failed<'a>(err: ExtractError) -> RecipeStream<'a> {
    Box::new(std::iter::once(Err(err)))
}
