pub mod domain;
pub mod repository;

pub use domain::{ItemDraft, ItemFilter, ItemPatch, ItemQuery, NewItem, PotentialMatch};
pub use repository::{DynItemRepository, ItemRepository, SqliteItemRepository};
