use crate::entity::EntityId;
use crate::item::ItemId;

/// Alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while resolving references or updating combatants.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A reference did not resolve to the expected kind of document.
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// A persisted reference no longer points at anything live.
    #[error("reference not found: {0}")]
    ReferenceNotFound(String),

    /// The requested combatant does not exist.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The requested item does not exist on its owner.
    #[error("item {item} not found on entity {entity}")]
    ItemNotFound {
        /// The owning combatant.
        entity: EntityId,
        /// The missing item.
        item: ItemId,
    },

    /// The backing store refused or failed an update.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Reading an encounter file failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// An encounter file was not valid JSON for the expected shape.
    #[error("malformed encounter data: {0}")]
    Json(#[from] serde_json::Error),
}
