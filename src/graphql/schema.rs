use async_graphql::{EmptySubscription, Schema};

use super::mutations::MutationRoot;
use super::queries::QueryRoot;
use crate::chat::DynChatChannel;
use crate::claims::DynClaimWorkflow;
use crate::items::DynItemRepository;

/// GraphQL Schema type
pub type LostFoundSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Build the GraphQL schema over the same services the REST routes use.
/// The caller's `SessionUser` is attached per request.
pub fn build_schema(
    items: DynItemRepository,
    claims: DynClaimWorkflow,
    chat: DynChatChannel,
) -> LostFoundSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(items)
        .data(claims)
        .data(chat)
        .finish()
}
