use async_graphql::*;

use crate::chat::{ChatScope, DynChatChannel, MessageDraft};
use crate::claims::{Decision, DynClaimWorkflow};
use crate::db::models::{Claim, Item};
use crate::graphql::types::{CreateItemInput, MessageObject, UpdateItemInput};
use crate::graphql::{session_user, AppErrorExt};
use crate::items::{DynItemRepository, ItemDraft, ItemPatch};

/// GraphQL Mutation root
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Report a lost or found item
    async fn create_item(&self, ctx: &Context<'_>, input: CreateItemInput) -> Result<Item> {
        let user = session_user(ctx)?;
        let items = ctx.data::<DynItemRepository>()?;

        let new_item = ItemDraft::try_from(input).gql()?.validate().gql()?;
        let id = items
            .create(new_item, &user.id, &user.display_name())
            .await
            .gql()?;
        items.get(&id).await.gql()
    }

    async fn update_item(
        &self,
        ctx: &Context<'_>,
        id: String,
        input: UpdateItemInput,
    ) -> Result<Item> {
        let user = session_user(ctx)?;
        let patch = ItemPatch::new(input.title, input.description, input.category).gql()?;
        ctx.data::<DynItemRepository>()?
            .update(&id, &user.id, patch)
            .await
            .gql()
    }

    async fn delete_item(&self, ctx: &Context<'_>, id: String) -> Result<bool> {
        let user = session_user(ctx)?;
        ctx.data::<DynItemRepository>()?
            .delete(&id, &user.id)
            .await
            .gql()?;
        Ok(true)
    }

    /// Start a claim on someone else's found item
    async fn create_claim(&self, ctx: &Context<'_>, item_id: String) -> Result<Claim> {
        let user = session_user(ctx)?;
        let claims = ctx.data::<DynClaimWorkflow>()?;
        let id = claims.create_claim(&item_id, &user.id).await.gql()?;
        claims.get(&id).await.gql()
    }

    async fn submit_answer(
        &self,
        ctx: &Context<'_>,
        claim_id: String,
        answer: String,
    ) -> Result<Claim> {
        let user = session_user(ctx)?;
        ctx.data::<DynClaimWorkflow>()?
            .submit_answer(&claim_id, &user.id, &answer)
            .await
            .gql()
    }

    /// The finder's decision; moves the item to returned or back to active
    async fn resolve_claim(
        &self,
        ctx: &Context<'_>,
        claim_id: String,
        decision: Decision,
    ) -> Result<Claim> {
        let user = session_user(ctx)?;
        ctx.data::<DynClaimWorkflow>()?
            .resolve_claim(&claim_id, &user.id, decision)
            .await
            .gql()
    }

    async fn send_message(
        &self,
        ctx: &Context<'_>,
        scope: String,
        text: Option<String>,
        image_url: Option<String>,
        audio_url: Option<String>,
    ) -> Result<MessageObject> {
        let user = session_user(ctx)?;
        let scope = scope.parse::<ChatScope>().gql()?;
        let payload = MessageDraft {
            text,
            image_url,
            audio_url,
        }
        .into_payload()
        .gql()?;

        let message = ctx
            .data::<DynChatChannel>()?
            .send(&scope, user, payload)
            .await
            .gql()?;
        Ok(message.into())
    }
}
