use async_graphql::*;

use crate::chat::{ChatScope, DynChatChannel};
use crate::claims::DynClaimWorkflow;
use crate::db::models::{Claim, Item, ItemType};
use crate::error::AppError;
use crate::graphql::types::{ClaimDetailObject, MessageObject, UserObject};
use crate::graphql::{session_user, AppErrorExt};
use crate::items::{DynItemRepository, ItemFilter, ItemQuery};

/// GraphQL Query root
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// The signed-in user, re-read on every request
    async fn me(&self, ctx: &Context<'_>) -> Result<UserObject> {
        Ok(UserObject::from(session_user(ctx)?))
    }

    /// Feed listing, newest first. `view` is `latest` or `claimed`.
    async fn items(
        &self,
        ctx: &Context<'_>,
        view: Option<String>,
        item_type: Option<ItemType>,
    ) -> Result<Vec<Item>> {
        let user = session_user(ctx)?;
        let filter = match item_type {
            Some(item_type) => ItemFilter::Type(item_type),
            None => ItemQuery {
                view,
                ..Default::default()
            }
            .into_filter()
            .gql()?,
        };

        let items = ctx.data::<DynItemRepository>()?.list(&filter).await.gql()?;
        Ok(items.into_iter().map(|i| i.visible_to(&user.id)).collect())
    }

    async fn item(&self, ctx: &Context<'_>, id: String) -> Result<Item> {
        let user = session_user(ctx)?;
        let item = ctx.data::<DynItemRepository>()?.get(&id).await.gql()?;
        Ok(item.visible_to(&user.id))
    }

    /// Claims where the caller is claimer or finder
    async fn my_claims(&self, ctx: &Context<'_>) -> Result<Vec<Claim>> {
        let user = session_user(ctx)?;
        ctx.data::<DynClaimWorkflow>()?
            .list_for_user(&user.id)
            .await
            .gql()
    }

    async fn claim(&self, ctx: &Context<'_>, id: String) -> Result<ClaimDetailObject> {
        let user = session_user(ctx)?;
        let detail = ctx
            .data::<DynClaimWorkflow>()?
            .detail(&id, &user.id)
            .await
            .gql()?;
        Ok(detail.into())
    }

    /// Channel history; `scope` is `global` or a claim id
    async fn messages(&self, ctx: &Context<'_>, scope: String) -> Result<Vec<MessageObject>> {
        let user = session_user(ctx)?;
        let scope = scope.parse::<ChatScope>().gql()?;
        let messages = ctx
            .data::<DynChatChannel>()?
            .history(&scope, &user.id)
            .await
            .gql()?;
        Ok(messages.into_iter().map(MessageObject::from).collect())
    }

    /// Every item with its reporter, for the admin table
    async fn admin_items(&self, ctx: &Context<'_>) -> Result<Vec<Item>> {
        let user = session_user(ctx)?;
        if !user.is_admin {
            return Err(AppError::Authorization("Admins only".into()).extend());
        }
        let items = ctx
            .data::<DynItemRepository>()?
            .list(&ItemFilter::All)
            .await
            .gql()?;
        Ok(items.into_iter().map(|i| i.visible_to(&user.id)).collect())
    }
}
