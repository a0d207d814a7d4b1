pub mod mutations;
pub mod queries;
pub mod schema;
pub mod types;

use async_graphql::{Context, ErrorExtensions};

pub use schema::{build_schema, LostFoundSchema};

use crate::auth::SessionUser;
use crate::error::{AppError, AppResult};

/// The caller attached by the HTTP handler; missing means signed out.
pub fn session_user<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a SessionUser> {
    ctx.data_opt::<SessionUser>()
        .ok_or_else(|| AppError::Unauthorized.extend())
}

impl ErrorExtensions for AppError {
    fn extend(&self) -> async_graphql::Error {
        let message = match self {
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Json(_)
            | AppError::Internal(_) => {
                tracing::error!("GraphQL resolver failed: {}", self);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let code = self.kind();
        async_graphql::Error::new(message).extend_with(|_, e| e.set("code", code))
    }
}

/// Convert service results into GraphQL errors carrying the error kind.
pub trait AppErrorExt<T> {
    fn gql(self) -> async_graphql::Result<T>;
}

impl<T> AppErrorExt<T> for AppResult<T> {
    fn gql(self) -> async_graphql::Result<T> {
        self.map_err(|e| e.extend())
    }
}
