//! User registration and publishing account linking.
use tracing::{info, instrument};

use crate::db::{self, Pool};
use crate::error::{LifecycleError, LifecycleResult};
use crate::linkedin::PublishingService;
use crate::model::{LinkedAccount, User, UserKind};

#[instrument(skip(pool))]
pub async fn register_user(
    pool: &Pool,
    name: &str,
    email: &str,
    kind: UserKind,
) -> LifecycleResult<User> {
    let name = name.trim();
    let email = email.trim().to_ascii_lowercase();
    if name.is_empty() {
        return Err(LifecycleError::validation("Name is required"));
    }
    if !email.contains('@') {
        return Err(LifecycleError::validation("A valid email is required"));
    }
    let id = match db::create_user(pool, name, &email, kind).await {
        Ok(id) => id,
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(LifecycleError::validation("Email is already registered"));
        }
        Err(e) => return Err(e.into()),
    };
    info!(user_id = id, kind = kind.as_str(), "user registered");
    db::get_user(pool, id)
        .await?
        .ok_or(LifecycleError::NotFound("User"))
}

/// Finish the OAuth authorization-code flow and store the account on the user.
#[instrument(skip(pool, svc, code))]
pub async fn connect_linkedin(
    pool: &Pool,
    svc: &dyn PublishingService,
    user_id: i64,
    code: &str,
) -> LifecycleResult<LinkedAccount> {
    if code.trim().is_empty() {
        return Err(LifecycleError::validation("Authorization code is required"));
    }
    if db::get_user(pool, user_id).await?.is_none() {
        return Err(LifecycleError::NotFound("User"));
    }
    let token = svc
        .exchange_code(code)
        .await
        .map_err(LifecycleError::Integration)?;
    let member_id = svc
        .fetch_member_id(&token.access_token)
        .await
        .map_err(LifecycleError::Integration)?;
    let account = LinkedAccount {
        member_id,
        access_token: token.access_token,
        expires_at: token.expires_at,
    };
    db::link_linkedin_account(pool, user_id, &account).await?;
    info!(user_id, "linkedin account linked");
    Ok(account)
}
