use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::SignedCookieJar;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::{App, error::AppError};

pub mod posts;
pub mod routes;

pub const COOKIE_NAME: &str = "admin_session";

/// Request-scoped proof that the admin guard ran. Handlers behind the
/// guard can read it from request extensions.
#[derive(Clone, Debug)]
pub struct AdminContext {
    pub session_id: i32,
}

/// Guard composed in front of the admin sub-router. Validates the
/// signed session cookie against the store on every request; anything
/// without a live session is redirected to the login form via
/// [`AppError::Unauthorized`].
pub async fn require_admin(
    State(ctx): State<App>,
    jar: SignedCookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    use crate::schema::admin_sessions;

    let Some(cookie) = jar.get(COOKIE_NAME) else {
        return Err(AppError::Unauthorized);
    };
    let token = cookie.value().to_owned();

    let mut conn = ctx.db.get().await?;
    let now = chrono::Utc::now().naive_utc();

    let session_id: Option<i32> = admin_sessions::table
        .filter(admin_sessions::token.eq(&token))
        .filter(admin_sessions::active.eq(true))
        .filter(admin_sessions::expires_at.gt(now))
        .select(admin_sessions::id)
        .first(&mut conn)
        .await
        .optional()?;

    let Some(session_id) = session_id else {
        return Err(AppError::Unauthorized);
    };

    request.extensions_mut().insert(AdminContext { session_id });
    Ok(next.run(request).await)
}
