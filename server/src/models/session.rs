use std::ops::Add;

use base64::Engine;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use rand::Rng;

/// How long an admin stays logged in. Shared with the cookie expiry so
/// the browser and the store agree.
pub const SESSION_TTL_DAYS: i64 = 7;

#[derive(Queryable, Selectable, Identifiable, Debug)]
#[diesel(table_name = crate::schema::admin_sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AdminSession {
    pub id: i32,
    pub token: String,
    pub active: bool,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::admin_sessions)]
pub struct NewAdminSession {
    pub token: String,
    pub active: bool,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

impl AdminSession {
    /// Mints a fresh session for a successful admin login. The token is
    /// random and only ever compared against the stored row, so there is
    /// nothing to derive or verify offline.
    pub fn mint() -> NewAdminSession {
        let mut token_bytes = [0u8; 64];
        rand::rng().fill_bytes(&mut token_bytes);

        let token =
            "adm_".to_owned() + &base64::engine::general_purpose::STANDARD.encode(token_bytes);

        let now = chrono::Utc::now().naive_utc();

        NewAdminSession {
            token,
            active: true,
            issued_at: now,
            expires_at: now.add(chrono::Duration::try_days(SESSION_TTL_DAYS).unwrap_or_else(
                || {
                    tracing::error!("Could not convert {SESSION_TTL_DAYS} to days, using default");
                    chrono::Duration::default()
                },
            )),
            created_at: now,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_mint_produces_distinct_tokens() {
        let a = AdminSession::mint();
        let b = AdminSession::mint();
        assert_ne!(a.token, b.token, "two minted sessions must not share a token");
    }

    #[test]
    fn test_minted_session_is_active_and_expires_later() {
        let session = AdminSession::mint();
        assert!(session.active, "a fresh session should be active");
        assert!(
            session.expires_at > session.issued_at,
            "expiry must lie after issuance"
        );
    }
}
