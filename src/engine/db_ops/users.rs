//! Users and their stored provider credentials.

use rusqlite::{OptionalExtension, params};

use crate::error::{Error, Result};
use crate::types::{Credential, User};

use super::{Store, unix_now};

impl Store {
    pub fn create_user(&self, email: &str, name: Option<&str>) -> Result<User> {
        let conn = self.conn()?;
        let now = unix_now();
        conn.execute(
            "INSERT INTO users (email, name, created_at) VALUES (?1, ?2, ?3)",
            params![email, name, now],
        )?;
        Ok(User {
            id: conn.last_insert_rowid(),
            email: email.to_string(),
            name: name.map(str::to_string),
            created_at: now,
        })
    }

    pub fn get_user(&self, id: i64) -> Result<User> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, email, name, created_at FROM users WHERE id = ?1",
            [id],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    name: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("user {id}")))
    }

    /// Insert or replace the user's credential for `cred.provider`.
    pub fn save_credential(&self, cred: &Credential) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO user_identities (user_id, provider, provider_user_id, access_token, \
             refresh_token, token_expiry, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(user_id, provider) DO UPDATE SET \
             provider_user_id = excluded.provider_user_id, \
             access_token = excluded.access_token, \
             refresh_token = excluded.refresh_token, \
             token_expiry = excluded.token_expiry",
            params![
                cred.user_id,
                cred.provider,
                cred.provider_user_id,
                cred.access_token,
                cred.refresh_token,
                cred.token_expiry,
                unix_now(),
            ],
        )?;
        Ok(())
    }

    pub fn find_credential(&self, user_id: i64, provider: &str) -> Result<Option<Credential>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                "SELECT user_id, provider, provider_user_id, access_token, refresh_token, \
                 token_expiry FROM user_identities WHERE user_id = ?1 AND provider = ?2",
                params![user_id, provider],
                |row| {
                    Ok(Credential {
                        user_id: row.get(0)?,
                        provider: row.get(1)?,
                        provider_user_id: row.get(2)?,
                        access_token: row.get(3)?,
                        refresh_token: row.get(4)?,
                        token_expiry: row.get(5)?,
                    })
                },
            )
            .optional()?)
    }
}
