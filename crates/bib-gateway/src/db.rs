use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::GatewayError;
use crate::platform::Platform;

/// SQLITE_CONSTRAINT_UNIQUE
const UNIQUE_VIOLATION: i32 = 2067;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    fn from_db(value: &str) -> Self {
        match value {
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }
}

/// Stored account. Not `Serialize`: responses go through [`UserProfile`] so the
/// password hash cannot leak.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub avatar: Option<String>,
    pub role: Role,
    pub is_email_verified: bool,
    pub reset_password_token: Option<String>,
    pub reset_password_expire: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public-safe projection of a [`User`].
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub role: &'static str,
    pub is_email_verified: bool,
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            name: self.name.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role.as_str(),
            is_email_verified: self.is_email_verified,
            avatar: self.avatar.clone(),
            created_at: None,
        }
    }

    pub fn profile_with_created_at(&self) -> UserProfile {
        UserProfile {
            created_at: Some(self.created_at),
            ..self.profile()
        }
    }
}

/// Insert request for a new account. Callers pass already-normalized values.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub avatar: Option<String>,
    pub is_email_verified: bool,
}

/// Follower counter for one platform.
#[derive(Debug, Clone)]
pub struct PlatformStat {
    pub platform: Platform,
    pub followers: u64,
    pub last_updated: DateTime<Utc>,
}

const USER_COLUMNS: &str = "id, name, username, email, password_hash, google_id, avatar, role, \
     is_email_verified, reset_password_token, reset_password_expire, created_at, updated_at";

fn timestamp(idx: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, millis))
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get(7)?;
    let reset_expire: Option<i64> = row.get(10)?;
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        username: row.get(2)?,
        email: row.get(3)?,
        password_hash: row.get(4)?,
        google_id: row.get(5)?,
        avatar: row.get(6)?,
        role: Role::from_db(&role),
        is_email_verified: row.get::<_, i32>(8)? == 1,
        reset_password_token: row.get(9)?,
        reset_password_expire: reset_expire.map(|ms| timestamp(10, ms)).transpose()?,
        created_at: timestamp(11, row.get(11)?)?,
        updated_at: timestamp(12, row.get(12)?)?,
    })
}

fn stat_from_row(row: &Row<'_>) -> rusqlite::Result<PlatformStat> {
    let name: String = row.get(0)?;
    let platform = name.parse::<Platform>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let followers: i64 = row.get(1)?;
    Ok(PlatformStat {
        platform,
        followers: u64::try_from(followers)
            .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(1, followers))?,
        last_updated: timestamp(2, row.get(2)?)?,
    })
}

/// Which unique column a failed insert collided on, if any.
fn unique_violation_field(e: &rusqlite::Error) -> Option<&'static str> {
    if let rusqlite::Error::SqliteFailure(err, Some(msg)) = e {
        if err.extended_code == UNIQUE_VIOLATION {
            if msg.contains("users.email") {
                return Some("email");
            }
            if msg.contains("users.username") {
                return Some("username");
            }
        }
    }
    None
}

fn followers_param(followers: u64) -> Result<i64, GatewayError> {
    i64::try_from(followers)
        .map_err(|_| GatewayError::BadRequest("Followers count is too large".to_string()))
}

/// SQLite database wrapper
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database. `":memory:"` gives a private in-memory store.
    pub fn new(path: &str) -> Result<Self, GatewayError> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, GatewayError> {
        self.conn
            .lock()
            .map_err(|_| GatewayError::Internal("database lock poisoned".to_string()))
    }

    fn init_schema(&self) -> Result<(), GatewayError> {
        let conn = self.conn()?;

        // Enable WAL mode for better concurrent read/write performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                username TEXT UNIQUE NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT,
                google_id TEXT UNIQUE,
                avatar TEXT,
                role TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
                is_email_verified INTEGER NOT NULL DEFAULT 0,
                reset_password_token TEXT,
                reset_password_expire INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                CHECK (password_hash IS NOT NULL OR google_id IS NOT NULL)
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS platform_stats (
                platform TEXT PRIMARY KEY CHECK (platform IN
                    ('instagram', 'youtube', 'facebook', 'twitter', 'linkedin', 'github')),
                followers INTEGER NOT NULL DEFAULT 0 CHECK (followers >= 0),
                last_updated INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        Ok(())
    }

    /// Cheap liveness probe for /health.
    pub fn ping(&self) -> Result<(), GatewayError> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i32>(0))?;
        Ok(())
    }

    // ── Users ────────────────────────────────────────────────────────────

    fn find_user_where(
        &self,
        clause: &str,
        value: &str,
    ) -> Result<Option<User>, GatewayError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {clause} LIMIT 1");
        let user = conn
            .query_row(&sql, params![value], user_from_row)
            .optional()?;
        Ok(user)
    }

    pub fn find_user_by_id(&self, id: &str) -> Result<Option<User>, GatewayError> {
        self.find_user_where("id = ?1", id)
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>, GatewayError> {
        self.find_user_where("email = ?1", email)
    }

    pub fn find_user_by_google_id(&self, google_id: &str) -> Result<Option<User>, GatewayError> {
        self.find_user_where("google_id = ?1", google_id)
    }

    /// Login lookup: the identifier may be either an e-mail or a username.
    pub fn find_user_by_login(&self, identifier: &str) -> Result<Option<User>, GatewayError> {
        self.find_user_where("email = ?1 OR username = ?1", identifier)
    }

    pub fn username_exists(&self, username: &str) -> Result<bool, GatewayError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE username = ?1",
            params![username],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Name the field an existing account collides on, e-mail first.
    pub fn find_conflict(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<&'static str>, GatewayError> {
        let conn = self.conn()?;
        let existing: Option<String> = conn
            .query_row(
                "SELECT email FROM users WHERE email = ?1 OR username = ?2 LIMIT 1",
                params![email, username],
                |row| row.get(0),
            )
            .optional()?;
        Ok(existing.map(|found| if found == email { "email" } else { "username" }))
    }

    pub fn create_user(&self, new: &NewUser) -> Result<User, GatewayError> {
        let conn = self.conn()?;
        let now = Utc::now();
        let id = uuid::Uuid::new_v4().to_string();

        conn.execute(
            r#"
            INSERT INTO users (id, name, username, email, password_hash, google_id, avatar,
                               role, is_email_verified, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'user', ?8, ?9, ?9)
            "#,
            params![
                id,
                new.name,
                new.username,
                new.email,
                new.password_hash,
                new.google_id,
                new.avatar,
                new.is_email_verified as i32,
                now.timestamp_millis(),
            ],
        )
        .map_err(|e| match unique_violation_field(&e) {
            Some(field) => GatewayError::UserExists(field),
            None => GatewayError::Database(e),
        })?;

        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        let user = conn.query_row(&sql, params![id], user_from_row)?;
        Ok(user)
    }

    /// Attach a Google identity (and its avatar) to an existing local account.
    pub fn link_google_account(
        &self,
        user_id: &str,
        google_id: &str,
        avatar: Option<&str>,
    ) -> Result<User, GatewayError> {
        let conn = self.conn()?;
        let now = Utc::now().timestamp_millis();

        let rows = conn.execute(
            "UPDATE users SET google_id = ?1, avatar = ?2, updated_at = ?3 WHERE id = ?4",
            params![google_id, avatar, now, user_id],
        )?;
        if rows == 0 {
            return Err(GatewayError::Internal(format!(
                "user {user_id} vanished while linking"
            )));
        }

        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        let user = conn.query_row(&sql, params![user_id], user_from_row)?;
        Ok(user)
    }

    // ── Platform stats ───────────────────────────────────────────────────

    /// All counters, sorted by platform name.
    pub fn list_platform_stats(&self) -> Result<Vec<PlatformStat>, GatewayError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT platform, followers, last_updated FROM platform_stats ORDER BY platform ASC",
        )?;
        let stats = stmt
            .query_map([], stat_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(stats)
    }

    /// Create-or-update one counter and refresh its timestamp.
    pub fn upsert_platform_stat(
        &self,
        platform: Platform,
        followers: u64,
    ) -> Result<PlatformStat, GatewayError> {
        let followers = followers_param(followers)?;
        let conn = self.conn()?;
        upsert_stat(&conn, platform, followers, Utc::now().timestamp_millis())?;

        let stat = conn.query_row(
            "SELECT platform, followers, last_updated FROM platform_stats WHERE platform = ?1",
            params![platform.as_str()],
            stat_from_row,
        )?;
        Ok(stat)
    }

    /// Apply several upserts in one transaction. Either all land or none do.
    pub fn bulk_upsert_platform_stats(
        &self,
        updates: &[(Platform, u64)],
    ) -> Result<(), GatewayError> {
        let rows = updates
            .iter()
            .map(|(p, f)| followers_param(*f).map(|f| (*p, f)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now().timestamp_millis();
        for (platform, followers) in rows {
            upsert_stat(&tx, platform, followers, now)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Wipe every counter and insert `seed`. Used by the seeding binary.
    pub fn replace_platform_stats(&self, seed: &[(Platform, u64)]) -> Result<(), GatewayError> {
        let rows = seed
            .iter()
            .map(|(p, f)| followers_param(*f).map(|f| (*p, f)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM platform_stats", [])?;
        let now = Utc::now().timestamp_millis();
        for (platform, followers) in rows {
            upsert_stat(&tx, platform, followers, now)?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn upsert_stat(
    conn: &Connection,
    platform: Platform,
    followers: i64,
    now: i64,
) -> rusqlite::Result<usize> {
    conn.execute(
        r#"
        INSERT INTO platform_stats (platform, followers, last_updated, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?3, ?3)
        ON CONFLICT(platform) DO UPDATE SET
            followers = excluded.followers,
            last_updated = excluded.last_updated,
            updated_at = excluded.updated_at
        "#,
        params![platform.as_str(), followers, now],
    )
}
