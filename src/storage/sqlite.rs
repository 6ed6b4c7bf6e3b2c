//! SQLite-backed store.
//!
//! One database file holds every table. The schema version lives in
//! `PRAGMA user_version`; `init_schema` runs the DDL only when the file is
//! older than [`SCHEMA_VERSION`]. Timestamps are stored as text through
//! rusqlite's chrono support, recommendation lists as JSON text.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use tracing::debug;

use super::{Store, default_badges};
use crate::error::AppError;
use crate::models::{
    Badge, ChatMessage, NewBadge, NewChatMessage, NewOptimization, NewProject, NewUser,
    Optimization, Project, ProjectUpdate, ROLE_USER, User, UserBadge, UserUpdate,
};

/// Schema version stored in `PRAGMA user_version`.
pub(crate) const SCHEMA_VERSION: i64 = 1;

const USER_COLUMNS: &str =
    "id, username, password, email, name, profile_picture, role, created_at, updated_at";
const PROJECT_COLUMNS: &str = "id, user_id, name, url, description, hosting_provider, \
     monthly_traffic, carbon_footprint, sustainability_score, carbon_saved, server_efficiency, \
     asset_optimization, status, created_at, updated_at";
const BADGE_COLUMNS: &str = "id, name, description, icon, category, points, created_at";
const OPTIMIZATION_COLUMNS: &str =
    "id, project_id, title, description, category, impact, status, score, recommendations, created_at";
const CHAT_COLUMNS: &str = "id, user_id, content, role, created_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and seed the badge catalogue.
    pub fn open(path: &Path) -> Result<Self, AppError> {
        let conn = open_conn(path)?;
        Self::from_connection(conn)
    }

    /// A private in-memory database, mainly for tests.
    pub fn open_in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Storage(format!("sqlite: open in-memory: {e}")))?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| AppError::Storage(format!("sqlite: set foreign_keys ON: {e}")))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, AppError> {
        let version: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .map_err(|e| AppError::Storage(format!("sqlite: read user_version: {e}")))?;
        if version < SCHEMA_VERSION {
            init_schema(&conn)?;
        }
        for badge in default_badges() {
            conn.execute(
                "INSERT OR IGNORE INTO badges (name, description, icon, category, points, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![badge.name, badge.description, badge.icon, badge.category, badge.points, Utc::now()],
            )
            .map_err(sql_err("seed badges"))?;
        }
        debug!(version, "sqlite store ready");
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.conn
            .lock()
            .map_err(|_| AppError::Storage("sqlite connection lock poisoned".into()))
    }
}

/// Open a SQLite connection to `db_path` and apply recommended pragmas.
///
/// - `journal_mode = WAL` — concurrent readers alongside a writer.
/// - `foreign_keys = ON` — enforce the `REFERENCES` clauses.
/// - `busy_timeout = 5000` — wait up to 5 s before returning `SQLITE_BUSY`.
fn open_conn(db_path: &Path) -> Result<Connection, AppError> {
    let conn = Connection::open(db_path)
        .map_err(|e| AppError::Storage(format!("sqlite: open {}: {e}", db_path.display())))?;

    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(|e| AppError::Storage(format!("sqlite: set journal_mode WAL: {e}")))?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(|e| AppError::Storage(format!("sqlite: set foreign_keys ON: {e}")))?;
    conn.pragma_update(None, "busy_timeout", 5000)
        .map_err(|e| AppError::Storage(format!("sqlite: set busy_timeout: {e}")))?;

    Ok(conn)
}

fn init_schema(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            name TEXT,
            profile_picture TEXT,
            role TEXT NOT NULL DEFAULT 'user',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS projects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id),
            name TEXT NOT NULL,
            url TEXT NOT NULL,
            description TEXT,
            hosting_provider TEXT,
            monthly_traffic TEXT,
            carbon_footprint REAL,
            sustainability_score INTEGER,
            carbon_saved REAL NOT NULL DEFAULT 0,
            server_efficiency INTEGER,
            asset_optimization INTEGER,
            status TEXT NOT NULL DEFAULT 'new',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS projects_user_id ON projects(user_id);

        CREATE TABLE IF NOT EXISTS badges (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL,
            icon TEXT NOT NULL,
            category TEXT NOT NULL,
            points INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS user_badges (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id),
            badge_id INTEGER NOT NULL REFERENCES badges(id),
            achieved_at TEXT NOT NULL,
            UNIQUE (user_id, badge_id)
        );

        CREATE TABLE IF NOT EXISTS optimizations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id INTEGER NOT NULL REFERENCES projects(id),
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT 'general',
            impact TEXT NOT NULL DEFAULT 'medium',
            status TEXT NOT NULL DEFAULT 'pending',
            score INTEGER NOT NULL DEFAULT 0,
            recommendations TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS optimizations_project_id ON optimizations(project_id);

        CREATE TABLE IF NOT EXISTS chat_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id),
            content TEXT NOT NULL,
            role TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS chat_messages_user_id ON chat_messages(user_id);

        PRAGMA user_version = 1;
        ",
    )
    .map_err(|e| AppError::Storage(format!("sqlite: initialize schema: {e}")))
}

fn sql_err(context: &'static str) -> impl Fn(rusqlite::Error) -> AppError {
    move |e| AppError::Storage(format!("sqlite: {context}: {e}"))
}

/// Like [`sql_err`], but a UNIQUE violation on `users.username` or
/// `users.email` becomes [`AppError::Duplicate`].
fn user_write_err(context: &'static str) -> impl Fn(rusqlite::Error) -> AppError {
    move |e| {
        let field = match &e {
            rusqlite::Error::SqliteFailure(f, Some(msg)) if f.code == ErrorCode::ConstraintViolation => {
                if msg.contains("users.username") {
                    Some("username")
                } else if msg.contains("users.email") {
                    Some("email")
                } else {
                    None
                }
            }
            _ => None,
        };
        match field {
            Some(field) => AppError::Duplicate(field),
            None => AppError::Storage(format!("sqlite: {context}: {e}")),
        }
    }
}

// ── Row mapping ───────────────────────────────────────────────────────────────

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        email: row.get(3)?,
        name: row.get(4)?,
        profile_picture: row.get(5)?,
        role: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        url: row.get(3)?,
        description: row.get(4)?,
        hosting_provider: row.get(5)?,
        monthly_traffic: row.get(6)?,
        carbon_footprint: row.get(7)?,
        sustainability_score: row.get(8)?,
        carbon_saved: row.get(9)?,
        server_efficiency: row.get(10)?,
        asset_optimization: row.get(11)?,
        status: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

fn badge_from_row(row: &Row<'_>) -> rusqlite::Result<Badge> {
    Ok(Badge {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        icon: row.get(3)?,
        category: row.get(4)?,
        points: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn optimization_from_row(row: &Row<'_>) -> rusqlite::Result<Optimization> {
    let recommendations: Option<String> = row.get(8)?;
    let recommendations = recommendations
        .map(|text| serde_json::from_str::<Vec<String>>(&text))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?;
    Ok(Optimization {
        id: row.get(0)?,
        project_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        impact: row.get(5)?,
        status: row.get(6)?,
        score: row.get(7)?,
        recommendations,
        created_at: row.get(9)?,
    })
}

fn chat_from_row(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
    Ok(ChatMessage {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content: row.get(2)?,
        role: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn fetch_user(conn: &Connection, id: i64) -> Result<Option<User>, AppError> {
    conn.query_row(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"), [id], user_from_row)
        .optional()
        .map_err(sql_err("get user"))
}

fn fetch_project(conn: &Connection, id: i64) -> Result<Option<Project>, AppError> {
    conn.query_row(
        &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"),
        [id],
        project_from_row,
    )
    .optional()
    .map_err(sql_err("get project"))
}

fn fetch_badge(conn: &Connection, id: i64) -> Result<Option<Badge>, AppError> {
    conn.query_row(&format!("SELECT {BADGE_COLUMNS} FROM badges WHERE id = ?1"), [id], badge_from_row)
        .optional()
        .map_err(sql_err("get badge"))
}

impl Store for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let conn = self.conn()?;
        fetch_user(&conn, id)
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        self.conn()?
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                [username],
                user_from_row,
            )
            .optional()
            .map_err(sql_err("get user by username"))
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.conn()?
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                [email],
                user_from_row,
            )
            .optional()
            .map_err(sql_err("get user by email"))
    }

    fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let conn = self.conn()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO users (username, password, email, name, profile_picture, role, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![user.username, user.password_hash, user.email, user.name, user.profile_picture, ROLE_USER, now],
        )
        .map_err(user_write_err("create user"))?;
        let id = conn.last_insert_rowid();
        fetch_user(&conn, id)?.ok_or_else(|| AppError::Storage(format!("user {id} vanished after insert")))
    }

    fn update_user(&self, id: i64, update: UserUpdate) -> Result<Option<User>, AppError> {
        let conn = self.conn()?;
        let Some(mut user) = fetch_user(&conn, id)? else {
            return Ok(None);
        };
        if let Some(v) = update.name {
            user.name = Some(v);
        }
        if let Some(v) = update.email {
            user.email = v;
        }
        if let Some(v) = update.profile_picture {
            user.profile_picture = Some(v);
        }
        user.updated_at = Utc::now();
        conn.execute(
            "UPDATE users SET name = ?1, email = ?2, profile_picture = ?3, updated_at = ?4 WHERE id = ?5",
            params![user.name, user.email, user.profile_picture, user.updated_at, id],
        )
        .map_err(user_write_err("update user"))?;
        Ok(Some(user))
    }

    fn list_users(&self) -> Result<Vec<User>, AppError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
            .map_err(sql_err("list users"))?;
        let rows = stmt.query_map([], user_from_row).map_err(sql_err("list users"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err("list users"))
    }

    fn get_project(&self, id: i64) -> Result<Option<Project>, AppError> {
        let conn = self.conn()?;
        fetch_project(&conn, id)
    }

    fn projects_by_user(&self, user_id: i64) -> Result<Vec<Project>, AppError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE user_id = ?1 ORDER BY id"))
            .map_err(sql_err("list projects"))?;
        let rows = stmt.query_map([user_id], project_from_row).map_err(sql_err("list projects"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err("list projects"))
    }

    fn create_project(&self, p: NewProject) -> Result<Project, AppError> {
        let conn = self.conn()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO projects (user_id, name, url, description, hosting_provider, monthly_traffic,
                 carbon_footprint, sustainability_score, carbon_saved, server_efficiency,
                 asset_optimization, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
            params![
                p.user_id,
                p.name,
                p.url,
                p.description,
                p.hosting_provider,
                p.monthly_traffic,
                p.carbon_footprint,
                p.sustainability_score,
                p.carbon_saved,
                p.server_efficiency,
                p.asset_optimization,
                p.status,
                now,
            ],
        )
        .map_err(sql_err("create project"))?;
        let id = conn.last_insert_rowid();
        fetch_project(&conn, id)?
            .ok_or_else(|| AppError::Storage(format!("project {id} vanished after insert")))
    }

    fn update_project(&self, id: i64, update: ProjectUpdate) -> Result<Option<Project>, AppError> {
        let conn = self.conn()?;
        let Some(mut p) = fetch_project(&conn, id)? else {
            return Ok(None);
        };
        p.apply(update, Utc::now());
        conn.execute(
            "UPDATE projects SET name = ?1, description = ?2, hosting_provider = ?3,
                 monthly_traffic = ?4, carbon_footprint = ?5, sustainability_score = ?6,
                 carbon_saved = ?7, server_efficiency = ?8, asset_optimization = ?9,
                 status = ?10, updated_at = ?11
             WHERE id = ?12",
            params![
                p.name,
                p.description,
                p.hosting_provider,
                p.monthly_traffic,
                p.carbon_footprint,
                p.sustainability_score,
                p.carbon_saved,
                p.server_efficiency,
                p.asset_optimization,
                p.status,
                p.updated_at,
                id,
            ],
        )
        .map_err(sql_err("update project"))?;
        Ok(Some(p))
    }

    fn delete_project(&self, id: i64) -> Result<bool, AppError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(sql_err("begin delete project"))?;
        tx.execute("DELETE FROM optimizations WHERE project_id = ?1", [id])
            .map_err(sql_err("delete optimizations"))?;
        let removed = tx
            .execute("DELETE FROM projects WHERE id = ?1", [id])
            .map_err(sql_err("delete project"))?;
        tx.commit().map_err(sql_err("commit delete project"))?;
        Ok(removed > 0)
    }

    fn get_badge(&self, id: i64) -> Result<Option<Badge>, AppError> {
        let conn = self.conn()?;
        fetch_badge(&conn, id)
    }

    fn all_badges(&self) -> Result<Vec<Badge>, AppError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {BADGE_COLUMNS} FROM badges ORDER BY id"))
            .map_err(sql_err("list badges"))?;
        let rows = stmt.query_map([], badge_from_row).map_err(sql_err("list badges"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err("list badges"))
    }

    fn create_badge(&self, badge: NewBadge) -> Result<Badge, AppError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO badges (name, description, icon, category, points, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![badge.name, badge.description, badge.icon, badge.category, badge.points, Utc::now()],
        )
        .map_err(sql_err("create badge"))?;
        let id = conn.last_insert_rowid();
        fetch_badge(&conn, id)?.ok_or_else(|| AppError::Storage(format!("badge {id} vanished after insert")))
    }

    fn user_badges(&self, user_id: i64) -> Result<Vec<Badge>, AppError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT b.id, b.name, b.description, b.icon, b.category, b.points, b.created_at
                 FROM user_badges ub JOIN badges b ON b.id = ub.badge_id
                 WHERE ub.user_id = ?1 ORDER BY ub.id",
            )
            .map_err(sql_err("list user badges"))?;
        let rows = stmt.query_map([user_id], badge_from_row).map_err(sql_err("list user badges"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err("list user badges"))
    }

    fn assign_badge(&self, user_id: i64, badge_id: i64) -> Result<UserBadge, AppError> {
        let conn = self.conn()?;
        let existing = |conn: &Connection| {
            conn.query_row(
                "SELECT id, user_id, badge_id, achieved_at FROM user_badges
                 WHERE user_id = ?1 AND badge_id = ?2",
                [user_id, badge_id],
                |row| {
                    Ok(UserBadge {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        badge_id: row.get(2)?,
                        achieved_at: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(sql_err("get user badge"))
        };
        if let Some(award) = existing(&conn)? {
            return Ok(award);
        }
        conn.execute(
            "INSERT INTO user_badges (user_id, badge_id, achieved_at) VALUES (?1, ?2, ?3)",
            params![user_id, badge_id, Utc::now()],
        )
        .map_err(sql_err("assign badge"))?;
        existing(&conn)?.ok_or_else(|| AppError::Storage("badge award vanished after insert".into()))
    }

    fn optimizations_by_project(&self, project_id: i64) -> Result<Vec<Optimization>, AppError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {OPTIMIZATION_COLUMNS} FROM optimizations WHERE project_id = ?1 ORDER BY id"
            ))
            .map_err(sql_err("list optimizations"))?;
        let rows = stmt
            .query_map([project_id], optimization_from_row)
            .map_err(sql_err("list optimizations"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err("list optimizations"))
    }

    fn create_optimization(&self, o: NewOptimization) -> Result<Optimization, AppError> {
        let recommendations = o
            .recommendations
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| AppError::Storage(format!("serialise recommendations: {e}")))?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO optimizations (project_id, title, description, category, impact, status,
                 score, recommendations, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                o.project_id,
                o.title,
                o.description,
                o.category,
                o.impact,
                o.status,
                o.score,
                recommendations,
                Utc::now(),
            ],
        )
        .map_err(sql_err("create optimization"))?;
        let id = conn.last_insert_rowid();
        conn.query_row(
            &format!("SELECT {OPTIMIZATION_COLUMNS} FROM optimizations WHERE id = ?1"),
            [id],
            optimization_from_row,
        )
        .map_err(sql_err("get optimization"))
    }

    fn chat_messages_by_user(&self, user_id: i64) -> Result<Vec<ChatMessage>, AppError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {CHAT_COLUMNS} FROM chat_messages WHERE user_id = ?1 ORDER BY created_at, id"
            ))
            .map_err(sql_err("list chat messages"))?;
        let rows = stmt.query_map([user_id], chat_from_row).map_err(sql_err("list chat messages"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sql_err("list chat messages"))
    }

    fn create_chat_message(&self, m: NewChatMessage) -> Result<ChatMessage, AppError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO chat_messages (user_id, content, role, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![m.user_id, m.content, m.role, Utc::now()],
        )
        .map_err(sql_err("create chat message"))?;
        let id = conn.last_insert_rowid();
        conn.query_row(
            &format!("SELECT {CHAT_COLUMNS} FROM chat_messages WHERE id = ?1"),
            [id],
            chat_from_row,
        )
        .map_err(sql_err("get chat message"))
    }
}
