//! Persistence for users, projects, badges, optimizations and chat history.
//!
//! [`Store`] is the seam between the HTTP layer and the backends. Calls are
//! blocking and short; both backends serialise access behind a mutex.
//!
//! Backends:
//! - [`memory::MemoryStore`] — process-local maps, lost on restart.
//! - [`sqlite::SqliteStore`] — a single SQLite file (feature `store-sqlite`).
//!
//! Every backend seeds [`default_badges`] when opened.

pub mod memory;
#[cfg(feature = "store-sqlite")]
pub mod sqlite;

use std::sync::Arc;

use tracing::info;

use crate::config::{Config, StorageBackend};
use crate::error::AppError;
use crate::models::{
    Badge, ChatMessage, NewBadge, NewChatMessage, NewOptimization, NewProject, NewUser,
    Optimization, Project, ProjectUpdate, User, UserBadge, UserUpdate,
};

pub type SharedStore = Arc<dyn Store>;

pub trait Store: Send + Sync {
    /// Backend name for logs and the health endpoint.
    fn backend(&self) -> &'static str;

    // ── Users ─────────────────────────────────────────────────────────

    fn get_user(&self, id: i64) -> Result<Option<User>, AppError>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    fn create_user(&self, user: NewUser) -> Result<User, AppError>;
    /// Returns `None` when no user has `id`.
    fn update_user(&self, id: i64, update: UserUpdate) -> Result<Option<User>, AppError>;
    /// All users, ascending by id.
    fn list_users(&self) -> Result<Vec<User>, AppError>;

    // ── Projects ──────────────────────────────────────────────────────

    fn get_project(&self, id: i64) -> Result<Option<Project>, AppError>;
    /// The user's projects, ascending by id.
    fn projects_by_user(&self, user_id: i64) -> Result<Vec<Project>, AppError>;
    fn create_project(&self, project: NewProject) -> Result<Project, AppError>;
    fn update_project(&self, id: i64, update: ProjectUpdate) -> Result<Option<Project>, AppError>;
    /// Deletes the project and its optimizations. Returns `false` if absent.
    fn delete_project(&self, id: i64) -> Result<bool, AppError>;

    // ── Badges ────────────────────────────────────────────────────────

    fn get_badge(&self, id: i64) -> Result<Option<Badge>, AppError>;
    fn all_badges(&self) -> Result<Vec<Badge>, AppError>;
    fn create_badge(&self, badge: NewBadge) -> Result<Badge, AppError>;

    /// Badges held by the user, in the order they were awarded.
    fn user_badges(&self, user_id: i64) -> Result<Vec<Badge>, AppError>;
    /// Award a badge. Awarding a badge the user already holds returns the
    /// existing record unchanged.
    fn assign_badge(&self, user_id: i64, badge_id: i64) -> Result<UserBadge, AppError>;

    // ── Optimizations ─────────────────────────────────────────────────

    fn optimizations_by_project(&self, project_id: i64) -> Result<Vec<Optimization>, AppError>;
    fn create_optimization(&self, optimization: NewOptimization) -> Result<Optimization, AppError>;

    // ── Chat ──────────────────────────────────────────────────────────

    /// The user's chat history, oldest first.
    fn chat_messages_by_user(&self, user_id: i64) -> Result<Vec<ChatMessage>, AppError>;
    fn create_chat_message(&self, message: NewChatMessage) -> Result<ChatMessage, AppError>;
}

pub const GREEN_HOST_PIONEER: &str = "Green Host Pioneer";
pub const SPEED_OPTIMIZER: &str = "Speed Optimizer";
pub const COMPRESSION_MASTER: &str = "Compression Master";
pub const IMAGE_OPTIMIZER: &str = "Image Optimizer";
pub const CLEAN_CODE_HERO: &str = "Clean Code Hero";
pub const CARBON_REDUCER: &str = "Carbon Reducer";

/// The badge catalogue every store starts with.
pub fn default_badges() -> Vec<NewBadge> {
    let badge = |name: &str, description: &str, icon: &str, category: &str, points: i64| NewBadge {
        name: name.into(),
        description: description.into(),
        icon: icon.into(),
        category: category.into(),
        points,
    };
    vec![
        badge(GREEN_HOST_PIONEER, "Switched to a green hosting provider", "eco", "hosting", 100),
        badge(SPEED_OPTIMIZER, "Improved website loading speed by 50%", "speed", "performance", 75),
        badge(COMPRESSION_MASTER, "Reduced asset sizes by at least 40%", "compress", "optimization", 50),
        badge(IMAGE_OPTIMIZER, "Optimized all images on your website", "image", "optimization", 50),
        badge(CLEAN_CODE_HERO, "Removed unnecessary code and dependencies", "code", "code", 75),
        badge(CARBON_REDUCER, "Reduced carbon footprint by at least 30%", "public", "carbon", 100),
    ]
}

/// Open the backend selected in `config.storage`.
pub fn open(config: &Config) -> Result<SharedStore, AppError> {
    match config.storage.backend {
        StorageBackend::Memory => {
            info!("using in-memory store");
            Ok(Arc::new(memory::MemoryStore::new()))
        }
        #[cfg(feature = "store-sqlite")]
        StorageBackend::Sqlite => {
            let path = config.db_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::Storage(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
            info!(path = %path.display(), "using sqlite store");
            Ok(Arc::new(sqlite::SqliteStore::open(&path)?))
        }
        #[cfg(not(feature = "store-sqlite"))]
        StorageBackend::Sqlite => Err(AppError::Config(
            "storage.backend = \"sqlite\" requires the store-sqlite feature".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn default_badge_names_are_unique() {
        let badges = default_badges();
        let names: HashSet<_> = badges.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names.len(), 6);
        assert!(names.contains(CARBON_REDUCER));
    }

    #[test]
    fn open_memory_store_seeds_badges() {
        let cfg = Config::test_default(std::path::Path::new("/tmp"));
        let store = open(&cfg).unwrap();
        assert_eq!(store.backend(), "memory");
        assert_eq!(store.all_badges().unwrap().len(), 6);
    }
}
