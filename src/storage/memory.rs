//! In-memory store — ordered maps behind a single mutex.
//!
//! Ids come from per-table counters starting at 1. Iteration over a
//! `BTreeMap` keyed by id gives the ascending-id order the [`Store`] trait
//! promises without extra sorting.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use super::{Store, default_badges};
use crate::error::AppError;
use crate::models::{
    Badge, ChatMessage, NewBadge, NewChatMessage, NewOptimization, NewProject, NewUser,
    Optimization, Project, ProjectUpdate, ROLE_USER, User, UserBadge, UserUpdate,
};

struct Table<T> {
    rows: BTreeMap<i64, T>,
    next_id: i64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self { rows: BTreeMap::new(), next_id: 0 }
    }
}

impl<T> Table<T> {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
struct Inner {
    users: Table<User>,
    projects: Table<Project>,
    badges: Table<Badge>,
    user_badges: Table<UserBadge>,
    optimizations: Table<Optimization>,
    chat_messages: Table<ChatMessage>,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let store = Self { inner: Mutex::new(Inner::default()) };
        {
            // A fresh mutex cannot be poisoned.
            let mut inner = store.inner.lock().unwrap_or_else(|p| p.into_inner());
            for badge in default_badges() {
                insert_badge(&mut inner, badge);
            }
        }
        store
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, AppError> {
        self.inner
            .lock()
            .map_err(|_| AppError::Storage("memory store lock poisoned".into()))
    }
}

fn insert_badge(inner: &mut Inner, badge: NewBadge) -> Badge {
    let id = inner.badges.next_id();
    let badge = Badge {
        id,
        name: badge.name,
        description: badge.description,
        icon: badge.icon,
        category: badge.category,
        points: badge.points,
        created_at: Utc::now(),
    };
    inner.badges.rows.insert(id, badge.clone());
    badge
}

impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.lock()?.users.rows.get(&id).cloned())
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self.lock()?.users.rows.values().find(|u| u.username == username).cloned())
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.lock()?.users.rows.values().find(|u| u.email == email).cloned())
    }

    fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut inner = self.lock()?;
        if inner.users.rows.values().any(|u| u.username == user.username) {
            return Err(AppError::Duplicate("username"));
        }
        if inner.users.rows.values().any(|u| u.email == user.email) {
            return Err(AppError::Duplicate("email"));
        }
        let id = inner.users.next_id();
        let now = Utc::now();
        let user = User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            email: user.email,
            name: user.name,
            profile_picture: user.profile_picture,
            role: ROLE_USER.into(),
            created_at: now,
            updated_at: now,
        };
        inner.users.rows.insert(id, user.clone());
        Ok(user)
    }

    fn update_user(&self, id: i64, update: UserUpdate) -> Result<Option<User>, AppError> {
        let mut inner = self.lock()?;
        if let Some(email) = &update.email {
            if inner.users.rows.values().any(|u| u.id != id && &u.email == email) {
                return Err(AppError::Duplicate("email"));
            }
        }
        let Some(user) = inner.users.rows.get_mut(&id) else {
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
        Ok(Some(user.clone()))
    }

    fn list_users(&self) -> Result<Vec<User>, AppError> {
        Ok(self.lock()?.users.rows.values().cloned().collect())
    }

    fn get_project(&self, id: i64) -> Result<Option<Project>, AppError> {
        Ok(self.lock()?.projects.rows.get(&id).cloned())
    }

    fn projects_by_user(&self, user_id: i64) -> Result<Vec<Project>, AppError> {
        Ok(self
            .lock()?
            .projects
            .rows
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    fn create_project(&self, project: NewProject) -> Result<Project, AppError> {
        let mut inner = self.lock()?;
        let id = inner.projects.next_id();
        let now = Utc::now();
        let project = Project {
            id,
            user_id: project.user_id,
            name: project.name,
            url: project.url,
            description: project.description,
            hosting_provider: project.hosting_provider,
            monthly_traffic: project.monthly_traffic,
            carbon_footprint: project.carbon_footprint,
            sustainability_score: project.sustainability_score,
            carbon_saved: project.carbon_saved,
            server_efficiency: project.server_efficiency,
            asset_optimization: project.asset_optimization,
            status: project.status,
            created_at: now,
            updated_at: now,
        };
        inner.projects.rows.insert(id, project.clone());
        Ok(project)
    }

    fn update_project(&self, id: i64, update: ProjectUpdate) -> Result<Option<Project>, AppError> {
        let mut inner = self.lock()?;
        let Some(project) = inner.projects.rows.get_mut(&id) else {
            return Ok(None);
        };
        project.apply(update, Utc::now());
        Ok(Some(project.clone()))
    }

    fn delete_project(&self, id: i64) -> Result<bool, AppError> {
        let mut inner = self.lock()?;
        let removed = inner.projects.rows.remove(&id).is_some();
        if removed {
            inner.optimizations.rows.retain(|_, o| o.project_id != id);
        }
        Ok(removed)
    }

    fn get_badge(&self, id: i64) -> Result<Option<Badge>, AppError> {
        Ok(self.lock()?.badges.rows.get(&id).cloned())
    }

    fn all_badges(&self) -> Result<Vec<Badge>, AppError> {
        Ok(self.lock()?.badges.rows.values().cloned().collect())
    }

    fn create_badge(&self, badge: NewBadge) -> Result<Badge, AppError> {
        let mut inner = self.lock()?;
        if inner.badges.rows.values().any(|b| b.name == badge.name) {
            return Err(AppError::Storage(format!("badge '{}' already exists", badge.name)));
        }
        Ok(insert_badge(&mut inner, badge))
    }

    fn user_badges(&self, user_id: i64) -> Result<Vec<Badge>, AppError> {
        let inner = self.lock()?;
        Ok(inner
            .user_badges
            .rows
            .values()
            .filter(|ub| ub.user_id == user_id)
            .filter_map(|ub| inner.badges.rows.get(&ub.badge_id).cloned())
            .collect())
    }

    fn assign_badge(&self, user_id: i64, badge_id: i64) -> Result<UserBadge, AppError> {
        let mut inner = self.lock()?;
        if let Some(existing) = inner
            .user_badges
            .rows
            .values()
            .find(|ub| ub.user_id == user_id && ub.badge_id == badge_id)
        {
            return Ok(existing.clone());
        }
        if !inner.badges.rows.contains_key(&badge_id) {
            return Err(AppError::Storage(format!("no badge with id {badge_id}")));
        }
        let id = inner.user_badges.next_id();
        let award = UserBadge { id, user_id, badge_id, achieved_at: Utc::now() };
        inner.user_badges.rows.insert(id, award.clone());
        Ok(award)
    }

    fn optimizations_by_project(&self, project_id: i64) -> Result<Vec<Optimization>, AppError> {
        Ok(self
            .lock()?
            .optimizations
            .rows
            .values()
            .filter(|o| o.project_id == project_id)
            .cloned()
            .collect())
    }

    fn create_optimization(&self, o: NewOptimization) -> Result<Optimization, AppError> {
        let mut inner = self.lock()?;
        let id = inner.optimizations.next_id();
        let optimization = Optimization {
            id,
            project_id: o.project_id,
            title: o.title,
            description: o.description,
            category: o.category,
            impact: o.impact,
            status: o.status,
            score: o.score,
            recommendations: o.recommendations,
            created_at: Utc::now(),
        };
        inner.optimizations.rows.insert(id, optimization.clone());
        Ok(optimization)
    }

    fn chat_messages_by_user(&self, user_id: i64) -> Result<Vec<ChatMessage>, AppError> {
        let mut messages: Vec<ChatMessage> = self
            .lock()?
            .chat_messages
            .rows
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(messages)
    }

    fn create_chat_message(&self, m: NewChatMessage) -> Result<ChatMessage, AppError> {
        let mut inner = self.lock()?;
        let id = inner.chat_messages.next_id();
        let message = ChatMessage {
            id,
            user_id: m.user_id,
            content: m.content,
            role: m.role,
            created_at: Utc::now(),
        };
        inner.chat_messages.rows.insert(id, message.clone());
        Ok(message)
    }
}
