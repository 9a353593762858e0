//! In-memory backends for tests and local development without the platform.

use crate::models::{
    ActivityLog, AdminRole, AdminUser, AuthSession, AuthenticatedUser, CatalogStats, Counter,
    Document, DocumentChanges, DocumentPage, DocumentQuery, DocumentStats,
};
use crate::services::auth::AuthProvider;
use crate::services::store::DocumentStore;
use crate::utils::jwt;
use async_trait::async_trait;
use chrono::Utc;
use library_core::error::AppError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

fn lock<'a, T>(mutex: &'a Mutex<T>, name: &str) -> Result<MutexGuard<'a, T>, AppError> {
    mutex
        .lock()
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("{} mutex poisoned: {}", name, e)))
}

pub struct MemoryStore {
    documents: Mutex<HashMap<Uuid, Document>>,
    stats: Mutex<HashMap<Uuid, DocumentStats>>,
    admins: Mutex<HashMap<Uuid, AdminUser>>,
    activity: Mutex<Vec<ActivityLog>>,
    fail_inserts: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
            stats: Mutex::new(HashMap::new()),
            admins: Mutex::new(HashMap::new()),
            activity: Mutex::new(Vec::new()),
            fail_inserts: AtomicBool::new(false),
        }
    }

    pub fn add_admin(&self, user_id: Uuid, email: &str, role: AdminRole) -> Result<AdminUser, AppError> {
        let admin = AdminUser {
            id: Uuid::new_v4(),
            user_id,
            email: email.to_string(),
            role,
            is_active: true,
            created_at: Utc::now(),
        };
        lock(&self.admins, "admins")?.insert(user_id, admin.clone());
        Ok(admin)
    }

    pub fn deactivate_admin(&self, user_id: Uuid) -> Result<(), AppError> {
        if let Some(admin) = lock(&self.admins, "admins")?.get_mut(&user_id) {
            admin.is_active = false;
        }
        Ok(())
    }

    /// Make subsequent inserts fail, to exercise compensation paths.
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn activity(&self) -> Vec<ActivityLog> {
        self.activity
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn document_count(&self) -> usize {
        self.documents.lock().map(|d| d.len()).unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_documents(&self, query: &DocumentQuery) -> Result<DocumentPage, AppError> {
        let documents = lock(&self.documents, "documents")?;

        let mut matching: Vec<Document> = documents
            .values()
            .filter(|d| query.matches(d))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let documents = matching
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(query.limit).unwrap_or(usize::MAX))
            .collect();

        Ok(DocumentPage { documents, total })
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>, AppError> {
        Ok(lock(&self.documents, "documents")?.get(&id).cloned())
    }

    async fn insert_document(&self, document: &Document) -> Result<Document, AppError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(AppError::BackendError(anyhow::anyhow!(
                "insert_document failed: simulated outage"
            )));
        }

        lock(&self.documents, "documents")?.insert(document.id, document.clone());
        lock(&self.stats, "stats")?.insert(document.id, DocumentStats::empty(document.id));
        Ok(document.clone())
    }

    async fn update_document(
        &self,
        id: Uuid,
        changes: &DocumentChanges,
    ) -> Result<Option<Document>, AppError> {
        let mut documents = lock(&self.documents, "documents")?;
        Ok(documents.get_mut(&id).map(|document| {
            changes.apply_to(document);
            document.clone()
        }))
    }

    async fn increment_counter(&self, id: Uuid, counter: Counter) -> Result<(), AppError> {
        let mut stats = lock(&self.stats, "stats")?;
        let entry = stats.entry(id).or_insert_with(|| DocumentStats::empty(id));
        let now = Utc::now();
        match counter {
            Counter::Views => {
                entry.view_count += 1;
                entry.last_viewed_at = Some(now);
            }
            Counter::Downloads => {
                entry.download_count += 1;
                entry.last_downloaded_at = Some(now);
            }
        }
        Ok(())
    }

    async fn document_stats(&self, id: Uuid) -> Result<Option<DocumentStats>, AppError> {
        Ok(lock(&self.stats, "stats")?.get(&id).cloned())
    }

    async fn catalog_stats(&self) -> Result<CatalogStats, AppError> {
        let mut stats = CatalogStats::default();
        for document in lock(&self.documents, "documents")?.values() {
            stats.record(
                document.document_type,
                &document.category,
                document.file_size,
                document.status,
            );
        }
        for counters in lock(&self.stats, "stats")?.values() {
            stats.record_counters(counters.view_count, counters.download_count);
        }
        Ok(stats)
    }

    async fn find_admin(&self, user_id: Uuid) -> Result<Option<AdminUser>, AppError> {
        Ok(lock(&self.admins, "admins")?
            .get(&user_id)
            .filter(|a| a.is_active)
            .cloned())
    }

    async fn log_activity(&self, entry: &ActivityLog) -> Result<(), AppError> {
        lock(&self.activity, "activity")?.push(entry.clone());
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

struct Account {
    password: String,
    user: AuthenticatedUser,
}

/// Auth provider holding accounts and issued tokens in memory.
pub struct MockAuthProvider {
    accounts: Mutex<HashMap<String, Account>>,
    sessions: Mutex<HashMap<String, AuthenticatedUser>>,
    token_ttl_seconds: i64,
    unavailable: AtomicBool,
}

impl Default for MockAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAuthProvider {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            token_ttl_seconds: 3600,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make the health check report the provider as down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn add_user(&self, email: &str, password: &str) -> Result<AuthenticatedUser, AppError> {
        let user = AuthenticatedUser {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
        };
        lock(&self.accounts, "accounts")?.insert(
            email.to_lowercase(),
            Account {
                password: password.to_string(),
                user: user.clone(),
            },
        );
        Ok(user)
    }

    /// Issue a token for `user` without going through sign-in.
    pub fn issue_token(&self, user: &AuthenticatedUser) -> Result<String, AppError> {
        let token = jwt::encode_unsigned(&serde_json::json!({
            "sub": user.id,
            "email": user.email,
            "exp": Utc::now().timestamp() + self.token_ttl_seconds,
            "jti": Uuid::new_v4(),
        }));
        lock(&self.sessions, "sessions")?.insert(token.clone(), user.clone());
        Ok(token)
    }
}

#[async_trait]
impl AuthProvider for MockAuthProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AppError> {
        let user = {
            let accounts = lock(&self.accounts, "accounts")?;
            match accounts.get(&email.to_lowercase()) {
                Some(account) if account.password == password => account.user.clone(),
                _ => {
                    return Err(AppError::Unauthorized(anyhow::anyhow!(
                        "Invalid email or password"
                    )))
                }
            }
        };

        let access_token = self.issue_token(&user)?;
        Ok(AuthSession {
            access_token,
            refresh_token: Some(Uuid::new_v4().to_string()),
            expires_in: self.token_ttl_seconds,
            user,
        })
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthenticatedUser, AppError> {
        lock(&self.sessions, "sessions")?
            .get(access_token)
            .cloned()
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token")))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AppError> {
        lock(&self.sessions, "sessions")?.remove(access_token);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::ServiceUnavailable(
                "Auth provider unreachable".to_string(),
            ));
        }
        Ok(())
    }
}
