//! SQLite storage implementation
//!
//! Several worker processes may open the same database file. WAL mode and a
//! busy timeout let their short statements interleave; the claim update's
//! `assignee IS NULL` guard is what keeps ownership exclusive.

use crate::config::PriorityConfig;
use crate::state::{NewTask, Task};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{GraphStore, StorageError, StorageResult, TaskQueue};
use crate::storage::{MethodStats, RepoRecord, UserRecord};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::time::Duration;

const TASK_COLUMNS: &str = "task_id, login, user_id, reponame, repo_id, root_login, task_type,
     method, assignee, assigned_dt, completed_dt, success";

/// How long a statement waits for another process's write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database file and initializes the schema
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        task_id: row.get(0)?,
        login: row.get(1)?,
        user_id: row.get(2)?,
        reponame: row.get(3)?,
        repo_id: row.get(4)?,
        root_login: row.get(5)?,
        task_type: row.get(6)?,
        method: row.get(7)?,
        assignee: row.get(8)?,
        assigned_dt: row.get(9)?,
        completed_dt: row.get(10)?,
        success: row.get(11)?,
    })
}

impl TaskQueue for SqliteStorage {
    fn select_candidate(&self, priority: &PriorityConfig) -> StorageResult<Option<Task>> {
        let query = format!(
            "SELECT {} FROM queue
             WHERE assignee IS NULL
             ORDER BY {}, task_id
             LIMIT 1",
            TASK_COLUMNS,
            priority.bucket_sql()
        );

        let task = self
            .conn
            .query_row(&query, [], task_from_row)
            .optional()?;
        Ok(task)
    }

    fn try_assign(
        &mut self,
        candidate: &Task,
        worker_id: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "UPDATE queue SET assignee = ?1, assigned_dt = ?2
             WHERE login = ?3 AND method = ?4 AND assignee IS NULL",
            params![worker_id, at, candidate.login, candidate.method],
        )?;
        Ok(changed == 1)
    }

    fn complete(
        &mut self,
        login: &str,
        method: &str,
        success: bool,
        completed_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE queue SET completed_dt = ?1, success = ?2 WHERE login = ?3 AND method = ?4",
            params![completed_at, success, login, method],
        )?;

        if changed == 0 {
            return Err(StorageError::TaskNotFound {
                login: login.to_string(),
                method: method.to_string(),
            });
        }
        Ok(())
    }

    fn release(&mut self, login: &str, method: &str) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE queue SET assignee = NULL, assigned_dt = NULL, completed_dt = NULL, success = NULL
             WHERE login = ?1 AND method = ?2",
            params![login, method],
        )?;

        if changed == 0 {
            return Err(StorageError::TaskNotFound {
                login: login.to_string(),
                method: method.to_string(),
            });
        }
        Ok(())
    }

    fn complete_held(
        &mut self,
        login: &str,
        method: &str,
        worker_id: &str,
        success: bool,
        completed_at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "UPDATE queue SET completed_dt = ?1, success = ?2
             WHERE login = ?3 AND method = ?4 AND assignee = ?5",
            params![completed_at, success, login, method, worker_id],
        )?;
        Ok(changed == 1)
    }

    fn release_held(
        &mut self,
        login: &str,
        method: &str,
        worker_id: &str,
    ) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "UPDATE queue SET assignee = NULL, assigned_dt = NULL, completed_dt = NULL, success = NULL
             WHERE login = ?1 AND method = ?2 AND assignee = ?3",
            params![login, method, worker_id],
        )?;
        Ok(changed == 1)
    }

    fn enqueue(&mut self, task: &NewTask) -> StorageResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO queue
             (login, user_id, reponame, repo_id, root_login, task_type, method)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                task.login,
                task.user_id,
                task.reponame,
                task.repo_id,
                task.root_login,
                task.task_type,
                task.method
            ],
        )?;
        Ok(inserted == 1)
    }

    fn get_task(&self, login: &str, method: &str) -> StorageResult<Option<Task>> {
        let query = format!(
            "SELECT {} FROM queue WHERE login = ?1 AND method = ?2",
            TASK_COLUMNS
        );
        let task = self
            .conn
            .query_row(&query, params![login, method], task_from_row)
            .optional()?;
        Ok(task)
    }

    fn requeue_stale(&mut self, cutoff: DateTime<Utc>) -> StorageResult<usize> {
        let released = self.conn.execute(
            "UPDATE queue SET assignee = NULL, assigned_dt = NULL, completed_dt = NULL, success = NULL
             WHERE assignee IS NOT NULL AND completed_dt IS NULL AND assigned_dt < ?1",
            params![cutoff],
        )?;
        Ok(released)
    }

    fn queue_stats(&self) -> StorageResult<Vec<MethodStats>> {
        let mut stmt = self.conn.prepare(
            "SELECT method,
                    SUM(CASE WHEN assignee IS NULL THEN 1 ELSE 0 END),
                    SUM(CASE WHEN assignee IS NOT NULL AND success IS NULL THEN 1 ELSE 0 END),
                    SUM(CASE WHEN success = 1 THEN 1 ELSE 0 END),
                    SUM(CASE WHEN success = 0 THEN 1 ELSE 0 END)
             FROM queue
             GROUP BY method
             ORDER BY method",
        )?;

        let stats = stmt
            .query_map([], |row| {
                Ok(MethodStats {
                    method: row.get(0)?,
                    pending: row.get::<_, i64>(1)? as u64,
                    claimed: row.get::<_, i64>(2)? as u64,
                    succeeded: row.get::<_, i64>(3)? as u64,
                    failed: row.get::<_, i64>(4)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(stats)
    }
}

impl GraphStore for SqliteStorage {
    // ===== Accounts =====

    fn user_etag(&self, login: &str) -> StorageResult<Option<String>> {
        let etag: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT etag FROM users WHERE login = ?1",
                params![login],
                |row| row.get(0),
            )
            .optional()?;
        Ok(etag.flatten())
    }

    fn user_id_for_login(&self, login: &str) -> StorageResult<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM users WHERE login = ?1",
                params![login],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn upsert_user(&mut self, user: &UserRecord) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO users
             (id, login, name, etag, gravatar_id, avatar_url, blog, location, email, bio,
              company, hireable, crawled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(id) DO UPDATE SET
                login = excluded.login,
                name = excluded.name,
                etag = excluded.etag,
                gravatar_id = excluded.gravatar_id,
                avatar_url = excluded.avatar_url,
                blog = excluded.blog,
                location = excluded.location,
                email = excluded.email,
                bio = excluded.bio,
                company = excluded.company,
                hireable = excluded.hireable,
                crawled_at = excluded.crawled_at",
            params![
                user.id,
                user.login,
                user.name,
                user.etag,
                user.gravatar_id,
                user.avatar_url,
                user.blog,
                user.location,
                user.email,
                user.bio,
                user.company,
                user.hireable,
                user.crawled_at
            ],
        )?;
        Ok(())
    }

    fn touch_user(&mut self, login: &str, crawled_at: DateTime<Utc>) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE users SET crawled_at = ?1 WHERE login = ?2",
            params![crawled_at, login],
        )?;
        Ok(())
    }

    fn upsert_repo(&mut self, repo: &RepoRecord) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO repos
             (id, owner_id, name, description, fork, fork_owner_id, language, etag, crawled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                owner_id = excluded.owner_id,
                name = excluded.name,
                description = excluded.description,
                fork = excluded.fork,
                fork_owner_id = COALESCE(excluded.fork_owner_id, repos.fork_owner_id),
                language = excluded.language,
                etag = excluded.etag,
                crawled_at = excluded.crawled_at",
            params![
                repo.id,
                repo.owner_id,
                repo.name,
                repo.description,
                repo.fork,
                repo.fork_owner_id,
                repo.language,
                repo.etag,
                repo.crawled_at
            ],
        )?;
        Ok(())
    }

    // ===== Edges =====

    fn add_following(&mut self, src_id: i64, dest_id: i64) -> StorageResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO followings (src_id, dest_id) VALUES (?1, ?2)",
            params![src_id, dest_id],
        )?;
        Ok(())
    }

    fn add_watcher(&mut self, watcher_id: i64, repo_id: i64) -> StorageResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO watchers (watcher_id, repo_id) VALUES (?1, ?2)",
            params![watcher_id, repo_id],
        )?;
        Ok(())
    }

    fn add_stargazer(&mut self, stargazer_id: i64, repo_id: i64) -> StorageResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO stargazers (stargazer_id, repo_id) VALUES (?1, ?2)",
            params![stargazer_id, repo_id],
        )?;
        Ok(())
    }

    fn add_contributor(
        &mut self,
        repo_id: i64,
        contributor_id: i64,
        contributions: i64,
    ) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO contributors (repo_id, contributor_id, contributions) VALUES (?1, ?2, ?3)
             ON CONFLICT(repo_id, contributor_id) DO UPDATE SET contributions = excluded.contributions",
            params![repo_id, contributor_id, contributions],
        )?;
        Ok(())
    }

    fn add_org_member(&mut self, org_id: i64, member_id: i64) -> StorageResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO orgs (org_id, member_id) VALUES (?1, ?2)",
            params![org_id, member_id],
        )?;
        Ok(())
    }

    // ===== Export =====

    fn user_ids(&self) -> StorageResult<Vec<i64>> {
        let mut stmt = self.conn.prepare("SELECT id FROM users ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn following_ids(&self, user_id: i64) -> StorageResult<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT dest_id FROM followings WHERE src_id = ?1 ORDER BY dest_id")?;
        let ids = stmt
            .query_map(params![user_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn contributed_owners(&self, user_id: i64) -> StorageResult<Vec<(i64, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT u.id, c.contributions
             FROM contributors c
             JOIN repos r ON r.id = c.repo_id
             JOIN users u ON u.id = r.owner_id
             WHERE c.contributor_id = ?1
             ORDER BY r.id",
        )?;
        let owners = stmt
            .query_map(params![user_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(owners)
    }

    fn starred_owners(&self, user_id: i64) -> StorageResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT u.id
             FROM stargazers s
             JOIN repos r ON r.id = s.repo_id
             JOIN users u ON u.id = r.owner_id
             WHERE s.stargazer_id = ?1
             ORDER BY r.id",
        )?;
        let owners = stmt
            .query_map(params![user_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(owners)
    }

    fn watched_owners(&self, user_id: i64) -> StorageResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT u.id
             FROM watchers w
             JOIN repos r ON r.id = w.repo_id
             JOIN users u ON u.id = r.owner_id
             WHERE w.watcher_id = ?1
             ORDER BY r.id",
        )?;
        let owners = stmt
            .query_map(params![user_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(owners)
    }

    fn fork_owners(&self, user_id: i64) -> StorageResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT fork_owner_id FROM repos
             WHERE owner_id = ?1 AND fork = 1 AND fork_owner_id IS NOT NULL
             ORDER BY id",
        )?;
        let owners = stmt
            .query_map(params![user_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(owners)
    }
}
