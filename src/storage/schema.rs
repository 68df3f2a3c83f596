//! Database schema definitions
//!
//! The `queue` table is the only synchronization point between worker
//! processes. The remaining tables hold the crawled graph.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Shared crawl backlog
CREATE TABLE IF NOT EXISTS queue (
    task_id INTEGER PRIMARY KEY AUTOINCREMENT,
    login TEXT NOT NULL,
    user_id INTEGER,
    reponame TEXT,
    repo_id INTEGER,
    root_login TEXT,
    task_type INTEGER NOT NULL,
    method TEXT NOT NULL,
    assignee TEXT,
    assigned_dt TEXT,
    completed_dt TEXT,
    success INTEGER,
    UNIQUE(login, method)
);

CREATE INDEX IF NOT EXISTS idx_queue_assignee ON queue(assignee);
CREATE INDEX IF NOT EXISTS idx_queue_task_type ON queue(task_type, task_id);

-- Accounts (users and organizations)
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    login TEXT NOT NULL,
    name TEXT,
    etag TEXT,
    gravatar_id TEXT,
    avatar_url TEXT,
    blog TEXT,
    location TEXT,
    email TEXT,
    bio TEXT,
    company TEXT,
    hireable INTEGER,
    crawled_at TEXT,
    devrank_score REAL NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_users_login ON users(login);

-- src follows dest
CREATE TABLE IF NOT EXISTS followings (
    src_id INTEGER NOT NULL,
    dest_id INTEGER NOT NULL,
    PRIMARY KEY (src_id, dest_id)
);

CREATE TABLE IF NOT EXISTS repos (
    id INTEGER PRIMARY KEY,
    owner_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    fork INTEGER NOT NULL DEFAULT 0,
    fork_owner_id INTEGER,
    language TEXT,
    etag TEXT,
    crawled_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_repos_owner ON repos(owner_id);

CREATE TABLE IF NOT EXISTS watchers (
    watcher_id INTEGER NOT NULL,
    repo_id INTEGER NOT NULL,
    PRIMARY KEY (watcher_id, repo_id)
);

CREATE TABLE IF NOT EXISTS stargazers (
    stargazer_id INTEGER NOT NULL,
    repo_id INTEGER NOT NULL,
    PRIMARY KEY (stargazer_id, repo_id)
);

CREATE TABLE IF NOT EXISTS contributors (
    repo_id INTEGER NOT NULL,
    contributor_id INTEGER NOT NULL,
    contributions INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (repo_id, contributor_id)
);

CREATE TABLE IF NOT EXISTS orgs (
    org_id INTEGER NOT NULL,
    member_id INTEGER NOT NULL,
    PRIMARY KEY (org_id, member_id)
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
