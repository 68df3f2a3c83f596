//! API payload shapes
//!
//! Only the fields the graph keeps are declared; the rest are ignored.

use crate::storage::{RepoRecord, UserRecord};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A user or organization account
///
/// Listings return a reduced form with only `id`, `login` and avatar fields;
/// the profile fields are then absent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Account {
    pub id: i64,
    pub login: String,
    pub name: Option<String>,
    pub gravatar_id: Option<String>,
    pub avatar_url: Option<String>,
    pub blog: Option<String>,
    pub location: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub company: Option<String>,
    pub hireable: Option<bool>,
}

impl Account {
    pub fn into_record(self, etag: Option<String>, crawled_at: DateTime<Utc>) -> UserRecord {
        UserRecord {
            id: self.id,
            login: self.login,
            name: self.name,
            etag,
            gravatar_id: self.gravatar_id,
            avatar_url: self.avatar_url,
            blog: self.blog,
            location: self.location,
            email: self.email,
            bio: self.bio,
            company: self.company,
            hireable: self.hireable,
            crawled_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RepoOwner {
    pub id: i64,
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParentRepo {
    pub id: i64,
    pub owner: RepoOwner,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Repository {
    pub id: i64,
    pub name: String,
    pub owner: RepoOwner,
    pub description: Option<String>,
    #[serde(default)]
    pub fork: bool,
    pub language: Option<String>,
    /// Only present on the single-repository resource
    pub parent: Option<ParentRepo>,
}

impl Repository {
    pub fn to_record(&self, crawled_at: DateTime<Utc>) -> RepoRecord {
        RepoRecord {
            id: self.id,
            owner_id: self.owner.id,
            name: self.name.clone(),
            description: self.description.clone(),
            fork: self.fork,
            fork_owner_id: self.parent.as_ref().map(|p| p.owner.id),
            language: self.language.clone(),
            etag: None,
            crawled_at,
        }
    }
}

/// An entry of a repository's contributor listing
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Contributor {
    pub id: i64,
    pub login: String,
    #[serde(default)]
    pub contributions: i64,
}
