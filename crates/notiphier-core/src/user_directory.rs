//! Process-wide identity cache bridging platform users to Slack members.
//!
//! The Slack roster is fetched at most once per process (or on explicit
//! refresh); platform identities are primed per delivery with a single bulk
//! `user.search`. Misses degrade to plain display names, never to failures.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;

use crate::firehose_contract::UserIdentity;
use crate::phab_client::PhabClient;
use crate::slack_client::SlackClient;

#[derive(Default)]
struct DirectoryState {
    // normalized username/real name -> slack member id
    roster: Option<HashMap<String, String>>,
    // platform phid -> identity
    users: HashMap<String, UserIdentity>,
}

/// Bidirectional platform/Slack identity directory. The only shared mutable
/// state in the pipeline; the mutex makes one-time roster population safe if
/// deliveries ever run concurrently.
pub struct UserDirectory {
    phab: Arc<dyn PhabClient>,
    slack: Arc<dyn SlackClient>,
    state: Mutex<DirectoryState>,
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

impl UserDirectory {
    pub fn new(phab: Arc<dyn PhabClient>, slack: Arc<dyn SlackClient>) -> Self {
        Self {
            phab,
            slack,
            state: Mutex::new(DirectoryState::default()),
        }
    }

    /// Ensures the Slack roster has been fetched. Returns true when this call
    /// performed the first population.
    pub async fn ensure_populated(&self) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.roster.is_some() {
            return Ok(false);
        }
        state.roster = Some(self.fetch_roster().await?);
        Ok(true)
    }

    /// Drops the roster and all cached identities, then refetches the roster.
    pub async fn refresh(&self) -> Result<()> {
        let roster = self.fetch_roster().await?;
        let mut state = self.state.lock().await;
        state.roster = Some(roster);
        state.users.clear();
        Ok(())
    }

    async fn fetch_roster(&self) -> Result<HashMap<String, String>> {
        let members = self
            .slack
            .users_list()
            .await
            .context("failed to populate slack roster")?;
        let mut roster = HashMap::new();
        for member in members {
            if !member.name.trim().is_empty() {
                roster.insert(normalize_name(&member.name), member.id.clone());
            }
            if !member.real_name.trim().is_empty() {
                roster
                    .entry(normalize_name(&member.real_name))
                    .or_insert(member.id);
            }
        }
        Ok(roster)
    }

    /// Fetches identities for the given PHIDs in one bulk `user.search`,
    /// skipping PHIDs already cached this process.
    pub async fn prime_batch(&self, phids: &[String]) -> Result<()> {
        self.ensure_populated().await?;
        let missing: Vec<String> = {
            let state = self.state.lock().await;
            phids
                .iter()
                .filter(|phid| phid.starts_with("PHID-USER-"))
                .filter(|phid| !state.users.contains_key(phid.as_str()))
                .cloned()
                .collect::<HashSet<_>>()
                .into_iter()
                .collect()
        };
        if missing.is_empty() {
            return Ok(());
        }

        let fetched = self
            .phab
            .user_search(&missing)
            .await
            .context("failed to resolve platform users")?;
        let mut state = self.state.lock().await;
        for user in fetched {
            let roster = state.roster.as_ref();
            let slack_id = roster
                .and_then(|roster| roster.get(&normalize_name(&user.username)))
                .or_else(|| roster.and_then(|roster| roster.get(&normalize_name(&user.real_name))))
                .cloned();
            state.users.insert(
                user.phid.clone(),
                UserIdentity {
                    phid: user.phid,
                    username: user.username,
                    real_name: user.real_name,
                    slack_id,
                },
            );
        }
        Ok(())
    }

    /// Cache lookup for a primed platform user.
    pub async fn resolve_platform_user(&self, phid: &str) -> Option<UserIdentity> {
        self.state.lock().await.users.get(phid).cloned()
    }

    /// Slack member id for a username or display name, if the roster knows it.
    pub async fn resolve_chat_user(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .await
            .roster
            .as_ref()
            .and_then(|roster| roster.get(&normalize_name(name)))
            .cloned()
    }
}
