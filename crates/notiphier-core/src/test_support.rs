//! Canned collaborator clients shared by the unit test modules.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::firehose_contract::{Attachment, Transaction};
use crate::phab_client::{
    CommitInfo, PhabClient, PhabUser, ProjectInfo, RepositoryInfo, RevisionInfo, TaskInfo,
};
use crate::slack_client::{SlackClient, SlackMember};
use crate::user_directory::UserDirectory;

/// In-memory stand-in for both collaborator traits. The roster and platform
/// users are fixed; searches the unit tests never exercise return nothing.
pub(crate) struct FixtureHub {
    pub roster_fetches: AtomicUsize,
    pub user_searches: AtomicUsize,
    pub members: Vec<SlackMember>,
    pub users: Vec<PhabUser>,
}

impl FixtureHub {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            roster_fetches: AtomicUsize::new(0),
            user_searches: AtomicUsize::new(0),
            members: vec![
                SlackMember {
                    id: "U111".to_string(),
                    name: "ana".to_string(),
                    real_name: "Ana Garcia".to_string(),
                },
                SlackMember {
                    id: "U222".to_string(),
                    name: "brett".to_string(),
                    real_name: "Brett Ortiz".to_string(),
                },
            ],
            users: vec![
                PhabUser {
                    phid: "PHID-USER-ana".to_string(),
                    username: "ana".to_string(),
                    real_name: "Ana Garcia".to_string(),
                },
                PhabUser {
                    phid: "PHID-USER-brett".to_string(),
                    username: "brett".to_string(),
                    real_name: "Brett Ortiz".to_string(),
                },
            ],
        })
    }

    pub(crate) fn roster_fetches(&self) -> usize {
        self.roster_fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn user_searches(&self) -> usize {
        self.user_searches.load(Ordering::SeqCst)
    }
}

/// Directory wired to a [`FixtureHub`] with the roster already populated.
pub(crate) async fn fixture_directory(hub: &Arc<FixtureHub>) -> UserDirectory {
    let directory = UserDirectory::new(hub.clone(), hub.clone());
    directory.ensure_populated().await.expect("roster");
    directory
}

#[async_trait]
impl SlackClient for FixtureHub {
    async fn users_list(&self) -> Result<Vec<SlackMember>> {
        self.roster_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.members.clone())
    }

    async fn post_message(&self, _channel: &str, _attachments: &[Attachment]) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl PhabClient for FixtureHub {
    async fn transaction_search(
        &self,
        _object_phid: &str,
        _transaction_phids: &[String],
    ) -> Result<Vec<Transaction>> {
        Ok(Vec::new())
    }

    async fn user_search(&self, phids: &[String]) -> Result<Vec<PhabUser>> {
        self.user_searches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .users
            .iter()
            .filter(|user| phids.contains(&user.phid))
            .cloned()
            .collect())
    }

    async fn task_search(&self, _phids: &[String]) -> Result<Vec<TaskInfo>> {
        Ok(Vec::new())
    }

    async fn revision_search(&self, _phids: &[String]) -> Result<Vec<RevisionInfo>> {
        Ok(Vec::new())
    }

    async fn commit_search(&self, _phids: &[String]) -> Result<Vec<CommitInfo>> {
        Ok(Vec::new())
    }

    async fn project_search(&self, _phids: &[String]) -> Result<Vec<ProjectInfo>> {
        Ok(Vec::new())
    }

    async fn repository_search(&self, _phids: &[String]) -> Result<Vec<RepositoryInfo>> {
        Ok(Vec::new())
    }
}
