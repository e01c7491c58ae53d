//! Resolves transaction batches into fresh object state.
//!
//! Transactions are grouped by object type and each type is fetched with one
//! bulk search; linked projects and repositories are fetched with one further
//! bulk call each so routing tags come along for free. A failed search drops
//! only the objects that depended on it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::firehose_contract::{ObjectType, ResolvedObject, Transaction};
use crate::phab_client::PhabClient;

/// Outcome of resolving one delivery's transaction batch.
#[derive(Debug, Default)]
pub struct ResolvedBatch {
    pub objects: HashMap<String, ResolvedObject>,
    pub failed_object_phids: HashSet<String>,
}

/// Object state waiting on project/repository tag names before it becomes a
/// [`ResolvedObject`].
struct PendingObject {
    phid: String,
    object_type: ObjectType,
    monogram: String,
    title: String,
    owner_phid: Option<String>,
    tag_phids: Vec<String>,
}

pub struct PlatformResolver {
    phab: Arc<dyn PhabClient>,
}

impl PlatformResolver {
    pub fn new(phab: Arc<dyn PhabClient>) -> Self {
        Self { phab }
    }

    pub async fn resolve(&self, batch: &[Transaction]) -> ResolvedBatch {
        let mut by_type: HashMap<ObjectType, Vec<String>> = HashMap::new();
        let mut seen = HashSet::new();
        for transaction in batch {
            if transaction.object_type == ObjectType::Unknown {
                continue;
            }
            if seen.insert(transaction.object_phid.clone()) {
                by_type
                    .entry(transaction.object_type)
                    .or_default()
                    .push(transaction.object_phid.clone());
            }
        }

        let mut resolved = ResolvedBatch::default();
        let mut pending = Vec::new();

        if let Some(phids) = by_type.get(&ObjectType::Task) {
            match self.phab.task_search(phids).await {
                Ok(tasks) => {
                    for task in tasks {
                        pending.push(PendingObject {
                            phid: task.phid,
                            object_type: ObjectType::Task,
                            monogram: format!("T{}", task.id),
                            title: task.title,
                            owner_phid: task.owner_phid,
                            tag_phids: task.project_phids,
                        });
                    }
                }
                Err(error) => {
                    tracing::warn!(error = %error, "task search failed; dropping task transactions");
                    resolved.failed_object_phids.extend(phids.iter().cloned());
                }
            }
        }

        if let Some(phids) = by_type.get(&ObjectType::Revision) {
            match self.phab.revision_search(phids).await {
                Ok(revisions) => {
                    for revision in revisions {
                        pending.push(PendingObject {
                            phid: revision.phid,
                            object_type: ObjectType::Revision,
                            monogram: format!("D{}", revision.id),
                            title: revision.title,
                            owner_phid: revision.author_phid,
                            tag_phids: revision.repository_phid.into_iter().collect(),
                        });
                    }
                }
                Err(error) => {
                    tracing::warn!(error = %error, "revision search failed; dropping revision transactions");
                    resolved.failed_object_phids.extend(phids.iter().cloned());
                }
            }
        }

        if let Some(phids) = by_type.get(&ObjectType::Commit) {
            match self.phab.commit_search(phids).await {
                Ok(commits) => {
                    for commit in commits {
                        pending.push(PendingObject {
                            phid: commit.phid,
                            object_type: ObjectType::Commit,
                            monogram: commit.identifier.chars().take(12).collect(),
                            title: commit.summary,
                            owner_phid: commit.author_phid,
                            tag_phids: commit.repository_phid.into_iter().collect(),
                        });
                    }
                }
                Err(error) => {
                    tracing::warn!(error = %error, "commit search failed; dropping commit transactions");
                    resolved.failed_object_phids.extend(phids.iter().cloned());
                }
            }
        }

        if let Some(phids) = by_type.get(&ObjectType::Project) {
            match self.phab.project_search(phids).await {
                Ok(projects) => {
                    for project in projects {
                        pending.push(PendingObject {
                            phid: project.phid,
                            object_type: ObjectType::Project,
                            monogram: project.name.clone(),
                            title: project.name.clone(),
                            owner_phid: None,
                            tag_phids: vec![project.name],
                        });
                    }
                }
                Err(error) => {
                    tracing::warn!(error = %error, "project search failed; dropping project transactions");
                    resolved.failed_object_phids.extend(phids.iter().cloned());
                }
            }
        }

        if let Some(phids) = by_type.get(&ObjectType::Repository) {
            match self.phab.repository_search(phids).await {
                Ok(repositories) => {
                    for repository in repositories {
                        pending.push(PendingObject {
                            phid: repository.phid,
                            object_type: ObjectType::Repository,
                            monogram: repository.name.clone(),
                            title: repository.name.clone(),
                            owner_phid: None,
                            tag_phids: vec![repository.name],
                        });
                    }
                }
                Err(error) => {
                    tracing::warn!(error = %error, "repository search failed; dropping repository transactions");
                    resolved.failed_object_phids.extend(phids.iter().cloned());
                }
            }
        }

        let tag_names = self.resolve_tag_names(&pending, &mut resolved).await;

        for object in pending {
            if resolved.failed_object_phids.contains(&object.phid) {
                continue;
            }
            let route_tags = match object.object_type {
                // Projects and repositories carry their own name as the tag.
                ObjectType::Project | ObjectType::Repository => object.tag_phids,
                _ => object
                    .tag_phids
                    .iter()
                    .filter_map(|tag_phid| tag_names.get(tag_phid).cloned())
                    .collect(),
            };
            resolved.objects.insert(
                object.phid.clone(),
                ResolvedObject {
                    phid: object.phid,
                    object_type: object.object_type,
                    monogram: object.monogram,
                    title: object.title,
                    owner_phid: object.owner_phid,
                    route_tags,
                },
            );
        }
        resolved
    }

    /// Bulk-resolves project and repository names for routing tags. A failed
    /// lookup fails the objects that referenced those tags, not the batch.
    async fn resolve_tag_names(
        &self,
        pending: &[PendingObject],
        resolved: &mut ResolvedBatch,
    ) -> HashMap<String, String> {
        let mut project_phids = Vec::new();
        let mut repository_phids = Vec::new();
        let mut referencing: HashMap<ObjectType, Vec<String>> = HashMap::new();
        for object in pending {
            if matches!(
                object.object_type,
                ObjectType::Project | ObjectType::Repository
            ) {
                continue;
            }
            for tag_phid in &object.tag_phids {
                match ObjectType::from_phid(tag_phid) {
                    ObjectType::Project => {
                        project_phids.push(tag_phid.clone());
                        referencing
                            .entry(ObjectType::Project)
                            .or_default()
                            .push(object.phid.clone());
                    }
                    ObjectType::Repository => {
                        repository_phids.push(tag_phid.clone());
                        referencing
                            .entry(ObjectType::Repository)
                            .or_default()
                            .push(object.phid.clone());
                    }
                    _ => {}
                }
            }
        }

        let mut names = HashMap::new();
        if !project_phids.is_empty() {
            match self.phab.project_search(&project_phids).await {
                Ok(projects) => {
                    for project in projects {
                        names.insert(project.phid, project.name);
                    }
                }
                Err(error) => {
                    tracing::warn!(error = %error, "project tag lookup failed; dropping dependent objects");
                    resolved
                        .failed_object_phids
                        .extend(referencing.remove(&ObjectType::Project).unwrap_or_default());
                }
            }
        }
        if !repository_phids.is_empty() {
            match self.phab.repository_search(&repository_phids).await {
                Ok(repositories) => {
                    for repository in repositories {
                        names.insert(repository.phid, repository.name);
                    }
                }
                Err(error) => {
                    tracing::warn!(error = %error, "repository tag lookup failed; dropping dependent objects");
                    resolved.failed_object_phids.extend(
                        referencing
                            .remove(&ObjectType::Repository)
                            .unwrap_or_default(),
                    );
                }
            }
        }
        names
    }
}
