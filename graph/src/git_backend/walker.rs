use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use git2::{BranchType, Commit, Repository, Sort};
use smallvec::SmallVec;
use tracing::info;

use crate::core::CommitRecord;

/// Abbreviated-hash length used for every id in the graph, matching
/// what users see in the node labels.
const SHORT_ID_LEN: usize = 8;

/// Ingestion collaborator: turns a git repository into ordered commit
/// records for `GraphStore::build`.
pub struct GitWalker {
    repo: Repository,
}

impl GitWalker {
    pub fn new(repo_path: Option<&str>) -> Result<Self> {
        let repo = match repo_path {
            Some(path) => Repository::open(path),
            None => Repository::open_from_env(),
        }
        .context("Failed to open repository")?;

        Ok(Self { repo })
    }

    /// Walk HEAD and all branches into commit records, topologically
    /// and time sorted, annotated with branch membership.
    pub fn records(&self, limit: Option<usize>) -> Result<Vec<CommitRecord>> {
        let membership = self.branch_membership()?;

        let mut revwalk = self.repo.revwalk()?;
        revwalk.push_head()?;
        for branch in self.repo.branches(None)? {
            let (branch, _) = branch?;
            if let Some(target) = branch.get().target() {
                revwalk.push(target)?;
            }
        }
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;

        let mut records = Vec::new();
        for oid in revwalk {
            let oid = oid?;
            let commit = self.repo.find_commit(oid)?;

            let mut record = self.commit_to_record(&commit)?;
            if let Some(branches) = membership.get(&record.id) {
                record.branches = branches.clone();
            }
            records.push(record);

            if let Some(limit) = limit {
                if records.len() >= limit {
                    break;
                }
            }
        }

        info!(commits = records.len(), "walked repository");
        Ok(records)
    }

    /// Convert a git2::Commit to a CommitRecord with short ids
    fn commit_to_record(&self, commit: &Commit) -> Result<CommitRecord> {
        let id = short_id(&commit.id().to_string());
        let parents: SmallVec<[String; 2]> = commit
            .parent_ids()
            .map(|oid| short_id(&oid.to_string()))
            .collect();

        let timestamp = Utc
            .timestamp_opt(commit.time().seconds(), 0)
            .single()
            .context("Invalid commit timestamp")?;

        let author = commit.author().name().unwrap_or("Unknown").to_string();

        let message = commit.summary().unwrap_or("").to_string();

        Ok(CommitRecord {
            id,
            parents,
            branches: Vec::new(),
            timestamp,
            author,
            message,
        })
    }

    /// Map short commit id -> names of the local branches that reach it
    fn branch_membership(&self) -> Result<HashMap<String, Vec<String>>> {
        let mut membership: HashMap<String, Vec<String>> = HashMap::new();
        for branch in self.repo.branches(Some(BranchType::Local))? {
            let (branch, _) = branch?;
            let name = match branch.name()? {
                Some(name) => name.to_string(),
                None => continue,
            };
            let target = match branch.get().target() {
                Some(target) => target,
                None => continue,
            };
            let mut revwalk = self.repo.revwalk()?;
            revwalk.push(target)?;
            for oid in revwalk {
                let oid = oid?;
                membership
                    .entry(short_id(&oid.to_string()))
                    .or_default()
                    .push(name.clone());
            }
        }
        Ok(membership)
    }

    /// Short id of the HEAD commit, if any
    pub fn head(&self) -> Result<Option<String>> {
        match self.repo.head() {
            Ok(head) => Ok(head.target().map(|oid| short_id(&oid.to_string()))),
            Err(_) => Ok(None),
        }
    }
}

fn short_id(full: &str) -> String {
    full.chars().take(SHORT_ID_LEN).collect()
}

#[cfg(test)]
mod tests {
    use git2::{Oid, Signature};
    use tempfile::TempDir;

    use super::*;
    use crate::core::GraphStore;

    fn create_test_repo() -> Result<(TempDir, Repository)> {
        let dir = TempDir::new()?;
        let repo = Repository::init(dir.path())?;

        let mut config = repo.config()?;
        config.set_str("user.name", "Test User")?;
        config.set_str("user.email", "test@example.com")?;

        Ok((dir, repo))
    }

    fn commit_to_repo(
        repo: &Repository,
        message: &str,
        parents: &[&Commit],
        update_ref: Option<&str>,
    ) -> Result<Oid> {
        let sig = Signature::now("Test User", "test@example.com")?;
        let tree_id = {
            let mut index = repo.index()?;
            index.write_tree()?
        };
        let tree = repo.find_tree(tree_id)?;

        Ok(repo.commit(update_ref, &sig, &sig, message, &tree, parents)?)
    }

    #[test]
    fn single_commit_record() -> Result<()> {
        let (_dir, repo) = create_test_repo()?;
        commit_to_repo(&repo, "Initial commit", &[], Some("HEAD"))?;

        let walker = GitWalker::new(repo.path().to_str())?;
        let records = walker.records(None)?;

        assert_eq!(records.len(), 1);
        assert!(records[0].is_root());
        assert_eq!(records[0].id.len(), SHORT_ID_LEN);
        assert_eq!(records[0].message, "Initial commit");

        Ok(())
    }

    #[test]
    fn linear_history_builds_a_chain() -> Result<()> {
        let (_dir, repo) = create_test_repo()?;

        let oid1 = commit_to_repo(&repo, "First commit", &[], Some("HEAD"))?;
        let commit1 = repo.find_commit(oid1)?;
        let oid2 = commit_to_repo(&repo, "Second commit", &[&commit1], Some("HEAD"))?;
        let commit2 = repo.find_commit(oid2)?;
        commit_to_repo(&repo, "Third commit", &[&commit2], Some("HEAD"))?;

        let walker = GitWalker::new(repo.path().to_str())?;
        let records = walker.records(None)?;
        assert_eq!(records.len(), 3);

        let store = GraphStore::build(&records)?;
        assert_eq!(store.node_count(), 3);
        assert_eq!(store.edge_count(), 2);
        assert_eq!(store.roots().len(), 1);
        assert_eq!(store.roots()[0], short_id(&oid1.to_string()));
        assert!(store.validate());

        Ok(())
    }

    #[test]
    fn merge_commit_records_both_parents() -> Result<()> {
        let (_dir, repo) = create_test_repo()?;

        let base_oid = commit_to_repo(&repo, "Base commit", &[], Some("HEAD"))?;
        let base_commit = repo.find_commit(base_oid)?;

        let branch1_oid = commit_to_repo(&repo, "Branch 1", &[&base_commit], Some("HEAD"))?;
        let branch1_commit = repo.find_commit(branch1_oid)?;

        let branch2_oid = commit_to_repo(&repo, "Branch 2", &[&base_commit], None)?;
        let branch2_commit = repo.find_commit(branch2_oid)?;

        let merge_oid = commit_to_repo(
            &repo,
            "Merge",
            &[&branch1_commit, &branch2_commit],
            Some("HEAD"),
        )?;

        let walker = GitWalker::new(repo.path().to_str())?;
        let records = walker.records(None)?;
        assert_eq!(records.len(), 4);

        let merge = records
            .iter()
            .find(|r| r.id == short_id(&merge_oid.to_string()))
            .unwrap();
        assert!(merge.is_merge());

        let store = GraphStore::build(&records)?;
        assert_eq!(store.node_count(), 4);
        assert_eq!(store.edge_count(), 4);

        Ok(())
    }

    #[test]
    fn branch_membership_annotates_records() -> Result<()> {
        let (_dir, repo) = create_test_repo()?;

        let oid1 = commit_to_repo(&repo, "First", &[], Some("HEAD"))?;
        let commit1 = repo.find_commit(oid1)?;
        commit_to_repo(&repo, "Second", &[&commit1], Some("HEAD"))?;

        let walker = GitWalker::new(repo.path().to_str())?;
        let records = walker.records(None)?;

        // every record is reachable from the default branch
        for record in &records {
            assert_eq!(record.branches.len(), 1);
        }

        Ok(())
    }
}
