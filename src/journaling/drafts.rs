use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::model::SnippetDraft;

const DRAFT_FILE: &str = "new-snippet.json";
const DRAFT_TMP_EXTENSION: &str = "json.tmp";

/// A draft restored from disk and when it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedDraft {
    pub draft: SnippetDraft,
    pub saved_at: OffsetDateTime,
}

#[derive(Debug, Serialize, Deserialize)]
struct DraftRecord {
    saved_at: i64,
    draft: SnippetDraft,
}

/// Keeps the unfinished "new snippet" form across sessions.
#[derive(Debug, Clone)]
pub struct DraftJournal {
    dir: PathBuf,
}

impl DraftJournal {
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating draft journal dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(DRAFT_FILE)
    }

    pub fn save(&self, draft: &SnippetDraft) -> Result<()> {
        let record = DraftRecord {
            saved_at: OffsetDateTime::now_utc().unix_timestamp(),
            draft: draft.clone(),
        };
        let json = serde_json::to_vec_pretty(&record).context("serialising snippet draft")?;
        let final_path = self.path();
        let tmp_path = final_path.with_extension(DRAFT_TMP_EXTENSION);
        fs::write(&tmp_path, &json)
            .with_context(|| format!("writing temporary draft {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &final_path)
            .with_context(|| format!("persisting draft {}", final_path.display()))?;
        tracing::debug!(path = %final_path.display(), "saved snippet draft");
        Ok(())
    }

    /// Unreadable journals are logged and treated as absent.
    pub fn restore(&self) -> Result<Option<SavedDraft>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        match Self::read_path(&path) {
            Ok(saved) => Ok(Some(saved)),
            Err(err) => {
                tracing::warn!(?err, "ignoring unreadable draft {}", path.display());
                Ok(None)
            }
        }
    }

    pub fn discard(&self) -> Result<()> {
        let path = self.path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("removing draft {}", path.display())),
        }
    }

    fn read_path(path: &Path) -> Result<SavedDraft> {
        let raw = fs::read(path).with_context(|| format!("reading draft {}", path.display()))?;
        let record: DraftRecord = serde_json::from_slice(&raw)
            .with_context(|| format!("parsing draft {}", path.display()))?;
        let saved_at = OffsetDateTime::from_unix_timestamp(record.saved_at)
            .unwrap_or_else(|_| OffsetDateTime::now_utc());
        Ok(SavedDraft {
            draft: record.draft,
            saved_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use time::macros::date;

    #[test]
    fn drafts_survive_a_restart_until_discarded() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let dir = temp.path().join("drafts");
        let draft = SnippetDraft::new("vocab", date!(2024 - 03 - 09), "1, 2, 4")
            .with_content("serendipity: a happy accident");

        let journal = DraftJournal::new(dir.clone())?;
        assert!(journal.restore()?.is_none());
        journal.save(&draft)?;
        assert!(!journal.path().with_extension(DRAFT_TMP_EXTENSION).exists());

        let reopened = DraftJournal::new(dir)?;
        let saved = reopened.restore()?.expect("draft should be restored");
        assert_eq!(saved.draft, draft);

        reopened.discard()?;
        assert!(reopened.restore()?.is_none());
        reopened.discard()?;
        Ok(())
    }

    #[test]
    fn corrupt_journal_is_ignored() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let journal = DraftJournal::new(temp.path().to_path_buf())?;
        fs::write(journal.path(), b"{ not json")?;
        assert!(journal.restore()?.is_none());
        Ok(())
    }
}
