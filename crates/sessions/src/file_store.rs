//! JSON file-backed conversation store.
//!
//! Two files live in the store directory:
//! - `escalations.json`: ordered list of [`EscalationRecord`], oldest first
//! - `transcripts.json`: map of sender id to its transcript
//!
//! The whole state is held in memory. Every mutation builds the next
//! snapshot, stages both files as temp files, renames them into place and
//! only then publishes the snapshot, so readers never see a half-applied
//! change.
//!
//! `transcripts.json` is always renamed first. A commit cut short between
//! the two renames therefore leaves at most a marker whose transcript is
//! already gone, which only a release produces; [`FileConversationStore::open`]
//! finishes such a release. The opposite leftover, a transcript without a
//! marker, is a legal state.

use std::{
    collections::BTreeMap,
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use {
    async_trait::async_trait,
    serde::{Serialize, de::DeserializeOwned},
    tokio::sync::RwLock,
    tracing::{debug, warn},
};

use crate::{
    Error, Result,
    message::{EscalatedConversation, EscalationRecord, TranscriptMessage, clamp_timestamp},
    store::ConversationStore,
};

pub const ESCALATIONS_FILE: &str = "escalations.json";
pub const TRANSCRIPTS_FILE: &str = "transcripts.json";

#[derive(Debug, Clone, Default)]
struct Snapshot {
    escalations: Vec<EscalationRecord>,
    transcripts: BTreeMap<String, Vec<TranscriptMessage>>,
}

impl Snapshot {
    fn position(&self, sender_id: &str) -> Option<usize> {
        self.escalations
            .iter()
            .position(|e| e.sender_id == sender_id)
    }

    fn escalate(&mut self, sender_id: &str, trigger_text: &str, escalated_at: u64) -> bool {
        self.transcripts.entry(sender_id.to_string()).or_default();
        if self.position(sender_id).is_some() {
            return false;
        }
        self.escalations.push(EscalationRecord {
            sender_id: sender_id.to_string(),
            trigger_text: trigger_text.to_string(),
            escalated_at,
        });
        true
    }

    fn append(&mut self, sender_id: &str, mut message: TranscriptMessage) {
        let transcript = self.transcripts.entry(sender_id.to_string()).or_default();
        message.created_at = clamp_timestamp(transcript, message.created_at);
        transcript.push(message);
    }

    fn trim(&mut self, sender_id: &str, keep: usize) -> usize {
        match self.transcripts.get_mut(sender_id) {
            Some(transcript) if transcript.len() > keep => {
                let excess = transcript.len() - keep;
                transcript.drain(..excess);
                excess
            },
            _ => 0,
        }
    }

    fn release(&mut self, sender_id: &str) -> bool {
        self.transcripts.remove(sender_id);
        match self.position(sender_id) {
            Some(idx) => {
                self.escalations.remove(idx);
                true
            },
            None => false,
        }
    }
}

/// Conversation store persisted as two JSON documents in a directory.
pub struct FileConversationStore {
    dir: PathBuf,
    state: RwLock<Snapshot>,
}

impl FileConversationStore {
    /// Open the store in `dir`, creating the directory if needed. Missing
    /// files load as an empty store; malformed files are an error.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let load_dir = dir.clone();
        let snapshot = tokio::task::spawn_blocking(move || -> Result<Snapshot> {
            fs::create_dir_all(&load_dir)?;
            let mut escalations: Vec<EscalationRecord> =
                read_json(&load_dir.join(ESCALATIONS_FILE))?.unwrap_or_default();
            let transcripts: BTreeMap<String, Vec<TranscriptMessage>> =
                read_json(&load_dir.join(TRANSCRIPTS_FILE))?.unwrap_or_default();

            let before = escalations.len();
            escalations.retain(|record| {
                let whole = transcripts.contains_key(&record.sender_id);
                if !whole {
                    warn!(sender_id = %record.sender_id, "finishing interrupted release");
                }
                whole
            });
            if escalations.len() != before {
                let staged = stage_json(&load_dir.join(ESCALATIONS_FILE), &escalations)?;
                staged.commit()?;
            }

            Ok(Snapshot {
                escalations,
                transcripts,
            })
        })
        .await??;

        debug!(
            dir = %dir.display(),
            escalated = snapshot.escalations.len(),
            "opened conversation store"
        );
        Ok(Self {
            dir,
            state: RwLock::new(snapshot),
        })
    }

    /// Apply `f` to a copy of the current snapshot, persist it, then publish.
    async fn mutate<T>(&self, f: impl FnOnce(&mut Snapshot) -> T) -> Result<T> {
        let mut guard = self.state.write().await;
        let mut next = guard.clone();
        let out = f(&mut next);

        let dir = self.dir.clone();
        let to_write = next.clone();
        tokio::task::spawn_blocking(move || persist(&dir, &to_write)).await??;

        *guard = next;
        Ok(out)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| Error::corrupt(path.display().to_string(), e.to_string()))
}

/// A fully written temp file waiting to be renamed over its target.
struct Staged {
    tmp: PathBuf,
    path: PathBuf,
}

impl Staged {
    fn commit(self) -> Result<()> {
        fs::rename(&self.tmp, &self.path)?;
        Ok(())
    }
}

fn stage_json<T: Serialize>(path: &Path, value: &T) -> Result<Staged> {
    let data = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    let mut file = fs::File::create(&tmp)?;
    file.write_all(data.as_bytes())?;
    file.sync_all()?;
    Ok(Staged {
        tmp,
        path: path.to_path_buf(),
    })
}

fn persist(dir: &Path, snapshot: &Snapshot) -> Result<()> {
    fs::create_dir_all(dir)?;
    let transcripts = stage_json(&dir.join(TRANSCRIPTS_FILE), &snapshot.transcripts)?;
    let escalations = stage_json(&dir.join(ESCALATIONS_FILE), &snapshot.escalations)?;
    transcripts.commit()?;
    escalations.commit()
}

#[async_trait]
impl ConversationStore for FileConversationStore {
    async fn is_escalated(&self, sender_id: &str) -> Result<bool> {
        Ok(self.state.read().await.position(sender_id).is_some())
    }

    async fn escalate(
        &self,
        sender_id: &str,
        trigger_text: &str,
        escalated_at: u64,
    ) -> Result<bool> {
        if self.is_escalated(sender_id).await? {
            return Ok(false);
        }
        self.mutate(|s| s.escalate(sender_id, trigger_text, escalated_at))
            .await
    }

    async fn append_message(&self, sender_id: &str, message: TranscriptMessage) -> Result<()> {
        self.mutate(|s| s.append(sender_id, message)).await
    }

    async fn record_escalation(
        &self,
        sender_id: &str,
        trigger_text: &str,
        escalated_at: u64,
        messages: Vec<TranscriptMessage>,
    ) -> Result<bool> {
        self.mutate(|s| {
            let created = s.escalate(sender_id, trigger_text, escalated_at);
            for message in messages {
                s.append(sender_id, message);
            }
            created
        })
        .await
    }

    async fn trim_transcript(&self, sender_id: &str, keep: usize) -> Result<usize> {
        {
            let state = self.state.read().await;
            if state.transcripts.get(sender_id).is_none_or(|t| t.len() <= keep) {
                return Ok(0);
            }
        }
        self.mutate(|s| s.trim(sender_id, keep)).await
    }

    async fn release(&self, sender_id: &str) -> Result<bool> {
        {
            let state = self.state.read().await;
            if state.position(sender_id).is_none() && !state.transcripts.contains_key(sender_id) {
                return Ok(false);
            }
        }
        self.mutate(|s| s.release(sender_id)).await
    }

    async fn escalation(&self, sender_id: &str) -> Result<Option<EscalationRecord>> {
        let state = self.state.read().await;
        Ok(state
            .position(sender_id)
            .map(|idx| state.escalations[idx].clone()))
    }

    async fn transcript(&self, sender_id: &str) -> Result<Vec<TranscriptMessage>> {
        Ok(self
            .state
            .read()
            .await
            .transcripts
            .get(sender_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_escalated(&self) -> Result<Vec<EscalatedConversation>> {
        let state = self.state.read().await;
        let mut list: Vec<EscalatedConversation> = state
            .escalations
            .iter()
            .map(|e| EscalatedConversation {
                escalation: e.clone(),
                transcript: state
                    .transcripts
                    .get(&e.sender_id)
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect();
        // Stable: equal timestamps keep insertion order.
        list.sort_by_key(|c| c.escalation.escalated_at);
        Ok(list)
    }
}
