// Voice message recording sessions. Each session belongs to one user and
// one channel; nothing here is process-global.
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::chat::domain::ChatScope;
use crate::error::{AppError, AppResult};
use crate::media::MediaUpload;

const IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const MAX_RECORDING_BYTES: usize = 25 * 1024 * 1024;

/// Buffers raw audio chunks until the recording is stopped.
#[derive(Debug)]
pub struct AudioRecorder {
    owner_id: String,
    scope: ChatScope,
    chunks: Vec<Bytes>,
    last_activity: Instant,
}

impl AudioRecorder {
    pub fn new(owner_id: impl Into<String>, scope: ChatScope) -> Self {
        Self {
            owner_id: owner_id.into(),
            scope,
            chunks: Vec::new(),
            last_activity: Instant::now(),
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn scope(&self) -> &ChatScope {
        &self.scope
    }

    pub fn push(&mut self, chunk: Bytes) {
        self.last_activity = Instant::now();
        if !chunk.is_empty() {
            self.chunks.push(chunk);
        }
    }

    pub fn byte_len(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    /// Assemble the chunks into one `audio/mpeg` object. The buffer is
    /// kept, so a failed send can be retried.
    pub fn assemble(&self) -> AppResult<MediaUpload> {
        if self.chunks.is_empty() {
            return Err(AppError::Validation("Recording is empty".into()));
        }

        let mut audio = BytesMut::with_capacity(self.byte_len());
        for chunk in &self.chunks {
            audio.extend_from_slice(chunk);
        }

        Ok(MediaUpload::new(audio.freeze())
            .with_file_name(format!(
                "voice_message_{}.mp3",
                Utc::now().timestamp_millis()
            ))
            .with_content_type("audio/mpeg"))
    }

    fn is_stale(&self, idle: Duration) -> bool {
        self.last_activity.elapsed() >= idle
    }
}

/// Open recording sessions, keyed by a random id. Idle sessions are dropped.
pub struct RecordingStore {
    sessions: HashMap<String, AudioRecorder>,
    idle: Duration,
    max_bytes: usize,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::with_idle_timeout(IDLE_TIMEOUT)
    }

    pub fn with_idle_timeout(idle: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            idle,
            max_bytes: MAX_RECORDING_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Start a session and return its id.
    pub fn start(&mut self, owner_id: &str, scope: ChatScope) -> String {
        self.clear_stale();
        let id = uuid::Uuid::now_v7().to_string();
        self.sessions
            .insert(id.clone(), AudioRecorder::new(owner_id, scope));
        tracing::debug!(recording_id = %id, owner_id, "Recording started");
        id
    }

    pub fn append(&mut self, id: &str, owner_id: &str, chunk: Bytes) -> AppResult<usize> {
        self.clear_stale();
        let max_bytes = self.max_bytes;
        let recorder = self.owned_mut(id, owner_id)?;
        if recorder.byte_len() + chunk.len() > max_bytes {
            return Err(AppError::Validation(format!(
                "Recording is longer than the {} byte limit",
                max_bytes
            )));
        }
        recorder.push(chunk);
        Ok(recorder.byte_len())
    }

    /// The session's channel and its audio so far. The session stays open
    /// until the caller removes it.
    pub fn assemble(
        &mut self,
        id: &str,
        owner_id: &str,
    ) -> AppResult<(ChatScope, MediaUpload)> {
        self.clear_stale();
        let recorder = self.owned_mut(id, owner_id)?;
        recorder.last_activity = Instant::now();
        Ok((recorder.scope.clone(), recorder.assemble()?))
    }

    /// Remove the session on discard and hand it to the caller.
    pub fn take(&mut self, id: &str, owner_id: &str) -> AppResult<AudioRecorder> {
        self.clear_stale();
        self.owned_mut(id, owner_id)?;
        self.sessions
            .remove(id)
            .ok_or_else(|| AppError::NotFound(format!("Recording {} not found", id)))
    }

    /// Close a session whose audio has been posted.
    pub fn remove(&mut self, id: &str) -> Option<AudioRecorder> {
        self.sessions.remove(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn owned_mut(&mut self, id: &str, owner_id: &str) -> AppResult<&mut AudioRecorder> {
        let recorder = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("Recording {} not found", id)))?;
        if recorder.owner_id != owner_id {
            return Err(AppError::Authorization(
                "This recording belongs to someone else".into(),
            ));
        }
        Ok(recorder)
    }

    fn clear_stale(&mut self) {
        let idle = self.idle;
        let before = self.sessions.len();
        self.sessions.retain(|_, recorder| !recorder.is_stale(idle));
        let dropped = before - self.sessions.len();
        if dropped > 0 {
            tracing::debug!(dropped, "Dropped idle recordings");
        }
    }
}

impl Default for RecordingStore {
    fn default() -> Self {
        Self::new()
    }
}
