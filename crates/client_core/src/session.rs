//! Upload session controller: one user attempt to pick a CSV file, choose a
//! column and have it converted remotely.
//!
//! All state lives in [`UploadSession`]. The two suspension points (reading the
//! chosen file and calling the conversion service) run as spawned tasks that
//! report back through an internal channel. Every report carries the
//! [`AttemptId`] it was started under; reports from a superseded attempt are
//! dropped so they never overwrite newer state.

use std::sync::Arc;

use serde::Serialize;
use shared::{
    domain::{AttemptId, SessionPhase, SubmissionId},
    error::ApiError,
};
use tokio::sync::{
    broadcast,
    mpsc::{self, error::TryRecvError},
};
use tracing::{debug, info, warn};

use crate::{
    conversion::{download_file_name, ResultReference},
    error::SessionError,
    headers::{extract_columns, is_accepted_file, LocalFile},
    ConversionService, FileSource,
};

/// Notifications for the presentation layer.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Changed(SessionSnapshot),
    /// The file input widget should be emptied so the same path can be chosen again.
    ClearFileInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub attempt: AttemptId,
    pub file_name: Option<String>,
    pub validation_error: Option<String>,
    pub available_columns: Vec<String>,
    pub selected_column: Option<String>,
    pub is_submitting: bool,
    pub result_reference: Option<ResultReference>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSelection {
    Cleared,
    Rejected,
    /// Header extraction is pending.
    Accepted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    Applied,
    Stale,
}

enum Completion {
    HeadersRead {
        attempt: AttemptId,
        result: Result<Vec<String>, SessionError>,
    },
    Submitted {
        attempt: AttemptId,
        submission: SubmissionId,
        result: Result<ResultReference, SessionError>,
    },
}

pub struct UploadSession {
    service: Arc<dyn ConversionService>,
    files: Arc<dyn FileSource>,
    attempt: AttemptId,
    submission: SubmissionId,
    selected_file: Option<LocalFile>,
    validation_error: Option<ApiError>,
    available_columns: Vec<String>,
    selected_column: Option<String>,
    is_submitting: bool,
    result_reference: Option<ResultReference>,
    in_flight: usize,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    events: broadcast::Sender<SessionEvent>,
}

impl UploadSession {
    pub fn new(service: Arc<dyn ConversionService>, files: Arc<dyn FileSource>) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(64);
        Self {
            service,
            files,
            attempt: AttemptId::default(),
            submission: SubmissionId::default(),
            selected_file: None,
            validation_error: None,
            available_columns: Vec::new(),
            selected_column: None,
            is_submitting: false,
            result_reference: None,
            in_flight: 0,
            completions_tx,
            completions_rx,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Handles a file chosen (or cleared) in the file input.
    ///
    /// Starts a new attempt, so any pending header read or submission of an
    /// earlier attempt is ignored when it completes. Must be called from
    /// within a Tokio runtime.
    pub fn select_file(&mut self, file: Option<LocalFile>) -> FileSelection {
        self.attempt = self.attempt.next();
        self.result_reference = None;
        self.is_submitting = false;
        self.available_columns.clear();
        self.selected_column = None;

        let Some(file) = file else {
            self.selected_file = None;
            self.validation_error = None;
            debug!(attempt = self.attempt.0, "session: file input cleared");
            self.publish_changed();
            return FileSelection::Cleared;
        };

        if !is_accepted_file(&file) {
            warn!(
                attempt = self.attempt.0,
                file = file.name(),
                media_type = file.media_type().unwrap_or_default(),
                "session: rejected file selection"
            );
            self.selected_file = None;
            self.validation_error = Some(SessionError::InvalidFileType.to_api_error());
            let _ = self.events.send(SessionEvent::ClearFileInput);
            self.publish_changed();
            return FileSelection::Rejected;
        }

        info!(
            attempt = self.attempt.0,
            file = file.name(),
            "session: accepted file, reading header"
        );
        self.validation_error = None;
        self.selected_file = Some(file.clone());
        self.spawn_header_read(file);
        self.publish_changed();
        FileSelection::Accepted
    }

    /// Picks the column to convert. Names not in the current column list are ignored.
    ///
    /// An empty name is the "no column" choice and clears the selection.
    pub fn select_column(&mut self, column: &str) -> bool {
        if column.is_empty() {
            if self.selected_column.take().is_some() {
                self.publish_changed();
            }
            return false;
        }
        if !self.available_columns.iter().any(|c| c == column) {
            debug!(
                attempt = self.attempt.0,
                column, "session: ignoring selection of unknown column"
            );
            return false;
        }
        self.selected_column = Some(column.to_string());
        self.publish_changed();
        true
    }

    /// Sends the selected file and column to the conversion service.
    ///
    /// Returns false without touching any state unless a file and a column
    /// are selected and no submission is outstanding.
    pub fn submit(&mut self) -> bool {
        if self.is_submitting {
            debug!(attempt = self.attempt.0, "session: submission already outstanding");
            return false;
        }
        let (Some(file), Some(column)) = (
            self.selected_file.clone(),
            self.selected_column.clone().filter(|c| !c.is_empty()),
        ) else {
            return false;
        };

        self.submission = self.submission.next();
        self.is_submitting = true;
        self.validation_error = None;
        self.result_reference = None;
        info!(
            attempt = self.attempt.0,
            submission = self.submission.0,
            file = file.name(),
            column = column.as_str(),
            "session: submitting"
        );

        let service = Arc::clone(&self.service);
        let tx = self.completions_tx.clone();
        let attempt = self.attempt;
        let submission = self.submission;
        self.in_flight += 1;
        tokio::spawn(async move {
            let call = tokio::spawn(async move { service.submit(&file, &column).await });
            let result = match call.await {
                Ok(result) => result,
                Err(err) => Err(SessionError::TransportFault(format!(
                    "conversion task failed: {err}"
                ))),
            };
            let _ = tx.send(Completion::Submitted {
                attempt,
                submission,
                result,
            });
        });

        self.publish_changed();
        true
    }

    /// Returns to the empty state. An outstanding request is not cancelled;
    /// its result is ignored.
    pub fn reset(&mut self) {
        self.attempt = self.attempt.next();
        self.selected_file = None;
        self.validation_error = None;
        self.available_columns.clear();
        self.selected_column = None;
        self.is_submitting = false;
        self.result_reference = None;
        info!(attempt = self.attempt.0, "session: reset");
        let _ = self.events.send(SessionEvent::ClearFileInput);
        self.publish_changed();
    }

    /// Waits for the next background completion and applies it.
    ///
    /// Returns `None` when nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<CompletionOutcome> {
        if self.in_flight == 0 {
            return None;
        }
        let completion = self.completions_rx.recv().await?;
        Some(self.apply(completion))
    }

    /// Applies completions until no background work is left, including work
    /// of superseded attempts.
    pub async fn settle(&mut self) {
        while self.next_completion().await.is_some() {}
    }

    /// Applies completions that already arrived, for presentation layers that poll.
    pub fn apply_ready(&mut self) -> usize {
        let mut applied = 0;
        loop {
            match self.completions_rx.try_recv() {
                Ok(completion) => {
                    self.apply(completion);
                    applied += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return applied,
            }
        }
    }

    pub fn phase(&self) -> SessionPhase {
        if self.is_submitting {
            SessionPhase::Submitting
        } else if self.result_reference.is_some() {
            SessionPhase::Completed
        } else if self.validation_error.is_some() {
            if self.selected_file.is_some() {
                SessionPhase::SubmissionFailed
            } else {
                SessionPhase::FileInvalid
            }
        } else if self.selected_file.is_none() {
            SessionPhase::Empty
        } else if self.selected_column.is_some() {
            SessionPhase::ColumnSelected
        } else {
            SessionPhase::FileAccepted
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase(),
            attempt: self.attempt,
            file_name: self.selected_file.as_ref().map(|f| f.name().to_string()),
            validation_error: self.validation_error().map(str::to_string),
            available_columns: self.available_columns.clone(),
            selected_column: self.selected_column.clone(),
            is_submitting: self.is_submitting,
            result_reference: self.result_reference.clone(),
        }
    }

    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    pub fn selected_file(&self) -> Option<&LocalFile> {
        self.selected_file.as_ref()
    }

    pub fn validation_error(&self) -> Option<&str> {
        self.validation_error.as_ref().map(|err| err.message.as_str())
    }

    pub fn last_error(&self) -> Option<&ApiError> {
        self.validation_error.as_ref()
    }

    pub fn available_columns(&self) -> &[String] {
        &self.available_columns
    }

    pub fn selected_column(&self) -> Option<&str> {
        self.selected_column.as_deref()
    }

    pub fn is_submitting(&self) -> bool {
        self.is_submitting
    }

    pub fn result_reference(&self) -> Option<&ResultReference> {
        self.result_reference.as_ref()
    }

    /// `processed-<file name>`, or `processed-data.csv` without a file.
    pub fn download_file_name(&self) -> String {
        download_file_name(self.selected_file.as_ref())
    }

    fn spawn_header_read(&mut self, file: LocalFile) {
        let files = Arc::clone(&self.files);
        let tx = self.completions_tx.clone();
        let attempt = self.attempt;
        self.in_flight += 1;
        tokio::spawn(async move {
            let read = tokio::spawn(async move {
                files.read(&file).await.map(|bytes| extract_columns(&bytes))
            });
            let result = match read.await {
                Ok(result) => result,
                Err(err) => Err(SessionError::FileRead(format!("read task failed: {err}"))),
            };
            let _ = tx.send(Completion::HeadersRead { attempt, result });
        });
    }

    fn apply(&mut self, completion: Completion) -> CompletionOutcome {
        self.in_flight = self.in_flight.saturating_sub(1);
        match completion {
            Completion::HeadersRead { attempt, result } => {
                if attempt != self.attempt {
                    debug!(
                        attempt = attempt.0,
                        current = self.attempt.0,
                        "session: dropping stale header read"
                    );
                    return CompletionOutcome::Stale;
                }
                self.selected_column = None;
                match result {
                    Ok(columns) => {
                        info!(
                            attempt = attempt.0,
                            columns = columns.len(),
                            "session: header extracted"
                        );
                        self.available_columns = columns;
                    }
                    Err(err) => {
                        warn!(attempt = attempt.0, error = %err, "session: header read failed");
                        self.selected_file = None;
                        self.available_columns.clear();
                        self.validation_error = Some(err.to_api_error());
                        let _ = self.events.send(SessionEvent::ClearFileInput);
                    }
                }
            }
            Completion::Submitted {
                attempt,
                submission,
                result,
            } => {
                if attempt != self.attempt || submission != self.submission || !self.is_submitting
                {
                    debug!(
                        attempt = attempt.0,
                        submission = submission.0,
                        current = self.attempt.0,
                        "session: dropping superseded submission result"
                    );
                    return CompletionOutcome::Stale;
                }
                self.is_submitting = false;
                match result {
                    Ok(reference) => {
                        info!(
                            attempt = attempt.0,
                            url = reference.as_str(),
                            "session: submission completed"
                        );
                        self.validation_error = None;
                        self.result_reference = Some(reference);
                    }
                    Err(err) => {
                        warn!(attempt = attempt.0, error = %err, "session: submission failed");
                        self.result_reference = None;
                        self.validation_error = Some(err.to_api_error());
                    }
                }
            }
        }
        self.publish_changed();
        CompletionOutcome::Applied
    }

    fn publish_changed(&self) {
        if self.events.receiver_count() > 0 {
            let _ = self.events.send(SessionEvent::Changed(self.snapshot()));
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
