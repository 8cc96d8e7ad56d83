use log::warn;

use crate::error::TransitionError;
use crate::models::{Document, UploadRequest};
use crate::repository::Repository;
use crate::services::QueryClient;
use crate::utils::validation::{validate_files, ValidationConfig};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UploadPhase {
    #[default]
    Closed,
    Open {
        errors: Vec<String>,
    },
    Validating,
    Submitting {
        uploads: usize,
    },
}

impl UploadPhase {
    fn name(&self) -> &'static str {
        match self {
            UploadPhase::Closed => "closed",
            UploadPhase::Open { .. } => "open",
            UploadPhase::Validating => "validating",
            UploadPhase::Submitting { .. } => "submitting",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Uploaded(Vec<Document>),
    Failed(Vec<String>),
}

#[derive(Debug, Default)]
pub struct UploadDialog {
    phase: UploadPhase,
    pending: Vec<UploadRequest>,
}

impl UploadDialog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &UploadPhase {
        &self.phase
    }

    pub fn errors(&self) -> &[String] {
        match &self.phase {
            UploadPhase::Open { errors } => errors,
            _ => &[],
        }
    }

    pub fn open(&mut self) -> Result<(), TransitionError> {
        match self.phase {
            UploadPhase::Closed => {
                self.phase = UploadPhase::Open { errors: Vec::new() };
                Ok(())
            }
            _ => Err(TransitionError::new(self.phase.name(), "open")),
        }
    }

    /// Cancelling is refused while an upload is on the wire.
    pub fn close(&mut self) -> Result<(), TransitionError> {
        match self.phase {
            UploadPhase::Submitting { .. } => Err(TransitionError::new(self.phase.name(), "close")),
            _ => {
                self.phase = UploadPhase::Closed;
                self.pending.clear();
                Ok(())
            }
        }
    }

    /// Validates the selection. Valid files move the dialog to `Submitting`;
    /// otherwise it reopens with the validation messages.
    pub fn select_files(
        &mut self,
        files: Vec<UploadRequest>,
        rules: &ValidationConfig,
    ) -> Result<&UploadPhase, TransitionError> {
        if !matches!(self.phase, UploadPhase::Open { .. }) {
            return Err(TransitionError::new(self.phase.name(), "select files"));
        }
        self.phase = UploadPhase::Validating;

        let candidates: Vec<_> = files.iter().map(UploadRequest::candidate).collect();
        let result = if files.is_empty() {
            Err(vec!["No files selected".to_string()])
        } else {
            let validation = validate_files(&candidates, rules);
            if validation.valid {
                Ok(())
            } else {
                Err(validation.errors)
            }
        };

        match result {
            Ok(()) => {
                self.phase = UploadPhase::Submitting { uploads: files.len() };
                self.pending = files;
            }
            Err(errors) => {
                self.phase = UploadPhase::Open { errors };
            }
        }
        Ok(&self.phase)
    }

    /// Sends the validated files. Success closes the dialog; failure reopens it
    /// with the error message.
    pub async fn submit<R: Repository + 'static>(
        &mut self,
        client: &QueryClient<R>,
    ) -> Result<SubmitOutcome, TransitionError> {
        if !matches!(self.phase, UploadPhase::Submitting { .. }) {
            return Err(TransitionError::new(self.phase.name(), "submit"));
        }
        let files = std::mem::take(&mut self.pending);
        match client.upload(files).await {
            Ok(documents) => {
                self.phase = UploadPhase::Closed;
                Ok(SubmitOutcome::Uploaded(documents))
            }
            Err(err) => {
                warn!("Upload failed: {}", err);
                let errors = err.messages();
                self.phase = UploadPhase::Open {
                    errors: errors.clone(),
                };
                Ok(SubmitOutcome::Failed(errors))
            }
        }
    }
}
