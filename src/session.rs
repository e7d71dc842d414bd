//! Conversion session: the selection, the chosen output, and the
//! `Idle → Converting → {Succeeded, Failed} → Idle` state machine.
//!
//! The session is the single owner of the [`SelectionStore`]. While a batch
//! is in flight the store is frozen: `add`, `remove` and `clear` return
//! [`SessionError::Busy`] instead of mutating a list the batch is reading.
//!
//! A batch can be run in one call ([`ConversionSession::convert`]) or split
//! into [`start`](ConversionSession::start) / [`PendingBatch::run`] /
//! [`finish`](ConversionSession::finish) when the work happens on another
//! thread and the caller keeps handling input meanwhile.

use crate::convert::{
    BatchContext, BatchError, BatchPolicy, BatchReport, ConvertEvent, convert_all_with_backend,
};
use crate::download::{DownloadSink, TransientStore};
use crate::imaging::{ConversionRequest, IcoMode, ImageBackend, Quality, TargetFormat};
use crate::selection::{ImageId, RawFile, SelectedImage, SelectionError, SelectionStore};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("A conversion is in progress")]
    Busy,
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Batch(#[from] BatchError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Converting,
    Succeeded {
        count: usize,
    },
    Failed,
}

/// Snapshot of a started batch, runnable away from the session.
#[derive(Debug, Clone)]
pub struct PendingBatch {
    pub images: Vec<SelectedImage>,
    pub request: ConversionRequest,
    pub policy: BatchPolicy,
}

impl PendingBatch {
    pub fn run(
        &self,
        backend: &impl ImageBackend,
        sink: &dyn DownloadSink,
        transient: &TransientStore,
        events: Option<&Sender<ConvertEvent>>,
    ) -> Result<Option<BatchReport>, BatchError> {
        let mut ctx = BatchContext::new(sink, transient).with_policy(self.policy);
        ctx.events = events;
        convert_all_with_backend(backend, &self.images, &self.request, &ctx)
    }
}

pub struct ConversionSession<B: ImageBackend> {
    backend: B,
    store: SelectionStore,
    format: Option<TargetFormat>,
    quality: Quality,
    ico_mode: IcoMode,
    policy: BatchPolicy,
    state: SessionState,
    transient: TransientStore,
    events: Option<Sender<ConvertEvent>>,
}

impl<B: ImageBackend> ConversionSession<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            store: SelectionStore::new(),
            format: None,
            quality: Quality::default(),
            ico_mode: IcoMode::default(),
            policy: BatchPolicy::default(),
            state: SessionState::Idle,
            transient: TransientStore::new(),
            events: None,
        }
    }

    /// Route store and batch notifications to `events`.
    pub fn with_events(mut self, events: Sender<ConvertEvent>) -> Self {
        self.store = SelectionStore::with_events(events.clone());
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state == SessionState::Converting
    }

    pub fn selection(&self) -> &SelectionStore {
        &self.store
    }

    pub fn transient(&self) -> &TransientStore {
        &self.transient
    }

    pub fn format(&self) -> Option<TargetFormat> {
        self.format
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn select_format(&mut self, format: TargetFormat) {
        self.format = Some(format);
    }

    pub fn set_quality(&mut self, quality: Quality) {
        self.quality = quality;
    }

    pub fn set_ico_mode(&mut self, ico_mode: IcoMode) {
        self.ico_mode = ico_mode;
    }

    pub fn set_policy(&mut self, policy: BatchPolicy) {
        self.policy = policy;
    }

    /// Take format, quality and ICO mode from a prepared request.
    pub fn apply_request(&mut self, request: ConversionRequest) {
        self.format = Some(request.target_format);
        self.quality = request.quality;
        self.ico_mode = request.ico_mode;
    }

    /// The request the next batch would use, if a format is chosen.
    pub fn request(&self) -> Option<ConversionRequest> {
        self.format
            .map(|f| ConversionRequest::new(f, self.quality).with_ico_mode(self.ico_mode))
    }

    /// Whether `convert` would actually run.
    pub fn can_convert(&self) -> bool {
        !self.is_busy() && !self.store.is_empty() && self.format.is_some()
    }

    pub fn add(&mut self, files: Vec<RawFile>) -> Result<usize, SessionError> {
        self.ensure_idle()?;
        Ok(self.store.add(files)?)
    }

    pub fn remove(&mut self, index: usize) -> Result<Option<SelectedImage>, SessionError> {
        self.ensure_idle()?;
        Ok(self.store.remove(index))
    }

    pub fn remove_by_id(&mut self, id: ImageId) -> Result<Option<SelectedImage>, SessionError> {
        self.ensure_idle()?;
        Ok(self.store.remove_by_id(id))
    }

    pub fn clear(&mut self) -> Result<(), SessionError> {
        self.ensure_idle()?;
        self.store.clear();
        Ok(())
    }

    /// Enter `Converting` and snapshot the batch.
    ///
    /// `Ok(None)` when there is nothing to do: empty selection or no format.
    pub fn start(&mut self) -> Result<Option<PendingBatch>, SessionError> {
        self.ensure_idle()?;
        let Some(request) = self.request() else {
            return Ok(None);
        };
        if self.store.is_empty() {
            return Ok(None);
        }
        self.state = SessionState::Converting;
        debug!(count = self.store.len(), format = %request.target_format, "session converting");
        Ok(Some(PendingBatch {
            images: self.store.images().to_vec(),
            request,
            policy: self.policy,
        }))
    }

    /// Record a batch outcome and leave `Converting`.
    pub fn finish(
        &mut self,
        outcome: Result<Option<BatchReport>, BatchError>,
    ) -> Result<Option<BatchReport>, SessionError> {
        match outcome {
            Ok(report) => {
                let count = report.as_ref().map_or(0, |r| r.results.len());
                self.state = SessionState::Succeeded { count };
                Ok(report)
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e.into())
            }
        }
    }

    /// Run a whole batch against `sink` on the calling thread.
    pub fn convert(&mut self, sink: &dyn DownloadSink) -> Result<Option<BatchReport>, SessionError> {
        let Some(pending) = self.start()? else {
            return Ok(None);
        };
        let outcome = pending.run(&self.backend, sink, &self.transient, self.events.as_ref());
        self.finish(outcome)
    }

    /// Return to `Idle` after the outcome has been shown.
    pub fn acknowledge(&mut self) {
        if !self.is_busy() {
            self.state = SessionState::Idle;
        }
    }

    /// Mutations are allowed whenever no batch is running; a finished
    /// outcome is implicitly acknowledged by the next action.
    fn ensure_idle(&mut self) -> Result<(), SessionError> {
        if self.is_busy() {
            return Err(SessionError::Busy);
        }
        self.state = SessionState::Idle;
        Ok(())
    }
}
