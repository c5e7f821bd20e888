//! Pipeline Orchestrator
//!
//! Drives one photo through preparation, analysis, suggestion generation,
//! and user-selected transformation, persisting every step in the media
//! store. The orchestrator is the only layer allowed to mask a client
//! failure, and only by substituting the deterministic fallback pipeline;
//! the real failure text is always retained on the synthesized record.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::ai::{AnalysisProvider, AnalysisResult, SuggestionProvider};
use crate::imaging;
use crate::pipeline::mock;
use crate::pipeline::state::{PipelineEvent, PipelinePhase, PipelineSnapshot, PipelineState};
use crate::store::{Analysis, MediaPayload, MediaStore, Photo, Suggestion};
use crate::transform::{ProgressReporter, TransformProvider, TransformRequest};
use crate::{CoreResult, MediaId, SuggestionId};

// =============================================================================
// Handles
// =============================================================================

/// A photo's unit of work, suspended at the selection point
#[derive(Debug)]
pub struct PhotoFlow {
    pub photo: Photo,
    pub analysis: Analysis,
    pub suggestions: Vec<Suggestion>,
    state: Arc<PipelineState>,
}

impl PhotoFlow {
    pub fn snapshot(&self) -> PipelineSnapshot {
        self.state.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.state.subscribe()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.state.events()
    }
}

/// Handle to one in-flight (or finished) transform unit of work.
///
/// Cloneable: concurrent applications of the same suggestion share one
/// handle observing one job.
#[derive(Clone)]
pub struct TransformHandle {
    pub media_id: MediaId,
    pub suggestion_id: SuggestionId,
    state: Arc<PipelineState>,
    progress: watch::Receiver<f64>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl TransformHandle {
    pub fn snapshot(&self) -> PipelineSnapshot {
        self.state.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.state.subscribe()
    }

    /// Raw transform-job progress feed in [0, 1]
    pub fn progress(&self) -> watch::Receiver<f64> {
        self.progress.clone()
    }

    /// Waits for the unit of work to finish.
    pub async fn wait(&self) {
        let task = self.task.lock().unwrap().take();
        match task {
            Some(task) => {
                let _ = task.await;
            }
            None => {
                // Another holder owns the join handle; follow the state feed.
                let mut rx = self.state.subscribe();
                loop {
                    let phase = rx.borrow_and_update().phase;
                    if phase.is_terminal() || phase == PipelinePhase::Error {
                        return;
                    }
                    if rx.changed().await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Coordinates the store and the three clients for all units of work
pub struct Orchestrator {
    store: Arc<MediaStore>,
    analysis: Arc<dyn AnalysisProvider>,
    suggestions: Arc<dyn SuggestionProvider>,
    transform: Arc<dyn TransformProvider>,
    /// In-flight transform units keyed by suggestion id
    active: Arc<Mutex<HashMap<SuggestionId, TransformHandle>>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<MediaStore>,
        analysis: Arc<dyn AnalysisProvider>,
        suggestions: Arc<dyn SuggestionProvider>,
        transform: Arc<dyn TransformProvider>,
    ) -> Self {
        Self {
            store,
            analysis,
            suggestions,
            transform,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Ingests a photo and runs it through analysis and suggestion
    /// generation, suspending at the selection point. Client failures fall
    /// back to the deterministic local pipeline; the flow always reaches
    /// `AwaitingSelection`.
    pub async fn start(&self, data: Vec<u8>, filename: impl Into<String>) -> CoreResult<PhotoFlow> {
        let state = Arc::new(PipelineState::new());
        let photo = self.store.create_photo(data, filename)?;
        info!(photo_id = %photo.id, "pipeline started");
        self.run_understanding(photo, state).await
    }

    /// Re-runs the full pipeline for an existing photo ("try again"). A
    /// fresh analysis replaces the previous one; new suggestions are
    /// appended after the existing batch.
    pub async fn try_again(&self, photo_id: &str) -> CoreResult<PhotoFlow> {
        let photo = self.store.get_photo(photo_id)?;
        let state = Arc::new(PipelineState::new());
        info!(photo_id = %photo.id, "pipeline restarted");
        self.run_understanding(photo, state).await
    }

    async fn run_understanding(
        &self,
        photo: Photo,
        state: Arc<PipelineState>,
    ) -> CoreResult<PhotoFlow> {
        state.transition(PipelinePhase::Analyzing)?;

        let (analysis, analysis_result) = match self.analysis.analyze(&photo.data).await {
            Ok(result) => {
                let analysis = result.to_analysis(&photo.id);
                self.store.attach_analysis(&analysis)?;
                (analysis, Some(result))
            }
            Err(err) if err.is_maskable() => {
                warn!(photo_id = %photo.id, error = %err, "analysis failed, using fallback");
                state.fail(err.to_string())?;
                let analysis = mock::mock_analysis(&photo.id, Some(err.to_string()));
                self.store.attach_analysis(&analysis)?;
                (analysis, None)
            }
            Err(err) => return Err(err),
        };

        state.transition(PipelinePhase::GeneratingSuggestions)?;

        let suggestions = match analysis_result {
            // A mocked analysis carries no signal worth prompting with; the
            // fallback batch stands in for the whole understanding step.
            None => self.attach_mock_suggestions(&photo.id)?,
            Some(result) => match self.suggestions.suggest(&result).await {
                Ok(results) => {
                    let batch = results
                        .iter()
                        .map(|r| r.to_suggestion(&photo.id))
                        .collect::<Vec<_>>();
                    self.store.attach_suggestions(&photo.id, batch)?
                }
                Err(err) if err.is_maskable() => {
                    warn!(photo_id = %photo.id, error = %err, "suggestions failed, using fallback");
                    state.fail(err.to_string())?;
                    self.attach_mock_suggestions(&photo.id)?
                }
                Err(err) => return Err(err),
            },
        };

        state.transition(PipelinePhase::AwaitingSelection)?;
        Ok(PhotoFlow {
            photo,
            analysis,
            suggestions,
            state,
        })
    }

    fn attach_mock_suggestions(&self, photo_id: &str) -> CoreResult<Vec<Suggestion>> {
        self.store
            .attach_suggestions(photo_id, mock::mock_suggestions(photo_id))
    }

    /// Resumes a suspended flow by executing the selected suggestion as an
    /// independent unit of work. Re-invocation while the suggestion's job is
    /// in flight returns the existing handle instead of starting a new job.
    pub fn apply_suggestion(&self, suggestion_id: &str) -> CoreResult<TransformHandle> {
        // Held across setup so two concurrent applications cannot both miss
        // the map; everything inside is synchronous.
        let mut active = self.active.lock().unwrap();
        if let Some(handle) = active.get(suggestion_id) {
            info!(suggestion_id, "transform already in flight, returning handle");
            return Ok(handle.clone());
        }

        let suggestion = self.store.get_suggestion(suggestion_id)?;
        let photo = self.store.get_photo(&suggestion.photo_id)?;

        let extension = if suggestion.kind.is_video() { "mp4" } else { "jpg" };
        let filename = format!("{}_{}.{}", suggestion.kind, suggestion.id, extension);
        let media = self.store.create_processed_media(
            &photo.id,
            Some(&suggestion.id),
            suggestion.media_kind(),
            filename,
        )?;
        self.store.mark_processing(&media.id, None)?;

        let state = Arc::new(PipelineState::starting_at(PipelinePhase::AwaitingSelection));
        let (reporter, progress_rx) = ProgressReporter::new();

        let task = tokio::spawn(Self::drive_transform(
            self.store.clone(),
            self.transform.clone(),
            self.active.clone(),
            state.clone(),
            reporter,
            photo,
            suggestion,
            media.id.clone(),
        ));

        let handle = TransformHandle {
            media_id: media.id,
            suggestion_id: suggestion_id.to_string(),
            state,
            progress: progress_rx,
            task: Arc::new(Mutex::new(Some(task))),
        };
        active.insert(suggestion_id.to_string(), handle.clone());
        Ok(handle)
    }

    /// Abandons a suggestion's in-flight job: the driving task is aborted
    /// and the media record is marked cancelled. Returns false when nothing
    /// was in flight.
    pub fn cancel(&self, suggestion_id: &str) -> CoreResult<bool> {
        let handle = self.active.lock().unwrap().remove(suggestion_id);
        let Some(handle) = handle else {
            return Ok(false);
        };

        if let Some(task) = handle.task.lock().unwrap().take() {
            task.abort();
        }
        // The job may have just finished; a terminal record stays put.
        let cancelled = self.store.mark_cancelled(&handle.media_id)?;
        let _ = handle.state.fail("cancelled by user");
        info!(suggestion_id, media_id = %handle.media_id, cancelled, "transform abandoned");
        Ok(cancelled)
    }

    #[allow(clippy::too_many_arguments)]
    async fn drive_transform(
        store: Arc<MediaStore>,
        transform: Arc<dyn TransformProvider>,
        active: Arc<Mutex<HashMap<SuggestionId, TransformHandle>>>,
        state: Arc<PipelineState>,
        reporter: ProgressReporter,
        photo: Photo,
        suggestion: Suggestion,
        media_id: MediaId,
    ) {
        let outcome = Self::run_transform(
            &store, &*transform, &state, reporter, &photo, &suggestion, &media_id,
        )
        .await;

        if let Err(err) = outcome {
            error!(media_id = %media_id, error = %err, "transform unit failed");
            let _ = store.mark_failed(&media_id, &err.to_string());
            let _ = state.fail(err.to_string());
        }

        active.lock().unwrap().remove(&suggestion.id);
    }

    async fn run_transform(
        store: &Arc<MediaStore>,
        transform: &dyn TransformProvider,
        state: &Arc<PipelineState>,
        reporter: ProgressReporter,
        photo: &Photo,
        suggestion: &Suggestion,
        media_id: &str,
    ) -> CoreResult<()> {
        state.transition(PipelinePhase::Transforming)?;

        // Mirror the job's progress feed into the state machine and the
        // persisted record; ends when the reporter is dropped.
        let mut feed = reporter.subscribe();
        let forward_store = store.clone();
        let forward_state = state.clone();
        let forward_id = media_id.to_string();
        let forwarder = tokio::spawn(async move {
            while feed.changed().await.is_ok() {
                let value = *feed.borrow_and_update();
                forward_state.set_transform_progress(value);
                let _ = forward_store.update_progress(&forward_id, value);
            }
        });

        let request = TransformRequest {
            image: photo.data.clone(),
            kind: suggestion.kind,
            target_model: suggestion.target_model.clone(),
            params: suggestion.params.clone(),
        };

        let outcome = transform.transform(&request, &reporter).await;
        drop(reporter);
        let _ = forwarder.await;

        match outcome {
            Ok(output) => {
                state.transition(PipelinePhase::Finalizing)?;

                let dimensions = if output.is_video {
                    None
                } else {
                    imaging::probe(&output.media_bytes).ok()
                };
                let payload = MediaPayload {
                    data: output.media_bytes,
                    thumbnail: None,
                    width: dimensions.as_ref().map(|d| d.width),
                    height: dimensions.as_ref().map(|d| d.height),
                    duration_sec: if suggestion.kind.is_video() {
                        output
                            .duration_sec
                            .or(Some(suggestion.estimated_duration_sec))
                    } else {
                        None
                    },
                };
                store.mark_completed(media_id, payload)?;
                store.merge_metadata(media_id, output.metadata)?;

                state.transition(PipelinePhase::Completed)?;
                info!(media_id, "transform completed");
                Ok(())
            }
            Err(err) if err.is_maskable() => {
                warn!(media_id, error = %err, "transform failed, completing with fallback");
                state.fail(err.to_string())?;

                store.mark_completed(media_id, mock::mock_payload(photo, suggestion))?;
                let mut metadata = BTreeMap::new();
                metadata.insert(mock::MOCK_TAG_KEY.to_string(), "true".to_string());
                metadata.insert(mock::FALLBACK_ERROR_KEY.to_string(), err.to_string());
                store.merge_metadata(media_id, metadata)?;

                state.transition(PipelinePhase::Finalizing)?;
                state.transition(PipelinePhase::Completed)?;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}
