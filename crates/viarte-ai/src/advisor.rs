//! Smart transitions: pick a transition for each clip from the content of
//! the clip before it.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;
use viarte_core::AdvisorConfig;
use viarte_timeline::{Clip, ClipPatch, EditorState, Track, Transition, TransitionKind};

use crate::classify::{ContentClassifier, ContentTag, TagSet};
use crate::error::{AiError, AiResult};

/// Transition policy, first matching rule wins:
///
/// 1. either clip is `action` → glitch
/// 2. both clips are `nature` → fade
/// 3. previous clip is `urban` → slide
/// 4. otherwise → zoom
pub fn choose_transition(prev: &TagSet, next: &TagSet) -> TransitionKind {
    if prev.contains(&ContentTag::Action) || next.contains(&ContentTag::Action) {
        TransitionKind::Glitch
    } else if prev.contains(&ContentTag::Nature) && next.contains(&ContentTag::Nature) {
        TransitionKind::Fade
    } else if prev.contains(&ContentTag::Urban) {
        TransitionKind::Slide
    } else {
        TransitionKind::Zoom
    }
}

/// One successful suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub clip_id: Uuid,
    pub kind: TransitionKind,
}

/// A clip whose suggestion could not be computed or applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionFailure {
    pub clip_id: Uuid,
    pub reason: String,
}

/// Result of a whole-track suggestion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionPlan {
    pub track_id: Uuid,
    /// Transition duration in seconds for every suggestion
    pub duration: f64,
    pub suggestions: Vec<Suggestion>,
    pub failures: Vec<SuggestionFailure>,
}

/// Which clips a plan actually touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub updated: Vec<Uuid>,
    pub failed: Vec<SuggestionFailure>,
}

impl TransitionPlan {
    /// Write each suggestion into the editor on its own. A clip that fails
    /// (e.g. removed since the plan was made) does not block the others.
    pub fn apply(&self, editor: &mut EditorState) -> ApplyReport {
        let mut report = ApplyReport {
            updated: Vec::with_capacity(self.suggestions.len()),
            failed: self.failures.clone(),
        };

        for suggestion in &self.suggestions {
            let patch = ClipPatch::transition(Transition::new(suggestion.kind, self.duration));
            match editor.update_clip(suggestion.clip_id, patch) {
                Ok(()) => report.updated.push(suggestion.clip_id),
                Err(e) => report.failed.push(SuggestionFailure {
                    clip_id: suggestion.clip_id,
                    reason: e.to_string(),
                }),
            }
        }

        info!(
            track = %self.track_id,
            updated = report.updated.len(),
            failed = report.failed.len(),
            "Applied transition plan"
        );
        report
    }
}

/// Suggests transitions using a pluggable classifier.
pub struct TransitionAdvisor<C> {
    classifier: C,
    config: AdvisorConfig,
}

impl<C: ContentClassifier> TransitionAdvisor<C> {
    pub fn new(classifier: C, config: AdvisorConfig) -> Self {
        Self { classifier, config }
    }

    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    /// Transition into `next` from `prev`. Without a previous clip the
    /// answer is always fade.
    pub async fn suggest_transition(&self, prev: Option<&Clip>, next: &Clip) -> AiResult<TransitionKind> {
        let Some(prev) = prev else {
            return Ok(TransitionKind::Fade);
        };

        tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;

        let prev_tags = self.classifier.classify(prev).await?;
        let next_tags = self.classifier.classify(next).await?;
        let kind = choose_transition(&prev_tags, &next_tags);

        debug!(
            prev = %prev.name,
            next = %next.name,
            ?prev_tags,
            ?next_tags,
            %kind,
            "Suggested transition"
        );
        Ok(kind)
    }

    /// Suggest a transition for every clip of a track except the first,
    /// each against its predecessor in timeline order.
    ///
    /// All suggestions run concurrently; the plan is returned once every
    /// one has finished.
    pub async fn suggest_for_track(self: &Arc<Self>, track: &Track) -> TransitionPlan {
        let ordered: Vec<Clip> = track.clips_by_start().into_iter().cloned().collect();

        let tasks: Vec<_> = ordered
            .windows(2)
            .map(|pair| {
                let advisor = Arc::clone(self);
                let prev = pair[0].clone();
                let next = pair[1].clone();
                let clip_id = next.id;
                let handle = tokio::spawn(async move {
                    advisor.suggest_transition(Some(&prev), &next).await
                });
                (clip_id, handle)
            })
            .collect();

        let mut plan = TransitionPlan {
            track_id: track.id,
            duration: self.config.transition_duration,
            suggestions: Vec::with_capacity(tasks.len()),
            failures: Vec::new(),
        };

        for (clip_id, handle) in tasks {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(e) => Err(AiError::TaskFailed(e.to_string())),
            };
            match outcome {
                Ok(kind) => plan.suggestions.push(Suggestion { clip_id, kind }),
                Err(e) => {
                    warn!(clip = %clip_id, error = %e, "Transition suggestion failed");
                    plan.failures.push(SuggestionFailure {
                        clip_id,
                        reason: e.to_string(),
                    });
                }
            }
        }
        plan
    }
}
