#![forbid(unsafe_code)]

//! Static definitions of steps, tours, highlights, and milestones, plus
//! the registration-time validation that keeps malformed definitions out
//! of the catalog.
//!
//! # Failure Modes
//!
//! A definition missing its id, title, or content is rejected with a
//! [`CatalogError`], logged, and not added. Registration failures never
//! crash the host; the engine simply behaves as if the definition did not
//! exist.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tourkit_core::geometry::Placement;

use crate::stage::Stage;
use crate::{HighlightId, MilestoneId, StepId, TimestampMs, TourId};

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// How strongly a checklist step is recommended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepCategory {
    /// Counts toward overall progress.
    Essential,
    Recommended,
    Advanced,
    Optional,
}

/// Well-known id of the checklist step that produces the user's first
/// content. Completing it feeds the time-to-first-content metric.
pub const STEP_FIRST_CONTENT: &str = "generate_first_content";

/// A checklist step definition from the static catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDef {
    pub id: StepId,
    pub title: String,
    pub description: String,
    pub category: StepCategory,
    /// Ordering key within the checklist.
    pub order: u32,
    /// Steps that must be completed before this one becomes available.
    #[serde(default)]
    pub dependencies: Vec<StepId>,
}

// ---------------------------------------------------------------------------
// Tours
// ---------------------------------------------------------------------------

bitflags! {
    /// Which navigation affordances a tour step shows.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StepFlags: u8 {
        const SHOW_SKIP = 1 << 0;
        const SHOW_BACK = 1 << 1;
        const SHOW_NEXT = 1 << 2;
    }
}

impl Default for StepFlags {
    fn default() -> Self {
        StepFlags::all()
    }
}

/// An action the user (or the page) must perform before a step advances.
///
/// `Click` and `Input` are enforced by the host: it watches the target
/// for the interaction and calls the runner's `next` when it happens
/// (and renders the step's navigation affordances accordingly). Only
/// `WaitFor` is driven by the runner itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StepAction {
    /// The user must click the target.
    Click,
    /// The user must type into the target.
    Input,
    /// Advancing waits until `selector` appears, or `timeout` elapses.
    /// The timeout is policy, not failure: the runner proceeds either way.
    WaitFor { selector: String, timeout: Duration },
}

/// One step of a guided tour.
///
/// Step order is fixed at authoring time; the runner only moves a cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct TourStep {
    /// Selector of the element this step points at.
    pub target: String,
    pub title: String,
    pub content: String,
    /// Preferred tooltip side; the geometry resolver may flip it.
    pub placement: Placement,
    /// Required action before the step is considered done, if any.
    pub action: Option<StepAction>,
    pub flags: StepFlags,
    /// Advance automatically after this delay, unless paused or navigated.
    pub auto_advance: Option<Duration>,
}

impl TourStep {
    /// A plain step with default flags and no action.
    #[must_use]
    pub fn new(
        target: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            title: title.into(),
            content: content.into(),
            placement: Placement::default(),
            action: None,
            flags: StepFlags::default(),
            auto_advance: None,
        }
    }

    /// Set the preferred placement.
    #[must_use]
    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    /// Set a required action.
    #[must_use]
    pub fn with_action(mut self, action: StepAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Set an auto-advance delay.
    #[must_use]
    pub fn with_auto_advance(mut self, delay: Duration) -> Self {
        self.auto_advance = Some(delay);
        self
    }
}

/// A guided tour definition.
#[derive(Debug, Clone, PartialEq)]
pub struct TourDef {
    pub id: TourId,
    pub name: String,
    pub steps: Vec<TourStep>,
    pub estimated_minutes: u32,
    pub skippable: bool,
}

impl TourDef {
    /// Index of the last step. Empty tours are rejected at registration,
    /// so registered tours always have one.
    #[must_use]
    pub fn last_index(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }
}

// ---------------------------------------------------------------------------
// Highlights and milestones
// ---------------------------------------------------------------------------

/// Conditions under which a highlight is shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ShowCondition {
    /// Journey stage must be at or past this stage.
    StageReached { stage: Stage },
    /// A host feature flag must be on.
    FeatureFlag { name: String },
    /// A usage counter must have reached a threshold.
    UsageAtLeast { metric: String, count: u64 },
}

/// A dismissible feature callout.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightDef {
    pub id: HighlightId,
    /// Selector of the element the callout anchors to.
    pub target: String,
    pub title: String,
    pub content: String,
    /// Higher shows first.
    pub priority: u8,
    pub conditions: Vec<ShowCondition>,
    /// Do not show past this time.
    pub expires_at: Option<TimestampMs>,
}

/// A rewarded achievement tied to a usage threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: MilestoneId,
    pub title: String,
    /// Metric name the threshold applies to.
    pub metric: String,
    pub threshold: u64,
    pub reward: String,
    /// Set once achieved; never cleared.
    pub achieved_at: Option<TimestampMs>,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Validation failures at registration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The definition has an empty id.
    MissingId,
    /// The definition (or a tour step) has an empty title.
    MissingTitle { id: String },
    /// A tour step has empty content.
    MissingContent { id: String, step_index: usize },
    /// A tour has no steps.
    EmptyTour { id: String },
    /// A definition with this id is already registered.
    DuplicateId { id: String },
    /// A step declares a dependency on an unregistered step.
    UnknownDependency { id: String, dependency: String },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::MissingId => write!(f, "definition has no id"),
            CatalogError::MissingTitle { id } => write!(f, "definition {id:?} has no title"),
            CatalogError::MissingContent { id, step_index } => {
                write!(f, "tour {id:?} step {step_index} has no content")
            }
            CatalogError::EmptyTour { id } => write!(f, "tour {id:?} has no steps"),
            CatalogError::DuplicateId { id } => write!(f, "id {id:?} is already registered"),
            CatalogError::UnknownDependency { id, dependency } => {
                write!(f, "step {id:?} depends on unregistered step {dependency:?}")
            }
        }
    }
}

impl std::error::Error for CatalogError {}

/// The static registry of step, tour, highlight, and milestone definitions.
///
/// Registration validates; lookups are infallible `Option`s. `BTreeMap`
/// keeps iteration deterministic.
#[derive(Debug, Default)]
pub struct Catalog {
    steps: BTreeMap<StepId, StepDef>,
    tours: BTreeMap<TourId, TourDef>,
    highlights: BTreeMap<HighlightId, HighlightDef>,
}

impl Catalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a checklist step.
    pub fn register_step(&mut self, step: StepDef) -> Result<(), CatalogError> {
        if step.id.is_empty() {
            tracing::warn!("rejecting step definition with empty id");
            return Err(CatalogError::MissingId);
        }
        if step.title.is_empty() {
            tracing::warn!(id = %step.id, "rejecting step definition with empty title");
            return Err(CatalogError::MissingTitle {
                id: step.id.clone(),
            });
        }
        if self.steps.contains_key(&step.id) {
            tracing::warn!(id = %step.id, "rejecting duplicate step definition");
            return Err(CatalogError::DuplicateId {
                id: step.id.clone(),
            });
        }
        for dep in &step.dependencies {
            if !self.steps.contains_key(dep) {
                tracing::warn!(id = %step.id, dependency = %dep, "rejecting step with unknown dependency");
                return Err(CatalogError::UnknownDependency {
                    id: step.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
        self.steps.insert(step.id.clone(), step);
        Ok(())
    }

    /// Register a tour, validating every step.
    pub fn register_tour(&mut self, tour: TourDef) -> Result<(), CatalogError> {
        if tour.id.is_empty() {
            tracing::warn!("rejecting tour definition with empty id");
            return Err(CatalogError::MissingId);
        }
        if self.tours.contains_key(&tour.id) {
            tracing::warn!(id = %tour.id, "rejecting duplicate tour definition");
            return Err(CatalogError::DuplicateId {
                id: tour.id.clone(),
            });
        }
        if tour.steps.is_empty() {
            tracing::warn!(id = %tour.id, "rejecting tour with no steps");
            return Err(CatalogError::EmptyTour {
                id: tour.id.clone(),
            });
        }
        for (i, step) in tour.steps.iter().enumerate() {
            if step.title.is_empty() {
                tracing::warn!(id = %tour.id, step = i, "rejecting tour with untitled step");
                return Err(CatalogError::MissingTitle {
                    id: tour.id.clone(),
                });
            }
            if step.content.is_empty() {
                tracing::warn!(id = %tour.id, step = i, "rejecting tour with empty step content");
                return Err(CatalogError::MissingContent {
                    id: tour.id.clone(),
                    step_index: i,
                });
            }
        }
        self.tours.insert(tour.id.clone(), tour);
        Ok(())
    }

    /// Register a highlight.
    pub fn register_highlight(&mut self, highlight: HighlightDef) -> Result<(), CatalogError> {
        if highlight.id.is_empty() {
            tracing::warn!("rejecting highlight definition with empty id");
            return Err(CatalogError::MissingId);
        }
        if highlight.title.is_empty() {
            tracing::warn!(id = %highlight.id, "rejecting highlight with empty title");
            return Err(CatalogError::MissingTitle {
                id: highlight.id.clone(),
            });
        }
        if self.highlights.contains_key(&highlight.id) {
            tracing::warn!(id = %highlight.id, "rejecting duplicate highlight definition");
            return Err(CatalogError::DuplicateId {
                id: highlight.id.clone(),
            });
        }
        self.highlights.insert(highlight.id.clone(), highlight);
        Ok(())
    }

    /// Look up a step.
    #[must_use]
    pub fn step(&self, id: &str) -> Option<&StepDef> {
        self.steps.get(id)
    }

    /// Look up a tour.
    #[must_use]
    pub fn tour(&self, id: &str) -> Option<&TourDef> {
        self.tours.get(id)
    }

    /// Look up a highlight.
    #[must_use]
    pub fn highlight(&self, id: &str) -> Option<&HighlightDef> {
        self.highlights.get(id)
    }

    /// All steps sorted by ordering key.
    #[must_use]
    pub fn steps_in_order(&self) -> Vec<&StepDef> {
        let mut steps: Vec<_> = self.steps.values().collect();
        steps.sort_by_key(|s| (s.order, s.id.as_str()));
        steps
    }

    /// Number of registered steps.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Number of registered tours.
    #[must_use]
    pub fn tour_count(&self) -> usize {
        self.tours.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, order: u32) -> StepDef {
        StepDef {
            id: id.into(),
            title: format!("Step {id}"),
            description: String::new(),
            category: StepCategory::Essential,
            order,
            dependencies: vec![],
        }
    }

    fn tour(id: &str, steps: usize) -> TourDef {
        TourDef {
            id: id.into(),
            name: format!("Tour {id}"),
            steps: (0..steps)
                .map(|i| TourStep::new(format!("#t{i}"), format!("Step {i}"), "Body"))
                .collect(),
            estimated_minutes: 3,
            skippable: true,
        }
    }

    #[test]
    fn register_and_look_up_step() {
        let mut cat = Catalog::new();
        cat.register_step(step("create_workspace", 1)).unwrap();
        assert!(cat.step("create_workspace").is_some());
        assert!(cat.step("nope").is_none());
    }

    #[test]
    fn empty_id_rejected() {
        let mut cat = Catalog::new();
        assert_eq!(
            cat.register_step(step("", 1)),
            Err(CatalogError::MissingId)
        );
        assert_eq!(cat.step_count(), 0);
    }

    #[test]
    fn unknown_dependency_rejected() {
        let mut cat = Catalog::new();
        let mut s = step("later", 2);
        s.dependencies.push("earlier".into());
        assert!(matches!(
            cat.register_step(s),
            Err(CatalogError::UnknownDependency { .. })
        ));
    }

    #[test]
    fn dependency_on_registered_step_accepted() {
        let mut cat = Catalog::new();
        cat.register_step(step("earlier", 1)).unwrap();
        let mut s = step("later", 2);
        s.dependencies.push("earlier".into());
        cat.register_step(s).unwrap();
    }

    #[test]
    fn empty_tour_rejected_and_not_added() {
        let mut cat = Catalog::new();
        let result = cat.register_tour(tour("empty", 0));
        assert_eq!(
            result,
            Err(CatalogError::EmptyTour { id: "empty".into() })
        );
        assert!(cat.tour("empty").is_none());
    }

    #[test]
    fn tour_with_empty_step_content_rejected() {
        let mut cat = Catalog::new();
        let mut t = tour("bad", 2);
        t.steps[1].content = String::new();
        assert_eq!(
            cat.register_tour(t),
            Err(CatalogError::MissingContent {
                id: "bad".into(),
                step_index: 1,
            })
        );
        assert!(cat.tour("bad").is_none());
    }

    #[test]
    fn duplicate_tour_rejected() {
        let mut cat = Catalog::new();
        cat.register_tour(tour("t", 2)).unwrap();
        assert!(matches!(
            cat.register_tour(tour("t", 3)),
            Err(CatalogError::DuplicateId { .. })
        ));
        // Original survives.
        assert_eq!(cat.tour("t").unwrap().steps.len(), 2);
    }

    #[test]
    fn steps_in_order_sorts_by_ordering_key() {
        let mut cat = Catalog::new();
        cat.register_step(step("c", 3)).unwrap();
        cat.register_step(step("a", 1)).unwrap();
        cat.register_step(step("b", 2)).unwrap();
        let ids: Vec<_> = cat.steps_in_order().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn step_flags_default_shows_everything() {
        let flags = StepFlags::default();
        assert!(flags.contains(StepFlags::SHOW_SKIP));
        assert!(flags.contains(StepFlags::SHOW_BACK));
        assert!(flags.contains(StepFlags::SHOW_NEXT));
    }
}
