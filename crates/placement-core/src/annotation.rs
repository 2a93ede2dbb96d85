//! Annotations bound to a placed instance's local frame
//!
//! An annotation keeps its position in the host's local frame. Whenever the
//! host moves, [`AnnotationBinder::reproject`] recomputes the world position
//! from that local position, so annotations stay on the surface they were
//! placed on.

use std::collections::BTreeSet;

use glam::Vec3;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::placeable::PlacedInstance;
use crate::policy::AnnotationPolicy;
use crate::types::{AnnotationId, InstanceId};

/// Scene anchor of a committed annotation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnotationAnchor {
    /// World position of the anchor
    pub position: Vec3,
    /// Offset of the UI holder from the anchor, along object-center-to-hit
    pub holder_offset: Vec3,
}

/// A durable annotation on a placed instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    pub host: InstanceId,
    pub title: String,
    pub description: String,
    /// None = not answered
    pub yes_no_answer: Option<bool>,
    pub world_position: Vec3,
    /// Position in the host's local frame
    pub local_position: Vec3,
    pub is_expanded: bool,
    pub anchor: AnnotationAnchor,
}

impl Annotation {
    pub fn yes_no_answer_text(&self) -> &'static str {
        match self.yes_no_answer {
            Some(true) => "Yes",
            Some(false) => "No",
            None => "Not Set",
        }
    }
}

/// Ephemeral single-slot draft shown before commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewAnnotation {
    pub host: InstanceId,
    pub title: String,
    pub description: String,
    /// Surface hit point in world space
    pub world_position: Vec3,
    /// Surface hit point in the host's local frame
    pub local_position: Vec3,
    /// Where the preview card sits in the host's local frame, pushed off the surface
    pub display_position: Vec3,
}

/// Search context used to filter annotations by title
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationQuery {
    pub search_text: String,
}

impl AnnotationQuery {
    pub fn new(search_text: impl Into<String>) -> Self {
        Self {
            search_text: search_text.into(),
        }
    }

    /// Case-insensitive substring match; an empty query matches everything
    pub fn matches(&self, title: &str) -> bool {
        self.search_text.is_empty()
            || title
                .to_lowercase()
                .contains(&self.search_text.to_lowercase())
    }
}

/// Unique random numeric titles for demo sessions
#[derive(Debug, Clone, Default)]
struct NumberedTitles {
    used: BTreeSet<u32>,
}

impl NumberedTitles {
    fn next(&mut self, max: u32) -> Option<u32> {
        let remaining: Vec<u32> = (1..=max).filter(|n| !self.used.contains(n)).collect();
        let number = *remaining.choose(&mut rand::thread_rng())?;
        self.used.insert(number);
        Some(number)
    }
}

/// Owner of all annotations and the preview slot
#[derive(Debug, Clone)]
pub struct AnnotationBinder {
    policy: AnnotationPolicy,
    annotations: Vec<Annotation>,
    preview: Option<PreviewAnnotation>,
    focused: Option<AnnotationId>,
    visible: bool,
    numbered_titles: NumberedTitles,
}

impl Default for AnnotationBinder {
    fn default() -> Self {
        Self::new(AnnotationPolicy::default())
    }
}

impl AnnotationBinder {
    pub fn new(policy: AnnotationPolicy) -> Self {
        Self {
            policy,
            annotations: Vec::new(),
            preview: None,
            focused: None,
            visible: true,
            numbered_titles: NumberedTitles::default(),
        }
    }

    pub fn policy(&self) -> &AnnotationPolicy {
        &self.policy
    }

    // ============== Preview ==============

    /// Create or re-aim the preview at a world-space hit on `host`
    pub fn show_preview(
        &mut self,
        host: &PlacedInstance,
        hit: Vec3,
        title: impl Into<String>,
        description: impl Into<String>,
    ) {
        let local = host.to_local(hit);
        let outward = local.normalize_or_zero();
        let display_position = local + outward * self.policy.surface_offset;

        self.preview = Some(PreviewAnnotation {
            host: host.id,
            title: title.into(),
            description: description.into(),
            world_position: hit,
            local_position: local,
            display_position,
        });
    }

    pub fn preview(&self) -> Option<&PreviewAnnotation> {
        self.preview.as_ref()
    }

    pub fn clear_preview(&mut self) {
        self.preview = None;
    }

    /// Promote the preview into a durable annotation on `host`.
    ///
    /// Returns None without mutation if there is no preview or it was aimed
    /// at another instance.
    pub fn commit(&mut self, host: &PlacedInstance) -> Option<AnnotationId> {
        let Some(preview) = self.preview.as_ref() else {
            tracing::warn!("Cannot add annotation: no preview");
            return None;
        };
        if preview.host != host.id {
            tracing::warn!("Cannot add annotation: preview belongs to another object");
            return None;
        }
        let preview = self.preview.take()?;

        let mut title = preview.title;
        if self.policy.numbered_titles {
            match self.numbered_titles.next(self.policy.max_numbered_titles) {
                Some(number) => title = number.to_string(),
                None => tracing::warn!(
                    "All numbers 1-{} have been used",
                    self.policy.max_numbered_titles
                ),
            }
        }

        let outward = (preview.world_position - host.position()).normalize_or_zero();
        let id = AnnotationId::new();
        self.annotations.push(Annotation {
            id,
            host: host.id,
            title,
            description: preview.description,
            yes_no_answer: None,
            world_position: preview.world_position,
            local_position: preview.local_position,
            is_expanded: false,
            anchor: AnnotationAnchor {
                position: preview.world_position,
                holder_offset: outward * self.policy.surface_offset,
            },
        });
        self.focused = Some(id);

        tracing::debug!("Added annotation {} on {}", id, host.file_name);
        Some(id)
    }

    // ============== Re-projection ==============

    /// Recompute world positions of every annotation bound to `instance`.
    ///
    /// Returns the number of annotations updated.
    pub fn reproject(&mut self, instance: &PlacedInstance) -> usize {
        let matrix = instance.transform.to_mat4();
        let mut count = 0;

        for annotation in self.annotations.iter_mut().filter(|a| a.host == instance.id) {
            let world = matrix.transform_point3(annotation.local_position);
            annotation.world_position = world;
            annotation.anchor.position = world;
            count += 1;
        }

        if let Some(preview) = self.preview.as_mut().filter(|p| p.host == instance.id) {
            preview.world_position = matrix.transform_point3(preview.local_position);
        }

        count
    }

    // ============== Removal ==============

    pub fn remove(&mut self, id: AnnotationId) -> Option<Annotation> {
        let Some(index) = self.annotations.iter().position(|a| a.id == id) else {
            tracing::warn!("Annotation not found for removal: {}", id);
            return None;
        };
        if self.focused == Some(id) {
            self.focused = None;
        }
        Some(self.annotations.remove(index))
    }

    pub fn remove_by_title(&mut self, title: &str) -> Option<Annotation> {
        let Some(id) = self.find_by_title(title).map(|a| a.id) else {
            tracing::warn!("Annotation not found for removal: {}", title);
            return None;
        };
        self.remove(id)
    }

    pub fn remove_focused(&mut self) -> Option<Annotation> {
        let id = self.focused?;
        self.remove(id)
    }

    /// Remove every annotation bound to `instance`, and its preview
    pub fn remove_for_instance(&mut self, instance: InstanceId) -> usize {
        let before = self.annotations.len();
        self.annotations.retain(|a| a.host != instance);

        if self
            .focused
            .is_some_and(|focused| !self.annotations.iter().any(|a| a.id == focused))
        {
            self.focused = None;
        }
        if self.preview.as_ref().is_some_and(|p| p.host == instance) {
            self.preview = None;
        }

        before - self.annotations.len()
    }

    pub fn clear(&mut self) {
        self.annotations.clear();
        self.preview = None;
        self.focused = None;
    }

    // ============== Focus and editing ==============

    pub fn focused(&self) -> Option<&Annotation> {
        let id = self.focused?;
        self.get(id)
    }

    pub fn focused_id(&self) -> Option<AnnotationId> {
        self.focused
    }

    pub fn focus_by_title(&mut self, title: &str) -> bool {
        let Some(id) = self.find_by_title(title).map(|a| a.id) else {
            tracing::warn!("Annotation not found for focus: {}", title);
            return false;
        };
        self.focused = Some(id);
        true
    }

    pub fn update_focused(
        &mut self,
        title: impl Into<String>,
        description: impl Into<String>,
        yes_no_answer: Option<bool>,
    ) -> bool {
        let Some(annotation) = self
            .focused
            .and_then(|id| self.annotations.iter_mut().find(|a| a.id == id))
        else {
            tracing::warn!("No focused annotation to update");
            return false;
        };
        annotation.title = title.into();
        annotation.description = description.into();
        annotation.yes_no_answer = yes_no_answer;
        true
    }

    pub fn toggle_expanded(&mut self, title: &str) -> bool {
        let Some(annotation) = self.annotations.iter_mut().find(|a| a.title == title) else {
            tracing::warn!("Annotation not found for change: {}", title);
            return false;
        };
        annotation.is_expanded = !annotation.is_expanded;
        true
    }

    // ============== Queries ==============

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id == id)
    }

    pub fn find_by_title(&self, title: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.title == title)
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn annotations_for(&self, instance: InstanceId) -> impl Iterator<Item = &Annotation> {
        self.annotations.iter().filter(move |a| a.host == instance)
    }

    pub fn titles(&self) -> Vec<&str> {
        self.annotations.iter().map(|a| a.title.as_str()).collect()
    }

    pub fn filter_titles(&self, query: &AnnotationQuery) -> Vec<&str> {
        self.annotations
            .iter()
            .map(|a| a.title.as_str())
            .filter(|title| query.matches(title))
            .collect()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }
}
