//! Pointer-driven reordering with a rollback-able preview.
//!
//! A drag starts from either a placed element or a palette entry. While the
//! pointer moves, the session keeps a preview sequence reordered to the
//! current insertion point; the committed sequence is only replaced on drop.
//! Cancelling returns the sequence the drag started from.

use crate::layout::HitBox;
use crate::sequence::{IconId, IconRef, InsertionPoint, Sequence};

/// Errors raised by drag state transitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DragError {
    #[error("a drag is already in progress")]
    AlreadyDragging,
    #[error("no drag is in progress")]
    NotDragging,
    #[error("element {0} is not on the canvas")]
    UnknownElement(IconId),
}

/// What is being dragged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragSource {
    /// An element already on the canvas.
    Internal(IconId),
    /// A new element dragged in from the palette.
    Palette(IconRef),
}

impl DragSource {
    /// Id of the dragged element, which hit testing must ignore.
    pub fn id(&self) -> IconId {
        match self {
            Self::Internal(id) => *id,
            Self::Palette(icon) => icon.id(),
        }
    }
}

/// Picks the insert-before target for a pointer position.
///
/// Among `boxes` (which must not include the dragged element), the target is
/// the one whose midpoint lies right of the pointer and closest to it. With
/// no such box the element goes to the end.
pub fn insertion_point(pointer_x: f32, boxes: &[HitBox]) -> InsertionPoint {
    boxes
        .iter()
        .map(|b| (b.offset(pointer_x), b.id))
        .filter(|(offset, _)| *offset < 0.0)
        .max_by(|(a, _), (b, _)| a.total_cmp(b))
        .map_or(InsertionPoint::End, |(_, id)| InsertionPoint::Before(id))
}

// ============================================================================
// DragSession
// ============================================================================

/// An in-flight drag.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    source: DragSource,
    origin: Sequence,
    preview: Sequence,
    insertion: InsertionPoint,
}

impl DragSession {
    /// Starts a drag over `origin`.
    pub fn begin(origin: Sequence, source: DragSource) -> Result<Self, DragError> {
        let insertion = match &source {
            DragSource::Internal(id) => {
                let index = origin.index_of(*id).ok_or(DragError::UnknownElement(*id))?;
                origin
                    .items()
                    .get(index + 1)
                    .map_or(InsertionPoint::End, |next| InsertionPoint::Before(next.id()))
            }
            DragSource::Palette(_) => InsertionPoint::End,
        };
        let preview = match &source {
            DragSource::Internal(_) => origin.clone(),
            DragSource::Palette(icon) => origin.insert(icon.clone(), insertion),
        };
        Ok(Self {
            source,
            origin,
            preview,
            insertion,
        })
    }

    pub fn source(&self) -> &DragSource {
        &self.source
    }

    /// The sequence as it was when the drag started.
    pub fn origin(&self) -> &Sequence {
        &self.origin
    }

    /// The live-reordered sequence to display while dragging.
    pub fn preview(&self) -> &Sequence {
        &self.preview
    }

    pub fn insertion(&self) -> InsertionPoint {
        self.insertion
    }

    /// Handles a pointer move. `boxes` are the hit boxes of the current
    /// preview without the dragged element.
    ///
    /// Returns true if the preview changed.
    pub fn update(&mut self, pointer_x: f32, boxes: &[HitBox]) -> bool {
        let point = insertion_point(pointer_x, boxes);
        if point == self.insertion {
            return false;
        }
        self.insertion = point;

        let preview = self.preview.reorder_to(self.source.id(), point);
        let changed = preview != self.preview;
        if changed {
            tracing::trace!(?point, "drag preview reordered");
            self.preview = preview;
        }
        changed
    }

    /// Ends the drag, returning the sequence to commit.
    pub fn commit(self) -> Sequence {
        tracing::debug!(insertion = ?self.insertion, "drag dropped");
        self.preview
    }

    /// Abandons the drag, returning the original sequence.
    pub fn cancel(self) -> Sequence {
        self.origin
    }
}

/// Drag state machine: `Idle -> Dragging -> Idle`.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging(DragSession),
}

impl DragState {
    pub fn is_dragging(&self) -> bool {
        matches!(self, Self::Dragging(_))
    }

    pub fn session(&self) -> Option<&DragSession> {
        match self {
            Self::Idle => None,
            Self::Dragging(session) => Some(session),
        }
    }

    /// Transitions to `Dragging`.
    pub fn begin(&mut self, origin: Sequence, source: DragSource) -> Result<(), DragError> {
        if self.is_dragging() {
            return Err(DragError::AlreadyDragging);
        }
        *self = Self::Dragging(DragSession::begin(origin, source)?);
        Ok(())
    }

    /// Forwards a pointer move to the active session.
    pub fn update(&mut self, pointer_x: f32, boxes: &[HitBox]) -> Result<bool, DragError> {
        match self {
            Self::Idle => Err(DragError::NotDragging),
            Self::Dragging(session) => Ok(session.update(pointer_x, boxes)),
        }
    }

    /// Ends the drag and returns to `Idle`.
    pub fn finish(&mut self) -> Result<DragSession, DragError> {
        match std::mem::take(self) {
            Self::Idle => Err(DragError::NotDragging),
            Self::Dragging(session) => Ok(session),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Geometry;
    use crate::spacing::SpacingEngine;

    fn icon(file: &str) -> IconRef {
        IconRef::new(file).unwrap()
    }

    fn sample() -> Sequence {
        Sequence::from_items([icon("way@01.svg"), icon("way@02.svg"), icon("way@03.svg")])
    }

    /// Square elements at x = 25, 200, 375 (midpoints 100, 275, 450).
    fn boxes(seq: &Sequence, exclude: Option<IconId>) -> Vec<HitBox> {
        let ratios = vec![1.0; seq.len()];
        Geometry::compute(seq.items(), &ratios, &SpacingEngine::default(), 1.0).hit_boxes(exclude)
    }

    #[test]
    fn insertion_point_picks_nearest_midpoint_right_of_pointer() {
        let seq = sample();
        let ids = seq.ids();
        let all = boxes(&seq, None);

        assert_eq!(insertion_point(0.0, &all), InsertionPoint::Before(ids[0]));
        assert_eq!(insertion_point(150.0, &all), InsertionPoint::Before(ids[1]));
        assert_eq!(insertion_point(274.0, &all), InsertionPoint::Before(ids[1]));
        assert_eq!(insertion_point(276.0, &all), InsertionPoint::Before(ids[2]));
        assert_eq!(insertion_point(1000.0, &all), InsertionPoint::End);
        assert_eq!(insertion_point(10.0, &[]), InsertionPoint::End);
    }

    #[test]
    fn internal_drag_previews_and_commits() {
        let seq = sample();
        let ids = seq.ids();
        let mut session = DragSession::begin(seq.clone(), DragSource::Internal(ids[0])).unwrap();

        let changed = session.update(1000.0, &boxes(session.preview(), Some(ids[0])));
        assert!(changed);
        assert_eq!(session.preview().ids(), [ids[1], ids[2], ids[0]]);
        assert_eq!(session.origin(), &seq);

        let committed = session.commit();
        assert_eq!(committed.ids(), [ids[1], ids[2], ids[0]]);
    }

    #[test]
    fn repeated_moves_to_same_point_do_not_change_preview() {
        let seq = sample();
        let ids = seq.ids();
        let mut session = DragSession::begin(seq, DragSource::Internal(ids[2])).unwrap();

        assert!(session.update(0.0, &boxes(session.preview(), Some(ids[2]))));
        assert!(!session.update(1.0, &boxes(session.preview(), Some(ids[2]))));
        assert_eq!(session.preview().ids(), [ids[2], ids[0], ids[1]]);
    }

    #[test]
    fn cancel_restores_original_order() {
        let seq = sample();
        let ids = seq.ids();
        let mut session = DragSession::begin(seq.clone(), DragSource::Internal(ids[1])).unwrap();
        session.update(0.0, &boxes(session.preview(), Some(ids[1])));
        assert_ne!(session.preview(), &seq);
        assert_eq!(session.cancel(), seq);
    }

    #[test]
    fn palette_drop_past_end_appends() {
        let seq = sample();
        let ids = seq.ids();
        let new = icon("exit@01.svg");
        let new_id = new.id();
        let mut session = DragSession::begin(seq, DragSource::Palette(new)).unwrap();

        session.update(2000.0, &boxes(session.preview(), Some(new_id)));
        assert_eq!(session.commit().ids(), [ids[0], ids[1], ids[2], new_id]);
    }

    #[test]
    fn palette_drop_between_elements_inserts_there() {
        let seq = sample();
        let ids = seq.ids();
        let new = icon("exit@01.svg");
        let new_id = new.id();
        let mut session = DragSession::begin(seq, DragSource::Palette(new)).unwrap();

        session.update(150.0, &boxes(session.preview(), Some(new_id)));
        assert_eq!(session.commit().ids(), [ids[0], new_id, ids[1], ids[2]]);
    }

    #[test]
    fn state_machine_transitions() {
        let seq = sample();
        let ids = seq.ids();
        let mut state = DragState::default();

        assert_eq!(state.update(0.0, &[]), Err(DragError::NotDragging));
        assert!(matches!(state.finish(), Err(DragError::NotDragging)));
        let ghost = IconId::new();
        assert_eq!(
            state.begin(seq.clone(), DragSource::Internal(ghost)),
            Err(DragError::UnknownElement(ghost))
        );
        assert!(!state.is_dragging());

        state.begin(seq.clone(), DragSource::Internal(ids[0])).unwrap();
        assert!(state.is_dragging());
        assert_eq!(
            state.begin(seq, DragSource::Internal(ids[1])),
            Err(DragError::AlreadyDragging)
        );

        let session = state.finish().unwrap();
        assert_eq!(session.source(), &DragSource::Internal(ids[0]));
        assert_eq!(state, DragState::Idle);
    }
}
