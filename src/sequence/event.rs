use super::updater::Collapsible;
use super::{Overlay, Plane, Roi, Sequence};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceEventType {
    Added,
    Removed,
    Changed,
}

/// What changed in a sequence. `None` payloads mean "several or unknown".
#[derive(Debug, Clone, PartialEq)]
pub enum SequenceEventSource {
    Data(Option<Plane>),
    Type,
    Meta {
        field: Option<String>,
        param: Option<usize>,
    },
    Colormap(Option<usize>),
    ComponentBounds(Option<usize>),
    Overlay(Overlay),
    /// Overlay change as seen by listeners registered in legacy mode.
    Painter(Overlay),
    Roi(Roi),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceEvent {
    pub sequence_id: u64,
    pub source: SequenceEventSource,
    pub kind: SequenceEventType,
}

impl SequenceEvent {
    pub fn new(sequence_id: u64, source: SequenceEventSource, kind: SequenceEventType) -> Self {
        Self {
            sequence_id,
            source,
            kind,
        }
    }

    pub fn changed(sequence_id: u64, source: SequenceEventSource) -> Self {
        Self::new(sequence_id, source, SequenceEventType::Changed)
    }

    /// Copy of an overlay event addressed to legacy painter listeners.
    pub(crate) fn as_painter(&self) -> Option<SequenceEvent> {
        match &self.source {
            SequenceEventSource::Overlay(overlay) => Some(SequenceEvent::new(
                self.sequence_id,
                SequenceEventSource::Painter(overlay.clone()),
                self.kind,
            )),
            _ => None,
        }
    }
}

fn merge_option<T: PartialEq>(current: &mut Option<T>, other: &Option<T>) {
    if current != other {
        *current = None;
    }
}

impl Collapsible for SequenceEvent {
    fn collapse(&mut self, other: &Self) -> bool {
        use SequenceEventSource as Source;

        if self.sequence_id != other.sequence_id {
            return false;
        }
        let same_kind = self.kind == other.kind;
        match (&mut self.source, &other.source) {
            (Source::Data(plane), Source::Data(other_plane)) => {
                merge_option(plane, other_plane);
                if !same_kind {
                    self.kind = SequenceEventType::Changed;
                }
                true
            }
            (Source::Type, Source::Type) => true,
            (
                Source::Meta { field, param },
                Source::Meta {
                    field: other_field,
                    param: other_param,
                },
            ) if field == other_field => {
                merge_option(param, other_param);
                true
            }
            (Source::Colormap(c), Source::Colormap(other_c))
            | (Source::ComponentBounds(c), Source::ComponentBounds(other_c))
                if same_kind =>
            {
                merge_option(c, other_c);
                true
            }
            (Source::Roi(roi), Source::Roi(other_roi)) if roi == other_roi => {
                if !same_kind {
                    self.kind = SequenceEventType::Changed;
                }
                true
            }
            (Source::Overlay(overlay), Source::Overlay(other_overlay))
            | (Source::Painter(overlay), Source::Painter(other_overlay))
                if overlay == other_overlay =>
            {
                if !same_kind {
                    self.kind = SequenceEventType::Changed;
                }
                true
            }
            _ => false,
        }
    }
}

pub trait SequenceListener: Send + Sync {
    fn sequence_changed(&self, event: &SequenceEvent);

    fn sequence_closed(&self, _sequence: &Sequence) {}
}

/// Coarse notifications for views that only redraw.
pub trait SequenceModelListener: Send + Sync {
    fn image_changed(&self);

    fn dimension_changed(&self);
}
