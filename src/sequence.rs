mod annotation;
mod bounds;
mod color_model;
mod container;
mod edit;
mod error;
mod event;
mod extract;
mod history;
mod meta;
mod persistence;
mod plane;
mod prefetch;
mod provider;
mod rois;
mod updater;
mod volumetric;

#[cfg(test)]
mod tests;

pub use annotation::{Overlay, OverlayListener, Roi, RoiListener};
pub use color_model::{ColorModel, ColorSpace};
pub use container::{ChannelBoundsState, DEFAULT_NAME, OriginInfo, Sequence, UpdateScope};
pub use error::{Result, SequenceError};
pub use event::{
    SequenceEvent, SequenceEventSource, SequenceEventType, SequenceListener, SequenceModelListener,
};
pub use history::{DataSnapshot, SequenceEdit, UndoHistory};
pub use meta::{
    META_CHANNEL_NAME, META_FILENAME, META_NAME, META_ORIGIN, META_PIXEL_SIZE_X,
    META_PIXEL_SIZE_Y, META_PIXEL_SIZE_Z, META_POSITION_T, META_POSITION_T_OFFSET,
    META_POSITION_X, META_POSITION_Y, META_POSITION_Z, META_SERIES, META_TIME_INTERVAL,
    META_VIRTUAL,
};
pub use persistence::{JsonFilePersistence, MetadataPersistence};
pub use plane::{Plane, PlaneChange, PlaneListener};
pub use prefetch::Prefetcher;
pub use provider::ImageProvider;
pub use volumetric::VolumetricImage;
