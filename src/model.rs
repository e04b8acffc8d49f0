mod data_type;
mod dimension;
mod dynamic_array;
mod error;
mod metadata;
mod numeric;


pub use data_type::{DataType, Element};
pub use dimension::{Dimension5D, DimensionId, Rect};
pub use dynamic_array::{AnyDynamicArray, DEFAULT_GRANULARITY, DynamicArray};
pub use error::{CoreError, Result};
pub use metadata::{Dim, PlaneTimeOffset, SequenceMetadata};
pub use numeric::{NumericArray, PlaneData};

pub(crate) use numeric::dispatch_plane_data;
