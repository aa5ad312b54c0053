//! KLV field accumulation and attribute derivation.
//!
//! Decoded KLV elements are routed to handlers, which accumulate them per
//! field and derive catalog attributes: raw numeric series, distinct text
//! values, or WKT footprint polygons built from four corner coordinates.
//! Accumulated epochs are written to a child [`Metacard`] and merged into
//! a parent record through [`MetacardUpdater`] strategies.
//!
//! # Usage
//! ```rust
//! use klv_handlers::{GeoBoxHandler, KlvHandler};
//! use klv_protocol::KlvValue;
//!
//! let mut handler = GeoBoxHandler::new(
//!     "footprint",
//!     [("lat1", "lon1"), ("lat2", "lon2"), ("lat3", "lon3"), ("lat4", "lon4")],
//! )
//! .unwrap();
//!
//! for (lat, lon) in [("lat1", "lon1"), ("lat2", "lon2"), ("lat3", "lon3"), ("lat4", "lon4")] {
//!     handler.accept_value(lat, KlvValue::IntegerEncodedFloat(10.0));
//!     handler.accept_value(lon, KlvValue::IntegerEncodedFloat(20.0));
//! }
//!
//! let attribute = handler.as_attribute().unwrap();
//! assert_eq!(attribute.values.len(), 1);
//! ```

pub mod attribute;
pub mod error;
pub mod handler;
pub mod metacard;
pub mod session;
pub mod subsample;

pub use attribute::{Attribute, AttributeValue};
pub use error::{HandlerError, Result};
pub use handler::{
    Corner, FieldSeries, FloatingPointHandler, GeoBoxHandler, HandlerConfig, KlvHandler,
    TextHandler, CORNER_FIELDS,
};
pub use metacard::{
    AttributeMergeUpdater, ListUpdater, Metacard, MetacardMerger, MetacardUpdater,
    MetacardUpdaterVisitor, TemporalEndUpdater, TemporalStartUpdater, TEMPORAL_END,
    TEMPORAL_START,
};
pub use session::{HandlerSession, SessionStats};
pub use subsample::subsample_indices;
