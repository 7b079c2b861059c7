//! Image-annotation viewer for precomputed computer-vision records.
//!
//! A [`record::DetectionRecord`] carries one photograph plus its detections. The
//! `select` module turns one detection category into drawable primitives, `overlay`
//! stacks them over the dimmed base image, and `view` drives the load/ready lifecycle
//! as the user navigates between records.

pub mod category;
pub mod config;
pub mod logging;
pub mod nav;
pub mod overlay;
pub mod page;
pub mod panel;
pub mod raster;
pub mod record;
pub mod select;
pub mod store;
pub mod strip;
pub mod svg;
pub mod view;

pub use category::Category;
pub use overlay::{render, Composite};
pub use record::DetectionRecord;
pub use select::{select, Primitive};
pub use store::{RecordStore, ResolveError};
pub use view::{ViewControls, ViewState, Viewer};
