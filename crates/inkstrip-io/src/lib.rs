//! inkstrip-io: filesystem and network boundary.
//!
//! Loads indexed slice images from a directory, writes output slices
//! under the same naming scheme, dumps per-segment debug images, keeps
//! learned colors between runs, and talks to the colorization service.

mod error;

pub mod debug;
pub mod http;
pub mod naming;
pub mod palette;
pub mod slices;

pub use debug::DebugDump;
pub use error::IoError;
pub use http::HttpColorizer;
pub use naming::{OutputNaming, SliceName};
pub use palette::{load_memory, save_memory};
pub use slices::{SliceSet, load_slices, save_image, scan_slices, write_slices};
