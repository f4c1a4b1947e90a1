//! # Filter Registry
//!
//! Background filters are pure frame-to-frame functions selected by name from a
//! closed set. A filter never changes frame dimensions and keeps no state
//! between frames.
//!
//! ## Built-in Filters
//!
//! - **grayscale**: BT.601 luma replicated to all three channels
//! - **sepia**: warm brown tone remap
//! - **identity**: returns the frame unchanged (also accepted as `no transform`)
//!
//! ## Usage
//!
//! ```rust
//! use backdrop_compositor::filters::FilterKind;
//! use backdrop_compositor::video::Frame;
//!
//! let filter = FilterKind::from_name("sepia").unwrap();
//! let frame = Frame::new_filled(4, 4, [200, 100, 50]);
//! let toned = filter.apply(&frame);
//! assert_eq!(toned.width(), 4);
//! ```

mod grayscale;
mod registry;
mod sepia;

pub use grayscale::grayscale;
pub use registry::FilterKind;
pub use sepia::sepia;
