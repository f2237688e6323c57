//! PastelPix: a pixel-art editor core.
//!
//! The raster buffer, snapshot history, shape rasterizer, flood fill and
//! viewport transform live here and are driven through
//! [`project::Editor`]. The binary adds the egui front end and a headless
//! script runner.

pub mod logger;

pub mod canvas;
pub mod components;
pub mod error;
pub mod io;
pub mod ops;
pub mod project;
pub mod settings;

pub use error::{EditorError, Result};
pub use project::{Editor, EditorCommand};
