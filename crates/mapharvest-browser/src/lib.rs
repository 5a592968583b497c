//! Browser boundary for the extraction engine.
//!
//! Defines the page/session traits the engine drives and a chromium
//! implementation routed through an egress proxy, plus the default
//! selector-based detail extractor.

pub mod actions;
pub mod engine;
pub mod error;
pub mod extractor;

pub use actions::{with_language, PageHandle, PageRenderer, SessionLauncher};
pub use engine::{BrowserEngine, ChromeLauncher, ChromePage};
pub use error::{BrowserError, Result};
pub use extractor::{DetailExtractor, SelectorExtractor, Selectors};
