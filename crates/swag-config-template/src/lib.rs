//! Sandboxed rendering of nginx configuration snippets from named
//! templates, plus the post-render structural checks every rendered (or
//! hand-edited) body must pass before it is written to disk.
//!
//! Templates are loaded once, up front, from a read-only directory. The
//! [`minijinja::Environment`] used here has no filesystem-backed loader
//! callback and runs with [`minijinja::UndefinedBehavior::Strict`], so a
//! render can only ever see the variables it was explicitly given and a
//! typo in a template never silently renders as an empty string.

pub mod error;
pub mod manager;
pub mod structural;

pub use error::TemplateError;
pub use manager::{RenderVars, TemplateHooks, TemplateManager};
pub use structural::{check, find_outermost_server_block, has_balanced_server_block, StructuralInput};
