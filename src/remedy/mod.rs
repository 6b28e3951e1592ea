//! Remedy Resolver
//!
//! Static advice per crop and predicted label. Records come in two shapes
//! (free text, or a structured record whose fields are all optional) and are
//! consumed through capability checks. A label without advice resolves to
//! [`RemedyLookup::Unavailable`], never to an error.

pub mod record;
pub mod render;
pub mod table;

pub use record::{ExternalLink, RemedyRecord, Severity, StructuredAdvice};
pub use render::{render_lookup, render_markdown, NO_REMEDY_NOTICE};
pub use table::{RemedyLookup, RemedyTable};
