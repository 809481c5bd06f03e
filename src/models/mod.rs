//! Canonical data types for the distill pipeline.
//!
//! Parsers produce [`ContentItem`] and [`Session`] values, the analyzer
//! decorates sessions, and the synthesizers produce [`JournalEntry`] and
//! [`BlogPost`] values. All persisted state lives in the memory and
//! editorial types.

mod blog;
mod content;
mod editorial;
mod journal;
mod memory;
mod session;

pub use blog::{slugify, BlogPost, BlogPostType};
pub use content::{ContentItem, ContentKind, ContentSource, ItemId};
pub use editorial::{EditorialNote, Seed};
pub use journal::{JournalEntry, JournalStyle};
pub use memory::{DailyEntry, EntityRecord, MemoryThread, PublishedRecord, ThreadStatus, UnifiedMemory};
pub use session::{AgentSignal, DurationSummary, Session, SessionOutcome};
