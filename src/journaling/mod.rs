pub mod drafts;

pub use drafts::{DraftJournal, SavedDraft};
