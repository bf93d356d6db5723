//! Vocabulary tracking: marker extraction and the per-user JSON log

pub mod markers;
pub mod store;

pub use markers::{extract_markers, strip_markers, Marker};
pub use store::{
    CorrectionEntry, EntryKind, StoreError, UserRecord, UserStats, VocabularyDocument,
    VocabularyEntry, VocabularyStore,
};
