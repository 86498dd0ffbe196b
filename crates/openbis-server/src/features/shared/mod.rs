//! Building blocks shared by the feature slices

pub mod criteria;
pub mod error_helpers;
pub mod fetch;
pub mod identifiers;
pub mod ids;
pub mod pagination;
pub mod properties;
pub mod tags;
pub mod trash;
pub mod updates;
pub mod validation;

#[cfg(test)]
pub mod test_helpers;

pub use criteria::{PropertyMatch, StringMatch};
pub use fetch::Fetched;
pub use ids::{EntityRef, MaterialPermId, TagId, VocabularyTermId};
pub use pagination::{Paging, SearchResult};
pub use updates::ListUpdate;
