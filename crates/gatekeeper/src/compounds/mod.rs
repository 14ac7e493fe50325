//! Compound index store and bulk record store.
//!
//! - `CandidateList`: ids pre-flagged as good challenge material
//! - `CompoundIndex`: 40-byte slots mapping an id to a byte range
//! - `BulkRecords`: the record text, plain or BGZF compressed

mod bgzf;
mod bulk;
mod candidates;
mod index;
mod library;

pub use bgzf::{BGZF_MAGIC, BgzfReader, is_bgzf};
pub use bulk::BulkRecords;
pub use candidates::CandidateList;
pub use index::{CompoundIndex, IndexRecord};
pub use library::CompoundLibrary;

#[cfg(test)]
pub(crate) use library::tests::{MOLECULES, fixture as library_fixture};
