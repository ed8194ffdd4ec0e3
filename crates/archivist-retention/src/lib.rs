//! Tiered retention for dated artifacts.
//!
//! Given a set of dated identifiers and a reference instant, decides which
//! identifiers to keep so that the spacing between kept artifacts widens with
//! age: daily for the last week, weekly for the last month, and so on, as
//! configured by an [`AgeTierTable`]. The newest and oldest artifacts are
//! always kept, and re-running the selection over its own output changes
//! nothing, so a pruning job interrupted half-way can simply be re-run.
//!
//! Selection is a pure function of its inputs. Listing artifacts and deleting
//! the ones not retained is up to the caller.

mod artifact;
mod error;
mod selector;
mod tier;

pub use artifact::{DatedArtifact, IdentifierFormat, TimestampParser};
pub use error::RetentionError;
pub use selector::{deletion_candidates, RetentionSelector};
pub use tier::{AgeTier, AgeTierTable, DEFAULT_GAP_DAYS, DEFAULT_TIERS};
