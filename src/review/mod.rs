//! The review state machine: plans moving between review areas and
//! changesets moving through branch merge or deletion.

pub mod changeset;
pub mod index;
pub mod plan;

pub use changeset::{Changeset, ChangesetReview, ChangesetStatus};
pub use index::{PlanArea, PlanEntry, PlanIndex};
pub use plan::PlanReview;
