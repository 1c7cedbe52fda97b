//! Change-Set Provider: builds the diff text and rollback anchor for each
//! of the four review modes by shelling out to the system `git` binary, and
//! restores a project's working tree from a captured anchor.

mod anchor;
mod git;
mod provider;
mod rollback;

pub use git::current_branch;
pub use provider::build_change_set;
pub use rollback::rollback;
