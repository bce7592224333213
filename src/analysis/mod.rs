pub mod decider;
pub mod deletion_plan;

pub use decider::{decide, decide_index, split_group, Decision};
pub use deletion_plan::{execute_deletion_plan, reclaimable_bytes, DeletionReport};
