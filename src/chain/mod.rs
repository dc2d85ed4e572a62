//! Chain operators (spec.md §4.2-§4.4): pure record-manipulation functions
//! that keep the relationship chains, dense-node relationship groups, and
//! property chains byte-consistent. Nothing here touches locks, the
//! command log, or the cache — those are the mutation API's job.

pub mod group;
pub mod property;
pub mod relationship;
