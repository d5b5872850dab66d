mod merge;
mod working;

pub use merge::merge_sub_lists;
pub use working::WorkingSet;
