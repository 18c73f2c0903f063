pub mod candidate;
pub mod matches;
pub mod opportunity;
