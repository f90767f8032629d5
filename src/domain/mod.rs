pub mod observation;
pub mod submission;
pub mod stats;
