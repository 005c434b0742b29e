pub mod callback;
pub mod label;
pub mod task;
