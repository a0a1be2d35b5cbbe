pub mod cache;
pub mod classes;
pub mod core;
pub mod holidays;
pub mod semesters;
pub mod setup;
pub mod stats;
pub mod subjects;
