pub mod attendance;
pub mod core;
pub mod dashboard;
pub mod faculty;
pub mod session;
pub mod setup;
pub mod students;
pub mod timetable;
