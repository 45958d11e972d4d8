pub mod backup;
pub mod core;
pub mod editor;
pub mod schedules;
