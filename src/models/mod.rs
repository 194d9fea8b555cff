pub mod config;
pub mod config_validator;
pub mod course;
pub mod course_file;
pub mod dry_run_mode;
pub mod error;
pub mod scan_state;
pub mod secrets;
