pub mod report_file;
pub mod state_file;
