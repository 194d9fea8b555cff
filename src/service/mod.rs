pub mod moodle;
pub mod notify;
pub mod portal;
pub mod run;
pub mod scan;
pub mod sso;
pub mod telegram;
