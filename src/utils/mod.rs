pub mod html;
pub mod progress;
pub mod time;
