pub mod api;
pub mod app;
pub mod error;
pub mod forms;
pub mod scheduler;
pub mod state;
pub mod storage;
pub mod ui;
pub mod utils;
