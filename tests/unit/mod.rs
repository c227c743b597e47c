pub mod config_tests;
pub mod status_tests;
