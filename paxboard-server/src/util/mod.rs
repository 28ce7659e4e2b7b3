pub mod app_state;
pub mod logging;
pub mod shutdown;
pub mod subprocess;
pub mod units;
