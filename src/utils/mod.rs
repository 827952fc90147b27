pub mod logging;
pub mod password;
