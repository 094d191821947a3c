//! Command implementations.

pub mod init;
pub mod run;
pub mod status;

pub use self::init::execute_init;
pub use self::run::execute_run;
pub use self::status::execute_status;
