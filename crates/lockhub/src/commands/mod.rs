//! Command handlers, one module per top-level command.

pub mod config_cmd;
pub mod locks;
pub mod passage;
pub mod passcodes;
pub mod records;
pub mod serve;
pub mod util;
