pub mod cmd;
pub mod core;
pub mod tax;
