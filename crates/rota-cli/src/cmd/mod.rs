pub mod config;
pub mod init;
pub mod remote;
pub mod serve;
