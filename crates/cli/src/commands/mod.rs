pub mod check;
pub mod classify;
pub mod init;
pub mod serve;
pub mod simulate;
