//! Platform access: account database, privilege checks, process environments.

pub mod accounts;
pub mod procenv;
