pub mod arcvec;
pub mod archiver;
pub mod artifact;
pub mod backup_config;
pub mod compress;
pub mod database;
pub mod encrypt;
pub mod finish;
pub mod host_guard;
pub mod pipeline;
pub mod redacted;
pub mod restore;
pub mod result_error;
pub mod retention;
pub mod validate;
