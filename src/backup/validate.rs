//! Validation functions for configuration values.
//!
//! Custom validator hooks for directories, the database name and key files.

use crate::backup::arcvec::ArcVec;
use sanitize_filename::{is_sanitized, sanitize};
use std::path::Path;
use std::sync::Arc;
use validator::ValidationError;

pub fn validate_database_name<S: AsRef<str>>(name: S) -> Result<(), ValidationError> {
    let name = name.as_ref();
    if name.trim().is_empty() {
        return Err(ValidationError::new("InvalidDatabaseName")
            .with_message("database_name must not be empty".into()));
    }

    if !is_sanitized(name) {
        return Err(ValidationError::new("InvalidDatabaseName").with_message(
            format!(
                "Invalid database name, try sanitizing like {:?}",
                sanitize(name)
            )
            .into(),
        ));
    }

    Ok(())
}

pub fn validate_not_blank<S: AsRef<str>>(value: S) -> Result<(), ValidationError> {
    if value.as_ref().trim().is_empty() {
        return Err(ValidationError::new("Blank").with_message("value must not be blank".into()));
    }

    Ok(())
}

pub fn validate_dir_exist<P: AsRef<Path>>(dir: P) -> Result<(), ValidationError> {
    let dir = dir.as_ref();
    if dir.exists() {
        if !dir.is_dir() {
            return Err(ValidationError::new("InvalidDirectory")
                .with_message(format!("{:?} is not a directory", dir).into()));
        }
    } else {
        return Err(ValidationError::new("InvalidDirectory")
            .with_message(format!("{:?} not found", dir).into()));
    }

    Ok(())
}

/// Directory that is writable now, or can be created later under a writable
/// parent. Nothing is created here.
pub fn validate_writable_dir<P: AsRef<Path>>(dir: P) -> Result<(), ValidationError> {
    let dir = dir.as_ref();
    if dir.exists() {
        validate_dir_exist(dir)?;
        return validate_not_readonly(dir);
    }

    let parent = dir
        .ancestors()
        .skip(1)
        .map(|p| if p.as_os_str().is_empty() { Path::new(".") } else { p })
        .find(|p| p.exists());
    match parent {
        Some(parent) => {
            validate_dir_exist(parent)?;
            validate_not_readonly(parent)
        }
        None => Err(ValidationError::new("InvalidDirectory")
            .with_message(format!("no existing parent for {:?}", dir).into())),
    }
}

fn validate_not_readonly(dir: &Path) -> Result<(), ValidationError> {
    let md = std::fs::metadata(dir).map_err(|e| {
        ValidationError::new("InvalidDirectory")
            .with_message(format!("cannot access metadata for {:?}: {}", dir, e).into())
    })?;
    if md.permissions().readonly() {
        Err(ValidationError::new("InvalidDirectory")
            .with_message(format!("cannot write to dir {:?}", dir).into()))
    } else {
        Ok(())
    }
}

pub fn validate_files_exist(files: &ArcVec<Arc<Path>>) -> Result<(), ValidationError> {
    match files.iter().find(|f| !f.is_file()) {
        Some(missing) => Err(ValidationError::new("MissingFile")
            .with_message(format!("{:?} is not a readable file", missing).into())),
        None => Ok(()),
    }
}
