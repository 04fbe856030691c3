//! Authoritative-node check for clustered deployments.
//!
//! The same scheduled job runs on every node; only the node currently serving
//! the database takes the backup. This is a best-effort check, not a lock.

use crate::backup::database::DatabaseEngine;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::validate::validate_not_blank;
use getset::Getters;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

fn default_case_sensitive() -> bool {
    true
}

#[skip_serializing_none]
#[derive(Clone, Serialize, Deserialize, Debug, Validate, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct HostGuardConfig {
    /// SQL for the sqlite engine, a shell command line for the command engine
    #[validate(custom(function = validate_not_blank))]
    active_host_query: Arc<str>,
    /// Overrides the OS host name of this node
    #[validate(custom(function = validate_not_blank))]
    local_hostname: Option<Arc<str>>,
    #[serde(default = "default_case_sensitive")]
    case_sensitive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostGuardOutcome {
    /// This node serves the database
    Proceed,
    /// Another node serves the database
    NotAuthoritative { local: String, active: String },
    /// The query returned no host name
    NoActiveHost,
}

impl HostGuardConfig {
    pub fn new<Q: Into<Arc<str>>>(
        active_host_query: Q,
        local_hostname: Option<Arc<str>>,
        case_sensitive: bool,
    ) -> Self {
        Self {
            active_host_query: active_host_query.into(),
            local_hostname,
            case_sensitive,
        }
    }

    /// Configured host name, or the OS host name of this machine.
    pub fn resolve_local_hostname(&self) -> Result<String> {
        match &self.local_hostname {
            Some(name) => Ok(name.to_string()),
            None => hostname::get()?
                .into_string()
                .map_err(|raw| Error::InvalidHostname(raw.to_string_lossy().into_owned())),
        }
    }

    pub fn check<E: DatabaseEngine + ?Sized>(
        &self,
        engine: &E,
        local_hostname: &str,
    ) -> Result<HostGuardOutcome> {
        let Some(active) = engine.query_active_host(&self.active_host_query)? else {
            info!("Active database host query returned no result, bailing");
            return Ok(HostGuardOutcome::NoActiveHost);
        };

        info!("Active database instance is {}", active);
        info!("My hostname is {}", local_hostname);

        let same = if self.case_sensitive {
            active == local_hostname
        } else {
            active.to_lowercase() == local_hostname.to_lowercase()
        };

        if same {
            Ok(HostGuardOutcome::Proceed)
        } else {
            info!("Invalid hostname, bailing");
            Ok(HostGuardOutcome::NotAuthoritative {
                local: local_hostname.to_string(),
                active,
            })
        }
    }
}
