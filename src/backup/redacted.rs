//! Secret strings with redacted display and serialization.
//!
//! `RedactedString` holds the database connection string. It may carry
//! credentials, so it never reaches logs, debug output or re-serialized config.

use bon::Builder;
use derive_more::From;
use getset::Getters;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::result;
use validator::Validate;
use zeroize::Zeroize;

pub static REDACTED_SECRET: &str = "###REDACTED###";

/// Zeroed on drop.
#[derive(Validate, Clone, Zeroize, From, Builder, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct RedactedString {
    #[validate(length(min = 1))]
    #[builder(into)]
    inner: String,
}

impl Debug for RedactedString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED_SECRET)
    }
}

impl Display for RedactedString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED_SECRET)
    }
}

impl Serialize for RedactedString {
    fn serialize<S: Serializer>(&self, serializer: S) -> result::Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED_SECRET)
    }
}

impl<'de> Deserialize<'de> for RedactedString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(RedactedString::from)
    }
}

impl Drop for RedactedString {
    fn drop(&mut self) {
        self.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONNECTION: &str = "Server=db01;User Id=backup;Password=hunter2";

    #[test]
    fn test_never_printed() {
        let secret = RedactedString::builder().inner(CONNECTION).build();
        assert_eq!(format!("{:?}", secret), REDACTED_SECRET);
        assert_eq!(secret.to_string(), REDACTED_SECRET);
        assert!(!format!("{:?}", Some(&secret)).contains("hunter2"));
    }

    #[test]
    fn test_read_from_config_but_never_written_back() {
        let secret: RedactedString = serde_yml::from_str(&format!("'{CONNECTION}'")).unwrap();
        assert_eq!(secret.inner(), CONNECTION);

        let written = serde_json::to_string(&secret).unwrap();
        assert_eq!(written, format!("\"{}\"", REDACTED_SECRET));
    }

    #[test]
    fn test_empty_secret_is_invalid() {
        assert!(RedactedString::from(String::new()).validate().is_err());
        assert!(RedactedString::from(CONNECTION.to_string()).validate().is_ok());
    }
}
