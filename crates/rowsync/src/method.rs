//! Operation names.

use std::fmt;
use std::str::FromStr;

use rowsync_core::Error;

/// The operation a sync call performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncMethod {
    /// Fetch by primary key (or the whole scope for a collection).
    Read,
    /// Insert.
    Create,
    /// Update by primary key.
    Update,
    /// Delete by primary key.
    Delete,
}

impl SyncMethod {
    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for SyncMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMethod {
    type Err = Error;

    /// Parse a method name. `patch` is accepted as a partial update.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "create" => Ok(Self::Create),
            "update" | "patch" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(Error::UnknownMethod(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("read".parse::<SyncMethod>().ok(), Some(SyncMethod::Read));
        assert_eq!("patch".parse::<SyncMethod>().ok(), Some(SyncMethod::Update));
        assert_eq!(SyncMethod::Delete.to_string(), "delete");
    }

    #[test]
    fn test_unknown() {
        let err = "upsert".parse::<SyncMethod>().unwrap_err();
        assert!(matches!(err, Error::UnknownMethod(ref m) if m == "upsert"));
    }
}
