use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Lifecycle status of a context.
///
/// ```text
///   DESTROYED --initialize--> INITIALIZED --load--> LOADED --enable--> ENABLED
///       ^                                                                 |
///       +--------destroy-------- DISABLED <-----------disable------------+
/// ```
///
/// Any failure inside a phase moves the context to `Error`, which only a
/// fresh context can leave.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Error,
    Destroyed,
    Initialized,
    Loaded,
    Enabled,
    Disabled,
}

impl Status {
    pub fn code(self) -> i8 {
        match self {
            Status::Error => -1,
            Status::Destroyed => 0,
            Status::Initialized => 1,
            Status::Loaded => 2,
            Status::Enabled => 3,
            Status::Disabled => 4,
        }
    }

    pub fn from_code(code: i8) -> Option<Status> {
        match code {
            -1 => Some(Status::Error),
            0 => Some(Status::Destroyed),
            1 => Some(Status::Initialized),
            2 => Some(Status::Loaded),
            3 => Some(Status::Enabled),
            4 => Some(Status::Disabled),
            _ => None,
        }
    }

    /// Status reached after the phase that starts from `self` succeeds.
    pub fn next(self) -> Status {
        match self {
            Status::Error => Status::Error,
            Status::Destroyed => Status::Initialized,
            Status::Initialized => Status::Loaded,
            Status::Loaded => Status::Enabled,
            Status::Enabled => Status::Disabled,
            Status::Disabled => Status::Destroyed,
        }
    }

    /// Whether registry reads and registrations are served.
    pub fn is_readable(self) -> bool {
        self.code() >= Status::Initialized.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn codes_round_trip() {
        for status in [
            Status::Error,
            Status::Destroyed,
            Status::Initialized,
            Status::Loaded,
            Status::Enabled,
            Status::Disabled,
        ] {
            assert_eq!(Status::from_code(status.code()), Some(status));
        }
        assert_eq!(Status::from_code(9), None);
    }

    #[test]
    fn next_wraps_disabled_to_destroyed() {
        assert_eq!(Status::Disabled.next(), Status::Destroyed);
        assert_eq!(Status::Destroyed.next(), Status::Initialized);
        assert_eq!(Status::Error.next(), Status::Error);
    }

    #[test]
    fn readability() {
        assert!(!Status::Error.is_readable());
        assert!(!Status::Destroyed.is_readable());
        assert!(Status::Initialized.is_readable());
        assert!(Status::Disabled.is_readable());
    }

    #[test]
    fn display_and_parse() {
        assert_eq!(Status::Enabled.to_string(), "ENABLED");
        assert_eq!(Status::from_str("loaded").unwrap(), Status::Loaded);
    }
}
