//! String-backed enums stored in TEXT columns

use serde::{Deserialize, Serialize};

use super::ValidationError;

macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Database/wire representation.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            /// Parse from the wire representation (case-insensitive).
            pub fn parse(s: &str) -> Result<Self, ValidationError> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ValidationError::InvalidVariant {
                        field: $field,
                        value: s.to_owned(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum! {
    /// Account role; `admin` is only granted from the CLI
    UserRole, "role" {
        Investor => "investor",
        Entrepreneur => "entrepreneur",
        Admin => "admin",
    }
}

text_enum! {
    OfferStatus, "status" {
        Pending => "pending",
        Accepted => "accepted",
        Rejected => "rejected",
    }
}

text_enum! {
    ConnectStatus, "status" {
        Pending => "pending",
        Accepted => "accepted",
        Rejected => "rejected",
    }
}

text_enum! {
    TeamRole, "role" {
        Founder => "founder",
        Member => "member",
        Advisor => "advisor",
    }
}

text_enum! {
    /// Post media category; selects the `postMedia/` subdirectory
    MediaKind, "kind" {
        Image => "image",
        Video => "video",
    }
}

text_enum! {
    NotificationKind, "kind" {
        OfferReceived => "offer_received",
        OfferStatus => "offer_status",
        ConnectRequest => "connect_request",
        ConnectAccepted => "connect_accepted",
        TeamAdded => "team_added",
        Comment => "comment",
        Like => "like",
        Message => "message",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_variant() {
        for role in UserRole::ALL {
            assert_eq!(UserRole::parse(role.as_str()).unwrap(), *role);
        }
        for kind in NotificationKind::ALL {
            assert_eq!(NotificationKind::parse(kind.as_str()).unwrap(), *kind);
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(OfferStatus::parse(" Accepted ").unwrap(), OfferStatus::Accepted);
        assert_eq!(TeamRole::parse("ADVISOR").unwrap(), TeamRole::Advisor);
    }

    #[test]
    fn unknown_variant_names_field() {
        let err = ConnectStatus::parse("maybe").unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidVariant {
                field: "status",
                value: "maybe".into()
            }
        );
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&NotificationKind::OfferReceived).unwrap();
        assert_eq!(json, "\"offer_received\"");
    }
}
