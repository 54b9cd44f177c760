//! Role enumeration.
//!
//! Roles are a closed set. Unknown role strings are rejected at every decode
//! boundary (session tokens, request payloads, database rows) instead of
//! being passed through.

use serde::{Deserialize, Serialize};

/// The fixed set of roles a user can hold within a clinic.
///
/// SUPER_ADMIN is a user-global capability stored against the reserved
/// System clinic; the other three are per-clinic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleName {
    Doctor,
    Receptionist,
    Admin,
    SuperAdmin,
}

impl RoleName {
    /// Stable wire/storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleName::Doctor => "DOCTOR",
            RoleName::Receptionist => "RECEPTIONIST",
            RoleName::Admin => "ADMIN",
            RoleName::SuperAdmin => "SUPER_ADMIN",
        }
    }

    /// All valid roles, in storage order.
    pub const ALL: [RoleName; 4] = [
        RoleName::Doctor,
        RoleName::Receptionist,
        RoleName::Admin,
        RoleName::SuperAdmin,
    ];

    /// Whether this role occupies a staff seat (counted against plan limits).
    /// ADMIN and SUPER_ADMIN are administrative and uncounted.
    pub fn counts_as_staff(&self) -> bool {
        matches!(self, RoleName::Doctor | RoleName::Receptionist)
    }
}

impl std::str::FromStr for RoleName {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DOCTOR" => Ok(RoleName::Doctor),
            "RECEPTIONIST" => Ok(RoleName::Receptionist),
            "ADMIN" => Ok(RoleName::Admin),
            "SUPER_ADMIN" => Ok(RoleName::SuperAdmin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl TryFrom<&str> for RoleName {
    type Error = UnknownRole;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl std::fmt::Display for RoleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for role strings outside the closed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl std::fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown role: {}", self.0)
    }
}

impl std::error::Error for UnknownRole {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_known_roles() {
        for role in RoleName::ALL {
            assert_eq!(role.as_str().parse::<RoleName>().unwrap(), role);
        }
    }

    #[test]
    fn rejects_unknown_role_strings() {
        assert!("NURSE".parse::<RoleName>().is_err());
        assert!("admin".parse::<RoleName>().is_err());
        assert!("".parse::<RoleName>().is_err());
    }

    #[test]
    fn serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&RoleName::SuperAdmin).unwrap();
        assert_eq!(json, "\"SUPER_ADMIN\"");

        let parsed: RoleName = serde_json::from_str("\"RECEPTIONIST\"").unwrap();
        assert_eq!(parsed, RoleName::Receptionist);
    }

    #[test]
    fn serde_rejects_unknown_role_strings() {
        assert!(serde_json::from_str::<RoleName>("\"OWNER\"").is_err());
    }

    #[test]
    fn seat_counting_excludes_admin_roles() {
        assert!(RoleName::Doctor.counts_as_staff());
        assert!(RoleName::Receptionist.counts_as_staff());
        assert!(!RoleName::Admin.counts_as_staff());
        assert!(!RoleName::SuperAdmin.counts_as_staff());
    }
}
