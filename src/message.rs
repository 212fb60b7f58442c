//! Message-level security parameters carried with every inbound request.
//!
//! The security subsystem authenticates and decrypts messages before they
//! reach the processor; what arrives here is only the outcome: which model
//! processed the message, at which level, on behalf of which principal.

/// SNMPv3 security level.
///
/// The variants are ordered from least secure to most secure,
/// supporting VACM-style level comparisons (e.g., `actual >= required`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum SecurityLevel {
    /// No authentication, no privacy
    #[default]
    NoAuthNoPriv,
    /// Authentication only
    AuthNoPriv,
    /// Authentication and privacy (encryption)
    AuthPriv,
}

/// Security model identifiers (RFC 3411).
///
/// `Any` only appears in access-control configuration, where it matches
/// every model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityModel {
    /// Wildcard for access-control tables
    Any = 0,
    /// SNMPv1 community-based security
    V1 = 1,
    /// SNMPv2c community-based security
    V2c = 2,
    /// User-based Security Model (SNMPv3)
    Usm = 3,
}

impl SecurityModel {
    /// Numeric model identifier.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAuthNoPriv => write!(f, "noAuthNoPriv"),
            Self::AuthNoPriv => write!(f, "authNoPriv"),
            Self::AuthPriv => write!(f, "authPriv"),
        }
    }
}
