//! Variable binding (VarBind) type.
//!
//! A VarBind pairs an OID with a value.

use crate::ber;
use crate::oid::Oid;
use crate::value::Value;

/// Variable binding - an OID-value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarBind {
    /// The object identifier.
    pub oid: Oid,
    /// The value.
    pub value: Value,
}

impl VarBind {
    /// Create a new VarBind.
    pub fn new(oid: Oid, value: Value) -> Self {
        Self { oid, value }
    }

    /// Create a VarBind with a NULL value (as sent in read requests).
    pub fn null(oid: Oid) -> Self {
        Self {
            oid,
            value: Value::Null,
        }
    }

    /// Returns the exact encoded size of this VarBind in bytes.
    ///
    /// Used for response size accounting during GETBULK processing.
    pub fn encoded_size(&self) -> usize {
        let oid_len = ber::tlv_len(self.oid.ber_content_len());
        ber::tlv_len(oid_len + self.value.encoded_len())
    }
}

impl std::fmt::Display for VarBind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.oid, self.value)
    }
}

/// Encoded size of a VarBind list (the enclosing SEQUENCE included).
pub fn varbind_list_size<'a>(varbinds: impl IntoIterator<Item = &'a VarBind>) -> usize {
    let content: usize = varbinds.into_iter().map(VarBind::encoded_size).sum();
    ber::tlv_len(content)
}
