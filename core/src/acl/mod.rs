//! Access-control rules for buckets and drives
//!
//! An [`AclRule`] describes what a single principal may do with a single
//! bucket or drive: own it, read it, write it. Rules compose into per-drive
//! ACL tables elsewhere; this module owns only the value type.

use serde::{Deserialize, Serialize};

/// Permission triple for one principal on one bucket or drive.
///
/// `inherit` and `null` share the all-false bit pattern but are distinct
/// rules: a null rule denies outright, an inherit rule defers to the
/// enclosing container. The tag survives serialisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclRule {
    #[serde(default, skip_serializing_if = "is_false")]
    inherit: bool,
    #[serde(default)]
    is_owner: bool,
    #[serde(default)]
    is_readable: bool,
    #[serde(default)]
    is_writeable: bool,
}

fn is_false(b: &bool) -> bool {
    !b
}

impl AclRule {
    /// The rule of an owner: full control.
    pub fn owner() -> Self {
        AclRule {
            inherit: false,
            is_owner: true,
            is_readable: true,
            is_writeable: true,
        }
    }

    /// The rule of a writer: read and write, no ownership.
    pub fn writer() -> Self {
        AclRule {
            inherit: false,
            is_owner: false,
            is_readable: true,
            is_writeable: true,
        }
    }

    /// The rule of a reader: read only.
    pub fn reader() -> Self {
        AclRule {
            inherit: false,
            is_owner: false,
            is_readable: true,
            is_writeable: false,
        }
    }

    /// A rule that denies everything.
    pub fn null() -> Self {
        AclRule {
            inherit: false,
            is_owner: false,
            is_readable: false,
            is_writeable: false,
        }
    }

    /// The sentinel rule that defers to the enclosing container.
    pub fn inherit() -> Self {
        AclRule {
            inherit: true,
            is_owner: false,
            is_readable: false,
            is_writeable: false,
        }
    }

    pub fn is_owner(&self) -> bool {
        self.is_owner
    }

    pub fn is_readable(&self) -> bool {
        self.is_readable
    }

    pub fn is_writeable(&self) -> bool {
        self.is_writeable
    }

    /// Whether this rule grants nothing at all. True for both the null rule
    /// and the inherit sentinel; use [`AclRule::is_inherit`] to tell them
    /// apart.
    pub fn is_null(&self) -> bool {
        !self.is_owner && !self.is_readable && !self.is_writeable
    }

    pub fn is_inherit(&self) -> bool {
        self.inherit
    }

    /// Grant or revoke ownership. Mutating makes the rule explicit.
    pub fn set_owner(&mut self, is_owner: bool) {
        self.inherit = false;
        self.is_owner = is_owner;
    }

    /// Grant or revoke read access. Mutating makes the rule explicit.
    pub fn set_readable(&mut self, is_readable: bool) {
        self.inherit = false;
        self.is_readable = is_readable;
    }

    /// Grant or revoke write access. Mutating makes the rule explicit.
    pub fn set_writeable(&mut self, is_writeable: bool) {
        self.inherit = false;
        self.is_writeable = is_writeable;
    }

    /// Set the readable and writeable bits together.
    pub fn set_readable_writeable(&mut self, is_readable_writeable: bool) {
        self.inherit = false;
        self.is_readable = is_readable_writeable;
        self.is_writeable = is_readable_writeable;
    }
}

impl Default for AclRule {
    fn default() -> Self {
        AclRule::null()
    }
}

impl std::fmt::Display for AclRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.inherit {
            return write!(f, "AclRule(inherit)");
        }

        let mut s = Vec::new();
        if self.is_owner {
            s.push("owner");
        }
        if self.is_writeable {
            s.push("writeable");
        }
        if self.is_readable {
            s.push("readable");
        }

        if s.is_empty() {
            write!(f, "AclRule(no permission)")
        } else {
            write!(f, "AclRule({})", s.join(":"))
        }
    }
}
