//! Contract Tests - Protocol Invariant Protection
//!
//! This file aggregates all contract test modules. Contract tests verify
//! invariants that MUST NEVER BREAK: the canonical encoding forms, the PAR
//! scope matrix, and the driver semantics every backend has to satisfy.

// Contract test modules
mod contracts {
    // Canonical encoding contracts
    mod encoding {
        include!("encoding_contracts.rs");
    }

    // PAR scope-matrix contracts
    mod par_scope {
        include!("par_scope_contracts.rs");
    }

    // Object-store driver contracts
    mod object_store {
        include!("object_store_contracts.rs");
    }
}
