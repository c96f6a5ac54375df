//! Common type definitions.
//!
//! Record IDs are the integer primary keys assigned by the store. They are never reassigned,
//! so an ID seen once always refers to the same record (or to nothing, once it is deleted).

use std::fmt;

pub type RecordId = i64;

/// Operations a resource can expose. Used in log fields and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    DeleteAll,
    Authenticate,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Read => write!(f, "read"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
            Operation::DeleteAll => write!(f, "delete all"),
            Operation::Authenticate => write!(f, "authenticate"),
        }
    }
}
