//! Command reply values
//!
//! Protocol-agnostic result of a command. The network layer owns the wire
//! encoding; the core only describes the shape of the answer.

use bytes::Bytes;

/// Value returned by a successfully executed command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Short status string ("OK", a type name, ...)
    Simple(String),

    /// Binary-safe payload
    Bulk(Bytes),

    /// Signed integer
    Int(i64),

    /// Ordered sequence of replies
    Array(Vec<Reply>),

    /// Absent value
    Nil,
}

impl Reply {
    /// The canonical "OK" status
    pub fn ok() -> Self {
        Reply::Simple("OK".to_string())
    }

    /// Create a status reply
    pub fn simple(s: impl Into<String>) -> Self {
        Reply::Simple(s.into())
    }

    /// Create a bulk reply from bytes
    pub fn bulk(b: impl Into<Bytes>) -> Self {
        Reply::Bulk(b.into())
    }

    /// Create an integer reply
    pub fn int(i: i64) -> Self {
        Reply::Int(i)
    }

    /// Create an array reply
    pub fn array(items: Vec<Reply>) -> Self {
        Reply::Array(items)
    }

    /// Create a nil reply
    pub fn nil() -> Self {
        Reply::Nil
    }

    /// Try to view as a bulk payload
    pub fn as_bulk(&self) -> Option<&Bytes> {
        match self {
            Reply::Bulk(b) => Some(b),
            _ => None,
        }
    }

    /// Try to view as an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Reply::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to view as an array
    pub fn as_array(&self) -> Option<&[Reply]> {
        match self {
            Reply::Array(items) => Some(items),
            _ => None,
        }
    }

    /// True if this is the nil reply
    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Nil)
    }
}

impl From<i64> for Reply {
    fn from(i: i64) -> Self {
        Reply::Int(i)
    }
}

impl From<Bytes> for Reply {
    fn from(b: Bytes) -> Self {
        Reply::Bulk(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert_eq!(Reply::ok(), Reply::Simple("OK".into()));
        assert_eq!(Reply::int(7).as_int(), Some(7));
        assert_eq!(Reply::bulk("abc").as_bulk(), Some(&Bytes::from("abc")));
        assert!(Reply::nil().is_nil());
    }

    #[test]
    fn test_array_access() {
        let reply = Reply::array(vec![Reply::bulk("x"), Reply::bulk("y")]);
        let items = reply.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], Reply::bulk("x"));
    }
}
