//! Fault model for retry classification.
//!
//! Failures are tagged values rather than opaque trait objects: a [`Fault`]
//! carries a static [`FaultKind`] tag plus an optional boxed cause, so the
//! classifier can test kinds and walk cause chains without downcasting.

use std::fmt;

/// A named fault kind with an optional parent kind.
///
/// Kinds form an open hierarchy: callers declare their own as statics and
/// point subkinds at their parent, e.g. a `SOCKET` kind whose parent is `IO`.
/// Identity is by address, so two statics with the same name are distinct.
pub struct FaultKind {
    name: &'static str,
    parent: Option<&'static FaultKind>,
}

impl FaultKind {
    /// A root kind with no parent.
    pub const fn new(name: &'static str) -> Self {
        Self { name, parent: None }
    }

    /// A kind that is a refinement of `parent`.
    pub const fn subkind(name: &'static str, parent: &'static FaultKind) -> Self {
        Self {
            name,
            parent: Some(parent),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parent(&'static self) -> Option<&'static FaultKind> {
        self.parent
    }

    /// True if `self` is `other` or a (transitive) subkind of it.
    pub fn is_a(&'static self, other: &'static FaultKind) -> bool {
        let mut kind = Some(self);
        while let Some(cur) = kind {
            if std::ptr::eq(cur, other) {
                return true;
            }
            kind = cur.parent;
        }
        false
    }
}

impl fmt::Debug for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl PartialEq for FaultKind {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for FaultKind {}

/// A failed operation outcome: a kind tag, a message, and an optional cause.
#[derive(Debug, Clone)]
pub struct Fault {
    kind: &'static FaultKind,
    message: String,
    cause: Option<Box<Fault>>,
}

impl Fault {
    pub fn new(kind: &'static FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// Wrap another fault as the cause of this one.
    pub fn with_cause(kind: &'static FaultKind, message: impl Into<String>, cause: Fault) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    pub fn kind(&self) -> &'static FaultKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Immediate cause, if any.
    pub fn cause(&self) -> Option<&Fault> {
        self.cause.as_deref()
    }

    /// Iterate the full chain: this fault first, then each nested cause.
    pub fn chain(&self) -> Chain<'_> {
        Chain { next: Some(self) }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.name, self.message)
    }
}

impl std::error::Error for Fault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_deref().map(|c| c as &(dyn std::error::Error + 'static))
    }
}

/// Iterator over a fault and its causes, outermost first.
pub struct Chain<'a> {
    next: Option<&'a Fault>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a Fault;

    fn next(&mut self) -> Option<&'a Fault> {
        let cur = self.next.take()?;
        self.next = cur.cause();
        Some(cur)
    }
}
