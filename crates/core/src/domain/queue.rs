// Queue Domain Model

use serde::{Deserialize, Serialize};

/// Logical queue name (dot-segmented, e.g. `orders.eu.retail`)
pub type QueueName = String;

/// Queue class as enumerated by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueClass {
    Private,
    Public,
    System,
}

impl QueueClass {
    /// All classes in tree order
    pub const ALL: [QueueClass; 3] = [QueueClass::Private, QueueClass::Public, QueueClass::System];

    /// Caption of the class node in the navigation tree
    pub fn label(&self) -> &'static str {
        match self {
            QueueClass::Private => "Private Queues",
            QueueClass::Public => "Public Queues",
            QueueClass::System => "System Queues",
        }
    }

    /// System queues are owned by the host and cannot be created or deleted
    pub fn is_managed(&self) -> bool {
        !matches!(self, QueueClass::System)
    }
}

impl std::fmt::Display for QueueClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueClass::Private => write!(f, "PRIVATE"),
            QueueClass::Public => write!(f, "PUBLIC"),
            QueueClass::System => write!(f, "SYSTEM"),
        }
    }
}

impl std::str::FromStr for QueueClass {
    type Err = crate::domain::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PRIVATE" => Ok(QueueClass::Private),
            "PUBLIC" => Ok(QueueClass::Public),
            "SYSTEM" => Ok(QueueClass::System),
            other => Err(crate::domain::DomainError::ValidationError(format!(
                "Unknown queue class: {}",
                other
            ))),
        }
    }
}

/// Access mode a queue was opened with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessMode {
    Send,
    Peek,
    Receive,
    SendAndReceive,
    PeekAndAdmin,
    ReceiveAndAdmin,
}

impl AccessMode {
    pub fn can_send(&self) -> bool {
        matches!(self, AccessMode::Send | AccessMode::SendAndReceive)
    }

    pub fn can_peek(&self) -> bool {
        !matches!(self, AccessMode::Send)
    }

    pub fn can_receive(&self) -> bool {
        matches!(
            self,
            AccessMode::Receive | AccessMode::SendAndReceive | AccessMode::ReceiveAndAdmin
        )
    }

    pub fn can_admin(&self) -> bool {
        matches!(self, AccessMode::PeekAndAdmin | AccessMode::ReceiveAndAdmin)
    }
}

impl std::fmt::Display for AccessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessMode::Send => write!(f, "SEND"),
            AccessMode::Peek => write!(f, "PEEK"),
            AccessMode::Receive => write!(f, "RECEIVE"),
            AccessMode::SendAndReceive => write!(f, "SEND_AND_RECEIVE"),
            AccessMode::PeekAndAdmin => write!(f, "PEEK_AND_ADMIN"),
            AccessMode::ReceiveAndAdmin => write!(f, "RECEIVE_AND_ADMIN"),
        }
    }
}

impl std::str::FromStr for AccessMode {
    type Err = crate::domain::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SEND" => Ok(AccessMode::Send),
            "PEEK" => Ok(AccessMode::Peek),
            "RECEIVE" => Ok(AccessMode::Receive),
            "SEND_AND_RECEIVE" => Ok(AccessMode::SendAndReceive),
            "PEEK_AND_ADMIN" => Ok(AccessMode::PeekAndAdmin),
            "RECEIVE_AND_ADMIN" => Ok(AccessMode::ReceiveAndAdmin),
            other => Err(crate::domain::DomainError::ValidationError(format!(
                "Unknown access mode: {}",
                other
            ))),
        }
    }
}

/// Reference to one queue on the host.
///
/// Owned by the catalog source. Holders must re-resolve by
/// `(class, logical_name)` before use; a `QueueRef` from an earlier
/// enumeration may no longer exist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueRef {
    pub logical_name: QueueName,
    pub class: QueueClass,
    pub access_mode: AccessMode,
}

impl QueueRef {
    pub fn new(logical_name: impl Into<String>, class: QueueClass, access_mode: AccessMode) -> Self {
        Self {
            logical_name: logical_name.into(),
            class,
            access_mode,
        }
    }

    /// Two refs address the same queue regardless of access mode
    pub fn same_queue(&self, other: &QueueRef) -> bool {
        self.class == other.class && self.logical_name == other.logical_name
    }
}

impl std::fmt::Display for QueueRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.class, self.logical_name)
    }
}
