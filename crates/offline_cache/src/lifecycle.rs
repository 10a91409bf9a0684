use std::fmt;

/// Where the current generation is in its life.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    /// Pre-populating the shell; requests go straight to the network.
    Installing { generation: String },
    /// Serving requests; other generations have been purged.
    Active { generation: String },
}

impl Lifecycle {
    pub fn generation(&self) -> &str {
        match self {
            Lifecycle::Installing { generation } | Lifecycle::Active { generation } => generation,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Lifecycle::Active { .. })
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifecycle::Installing { generation } => write!(f, "installing({generation})"),
            Lifecycle::Active { generation } => write!(f, "active({generation})"),
        }
    }
}
