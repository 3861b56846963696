//! Failure injection for MockClusterClient

use std::fmt;

/// A ClusterClient operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    /// [`get`](crate::ClusterClient::get)
    Get,
    /// [`create`](crate::ClusterClient::create)
    Create,
    /// [`update`](crate::ClusterClient::update)
    Update,
    /// [`update_status`](crate::ClusterClient::update_status)
    UpdateStatus,
    /// [`delete`](crate::ClusterClient::delete)
    Delete,
    /// [`list`](crate::ClusterClient::list)
    List,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Get => "get",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::UpdateStatus => "update_status",
            Operation::Delete => "delete",
            Operation::List => "list",
        };
        f.write_str(name)
    }
}

/// Pending failures, consumed in the order they were added
#[derive(Debug, Default)]
pub(crate) struct Failures {
    /// Operation and the number of calls still let through before it fails
    pending: Vec<(Operation, usize)>,
}

impl Failures {
    pub(crate) fn push(&mut self, operation: Operation, successes: usize) {
        self.pending.push((operation, successes));
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }

    /// Whether this call of `operation` has to fail.
    pub(crate) fn take(&mut self, operation: Operation) -> bool {
        let Some(index) = self.pending.iter().position(|(op, _)| *op == operation) else {
            return false;
        };
        let successes = &mut self.pending[index].1;
        if *successes > 0 {
            *successes -= 1;
            return false;
        }
        self.pending.remove(index);
        true
    }
}
