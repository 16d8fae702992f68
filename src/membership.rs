//! Membership source abstraction.
//!
//! The membership source answers one question: which instance ids currently
//! belong to this node's rack-scoped autoscaling group, in a stable order.
//! It is used only for computing slot indices and ring sizes; the cloud
//! binding (EC2 describe calls and the like) lives outside this crate.

use crate::error::Result;
use async_trait::async_trait;
use parking_lot::RwLock;

/// Ordered listing of the instances in this node's rack group, plus the
/// optional paired cross-account group used for dual-account ring sizing.
#[async_trait]
pub trait MembershipSource: Send + Sync {
    /// Instance ids currently in this node's rack group, ordered.
    async fn list_rack_members(&self) -> Result<Vec<String>>;

    /// Instance ids of the paired cross-account group. Empty unless
    /// dual-account mode is in use.
    async fn list_cross_account_members(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Fixed membership listing for development and tests.
#[derive(Default)]
pub struct StaticMembership {
    rack_members: RwLock<Vec<String>>,
    cross_account_members: RwLock<Vec<String>>,
}

impl StaticMembership {
    pub fn new(rack_members: Vec<String>) -> Self {
        Self {
            rack_members: RwLock::new(rack_members),
            cross_account_members: RwLock::new(Vec::new()),
        }
    }

    pub fn with_cross_account(self, members: Vec<String>) -> Self {
        *self.cross_account_members.write() = members;
        self
    }

    /// Replace the rack listing, simulating scale events.
    pub fn set_rack_members(&self, members: Vec<String>) {
        *self.rack_members.write() = members;
    }
}

#[async_trait]
impl MembershipSource for StaticMembership {
    async fn list_rack_members(&self) -> Result<Vec<String>> {
        Ok(self.rack_members.read().clone())
    }

    async fn list_cross_account_members(&self) -> Result<Vec<String>> {
        Ok(self.cross_account_members.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_membership_is_ordered() {
        let membership = StaticMembership::new(vec!["i-1".into(), "i-2".into(), "i-3".into()]);
        let members = membership.list_rack_members().await.unwrap();
        assert_eq!(members, vec!["i-1", "i-2", "i-3"]);
        assert!(membership.list_cross_account_members().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cross_account_listing() {
        let membership = StaticMembership::new(vec!["i-1".into()])
            .with_cross_account(vec!["i-x".into(), "i-y".into()]);
        assert_eq!(membership.list_cross_account_members().await.unwrap().len(), 2);
    }
}
