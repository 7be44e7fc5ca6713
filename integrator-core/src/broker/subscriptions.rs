use std::sync::Arc;

use integrator_sdk::objects::Subscription;
use tokio::sync::RwLock;

/// Webhook subscriptions keyed by system name.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    entries: Arc<RwLock<Vec<Subscription>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `subscription`, replacing any previous one for the same system.
    ///
    /// Returns `true` when an existing subscription was replaced.
    pub async fn register(&self, subscription: Subscription) -> bool {
        let mut entries = self.entries.write().await;
        match entries
            .iter_mut()
            .find(|s| s.system_name == subscription.system_name)
        {
            Some(existing) => {
                *existing = subscription;
                true
            }
            None => {
                entries.push(subscription);
                false
            }
        }
    }

    pub async fn list(&self) -> Vec<Subscription> {
        self.entries.read().await.clone()
    }

    /// Active subscriptions that want `event_type`.
    pub async fn interested_in(&self, event_type: &str) -> Vec<Subscription> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|s| s.wants(event_type))
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(system: &str, types: &[&str], active: bool) -> Subscription {
        Subscription {
            system_name: system.into(),
            event_types: types.iter().map(|t| t.to_string()).collect(),
            webhook_url: format!("http://{system}.local/hook").parse().unwrap(),
            active,
        }
    }

    #[tokio::test]
    async fn test_same_system_replaces_previous() {
        let registry = SubscriptionRegistry::new();
        assert!(!registry.register(sub("crm", &["lead_created"], true)).await);
        assert!(registry.register(sub("crm", &["task_completed"], true)).await);

        let all = registry.list().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].event_types, vec!["task_completed"]);
    }

    #[tokio::test]
    async fn test_interested_in_skips_inactive() {
        let registry = SubscriptionRegistry::new();
        registry.register(sub("crm", &["inventory_low"], true)).await;
        registry.register(sub("erp", &["inventory_low"], false)).await;
        registry.register(sub("hr", &["badge_earned"], true)).await;

        let interested = registry.interested_in("inventory_low").await;
        assert_eq!(interested.len(), 1);
        assert_eq!(interested[0].system_name, "crm");
    }
}
