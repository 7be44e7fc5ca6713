//! Performance-based delivery assignment.

use std::convert::Infallible;
use std::sync::Arc;

use kanau::processor::Processor;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::info;

/// Employees at or above this many open deliveries are skipped unless
/// everyone is that busy.
pub const MAX_DELIVERY_LOAD: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEmployee {
    pub id: String,
    pub name: String,
    pub performance_score: u32,
    pub current_load: u32,
}

impl RosterEmployee {
    fn new(id: &str, name: &str, performance_score: u32, current_load: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            performance_score,
            current_load,
        }
    }
}

/// Who a delivery went to. `current_load` is the load before this delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub employee_id: String,
    pub employee_name: String,
    pub performance_score: u32,
    pub current_load: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub assignment_timestamp: OffsetDateTime,
}

/// Delivery staff and their open delivery counts.
#[derive(Debug, Clone)]
pub struct DeliveryRoster {
    employees: Arc<Mutex<Vec<RosterEmployee>>>,
}

impl DeliveryRoster {
    pub fn new(employees: Vec<RosterEmployee>) -> Self {
        Self {
            employees: Arc::new(Mutex::new(employees)),
        }
    }

    pub async fn employees(&self) -> Vec<RosterEmployee> {
        self.employees.lock().await.clone()
    }
}

impl Default for DeliveryRoster {
    fn default() -> Self {
        Self::new(vec![
            RosterEmployee::new("emp_001", "John Doe", 95, 3),
            RosterEmployee::new("emp_002", "Jane Smith", 88, 2),
            RosterEmployee::new("emp_003", "Bob Johnson", 92, 4),
            RosterEmployee::new("emp_004", "Alice Brown", 85, 1),
        ])
    }
}

/// Pick the employee for a new delivery and count it against their load.
///
/// Highest performance score wins, lower load breaks ties. With an empty
/// roster the delivery goes to a system placeholder.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssignDelivery;

impl Processor<AssignDelivery> for DeliveryRoster {
    type Output = Assignment;
    type Error = Infallible;

    async fn process(&self, _: AssignDelivery) -> Result<Assignment, Infallible> {
        let now = OffsetDateTime::now_utc();
        let mut employees = self.employees.lock().await;

        let any_available = employees.iter().any(|e| e.current_load < MAX_DELIVERY_LOAD);
        let chosen = employees
            .iter_mut()
            .filter(|e| !any_available || e.current_load < MAX_DELIVERY_LOAD)
            .max_by(|a, b| {
                a.performance_score
                    .cmp(&b.performance_score)
                    .then(b.current_load.cmp(&a.current_load))
            });

        let Some(employee) = chosen else {
            return Ok(Assignment {
                employee_id: "emp_fallback".to_string(),
                employee_name: "System Assignment".to_string(),
                performance_score: 0,
                current_load: 0,
                assignment_timestamp: now,
            });
        };

        let assignment = Assignment {
            employee_id: employee.id.clone(),
            employee_name: employee.name.clone(),
            performance_score: employee.performance_score,
            current_load: employee.current_load,
            assignment_timestamp: now,
        };
        employee.current_load += 1;
        info!(
            employee_id = %assignment.employee_id,
            load = employee.current_load,
            "Delivery assigned"
        );
        Ok(assignment)
    }
}

/// Give back a delivery counted by [`AssignDelivery`] that was never
/// placed. Unknown ids, including the placeholder, are ignored.
#[derive(Debug, Clone)]
pub struct ReleaseDelivery {
    pub employee_id: String,
}

impl Processor<ReleaseDelivery> for DeliveryRoster {
    type Output = ();
    type Error = Infallible;

    async fn process(&self, input: ReleaseDelivery) -> Result<(), Infallible> {
        let mut employees = self.employees.lock().await;
        if let Some(employee) = employees.iter_mut().find(|e| e.id == input.employee_id) {
            employee.current_load = employee.current_load.saturating_sub(1);
            info!(
                employee_id = %employee.id,
                load = employee.current_load,
                "Delivery released"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn assign(roster: &DeliveryRoster) -> Assignment {
        roster.process(AssignDelivery).await.unwrap()
    }

    #[tokio::test]
    async fn test_top_performer_until_full() {
        let roster = DeliveryRoster::default();

        let first = assign(&roster).await;
        assert_eq!(first.employee_id, "emp_001");
        assert_eq!(first.current_load, 3);

        let second = assign(&roster).await;
        assert_eq!(second.employee_id, "emp_001");
        assert_eq!(second.current_load, 4);

        // emp_001 is now at the limit, next best is emp_003 with load 4.
        assert_eq!(assign(&roster).await.employee_id, "emp_003");
        assert_eq!(assign(&roster).await.employee_id, "emp_002");
    }

    #[tokio::test]
    async fn test_lower_load_breaks_ties() {
        let roster = DeliveryRoster::new(vec![
            RosterEmployee::new("a", "A", 90, 3),
            RosterEmployee::new("b", "B", 90, 1),
        ]);
        assert_eq!(assign(&roster).await.employee_id, "b");
    }

    #[tokio::test]
    async fn test_everyone_busy_falls_back_to_all() {
        let roster = DeliveryRoster::new(vec![
            RosterEmployee::new("a", "A", 70, 6),
            RosterEmployee::new("b", "B", 80, 5),
        ]);
        let picked = assign(&roster).await;
        assert_eq!(picked.employee_id, "b");
        assert_eq!(picked.current_load, 5);
    }

    #[tokio::test]
    async fn test_empty_roster_uses_placeholder() {
        let roster = DeliveryRoster::new(vec![]);
        assert_eq!(assign(&roster).await.employee_id, "emp_fallback");
    }

    #[tokio::test]
    async fn test_release_restores_load() {
        let roster = DeliveryRoster::default();
        let before = roster.employees().await;

        let picked = assign(&roster).await;
        roster
            .process(ReleaseDelivery {
                employee_id: picked.employee_id,
            })
            .await
            .unwrap();
        assert_eq!(roster.employees().await, before);

        roster
            .process(ReleaseDelivery {
                employee_id: "emp_fallback".into(),
            })
            .await
            .unwrap();
        assert_eq!(roster.employees().await, before);
    }
}
