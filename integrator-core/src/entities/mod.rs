pub mod employee;
pub mod roster;

pub use employee::{EmployeeError, EmployeeStore};
pub use roster::{AssignDelivery, Assignment, DeliveryRoster, ReleaseDelivery};
