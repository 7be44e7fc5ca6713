//! Clients for the services the gateway talks to.

pub mod advisor;
pub mod compliance;
pub mod upstream;

pub use advisor::{AdvisorError, AiAdvisor, HttpAdvisor};
pub use compliance::{ComplianceError, ComplianceHooks, TransactionCheck};
pub use upstream::{Upstream, UpstreamClient, UpstreamError};
