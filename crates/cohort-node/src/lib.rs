//! Cohort - group-deal lifecycle and tiered settlement
//!
//! Participants pool into groups against a merchant deal. Each join re-evaluates
//! the group's reputation-weighted progress against the deal's tier ladder;
//! locking settles the group exactly once and issues signed redemption codes.
//!
//! # Architecture
//!
//! - **Models**: Deal, Group, Member, Settlement, Redemption records
//! - **Storage**: RocksDB transaction store with per-group row locks
//! - **Engine**: catalog, membership ledger, progress, lifecycle, redemptions
//! - **Sweeper**: periodic settlement of expired groups
//! - **API**: HTTP endpoints for clients
//! - **Admin Socket**: Unix socket for local operator commands (cohort-admin CLI)
//!
//! # Example
//!
//! ```no_run
//! use cohort_node::{CohortConfig, CohortNode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CohortConfig::from_env()?;
//!     let node = CohortNode::new(config)?;
//!     node.run().await?;
//!     Ok(())
//! }
//! ```

pub mod models;
pub mod storage;
pub mod clock;
pub mod reputation;
pub mod engine;
pub mod sweeper;
pub mod node;
pub mod api;
pub mod admin_socket;
pub mod error;

pub use models::{
    ActivityRecord, Deal, DealStatus, Group, GroupStatus, Member, MemberStatus, NewDeal,
    Notification, Redemption, RedemptionStatus, Settlement,
};
pub use storage::Storage;
pub use clock::{Clock, ManualClock, SystemClock};
pub use reputation::{ReputationLookup, StoredReputation};
pub use engine::{Engine, GroupStatusView, LockOutcome};
pub use sweeper::{SweepReport, Sweeper};
pub use node::{CohortConfig, CohortNode};
pub use error::{Error, ErrorKind, Result};
