//! Screen-time and calendar-consistency pipeline behind the dashboard service.
//!
//! Activity-log rows flow through [`timeline`] → [`materialize`] →
//! [`aggregate`] / [`gantt`]; calendar rows feed [`consistency`] and
//! [`insights`]. [`dashboard::Dashboard`] binds these to a loaded
//! [`snapshot::Snapshot`] for the HTTP layer.

pub mod aggregate;
pub mod category;
pub mod consistency;
pub mod dashboard;
pub mod error;
pub mod gantt;
pub mod insights;
pub mod materialize;
pub mod model;
pub mod refresh;
pub mod snapshot;
pub mod timeline;
pub mod zone;

pub use aggregate::DateWindow;
pub use category::Categorizer;
pub use dashboard::{Dashboard, DashboardSettings};
pub use error::Error;
pub use snapshot::{Snapshot, SnapshotPaths};
