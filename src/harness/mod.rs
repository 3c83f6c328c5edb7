pub mod assertions;
pub mod audit_scanner;
pub mod dag;
pub mod fixtures;
pub mod hierarchy;
pub mod naming;
pub mod poll;

pub use assertions::{expect_failure, expect_shape};
pub use audit_scanner::AuditScanner;
pub use dag::{StepFn, StepFuture, StepOutcome, Suite, SuiteReport};
pub use hierarchy::{CategoryHierarchy, CategoryNode};
pub use naming::UniqueNames;
pub use poll::{poll_until, retry_search_until, RetryPolicy};
