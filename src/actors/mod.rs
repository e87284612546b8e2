pub mod refresh_coordinator;

pub use refresh_coordinator::{
    CoordinatorConfig, CoordinatorMessage, RefreshCoordinator, RefreshCoordinatorArgs,
};
