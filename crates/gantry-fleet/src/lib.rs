//! Autoscaled fleet capacity for gantry.
//!
//! [`AutoscalerProvider`] keeps one fleet scaler per runner token, admits
//! jobs against the fleet's capacity, and creates [`InstanceExecutor`]s
//! that bind a reservation to a concrete instance slot. The fleet plugin,
//! the instance connector and the nesting daemon are external; this crate
//! only defines their contracts.
mod error;
pub use error::{FleetError, FleetResult};

mod fleet;
pub use fleet::{Acquisition, Capacity, ConnectInfo, Fleet, FleetFactory, FleetSettings, Schedule};

mod connector;
pub use connector::{
    Client, Connector, DialOptions, NestedVm, Nesting, NestingConnector, RunOptions, Tunnel,
};

mod key;
pub use key::acquisition_key;

pub mod map;

mod provider;
pub use provider::{AutoscalerProvider, DEFAULT_ACQUIRE_TIMEOUT};

mod instance;
pub use instance::InstanceExecutor;

mod remote;
pub use remote::RemoteShellExecutor;

#[cfg(test)]
mod testing;
