//! Spread models fitted on formation-window residuals.
//!
//! Two estimators share the same inputs: the static model keeps the hedge
//! regression's residual moments, the state-space model fits a latent AR(1)
//! spread observed with noise.

pub mod state_space;
pub mod static_model;
#[cfg(feature = "synthetic")]
pub mod synthetic;

pub use state_space::{fit_em, filter, EmFit, FilterOutput, StateSpaceModel, StateSpaceParams};
pub use static_model::StaticSpreadModel;
#[cfg(feature = "synthetic")]
pub use synthetic::{simulate_state_space, SimulatedPath};
