pub mod harmonic;
pub mod lattice;
pub mod linear;
pub mod monte_carlo;
pub mod prime_tetration;
pub mod spectrum;
pub mod stabilization;

pub use lattice::{lattice, LatticeError, LatticeInput, LatticeOutput, LatticeParams};
pub use linear::{linear, LinearError, LinearInput, LinearOutput, LinearParams};
pub use monte_carlo::{
    monte_carlo, MonteCarloError, MonteCarloInput, MonteCarloOutput, MonteCarloParams,
};
pub use prime_tetration::{
    prime_tetration, PrimeTetrationError, PrimeTetrationInput, PrimeTetrationOutput,
    PrimeTetrationParams, TetrationLine, Triad,
};
pub use spectrum::{detect_oscillations, OscillationEntry};
pub use stabilization::{recursive_stabilization, LockedPoint, StabilizedModel};

use thiserror::Error;

/// Strategy selector for callers that route on a stored configuration value
/// rather than calling a strategy module directly.
#[derive(Debug, Clone)]
pub enum ProjectionRequest<'a> {
    Lattice(LatticeInput<'a>),
    PrimeTetration(PrimeTetrationInput<'a>),
    MonteCarlo(MonteCarloInput<'a>),
}

#[derive(Debug, Clone)]
pub enum ProjectionOutput {
    Lattice(LatticeOutput),
    PrimeTetration(PrimeTetrationOutput),
    MonteCarlo(MonteCarloOutput),
}

impl ProjectionOutput {
    /// The primary projected sequence: the single line for lattice and Monte
    /// Carlo, the first line for prime tetration.
    pub fn primary_values(&self) -> &[f64] {
        match self {
            ProjectionOutput::Lattice(o) => &o.values,
            ProjectionOutput::MonteCarlo(o) => &o.values,
            ProjectionOutput::PrimeTetration(o) => {
                o.lines.first().map(|l| l.values.as_slice()).unwrap_or(&[])
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error(transparent)]
    Lattice(#[from] LatticeError),
    #[error(transparent)]
    PrimeTetration(#[from] PrimeTetrationError),
    #[error(transparent)]
    MonteCarlo(#[from] MonteCarloError),
}

pub fn project(request: &ProjectionRequest) -> Result<ProjectionOutput, ProjectionError> {
    match request {
        ProjectionRequest::Lattice(input) => Ok(ProjectionOutput::Lattice(lattice(input)?)),
        ProjectionRequest::PrimeTetration(input) => {
            Ok(ProjectionOutput::PrimeTetration(prime_tetration(input)?))
        }
        ProjectionRequest::MonteCarlo(input) => {
            Ok(ProjectionOutput::MonteCarlo(monte_carlo(input)?))
        }
    }
}
