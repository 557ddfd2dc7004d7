/// Layered configuration (preset, TOML file, command line) and logger setup.
pub mod config;

/// Host callback contract, algorithm selection and enum dispatch.
pub mod congestion_control;

pub mod errors;

/// Entropy-aware NDM-TCP decision engine.
pub mod ndm;

/// Loss-halving baseline controller.
pub mod reno;

/// JSON-lines trace replay through a controller and a host window.
pub mod replay;

/// Seeded synthetic traces for network presets.
pub mod synth;

/// Reference host window arithmetic.
pub mod window;

pub use congestion_control::{
    AckSample, CaEvent, CaState, CongestionControl, CongestionControlAlgorithm,
    CongestionControlConfig, CongestionControlStats, CongestionController, Diagnostics,
    GrowthDirective,
};
pub use ndm::{NdmConfig, NdmController, NdmStats, Precision};
pub use window::TransportWindow;
