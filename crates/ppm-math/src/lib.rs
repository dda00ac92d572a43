//! Numeric primitives for predictive process monitoring.

pub mod math;

pub use math::categorical::*;
pub use math::normalize::*;
