pub mod fixed_point;
pub mod ids;

pub use drip_time::Timestamp;
pub use fixed_point::*;
pub use ids::*;

/// Token amount in base units (18 decimals by convention).
pub type Amount = u128;

/// One whole token in base units.
pub const ONE: Amount = 1_000_000_000_000_000_000;
