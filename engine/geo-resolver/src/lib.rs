// Geography resolver - ZIP to locality/CBSA with fallback and rural status

mod config;
mod error;
mod fallback;
mod resolver;
mod rural;

pub use config::GeoConfig;
pub use error::{GeographyError, Result};
pub use resolver::{GeoCandidate, GeoResolver, ResolvedGeography};
pub use rural::{rural_status, RuralStatus};
