//! Plug-in sketch implementations. spec.md §9 treats the quantile sketch
//! and the cardinality estimator as interfaces ("add / query") rather
//! than a mandated algorithm; these are the implementations this crate
//! ships behind that contract.

pub mod cardinality;
pub mod quantile;

pub use cardinality::Hll;
pub use quantile::TimerSketch;
