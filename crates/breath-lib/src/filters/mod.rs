pub mod smooth;

pub use smooth::{detrend, normalize, smooth, zscore};
