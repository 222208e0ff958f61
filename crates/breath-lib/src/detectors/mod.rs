pub mod peaks;

pub use peaks::find_peaks;
