pub mod frames;
pub mod text;
