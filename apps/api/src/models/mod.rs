pub mod analysis;
pub mod documents;
