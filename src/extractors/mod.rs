// src/extractors/mod.rs
pub mod forms;
pub mod normalize;
pub mod section;
