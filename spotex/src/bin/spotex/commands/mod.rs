pub mod filters;
pub mod index;
pub mod saved;
