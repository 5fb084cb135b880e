pub mod exposure;
pub mod inspect;
