pub mod inspect;
pub mod layers;
pub mod retag;
