mod cards;
mod views;

pub use cards::*;
pub use views::*;
