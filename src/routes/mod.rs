pub mod health;
pub mod locations;
pub mod runs;
