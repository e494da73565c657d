#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_precision_loss
)]

mod bus_payload;
mod database;
pub mod geo;

pub use bus_payload::*;
pub use database::*;
