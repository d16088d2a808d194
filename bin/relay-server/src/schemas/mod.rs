//! Request / response types exposed over HTTP.

pub mod conversion;
pub mod health;
