//! HTTP surface

pub mod health;
