#![doc = include_str!("../README.md")]

extern crate macroape;

pub mod background;
pub mod error;
pub mod matrix;
pub mod report;
pub mod table;
