#![allow(dead_code)]

pub mod fakes;
pub mod range_server;
