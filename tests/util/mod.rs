
#![allow(dead_code)]

pub mod cmd;
pub mod project;
