#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod lora;
pub mod node;
pub mod payload;
pub mod reliable;
pub mod sensors;
pub mod uplink;

// Embassy tasks and the esp-hal adapters only build for the boards
#[cfg(feature = "embedded")]
pub mod tasks;
