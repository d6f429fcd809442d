//! Text payloads: the CSV carried over the radio and the dataset lines
//! printed on the serial console

pub mod csv;
pub mod dataset;

pub use csv::{format_payload, parse_payload, PayloadError, PayloadLayout};
pub use dataset::{dataset_header, format_dataset_line};
