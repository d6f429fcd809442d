#[cfg(feature = "embedded")]
pub mod driver;
pub mod traits;

#[cfg(feature = "embedded")]
pub use driver::{Sx127xDriver, Sx127xPins};
pub use traits::{irq, LoraConfig, LoraError, LoraRadio, RxPacket};
