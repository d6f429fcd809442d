#![no_std]
#![no_main]

// Required for ESP-IDF bootloader compatibility
// Use explicit parameters to ensure correct efuse block revision values
esp_bootloader_esp_idf::esp_app_desc!(
    env!("CARGO_PKG_VERSION"),  // version
    env!("CARGO_PKG_NAME"),     // project_name
    "00:00:00",                 // build_time
    "2025-01-01",               // build_date
    "0.0.0",                    // idf_ver (not using IDF)
    0x10000,                    // mmu_page_size (64KB)
    0,                          // min_efuse_blk_rev_full (accept all)
    u16::MAX                    // max_efuse_blk_rev_full (accept all)
);

use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::interrupt::software::SoftwareInterruptControl;
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use esp_hal::spi::Mode as SpiMode;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::Async;
use log::{info, warn};
use static_cell::StaticCell;

use siespro_lora_firmware::config::timing::RADIO_SETTLE_MS;
use siespro_lora_firmware::config::ReceiverConfig;
use siespro_lora_firmware::lora::{LoraRadio, Sx127xDriver, Sx127xPins};
use siespro_lora_firmware::node::PlainReceiver;
use siespro_lora_firmware::tasks::{self, EmbassyClock};

type Radio = Sx127xDriver<Spi<'static, Async>, Output<'static>, Input<'static>, Output<'static>>;

/// Static executor for embassy
static EXECUTOR: StaticCell<esp_rtos::embassy::Executor> = StaticCell::new();

#[esp_hal::main]
fn main() -> ! {
    esp_println::logger::init_logger_from_env();

    let peripherals = esp_hal::init(esp_hal::Config::default());

    // Initialise the RTOS scheduler with timer - MUST be done before any async operations
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let sw_interrupt = SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    esp_rtos::start(timg0.timer0, sw_interrupt.software_interrupt0);

    let spi = Spi::new(
        peripherals.SPI2,
        SpiConfig::default()
            .with_frequency(Rate::from_mhz(1))
            .with_mode(SpiMode::_0),
    )
    .unwrap()
    .with_sck(peripherals.GPIO10)
    .with_miso(peripherals.GPIO5)
    .with_mosi(peripherals.GPIO6)
    .into_async();

    let lora_pins = Sx127xPins {
        nss: Output::new(peripherals.GPIO7, Level::High, OutputConfig::default()),
        dio0: Input::new(peripherals.GPIO2, InputConfig::default().with_pull(Pull::Down)),
        nrst: Output::new(peripherals.GPIO3, Level::High, OutputConfig::default()),
    };

    let config = ReceiverConfig::default();
    let radio = Sx127xDriver::new(spi, lora_pins, config.radio.clone());

    let executor = EXECUTOR.init(esp_rtos::embassy::Executor::new());
    executor.run(|spawner| {
        spawner.must_spawn(plain_receiver_task(radio, config));
    })
}

#[embassy_executor::task]
async fn plain_receiver_task(radio: Radio, config: ReceiverConfig) {
    if let Err(e) = config.validate() {
        warn!("Invalid configuration: {:?}", e);
        tasks::halt("configuration").await;
    }

    let mut receiver = PlainReceiver::new(radio, EmbassyClock);
    if let Err(e) = receiver.radio_mut().init().await {
        warn!("No LoRa device responding: {:?}", e);
        tasks::halt("LoRa device not found").await;
    }
    info!("LoRa device found");
    Timer::after(Duration::from_millis(RADIO_SETTLE_MS)).await;

    tasks::plain_receiver_task(receiver).await
}
