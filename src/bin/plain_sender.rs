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
use esp_hal::analog::adc::{Adc, AdcConfig, Attenuation};
use esp_hal::gpio::{DriveMode, Flex, Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::peripherals::GPIO33;
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use esp_hal::spi::Mode as SpiMode;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::Async;
use log::{info, warn};
use static_cell::StaticCell;

use siespro_lora_firmware::config::timing::RADIO_SETTLE_MS;
use siespro_lora_firmware::config::SensorNodeConfig;
use siespro_lora_firmware::lora::{LoraRadio, Sx127xDriver, Sx127xPins};
use siespro_lora_firmware::node::PlainSender;
use siespro_lora_firmware::sensors::{AdcSoilProbe, Dht11, Sampler};
use siespro_lora_firmware::tasks;

type Radio = Sx127xDriver<Spi<'static, Async>, Output<'static>, Input<'static>, Output<'static>>;
type Climate = Dht11<Flex<'static>, esp_hal::delay::Delay>;
type Soil = AdcSoilProbe<GPIO33<'static>>;
type Sender = PlainSender<Radio, Climate, Soil>;

/// Static executor for embassy
static EXECUTOR: StaticCell<esp_rtos::embassy::Executor> = StaticCell::new();

#[esp_hal::main]
fn main() -> ! {
    esp_println::logger::init_logger_from_env();

    let peripherals = esp_hal::init(esp_hal::Config::default());

    // Initialise the RTOS scheduler with timer - MUST be done before any async operations
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // SX1278 on VSPI, wired as on the sensor node
    let spi = Spi::new(
        peripherals.SPI2,
        SpiConfig::default()
            .with_frequency(Rate::from_mhz(1))
            .with_mode(SpiMode::_0),
    )
    .unwrap()
    .with_sck(peripherals.GPIO18)
    .with_miso(peripherals.GPIO19)
    .with_mosi(peripherals.GPIO23)
    .into_async();

    let lora_pins = Sx127xPins {
        nss: Output::new(peripherals.GPIO5, Level::High, OutputConfig::default()),
        dio0: Input::new(peripherals.GPIO2, InputConfig::default().with_pull(Pull::Down)),
        nrst: Output::new(peripherals.GPIO14, Level::High, OutputConfig::default()),
    };

    let config = SensorNodeConfig::default();
    let radio = Sx127xDriver::new(spi, lora_pins, config.radio.clone());

    // DHT11 data line: open drain, released high
    let mut dht_pin = Flex::new(peripherals.GPIO17);
    dht_pin.apply_output_config(
        &OutputConfig::default()
            .with_drive_mode(DriveMode::OpenDrain)
            .with_pull(Pull::Up),
    );
    dht_pin.set_high();
    dht_pin.set_output_enable(true);
    dht_pin.set_input_enable(true);
    let climate = Dht11::new(dht_pin, esp_hal::delay::Delay::new());

    let mut adc_config = AdcConfig::new();
    let soil_pin = adc_config.enable_pin(peripherals.GPIO33, Attenuation::_11dB);
    let soil = AdcSoilProbe::new(Adc::new(peripherals.ADC1, adc_config), soil_pin);

    let sender = PlainSender::new(
        radio,
        Sampler::with_soil(climate, soil, config.soil),
        config.layout,
        config.radio.tx_power_dbm,
    );

    let executor = EXECUTOR.init(esp_rtos::embassy::Executor::new());
    executor.run(|spawner| {
        spawner.must_spawn(plain_sender_task(sender, config));
    })
}

#[embassy_executor::task]
async fn plain_sender_task(mut sender: Sender, config: SensorNodeConfig) {
    if let Err(e) = config.validate() {
        warn!("Invalid configuration: {:?}", e);
        tasks::halt("configuration").await;
    }

    info!("LoRa TX - DHT11 + HW-080 CSV");
    if let Err(e) = sender.radio_mut().init().await {
        warn!("No LoRa device detected: {:?}", e);
        tasks::halt("LoRa device not found").await;
    }
    info!("LoRa device detected");
    Timer::after(Duration::from_millis(RADIO_SETTLE_MS)).await;

    tasks::plain_sender_task(sender).await
}
