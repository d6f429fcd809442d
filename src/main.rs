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

use embassy_executor::Spawner;
use embassy_time::{Delay, Duration, Timer};
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
use siespro_lora_firmware::node::SensorNode;
use siespro_lora_firmware::reliable::ReliableLink;
use siespro_lora_firmware::sensors::{AdcSoilProbe, Dht11, Sampler};
use siespro_lora_firmware::tasks;

#[cfg(feature = "uplink")]
use siespro_lora_firmware::uplink::http::{HttpsBuffers, HttpsClient};
#[cfg(feature = "uplink")]
use siespro_lora_firmware::uplink::UplinkReporter;

type Radio = Sx127xDriver<Spi<'static, Async>, Output<'static>, Input<'static>, Output<'static>>;
type Link = ReliableLink<Radio, Delay>;
type Climate = Dht11<Flex<'static>, esp_hal::delay::Delay>;
type Soil = AdcSoilProbe<GPIO33<'static>>;

#[cfg(feature = "uplink")]
type Uplink = HttpsClient<'static>;
#[cfg(not(feature = "uplink"))]
type Uplink = siespro_lora_firmware::uplink::Disabled;

type Node = SensorNode<Link, Climate, Soil, Uplink, Delay>;

/// Static executor for embassy
static EXECUTOR: StaticCell<esp_rtos::embassy::Executor> = StaticCell::new();

#[cfg(feature = "uplink")]
static RADIO_CONTROLLER: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
#[cfg(feature = "uplink")]
static STACK_RESOURCES: StaticCell<embassy_net::StackResources<3>> = StaticCell::new();
#[cfg(feature = "uplink")]
static HTTPS_BUFFERS: static_cell::ConstStaticCell<HttpsBuffers> =
    static_cell::ConstStaticCell::new(HttpsBuffers::new());

/// Peripherals the async entry point needs beyond the LoRa driver
struct Board {
    climate: Climate,
    soil: Soil,
    #[cfg(feature = "uplink")]
    wifi: esp_hal::peripherals::WIFI<'static>,
}

#[esp_hal::main]
fn main() -> ! {
    #[cfg(feature = "uplink")]
    esp_alloc::heap_allocator!(size: 64 * 1024);

    esp_println::logger::init_logger_from_env();

    let peripherals = esp_hal::init(esp_hal::Config::default());

    // Initialise the RTOS scheduler with timer - MUST be done before any async operations
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // SX1278 on VSPI
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

    // HW-080 analog output, full 0-3.3 V range
    let mut adc_config = AdcConfig::new();
    let soil_pin = adc_config.enable_pin(peripherals.GPIO33, Attenuation::_11dB);
    let soil = AdcSoilProbe::new(Adc::new(peripherals.ADC1, adc_config), soil_pin);

    let board = Board {
        climate,
        soil,
        #[cfg(feature = "uplink")]
        wifi: peripherals.WIFI,
    };

    let executor = EXECUTOR.init(esp_rtos::embassy::Executor::new());
    executor.run(|spawner| {
        spawner.must_spawn(async_main(spawner, radio, board, config));
    })
}

#[embassy_executor::task]
async fn async_main(spawner: Spawner, radio: Radio, board: Board, config: SensorNodeConfig) {
    if let Err(e) = config.validate() {
        warn!("Invalid configuration: {:?}", e);
        tasks::halt("configuration").await;
    }

    let mut link = ReliableLink::new(radio, Delay);
    info!("LoRa: initialising SX1278...");
    if let Err(e) = link.radio_mut().init().await {
        warn!("LoRa device not found: {:?}", e);
        tasks::halt("LoRa device not found").await;
    }
    info!("LoRa: device found");
    Timer::after(Duration::from_millis(RADIO_SETTLE_MS)).await;

    let sampler = Sampler::with_soil(board.climate, board.soil, config.soil);
    let node = SensorNode::new(link, sampler, Delay, config);

    #[cfg(feature = "uplink")]
    let node = {
        let client = start_uplink(&spawner, board.wifi).await;
        node.with_uplink(UplinkReporter::new(
            client,
            siespro_lora_firmware::config::uplink::SERVER_URL,
        ))
    };

    spawner.must_spawn(sensor_node_task(node));
}

/// Start WiFi and the network stack, waiting a bounded time for DHCP
#[cfg(feature = "uplink")]
async fn start_uplink(spawner: &Spawner, wifi: esp_hal::peripherals::WIFI<'static>) -> Uplink {
    use embassy_net::{Config as NetConfig, StackResources};
    use embassy_time::with_timeout;
    use esp_radio::wifi::ClientConfig;
    use siespro_lora_firmware::config::uplink::{WIFI_CONNECT_TIMEOUT_MS, WIFI_PASSWORD, WIFI_SSID};

    let rng = esp_hal::rng::Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;

    let radio_controller = RADIO_CONTROLLER.init(
        esp_radio::init().expect("Failed to initialize esp-radio"),
    );
    let (controller, ifaces) =
        esp_radio::wifi::new(radio_controller, wifi, esp_radio::wifi::Config::default())
            .expect("Failed to initialize WiFi");

    let (stack, runner) = embassy_net::new(
        ifaces.sta,
        NetConfig::dhcpv4(Default::default()),
        STACK_RESOURCES.init(StackResources::new()),
        seed,
    );
    spawner.must_spawn(net_runner_task(runner));

    match WIFI_SSID {
        Some(ssid) => {
            let client_config = ClientConfig::default()
                .with_ssid(ssid.into())
                .with_password(WIFI_PASSWORD.unwrap_or("").into());
            spawner.must_spawn(wifi_task(controller, client_config, stack));

            let timeout = Duration::from_millis(WIFI_CONNECT_TIMEOUT_MS);
            if with_timeout(timeout, tasks::wifi::NETWORK_READY.wait())
                .await
                .is_err()
            {
                warn!("WiFi: no network yet, continuing without uplink");
            }
        }
        None => warn!("WiFi: set WIFI_SSID/WIFI_PASS at build time to enable the uplink"),
    }

    HttpsClient::new(stack, HTTPS_BUFFERS.take(), seed)
}

#[embassy_executor::task]
async fn sensor_node_task(node: Node) {
    tasks::sensor_node_task(node).await
}

#[cfg(feature = "uplink")]
#[embassy_executor::task]
async fn net_runner_task(runner: embassy_net::Runner<'static, esp_radio::wifi::WifiDevice<'static>>) {
    tasks::wifi::net_runner_task(runner).await
}

#[cfg(feature = "uplink")]
#[embassy_executor::task]
async fn wifi_task(
    controller: esp_radio::wifi::WifiController<'static>,
    client_config: esp_radio::wifi::ClientConfig,
    stack: embassy_net::Stack<'static>,
) {
    tasks::wifi::wifi_task(controller, client_config, stack).await
}
