//! WiFi station and network stack tasks for the JSON uplink
//!
//! Neither task touches the radio or the sensors. The uplink only checks
//! [`NETWORK_UP`] before each POST, so the control loop never waits on WiFi.

use crate::config::uplink::WIFI_CONNECT_TIMEOUT_MS;
use crate::uplink::http::NETWORK_UP;
use core::sync::atomic::Ordering;
use embassy_net::{Runner, Stack};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController, WifiDevice};
use log::{error, info, warn};

/// Signalled each time DHCP has configured the stack
pub static NETWORK_READY: Signal<CriticalSectionRawMutex, ()> = Signal::new();

const LINK_POLL_MS: u64 = 100;
const LINK_CHECK_INTERVAL_MS: u64 = 5000;

/// Drives embassy-net; must run for the stack to process packets
pub async fn net_runner_task(mut runner: Runner<'static, WifiDevice<'static>>) -> ! {
    runner.run().await
}

/// Poll `is_connected` until it reports true or `timeout` elapses
async fn wait_for_link(wifi: &mut WifiController<'static>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if wifi.is_connected().unwrap_or(false) {
            return true;
        }
        Timer::after(Duration::from_millis(LINK_POLL_MS)).await;
    }
    false
}

async fn wait_for_dhcp(stack: Stack<'static>) {
    while !stack.is_config_up() {
        Timer::after(Duration::from_millis(LINK_POLL_MS)).await;
    }
    if let Some(config) = stack.config_v4() {
        info!("WiFi: IP {}", config.address);
    }
}

/// Bring the station up, then keep it connected
pub async fn wifi_task(
    mut wifi: WifiController<'static>,
    client_config: ClientConfig,
    stack: Stack<'static>,
) {
    let timeout = Duration::from_millis(WIFI_CONNECT_TIMEOUT_MS);

    if let Err(e) = wifi.set_config(&ModeConfig::Client(client_config)) {
        error!("WiFi set_config failed: {:?}", e);
        return;
    }
    if let Err(e) = wifi.start() {
        error!("WiFi start failed: {:?}", e);
        return;
    }

    info!("WiFi: connecting...");
    if let Err(e) = wifi.connect() {
        error!("WiFi connect failed: {:?}", e);
    }

    loop {
        if wait_for_link(&mut wifi, timeout).await {
            info!("WiFi: connected");
            wait_for_dhcp(stack).await;
            NETWORK_UP.store(true, Ordering::Release);
            NETWORK_READY.signal(());

            while wifi.is_connected().unwrap_or(false) {
                Timer::after(Duration::from_millis(LINK_CHECK_INTERVAL_MS)).await;
            }
            NETWORK_UP.store(false, Ordering::Release);
            warn!("WiFi: disconnected, reconnecting...");
        } else {
            warn!("WiFi: not connected after {} ms, uplink skipped", WIFI_CONNECT_TIMEOUT_MS);
        }

        if let Err(e) = wifi.connect() {
            error!("WiFi reconnect failed: {:?}", e);
            Timer::after(Duration::from_millis(LINK_CHECK_INTERVAL_MS)).await;
        }
    }
}
