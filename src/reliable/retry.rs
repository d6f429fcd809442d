//! Bounded retry around single reliable send attempts

use super::link::{LinkAttemptResult, ReliableError, ReliableLink};
use super::{NetworkId, RetryBudget};
use crate::lora::traits::{irq, LoraRadio};
use core::future::Future;
use embedded_hal_async::delay::DelayNs;
use log::{debug, info, warn};

/// Anything that can make one reliable send attempt
pub trait ReliableSender {
    fn send_reliable(
        &mut self,
        payload: &[u8],
        network_id: NetworkId,
        ack_timeout_ms: u32,
        send_timeout_ms: u32,
        tx_power_dbm: i8,
    ) -> impl Future<Output = Result<LinkAttemptResult, ReliableError>>;

    /// IRQ flags latched by the last attempt
    fn irq_status(&self) -> u16;
}

impl<R: LoraRadio, D: DelayNs> ReliableSender for ReliableLink<R, D> {
    async fn send_reliable(
        &mut self,
        payload: &[u8],
        network_id: NetworkId,
        ack_timeout_ms: u32,
        send_timeout_ms: u32,
        tx_power_dbm: i8,
    ) -> Result<LinkAttemptResult, ReliableError> {
        ReliableLink::send_reliable(
            self,
            payload,
            network_id,
            ack_timeout_ms,
            send_timeout_ms,
            tx_power_dbm,
        )
        .await
    }

    fn irq_status(&self) -> u16 {
        ReliableLink::irq_status(self)
    }
}

/// Parameters of one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPlan {
    pub network_id: NetworkId,
    pub budget: RetryBudget,
    pub tx_power_dbm: i8,
    /// Pause between attempts
    pub attempt_gap_ms: u32,
}

/// Final status after the retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Acknowledged {
        attempts: u8,
        result: LinkAttemptResult,
    },
    Exhausted {
        attempts: u8,
    },
}

impl DeliveryStatus {
    pub fn attempts(&self) -> u8 {
        match self {
            DeliveryStatus::Acknowledged { attempts, .. } => *attempts,
            DeliveryStatus::Exhausted { attempts } => *attempts,
        }
    }

    /// The acknowledged attempt, if any
    pub fn acknowledged(&self) -> Option<&LinkAttemptResult> {
        match self {
            DeliveryStatus::Acknowledged { result, .. } => Some(result),
            DeliveryStatus::Exhausted { .. } => None,
        }
    }
}

/// Send `payload` until acknowledged or the budget runs out
///
/// `on_attempt` sees every attempt with its 1-based number.
pub async fn deliver<S, D, F>(
    sender: &mut S,
    delay: &mut D,
    payload: &[u8],
    plan: &DeliveryPlan,
    mut on_attempt: F,
) -> Result<DeliveryStatus, ReliableError>
where
    S: ReliableSender,
    D: DelayNs,
    F: FnMut(u8, &LinkAttemptResult),
{
    let max_attempts = plan.budget.max_attempts;

    for attempt in 1..=max_attempts {
        let result = sender
            .send_reliable(
                payload,
                plan.network_id,
                plan.budget.ack_timeout_ms,
                plan.budget.send_timeout_ms,
                plan.tx_power_dbm,
            )
            .await?;

        on_attempt(attempt, &result);

        if result.success && result.payload_length > 0 {
            info!(
                "Attempt {}/{}: ACK received, RSSI {}dBm SNR {}dB",
                attempt, max_attempts, result.ack_rssi, result.ack_snr
            );
            return Ok(DeliveryStatus::Acknowledged { attempts: attempt, result });
        }

        // Only valid until the next radio operation
        let irq_status = sender.irq_status();
        warn!(
            "Attempt {}/{}: not acknowledged ({:?}), IRQ 0x{:04X}",
            attempt, max_attempts, result.failure, irq_status
        );
        for name in irq::names(irq_status) {
            debug!("  {}", name);
        }

        if attempt < max_attempts {
            delay.delay_ms(plan.attempt_gap_ms).await;
        }
    }

    warn!("Delivery failed after {} attempts", max_attempts);
    Ok(DeliveryStatus::Exhausted { attempts: max_attempts })
}
