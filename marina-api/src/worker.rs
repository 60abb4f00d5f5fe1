use marina_booking::BookingEngine;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Background sweep: auto-cancels pending bookings past the confirmation
/// timeout on a fixed cadence. Runs for the life of the process; a failed
/// pass is logged and the next tick retries the same rows.
pub async fn start_booking_sweeper(engine: Arc<BookingEngine>, interval_minutes: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_minutes.max(1) * 60));
    info!("Booking sweeper started, interval {} minutes", interval_minutes);

    loop {
        ticker.tick().await;
        match engine.sweep().await {
            Ok(outcome) if outcome.cancelled > 0 || outcome.failed > 0 => {
                info!(
                    expired = outcome.expired,
                    cancelled = outcome.cancelled,
                    skipped = outcome.skipped,
                    failed = outcome.failed,
                    "sweep pass finished"
                );
            }
            Ok(_) => debug!("sweep pass found nothing to cancel"),
            Err(err) => error!("sweep pass failed: {err}"),
        }
    }
}
