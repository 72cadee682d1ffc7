use std::{future::Future, time::Duration};

use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::{error::GatewayError, events::EventBus, http::HttpGateway};

/// Delay between reconnect attempts, doubling up to `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
        }
    }
}

/// Keeps the host's event stream flowing into `bus` for as long as the
/// process runs, reconnecting after every failure.
#[instrument(skip_all, fields(base = %gateway.base()))]
pub async fn event_pump_task(gateway: HttpGateway, bus: EventBus) {
    reconnecting(|resync| gateway.pump_events(&bus, resync), Backoff::default()).await;
}

/// Runs `session` forever. Every session after the first is told to resync.
/// A session that stayed up longer than `backoff.max` resets the delay.
async fn reconnecting<F, Fut>(mut session: F, backoff: Backoff)
where
    F: FnMut(bool) -> Fut,
    Fut: Future<Output = Result<(), GatewayError>>,
{
    let mut delay = backoff.initial;
    let mut resync = false;

    loop {
        let started = Instant::now();
        if let Err(err) = session(resync).await {
            warn!("Lost live updates from the app: {err}");
        }

        if started.elapsed() > backoff.max {
            delay = backoff.initial;
        }
        info!("Reconnecting to the app in {delay:?}");
        tokio::time::sleep(delay).await;

        delay = (delay * 2).min(backoff.max);
        resync = true;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn refused() -> GatewayError {
        GatewayError::EventStream("connection refused".to_owned())
    }

    #[tokio::test(start_paused = true)]
    async fn retries_with_doubling_delay_and_resyncs() {
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let start = Instant::now();

        let task = tokio::spawn({
            let attempts = attempts.clone();
            reconnecting(
                move |resync| {
                    attempts.lock().unwrap().push((start.elapsed().as_secs(), resync));
                    async { Err(refused()) }
                },
                Backoff {
                    initial: Duration::from_secs(1),
                    max: Duration::from_secs(4),
                },
            )
        });

        tokio::time::sleep(Duration::from_secs(12)).await;
        task.abort();

        // Delays of 1, 2, 4 then capped at 4
        assert_eq!(
            *attempts.lock().unwrap(),
            vec![(0, false), (1, true), (3, true), (7, true), (11, true)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn long_session_resets_the_delay() {
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let start = Instant::now();

        let task = tokio::spawn({
            let attempts = attempts.clone();
            reconnecting(
                move |_| {
                    let elapsed = start.elapsed().as_secs();
                    attempts.lock().unwrap().push(elapsed);
                    async move {
                        // The third session stays up for a minute
                        if elapsed == 3 {
                            tokio::time::sleep(Duration::from_secs(60)).await;
                        }
                        Err(refused())
                    }
                },
                Backoff {
                    initial: Duration::from_secs(1),
                    max: Duration::from_secs(4),
                },
            )
        });

        tokio::time::sleep(Duration::from_secs(67)).await;
        task.abort();

        assert_eq!(*attempts.lock().unwrap(), vec![0, 1, 3, 64, 66]);
    }
}
