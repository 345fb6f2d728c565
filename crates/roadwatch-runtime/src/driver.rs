//! Async driver: one task owns the [`Gateway`] and serialises every stimulus.
//!
//! Transport callbacks and timers never touch the gateway themselves.  They
//! send [`Inbound`] messages over an mpsc channel; the driver interleaves
//! them with the 1 s tick and the channel period tick in a single
//! `tokio::select!` loop, so the gateway is only ever entered from one place.
//!
//! Indicator commands produced along the way are forwarded on an unbounded
//! channel for the mesh side to deliver.

use std::time::Duration;

use roadwatch_types::{AckEvent, CoreError, IndicatorCommand, Payload, PositionConfig, SensorEvent};
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

use crate::gateway::Gateway;

/// A stimulus for the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Sensor(SensorEvent),
    Position(PositionConfig),
    /// Raw 0x11 page as received over the air.
    PositionPage(Payload),
    Ack(AckEvent),
    Shutdown,
}

/// Run the gateway until [`Inbound::Shutdown`] arrives or every sender is
/// dropped, then hand the gateway back.
///
/// # Errors
///
/// Any fatal [`CoreError`] stops the loop and is returned.
pub async fn run(
    mut gateway: Gateway,
    mut inbound: mpsc::Receiver<Inbound>,
    commands: mpsc::UnboundedSender<IndicatorCommand>,
) -> Result<Gateway, CoreError> {
    let mut second = interval(Duration::from_secs(1));
    let mut page = interval(Duration::from_millis(gateway.config().page_period_ms.max(1)));
    second.set_missed_tick_behavior(MissedTickBehavior::Burst);
    page.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick of an interval completes immediately.
    second.tick().await;
    page.tick().await;

    info!(page_period_ms = gateway.config().page_period_ms, "gateway driver started");
    loop {
        let step = tokio::select! {
            msg = inbound.recv() => match msg {
                Some(Inbound::Shutdown) | None => break,
                Some(msg) => handle(&mut gateway, msg),
            },
            _ = second.tick() => gateway.on_second(),
            _ = page.tick() => {
                gateway.on_page_period();
                Ok(())
            }
        };
        if let Err(e) = step {
            error!(error = %e, "fatal gateway error, stopping driver");
            return Err(e);
        }
        for command in gateway.drain_commands() {
            if commands.send(command).is_err() {
                debug!(node_id = command.node_id, "command receiver gone");
            }
        }
    }

    info!("gateway driver stopped");
    Ok(gateway)
}

fn handle(gateway: &mut Gateway, msg: Inbound) -> Result<(), CoreError> {
    match msg {
        Inbound::Sensor(event) => gateway.on_sensor_event(event),
        Inbound::Position(config) => gateway.on_position_config(config),
        Inbound::PositionPage(payload) => gateway.on_position_page(&payload),
        Inbound::Ack(ack) => gateway.on_ack(ack),
        Inbound::Shutdown => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayConfig;
    use roadwatch_types::{AlertLevel, AlgorithmConfig, GridOffset, GridPosition, NodeType, Octant};

    fn gateway(config: GatewayConfig) -> Gateway {
        Gateway::new(AlgorithmConfig::default(), config).unwrap()
    }

    fn roadside(node_id: u16, x: i8) -> Inbound {
        Inbound::Position(PositionConfig {
            node_id,
            position: GridPosition::new(x, 1),
            offset: GridOffset::default(),
            rotation: Octant::DEG_180,
            node_type: NodeType::PirLidarLed,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_returns_the_gateway() {
        let (tx, rx) = mpsc::channel(8);
        let (cmd_tx, _cmd_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(gateway(GatewayConfig::default()), rx, cmd_tx));

        tx.send(roadside(1, -1)).await.unwrap();
        tx.send(Inbound::Shutdown).await.unwrap();
        let gw = task.await.unwrap().unwrap();
        assert_eq!(gw.topology().count_valid(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn seconds_tick_drives_alerting() {
        let (tx, rx) = mpsc::channel(8);
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(gateway(GatewayConfig::default()), rx, cmd_tx));

        for (id, x) in [(1, -1), (2, 0), (3, 1)] {
            tx.send(roadside(id, x)).await.unwrap();
        }
        // Node 2 looks away from the road into the top-right cell.
        tx.send(Inbound::Sensor(SensorEvent::motion(2, Octant::DEG_0, true))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2_500)).await;

        let mut seen = Vec::new();
        while let Ok(cmd) = cmd_rx.try_recv() {
            seen.push(cmd);
        }
        assert!(seen.iter().any(|c| c.node_id == 1 && c.level == AlertLevel::Alarm));

        drop(tx);
        let gw = task.await.unwrap().unwrap();
        assert_eq!(gw.alerts().output(0), Some(AlertLevel::Alarm));
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_stops_the_driver() {
        let (tx, rx) = mpsc::channel(8);
        let (cmd_tx, _cmd_rx) = mpsc::unbounded_channel();
        let config = GatewayConfig { node_capacity: 1, ..Default::default() };
        let task = tokio::spawn(run(gateway(config), rx, cmd_tx));

        tx.send(roadside(1, -1)).await.unwrap();
        tx.send(roadside(2, 0)).await.unwrap();
        let err = task.await.unwrap().err().unwrap();
        assert!(err.is_fatal());
    }
}
