//! Per-player cycle scheduler
//!
//! [`PlayerServer::step`] is called once per simulation step by the host. It
//! never waits on the network:
//!
//! ```text
//!   NO_CLIENT ──accept──▶ CONNECTED ──disconnect / read error / bad frame / write failure──┐
//!       ▲                                                                                  │
//!       └──────────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! While connected, every step drains all complete inbound frames, builds one
//! batch of measurements, checks it against the team quota and sends it. The
//! client therefore receives exactly one message per step.

use crate::actuation::ActuatorCommandApplier;
use crate::batch::MeasurementBatch;
use crate::config::{BenchmarkConfig, PlayerConfig, ServerConfig};
use crate::devices::DeviceRegistry;
use crate::error::Result;
use crate::net::{AllowList, Connection, HostResolver, Listener, ReadOutcome, ReverseDnsResolver};
use crate::protocol::{FrameDecoder, wire};
use crate::quota::{QuotaLedger, QuotaStore};
use crate::sampling::{EnabledSensorSet, SensorSampler};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Size of the socket read buffer
const READ_CHUNK: usize = 64 * 1024;

/// Serves one robot to one remote controller
pub struct PlayerServer {
    player: PlayerConfig,
    basic_time_step_ms: u32,
    benchmark: BenchmarkConfig,

    listener: Listener,
    allow_list: AllowList,
    resolver: Box<dyn HostResolver>,
    connection: Option<Connection>,
    decoder: FrameDecoder,
    read_buffer: Vec<u8>,

    applier: ActuatorCommandApplier,
    sensors: EnabledSensorSet,
    sampler: SensorSampler,
    batch: MeasurementBatch,
    ledger: QuotaLedger,

    /// Simulated time since the client connected
    time_ms: u32,
}

/// Instants taken during one connected step
struct PhaseTimes {
    start: Instant,
    after_select: Instant,
    after_receive: Instant,
    after_prepare: Instant,
    after_send: Instant,
}

impl PlayerServer {
    /// Validate `config`, bind the listening port and open the quota ledger
    pub fn new(config: &ServerConfig, store: Box<dyn QuotaStore>) -> Result<Self> {
        config.validate()?;

        let player = config.player;
        let step = config.timing.basic_time_step_ms;
        let listener = Listener::bind(config.network.port)?
            .with_write_stall(Duration::from_millis(config.network.write_stall_ms));

        if config.network.allowed_hosts.is_empty() {
            log::warn!("{}: no allowed hosts, every client will be refused", player);
        }
        log::info!(
            "{}: listening on port {} (step {} ms)",
            player,
            listener.local_addr()?.port(),
            step
        );

        let ledger = QuotaLedger::new(
            player,
            step,
            config.quota.team_quota_bytes,
            config.quota.team_size,
            store,
        );

        Ok(Self {
            player,
            basic_time_step_ms: step,
            benchmark: config.benchmark.clone(),
            listener,
            allow_list: AllowList::new(config.network.allowed_hosts.iter().cloned()),
            resolver: Box::new(ReverseDnsResolver),
            connection: None,
            decoder: FrameDecoder::with_max_len(config.network.max_frame_bytes),
            read_buffer: vec![0; READ_CHUNK],
            applier: ActuatorCommandApplier::new(step),
            sensors: EnabledSensorSet::new(),
            sampler: SensorSampler::new(),
            batch: MeasurementBatch::new(),
            ledger,
            time_ms: 0,
        })
    }

    /// Replace the reverse DNS lookup used for access control
    pub fn with_resolver(mut self, resolver: Box<dyn HostResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Simulated time of the next batch
    pub fn time_ms(&self) -> u32 {
        self.time_ms
    }

    pub fn sensors(&self) -> &EnabledSensorSet {
        &self.sensors
    }

    /// Run one cycle.
    ///
    /// Without a client this only tries to accept one. With a client it
    /// applies every complete inbound frame, then sends one batch.
    pub fn step(&mut self, registry: &mut dyn DeviceRegistry, real_time_ms: u64) {
        if self.connection.is_none() {
            self.accept();
            return;
        }

        let start = Instant::now();
        let readable = self.poll_readable();
        let after_select = Instant::now();
        if readable {
            self.receive(registry);
        }
        let after_receive = Instant::now();
        if self.connection.is_none() {
            return;
        }

        self.batch.stamp(self.time_ms, real_time_ms);
        self.sampler
            .build(registry, &mut self.sensors, self.time_ms, &mut self.batch);
        let after_prepare = Instant::now();

        self.send();
        let after_send = Instant::now();
        self.time_ms = self.time_ms.wrapping_add(self.basic_time_step_ms);

        self.report_timing(&PhaseTimes {
            start,
            after_select,
            after_receive,
            after_prepare,
            after_send,
        });
    }

    // ========================================================================
    // Connection state
    // ========================================================================

    fn accept(&mut self) {
        match self
            .listener
            .accept_if_available(&self.allow_list, self.resolver.as_ref())
        {
            Ok(Some(connection)) => {
                log::info!("{}: client {} connected", self.player, connection.peer());
                self.connection = Some(connection);
                self.time_ms = 0;
            }
            Ok(None) => {}
            Err(e) => log::warn!("{}: accept failed: {}", self.player, e),
        }
    }

    /// Drop the client and everything tied to it. Enabled sensors stay.
    fn disconnect(&mut self, reason: &str) {
        log::info!("{}: {}", self.player, reason);
        self.connection = None;
        self.decoder.reset();
        self.batch.reset();
    }

    fn poll_readable(&mut self) -> bool {
        let Some(connection) = self.connection.as_ref() else {
            return false;
        };
        match connection.poll_readable() {
            Ok(readable) => readable,
            Err(e) => {
                self.disconnect(&format!("Unexpected failure while polling: {}", e));
                false
            }
        }
    }

    // ========================================================================
    // Receive
    // ========================================================================

    /// Read until the socket is drained, applying each complete frame
    fn receive(&mut self, registry: &mut dyn DeviceRegistry) {
        loop {
            let Some(connection) = self.connection.as_mut() else {
                return;
            };
            let n = match connection.read_available(&mut self.read_buffer) {
                Ok(ReadOutcome::Data(n)) => n,
                Ok(ReadOutcome::Empty) => return,
                Ok(ReadOutcome::Disconnected) => {
                    self.disconnect("Client disconnected");
                    return;
                }
                Err(e) => {
                    self.disconnect(&format!("Unexpected failure while receiving data: {}", e));
                    return;
                }
            };

            let mut offset = 0;
            while offset < n {
                let step = match self.decoder.decode_step(&self.read_buffer[offset..n]) {
                    Ok(step) => step,
                    Err(e) => {
                        self.disconnect(&format!("Dropping client: {}", e));
                        return;
                    }
                };
                offset += step.consumed;
                match step.frame {
                    Some(payload) => self.applier.apply_payload(
                        &payload,
                        registry,
                        &mut self.sensors,
                        &mut self.sampler,
                        &mut self.batch,
                    ),
                    None if step.consumed == 0 => break,
                    None => {}
                }
            }
        }
    }

    // ========================================================================
    // Send
    // ========================================================================

    /// Quota-check the batch, send it and start a fresh one
    fn send(&mut self) {
        let slot = self.ledger.slot_index(self.time_ms);
        let mut size = wire::measurements_len(self.batch.measurements());

        let total = self.record_usage(size, slot);
        if self.ledger.exceeds(total) {
            log::warn!(
                "{}: Quota exceeded ({} bytes sent by the team in the last second)",
                self.player,
                total
            );
            self.batch.clear_records();
            self.batch.error(self.ledger.overrun_message());
            size = wire::measurements_len(self.batch.measurements());
            self.record_usage(size, slot);
        }

        log::debug!("{}: Sending a message of size: {}", self.player, size);
        let frame = wire::encode_measurements_frame(self.batch.measurements());
        self.batch.reset();

        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("{}: cannot serialize batch: {}", self.player, e);
                return;
            }
        };
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        if !connection.write_all(&frame) {
            self.disconnect("Unexpected failure while sending data");
        }
    }

    fn record_usage(&mut self, size: usize, slot: usize) -> u64 {
        match self.ledger.record_and_check(size as u64, slot) {
            Ok(total) => total,
            Err(e) => {
                log::warn!("{}: cannot publish quota window: {}", self.player, e);
                self.ledger.team_total()
            }
        }
    }

    // ========================================================================
    // Benchmark
    // ========================================================================

    fn report_timing(&self, t: &PhaseTimes) {
        for (level, line) in timing_report(&self.player, &self.benchmark, t) {
            log::log!(level, "{}", line);
        }
    }
}

/// Lines logged for one connected step, with their log level.
///
/// Over-budget steps are reported in full at warn level unless benchmarking
/// is off.
fn timing_report(
    player: &PlayerConfig,
    benchmark: &BenchmarkConfig,
    t: &PhaseTimes,
) -> Vec<(log::Level, String)> {
    let level = benchmark.level;
    if level == 0 {
        return Vec::new();
    }

    let step_ms = elapsed_ms(t.start, t.after_send);
    let over_budget = step_ms > benchmark.budget_ms;
    let log_level = if over_budget {
        log::Level::Warn
    } else {
        log::Level::Info
    };

    let mut lines = Vec::new();
    if level >= 3 || over_budget {
        let phases = [
            ("Select", t.start, t.after_select),
            ("Receive", t.after_select, t.after_receive),
            ("Prepare", t.after_receive, t.after_prepare),
            ("Send", t.after_prepare, t.after_send),
        ];
        for (phase, from, to) in phases {
            lines.push((
                log_level,
                format!("{}: \t{} time {:.3} ms", player, phase, elapsed_ms(from, to)),
            ));
        }
    }
    if level >= 2 || over_budget {
        lines.push((log_level, format!("{}: Step time: {:.3} ms", player, step_ms)));
    }
    lines
}

fn elapsed_ms(from: Instant, to: Instant) -> f64 {
    to.duration_since(from).as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::mock::{SimulatedRobot, SimulationConfig};
    use crate::quota::MemoryQuotaStore;

    fn config() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.network.port = 0;
        config.network.allowed_hosts = vec!["trusted".to_string()];
        config.benchmark.level = 0;
        config
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = config();
        config.timing.basic_time_step_ms = 0;
        assert!(PlayerServer::new(&config, Box::new(MemoryQuotaStore::new())).is_err());
    }

    #[test]
    fn test_step_without_client_is_idle() {
        let mut server = PlayerServer::new(&config(), Box::new(MemoryQuotaStore::new())).unwrap();
        let mut robot = SimulatedRobot::humanoid(SimulationConfig::default());

        for _ in 0..10 {
            server.step(&mut robot, 0);
        }
        assert!(!server.is_connected());
        assert_eq!(server.time_ms(), 0);
        assert_ne!(server.local_addr().unwrap().port(), 0);
    }

    fn phases(each_ms: u64) -> PhaseTimes {
        let start = Instant::now();
        let at = |n: u64| start + Duration::from_millis(each_ms * n);
        PhaseTimes {
            start,
            after_select: at(1),
            after_receive: at(2),
            after_prepare: at(3),
            after_send: at(4),
        }
    }

    fn benchmark(level: u8, budget_ms: f64) -> BenchmarkConfig {
        BenchmarkConfig { level, budget_ms }
    }

    #[test]
    fn test_timing_report_levels() {
        let player = PlayerConfig::from_robot_name("red player 2").unwrap();
        let fast = phases(0);

        assert!(timing_report(&player, &benchmark(1, 1.0), &fast).is_empty());

        let step_only = timing_report(&player, &benchmark(2, 1.0), &fast);
        assert_eq!(step_only.len(), 1);
        assert_eq!(step_only[0].0, log::Level::Info);
        assert!(step_only[0].1.starts_with("RED 2: Step time: "));

        let full = timing_report(&player, &benchmark(3, 1.0), &fast);
        let texts: Vec<&str> = full.iter().map(|(_, line)| line.as_str()).collect();
        assert_eq!(texts.len(), 5);
        assert!(texts[0].starts_with("RED 2: \tSelect time "));
        assert!(texts[1].starts_with("RED 2: \tReceive time "));
        assert!(texts[2].starts_with("RED 2: \tPrepare time "));
        assert!(texts[3].starts_with("RED 2: \tSend time "));
        assert!(texts[4].starts_with("RED 2: Step time: "));
        assert!(full.iter().all(|(level, _)| *level == log::Level::Info));
    }

    #[test]
    fn test_timing_report_over_budget() {
        let player = PlayerConfig::from_robot_name("blue player 1").unwrap();
        let slow = phases(1);

        let report = timing_report(&player, &benchmark(1, 1.0), &slow);
        assert_eq!(report.len(), 5);
        assert!(report.iter().all(|(level, _)| *level == log::Level::Warn));
        assert_eq!(report[4].1, "BLUE 1: Step time: 4.000 ms");
        assert_eq!(report[0].1, "BLUE 1: \tSelect time 1.000 ms");

        assert!(timing_report(&player, &benchmark(0, 1.0), &slow).is_empty());
    }
}
