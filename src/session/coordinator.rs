//! Session coordinator: handshake sequencing, dual-tier timeouts, response
//! routing and fix gating
//!
//! The coordinator is the protocol state machine between the operator
//! station and the submerged transponder. A 1 Hz tick drives polling and
//! timeout bookkeeping; inbound sentences from the transport drive response
//! handling. Both paths mutate the same state and must reach the
//! coordinator through a single owner (see [`crate::session::runner`]).
//!
//! Timeouts come in two tiers. Every outbound command waits a couple of
//! ticks for the device's own acknowledgement; a command that crosses the
//! acoustic link additionally waits an order of magnitude longer for the
//! remote response. A timed-out request is simply abandoned: the tick
//! sequencing re-issues whatever step is still unconfirmed, which yields
//! retry-by-re-poll without explicit retry counters.

use crate::algorithms::locator::VlblLocator;
use crate::core::aging::AgingValue;
use crate::core::constants::{LOCAL_TIMEOUT_TICKS, REMOTE_TIMEOUT_TICKS};
use crate::core::types::{BasePoint, BestFix, GeoPoint, LocalizationResult, MeasurementRecord, Track};
use crate::hardware::transport::Transport;
use crate::hardware::LinkResult;
use crate::processing::codec::{DeviceError, DeviceInfo, RemoteCommand, Sentence, SentenceCodec};
use crate::processing::sound_speed::SoundSpeedEstimator;
use crate::session::sink::Sink;
use crate::session::state::{PendingRequest, SessionState};
use crate::tracking::buffer::MeasurementBuffer;
use crate::tracking::fix::FixTracker;
use crate::utils::config::AppConfig;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Values the coordinator needs from the application configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub salinity_psu: f64,
    pub target_addr: u8,
    pub radial_error_threshold_m: f64,
    pub local_timeout_ticks: u64,
    pub remote_timeout_ticks: u64,
    pub measurements_fifo_size: usize,
    pub base_size: usize,
    /// Emit synthesized RMC/GGA sentences for every fix
    pub gnss_emulation: bool,
    /// Shelf life of instrument readings
    pub reading_max_age: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            salinity_psu: 0.0,
            target_addr: 0,
            radial_error_threshold_m: 25.0,
            local_timeout_ticks: LOCAL_TIMEOUT_TICKS,
            remote_timeout_ticks: REMOTE_TIMEOUT_TICKS,
            measurements_fifo_size: 100,
            base_size: 5,
            gnss_emulation: false,
            reading_max_age: Duration::from_secs(10),
        }
    }
}

impl From<&AppConfig> for SessionConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            salinity_psu: config.salinity_psu,
            target_addr: config.target_addr,
            radial_error_threshold_m: config.radial_error_threshold_m,
            local_timeout_ticks: config.local_timeout_ticks,
            remote_timeout_ticks: config.remote_timeout_ticks,
            measurements_fifo_size: config.measurements_fifo_size,
            base_size: config.base_size,
            gnss_emulation: config.gnss_emulation,
            ..Default::default()
        }
    }
}

/// Protocol state machine coordinating the device session
pub struct SessionCoordinator {
    config: SessionConfig,
    transport: Box<dyn Transport>,
    sink: Box<dyn Sink>,
    codec: SentenceCodec,
    locator: VlblLocator,

    state: SessionState,
    tick: u64,
    local_pending: Option<PendingRequest>,
    remote_pending: Option<PendingRequest>,
    autoquery: bool,
    autosnapshot: bool,
    device_info: Option<DeviceInfo>,

    // Surface-vessel readings
    boat_latitude: AgingValue<f64>,
    boat_longitude: AgingValue<f64>,
    boat_temperature: AgingValue<f64>,
    boat_depth: AgingValue<f64>,
    boat_pressure: AgingValue<f64>,
    boat_voltage: AgingValue<f64>,

    // Target-side readings
    target_temperature: AgingValue<f64>,
    target_depth: AgingValue<f64>,
    target_latitude: AgingValue<f64>,
    target_longitude: AgingValue<f64>,
    target_radial_error: AgingValue<f64>,

    sound_speed: SoundSpeedEstimator,
    buffer: MeasurementBuffer,
    fixes: FixTracker,
}

impl SessionCoordinator {
    pub fn new(config: SessionConfig, transport: Box<dyn Transport>, sink: Box<dyn Sink>) -> Self {
        let age = config.reading_max_age;
        let buffer = MeasurementBuffer::new(config.measurements_fifo_size, config.base_size);
        Self {
            transport,
            sink,
            codec: SentenceCodec::new(),
            locator: VlblLocator::new(),
            state: SessionState::Disconnected,
            tick: 0,
            local_pending: None,
            remote_pending: None,
            autoquery: false,
            autosnapshot: false,
            device_info: None,
            boat_latitude: AgingValue::new(age),
            boat_longitude: AgingValue::new(age),
            boat_temperature: AgingValue::new(age),
            boat_depth: AgingValue::new(age),
            boat_pressure: AgingValue::new(age),
            boat_voltage: AgingValue::new(age),
            target_temperature: AgingValue::new(age),
            target_depth: AgingValue::new(age),
            target_latitude: AgingValue::new(age),
            target_longitude: AgingValue::new(age),
            target_radial_error: AgingValue::new(age),
            sound_speed: SoundSpeedEstimator::new(),
            buffer,
            fixes: FixTracker::new(),
            config,
        }
    }

    /// Open the link and restart the handshake from scratch
    ///
    /// AgingValues deliberately survive a reopen: stale readings stay on
    /// display until the next refresh.
    pub fn open(&mut self) -> LinkResult<()> {
        self.transport.open()?;
        self.state = SessionState::AwaitingDeviceInfo;
        self.local_pending = None;
        self.remote_pending = None;
        self.device_info = None;
        info!(port = %self.transport.name(), "connected");
        Ok(())
    }

    /// Close the link; pending requests are discarded, not timed out
    pub fn close(&mut self) {
        self.transport.close();
        self.state = SessionState::Disconnected;
        self.local_pending = None;
        self.remote_pending = None;
        self.autoquery = false;
        info!("disconnected");
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state != SessionState::Disconnected
    }

    pub fn autoquery(&self) -> bool {
        self.autoquery
    }

    pub fn set_autoquery(&mut self, enabled: bool) {
        self.autoquery = enabled;
    }

    pub fn set_autosnapshot(&mut self, enabled: bool) {
        self.autosnapshot = enabled;
    }

    pub fn has_local_pending(&self) -> bool {
        self.local_pending.is_some()
    }

    pub fn has_remote_pending(&self) -> bool {
        self.remote_pending.is_some()
    }

    pub fn best_fix(&self) -> BestFix {
        *self.fixes.best()
    }

    pub fn target_track(&self) -> &[LocalizationResult] {
        self.fixes.target_track()
    }

    pub fn measurement_history(&self) -> Vec<MeasurementRecord> {
        self.buffer.measurements().copied().collect()
    }

    /// Last surface position, regardless of freshness
    pub fn boat_position(&self) -> Option<GeoPoint> {
        match (self.boat_latitude.value(), self.boat_longitude.value()) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        }
    }

    pub fn sound_speed(&self) -> f64 {
        self.sound_speed.speed()
    }

    /// Modem supply voltage from the last ambient push
    pub fn battery_voltage(&self) -> Option<f64> {
        self.boat_voltage.value()
    }

    /// Last reported target depth
    pub fn target_depth(&self) -> Option<f64> {
        self.target_depth.value()
    }

    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.device_info.as_ref()
    }

    /// Drain the transport, handling every complete inbound sentence
    ///
    /// A link failure while polling forces the session closed.
    pub fn pump(&mut self) -> usize {
        if !self.transport.is_open() {
            return 0;
        }
        let mut handled = 0;
        loop {
            match self.transport.poll() {
                Ok(Some(raw)) => {
                    self.handle_raw(&raw);
                    handled += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "link failure while polling");
                    self.close();
                    break;
                }
            }
        }
        handled
    }

    /// One step of the 1 Hz schedule: timeout bookkeeping first, then the
    /// handshake/autoquery sequence when nothing is outstanding
    pub fn handle_tick(&mut self) {
        if self.state == SessionState::Disconnected {
            return;
        }
        self.tick += 1;

        if let Some(pending) = &self.local_pending {
            if pending.elapsed(self.tick) > self.config.local_timeout_ticks {
                warn!(query = %pending.description, "local ack timeout");
                self.local_pending = None;
            }
        } else if let Some(pending) = &self.remote_pending {
            if pending.elapsed(self.tick) > self.config.remote_timeout_ticks {
                warn!(
                    addr = self.config.target_addr,
                    query = %pending.description,
                    "remote response timeout"
                );
                self.remote_pending = None;
            }
        } else {
            self.advance_sequence();
        }
    }

    /// Parse and route one inbound sentence; malformed input is logged and
    /// dropped without touching session state
    pub fn handle_raw(&mut self, raw: &[u8]) {
        let text = String::from_utf8_lossy(raw);
        let text = text.trim_end();
        debug!(rx = %text, "received");
        match self.codec.parse(text) {
            Ok(sentence) => self.dispatch(sentence),
            Err(e) => warn!(error = %e, sentence = %text, "discarding malformed sentence"),
        }
    }

    fn dispatch(&mut self, sentence: Sentence) {
        match sentence {
            Sentence::Ack { cmd_id, error } => self.on_ack(cmd_id, error),
            Sentence::DeviceInfo(info) => self.on_device_info(info),
            Sentence::RemoteResponse {
                command,
                propagation_time_s,
                snr_db,
                value,
                ..
            } => self.on_remote_response(command, propagation_time_s, snr_db, value),
            Sentence::RemoteTimeout { command } => self.on_remote_timeout_notice(command),
            Sentence::AmbientData {
                pressure_mbar,
                temperature_c,
                depth_m,
                voltage_v,
            } => self.on_ambient(pressure_mbar, temperature_c, depth_m, voltage_v),
            Sentence::GnssRmc {
                latitude,
                longitude,
                valid,
            } => self.on_gnss(latitude, longitude, valid),
            Sentence::Unsupported => debug!("ignoring unsupported sentence"),
        }
    }

    /// Issue the next step of the handshake, or an autonomous ranging query
    /// once the session is ready
    fn advance_sequence(&mut self) {
        match self.state {
            SessionState::Disconnected => {}
            SessionState::AwaitingDeviceInfo => {
                let msg = self.codec.build_device_info_query();
                self.try_send(msg, "Device info query".to_string(), None);
            }
            SessionState::AwaitingSettingsAck => {
                let msg = self.codec.build_settings_update(0, 0, self.config.salinity_psu);
                self.try_send(msg, "Settings update".to_string(), None);
            }
            SessionState::AwaitingAmbientConfigAck => {
                let msg = self.codec.build_ambient_config();
                self.try_send(msg, "Ambient data config".to_string(), None);
            }
            SessionState::Ready => {
                if !self.autoquery {
                    return;
                }
                // Refresh the target temperature when it has gone stale,
                // otherwise keep polling depth
                let command = if !self.target_temperature.is_fresh() {
                    RemoteCommand::TemperatureGet
                } else {
                    RemoteCommand::DepthGet
                };
                let msg = self.codec.build_remote_request(self.config.target_addr, command);
                let description = format!("SUB #{} {}", self.config.target_addr, command);
                self.try_send(msg, description, Some(command));
            }
        }
    }

    /// Send one sentence and arm the matching timeout tier(s)
    ///
    /// The scheduler only reaches this with both tiers idle, so overlapping
    /// requests cannot be issued.
    fn try_send(&mut self, sentence: String, description: String, remote: Option<RemoteCommand>) {
        if let Err(e) = self.transport.send(sentence.as_bytes()) {
            error!(error = %e, "send failed, closing session");
            self.close();
            return;
        }
        debug!(tx = %sentence.trim_end(), query = %description, "sent");
        if let Some(command) = remote {
            self.remote_pending = Some(PendingRequest {
                command: Some(command),
                sent_at_tick: self.tick,
                is_remote: true,
                description: description.clone(),
            });
        }
        self.local_pending = Some(PendingRequest {
            command: None,
            sent_at_tick: self.tick,
            is_remote: false,
            description,
        });
    }

    /// Local acknowledgement: completes the local tier and advances the
    /// handshake purely by counting acks, a quirk of the wire format (acks
    /// do not echo which command they answer)
    fn on_ack(&mut self, cmd_id: u8, device_error: DeviceError) {
        self.local_pending = None;
        info!(cmd = cmd_id, status = %device_error, "ack");
        match self.state {
            SessionState::AwaitingSettingsAck => {
                self.state = SessionState::AwaitingAmbientConfigAck;
                info!(state = %self.state, "settings confirmed");
            }
            SessionState::AwaitingAmbientConfigAck => {
                self.state = SessionState::Ready;
                info!(state = %self.state, "ambient config confirmed");
            }
            _ => {}
        }
    }

    fn on_device_info(&mut self, device_info: DeviceInfo) {
        self.local_pending = None;
        info!(
            system = %device_info.system_moniker,
            version = %DeviceInfo::version_to_string(device_info.system_version),
            "device info"
        );
        self.device_info = Some(device_info);
        if self.state == SessionState::AwaitingDeviceInfo {
            self.state = SessionState::AwaitingSettingsAck;
        }
    }

    /// Device-side notification that the acoustic response never came
    fn on_remote_timeout_notice(&mut self, command: RemoteCommand) {
        warn!(addr = self.config.target_addr, command = %command, "remote timeout");
        self.remote_pending = None;
    }

    /// Asynchronous ambient telemetry push; also drives the sound-speed
    /// estimate
    fn on_ambient(
        &mut self,
        pressure_mbar: Option<f64>,
        temperature_c: Option<f64>,
        depth_m: Option<f64>,
        voltage_v: Option<f64>,
    ) {
        if let Some(pressure) = pressure_mbar {
            self.boat_pressure.set(pressure);
        }
        if let Some(temperature) = temperature_c {
            self.boat_temperature.set(temperature);
        }
        if let Some(depth) = depth_m {
            self.boat_depth.set(depth);
        }
        if let Some(voltage) = voltage_v {
            self.boat_voltage.set(voltage);
        }
        if self.sound_speed.update(
            &self.boat_temperature,
            &self.boat_pressure,
            self.config.salinity_psu,
        ) {
            debug!(speed = self.sound_speed.speed(), "sound speed updated");
        }
    }

    /// Surface GNSS position from the navigation receiver
    fn on_gnss(&mut self, latitude: f64, longitude: f64, valid: bool) {
        if !valid {
            debug!("ignoring void GNSS fix");
            return;
        }
        self.boat_latitude.set(latitude);
        self.boat_longitude.set(longitude);
        self.sink.update_track(Track::Boat, latitude, longitude);
    }

    /// Acoustic response: convert travel time to range, absorb any carried
    /// reading, and feed the measurement pipeline
    fn on_remote_response(
        &mut self,
        command: RemoteCommand,
        propagation_time_s: f64,
        snr_db: f64,
        value: Option<f64>,
    ) {
        self.remote_pending = None;
        let slant_range = self.sound_speed.slant_range(propagation_time_s);
        match command {
            RemoteCommand::TemperatureGet => {
                if let Some(v) = value {
                    self.target_temperature.set(v);
                }
            }
            RemoteCommand::DepthGet => {
                if let Some(v) = value {
                    self.target_depth.set(v);
                }
            }
            _ => {}
        }
        info!(command = %command, slant_range, snr = snr_db, "remote response");

        let boat = match (self.boat_latitude.value(), self.boat_longitude.value()) {
            (Some(lat), Some(lon))
                if !self.boat_latitude.is_obsolete() && !self.boat_longitude.is_obsolete() =>
            {
                Some((lat, lon))
            }
            _ => None,
        };
        if let Some((latitude, longitude)) = boat {
            self.record_measurement(latitude, longitude, slant_range, snr_db);
        }

        let status = self.render_status(propagation_time_s, slant_range, snr_db);
        self.sink.status_text(&status);
        if self.autosnapshot {
            self.sink.snapshot();
        }
    }

    /// Store the measurement, then either attempt a fix or keep refining the
    /// centroid reference point, depending on baseline diversity
    fn record_measurement(&mut self, latitude: f64, longitude: f64, slant_range: f64, snr_db: f64) {
        self.buffer.add_measurement(MeasurementRecord {
            latitude,
            longitude,
            slant_range,
            signal_to_noise: snr_db,
            depth: self.boat_depth.value().unwrap_or(f64::NAN),
        });
        self.buffer.add_base_point(BasePoint {
            latitude,
            longitude,
            slant_range,
        });
        self.sink.update_track(Track::Measurements, latitude, longitude);

        if self.buffer.has_sufficient_base() {
            if let (Some(depth), Some(reference)) =
                (self.target_depth.value(), self.buffer.reference_point())
            {
                self.attempt_fix(depth, reference);
                return;
            }
        }
        self.fixes.refine_reference_from_centroid(&mut self.buffer);
    }

    fn attempt_fix(&mut self, depth: f64, reference: GeoPoint) {
        let base_points = self.buffer.base_points();
        let base_geo: Vec<GeoPoint> = base_points
            .iter()
            .map(|b| GeoPoint::new(b.latitude, b.longitude))
            .collect();
        self.sink.replace_track(Track::Base, &base_geo);

        let solve = self.locator.locate(
            &base_points,
            reference,
            depth,
            self.config.radial_error_threshold_m,
        );
        match solve {
            Ok((result, iterations)) => {
                debug!(
                    iterations,
                    radial_error = result.radial_error,
                    "solver converged"
                );
                self.target_latitude.set(result.latitude);
                self.target_longitude.set(result.longitude);
                self.target_radial_error.set(result.radial_error);
                self.sink.update_track(Track::Target, result.latitude, result.longitude);

                if self.config.gnss_emulation {
                    let sentences = format!(
                        "{}{}",
                        self.codec.build_rmc(result.latitude, result.longitude),
                        self.codec.build_gga(
                            result.latitude,
                            result.longitude,
                            result.radial_error,
                            depth,
                            base_points.len(),
                        )
                    );
                    self.sink.gnss_sentences(&sentences);
                }

                if self.fixes.offer(result, &mut self.buffer) {
                    let best = *self.fixes.best();
                    info!(radial_error = best.radial_error, "best fix improved");
                    self.sink.update_track(Track::Best, best.latitude, best.longitude);
                }
            }
            // A failed solve is a no-op for this cycle; the next response
            // tries again
            Err(e) => warn!(error = %e, "solver failed"),
        }
    }

    fn render_status(&self, propagation_time_s: f64, slant_range: f64, snr_db: f64) -> String {
        let mut text = format!(
            "BOAT\nLAT: {}\nLON: {}\nDPT: {}\nTMP: {}\nPTM: {:.4} s\n\nTARGET\nDST: {:.2} m\nSNR: {:.1} dB\n",
            self.boat_latitude.format(6, "°"),
            self.boat_longitude.format(6, "°"),
            self.boat_depth.format(3, " m"),
            self.boat_temperature.format(1, "°C"),
            propagation_time_s,
            slant_range,
            snr_db,
        );
        if self.target_depth.is_fresh() {
            text.push_str(&format!("DPT: {}\n", self.target_depth.format(2, " m")));
        }
        if self.target_temperature.is_fresh() {
            text.push_str(&format!("TMP: {}\n", self.target_temperature.format(1, "°C")));
        }
        if self.target_latitude.is_fresh() && self.target_longitude.is_fresh() {
            text.push_str(&format!(
                "LAT: {}\nLON: {}\n",
                self.target_latitude.format(6, "°"),
                self.target_longitude.format(6, "°")
            ));
        }
        if self.target_radial_error.is_fresh() {
            text.push_str(&format!("RER: {}\n", self.target_radial_error.format(3, " m")));
        }
        let best = *self.fixes.best();
        if best.is_known() {
            text.push_str(&format!("BRE: {:.3}\n", best.radial_error));
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::geo;
    use crate::hardware::mock::MockTransport;
    use crate::session::sink::RecordingSink;
    use nalgebra::Vector2;

    fn framed(payload: &str) -> String {
        let checksum = payload.bytes().fold(0u8, |acc, b| acc ^ b);
        format!("${}*{:02X}\r\n", payload, checksum)
    }

    fn test_config() -> SessionConfig {
        SessionConfig {
            target_addr: 1,
            radial_error_threshold_m: 0.01,
            reading_max_age: Duration::from_secs(60),
            ..Default::default()
        }
    }

    fn coordinator() -> (SessionCoordinator, MockTransport, RecordingSink) {
        let transport = MockTransport::new();
        let sink = RecordingSink::new();
        let coordinator = SessionCoordinator::new(
            test_config(),
            Box::new(transport.clone()),
            Box::new(sink.clone()),
        );
        (coordinator, transport, sink)
    }

    /// Drive the full handshake to `Ready` and clear the sent log
    fn handshake(coordinator: &mut SessionCoordinator, transport: &MockTransport) {
        coordinator.open().unwrap();
        coordinator.handle_tick();
        coordinator.handle_raw(framed("PUWV!,SYS,258,CORE,513,78.0,0,0,28,0.0,1,1").as_bytes());
        coordinator.handle_tick();
        coordinator.handle_raw(framed("PUWV0,1,0").as_bytes());
        coordinator.handle_tick();
        coordinator.handle_raw(framed("PUWV0,6,0").as_bytes());
        assert_eq!(coordinator.state(), SessionState::Ready);
        transport.clear_sent();
    }

    fn feed_boat_position(coordinator: &mut SessionCoordinator, latitude: f64, longitude: f64) {
        let rmc = SentenceCodec::new().build_rmc(latitude, longitude);
        coordinator.handle_raw(rmc.as_bytes());
    }

    fn remote_response(command: RemoteCommand, propagation_time_s: f64, value: f64) -> String {
        framed(&format!(
            "PUWV3,0,{},{:.9},{:.1},{:.3}",
            command.code(),
            propagation_time_s,
            20.0,
            value
        ))
    }

    #[test]
    fn test_handshake_walks_all_states() {
        let (mut coordinator, transport, _) = coordinator();
        assert_eq!(coordinator.state(), SessionState::Disconnected);

        coordinator.open().unwrap();
        assert_eq!(coordinator.state(), SessionState::AwaitingDeviceInfo);

        coordinator.handle_tick();
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("$PUWV?,"), "sent = {:?}", sent);
        assert!(coordinator.has_local_pending());

        coordinator.handle_raw(framed("PUWV!,SYS,258,CORE,513,78.0,0,0,28,0.0,1,1").as_bytes());
        assert_eq!(coordinator.state(), SessionState::AwaitingSettingsAck);
        assert!(!coordinator.has_local_pending());
        assert!(coordinator.device_info().is_some());

        coordinator.handle_tick();
        assert!(transport.sent()[1].starts_with("$PUWV1,"));

        coordinator.handle_raw(framed("PUWV0,1,0").as_bytes());
        assert_eq!(coordinator.state(), SessionState::AwaitingAmbientConfigAck);

        coordinator.handle_tick();
        assert!(transport.sent()[2].starts_with("$PUWV6,"));

        coordinator.handle_raw(framed("PUWV0,6,0").as_bytes());
        assert_eq!(coordinator.state(), SessionState::Ready);

        // No ranging query was ever issued during the handshake
        assert!(transport.sent().iter().all(|s| !s.starts_with("$PUWV2")));

        // Ready without autoquery stays silent
        coordinator.handle_tick();
        assert_eq!(transport.sent().len(), 3);
    }

    #[test]
    fn test_ack_before_device_info_does_not_advance() {
        let (mut coordinator, _, _) = coordinator();
        coordinator.open().unwrap();
        coordinator.handle_raw(framed("PUWV0,1,0").as_bytes());
        assert_eq!(coordinator.state(), SessionState::AwaitingDeviceInfo);
    }

    #[test]
    fn test_local_timeout_triggers_re_poll() {
        let (mut coordinator, transport, _) = coordinator();
        coordinator.open().unwrap();

        coordinator.handle_tick(); // sends device info query
        assert!(coordinator.has_local_pending());
        coordinator.handle_tick(); // elapsed 1
        coordinator.handle_tick(); // elapsed 2
        assert!(coordinator.has_local_pending());
        coordinator.handle_tick(); // elapsed 3 > 2: timeout fires
        assert!(!coordinator.has_local_pending());

        coordinator.handle_tick(); // sequence re-issues the same query
        let queries = transport
            .sent()
            .iter()
            .filter(|s| s.starts_with("$PUWV?"))
            .count();
        assert_eq!(queries, 2);
    }

    #[test]
    fn test_autoquery_prefers_temperature_then_depth() {
        let (mut coordinator, transport, _) = coordinator();
        handshake(&mut coordinator, &transport);
        coordinator.set_autoquery(true);

        // Target temperature unknown: temperature first
        coordinator.handle_tick();
        assert!(transport.sent()[0].starts_with("$PUWV2,1,3*"), "sent = {:?}", transport.sent());
        coordinator.handle_raw(framed("PUWV0,2,0").as_bytes());
        coordinator.handle_raw(remote_response(RemoteCommand::TemperatureGet, 0.001, 8.5).as_bytes());

        // Temperature now fresh: depth next
        coordinator.handle_tick();
        assert!(transport.sent()[1].starts_with("$PUWV2,1,2*"), "sent = {:?}", transport.sent());
    }

    #[test]
    fn test_dual_timeout_independence() {
        let (mut coordinator, transport, _) = coordinator();
        handshake(&mut coordinator, &transport);
        coordinator.set_autoquery(true);

        coordinator.handle_tick(); // remote request, both tiers armed
        assert!(coordinator.has_local_pending());
        assert!(coordinator.has_remote_pending());

        // Local ack clears only the local tier
        coordinator.handle_raw(framed("PUWV0,2,0").as_bytes());
        assert!(!coordinator.has_local_pending());
        assert!(coordinator.has_remote_pending());

        // Remote tier holds until its own (longer) threshold passes; the
        // scheduler must not issue another request meanwhile
        coordinator.handle_tick();
        coordinator.handle_tick();
        coordinator.handle_tick();
        assert!(coordinator.has_remote_pending());
        assert_eq!(transport.sent().len(), 1);
        coordinator.handle_tick(); // elapsed 4 > 3: remote timeout
        assert!(!coordinator.has_remote_pending());

        // Next tick re-issues a ranging query
        coordinator.handle_tick();
        assert_eq!(transport.sent().len(), 2);
    }

    #[test]
    fn test_remote_timeout_notice_clears_remote_tier() {
        let (mut coordinator, transport, _) = coordinator();
        handshake(&mut coordinator, &transport);
        coordinator.set_autoquery(true);
        coordinator.handle_tick();
        coordinator.handle_raw(framed("PUWV0,2,0").as_bytes());
        assert!(coordinator.has_remote_pending());

        coordinator.handle_raw(framed("PUWV4,3").as_bytes());
        assert!(!coordinator.has_remote_pending());
    }

    #[test]
    fn test_ambient_data_drives_sound_speed() {
        let (mut coordinator, transport, _) = coordinator();
        handshake(&mut coordinator, &transport);
        assert_eq!(coordinator.sound_speed(), 1500.0);

        // Pressure alone is not enough
        coordinator.handle_raw(framed("PUWV7,1013.3,,,").as_bytes());
        assert_eq!(coordinator.sound_speed(), 1500.0);

        // Temperature completes the pair
        coordinator.handle_raw(framed("PUWV7,,13.0,0.5,12.1").as_bytes());
        let speed = coordinator.sound_speed();
        assert!(speed > 1400.0 && speed < 1600.0);
        assert_ne!(speed, 1500.0);
        assert_eq!(coordinator.battery_voltage(), Some(12.1));
    }

    #[test]
    fn test_slant_range_from_travel_time() {
        let (mut coordinator, transport, _) = coordinator();
        handshake(&mut coordinator, &transport);
        feed_boat_position(&mut coordinator, 48.5, 44.5);
        coordinator.set_autoquery(true);
        coordinator.handle_tick();
        coordinator.handle_raw(remote_response(RemoteCommand::TemperatureGet, 0.002, 8.5).as_bytes());

        let history = coordinator.measurement_history();
        assert_eq!(history.len(), 1);
        assert!((history[0].slant_range - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_no_measurement_without_surface_position() {
        let (mut coordinator, transport, sink) = coordinator();
        handshake(&mut coordinator, &transport);
        coordinator.set_autoquery(true);
        coordinator.handle_tick();
        coordinator.handle_raw(remote_response(RemoteCommand::TemperatureGet, 0.002, 8.5).as_bytes());

        assert!(coordinator.measurement_history().is_empty());
        // The status block is still rendered
        assert_eq!(sink.statuses().len(), 1);
    }

    #[test]
    fn test_end_to_end_fix_from_circular_baseline() {
        let (mut coordinator, transport, sink) = coordinator();
        handshake(&mut coordinator, &transport);
        coordinator.set_autoquery(true);

        let target = GeoPoint::new(48.5, 44.5);
        let depth = 30.0f64;
        let radius = 100.0f64;
        let slant = (radius * radius + depth * depth).sqrt();
        let propagation_time = slant / 1500.0;

        for (i, bearing) in [10.0f64, 100.0, 190.0, 280.0].iter().enumerate() {
            let rad = bearing.to_radians();
            let local = Vector2::new(radius * rad.sin(), radius * rad.cos());
            let boat = geo::to_geodetic(local, target);
            feed_boat_position(&mut coordinator, boat.latitude, boat.longitude);

            coordinator.handle_tick();
            coordinator.handle_raw(framed("PUWV0,2,0").as_bytes()); // local ack
            let command = if i == 0 {
                RemoteCommand::TemperatureGet
            } else {
                RemoteCommand::DepthGet
            };
            let value = if i == 0 { 8.5 } else { depth };
            coordinator.handle_raw(remote_response(command, propagation_time, value).as_bytes());
        }

        assert_eq!(coordinator.measurement_history().len(), 4);

        let best = coordinator.best_fix();
        assert!(best.is_known(), "no fix was produced");
        let offset = geo::to_local(GeoPoint::new(best.latitude, best.longitude), target);
        assert!(offset.norm() < 20.0, "best fix {} m off target", offset.norm());
        assert!(best.radial_error < 5.0, "radial error = {}", best.radial_error);

        // Display got boat, measurement, target and best-fix points plus a
        // status block per response
        assert_eq!(sink.track_points(Track::Boat).len(), 4);
        assert_eq!(sink.track_points(Track::Measurements).len(), 4);
        assert!(!sink.track_points(Track::Target).is_empty());
        assert!(!sink.track_points(Track::Best).is_empty());
        assert_eq!(sink.statuses().len(), 4);
        let last_status = sink.statuses().pop().unwrap();
        assert!(last_status.contains("BOAT"));
        assert!(last_status.contains("BRE:"));
    }

    #[test]
    fn test_gnss_emulation_emits_sentences() {
        let transport = MockTransport::new();
        let sink = RecordingSink::new();
        let mut config = test_config();
        config.gnss_emulation = true;
        let mut coordinator = SessionCoordinator::new(
            config,
            Box::new(transport.clone()),
            Box::new(sink.clone()),
        );
        handshake(&mut coordinator, &transport);
        coordinator.set_autoquery(true);

        let target = GeoPoint::new(48.5, 44.5);
        let depth = 30.0;
        let propagation_time = (100.0f64 * 100.0 + depth * depth).sqrt() / 1500.0;
        for (i, bearing) in [10.0f64, 100.0, 190.0, 280.0].iter().enumerate() {
            let rad = bearing.to_radians();
            let local = Vector2::new(100.0 * rad.sin(), 100.0 * rad.cos());
            let boat = geo::to_geodetic(local, target);
            feed_boat_position(&mut coordinator, boat.latitude, boat.longitude);
            coordinator.handle_tick();
            coordinator.handle_raw(framed("PUWV0,2,0").as_bytes());
            let command = if i == 0 {
                RemoteCommand::TemperatureGet
            } else {
                RemoteCommand::DepthGet
            };
            coordinator.handle_raw(
                remote_response(command, propagation_time, if i == 0 { 8.5 } else { depth })
                    .as_bytes(),
            );
        }

        let gnss = sink.gnss_output();
        assert!(!gnss.is_empty());
        assert!(gnss[0].contains("$GNRMC,"));
        assert!(gnss[0].contains("$GNGGA,"));
    }

    #[test]
    fn test_malformed_sentence_is_discarded() {
        let (mut coordinator, transport, _) = coordinator();
        handshake(&mut coordinator, &transport);
        coordinator.handle_raw(b"$PUWV0,1,0*FF\r\n");
        coordinator.handle_raw(b"garbage\r\n");
        assert_eq!(coordinator.state(), SessionState::Ready);
    }

    #[test]
    fn test_close_discards_pending_and_reopen_restarts_handshake() {
        let (mut coordinator, transport, _) = coordinator();
        handshake(&mut coordinator, &transport);
        feed_boat_position(&mut coordinator, 48.5, 44.5);
        coordinator.set_autoquery(true);
        coordinator.handle_tick();
        assert!(coordinator.has_local_pending());
        assert!(coordinator.has_remote_pending());

        coordinator.close();
        assert_eq!(coordinator.state(), SessionState::Disconnected);
        assert!(!coordinator.has_local_pending());
        assert!(!coordinator.has_remote_pending());
        assert!(!coordinator.autoquery());

        // Readings survive the reconnect for display continuity
        assert!(coordinator.boat_position().is_some());

        coordinator.open().unwrap();
        assert_eq!(coordinator.state(), SessionState::AwaitingDeviceInfo);
        transport.clear_sent();
        coordinator.handle_tick();
        assert!(transport.sent()[0].starts_with("$PUWV?,"));
    }

    #[test]
    fn test_send_failure_forces_disconnect() {
        let (mut coordinator, transport, _) = coordinator();
        coordinator.open().unwrap();
        transport.fail_next_send();
        coordinator.handle_tick();
        assert_eq!(coordinator.state(), SessionState::Disconnected);
        assert!(!coordinator.has_local_pending());
    }

    #[test]
    fn test_open_failure_stays_disconnected() {
        let (mut coordinator, transport, _) = coordinator();
        transport.fail_next_open();
        assert!(coordinator.open().is_err());
        assert_eq!(coordinator.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_pump_handles_queued_sentences() {
        let (mut coordinator, transport, _) = coordinator();
        coordinator.open().unwrap();
        coordinator.handle_tick();
        transport.push_inbound(&framed("PUWV!,SYS,258,CORE,513,78.0,0,0,28,0.0,1,1"));
        transport.push_inbound(&framed("PUWV7,1013.3,13.0,0.5,12.1"));
        assert_eq!(coordinator.pump(), 2);
        assert_eq!(coordinator.state(), SessionState::AwaitingSettingsAck);
        assert_ne!(coordinator.sound_speed(), 1500.0);
    }

    #[test]
    fn test_ticks_while_disconnected_do_nothing() {
        let (mut coordinator, transport, _) = coordinator();
        coordinator.handle_tick();
        coordinator.handle_tick();
        assert!(transport.sent().is_empty());
        assert_eq!(coordinator.pump(), 0);
    }
}
