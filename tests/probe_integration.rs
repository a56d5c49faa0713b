//! Integration tests for the live command-and-response engine.
//!
//! A scripted G6 stands in for the hardware: every write queues one
//! response, reads pop the queue, and a fresh connection starts with an
//! empty queue. The output relay state is shared across connections and
//! reported at byte 3 of the status response.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use g6_probe::error::ProbeError;
use g6_probe::probe::{OutputProbe, ProbeState};
use g6_probe::reader::read_snapshot;
use g6_probe::sequencer::{drain_buffer, send_sequence, DrainOutcome, CHECKPOINT_INTERVAL};
use g6_probe::tables::{CommandSequence, ProtocolTables, Timings, DEFAULT_TABLES_TOML};
use g6_transport::protocol::{REPORT_ID, REPORT_SIZE};
use g6_transport::{
    DeviceDiscovery, DeviceSelector, HidReport, Transport, TransportDeviceInfo, TransportError,
};

const SPEAKERS: u8 = 0x02;
const HEADPHONES: u8 = 0x04;

// ── Scripted device ──

struct ScriptedG6 {
    output: Cell<u8>,
    /// Every payload written, across all connections
    writes: RefCell<Vec<Vec<u8>>>,
    opens: Cell<usize>,
    /// Open number (1-based) that fails
    fail_open: Option<usize>,
    /// Reads answering this opcode fail with an I/O error
    fail_read_opcode: Option<u8>,
    /// Never answers
    silent: bool,
}

impl ScriptedG6 {
    fn new() -> Rc<Self> {
        Self::build(None, None, false)
    }

    fn build(fail_open: Option<usize>, fail_read_opcode: Option<u8>, silent: bool) -> Rc<Self> {
        Rc::new(Self {
            output: Cell::new(SPEAKERS),
            writes: RefCell::new(Vec::new()),
            opens: Cell::new(0),
            fail_open,
            fail_read_opcode,
            silent,
        })
    }

    fn respond(&self, payload: &[u8]) -> Vec<u8> {
        // Output config: 5a 2c 05 00 <mode>
        if payload[1] == 0x2c && payload[2] == 0x05 {
            self.output.set(payload[4]);
        }
        let mut resp = vec![0u8; REPORT_SIZE];
        resp[0] = payload[0];
        resp[1] = payload[1];
        resp[2] = 0x01;
        if payload[1] == 0x05 {
            resp[3] = self.output.get();
        }
        resp
    }
}

struct ScriptedTransport {
    device: Rc<ScriptedG6>,
    queue: RefCell<VecDeque<Vec<u8>>>,
    last_opcode: Cell<u8>,
    info: TransportDeviceInfo,
}

impl ScriptedTransport {
    fn new(device: Rc<ScriptedG6>) -> Self {
        Self {
            device,
            queue: RefCell::new(VecDeque::new()),
            last_opcode: Cell::new(0),
            info: TransportDeviceInfo {
                vid: 0x041e,
                pid: 0x3256,
                interface: 4,
                device_path: "/dev/hidraw-scripted".into(),
                product_name: Some("Scripted G6".into()),
            },
        }
    }

    fn preload(&self, stale: usize) {
        let mut q = self.queue.borrow_mut();
        for i in 0..stale {
            q.push_back(vec![0x5a, 0x12, i as u8]);
        }
    }
}

impl Transport for ScriptedTransport {
    fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
        assert_eq!(data.len(), REPORT_SIZE + 1, "report ID + 64 byte payload");
        assert_eq!(data[0], REPORT_ID);
        let payload = &data[1..];
        self.device.writes.borrow_mut().push(payload.to_vec());
        self.last_opcode.set(payload[1]);
        if !self.device.silent {
            let resp = self.device.respond(payload);
            self.queue.borrow_mut().push_back(resp);
        }
        Ok(data.len())
    }

    fn read(&self, _max_len: usize, _timeout: Option<Duration>) -> Result<Vec<u8>, TransportError> {
        if self.device.fail_read_opcode == Some(self.last_opcode.get()) {
            return Err(TransportError::HidError("I/O error".into()));
        }
        self.queue
            .borrow_mut()
            .pop_front()
            .ok_or(TransportError::Timeout)
    }

    fn device_info(&self) -> &TransportDeviceInfo {
        &self.info
    }
}

struct ScriptedDiscovery(Rc<ScriptedG6>);

impl DeviceDiscovery for ScriptedDiscovery {
    fn open(&self) -> Result<Box<dyn Transport>, TransportError> {
        let n = self.0.opens.get() + 1;
        self.0.opens.set(n);
        if self.0.fail_open == Some(n) {
            return Err(TransportError::DeviceNotFound("unplugged".into()));
        }
        Ok(Box::new(ScriptedTransport::new(Rc::clone(&self.0))))
    }

    fn selector(&self) -> DeviceSelector {
        DeviceSelector::default()
    }
}

fn tables() -> ProtocolTables {
    ProtocolTables::builtin()
        .unwrap()
        .with_timings(Timings::immediate())
}

// ── Sequencer ──

#[test]
fn sequence_writes_every_report_in_order_with_duplicates() {
    let tables = tables();
    let device = ScriptedG6::new();
    let transport = ScriptedTransport::new(Rc::clone(&device));
    let seq = tables.sequence("headphones").unwrap();

    let report = send_sequence(&transport, seq).unwrap();

    assert_eq!(report.writes, 30);
    assert_eq!(report.checkpoints, vec![10, 20, 30]);
    let written = device.writes.borrow();
    let expected: Vec<Vec<u8>> = seq.reports.iter().map(|r| r.as_bytes().to_vec()).collect();
    assert_eq!(*written, expected);
    // The 0x09 data/commit pair is sent twice
    assert_eq!(written[24], written[28]);
    assert_eq!(written[25], written[29]);
}

#[test]
fn sequence_of_29_reports_emits_two_checkpoints() {
    let device = ScriptedG6::new();
    let transport = ScriptedTransport::new(Rc::clone(&device));
    let report = HidReport::from_slice(&[0x5a, 0x06]).unwrap();
    let seq = CommandSequence {
        name: "pings".into(),
        reports: vec![report; 29],
    };

    let result = send_sequence(&transport, &seq).unwrap();

    assert_eq!(CHECKPOINT_INTERVAL, 10);
    assert_eq!(result.writes, 29);
    assert_eq!(result.checkpoints, vec![10, 20]);
    assert_eq!(device.writes.borrow().len(), 29);
}

#[test]
fn empty_sequence_writes_nothing() {
    let device = ScriptedG6::new();
    let transport = ScriptedTransport::new(Rc::clone(&device));
    let seq = CommandSequence {
        name: "empty".into(),
        reports: Vec::new(),
    };

    let result = send_sequence(&transport, &seq).unwrap();
    assert_eq!(result.writes, 0);
    assert!(result.checkpoints.is_empty());
    assert!(device.writes.borrow().is_empty());
}

// ── Buffer drain ──

#[test]
fn drain_confirms_on_first_echo() {
    let tables = tables();
    let device = ScriptedG6::new();
    let transport = ScriptedTransport::new(device);

    let outcome = drain_buffer(&transport, &tables.status, &tables.timings).unwrap();
    assert_eq!(outcome, DrainOutcome::Confirmed { attempts: 1 });
}

#[test]
fn drain_skips_stale_responses() {
    let tables = tables();
    let device = ScriptedG6::new();
    let transport = ScriptedTransport::new(Rc::clone(&device));
    transport.preload(3);

    let outcome = drain_buffer(&transport, &tables.status, &tables.timings).unwrap();
    assert_eq!(outcome, DrainOutcome::Confirmed { attempts: 4 });
}

#[test]
fn drain_gives_up_after_twelve_attempts() {
    let tables = tables();
    let device = ScriptedG6::new();
    let transport = ScriptedTransport::new(Rc::clone(&device));
    transport.preload(30);

    let outcome = drain_buffer(&transport, &tables.status, &tables.timings).unwrap();
    assert_eq!(outcome, DrainOutcome::Unconfirmed { attempts: 12 });
    assert_eq!(device.writes.borrow().len(), 12);
}

#[test]
fn drain_of_silent_device_is_not_an_error() {
    let tables = tables();
    let device = ScriptedG6::build(None, None, true);
    let transport = ScriptedTransport::new(Rc::clone(&device));

    let outcome = drain_buffer(&transport, &tables.status, &tables.timings).unwrap();
    assert!(!outcome.is_confirmed());
    assert_eq!(outcome.attempts(), 12);
}

#[test]
fn drain_budget_is_capped() {
    let mut timings = Timings::immediate();
    timings.drain_attempts = 500;
    let tables = tables().with_timings(timings);
    let device = ScriptedG6::build(None, None, true);
    let transport = ScriptedTransport::new(Rc::clone(&device));

    let outcome = drain_buffer(&transport, &tables.status, &tables.timings).unwrap();
    assert_eq!(outcome, DrainOutcome::Unconfirmed { attempts: 12 });
    assert_eq!(device.writes.borrow().len(), 12);
}

// ── State reader ──

#[test]
fn snapshot_follows_catalog_order() {
    let tables = tables();
    let device = ScriptedG6::new();
    let transport = ScriptedTransport::new(Rc::clone(&device));

    let snap = read_snapshot(&transport, &tables, "baseline").unwrap();

    let names: Vec<&str> = snap.iter().map(|(n, _)| n).collect();
    let catalog: Vec<&str> = tables.catalog.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, catalog);
    assert_eq!(snap.get("0x05_status").unwrap()[3], SPEAKERS);
    assert_eq!(snap.get("0x39").unwrap()[..2], [0x5a, 0x39]);
    // One drain write, then one write per catalog entry
    assert_eq!(device.writes.borrow().len(), 1 + tables.catalog.len());
}

#[test]
fn read_failure_names_the_command() {
    let tables = tables();
    let device = ScriptedG6::build(None, Some(0x20), false);
    let transport = ScriptedTransport::new(device);

    let err = read_snapshot(&transport, &tables, "baseline").unwrap_err();
    assert!(matches!(err, ProbeError::Read { ref command, .. } if command == "0x20"));
}

// ── Orchestrator ──

#[test]
fn discovery_finds_the_output_byte() {
    let tables = tables();
    let device = ScriptedG6::new();
    let discovery = ScriptedDiscovery(Rc::clone(&device));
    let mut probe = OutputProbe::new(&discovery, &tables);

    let report = probe.run_discovery().unwrap();

    // baseline, switch A, read A, switch B, read B
    assert_eq!(device.opens.get(), 5);
    assert_eq!(probe.state(), ProbeState::Disconnected);

    assert_eq!(report.baseline.get("0x05_status").unwrap()[3], SPEAKERS);
    assert_eq!(report.mode_a.get("0x05_status").unwrap()[3], HEADPHONES);
    assert_eq!(report.mode_b.get("0x05_status").unwrap()[3], SPEAKERS);

    let mode_diff = report.mode_diff();
    assert_eq!(mode_diff.left_label, "headphones");
    assert_eq!(mode_diff.right_label, "speakers");
    let status = mode_diff.get("0x05_status").unwrap();
    assert_eq!(status.offsets(), vec![3]);
    assert_eq!(status.differences[0].left, HEADPHONES);
    assert_eq!(status.differences[0].right, SPEAKERS);
    assert_eq!(mode_diff.changed().count(), 1);

    // Returning to the starting output leaves nothing to report
    assert!(!report.diffs[2].has_differences());

    // Switch drains see the queued sequence responses
    assert_eq!(report.switches.len(), 2);
    assert_eq!(report.switches[0].sequence.writes, 30);
    assert_eq!(report.switches[1].sequence.writes, 28);
    assert!(!report.switches[0].drain.is_confirmed());

    let text = report.to_string();
    assert!(text.contains("DIFFERENCES at positions [3]"));
    assert!(text.contains("0x05_status [3]"));
}

#[test]
fn connect_failure_aborts_with_phase() {
    let tables = tables();
    // Third open is the read after switching to headphones
    let device = ScriptedG6::build(Some(3), None, false);
    let discovery = ScriptedDiscovery(Rc::clone(&device));
    let mut probe = OutputProbe::new(&discovery, &tables);

    let err = probe.run_discovery().unwrap_err();

    assert!(matches!(err, ProbeError::Connect { ref phase, .. } if phase == "read headphones"));
    assert_eq!(device.opens.get(), 3);
    // Nothing after the failed connect ran
    let writes = device.writes.borrow().len();
    assert_eq!(writes, (1 + 8) + (30 + 12));
}

#[test]
fn read_failure_carries_phase_and_command() {
    let tables = tables();
    let device = ScriptedG6::build(None, Some(0x3a), false);
    let discovery = ScriptedDiscovery(device);
    let mut probe = OutputProbe::new(&discovery, &tables);

    let err = probe.run_discovery().unwrap_err();
    assert_eq!(
        err.to_string(),
        "read baseline: read command '0x3a_variant1' failed: HID error: I/O error"
    );
}

#[test]
fn failed_read_closes_the_handle() {
    let tables = tables();
    let device = ScriptedG6::build(None, Some(0x20), false);
    let discovery = ScriptedDiscovery(device);
    let mut probe = OutputProbe::new(&discovery, &tables);

    let err = probe.snapshot("current").unwrap_err();
    assert!(matches!(err, ProbeError::InPhase { ref phase, .. } if phase == "read current"));
    assert_eq!(probe.state(), ProbeState::Disconnected);
}

#[test]
fn failed_switch_closes_the_handle() {
    let tables = tables();
    // The drain after the sequence reads the status response
    let device = ScriptedG6::build(None, Some(0x05), false);
    let discovery = ScriptedDiscovery(Rc::clone(&device));
    let mut probe = OutputProbe::new(&discovery, &tables);

    let err = probe.switch_output("headphones").unwrap_err();
    assert!(err.to_string().starts_with("switch headphones: "));
    assert_eq!(probe.state(), ProbeState::Disconnected);
    // Whole sequence plus one drain write
    assert_eq!(device.writes.borrow().len(), 31);
}

#[test]
fn one_shot_switch_leaves_device_in_new_mode() {
    let tables = tables();
    let device = ScriptedG6::new();
    let discovery = ScriptedDiscovery(Rc::clone(&device));
    let mut probe = OutputProbe::new(&discovery, &tables);

    let report = probe.switch_output("headphones").unwrap();
    assert_eq!(report.sequence.name, "headphones");
    assert_eq!(device.output.get(), HEADPHONES);
    assert_eq!(device.opens.get(), 1);

    let snap = probe.snapshot("after").unwrap();
    assert_eq!(snap.get("0x05_status").unwrap()[3], HEADPHONES);
}

#[test]
fn custom_tables_sequences_are_switchable() {
    let toml = DEFAULT_TABLES_TOML
        .replace("name = \"speakers\"", "name = \"line-out\"")
        .replace("mode_b = \"speakers\"", "mode_b = \"line-out\"");
    let tables = ProtocolTables::from_toml(&toml)
        .unwrap()
        .with_timings(Timings::immediate());
    let device = ScriptedG6::new();
    device.output.set(HEADPHONES);
    let discovery = ScriptedDiscovery(Rc::clone(&device));
    let mut probe = OutputProbe::new(&discovery, &tables);

    let report = probe.switch_output("line-out").unwrap();
    assert_eq!(report.sequence.writes, 28);
    assert_eq!(device.output.get(), SPEAKERS);

    let err = probe.switch_output("speakers").unwrap_err();
    assert!(matches!(err, ProbeError::UnknownSequence(ref s) if s == "speakers"));
}
