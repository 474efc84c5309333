//! Reset then verify a small fleet through the public API

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use digil::export::write_rows;
use digil::{
    CancellationToken, CommandLog, DeviceId, DeviceRecord, DeviceRole, Gateway, NoopObserver,
    Orchestrator, QueueWorkflow, ResetStatus, ResetWorkflow, RetryPolicies, Tolerance,
    VerifyStatus, VerifyWorkflow, export_rows, load_verify_targets, targets_from_results,
};
use digil_core::{
    Error, RegisterName, RegisterReading, RegisterValue, Registers, SteppingClock, TokenSession,
    VerifyRegisters,
};
use digil_types::{MaintenanceMode, StepOutcome};

const RESET_AT: i64 = 1_700_000_000_000;

/// Device whose inclinometer write is refused by the backend
const BROKEN: &str = "1121622_0364";

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Maintenance(String, bool),
    Write(String, String),
    Read(String),
    Log(String),
}

#[derive(Default)]
struct ScriptedGateway {
    calls: Mutex<Vec<Call>>,
}

impl ScriptedGateway {
    /// Position of the inclinometer write for `device`
    fn write_position(&self, device: &DeviceId) -> Option<usize> {
        self.calls
            .lock()
            .iter()
            .position(|call| matches!(call, Call::Write(d, _) if d == device.as_str()))
    }

    fn calls_for(&self, device: &str) -> Vec<Call> {
        self.calls
            .lock()
            .iter()
            .filter(|call| match call {
                Call::Maintenance(d, _) | Call::Write(d, _) | Call::Read(d) | Call::Log(d) => {
                    d == device
                }
            })
            .cloned()
            .collect()
    }
}

fn reading(value: RegisterValue, timestamp: i64) -> RegisterReading {
    RegisterReading {
        value,
        timestamp: Some(timestamp),
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn authenticate(&self) -> digil_core::Result<TokenSession> {
        let session = TokenSession::new();
        session.store("token", None);
        Ok(session)
    }

    async fn set_maintenance_mode(&self, device: &DeviceId, enabled: bool) -> digil_core::Result<()> {
        self.calls
            .lock()
            .push(Call::Maintenance(device.to_string(), enabled));
        Ok(())
    }

    async fn set_register_value(
        &self,
        device: &DeviceId,
        register: &str,
        _value: &str,
    ) -> digil_core::Result<()> {
        self.calls
            .lock()
            .push(Call::Write(device.to_string(), register.to_string()));
        if device.as_str() == BROKEN {
            return Err(Error::api(Some(422), "HTTP 422: register is read-only"));
        }
        Ok(())
    }

    async fn read_registers(
        &self,
        device: &DeviceId,
        names: &[RegisterName],
    ) -> digil_core::Result<Registers> {
        self.calls.lock().push(Call::Read(device.to_string()));

        let known = VerifyRegisters::default();
        let sampled = RESET_AT + 3_600_000;
        let mut registers = HashMap::new();
        for name in names {
            let value = if *name == known.alarm {
                RegisterValue::Bool(false)
            } else if *name == known.inc_x {
                RegisterValue::Number(0.05)
            } else if *name == known.inc_y {
                RegisterValue::Number(-0.10)
            } else {
                continue;
            };
            registers.insert(name.clone(), reading(value, sampled));
        }
        Ok(registers)
    }

    async fn maintenance_status(
        &self,
        _device: &DeviceId,
    ) -> digil_core::Result<Option<MaintenanceMode>> {
        Ok(Some(MaintenanceMode::Off))
    }

    async fn commands_log(
        &self,
        device: &DeviceId,
        _since: DateTime<Utc>,
        _until: DateTime<Utc>,
    ) -> digil_core::Result<CommandLog> {
        self.calls.lock().push(Call::Log(device.to_string()));
        let sent = if device.as_str() == BROKEN {
            vec!["maintenance ON".to_string()]
        } else {
            vec!["maintenance ON".to_string(), "reset_inclinometro".to_string()]
        };
        Ok(CommandLog {
            pending: Vec::new(),
            sent,
        })
    }
}

fn devices() -> Vec<DeviceRecord> {
    vec![
        DeviceRecord::new(DeviceId::parse("1121621_0436").unwrap(), DeviceRole::Master),
        DeviceRecord::new(DeviceId::parse("1121525_0103").unwrap(), DeviceRole::Slave),
        DeviceRecord::new(DeviceId::parse(BROKEN).unwrap(), DeviceRole::Slave),
    ]
}

#[tokio::test]
async fn test_reset_then_verify() {
    let gateway = Arc::new(ScriptedGateway::default());
    let orchestrator = Orchestrator::new(2, CancellationToken::new());

    // Phase 1
    let reset = ResetWorkflow::new(gateway.clone(), RetryPolicies::default())
        .with_clock(Arc::new(SteppingClock::new(RESET_AT, 1_000)));
    let mut phase1 = orchestrator
        .run_phase(devices(), Arc::new(reset), &NoopObserver)
        .await;

    assert!(phase1.is_complete());
    assert_eq!(phase1.results.len(), 3);
    phase1
        .results
        .sort_by(|a, b| a.device_id.cmp(&b.device_id));

    let statuses: Vec<_> = phase1
        .results
        .iter()
        .map(|r| (r.device_id.to_string(), r.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("1121525_0103".to_string(), ResetStatus::Success),
            ("1121621_0436".to_string(), ResetStatus::Success),
            (BROKEN.to_string(), ResetStatus::Failed),
        ]
    );
    for result in &phase1.results {
        assert!(result.is_consistent(), "{:?}", result);
    }

    // Each acknowledged reset gets its own timestamp, in acknowledgement order
    let mut acked: Vec<_> = phase1
        .results
        .iter()
        .filter(|r| r.status == ResetStatus::Success)
        .map(|r| {
            let position = gateway.write_position(&r.device_id).unwrap();
            (position, r.reset_timestamp.unwrap())
        })
        .collect();
    acked.sort_by_key(|(position, _)| *position);
    let stamps: Vec<i64> = acked.iter().map(|(_, ts)| *ts).collect();
    assert_eq!(stamps, vec![RESET_AT, RESET_AT + 1_000]);
    assert!(phase1.results[2].reset_timestamp.is_none());

    // Maintenance is switched back off even though the reset was refused
    let broken = &phase1.results[2];
    assert_eq!(broken.maintenance_on, StepOutcome::Success);
    assert_eq!(broken.reset, StepOutcome::Failure);
    assert_eq!(broken.maintenance_off, StepOutcome::Success);
    assert!(broken.error_message().contains("422"));
    assert_eq!(
        gateway
            .calls_for(BROKEN)
            .iter()
            .filter(|c| matches!(c, Call::Maintenance(..)))
            .count(),
        2
    );

    // Ordered commands per device
    assert_eq!(
        gateway.calls_for("1121621_0436"),
        vec![
            Call::Maintenance("1121621_0436".into(), true),
            Call::Write(
                "1121621_0436".into(),
                digil_core::constants::RESET_REGISTER.into()
            ),
            Call::Maintenance("1121621_0436".into(), false),
        ]
    );

    // Phase 1 export feeds phase 2
    let dir = tempfile::tempdir().unwrap();
    let phase1_path = dir.path().join("phase1.csv");
    export_rows(&phase1_path, &phase1.results).unwrap();

    let from_file = load_verify_targets(&phase1_path, DeviceRole::Slave).unwrap();
    let in_memory = targets_from_results(&phase1.results);
    let mut file_targets = from_file.targets.clone();
    let mut memory_targets = in_memory.targets.clone();
    file_targets.sort_by(|a, b| a.device_id.cmp(&b.device_id));
    memory_targets.sort_by(|a, b| a.device_id.cmp(&b.device_id));
    assert_eq!(file_targets, memory_targets);
    assert_eq!(from_file.excluded, vec![DeviceId::parse(BROKEN).unwrap()]);

    // Phase 2
    let verify = VerifyWorkflow::new(gateway.clone(), Tolerance::default());
    let phase2 = orchestrator
        .run_phase(from_file.targets, Arc::new(verify), &NoopObserver)
        .await;

    assert!(phase2.is_complete());
    assert_eq!(phase2.results.len(), 2);
    for result in &phase2.results {
        assert!(result.all_ok, "{:?}", result);
        assert_eq!(result.status, VerifyStatus::Verified);
        assert!(result.data_timestamp.unwrap() > result.reset_timestamp);
        assert_eq!(
            result.timestamp_delta_ms,
            Some(result.data_timestamp.unwrap() - result.reset_timestamp)
        );
    }
    assert!(gateway.calls_for(BROKEN).iter().all(|c| !matches!(c, Call::Read(_))));

    let mut out = Vec::new();
    write_rows(&mut out, &phase2.results).unwrap();
    let text = String::from_utf8(out).unwrap();
    for line in text.lines().skip(1) {
        assert!(line.contains(",OK,false,OK,0.05,OK,-0.1,OK,OK,"), "{}", line);
        assert!(line.contains(",verified,,"), "{}", line);
        let delta: i64 = line.rsplit(',').next().unwrap().parse().unwrap();
        assert!(delta > 0, "{}", line);
    }
}

#[tokio::test]
async fn test_queue_check_lists_sent_commands() {
    let gateway = Arc::new(ScriptedGateway::default());
    let since = Utc.timestamp_millis_opt(RESET_AT).unwrap();

    let queue = QueueWorkflow::new(gateway.clone(), since);
    let mut report = Orchestrator::new(2, CancellationToken::new())
        .run_phase(devices(), Arc::new(queue), &NoopObserver)
        .await;

    assert!(report.is_complete());
    report.results.sort_by(|a, b| a.device_id.cmp(&b.device_id));
    assert_eq!(report.results.len(), 3);
    for check in &report.results {
        assert_eq!(check.status_label(), "EMPTY");
        assert!(check.error.is_empty());
    }
    assert_eq!(report.results[2].log.sent, vec!["maintenance ON"]);

    let mut out = Vec::new();
    write_rows(&mut out, &report.results).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.lines().nth(1).unwrap().starts_with("1121525_0103,EMPTY,N/A,"));
}

#[tokio::test]
async fn test_cancelled_before_start_runs_nothing() {
    let gateway = Arc::new(ScriptedGateway::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let reset = ResetWorkflow::new(gateway.clone(), RetryPolicies::default());
    let report = Orchestrator::new(2, cancel)
        .run_phase(devices(), Arc::new(reset), &NoopObserver)
        .await;

    assert!(report.cancelled);
    assert!(report.results.is_empty());
    assert_eq!(report.not_dispatched.len(), 3);
    assert!(gateway.calls.lock().is_empty());
}
