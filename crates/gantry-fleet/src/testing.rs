//! In-memory fleet, connector and nesting used by the tests.
use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use gantry_model::{AutoscalerConfig, AutoscalerPolicy, RunnerConfig};
use gantry_observe::{JobTrace, TraceStream};

use crate::{
    Acquisition, AutoscalerProvider, Capacity, Client, ConnectInfo, Connector, DialOptions, Fleet, FleetError,
    FleetFactory, FleetResult, FleetSettings, Nesting, NestingConnector, NestedVm, RunOptions,
    Schedule, Tunnel,
};

#[derive(Clone, Default)]
pub(crate) struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub(crate) fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Runner registration pointing at the fake plugin: one instance, one idle.
pub(crate) fn fleet_config(token: &str) -> RunnerConfig {
    RunnerConfig {
        token: token.into(),
        executor: "instance".into(),
        autoscaler: Some(AutoscalerConfig {
            plugin: "fake".into(),
            max_instances: 1,
            policy: vec![AutoscalerPolicy {
                idle_count: 1,
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// An `instance` provider wired to fakes that share one call log.
pub(crate) struct Harness {
    pub(crate) fleet: Arc<FakeFleet>,
    pub(crate) factory: Arc<FakeFactory>,
    pub(crate) connector: Arc<FakeConnector>,
    pub(crate) log: CallLog,
    pub(crate) provider: AutoscalerProvider,
}

impl Harness {
    pub(crate) fn new(fleet: FakeFleet) -> Self {
        let log = CallLog::default();
        let fleet = Arc::new(fleet.with_log(log.clone()));
        let factory = Arc::new(FakeFactory::new(fleet.clone()));
        let connector = Arc::new(FakeConnector::new(log.clone()));
        let provider = AutoscalerProvider::new("instance", factory.clone(), connector.clone())
            .with_nesting(Arc::new(FakeNestingConnector::new(log.clone())));
        Self {
            fleet,
            factory,
            connector,
            log,
            provider,
        }
    }
}

pub(crate) struct FakeFleet {
    capacity: Mutex<Capacity>,
    slots: usize,
    held: Mutex<HashMap<String, usize>>,
    schedules: Mutex<Vec<Schedule>>,
    configured: AtomicUsize,
    acquires: AtomicUsize,
    releases: AtomicUsize,
    shutdowns: Mutex<Vec<bool>>,
    acquire_delay: Duration,
    log: CallLog,
}

impl FakeFleet {
    pub(crate) fn new(capacity: Capacity, slots: usize) -> Self {
        Self {
            capacity: Mutex::new(capacity),
            slots,
            held: Mutex::new(HashMap::new()),
            schedules: Mutex::new(Vec::new()),
            configured: AtomicUsize::new(0),
            acquires: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            shutdowns: Mutex::new(Vec::new()),
            acquire_delay: Duration::ZERO,
            log: CallLog::default(),
        }
    }

    pub(crate) fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    pub(crate) fn with_acquire_delay(mut self, delay: Duration) -> Self {
        self.acquire_delay = delay;
        self
    }

    pub(crate) fn set_capacity(&self, capacity: Capacity) {
        *self.capacity.lock().unwrap() = capacity;
    }

    pub(crate) fn schedules_configured(&self) -> usize {
        self.configured.load(Ordering::SeqCst)
    }

    pub(crate) fn last_schedules(&self) -> Vec<Schedule> {
        self.schedules.lock().unwrap().clone()
    }

    pub(crate) fn acquires(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }

    pub(crate) fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub(crate) fn shutdowns(&self) -> Vec<bool> {
        self.shutdowns.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fleet for FakeFleet {
    async fn acquire(&self, key: &str, _cancel: &CancellationToken) -> FleetResult<Arc<dyn Acquisition>> {
        if !self.acquire_delay.is_zero() {
            tokio::time::sleep(self.acquire_delay).await;
        }
        let slot = {
            let mut held = self.held.lock().unwrap();
            match held.get(key) {
                Some(slot) => *slot,
                None if held.len() >= self.slots => {
                    return Err(FleetError::Capacity("all slots are taken".into()));
                }
                None => {
                    let used: HashSet<usize> = held.values().copied().collect();
                    let slot = (0..self.slots).find(|s| !used.contains(s)).unwrap_or(0);
                    held.insert(key.to_string(), slot);
                    self.acquires.fetch_add(1, Ordering::SeqCst);
                    slot
                }
            }
        };
        Ok(Arc::new(FakeAcquisition {
            id: format!("i-{slot}"),
            slot: slot as u32,
            log: self.log.clone(),
        }))
    }

    async fn release(&self, key: &str) {
        if self.held.lock().unwrap().remove(key).is_some() {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn capacity(&self) -> Capacity {
        *self.capacity.lock().unwrap()
    }

    fn schedule(&self) -> Schedule {
        self.schedules
            .lock()
            .unwrap()
            .first()
            .cloned()
            .unwrap_or_default()
    }

    fn configure_schedule(&self, schedules: Vec<Schedule>) -> FleetResult<()> {
        self.configured.fetch_add(1, Ordering::SeqCst);
        *self.schedules.lock().unwrap() = schedules;
        Ok(())
    }

    async fn shutdown(&self, delete_instances: bool) {
        self.shutdowns.lock().unwrap().push(delete_instances);
    }
}

struct FakeAcquisition {
    id: String,
    slot: u32,
    log: CallLog,
}

#[async_trait]
impl Acquisition for FakeAcquisition {
    async fn connect_info(&self) -> FleetResult<ConnectInfo> {
        Ok(ConnectInfo {
            id: self.id.clone(),
            protocol: "ssh".into(),
            internal_addr: "10.0.0.1".into(),
            external_addr: "203.0.113.1".into(),
            ..Default::default()
        })
    }

    fn instance_id(&self) -> &str {
        &self.id
    }

    fn health_success(&self) {
        self.log.push("health:success");
    }

    fn health_failure(&self) {
        self.log.push("health:failure");
    }

    fn slot(&self) -> u32 {
        self.slot
    }
}

pub(crate) struct FakeFactory {
    fleet: Arc<FakeFleet>,
    created: AtomicUsize,
}

impl FakeFactory {
    pub(crate) fn new(fleet: Arc<FakeFleet>) -> Self {
        Self {
            fleet,
            created: AtomicUsize::new(0),
        }
    }

    pub(crate) fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FleetFactory for FakeFactory {
    async fn create(&self, _settings: FleetSettings) -> FleetResult<Arc<dyn Fleet>> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(self.fleet.clone())
    }
}

pub(crate) struct FakeConnector {
    log: CallLog,
    failing: Mutex<HashSet<String>>,
}

impl FakeConnector {
    pub(crate) fn new(log: CallLog) -> Self {
        Self {
            log,
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub(crate) fn fail_addr(&self, addr: &str) {
        self.failing.lock().unwrap().insert(addr.to_string());
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn dial(&self, info: &ConnectInfo, opts: DialOptions) -> FleetResult<Box<dyn Client>> {
        let addr = if opts.use_external_addr {
            &info.external_addr
        } else {
            &info.internal_addr
        };
        self.log.push(format!("dial:{addr}"));
        if self.failing.lock().unwrap().contains(addr) {
            return Err(FleetError::Dial(format!("{addr}: connection refused")));
        }
        Ok(Box::new(FakeClient::new(addr, self.log.clone())))
    }
}

/// Exits 1 when the script contains `FAKE_FAIL`, 0 otherwise.
pub(crate) struct FakeClient {
    addr: String,
    log: CallLog,
}

impl FakeClient {
    pub(crate) fn new(addr: &str, log: CallLog) -> Self {
        Self {
            addr: addr.to_string(),
            log,
        }
    }
}

#[async_trait]
impl Client for FakeClient {
    async fn dial(&self, network: &str, addr: &str) -> FleetResult<Box<dyn Tunnel>> {
        self.log.push(format!("tunnel:{}:{network}:{addr}", self.addr));
        let (near, _far) = tokio::io::duplex(64);
        Ok(Box::new(near))
    }

    async fn run(
        &self,
        opts: RunOptions,
        trace: &Arc<dyn JobTrace>,
        cancel: &CancellationToken,
    ) -> FleetResult<i32> {
        if cancel.is_cancelled() {
            return Err(FleetError::Canceled);
        }
        self.log.push(format!(
            "run:{}:{} {}:{}",
            self.addr,
            opts.program,
            opts.args.join(" "),
            opts.stdin
        ));
        trace.line(TraceStream::Stdout, &format!("ran on {}", self.addr));
        Ok(if opts.stdin.contains("FAKE_FAIL") { 1 } else { 0 })
    }

    async fn close(&self) -> FleetResult<()> {
        self.log.push(format!("close:{}", self.addr));
        Ok(())
    }
}

pub(crate) struct FakeNestingConnector {
    log: CallLog,
}

impl FakeNestingConnector {
    pub(crate) fn new(log: CallLog) -> Self {
        Self { log }
    }
}

#[async_trait]
impl NestingConnector for FakeNestingConnector {
    async fn connect(
        &self,
        client: &dyn Client,
        host: &str,
        _config: &serde_json::Value,
    ) -> FleetResult<Box<dyn Nesting>> {
        let (network, addr) = host.split_once("://").unwrap_or(("tcp", host));
        client.dial(network, addr).await?;
        Ok(Box::new(FakeNesting {
            log: self.log.clone(),
        }))
    }
}

struct FakeNesting {
    log: CallLog,
}

#[async_trait]
impl Nesting for FakeNesting {
    async fn create(&self, image: &str, slot: u32) -> FleetResult<NestedVm> {
        self.log.push(format!("create:{image}:{slot}"));
        Ok(NestedVm {
            id: format!("vm-{slot}"),
            addr: "192.168.64.2".into(),
        })
    }

    async fn delete(&self, id: &str) -> FleetResult<()> {
        self.log.push(format!("delete:{id}"));
        Ok(())
    }

    async fn close(&self) {
        self.log.push("nesting-close");
    }
}
