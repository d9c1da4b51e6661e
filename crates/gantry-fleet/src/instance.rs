//! Executor bound to one slot of an autoscaled instance.
//!
//! `prepare` acquires the slot under the job's key, connects to the
//! instance (or a nested VM on it), and hands the connection to a
//! [`RemoteShellExecutor`]. `cleanup` tears the connection down and gives
//! the slot back.
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use gantry_core::{
    BuildPaths, Executor, ExecutorCommand, ExecutorData, ExecutorError, ExecutorResult,
    ExecutorState, PrepareOptions,
};
use gantry_model::ExecutorStage;

use crate::{
    Acquisition, Client, ConnectInfo, Connector, DialOptions, Fleet, FleetError, FleetResult,
    Nesting, NestingConnector, NestedVm, RemoteShellExecutor, acquisition_key,
    provider::Scalers,
};

/// Pieces of a nested VM connection, torn down in reverse order.
#[derive(Default)]
struct Nested {
    host: Option<Box<dyn Client>>,
    daemon: Option<Box<dyn Nesting>>,
    vm: Option<NestedVm>,
}

pub struct InstanceExecutor {
    scalers: Arc<Scalers>,
    connector: Arc<dyn Connector>,
    nesting: Option<Arc<dyn NestingConnector>>,
    acquire_timeout: Duration,
    state: ExecutorState,
    data: Option<ExecutorData>,
    nested: Nested,
    inner: Option<RemoteShellExecutor>,
    unbound: BuildPaths,
}

impl InstanceExecutor {
    pub(crate) fn new(
        scalers: Arc<Scalers>,
        connector: Arc<dyn Connector>,
        nesting: Option<Arc<dyn NestingConnector>>,
        acquire_timeout: Duration,
    ) -> Self {
        Self {
            scalers,
            connector,
            nesting,
            acquire_timeout,
            state: ExecutorState::default(),
            data: None,
            nested: Nested::default(),
            inner: None,
            unbound: BuildPaths::default(),
        }
    }

    async fn acquire(
        &self,
        fleet: &dyn Fleet,
        key: &str,
        cancel: &CancellationToken,
    ) -> ExecutorResult<Arc<dyn Acquisition>> {
        tokio::select! {
            res = tokio::time::timeout(self.acquire_timeout, fleet.acquire(key, cancel)) => match res {
                Ok(acquired) => Ok(acquired?),
                Err(_) => Err(FleetError::AcquireTimeout(self.acquire_timeout).into()),
            },
            _ = cancel.cancelled() => Err(ExecutorError::Canceled),
        }
    }

    /// Connect and report the outcome to the instance's health, once.
    async fn connect(
        &mut self,
        acq: &dyn Acquisition,
        options: &PrepareOptions,
    ) -> ExecutorResult<Box<dyn Client>> {
        let result = self.dial(acq, options).await;
        match &result {
            Err(e) if e.is_instance_fault() => {
                warn!(instance = acq.instance_id(), error = %e, "instance unhealthy");
                acq.health_failure();
            }
            _ => acq.health_success(),
        }
        Ok(result?)
    }

    async fn dial(
        &mut self,
        acq: &dyn Acquisition,
        options: &PrepareOptions,
    ) -> FleetResult<Box<dyn Client>> {
        let autoscaler = options.config.autoscaler.clone().unwrap_or_default();
        let dial = DialOptions {
            use_external_addr: autoscaler.connector_config.use_external_addr,
            timeout: autoscaler
                .connector_config
                .timeout
                .filter(|t| *t > 0)
                .map(|t| Duration::from_secs(t as u64)),
        };

        let info = acq
            .connect_info()
            .await
            .map_err(|e| FleetError::ConnectInfo(e.to_string()))?;
        let client = self
            .connector
            .dial(&info, dial)
            .await
            .map_err(|e| FleetError::Dial(e.to_string()))?;

        let isolation = &autoscaler.vm_isolation;
        if !isolation.enabled {
            return Ok(client);
        }
        let host = self.nested.host.insert(client);

        let image = options
            .job
            .image
            .clone()
            .or_else(|| isolation.image.clone())
            .filter(|i| !i.is_empty())
            .ok_or_else(|| FleetError::Config("nested vm isolation requires an image".into()))?;
        let Some(nesting) = &self.nesting else {
            return Err(FleetError::Config(
                "nested vm isolation is enabled but no nesting connector is available".into(),
            ));
        };

        let daemon = nesting
            .connect(host.as_ref(), &isolation.nesting_host, &isolation.nesting_config)
            .await
            .map_err(|e| FleetError::Nesting(e.to_string()))?;
        let daemon = self.nested.daemon.insert(daemon);
        let vm = daemon
            .create(&image, acq.slot())
            .await
            .map_err(|e| FleetError::NestedVm(e.to_string()))?;
        info!(vm = %vm.id, %image, slot = acq.slot(), "nested vm created");
        options
            .trace
            .notice(&format!("Created nested VM {} from {}", vm.id, image));

        let vm_info = ConnectInfo {
            id: vm.id.clone(),
            internal_addr: vm.addr.clone(),
            external_addr: vm.addr.clone(),
            ..info
        };
        self.nested.vm = Some(vm);
        self.connector
            .dial(&vm_info, DialOptions { use_external_addr: false, ..dial })
            .await
            .map_err(|e| FleetError::Dial(e.to_string()))
    }

    async fn teardown(&mut self) {
        if let Some(daemon) = self.nested.daemon.take() {
            if let Some(vm) = self.nested.vm.take() {
                if let Err(e) = daemon.delete(&vm.id).await {
                    warn!(vm = %vm.id, error = %e, "deleting nested vm");
                }
            }
            daemon.close().await;
        }
        if let Some(host) = self.nested.host.take() {
            if let Err(e) = host.close().await {
                warn!(error = %e, "closing instance connection");
            }
        }
    }
}

#[async_trait]
impl Executor for InstanceExecutor {
    #[instrument(level = "debug", skip_all, fields(job = options.job.id))]
    async fn prepare(&mut self, mut options: PrepareOptions) -> ExecutorResult<()> {
        self.state.begin_prepare()?;
        self.data = options.data.take();
        let Some(token) = self
            .data
            .as_ref()
            .and_then(ExecutorData::acquisition)
            .map(|r| r.token().to_string())
        else {
            return Err(ExecutorError::Acquisition(
                "no capacity reserved for this job".into(),
            ));
        };
        let Some(fleet) = self.scalers.fleet(&token).await else {
            return Err(ExecutorError::Acquisition(
                "no fleet for this runner".into(),
            ));
        };

        let key = acquisition_key(&options.job.token, options.job.id);
        options.trace.notice("Acquiring instance...");
        let acq = self.acquire(fleet.as_ref(), &key, &options.cancel).await?;
        if let Some(reservation) = self.data.as_mut().and_then(ExecutorData::acquisition_mut) {
            reservation.bind(key.as_str());
        }
        options.trace.notice(&format!(
            "Preparing instance {} (slot {})...",
            acq.instance_id(),
            acq.slot()
        ));

        let client = self.connect(acq.as_ref(), &options).await?;
        let mut inner = RemoteShellExecutor::new(client, acq.instance_id());
        let result = inner.prepare(options).await;
        self.inner = Some(inner);
        result?;

        self.state.prepared();
        Ok(())
    }

    fn paths(&self) -> &BuildPaths {
        match &self.inner {
            Some(inner) => inner.paths(),
            None => &self.unbound,
        }
    }

    async fn run(&mut self, cmd: ExecutorCommand) -> ExecutorResult<()> {
        self.state.begin_run(cmd.stage)?;
        match self.inner.as_mut() {
            Some(inner) => inner.run(cmd).await,
            None => Err(ExecutorError::InvalidState {
                op: "run",
                stage: self.state.stage(),
            }),
        }
    }

    async fn finish(&mut self, err: Option<&ExecutorError>) {
        if !self.state.begin_finish() {
            return;
        }
        if let Some(inner) = self.inner.as_mut() {
            inner.finish(err).await;
        }
        self.state.finished();
    }

    async fn cleanup(&mut self) {
        if !self.state.begin_cleanup() {
            return;
        }
        if let Some(inner) = self.inner.as_mut() {
            inner.cleanup().await;
        }
        self.teardown().await;
        if let Some(data) = self.data.take() {
            match data {
                ExecutorData::Acquisition(reservation) => {
                    debug!(bound = reservation.is_bound(), "releasing reservation");
                    self.scalers.release(reservation).await;
                }
            }
        }
        self.state.cleaned_up();
    }

    fn current_stage(&self) -> ExecutorStage {
        self.state.stage()
    }

    fn set_current_stage(&mut self, stage: ExecutorStage) {
        self.state.set(stage);
    }
}

#[cfg(test)]
mod tests {
    use gantry_core::{ExecutorProvider, ExecutorRegistry, JobRunner};
    use gantry_model::{Job, RunnerConfig, Step, StepName, VmIsolation};
    use gantry_observe::{BufferTrace, JobTrace};
    use gantry_shell::{BashShell, ShellRegistry};

    use super::*;
    use crate::{
        Capacity,
        testing::{FakeFleet, Harness, fleet_config},
    };

    fn config(isolation: VmIsolation) -> RunnerConfig {
        let mut cfg = fleet_config("glrt-fleet");
        if let Some(autoscaler) = cfg.autoscaler.as_mut() {
            autoscaler.vm_isolation = isolation;
        }
        cfg
    }

    fn one_slot() -> FakeFleet {
        FakeFleet::new(Capacity { available: 1, potential: 1 }, 1)
    }

    fn job(id: u64) -> Job {
        Job {
            id,
            steps: vec![Step {
                name: StepName::Script,
                script: vec!["make".into()],
                timeout: None,
                allow_failure: false,
            }],
            ..Default::default()
        }
    }

    async fn prepare(
        f: &Harness,
        cfg: &Arc<RunnerConfig>,
        job: Job,
    ) -> (Box<dyn Executor>, ExecutorResult<()>) {
        let data = f.provider.acquire(cfg).await.unwrap();
        let mut executor = f.provider.create();
        let trace: Arc<dyn JobTrace> = Arc::new(BufferTrace::new());
        let result = executor
            .prepare(PrepareOptions {
                job: Arc::new(job),
                config: Arc::clone(cfg),
                shell: Arc::new(BashShell::bash()),
                trace,
                data,
                cancel: CancellationToken::new(),
            })
            .await;
        (executor, result)
    }

    #[tokio::test]
    async fn job_releases_its_slot_exactly_once() {
        let f = Harness::new(one_slot());
        let cfg = Arc::new(config(VmIsolation::default()));

        let mut executors = ExecutorRegistry::new();
        executors.register(Arc::new(f.provider));
        let shells = ShellRegistry::with_defaults();
        let trace = Arc::new(BufferTrace::new());

        JobRunner::new(&executors, &shells)
            .run(Arc::new(job(1)), Arc::clone(&cfg), trace, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(f.fleet.acquires(), 1);
        assert_eq!(f.fleet.releases(), 1);
        assert!(f.log.entries().iter().any(|e| e == "health:success"));
    }

    #[tokio::test]
    async fn second_cleanup_does_not_release_again() {
        let f = Harness::new(one_slot());
        let cfg = Arc::new(config(VmIsolation::default()));
        let (mut executor, result) = prepare(&f, &cfg, job(2)).await;
        result.unwrap();

        executor.finish(None).await;
        executor.cleanup().await;
        executor.cleanup().await;
        assert_eq!(f.fleet.releases(), 1);
        assert_eq!(executor.current_stage(), ExecutorStage::CleanedUp);
    }

    #[tokio::test]
    async fn one_slot_is_granted_to_one_job() {
        let f = Harness::new(one_slot());
        let cfg = Arc::new(config(VmIsolation::default()));

        let (a, b) = tokio::join!(prepare(&f, &cfg, job(10)), prepare(&f, &cfg, job(11)));
        let granted = [&a.1, &b.1].iter().filter(|r| r.is_ok()).count();
        assert_eq!(granted, 1);
        let refused = if a.1.is_err() { &a.1 } else { &b.1 };
        assert!(matches!(refused, Err(ExecutorError::Acquisition(_))));

        let (mut a, mut b) = (a.0, b.0);
        a.cleanup().await;
        b.cleanup().await;
        assert_eq!(f.fleet.acquires(), 1);
        assert_eq!(f.fleet.releases(), 1);
    }

    #[tokio::test]
    async fn same_job_id_under_different_job_tokens_needs_two_slots() {
        let f = Harness::new(one_slot());
        let cfg = Arc::new(config(VmIsolation::default()));
        let job_with = |token: &str| Job {
            token: token.into(),
            ..job(42)
        };

        let (mut first, a) = prepare(&f, &cfg, job_with("job-token-a")).await;
        let (mut second, b) = prepare(&f, &cfg, job_with("job-token-b")).await;
        a.unwrap();
        assert!(matches!(b, Err(ExecutorError::Acquisition(_))));
        assert_eq!(f.fleet.acquires(), 1);

        second.cleanup().await;
        assert_eq!(f.fleet.releases(), 0);
        first.cleanup().await;
        assert_eq!(f.fleet.releases(), 1);
    }

    #[tokio::test]
    async fn unreachable_instance_is_reported_unhealthy() {
        let f = Harness::new(one_slot());
        f.connector.fail_addr("10.0.0.1");
        let cfg = Arc::new(config(VmIsolation::default()));

        let (mut executor, result) = prepare(&f, &cfg, job(3)).await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("dialing instance"));
        executor.cleanup().await;

        let health: Vec<_> = f
            .log
            .entries()
            .into_iter()
            .filter(|e| e.starts_with("health:"))
            .collect();
        assert_eq!(health, vec!["health:failure"]);
        assert_eq!(f.fleet.releases(), 1);
    }

    #[tokio::test]
    async fn missing_image_is_not_the_instance_fault() {
        let f = Harness::new(one_slot());
        let cfg = Arc::new(config(VmIsolation {
            enabled: true,
            nesting_host: "unix:///run/nesting.sock".into(),
            ..Default::default()
        }));

        let (mut executor, result) = prepare(&f, &cfg, job(4)).await;
        assert!(matches!(result, Err(ExecutorError::System(ref m)) if m.contains("requires an image")));
        executor.cleanup().await;

        let entries = f.log.entries();
        let health: Vec<_> = entries.iter().filter(|e| e.starts_with("health:")).collect();
        assert_eq!(health, vec!["health:success"]);
        assert!(entries.iter().any(|e| e == "close:10.0.0.1"));
    }

    #[tokio::test]
    async fn nested_vm_is_created_and_deleted() {
        let f = Harness::new(one_slot());
        let cfg = Arc::new(config(VmIsolation {
            enabled: true,
            nesting_host: "unix:///run/nesting.sock".into(),
            image: Some("macos-14".into()),
            ..Default::default()
        }));

        let (mut executor, result) = prepare(&f, &cfg, job(6)).await;
        result.unwrap();
        assert_eq!(executor.paths().hostname, "i-0");
        executor.cleanup().await;

        let entries = f.log.entries();
        let pos = |needle: &str| entries.iter().position(|e| e == needle).unwrap();
        assert!(pos("dial:10.0.0.1") < pos("tunnel:10.0.0.1:unix:/run/nesting.sock"));
        assert!(pos("tunnel:10.0.0.1:unix:/run/nesting.sock") < pos("create:macos-14:0"));
        assert!(pos("create:macos-14:0") < pos("dial:192.168.64.2"));
        assert!(pos("close:192.168.64.2") < pos("delete:vm-0"));
        assert!(pos("delete:vm-0") < pos("close:10.0.0.1"));
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_wait_is_bounded() {
        let f = Harness::new(one_slot().with_acquire_delay(Duration::from_secs(3600)));
        let cfg = Arc::new(config(VmIsolation::default()));
        let (mut executor, result) = prepare(&f, &cfg, job(7)).await;
        assert!(result.unwrap_err().to_string().contains("timed out after 300s"));
        executor.cleanup().await;
        assert_eq!(f.fleet.releases(), 0);
    }
}
