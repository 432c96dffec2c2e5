//! The migration pipeline.
//!
//! `Idle → ConnectCds → BuildReference → ComputeDiff → [LogDiff] → ApplyDiff →
//! ReconcileData → Done`, with `Failed` reachable from every step. Stages run
//! strictly in sequence and nothing is retried.

pub mod apply;
pub mod changelog;
pub mod diff;
pub mod model;
pub mod reconcile;
pub mod reference;
pub mod statements;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{IsolationStrategy, ResolvedConfig};
use crate::db::{
    ConnectionDescriptor, PgExecutor, ReferenceTarget, SqlExecutor, resolve_reference,
    resolve_target,
};
use crate::error::{AppError, AppResult, ErrorKind};

pub use changelog::ChangelogWriter;
pub use diff::{DiffEngine, MigraDiffEngine};
pub use model::{CompiledModel, DialectTranslator, ModelCompiler};
pub use reconcile::{CsvDataLoader, DataReconciler, MigrationMode, NoopReconciler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    ConnectCds,
    BuildReference,
    ComputeDiff,
    LogDiff,
    ApplyDiff,
    ReconcileData,
    Done,
    Failed,
}

impl PipelineState {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::ConnectCds => "connect-cds",
            PipelineState::BuildReference => "build-reference",
            PipelineState::ComputeDiff => "compute-diff",
            PipelineState::LogDiff => "log-diff",
            PipelineState::ApplyDiff => "apply-diff",
            PipelineState::ReconcileData => "reconcile-data",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub create_db: bool,
    pub mode: MigrationMode,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            create_db: false,
            mode: MigrationMode::FullLoad,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub target: ConnectionDescriptor,
    pub reference: ReferenceTarget,
    pub diff: String,
    pub changelog: Option<PathBuf>,
    pub mode: MigrationMode,
    pub states: Vec<PipelineState>,
}

/// Output of the `diff` command: reference rebuilt, nothing applied.
#[derive(Debug, Clone)]
pub struct DiffReport {
    pub target: ConnectionDescriptor,
    pub reference: ReferenceTarget,
    pub diff: String,
}

/// The collaborators a pipeline drives. Swapped for fakes in tests.
pub struct Components {
    pub compiler: Box<dyn ModelCompiler>,
    pub translator: Box<dyn DialectTranslator>,
    pub executor: Arc<dyn SqlExecutor>,
    pub diff_engine: Box<dyn DiffEngine>,
    pub reconciler: Box<dyn DataReconciler>,
}

impl Components {
    /// Production wiring: PostgreSQL sessions, `migra`, CSV data when configured.
    pub fn for_config(config: &ResolvedConfig) -> Self {
        let executor: Arc<dyn SqlExecutor> = Arc::new(PgExecutor);
        let reconciler: Box<dyn DataReconciler> = if config.service.data_paths.is_empty() {
            Box::new(NoopReconciler)
        } else {
            Box::new(CsvDataLoader::new(
                config.service.data_paths.clone(),
                executor.clone(),
            ))
        };
        Self {
            compiler: model::compiler_for(&config.service.compiler_command),
            translator: model::translator_for(config.service.dialect.as_deref()),
            executor,
            diff_engine: Box::new(MigraDiffEngine::default()),
            reconciler,
        }
    }
}

pub struct Pipeline {
    config: ResolvedConfig,
    components: Components,
    changelog: ChangelogWriter,
}

struct Prepared {
    target: ConnectionDescriptor,
    reference: ReferenceTarget,
    model: CompiledModel,
}

#[derive(Default)]
struct Trace {
    states: Vec<PipelineState>,
}

impl Trace {
    fn enter(&mut self, state: PipelineState) {
        if state != PipelineState::Idle {
            info!(stage = state.as_str(), "entering stage");
        }
        self.states.push(state);
    }

    fn current(&self) -> PipelineState {
        self.states.last().copied().unwrap_or(PipelineState::Idle)
    }
}

impl Pipeline {
    pub fn new(config: ResolvedConfig, components: Components) -> Self {
        let changelog = ChangelogWriter::new(config.migrations.changelog_dir.clone());
        Self {
            config,
            components,
            changelog,
        }
    }

    /// Run every stage. The first failure aborts the run and is returned unchanged.
    pub async fn run(&self, options: RunOptions) -> AppResult<RunReport> {
        let mut trace = Trace::default();
        trace.enter(PipelineState::Idle);
        let result = self.execute(options, &mut trace).await;
        Self::finish(result, &mut trace)
    }

    /// Rebuild the reference and compute the diff without logging or applying it.
    pub async fn diff_only(&self) -> AppResult<DiffReport> {
        let mut trace = Trace::default();
        trace.enter(PipelineState::Idle);
        let result: AppResult<DiffReport> = async {
            let prepared = self.prepare(&mut trace).await?;
            let diff = self.build_and_diff(&prepared, &mut trace).await?;
            Ok(DiffReport {
                target: prepared.target,
                reference: prepared.reference,
                diff,
            })
        }
        .await;
        Self::finish(result, &mut trace)
    }

    fn finish<T>(result: AppResult<T>, trace: &mut Trace) -> AppResult<T> {
        if let Err(err) = &result {
            info!(
                stage = trace.current().as_str(),
                kind = err.kind.as_str(),
                "pipeline failed: {}",
                err
            );
            trace.enter(PipelineState::Failed);
        }
        result
    }

    async fn execute(&self, options: RunOptions, trace: &mut Trace) -> AppResult<RunReport> {
        if options.create_db {
            return Err(AppError::unsupported(
                "--createDB is not supported; create the target database before deploying",
            ));
        }

        let prepared = self.prepare(trace).await?;
        let diff = self.build_and_diff(&prepared, trace).await?;

        let changelog = if diff.is_empty() {
            info!("no schema changes");
            None
        } else {
            trace.enter(PipelineState::LogDiff);
            self.changelog.write(&prepared.target.database, &diff)?
        };

        trace.enter(PipelineState::ApplyDiff);
        apply::apply_diff(self.components.executor.as_ref(), &prepared.target, &diff).await?;

        trace.enter(PipelineState::ReconcileData);
        self.components
            .reconciler
            .reconcile(&prepared.model, options.mode, &prepared.target)
            .await
            .map_err(|err| err.in_stage(ErrorKind::Reconciliation))?;

        trace.enter(PipelineState::Done);
        Ok(RunReport {
            target: prepared.target,
            reference: prepared.reference,
            diff,
            changelog,
            mode: options.mode,
            states: trace.states.clone(),
        })
    }

    async fn prepare(&self, trace: &mut Trace) -> AppResult<Prepared> {
        trace.enter(PipelineState::ConnectCds);
        let migrations = &self.config.migrations;
        if migrations.multitenant || !migrations.tenants.is_empty() {
            warn!(
                tenants = migrations.tenants.len(),
                "multitenant configuration is ignored; deploying the default schema only"
            );
        }

        let target = resolve_target(&self.config.connection, migrations)?;
        let reference = resolve_reference(&target, migrations)?;
        self.components
            .diff_engine
            .check_endpoints(&target, &reference.endpoint)
            .map_err(|err| err.in_stage(ErrorKind::Config))?;
        let model = model::compile_model(
            self.components.compiler.as_ref(),
            self.components.translator.as_ref(),
            &self.config.service.model,
        )
        .await?;

        info!(
            database = %target.database,
            schema = %target.schema,
            strategy = reference.strategy.as_str(),
            reference = %reference.name,
            statements = model.statements.len(),
            "model compiled"
        );
        Ok(Prepared {
            target,
            reference,
            model,
        })
    }

    async fn build_and_diff(&self, prepared: &Prepared, trace: &mut Trace) -> AppResult<String> {
        trace.enter(PipelineState::BuildReference);
        reference::build_reference(
            self.components.executor.as_ref(),
            &prepared.target,
            &prepared.reference,
            &prepared.model,
            self.config.migrations.tmp_file.as_deref(),
        )
        .await?;

        trace.enter(PipelineState::ComputeDiff);
        let diff = self
            .components
            .diff_engine
            .compute_diff(&prepared.target, &prepared.reference.endpoint, true)
            .await
            .map_err(|err| err.in_stage(ErrorKind::DiffComputation))?;
        Ok(diff)
    }
}

/// `schema` or `database`, with the name the reference lives under.
pub fn describe_reference(reference: &ReferenceTarget) -> String {
    match reference.strategy {
        IsolationStrategy::Schema => format!("schema {}", reference.name),
        IsolationStrategy::Database => format!("database {}", reference.name),
    }
}
