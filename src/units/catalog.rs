// src/units/catalog.rs

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{ConfigFile, Layout};
use crate::engine::{Engine, RunHandle};
use crate::errors::{Result, RunledgerError};
use crate::exec::ProcessRegistry;
use crate::ledger::{ExecutionRecord, Ledger, UnitEntry};
use crate::logcodec;
use crate::naming::{sanitize, sanitize_name};
use crate::schedule::ScheduleSync;
use crate::types::{Runtime, Trigger, UnitKind, UnitStatus};
use crate::units::model::{UnitDefinition, UnitDetail, UnitSummary, ValidUnit};

/// Caller-facing operations on units.
///
/// Owns the ledger, the scheduler sync and the engine (which shares the
/// ledger and the process registry). Every name passes through
/// [`sanitize_name`] before it reaches disk, the ledger or the scheduler.
#[derive(Debug, Clone)]
pub struct Catalog {
    engine: Engine,
    ledger: Arc<Ledger>,
    schedule: Arc<ScheduleSync>,
    layout: Layout,
    config: Arc<ConfigFile>,
}

impl Catalog {
    /// Build everything from a validated config.
    pub fn open(config: ConfigFile) -> Result<Self> {
        let layout = Layout::resolve(&config)?;
        let schedule = ScheduleSync::from_config(&config, &layout);
        Ok(Self::with_parts(config, layout, schedule))
    }

    /// Build from explicit parts; used when the layout or scheduler backend
    /// should not come from the config.
    pub fn with_parts(config: ConfigFile, layout: Layout, schedule: ScheduleSync) -> Self {
        let config = Arc::new(config);
        let ledger = Arc::new(Ledger::new(layout.ledger_path()));
        let registry = Arc::new(ProcessRegistry::new());
        let engine = Engine::new(
            Arc::clone(&ledger),
            registry,
            layout.clone(),
            Arc::clone(&config),
        );

        Self {
            engine,
            ledger,
            schedule: Arc::new(schedule),
            layout,
            config,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn schedule(&self) -> &ScheduleSync {
        &self.schedule
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn create(&self, kind: UnitKind, def: &UnitDefinition) -> Result<UnitSummary> {
        let unit = def.validate(kind)?;
        let service = kind.service();

        if self.find_source(kind, &unit.name).is_some()
            || self.ledger.unit(service, &unit.name)?.is_some()
        {
            return Err(RunledgerError::UnitExists {
                kind,
                name: unit.name,
            });
        }

        let source_path = self.layout.source_path(kind, &unit.name, unit.runtime);
        write_source(&source_path, &unit.source)?;

        let (trigger, schedule) = Trigger::to_ledger_fields(unit.trigger.as_ref());
        let entry = UnitEntry {
            runtime: unit.runtime.name().to_string(),
            trigger,
            schedule,
            source_text: unit.source.clone(),
            status: UnitStatus::Idle,
            executions: Vec::new(),
        };
        self.ledger.upsert_unit(service, &unit.name, entry.clone())?;

        self.sync_schedule(kind, &unit, &source_path);

        info!(kind = %kind, unit = %unit.name, runtime = %unit.runtime, "unit created");
        Ok(UnitSummary::from_entry(kind, &unit.name, &entry, true))
    }

    /// Replace a unit's source and metadata, keeping its status and history.
    pub fn update(&self, kind: UnitKind, def: &UnitDefinition) -> Result<UnitSummary> {
        let unit = def.validate(kind)?;
        let service = kind.service();

        let old_source = self.find_source(kind, &unit.name);
        let old_entry = self.ledger.unit(service, &unit.name)?;
        if old_source.is_none() && old_entry.is_none() {
            return Err(RunledgerError::UnitNotFound {
                kind,
                name: unit.name,
            });
        }

        let source_path = self.layout.source_path(kind, &unit.name, unit.runtime);

        // Lines embed the old path; drop them before the path can change.
        for path in old_source.iter().chain(std::iter::once(&source_path)) {
            if let Err(e) = self.schedule.remove_schedule(path) {
                warn!(kind = %kind, unit = %unit.name, error = %e, "failed to remove old schedule line");
            }
        }

        if let Some(old) = old_source.as_ref().filter(|old| **old != source_path) {
            remove_file_if_exists(old)?;
        }
        write_source(&source_path, &unit.source)?;

        let (trigger, schedule) = Trigger::to_ledger_fields(unit.trigger.as_ref());
        let entry = self.ledger.update(|doc| {
            let entry = doc
                .service_mut(service)
                .units
                .entry(unit.name.clone())
                .or_default();
            entry.runtime = unit.runtime.name().to_string();
            entry.trigger = trigger;
            entry.schedule = schedule;
            entry.source_text = unit.source.clone();
            Ok(entry.clone())
        })?;

        self.sync_schedule(kind, &unit, &source_path);

        info!(kind = %kind, unit = %unit.name, runtime = %unit.runtime, "unit updated");
        Ok(UnitSummary::from_entry(kind, &unit.name, &entry, true))
    }

    /// Remove source, scheduler line and ledger entry. The log is kept.
    pub fn delete(&self, kind: UnitKind, name: &str) -> Result<()> {
        let name = sanitize_name(name)?;
        let service = kind.service();

        let source = self.find_source(kind, &name);
        let entry = self.ledger.unit(service, &name)?;
        if source.is_none() && entry.is_none() {
            return Err(RunledgerError::UnitNotFound { kind, name });
        }

        if self.engine.is_running(kind, &name) {
            if let Err(e) = self.engine.stop(kind, &name) {
                debug!(kind = %kind, unit = %name, error = %e, "unit finished before delete could stop it");
            }
        }

        if entry.as_ref().is_none_or(UnitEntry::is_triggered) {
            let mut paths: Vec<PathBuf> = source.iter().cloned().collect();
            if let Some(runtime) = entry.as_ref().and_then(|e| e.runtime.parse::<Runtime>().ok()) {
                paths.push(self.layout.source_path(kind, &name, runtime));
            }
            paths.dedup();
            for path in &paths {
                if let Err(e) = self.schedule.remove_schedule(path) {
                    warn!(kind = %kind, unit = %name, error = %e, "failed to remove schedule line");
                }
            }
        }

        if let Some(path) = &source {
            remove_file_if_exists(path)?;
        }
        self.ledger.remove_unit(service, &name)?;

        info!(kind = %kind, unit = %name, "unit deleted");
        Ok(())
    }

    /// Units found on disk merged with units known to the ledger.
    pub fn list(&self, kind: UnitKind) -> Result<Vec<UnitSummary>> {
        let doc = self.ledger.read()?;
        let units = doc.service(kind.service()).map(|s| &s.units);

        let mut summaries: BTreeMap<String, UnitSummary> = BTreeMap::new();

        for (name, runtime) in self.scan_sources(kind)? {
            let summary = match units.and_then(|u| u.get(&name)) {
                Some(entry) => UnitSummary::from_entry(kind, &name, entry, true),
                None => UnitSummary::from_file(kind, &name, runtime),
            };
            summaries.insert(name, summary);
        }

        for (name, entry) in units.into_iter().flatten() {
            summaries
                .entry(name.clone())
                .or_insert_with(|| UnitSummary::from_entry(kind, name, entry, false));
        }

        Ok(summaries.into_values().collect())
    }

    pub fn show(&self, kind: UnitKind, name: &str) -> Result<UnitDetail> {
        let name = sanitize_name(name)?;
        let source_path = self.find_source(kind, &name);
        let entry = self.ledger.unit(kind.service(), &name)?;

        let (summary, fallback_source) = match (&entry, &source_path) {
            (Some(entry), _) => (
                UnitSummary::from_entry(kind, &name, entry, source_path.is_some()),
                entry.source_text.clone(),
            ),
            (None, Some(path)) => (
                UnitSummary::from_file(kind, &name, runtime_of(path)),
                String::new(),
            ),
            (None, None) => return Err(RunledgerError::UnitNotFound { kind, name }),
        };

        let source = match &source_path {
            Some(path) => fs::read_to_string(path)?,
            None => fallback_source,
        };

        Ok(UnitDetail {
            summary,
            source,
            source_path,
            log_path: self.layout.log_path(kind, &name),
        })
    }

    /// Most recent execution, from the unit's log.
    pub fn latest_execution(&self, kind: UnitKind, name: &str) -> Result<Option<ExecutionRecord>> {
        let name = self.existing_name(kind, name)?;
        logcodec::latest(&self.layout.log_path(kind, &name))
    }

    /// Every execution in the unit's log, oldest first.
    pub fn history(&self, kind: UnitKind, name: &str) -> Result<Vec<ExecutionRecord>> {
        let name = self.existing_name(kind, name)?;
        logcodec::read_log(&self.layout.log_path(kind, &name))
    }

    pub fn run(&self, kind: UnitKind, name: &str) -> Result<RunHandle> {
        self.engine.run(kind, name)
    }

    pub fn stop(&self, kind: UnitKind, name: &str) -> Result<()> {
        self.engine.stop(kind, name)
    }

    pub fn enable_service(&self, kind: UnitKind) -> Result<()> {
        self.ledger.enable(kind.service())
    }

    pub fn disable_service(&self, kind: UnitKind) -> Result<()> {
        self.ledger.disable(kind.service())
    }

    pub fn service_enabled(&self, kind: UnitKind) -> Result<bool> {
        self.ledger.is_enabled(kind.service())
    }

    /// Add the scheduler line for a triggered unit.
    ///
    /// A failure here leaves the ledger ahead of the scheduler; it is logged
    /// rather than rolled back.
    fn sync_schedule(&self, kind: UnitKind, unit: &ValidUnit, source_path: &Path) {
        let Some(Trigger::Cron(expr)) = &unit.trigger else {
            return;
        };

        let interpreter = self.config.interpreter(unit.runtime);
        let log_path = self.layout.log_path(kind, &unit.name);
        if let Err(e) = self
            .schedule
            .add_schedule(source_path, expr, interpreter, &log_path)
        {
            warn!(
                kind = %kind,
                unit = %unit.name,
                error = %e,
                "ledger updated but schedule line could not be written"
            );
        }
    }

    fn existing_name(&self, kind: UnitKind, name: &str) -> Result<String> {
        let name = sanitize_name(name)?;
        if self.find_source(kind, &name).is_none()
            && self.ledger.unit(kind.service(), &name)?.is_none()
        {
            return Err(RunledgerError::UnitNotFound { kind, name });
        }
        Ok(name)
    }

    /// Source file for `name`, whatever its runtime's extension.
    fn find_source(&self, kind: UnitKind, name: &str) -> Option<PathBuf> {
        Runtime::ALL
            .iter()
            .map(|runtime| self.layout.source_path(kind, name, *runtime))
            .find(|path| path.is_file())
    }

    /// `(name, runtime guessed from extension)` for every source file.
    fn scan_sources(&self, kind: UnitKind) -> Result<Vec<(String, Option<Runtime>)>> {
        let dir = self.layout.source_dir(kind);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut found = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            // Files we could not have written ourselves are not units.
            if stem.is_empty() || sanitize(stem) != stem {
                continue;
            }
            found.push((stem.to_string(), runtime_of(&path)));
        }
        Ok(found)
    }
}

fn runtime_of(path: &Path) -> Option<Runtime> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(Runtime::from_extension)
}

fn write_source(path: &Path, source: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, source)?;
    Ok(())
}

fn remove_file_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
