//! Extension points: row filters applied during every redraw, and script
//! hooks that act on the store and settings on demand.
//!
//! Hooks are ordinary Rust values registered in a [`HookRegistry`]; there is
//! no evaluation of source text.

use anyhow::Context as _;
use log::{info, warn};

use crate::data::settings::PlotSettingsModel;
use crate::data::store::DatasetStore;
use crate::data::table::{Column, DType, Table};
use crate::error::{HookError, StoreError};

/// Narrows the table shown in the plot. Must keep row identifiers intact.
pub trait RowFilter {
    fn name(&self) -> &str;
    fn filter(&self, table: Table) -> anyhow::Result<Table>;
}

/// What a script hook may ask of the application.
pub trait HookHost {
    /// Show a message to the user.
    fn notify(&mut self, message: &str);
}

/// A named action over the live store and settings. The host replots after
/// it returns.
pub trait ScriptHook {
    fn name(&self) -> &str;
    fn description(&self) -> &str {
        ""
    }
    fn apply(
        &self,
        store: &mut DatasetStore,
        settings: &mut PlotSettingsModel,
        host: &mut dyn HookHost,
    ) -> anyhow::Result<()>;
}

/// [`RowFilter`] from a closure.
pub struct FnFilter<F> {
    name: String,
    f: F,
}

impl<F> FnFilter<F>
where
    F: Fn(Table) -> anyhow::Result<Table>,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

impl<F> RowFilter for FnFilter<F>
where
    F: Fn(Table) -> anyhow::Result<Table>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn filter(&self, table: Table) -> anyhow::Result<Table> {
        (self.f)(table)
    }
}

/// Host that just collects messages.
#[derive(Debug, Default)]
pub struct MessageLog {
    pub messages: Vec<String>,
}

impl HookHost for MessageLog {
    fn notify(&mut self, message: &str) {
        info!("hook: {}", message);
        self.messages.push(message.to_string());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

/// All registered filters (applied in order) and script hooks (by name).
#[derive(Default)]
pub struct HookRegistry {
    filters: Vec<Box<dyn RowFilter>>,
    scripts: Vec<Box<dyn ScriptHook>>,
}

impl HookRegistry {
    /// Registry with the built-in script hooks.
    pub fn with_builtins() -> Self {
        let mut r = Self::default();
        r.add_script(Box::new(NormalizeNumeric));
        r
    }

    pub fn add_filter(&mut self, filter: Box<dyn RowFilter>) {
        self.filters.push(filter);
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
    }

    pub fn filters(&self) -> &[Box<dyn RowFilter>] {
        &self.filters
    }

    /// Register a script hook; one with the same name is replaced.
    pub fn add_script(&mut self, hook: Box<dyn ScriptHook>) {
        self.scripts.retain(|h| h.name() != hook.name());
        self.scripts.push(hook);
    }

    pub fn script_names(&self) -> Vec<&str> {
        self.scripts.iter().map(|h| h.name()).collect()
    }

    pub fn script(&self, name: &str) -> Option<&dyn ScriptHook> {
        self.scripts.iter().find(|h| h.name() == name).map(|h| h.as_ref())
    }

    /// Run the named script hook.
    pub fn run(
        &self,
        name: &str,
        store: &mut DatasetStore,
        settings: &mut PlotSettingsModel,
        host: &mut dyn HookHost,
    ) -> Result<(), HookError> {
        let hook = self.script(name).ok_or_else(|| HookError {
            name: name.to_string(),
            source: anyhow::anyhow!("no hook named '{}'", name),
        })?;
        info!("running hook '{}'", name);
        hook.apply(store, settings, host).map_err(|source| {
            warn!("hook '{}' failed: {:#}", name, source);
            HookError {
                name: name.to_string(),
                source,
            }
        })
    }

    /// Pass `table` through every filter in order. A failing filter is
    /// skipped and its error returned alongside the result.
    pub fn apply_filters(&self, mut table: Table) -> (Table, Vec<HookError>) {
        let mut errors = Vec::new();
        for f in &self.filters {
            let backup = table.clone();
            match f.filter(table) {
                Ok(t) => table = t,
                Err(source) => {
                    warn!("issue while filtering data in view ({}): {:#}", f.name(), source);
                    errors.push(HookError {
                        name: f.name().to_string(),
                        source,
                    });
                    table = backup;
                }
            }
        }
        (table, errors)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Built-in hooks
// ─────────────────────────────────────────────────────────────────────────────

/// Min-max scales every float column to `[0, 1]`. Constant columns become 0.
pub struct NormalizeNumeric;

impl ScriptHook for NormalizeNumeric {
    fn name(&self) -> &str {
        "normalize-numeric"
    }

    fn description(&self) -> &str {
        "Scale every floating point column to the range 0..1"
    }

    fn apply(
        &self,
        store: &mut DatasetStore,
        _settings: &mut PlotSettingsModel,
        host: &mut dyn HookHost,
    ) -> anyhow::Result<()> {
        let mut scaled = 0usize;
        store
            .update_table(|table| {
                let names: Vec<String> = table
                    .columns()
                    .iter()
                    .filter(|c| c.dtype == DType::Float)
                    .map(|c| c.name.clone())
                    .collect();
                for name in names {
                    let Some(col) = table.column(&name) else {
                        continue;
                    };
                    let finite = col.values.iter().filter_map(|v| v.as_f64()).filter(|v| v.is_finite());
                    let (lo, hi) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                        (lo.min(v), hi.max(v))
                    });
                    if !lo.is_finite() {
                        continue;
                    }
                    let span = hi - lo;
                    let values: Vec<f64> = col
                        .values
                        .iter()
                        .map(|v| match v.as_f64() {
                            Some(x) if x.is_finite() && span > 0.0 => (x - lo) / span,
                            Some(x) if x.is_finite() => 0.0,
                            _ => f64::NAN,
                        })
                        .collect();
                    table.set_column(Column::from_f64(name, values))?;
                    scaled += 1;
                }
                Ok::<(), StoreError>(())
            })
            .context("normalizing numeric columns")?;
        host.notify(&format!("Normalized {} columns", scaled));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::Value;

    fn table() -> Table {
        Table::with_sequential_ids(vec![
            Column::from_f64("a", [2.0, 4.0, 6.0]),
            Column::from_text("lbl", [Some("x"), None, Some("y")]),
        ])
        .unwrap()
    }

    #[test]
    fn failing_filter_is_skipped() {
        let mut reg = HookRegistry::default();
        reg.add_filter(Box::new(FnFilter::new("broken", |_t: Table| {
            Err(anyhow::anyhow!("boom"))
        })));
        reg.add_filter(Box::new(FnFilter::new("first-two", |t: Table| Ok(t.take_rows(&[0, 1])))));
        let (out, errors) = reg.apply_filters(table());
        assert_eq!(out.len(), 2);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].name, "broken");
    }

    #[test]
    fn normalize_hook_scales_floats_only() {
        let mut store = DatasetStore::with_io(Box::new(crate::io::MemoryIo::default()));
        store.replace_table(table(), None);
        let mut settings = PlotSettingsModel::default();
        let mut host = MessageLog::default();
        HookRegistry::with_builtins()
            .run("normalize-numeric", &mut store, &mut settings, &mut host)
            .unwrap();
        let t = store.table().unwrap();
        let a: Vec<f64> = t.column("a").unwrap().values.iter().filter_map(Value::as_f64).collect();
        assert_eq!(a, vec![0.0, 0.5, 1.0]);
        assert_eq!(t.column("lbl").unwrap().values[0], Value::Text("x".into()));
        assert_eq!(host.messages, vec!["Normalized 1 columns".to_string()]);
    }

    #[test]
    fn unknown_hook_is_an_error() {
        let mut store = DatasetStore::with_io(Box::new(crate::io::MemoryIo::default()));
        let mut settings = PlotSettingsModel::default();
        let err = HookRegistry::default()
            .run("nope", &mut store, &mut settings, &mut MessageLog::default())
            .unwrap_err();
        assert_eq!(err.name, "nope");
    }
}
