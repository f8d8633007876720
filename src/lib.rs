//! LabelPlot crate root: re-exports and module wiring.
//!
//! LabelPlot is an interactive annotator for multivariate time series built on
//! egui/eframe. The crate is split into cohesive modules:
//! - `data`: the table, row sets, bounded ranges and plot settings
//! - `events`: typed change notifications and their fan-out
//! - `geometry`: gesture-to-row translation and selection recoloring
//! - `render`: derives a toolkit-independent figure from store + settings
//! - `controller`: keeps store, settings, view and figure in sync
//! - `io`: table load/save per file format
//! - `hooks`: row filters and script hooks
//! - `persistence`: user preferences and settings files
//! - `app`: the eframe application

pub mod app;
pub mod color_scheme;
pub mod controller;
pub mod data;
pub mod error;
pub mod events;
pub mod geometry;
pub mod hooks;
pub mod io;
pub mod persistence;
pub mod render;

// Public re-exports for a compact external API
pub use app::{run_labelplot, LabelPlotApp, LaunchOptions};
pub use controller::Controller;
pub use data::range::{AxisValue, LimitedRange, LimitedValue};
pub use data::selection::SelectionMode;
pub use data::settings::{PlotSettings, PlotSettingsModel};
pub use data::store::DatasetStore;
pub use data::table::{Column, RowId, RowSet, Table, Value};
pub use error::{LoadError, OpStatus, RenderError, SaveError, StoreError};
pub use events::{DatasetEvent, EventController, EventFilter, EventKind, SettingsEvent};
