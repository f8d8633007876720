//! Typed change notifications.
//!
//! Each state owner emits exactly one event enum: [`DatasetEvent`] from the
//! dataset store and [`SettingsEvent`] from the plot settings model. Every event
//! maps onto one or more [`EventKind`] flags (bitflags-style), so observers can
//! subscribe with an [`EventFilter`] and only receive what they care about.
//!
//! Delivery happens through [`EventController`], which fans events out to
//! `mpsc` channels. Receivers are drained synchronously by the controller on
//! the UI thread.

use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};

// ─────────────────────────────────────────────────────────────────────────────
// EventKind – bitflags
// ─────────────────────────────────────────────────────────────────────────────

/// Bitflags describing the *categories* an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKind(pub u64);

impl EventKind {
    // ── Dataset ─────────────────────────────────────────────────────────
    /// The table was replaced wholesale (load).
    pub const TABLE_REPLACED: Self = Self(1 << 0);
    /// Cells or columns of the current table changed (label, merge, append).
    pub const TABLE_CHANGED: Self = Self(1 << 1);
    /// The row selection changed.
    pub const SELECTION_CHANGED: Self = Self(1 << 2);
    /// The hidden set changed.
    pub const HIDDEN_CHANGED: Self = Self(1 << 3);
    /// The file backing the table changed.
    pub const FILE_SOURCE_CHANGED: Self = Self(1 << 4);

    // ── Plot settings ───────────────────────────────────────────────────
    /// Columns to plot, their x-axis, plot type or coloring changed.
    pub const SERIES_SETTINGS: Self = Self(1 << 8);
    /// Plot domain interval changed.
    pub const DOMAIN_CHANGED: Self = Self(1 << 9);
    /// Spectrogram toggle/column/lines/brightness/quality/colormap changed.
    pub const SPECTROGRAM_SETTINGS: Self = Self(1 << 10);
    /// Cosmetic settings (font size) changed.
    pub const STYLE_SETTINGS: Self = Self(1 << 11);
    /// Gap-fill tolerance changed (no redraw needed).
    pub const SELECTION_SETTINGS: Self = Self(1 << 12);
    /// Everything was reset to defaults.
    pub const SETTINGS_RESET: Self = Self(1 << 13);

    /// Any dataset event.
    pub const DATASET: Self = Self(0xff);
    /// Any settings event.
    pub const SETTINGS: Self = Self(0xff00);
    /// Wildcard: matches *every* event kind.
    pub const ALL: Self = Self(u64::MAX);

    /// Combine two event kinds (bitwise OR).
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Check whether `self` contains all bits in `other`.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Check whether `self` intersects with `other` (at least one bit in common).
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    /// Returns `true` if no bits are set.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for EventKind {
    type Output = Self;
    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for EventKind {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitAnd for EventKind {
    type Output = Self;
    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "EMPTY");
        }
        if *self == EventKind::ALL {
            return write!(f, "ALL");
        }

        let pairs: &[(EventKind, &str)] = &[
            (EventKind::TABLE_REPLACED, "TABLE_REPLACED"),
            (EventKind::TABLE_CHANGED, "TABLE_CHANGED"),
            (EventKind::SELECTION_CHANGED, "SELECTION_CHANGED"),
            (EventKind::HIDDEN_CHANGED, "HIDDEN_CHANGED"),
            (EventKind::FILE_SOURCE_CHANGED, "FILE_SOURCE_CHANGED"),
            (EventKind::SERIES_SETTINGS, "SERIES_SETTINGS"),
            (EventKind::DOMAIN_CHANGED, "DOMAIN_CHANGED"),
            (EventKind::SPECTROGRAM_SETTINGS, "SPECTROGRAM_SETTINGS"),
            (EventKind::STYLE_SETTINGS, "STYLE_SETTINGS"),
            (EventKind::SELECTION_SETTINGS, "SELECTION_SETTINGS"),
            (EventKind::SETTINGS_RESET, "SETTINGS_RESET"),
        ];

        let mut names = Vec::new();
        let mut known_bits: u64 = 0;
        for (kind, name) in pairs {
            known_bits |= kind.0;
            if self.contains(*kind) {
                names.push((*name).to_string());
            }
        }
        let extra = self.0 & !known_bits;
        if extra != 0 {
            names.push(format!("0x{:x}", extra));
        }
        write!(f, "{}", names.join("|"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// Anything that can travel through an [`EventController`].
pub trait Event: Clone + std::fmt::Debug {
    fn kinds(&self) -> EventKind;
}

/// Notifications emitted by [`crate::data::store::DatasetStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetEvent {
    TableReplaced,
    TableChanged,
    SelectionChanged,
    HiddenChanged,
    FileSourceChanged(Option<PathBuf>),
}

impl Event for DatasetEvent {
    fn kinds(&self) -> EventKind {
        match self {
            DatasetEvent::TableReplaced => EventKind::TABLE_REPLACED | EventKind::TABLE_CHANGED,
            DatasetEvent::TableChanged => EventKind::TABLE_CHANGED,
            DatasetEvent::SelectionChanged => EventKind::SELECTION_CHANGED,
            DatasetEvent::HiddenChanged => EventKind::HIDDEN_CHANGED,
            DatasetEvent::FileSourceChanged(_) => EventKind::FILE_SOURCE_CHANGED,
        }
    }
}

/// Which plot setting changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsField {
    XAxis,
    PlotList,
    PlottedLabels,
    PlotType,
    ColorMethod,
    ColorColumn,
    PlotDomain,
    SpectrogramEnabled,
    SpectrogramColumn,
    SpectrogramLines,
    SpectrogramBrightness,
    SpectrogramQuality,
    SpectrogramColormap,
    FontSize,
    GapFill,
    LabelPresets,
}

/// Notifications emitted by [`crate::data::settings::PlotSettingsModel`].
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsEvent {
    Changed(SettingsField),
    Reset,
}

impl Event for SettingsEvent {
    fn kinds(&self) -> EventKind {
        use SettingsField::*;
        match self {
            SettingsEvent::Reset => EventKind::SETTINGS_RESET,
            SettingsEvent::Changed(field) => match field {
                XAxis | PlotList | PlottedLabels | PlotType | ColorMethod | ColorColumn => {
                    EventKind::SERIES_SETTINGS
                }
                PlotDomain => EventKind::DOMAIN_CHANGED,
                SpectrogramEnabled
                | SpectrogramColumn
                | SpectrogramLines
                | SpectrogramBrightness
                | SpectrogramQuality
                | SpectrogramColormap => EventKind::SPECTROGRAM_SETTINGS,
                FontSize => EventKind::STYLE_SETTINGS,
                GapFill | LabelPresets => EventKind::SELECTION_SETTINGS,
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EventFilter
// ─────────────────────────────────────────────────────────────────────────────

/// An OR-mask: an event is delivered when `event.kinds().intersects(mask)`.
#[derive(Debug, Clone, Copy)]
pub struct EventFilter {
    pub mask: EventKind,
}

impl EventFilter {
    /// Accept all events.
    pub const fn all() -> Self {
        Self {
            mask: EventKind::ALL,
        }
    }

    /// Accept only the specified event kinds.
    pub const fn only(mask: EventKind) -> Self {
        Self { mask }
    }

    #[inline]
    pub fn matches<E: Event>(&self, event: &E) -> bool {
        event.kinds().intersects(self.mask)
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::all()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EventController
// ─────────────────────────────────────────────────────────────────────────────

struct Subscriber<E> {
    filter: EventFilter,
    sender: Sender<E>,
}

/// Fans events of one type out to subscribers.
///
/// Cloning shares the subscriber list, so the owner of the state and the
/// observers can each hold a handle.
pub struct EventController<E> {
    inner: Arc<Mutex<Vec<Subscriber<E>>>>,
}

impl<E> Clone for EventController<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Event> EventController<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Subscribe to events matching the given filter.
    pub fn subscribe(&self, filter: EventFilter) -> Receiver<E> {
        let (tx, rx) = std::sync::mpsc::channel();
        if let Ok(mut subs) = self.inner.lock() {
            subs.push(Subscriber { filter, sender: tx });
        }
        rx
    }

    /// Subscribe to *all* events (no filtering).
    pub fn subscribe_all(&self) -> Receiver<E> {
        self.subscribe(EventFilter::all())
    }

    /// Emit an event to every matching subscriber, dropping closed channels.
    pub fn emit(&self, event: E) {
        log::debug!("emit {:?} ({})", event, event.kinds());
        if let Ok(mut subs) = self.inner.lock() {
            subs.retain(|sub| {
                if sub.filter.matches(&event) {
                    sub.sender.send(event.clone()).is_ok()
                } else {
                    true
                }
            });
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl<E: Event> Default for EventController<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain every pending event from a receiver without blocking.
pub fn drain<E>(rx: &Receiver<E>) -> Vec<E> {
    rx.try_iter().collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaced_table_is_also_a_table_change() {
        let k = DatasetEvent::TableReplaced.kinds();
        assert!(k.contains(EventKind::TABLE_CHANGED));
        assert!(EventKind::DATASET.contains(k));
        assert!(!EventKind::SETTINGS.intersects(k));
    }

    #[test]
    fn settings_fields_map_to_categories() {
        let ev = SettingsEvent::Changed(SettingsField::GapFill);
        assert_eq!(ev.kinds(), EventKind::SELECTION_SETTINGS);
        let ev = SettingsEvent::Changed(SettingsField::SpectrogramColormap);
        assert!(EventFilter::only(EventKind::SPECTROGRAM_SETTINGS).matches(&ev));
    }

    #[test]
    fn controller_delivers_by_filter() {
        let ctrl: EventController<DatasetEvent> = EventController::new();
        let rx_all = ctrl.subscribe_all();
        let rx_sel = ctrl.subscribe(EventFilter::only(EventKind::SELECTION_CHANGED));

        ctrl.emit(DatasetEvent::HiddenChanged);
        ctrl.emit(DatasetEvent::SelectionChanged);

        assert_eq!(
            drain(&rx_all),
            vec![DatasetEvent::HiddenChanged, DatasetEvent::SelectionChanged]
        );
        assert_eq!(drain(&rx_sel), vec![DatasetEvent::SelectionChanged]);
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let ctrl: EventController<SettingsEvent> = EventController::new();
        let rx = ctrl.subscribe_all();
        drop(ctrl.subscribe_all());
        assert_eq!(ctrl.subscriber_count(), 2);
        ctrl.emit(SettingsEvent::Reset);
        assert_eq!(ctrl.subscriber_count(), 1);
        assert_eq!(drain(&rx), vec![SettingsEvent::Reset]);
    }

    #[test]
    fn display_lists_flag_names() {
        let k = EventKind::SELECTION_CHANGED | EventKind::HIDDEN_CHANGED;
        assert_eq!(k.to_string(), "SELECTION_CHANGED|HIDDEN_CHANGED");
        assert_eq!(EventKind(0).to_string(), "EMPTY");
    }
}
