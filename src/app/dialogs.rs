//! Native file dialogs for data and settings files.

use std::path::{Path, PathBuf};

use log::warn;

use crate::controller::Controller;
use crate::data::store::{AppendOptions, SaveSubset};
use crate::error::OpStatus;
use crate::io::FileFormat;
use crate::persistence::{load_settings_from_path, save_settings_to_path, Preferences};

fn data_dialog(folder: Option<&Path>) -> rfd::FileDialog {
    let mut dlg = rfd::FileDialog::new();
    for (name, exts) in FileFormat::dialog_filters() {
        dlg = dlg.add_filter(name, exts);
    }
    if let Some(dir) = folder {
        dlg = dlg.set_directory(dir);
    }
    dlg
}

fn settings_dialog(folder: Option<&Path>) -> rfd::FileDialog {
    let mut dlg = rfd::FileDialog::new().add_filter("Plot settings", &["json"]);
    if let Some(dir) = folder {
        dlg = dlg.set_directory(dir);
    }
    dlg
}

fn parent_of(path: &Path) -> Option<PathBuf> {
    path.parent().map(Path::to_path_buf)
}

pub(crate) fn open_data(ctrl: &mut Controller, prefs: &mut Preferences) {
    if let Some(path) = data_dialog(prefs.last_data_folder.as_deref()).pick_file() {
        prefs.last_data_folder = parent_of(&path);
        ctrl.load(&path);
    }
}

pub(crate) fn append_data(ctrl: &mut Controller, prefs: &mut Preferences, options: &AppendOptions) {
    if let Some(path) = data_dialog(prefs.last_data_folder.as_deref()).pick_file() {
        prefs.last_data_folder = parent_of(&path);
        ctrl.append(&path, options);
    }
}

pub(crate) fn save_data(ctrl: &mut Controller, prefs: &mut Preferences, subset: SaveSubset) {
    let file_name = ctrl
        .store()
        .source()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "labels.lpt".to_string());
    if let Some(path) = data_dialog(prefs.last_data_folder.as_deref())
        .set_file_name(file_name)
        .save_file()
    {
        prefs.last_data_folder = parent_of(&path);
        ctrl.save(&path, subset);
    }
}

pub(crate) fn save_settings(ctrl: &mut Controller, prefs: &mut Preferences) {
    let Some(path) = settings_dialog(prefs.last_script_folder.as_deref())
        .set_file_name("plot_settings.json")
        .save_file()
    else {
        return;
    };
    prefs.last_script_folder = parent_of(&path);
    let status = match save_settings_to_path(ctrl.settings(), &path) {
        Ok(()) => OpStatus::ok(format!("Saved settings to {}", path.display())),
        Err(e) => {
            warn!("{:#}", e);
            OpStatus::failed(format!("Saving settings failed: {:#}", e))
        }
    };
    ctrl.set_status(&status);
}

pub(crate) fn load_settings(ctrl: &mut Controller, prefs: &mut Preferences) {
    let Some(path) = settings_dialog(prefs.last_script_folder.as_deref()).pick_file() else {
        return;
    };
    prefs.last_script_folder = parent_of(&path);
    let status = match load_settings_from_path(&path) {
        Ok(snapshot) => {
            ctrl.apply_settings_snapshot(snapshot);
            OpStatus::ok(format!("Loaded settings from {}", path.display()))
        }
        Err(e) => {
            warn!("{:#}", e);
            OpStatus::failed(format!("Loading settings failed: {:#}", e))
        }
    };
    ctrl.set_status(&status);
}
