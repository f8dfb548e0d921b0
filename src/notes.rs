//! Free-text notes kept next to each gear list.
//!
//! `trip.csv` keeps its note in `trip_notes.txt`. A missing file reads as an
//! empty note. Writes go through the same rename-after-write path as lists.

use log::info;
use std::fs;
use std::io;

use crate::error::Result;
use crate::store::{GearStore, normalize_name};

pub const NOTES_SUFFIX: &str = "_notes.txt";

/// Name of the notes file belonging to a gear list.
///
/// # Examples
/// ```
/// use featherpack::notes::notes_file_name;
///
/// assert_eq!(notes_file_name("trip").unwrap(), "trip_notes.txt");
/// assert_eq!(notes_file_name("trip.csv").unwrap(), "trip_notes.txt");
/// ```
pub fn notes_file_name(list_name: &str) -> Result<String> {
    let file_name = normalize_name(list_name)?;
    let base = file_name.strip_suffix(".csv").unwrap_or(&file_name);
    Ok(format!("{}{}", base, NOTES_SUFFIX))
}

pub fn read_notes(store: &GearStore, list_name: &str) -> Result<String> {
    let path = store.path_for(&notes_file_name(list_name)?);
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e.into()),
    }
}

/// Overwrite the note when it differs from `last_loaded`. Returns whether a
/// write happened.
pub fn write_notes_if_changed(
    store: &GearStore,
    list_name: &str,
    last_loaded: &str,
    text: &str,
) -> Result<bool> {
    if text == last_loaded {
        return Ok(false);
    }

    let file_name = notes_file_name(list_name)?;
    store.replace_file(&file_name, text.as_bytes())?;
    info!("Updated notes {}", file_name);
    Ok(true)
}
