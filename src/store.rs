//! CSV persistence for gear lists.
//!
//! A [`GearStore`] owns one data directory. Every `*.csv` file in it is a gear
//! list. Saves replace the whole file through a temporary file in the same
//! directory, so a failed write never leaves a truncated list behind.

use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::aggregate::sort_gear_list;
use crate::error::{Result, StoreError};
use crate::item::{COLUMNS, Column, GearList, Item};

pub const LIST_EXTENSION: &str = "csv";

lazy_static! {
    static ref NAME_REGEX: Regex = Regex::new(r"^[A-Za-z0-9 _.\-]+$").unwrap();
}

/// Trim a user supplied list name and append `.csv` when missing.
///
/// # Examples
/// ```
/// use featherpack::store::normalize_name;
///
/// assert_eq!(normalize_name("trip").unwrap(), "trip.csv");
/// assert_eq!(normalize_name(" trip.csv ").unwrap(), "trip.csv");
/// assert!(normalize_name("../etc/passwd").is_err());
/// ```
pub fn normalize_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty()
        || name.starts_with('.')
        || name.contains("..")
        || !NAME_REGEX.is_match(name)
    {
        return Err(StoreError::InvalidName(name.to_string()));
    }

    if name.ends_with(".csv") {
        Ok(name.to_string())
    } else {
        Ok(format!("{}.{}", name, LIST_EXTENSION))
    }
}

/// A directory of gear list files.
#[derive(Clone, Debug)]
pub struct GearStore {
    dir: PathBuf,
}

impl GearStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        GearStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a file inside the data directory. `file_name` must already be
    /// normalized.
    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Create an empty gear list, overwriting any list with the same name.
    /// Returns the normalized file name.
    pub fn create(&self, name: &str) -> Result<String> {
        let file_name = normalize_name(name)?;
        self.write_list(&file_name, &GearList::new())?;
        info!("Created gear list {}", file_name);
        Ok(file_name)
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        let file_name = normalize_name(name)?;
        Ok(self.path_for(&file_name).is_file())
    }

    /// Read and parse a gear list.
    pub fn load(&self, name: &str) -> Result<GearList> {
        let file_name = normalize_name(name)?;
        let path = self.path_for(&file_name);
        let file = File::open(&path).map_err(|e| not_found_or_io(e, &file_name))?;

        let list = read_list(file)?;
        debug!("Loaded {} rows from {}", list.len(), file_name);
        Ok(list)
    }

    /// Read a gear list and the fingerprint of the exact bytes it was parsed
    /// from.
    pub fn load_with_fingerprint(&self, name: &str) -> Result<(GearList, String)> {
        let file_name = normalize_name(name)?;
        let bytes =
            fs::read(self.path_for(&file_name)).map_err(|e| not_found_or_io(e, &file_name))?;

        let list = read_list(&bytes[..])?;
        debug!("Loaded {} rows from {}", list.len(), file_name);
        Ok((list, fingerprint_bytes(&bytes)))
    }

    /// Sort and write a gear list, replacing the previous file. Returns the
    /// fingerprint of the written file.
    pub fn save(&self, name: &str, list: &GearList) -> Result<String> {
        let file_name = normalize_name(name)?;
        let sorted = sort_gear_list(list);
        let fingerprint = self.write_list(&file_name, &sorted)?;
        info!("Saved {} rows to {}", sorted.len(), file_name);
        Ok(fingerprint)
    }

    /// All gear lists in the data directory, sorted by file name.
    pub fn list_available(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();

        for entry in fs::read_dir(&self.dir)?.flatten() {
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some(LIST_EXTENSION)
            {
                if let Some(file_name) = path.file_name().and_then(|name| name.to_str()) {
                    names.push(file_name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    /// SHA-256 of the list file as it is on disk right now.
    pub fn fingerprint(&self, name: &str) -> Result<String> {
        let file_name = normalize_name(name)?;
        let bytes =
            fs::read(self.path_for(&file_name)).map_err(|e| not_found_or_io(e, &file_name))?;
        Ok(fingerprint_bytes(&bytes))
    }

    /// Write bytes to a file in the data directory via rename-after-write.
    pub(crate) fn replace_file(&self, file_name: &str, contents: &[u8]) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(contents)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_for(file_name))
            .map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    fn write_list(&self, file_name: &str, list: &GearList) -> Result<String> {
        let contents = write_list(list)?;
        self.replace_file(file_name, &contents)?;
        Ok(fingerprint_bytes(&contents))
    }
}

fn fingerprint_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn not_found_or_io(e: io::Error, file_name: &str) -> StoreError {
    if e.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound(file_name.to_string())
    } else {
        StoreError::Io(e)
    }
}

/// Parse gear list CSV from any reader.
pub fn read_list<R: io::Read>(reader: R) -> Result<GearList> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers().map_err(csv_to_parse)?.clone();
    let mut positions: HashMap<usize, usize> = HashMap::new();
    for (index, header) in headers.iter().enumerate() {
        if let Some(column) = Column::from_header(header) {
            positions.entry(column as usize).or_insert(index);
        }
    }

    for column in Column::ALL {
        if !positions.contains_key(&(column as usize)) {
            return Err(StoreError::parse(
                1,
                format!("missing required column '{}'", column.header()),
            ));
        }
    }

    let mut items = Vec::new();
    for record in csv_reader.records() {
        let record = record.map_err(csv_to_parse)?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let field = |column: Column| field_value(&record, &positions, column);

        items.push(Item {
            name: field(Column::Name).to_string(),
            desc: field(Column::Desc).to_string(),
            category: field(Column::Category).to_string(),
            weight: parse_weight(field(Column::Weight), line)?,
            quantity: parse_quantity(field(Column::Qty), line)?,
            wearable: parse_flag(field(Column::Wearable), Column::Wearable, line)?,
            consumable: parse_flag(field(Column::Consumable), Column::Consumable, line)?,
            luxury: parse_flag(field(Column::Luxury), Column::Luxury, line)?,
        });
    }

    Ok(GearList::from_items(items))
}

/// Serialize a gear list to CSV bytes, header first, rows in list order.
pub fn write_list(list: &GearList) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(COLUMNS)?;

    for item in &list.items {
        let weight = format_weight(item.weight);
        let quantity = item.quantity.to_string();
        writer.write_record([
            item.name.as_str(),
            item.desc.as_str(),
            item.category.as_str(),
            weight.as_str(),
            quantity.as_str(),
            format_flag(item.wearable),
            format_flag(item.consumable),
            format_flag(item.luxury),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| StoreError::Io(io::Error::other(e.to_string())))
}

fn field_value<'r>(
    record: &'r csv::StringRecord,
    positions: &HashMap<usize, usize>,
    column: Column,
) -> &'r str {
    positions
        .get(&(column as usize))
        .and_then(|index| record.get(*index))
        .unwrap_or("")
}

fn csv_to_parse(e: csv::Error) -> StoreError {
    let line = e.position().map(|p| p.line()).unwrap_or(0);
    StoreError::parse(line, e.to_string())
}

fn parse_weight(value: &str, line: u64) -> Result<f64> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0.0);
    }
    match value.parse::<f64>() {
        Ok(weight) if weight.is_finite() => Ok(weight),
        _ => Err(StoreError::parse(
            line,
            format!("weight '{}' is not a number", value),
        )),
    }
}

fn parse_quantity(value: &str, line: u64) -> Result<i64> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0);
    }
    if let Ok(quantity) = value.parse::<i64>() {
        return Ok(quantity);
    }
    // Columns that once held a blank are written back as floats, e.g. "2.0".
    match value.parse::<f64>() {
        Ok(quantity)
            if quantity.fract() == 0.0
                && quantity >= i64::MIN as f64
                && quantity < i64::MAX as f64 =>
        {
            Ok(quantity as i64)
        }
        _ => Err(StoreError::parse(
            line,
            format!("quantity '{}' is not a whole number", value),
        )),
    }
}

fn parse_flag(value: &str, column: Column, line: u64) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "false" | "0" | "no" => Ok(false),
        "true" | "1" | "yes" => Ok(true),
        other => Err(StoreError::parse(
            line,
            format!("{} value '{}' is not a boolean", column.header(), other),
        )),
    }
}

fn format_weight(weight: f64) -> String {
    if weight.is_finite() && weight.fract() == 0.0 && weight.abs() < 1e15 {
        format!("{}", weight as i64)
    } else {
        weight.to_string()
    }
}

fn format_flag(flag: bool) -> &'static str {
    if flag { "True" } else { "False" }
}
