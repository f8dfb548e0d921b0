//! Download bundle for a gear list.
//!
//! The list's CSV file and, when present, its notes file are packed into a
//! gzip-compressed tar archive built in memory.

use chrono::Utc;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs;
use std::io;
use std::path::Path;

use crate::error::{Result, StoreError};
use crate::notes::notes_file_name;
use crate::store::{GearStore, normalize_name};

/// File name offered for the download of `list_name`, e.g. `trip.tar.gz`.
pub fn archive_file_name(list_name: &str) -> Result<String> {
    let file_name = normalize_name(list_name)?;
    let base = file_name.strip_suffix(".csv").unwrap_or(&file_name);
    Ok(format!("{}.tar.gz", base))
}

/// Bundle a list and its notes into `.tar.gz` bytes.
///
/// # Examples
/// ```no_run
/// use featherpack::export::export_archive;
/// use featherpack::store::GearStore;
///
/// let store = GearStore::new(".");
/// match export_archive(&store, "trip") {
///     Ok(bytes) => println!("Archive generated: {} bytes", bytes.len()),
///     Err(e) => eprintln!("Failed to export: {}", e),
/// }
/// ```
pub fn export_archive(store: &GearStore, list_name: &str) -> Result<Vec<u8>> {
    let file_name = normalize_name(list_name)?;
    let list_path = store.path_for(&file_name);
    let list_bytes = fs::read(&list_path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound(file_name.clone())
        } else {
            StoreError::Io(e)
        }
    })?;

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut archive = tar::Builder::new(encoder);
    append_file(&mut archive, &file_name, &list_bytes)?;

    let notes_name = notes_file_name(&file_name)?;
    match fs::read(store.path_for(&notes_name)) {
        Ok(notes) => append_file(&mut archive, &notes_name, &notes)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let encoder = archive.into_inner()?;
    Ok(encoder.finish()?)
}

/// Write the archive for `list_name` to `out`.
pub fn export_to_file(store: &GearStore, list_name: &str, out: impl AsRef<Path>) -> Result<usize> {
    let bytes = export_archive(store, list_name)?;
    fs::write(out, &bytes)?;
    Ok(bytes.len())
}

fn append_file<W: io::Write>(archive: &mut tar::Builder<W>, name: &str, data: &[u8]) -> Result<()> {
    let mtime = Utc::now().timestamp().max(0) as u64;

    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(mtime);
    header.set_cksum();
    archive.append_data(&mut header, name, data)?;
    Ok(())
}
