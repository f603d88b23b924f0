use bincode::{deserialize_from, serialize_into};
use chrono::{DateTime, Local};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::store::RowStore;

/// What survives a restart: the rows (with unsynced audit marks) and when
/// the session last talked to the remote sheet.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Snapshot {
    pub store: RowStore,
    pub source: Option<String>,
    pub last_sync: Option<String>,
}

impl Snapshot {
    pub fn last_sync_time(&self) -> Option<DateTime<Local>> {
        self.last_sync
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Local))
    }
}

pub fn save_snapshot(snapshot: &Snapshot, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    // Write next to the target and rename so a crash never leaves half a file.
    let tmp = path.with_extension("tmp");
    {
        let file = File::create(&tmp)?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut writer = BufWriter::new(encoder);
        serialize_into(&mut writer, snapshot)?;
        writer.flush()?;
        let encoder = writer.into_inner().map_err(|e| e.into_error())?;
        encoder.finish()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Snapshot> {
    let file = File::open(path)?;
    let decoder = GzDecoder::new(file);
    let mut reader = BufReader::new(decoder);
    Ok(deserialize_from(&mut reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AssetRecord, AuditMark};
    use crate::store::StoreMutation;
    use chrono::NaiveDate;

    #[test]
    fn pending_marks_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.bin.gz");

        let mut store = RowStore::from_rows(
            vec!["관리번호".into()],
            vec![AssetRecord::from_pairs([("관리번호", "A1")])],
        );
        let mark = AuditMark::on(NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());
        store.apply(StoreMutation::Mark { index: 0, mark });

        let snapshot = Snapshot {
            store,
            source: Some("master.xlsx".into()),
            last_sync: Some(Local::now().to_rfc3339()),
        };
        save_snapshot(&snapshot, &path).unwrap();

        let loaded = load_snapshot(&path).unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.store.pending_audit().len(), 1);
        assert!(loaded.last_sync_time().is_some());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_snapshot(dir.path().join("nope.bin.gz")),
            Err(crate::error::AppError::Io(_))
        ));
    }
}
