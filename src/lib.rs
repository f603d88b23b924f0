/*!
# AssetHub

Equipment asset management for field teams: print QR maintenance
checklists and run scan-to-confirm audits against a master asset sheet,
built in Rust.

## Overview

A master sheet of equipment rows (from an uploaded `.xlsx` or a remote
spreadsheet API) is held in memory for the session. Operators look up
management numbers to produce printable checklists, and walk the floor
scanning QR codes to mark each asset as audited. Audited rows are then
synced back to the remote sheet, stamped with the center and zone where
the audit took place.

## Architecture

### Frontend Layer
- **Technologies**: HTML, CSS, JavaScript (browser camera + QR decoder)
- **Screens**:
  - Home - data source status, file upload and cloud connection
  - Checklist - batch search, spreadsheet export and print preview
  - Audit - live scanner, review overlay and pending audit list

### Backend Layer
- **Technologies**: Rust, axum
- **Core Components**:
  - Row Store - ordered asset rows with first-match identifier lookup
  - Checklist Builder - identifiers to checklist entries plus misses
  - Audit Session - scan/review/cooldown state machine with a single
    sync slot
  - Sync Gateway - uploads the pending audit view and optionally reads
    it back

### Data Persistence Layer
- Master import from `.xlsx`/`.xls` (calamine)
- Checklist and audit result export to `.xlsx` (rust_xlsxwriter)
- Session snapshot with Gzip compression and bincode serialization

## Modules

- **columns**: field table and local/remote header mapping
- **record**: asset rows, audit marks and locations
- **store**: the row store and its mutations
- **checklist**: checklist entries built from management numbers
- **camera**: scanner capability and lifecycle guard
- **audit**: the scan-to-confirm state machine
- **session**: the session owner tying the store to the audit flow
- **saving**: snapshot persistence
- **remote**: remote spreadsheet API client
- **sync**: audit and checklist uploads
- **loader**: master file import
- **downloader**: workbook export (checklists, audit results)
- **qr**: QR code rendering
- **print**: printable checklist page
- **config**: environment configuration
- **app**: routing and handlers

## REST API Endpoints

- `/api/status` - Session summary
- `/api/upload` - Import a master file
- `/api/cloud/connect`, `/api/cloud/sheets`, `/api/cloud/locations` - Remote sheet
- `/api/checklist/search`, `/api/checklist/export`, `/api/checklist/push` - Checklists
- `/checklist/print` - Printable checklist page
- `/api/audit/state`, `/api/audit/scan`, `/api/audit/confirm`, `/api/audit/cancel` - Audit flow
- `/api/audit/camera`, `/api/audit/camera/reset` - Camera status
- `/api/audit/sync` - Upload audited rows
- `/api/export/master` - Download the store with audit results
*/

pub mod audit;
pub mod camera;
pub mod checklist;
pub mod columns;
pub mod error;
pub mod record;
pub mod saving;
pub mod store;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod config;
#[cfg(feature = "web")]
pub mod downloader;
#[cfg(feature = "web")]
pub mod loader;
#[cfg(feature = "web")]
pub mod print;
#[cfg(feature = "web")]
pub mod qr;
#[cfg(feature = "web")]
pub mod remote;
#[cfg(feature = "web")]
pub mod session;
#[cfg(feature = "web")]
pub mod sync;

pub use audit::{AuditSession, AuditState, DecodeOutcome};
pub use camera::{BrowserScanner, CameraStatus, Scanner};
pub use checklist::{ChecklistBatch, ChecklistEntry};
pub use error::{AppError, CameraError, Result};
pub use record::{AssetRecord, AuditMark, Location};
pub use store::{RowStore, StoreMutation};

#[cfg(feature = "web")]
pub use session::{DataSource, Session};
#[cfg(feature = "web")]
pub use sync::{Delivery, SyncGateway, SyncReceipt};
