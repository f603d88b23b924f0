#![cfg(not(tarpaulin_include))]

//! `assethub-cli`: checklists and audits without the browser.
//!
//! The `audit` loop reads one scanned code per line, which is what a
//! keyboard-wedge QR reader produces.

use assethub::camera::Scanner;
use assethub::checklist;
use assethub::config::Config;
use assethub::downloader;
use assethub::error::{CameraError, Result};
use assethub::loader;
use assethub::record::Location;
use assethub::remote::{HttpRemote, RemoteApi};
use assethub::session::{DataSource, Session};
use assethub::store::RowStore;
use assethub::sync::SyncGateway;
use assethub::DecodeOutcome;

use chrono::Local;
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "assethub-cli", about = "Asset checklists and QR audits")]
struct Cli {
    /// Remote API endpoint; overrides ASSETHUB_SERVICE_URL.
    #[arg(long, global = true)]
    url: Option<String>,

    /// Remote sheet name; overrides ASSETHUB_SHEET.
    #[arg(long, global = true)]
    sheet: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a checklist workbook for the given management numbers.
    Checklist {
        /// Master file (.xlsx/.xls); the remote sheet is read when omitted.
        #[arg(long)]
        master: Option<PathBuf>,
        /// Engineer name printed on every checklist.
        #[arg(long, default_value = "")]
        engineer: String,
        /// Output directory.
        #[arg(long, default_value = ".")]
        out: PathBuf,
        /// Management numbers.
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Scan codes from stdin and mark matching rows audited.
    Audit {
        #[arg(long)]
        master: Option<PathBuf>,
        /// Write the store with audit results here when done.
        #[arg(long)]
        export: Option<PathBuf>,
        /// Sync audited rows to the remote sheet at this center.
        #[arg(long, requires = "zone")]
        center: Option<String>,
        #[arg(long, requires = "center")]
        zone: Option<String>,
    },

    /// List the remote workbook's sheet names.
    Sheets,
}

/// Scanner fed by stdin; there is no device to acquire.
#[derive(Default)]
struct LineScanner {
    running: bool,
}

impl Scanner for LineScanner {
    fn start(&mut self) -> std::result::Result<(), CameraError> {
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) -> std::result::Result<(), CameraError> {
        self.running = false;
        Ok(())
    }

    fn pause(&mut self) -> std::result::Result<(), CameraError> {
        Ok(())
    }

    fn resume(&mut self) -> std::result::Result<(), CameraError> {
        Ok(())
    }

    fn is_scanning(&self) -> bool {
        self.running
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(url) = cli.url {
        config.service_url = Some(url);
    }
    if let Some(sheet) = cli.sheet {
        config.sheet = sheet;
    }

    match cli.command {
        Commands::Checklist {
            master,
            engineer,
            out,
            ids,
        } => {
            let (store, _) = load_store(&config, master).await?;
            let batch = checklist::build_checklists(&store, &ids)?;
            for id in &batch.missing {
                warn!("not found: {}", id);
            }
            if batch.found.is_empty() {
                println!("No matching assets.");
                return Ok(());
            }
            let today = Local::now().date_naive();
            let bytes = downloader::checklist_workbook(&batch.found, &engineer, today)?;
            let path = out.join(checklist::export_file_name(&batch.found, today, "xlsx"));
            std::fs::write(&path, bytes)?;
            println!("Wrote {} checklist(s) to {}", batch.found.len(), path.display());
        }

        Commands::Audit {
            master,
            export,
            center,
            zone,
        } => {
            let (store, source) = load_store(&config, master).await?;
            // Each line is a deliberate scan, so there is nothing to debounce.
            let mut session = Session::new(LineScanner::default(), Duration::ZERO);
            session.load(store, source)?;
            session.audit.start_camera()?;
            scan_loop(&mut session)?;
            session.audit.stop_camera();

            let pending = session.pending().len();
            println!("{} row(s) audited.", pending);

            if let Some(path) = export {
                std::fs::write(&path, downloader::master_workbook(session.store())?)?;
                println!("Exported audit results to {}", path.display());
            }
            if let (Some(center), Some(zone)) = (center, zone) {
                if pending > 0 {
                    let gateway = SyncGateway::new(remote(&config)?, config.verify_sync);
                    let batch = session.begin_audit_sync(Location::new(&center, &zone)?)?;
                    let outcome = gateway.send_audit(&config.sheet, &batch).await;
                    session.finish_audit_sync(&batch, &outcome);
                    let receipt = outcome?;
                    println!("Synced {} row(s) ({:?}).", receipt.count, receipt.delivery);
                }
            }
        }

        Commands::Sheets => {
            for name in remote(&config)?.list_sheets().await? {
                println!("{}", name);
            }
        }
    }

    Ok(())
}

fn remote(config: &Config) -> Result<Arc<dyn RemoteApi>> {
    let url = config
        .service_url
        .as_deref()
        .ok_or(assethub::AppError::NoRemote)?;
    Ok(Arc::new(HttpRemote::new(url)?))
}

async fn load_store(config: &Config, master: Option<PathBuf>) -> Result<(RowStore, DataSource)> {
    match master {
        Some(path) => {
            let store = loader::load_master(&path)?;
            Ok((store, DataSource::File(path.display().to_string())))
        }
        None => {
            let rows = remote(config)?.read_rows(Some(&config.sheet)).await?;
            info!("loaded {} rows from {}", rows.len(), config.sheet);
            Ok((RowStore::from_rows(Vec::new(), rows), DataSource::Cloud(config.sheet.clone())))
        }
    }
}

fn scan_loop(session: &mut Session<LineScanner>) -> Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    println!("Scan a code (empty line or 'q' to finish).");
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let line = line?;
        let code = line.trim();
        if code.is_empty() || code == "q" {
            break;
        }

        match session.decode(code, Instant::now()) {
            DecodeOutcome::Matched { scanned, index } => {
                if let Some(row) = session.store().get(index) {
                    println!("{}", scanned);
                    for (header, value) in row.iter() {
                        println!("  {}: {}", header, value);
                    }
                }
                print!("Confirm audit? [y/N] ");
                io::stdout().flush()?;
                let answer = lines.next().transpose()?.unwrap_or_default();
                if answer.trim().eq_ignore_ascii_case("y") {
                    session.confirm(Instant::now())?;
                    println!("Marked.");
                } else {
                    session.cancel(Instant::now());
                }
            }
            DecodeOutcome::NotFound { scanned } => {
                println!("No asset with code {}", scanned);
                session.cancel(Instant::now());
            }
            DecodeOutcome::Dropped => {}
        }
    }
    Ok(())
}
