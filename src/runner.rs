use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::unbounded;
use miette::Result;
use tracing::{debug, info};

use crate::audit::{AuditLog, Status, StatusRecord};
use crate::manifest::RawRow;
use crate::processor::RowProcessor;

/// Run-level tallies, reported once the batch completes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    fn tally(&mut self, status: Status) {
        self.processed += 1;
        match status {
            Status::Success => self.succeeded += 1,
            Status::SkippedExisting => self.skipped += 1,
            _ => self.failed += 1,
        }
    }
}

/// Shard the rows across `jobs` workers and append one record per row.
///
/// Rows are independent units of work: each worker owns its row's
/// temporary files end-to-end and no cross-row state exists besides the
/// audit log, which has a single writer (the controller thread draining
/// the output channel). Setting `cancel` stops submitting new rows to the
/// processors; in-flight rows finish and clean up on their own.
pub fn run(
    rows: &[RawRow],
    processor: &RowProcessor<'_>,
    audit: &mut AuditLog,
    jobs: usize,
    cancel: &AtomicBool,
) -> Result<RunSummary> {
    let jobs = jobs.max(1);
    let (row_tx, row_rx) = unbounded::<&RawRow>();
    let (record_tx, record_rx) = unbounded::<StatusRecord>();

    for row in rows {
        row_tx.send(row).expect("row channel closed early");
    }
    // Dropping the sender marks the end of the input data
    drop(row_tx);

    let mut summary = RunSummary::default();

    std::thread::scope(|scope| -> Result<()> {
        for worker in 0..jobs {
            let row_rx = row_rx.clone();
            let record_tx = record_tx.clone();
            std::thread::Builder::new()
                .name(format!("worker-{worker}"))
                .spawn_scoped(scope, move || {
                    for row in row_rx {
                        if cancel.load(Ordering::Relaxed) {
                            debug!("Cancelled, not starting row {}", row.id);
                            continue;
                        }
                        let record = processor.process(row);
                        if record_tx.send(record).is_err() {
                            break;
                        }
                    }
                })
                .expect("could not spawn worker thread");
        }
        drop(record_tx);
        drop(row_rx);

        for record in record_rx {
            summary.tally(record.status);
            audit.append(&record)?;
        }
        Ok(())
    })?;

    info!(
        "Batch complete: {} processed, {} succeeded, {} skipped, {} failed",
        summary.processed, summary.succeeded, summary.skipped, summary.failed
    );
    Ok(summary)
}
