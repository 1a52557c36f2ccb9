use clap::{Args, Parser, Subcommand};
use pagelock::{
    BufferError, BufferPool, BufferResult, Catalog, FileLog, HeapTable, PagedFile, PageStore,
    PoolConfig, TableId, TransactionId, Tuple,
};
use prettytable::{Table, row};
use rand::Rng;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const TABLE: TableId = 1;

#[derive(Parser)]
#[command(name = "pagelock", about = "Page cache with two-phase page locking")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the default pool configuration as JSON
    DefaultConfig,
    /// Run concurrent insert transactions against a heap table on disk
    Workload(WorkloadArgs),
}

#[derive(Args)]
struct WorkloadArgs {
    /// Directory holding the table file and the log
    #[arg(long, default_value = "pagelock-data")]
    dir: PathBuf,
    /// Pool configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = 4)]
    threads: usize,
    /// Transactions per thread
    #[arg(long, default_value_t = 50)]
    transactions: usize,
    /// Tuples inserted per transaction
    #[arg(long, default_value_t = 4)]
    tuples: usize,
    #[arg(long, default_value_t = 64)]
    record_size: usize,
    /// Fraction of transactions that abort on purpose
    #[arg(long, default_value_t = 0.1)]
    abort_ratio: f64,
}

/// Per-thread outcome counts
#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    committed: usize,
    voluntary_aborts: usize,
    lock_timeouts: usize,
    cache_full: usize,
}

impl Tally {
    fn merge(self, other: Tally) -> Tally {
        Tally {
            committed: self.committed + other.committed,
            voluntary_aborts: self.voluntary_aborts + other.voluntary_aborts,
            lock_timeouts: self.lock_timeouts + other.lock_timeouts,
            cache_full: self.cache_full + other.cache_full,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match Cli::parse().command {
        Command::DefaultConfig => {
            println!("{}", serde_json::to_string_pretty(&PoolConfig::default())?);
            Ok(())
        }
        Command::Workload(args) => run_workload(&args),
    }
}

fn open_table(path: &Path, page_size: usize) -> Result<PagedFile, Box<dyn Error>> {
    let file = if path.exists() {
        PagedFile::open(path, TABLE)?
    } else {
        PagedFile::create(path, TABLE)?
    };
    Ok(file.with_page_size(page_size))
}

fn run_workload(args: &WorkloadArgs) -> Result<(), Box<dyn Error>> {
    let config = match &args.config {
        Some(path) => PoolConfig::load(path)?,
        None => PoolConfig::default(),
    };
    std::fs::create_dir_all(&args.dir)?;

    let store = Arc::new(open_table(&args.dir.join("heap.dat"), config.page_size)?);
    let heap = Arc::new(HeapTable::new(store.clone(), args.record_size)?);
    let catalog = Arc::new(Catalog::new());
    catalog.add_table("heap", store.clone(), Some(heap.clone()));
    let log_path = args.dir.join("wal.log");
    let log = Arc::new(FileLog::open(&log_path)?);
    let pool = BufferPool::new(&config, catalog, log)?;

    info!(
        threads = args.threads,
        transactions = args.transactions,
        capacity = config.capacity,
        "starting workload"
    );
    let started = Instant::now();
    let outcomes = thread::scope(|s| {
        let workers: Vec<_> = (0..args.threads)
            .map(|worker| {
                let pool = &pool;
                s.spawn(move || run_worker(pool, args, worker))
            })
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join())
            .collect::<Vec<_>>()
    });
    let elapsed = started.elapsed();

    let mut tally = Tally::default();
    for outcome in outcomes {
        let result = outcome.map_err(|_| "worker thread panicked")?;
        tally = tally.merge(result?);
    }

    let reader = TransactionId::new();
    let stored = heap.scan(&pool, reader)?.len();
    commit_or_abort(&pool, reader)?;
    store.sync()?;

    print_summary(args, tally, elapsed, stored, store.page_count()?, &log_path)
}

fn run_worker(pool: &BufferPool, args: &WorkloadArgs, worker: usize) -> BufferResult<Tally> {
    let mut rng = rand::thread_rng();
    let abort_ratio = args.abort_ratio.clamp(0.0, 1.0);
    let mut tally = Tally::default();

    for round in 0..args.transactions {
        let txn = TransactionId::new();
        let fill = (worker * args.transactions + round) as u8;

        match insert_batch(pool, txn, args, fill) {
            Ok(()) if rng.gen_bool(abort_ratio) => {
                pool.abort(txn)?;
                tally.voluntary_aborts += 1;
            }
            Ok(()) => {
                commit_or_abort(pool, txn)?;
                tally.committed += 1;
            }
            Err(e) if e.is_abort() => {
                pool.abort(txn)?;
                tally.lock_timeouts += 1;
            }
            Err(e @ BufferError::CacheFull { .. }) => {
                warn!(%txn, error = %e, "aborting transaction");
                pool.abort(txn)?;
                tally.cache_full += 1;
            }
            Err(e) => {
                pool.abort(txn)?;
                return Err(e);
            }
        }
    }
    Ok(tally)
}

/// Commit `txn`; if that fails, abort it so its locks and dirty pages go
fn commit_or_abort(pool: &BufferPool, txn: TransactionId) -> BufferResult<()> {
    if let Err(e) = pool.commit(txn) {
        warn!(%txn, error = %e, "commit failed, aborting");
        pool.abort(txn)?;
        return Err(e);
    }
    Ok(())
}

fn insert_batch(
    pool: &BufferPool,
    txn: TransactionId,
    args: &WorkloadArgs,
    fill: u8,
) -> BufferResult<()> {
    for _ in 0..args.tuples {
        let mut tuple = Tuple::new(vec![fill; args.record_size]);
        pool.insert_tuple(txn, TABLE, &mut tuple)?;
    }
    Ok(())
}

fn print_summary(
    args: &WorkloadArgs,
    tally: Tally,
    elapsed: Duration,
    stored: usize,
    pages: u32,
    log_path: &Path,
) -> Result<(), Box<dyn Error>> {
    let log_records = FileLog::read_records(log_path)?.len();
    let attempted = args.threads * args.transactions;

    let mut table = Table::new();
    table.add_row(row!["Metric", "Value"]);
    table.add_row(row!["Transactions", attempted]);
    table.add_row(row!["Committed", tally.committed]);
    table.add_row(row!["Voluntary aborts", tally.voluntary_aborts]);
    table.add_row(row!["Lock timeouts", tally.lock_timeouts]);
    table.add_row(row!["Cache full", tally.cache_full]);
    table.add_row(row!["Tuples in table", stored]);
    table.add_row(row!["Table pages", pages]);
    table.add_row(row!["Log records", log_records]);
    table.add_row(row!["Elapsed", format!("{:.2?}", elapsed)]);
    table.printstd();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagelock::file::{FileError, FileResult};
    use pagelock::{MemoryLog, MemoryPageStore, Page, PageId};

    /// Table store that cannot write pages back
    struct ReadOnlyDisk(MemoryPageStore);

    impl PageStore for ReadOnlyDisk {
        fn table_id(&self) -> TableId {
            self.0.table_id()
        }

        fn page_size(&self) -> usize {
            self.0.page_size()
        }

        fn read_page(&self, page_id: PageId) -> FileResult<Page> {
            self.0.read_page(page_id)
        }

        fn write_page(&self, _page: &Page) -> FileResult<()> {
            Err(FileError::Io(std::io::Error::other("read-only disk")))
        }

        fn allocate_page(&self) -> FileResult<PageId> {
            self.0.allocate_page()
        }

        fn page_count(&self) -> FileResult<u32> {
            self.0.page_count()
        }
    }

    #[test]
    fn test_failed_commit_releases_worker_locks() {
        let store = Arc::new(ReadOnlyDisk(MemoryPageStore::with_page_size(TABLE, 64)));
        let heap = Arc::new(HeapTable::new(store.clone(), 8).unwrap());
        let catalog = Arc::new(Catalog::new());
        catalog.add_table("heap", store, Some(heap));
        let pool =
            BufferPool::new(&PoolConfig::new(4), catalog, Arc::new(MemoryLog::new())).unwrap();

        let args = WorkloadArgs {
            dir: PathBuf::new(),
            config: None,
            threads: 1,
            transactions: 1,
            tuples: 2,
            record_size: 8,
            abort_ratio: 0.0,
        };
        let err = run_worker(&pool, &args, 0).unwrap_err();

        assert!(err.is_io());
        assert!(pool.is_empty());
        assert_eq!(pool.lock_manager().exclusive_holder(PageId::new(TABLE, 0)), None);
    }
}
