//! JSON Lines order log with an in-memory index
//!
//! Every line is a full `Order` snapshot; a later line for the same id
//! supersedes earlier ones. Appends are synced before the index changes, and a
//! failed write is truncated away so the next append starts on a clean line.
//! Bulk deletes rewrite the whole log into a temp file and rename it over the
//! old one.

use super::{check_transition, DbError, DbResult, Order, OrderFilter, OrderId, OrderStatus};
use chrono::Utc;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub struct OrderLog {
    path: PathBuf,
    inner: Mutex<LogInner>,
}

struct LogInner {
    file: File,
    /// Length of the committed prefix of the log
    len: u64,
    index: HashMap<OrderId, Order>,
}

impl OrderLog {
    /// Open the log, replaying existing records into the index
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        let mut raw = Vec::new();
        file.read_to_end(&mut raw)?;
        let (index, committed_len) = replay(&raw);

        let file_len = file.metadata()?.len();
        if committed_len < file_len {
            tracing::warn!(
                path = %path.display(),
                dropped_bytes = file_len - committed_len,
                "Discarding torn trailing record in order log"
            );
            file.set_len(committed_len)?;
        }
        file.seek(SeekFrom::Start(committed_len))?;

        tracing::info!(path = %path.display(), orders = index.len(), "Order log opened");

        Ok(Self {
            path,
            inner: Mutex::new(LogInner {
                file,
                len: committed_len,
                index,
            }),
        })
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, LogInner>> {
        self.inner.lock().map_err(|_| DbError::Poisoned)
    }

    pub fn append(&self, order: &Order) -> DbResult<()> {
        let mut inner = self.lock()?;
        if inner.index.contains_key(&order.id) {
            return Err(DbError::DuplicateOrder(order.id.clone()));
        }
        inner.write_record(order)?;
        inner.index.insert(order.id.clone(), order.clone());
        Ok(())
    }

    pub fn get(&self, id: &OrderId) -> DbResult<Option<Order>> {
        Ok(self.lock()?.index.get(id).cloned())
    }

    pub fn list(&self, filter: &OrderFilter) -> DbResult<Vec<Order>> {
        let inner = self.lock()?;
        let mut orders: Vec<Order> = inner
            .index
            .values()
            .filter(|order| filter.matches(order))
            .cloned()
            .collect();
        sort_oldest_first(&mut orders);
        Ok(orders)
    }

    pub fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
        status_text: &str,
    ) -> DbResult<Order> {
        let mut inner = self.lock()?;
        let current = inner
            .index
            .get(id)
            .ok_or_else(|| DbError::OrderNotFound(id.clone()))?;
        check_transition(current, status)?;

        let mut updated = current.clone();
        updated.status = status;
        status_text.clone_into(&mut updated.status_text);
        updated.updated_at = Utc::now();

        inner.write_record(&updated)?;
        inner.index.insert(id.clone(), updated.clone());
        Ok(updated)
    }

    pub fn delete_matching(&self, filter: &OrderFilter) -> DbResult<usize> {
        let mut inner = self.lock()?;
        let mut kept: Vec<Order> = inner
            .index
            .values()
            .filter(|order| !filter.matches(order))
            .cloned()
            .collect();
        let removed = inner.index.len() - kept.len();
        if removed == 0 {
            return Ok(0);
        }
        sort_oldest_first(&mut kept);

        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        let mut new_len = 0u64;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            for order in &kept {
                let line = encode_line(order)?;
                writer.write_all(line.as_bytes())?;
                new_len += line.len() as u64;
            }
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;

        // Nothing on disk or in memory has changed before this rename
        let mut file = tmp.persist(&self.path).map_err(|e| DbError::Io(e.error))?;
        file.seek(SeekFrom::Start(new_len))?;

        inner.file = file;
        inner.len = new_len;
        inner.index = kept.into_iter().map(|o| (o.id.clone(), o)).collect();

        // The rewrite is already live; a failed sync only leaves the rename undurable
        if let Err(e) = sync_dir(&dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "Failed to sync log directory after rewrite");
        }

        tracing::info!(removed, remaining = inner.index.len(), "Order log compacted");
        Ok(removed)
    }
}

impl LogInner {
    fn write_record(&mut self, order: &Order) -> DbResult<()> {
        let line = encode_line(order)?;
        let written = self
            .file
            .write_all(line.as_bytes())
            .and_then(|()| self.file.sync_data());

        if let Err(e) = written {
            // Roll back any partial line so later appends stay parseable
            if let Err(truncate_err) = self
                .file
                .set_len(self.len)
                .and_then(|()| self.file.seek(SeekFrom::Start(self.len)).map(|_| ()))
            {
                tracing::error!(error = %truncate_err, "Failed to roll back partial order record");
            }
            return Err(DbError::Io(e));
        }

        self.len += line.len() as u64;
        Ok(())
    }
}

fn encode_line(order: &Order) -> DbResult<String> {
    let mut line = serde_json::to_string(order)?;
    line.push('\n');
    Ok(line)
}

/// Rebuild the index from raw log bytes.
///
/// Returns the index and the byte length of the committed prefix. A final
/// segment without a newline is a torn write and is not counted; it may end
/// mid-character, so lines are handled as bytes.
fn replay(raw: &[u8]) -> (HashMap<OrderId, Order>, u64) {
    let mut index = HashMap::new();
    let mut committed = 0usize;

    for (line_no, segment) in raw.split_inclusive(|b| *b == b'\n').enumerate() {
        if segment.last() != Some(&b'\n') {
            break;
        }
        committed += segment.len();

        let line = segment.trim_ascii();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_slice::<Order>(line) {
            Ok(order) => {
                index.insert(order.id.clone(), order);
            }
            Err(e) => {
                tracing::warn!(line = line_no + 1, error = %e, "Skipping unreadable order record");
            }
        }
    }

    (index, committed as u64)
}

/// Flush a directory entry change such as a rename to disk
#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

fn sort_oldest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
