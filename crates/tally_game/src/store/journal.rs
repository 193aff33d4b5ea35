//! # Journal Store
//!
//! **Crash-safe statistics**
//!
//! Every batch is appended to a journal and synced before the in-memory
//! tables change. On open the journal is replayed:
//! - Committed batches: applied in order
//! - Uncommitted or rolled-back batches: dropped
//! - A torn tail (crash mid-append): cut off
//! - Damage with anything behind it: [`StoreError::Corrupt`]
//!
//! Appends and their `fsync` run on tokio's blocking pool. Readers only
//! take the table lock, which is never held across a sync.
//!
//! [`JournalCountStore::checkpoint`] rewrites the journal as one snapshot
//! batch.
//!
//! ## Format
//!
//! ```text
//! [4 bytes: magic "TJNL"]
//! [4 bytes: version]
//! [8 bytes: first LSN in this file]
//!
//! Record format:
//! [8 bytes: LSN (Log Sequence Number)]
//! [1 byte: record type (BEGIN/OP/COMMIT/ROLLBACK)]
//! [4 bytes: payload length]
//! [N bytes: payload (encoded StoreOp)]
//! [4 bytes: CRC32 of above]
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{CountStore, StoreOp, Tables};
use crate::error::{StoreError, StoreResult};
use crate::ids::{ChannelId, MessageId, UserId};
use crate::state::{GameState, UserStats};

/// Magic bytes identifying a journal file.
const JOURNAL_MAGIC: &[u8; 4] = b"TJNL";

/// Current journal format version.
const JOURNAL_VERSION: u32 = 1;

/// Header length in bytes.
const HEADER_LEN: u64 = 16;

/// Fixed part of a record: LSN, type, length, CRC.
const RECORD_OVERHEAD: u64 = 8 + 1 + 4 + 4;

/// No encoded operation comes close to this.
const MAX_PAYLOAD: u32 = 256;

/// Journal record types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
enum RecordType {
    Begin = 1,
    Operation = 2,
    Commit = 3,
    Rollback = 4,
}

impl RecordType {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Begin),
            2 => Some(Self::Operation),
            3 => Some(Self::Commit),
            4 => Some(Self::Rollback),
            _ => None,
        }
    }
}

// =============================================================================
// OPERATION ENCODING
// =============================================================================

fn encode_op(op: &StoreOp) -> Vec<u8> {
    let mut buf = Vec::with_capacity(48);
    match *op {
        StoreOp::IncrementSuccess(user) => {
            buf.push(1);
            buf.extend_from_slice(&user.get().to_le_bytes());
        }
        StoreOp::IncrementFail(user) => {
            buf.push(2);
            buf.extend_from_slice(&user.get().to_le_bytes());
        }
        StoreOp::SetHighestIfGreater(user, n) => {
            buf.push(3);
            buf.extend_from_slice(&user.get().to_le_bytes());
            buf.extend_from_slice(&n.to_le_bytes());
        }
        StoreOp::SaveChannel(channel, state) => {
            buf.push(4);
            buf.extend_from_slice(&channel.get().to_le_bytes());
            buf.extend_from_slice(&state.last_count.to_le_bytes());
            put_optional(&mut buf, state.last_count_user.map(UserId::get));
            buf.extend_from_slice(&state.highest_count.to_le_bytes());
            put_optional(&mut buf, state.last_counted_message_id.map(MessageId::get));
        }
        StoreOp::PutUser(user, stats) => {
            buf.push(5);
            buf.extend_from_slice(&user.get().to_le_bytes());
            buf.extend_from_slice(&stats.successes.to_le_bytes());
            buf.extend_from_slice(&stats.fails.to_le_bytes());
            buf.extend_from_slice(&stats.highest_user_count.to_le_bytes());
        }
    }
    buf
}

fn put_optional(buf: &mut Vec<u8>, value: Option<u64>) {
    match value {
        Some(v) => {
            buf.push(1);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        None => buf.push(0),
    }
}

fn decode_op(data: &[u8]) -> Option<StoreOp> {
    let (&tag, mut rest) = data.split_first()?;
    let op = match tag {
        1 => StoreOp::IncrementSuccess(UserId::new(take_u64(&mut rest)?)),
        2 => StoreOp::IncrementFail(UserId::new(take_u64(&mut rest)?)),
        3 => {
            let user = UserId::new(take_u64(&mut rest)?);
            StoreOp::SetHighestIfGreater(user, take_u64(&mut rest)?)
        }
        4 => {
            let channel = ChannelId::new(take_u64(&mut rest)?);
            let state = GameState {
                last_count: take_u64(&mut rest)?,
                last_count_user: take_optional(&mut rest)?.map(UserId::new),
                highest_count: take_u64(&mut rest)?,
                last_counted_message_id: take_optional(&mut rest)?.map(MessageId::new),
            };
            StoreOp::SaveChannel(channel, state)
        }
        5 => {
            let user = UserId::new(take_u64(&mut rest)?);
            let stats = UserStats {
                successes: take_u64(&mut rest)?,
                fails: take_u64(&mut rest)?,
                highest_user_count: take_u64(&mut rest)?,
            };
            StoreOp::PutUser(user, stats)
        }
        _ => return None,
    };
    rest.is_empty().then_some(op)
}

fn take_u64(data: &mut &[u8]) -> Option<u64> {
    if data.len() < 8 {
        return None;
    }
    let (head, rest) = data.split_at(8);
    *data = rest;
    Some(u64::from_le_bytes(head.try_into().ok()?))
}

fn take_optional(data: &mut &[u8]) -> Option<Option<u64>> {
    let (&flag, rest) = data.split_first()?;
    *data = rest;
    match flag {
        0 => Some(None),
        1 => take_u64(data).map(Some),
        _ => None,
    }
}

fn encode_record(buf: &mut Vec<u8>, lsn: u64, record_type: RecordType, payload: &[u8]) {
    let start = buf.len();
    buf.extend_from_slice(&lsn.to_le_bytes());
    buf.push(record_type as u8);
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);
    let crc = crc32fast::hash(&buf[start..]);
    buf.extend_from_slice(&crc.to_le_bytes());
}

/// Appends a whole batch, BEGIN to COMMIT. Returns the next free LSN.
fn encode_batch(buf: &mut Vec<u8>, first_lsn: u64, batch: &[StoreOp]) -> u64 {
    let mut lsn = first_lsn;
    encode_record(buf, lsn, RecordType::Begin, &[]);
    for op in batch {
        lsn += 1;
        encode_record(buf, lsn, RecordType::Operation, &encode_op(op));
    }
    lsn += 1;
    encode_record(buf, lsn, RecordType::Commit, &[]);
    lsn + 1
}

fn encode_header(first_lsn: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN as usize);
    buf.extend_from_slice(JOURNAL_MAGIC);
    buf.extend_from_slice(&JOURNAL_VERSION.to_le_bytes());
    buf.extend_from_slice(&first_lsn.to_le_bytes());
    buf
}

// =============================================================================
// RECOVERY
// =============================================================================

/// What replay found when the journal was opened.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Batches replayed.
    pub committed_batches: u64,
    /// Operations replayed.
    pub operations: u64,
    /// Batches dropped: rolled back, never committed, or not applicable.
    pub discarded_batches: u64,
    /// Bytes cut off the end of the file.
    pub torn_bytes: u64,
}

struct Record {
    lsn: u64,
    record_type: RecordType,
    payload: Vec<u8>,
}

enum ReadOutcome {
    Record(Record),
    /// Clean end of file.
    End,
    /// The file ends inside a record.
    Truncated,
    /// A complete record whose checksum or framing is wrong. `span` is how
    /// many bytes it occupies as far as its framing can be trusted.
    Damaged { lsn: u64, span: u64 },
}

fn read_record(reader: &mut impl Read) -> StoreResult<ReadOutcome> {
    let mut lsn_bytes = [0u8; 8];
    match read_full(reader, &mut lsn_bytes)? {
        0 => return Ok(ReadOutcome::End),
        8 => {}
        _ => return Ok(ReadOutcome::Truncated),
    }
    let lsn = u64::from_le_bytes(lsn_bytes);

    let mut frame = [0u8; 5];
    if read_full(reader, &mut frame)? < frame.len() {
        return Ok(ReadOutcome::Truncated);
    }
    let type_byte = frame[0];
    let payload_len = u32::from_le_bytes([frame[1], frame[2], frame[3], frame[4]]);
    if payload_len > MAX_PAYLOAD {
        return Ok(ReadOutcome::Damaged {
            lsn,
            span: (lsn_bytes.len() + frame.len()) as u64,
        });
    }
    let span = RECORD_OVERHEAD + u64::from(payload_len);

    let mut payload = vec![0u8; payload_len as usize];
    let mut crc_bytes = [0u8; 4];
    if read_full(reader, &mut payload)? < payload.len()
        || read_full(reader, &mut crc_bytes)? < crc_bytes.len()
    {
        return Ok(ReadOutcome::Truncated);
    }

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&lsn_bytes);
    hasher.update(&frame);
    hasher.update(&payload);
    if hasher.finalize() != u32::from_le_bytes(crc_bytes) {
        return Ok(ReadOutcome::Damaged { lsn, span });
    }

    match RecordType::from_u8(type_byte) {
        Some(record_type) => Ok(ReadOutcome::Record(Record {
            lsn,
            record_type,
            payload,
        })),
        None => Ok(ReadOutcome::Damaged { lsn, span }),
    }
}

/// Like `read_exact`, but reports how much it got instead of failing at EOF.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> StoreResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

struct Replay {
    tables: Tables,
    next_lsn: u64,
    /// End of the last COMMIT or ROLLBACK, where appends resume.
    durable_end: u64,
    stats: RecoveryStats,
}

fn replay(file: &File, file_len: u64) -> StoreResult<Replay> {
    let mut reader = BufReader::new(file);

    let mut header = [0u8; HEADER_LEN as usize];
    if read_full(&mut reader, &mut header)? < header.len() {
        return Err(StoreError::BadHeader("file shorter than its header".to_owned()));
    }
    if &header[0..4] != JOURNAL_MAGIC {
        return Err(StoreError::BadHeader("bad magic".to_owned()));
    }
    let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if version != JOURNAL_VERSION {
        return Err(StoreError::BadHeader(format!("unsupported version {version}")));
    }
    let mut lsn_bytes = [0u8; 8];
    lsn_bytes.copy_from_slice(&header[8..16]);
    let first_lsn = u64::from_le_bytes(lsn_bytes);

    let mut tables = Tables::default();
    let mut stats = RecoveryStats::default();
    let mut pending: Option<Vec<StoreOp>> = None;
    let mut next_lsn = first_lsn;
    let mut offset = HEADER_LEN;
    let mut durable_end = HEADER_LEN;

    loop {
        let record = match read_record(&mut reader)? {
            ReadOutcome::Record(record) => record,
            ReadOutcome::End | ReadOutcome::Truncated => break,
            ReadOutcome::Damaged { lsn, span } => {
                // Only the very last record may be a crash artefact. Anything
                // behind a damaged record would be dropped with it.
                if file_len > offset + span {
                    return Err(StoreError::Corrupt { lsn });
                }
                tracing::warn!(lsn, "damaged record at journal tail");
                break;
            }
        };
        offset += RECORD_OVERHEAD + record.payload.len() as u64;
        next_lsn = next_lsn.max(record.lsn.saturating_add(1));

        match record.record_type {
            RecordType::Begin => {
                if pending.replace(Vec::new()).is_some() {
                    stats.discarded_batches += 1;
                }
            }
            RecordType::Operation => match (&mut pending, decode_op(&record.payload)) {
                (Some(ops), Some(op)) => ops.push(op),
                (Some(_), None) => return Err(StoreError::Corrupt { lsn: record.lsn }),
                (None, _) => {
                    tracing::warn!(lsn = record.lsn, "operation outside a batch ignored");
                }
            },
            RecordType::Commit => {
                if let Some(ops) = pending.take() {
                    match tables.apply(&ops) {
                        Ok(()) => {
                            stats.committed_batches += 1;
                            stats.operations += ops.len() as u64;
                        }
                        Err(err) => {
                            tracing::warn!(lsn = record.lsn, %err, "committed batch not applicable");
                            stats.discarded_batches += 1;
                        }
                    }
                }
                durable_end = offset;
            }
            RecordType::Rollback => {
                if pending.take().is_some() {
                    stats.discarded_batches += 1;
                }
                durable_end = offset;
            }
        }
    }

    if pending.is_some() {
        stats.discarded_batches += 1;
    }
    stats.torn_bytes = file_len.saturating_sub(durable_end);

    Ok(Replay {
        tables,
        next_lsn,
        durable_end,
        stats,
    })
}

// =============================================================================
// STORE
// =============================================================================

struct Journal {
    file: File,
    /// Append position; everything before it is committed or rolled back.
    end: u64,
    next_lsn: u64,
    /// Set when a failed append could not be undone.
    poisoned: bool,
}

impl Journal {
    /// Appends `bytes` at the end and syncs. On failure the file is cut
    /// back to where it was.
    fn append(&mut self, bytes: &[u8]) -> StoreResult<()> {
        if self.poisoned {
            return Err(StoreError::Io("journal is poisoned by an earlier failed write".to_owned()));
        }
        let result = self
            .file
            .seek(SeekFrom::Start(self.end))
            .and_then(|_| self.file.write_all(bytes))
            .and_then(|()| self.file.sync_data());

        match result {
            Ok(()) => {
                self.end += bytes.len() as u64;
                Ok(())
            }
            Err(err) => {
                if let Err(undo) = self.file.set_len(self.end) {
                    tracing::error!(%undo, "cannot cut back a failed journal append");
                    self.poisoned = true;
                }
                Err(err.into())
            }
        }
    }
}

/// [`CountStore`] backed by an append-only journal.
pub struct JournalCountStore {
    path: PathBuf,
    recovery: RecoveryStats,
    tables: Arc<Mutex<Tables>>,
    /// Lock order: journal, then tables.
    journal: Arc<Mutex<Journal>>,
}

impl JournalCountStore {
    /// Opens or creates a journal and replays it.
    ///
    /// # Errors
    ///
    /// [`StoreError::BadHeader`] for a file that is not a journal,
    /// [`StoreError::Corrupt`] for damage before the tail,
    /// [`StoreError::Io`] for I/O failures.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)?;

        if file.metadata()?.len() == 0 {
            file.write_all(&encode_header(0))?;
            file.sync_all()?;
        }

        let file_len = file.metadata()?.len();
        file.seek(SeekFrom::Start(0))?;
        let replayed = replay(&file, file_len)?;
        if replayed.stats.torn_bytes > 0 {
            file.set_len(replayed.durable_end)?;
            file.sync_all()?;
        }

        let stats = replayed.stats;
        if stats.discarded_batches > 0 || stats.torn_bytes > 0 {
            tracing::warn!(
                path = %path.display(),
                committed = stats.committed_batches,
                discarded = stats.discarded_batches,
                torn_bytes = stats.torn_bytes,
                "journal recovered with losses"
            );
        } else {
            tracing::info!(
                path = %path.display(),
                committed = stats.committed_batches,
                operations = stats.operations,
                "journal replayed"
            );
        }

        Ok(Self {
            path,
            recovery: stats,
            tables: Arc::new(Mutex::new(replayed.tables)),
            journal: Arc::new(Mutex::new(Journal {
                file,
                end: replayed.durable_end,
                next_lsn: replayed.next_lsn,
                poisoned: false,
            })),
        })
    }

    /// What replay found at open.
    #[must_use]
    pub fn recovery(&self) -> RecoveryStats {
        self.recovery
    }

    /// Journal location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrites the journal as a single snapshot batch.
    ///
    /// The snapshot goes to a sibling file which then replaces the journal,
    /// so a crash leaves either the old or the new one.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] when the snapshot cannot be written or swapped in.
    pub fn checkpoint(&self) -> StoreResult<()> {
        let mut journal = self.journal.lock();

        let (snapshot, users, channels) = {
            let tables = self.tables.lock();
            let mut snapshot: Vec<StoreOp> = tables
                .users
                .iter()
                .map(|(user, stats)| StoreOp::PutUser(*user, *stats))
                .collect();
            snapshot.extend(
                tables
                    .channels
                    .iter()
                    .map(|(channel, state)| StoreOp::SaveChannel(*channel, *state)),
            );
            (snapshot, tables.users.len(), tables.channels.len())
        };

        let first_lsn = journal.next_lsn;
        let mut bytes = encode_header(first_lsn);
        let next_lsn = encode_batch(&mut bytes, first_lsn, &snapshot);

        let staging = self.path.with_extension("checkpoint");
        {
            let mut out = File::create(&staging)?;
            out.write_all(&bytes)?;
            out.sync_all()?;
        }
        fs::rename(&staging, &self.path)?;

        let file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        let before = journal.end;
        journal.file = file;
        journal.end = bytes.len() as u64;
        journal.next_lsn = next_lsn;
        journal.poisoned = false;

        tracing::info!(
            users,
            channels,
            bytes_before = before,
            bytes_after = journal.end,
            "journal checkpointed"
        );
        Ok(())
    }
}

impl std::fmt::Debug for JournalCountStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalCountStore")
            .field("path", &self.path)
            .field("recovery", &self.recovery)
            .finish_non_exhaustive()
    }
}

/// Stages, journals and commits one batch. Holding the journal lock keeps
/// the staged values current until the commit.
fn append_batch(
    tables: &Mutex<Tables>,
    journal: &Mutex<Journal>,
    batch: &[StoreOp],
) -> StoreResult<()> {
    let mut journal = journal.lock();
    let staged = tables.lock().stage(batch)?;

    let mut bytes = Vec::with_capacity(batch.len() * 64 + 64);
    let next_lsn = encode_batch(&mut bytes, journal.next_lsn, batch);
    journal.append(&bytes)?;

    journal.next_lsn = next_lsn;
    tables.lock().commit(staged);
    Ok(())
}

impl CountStore for JournalCountStore {
    async fn read(&self, user: UserId) -> StoreResult<UserStats> {
        Ok(self.tables.lock().read(user))
    }

    async fn load_channel(&self, channel: ChannelId) -> StoreResult<Option<GameState>> {
        Ok(self.tables.lock().channels.get(&channel).copied())
    }

    async fn apply(&self, batch: Vec<StoreOp>) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let tables = Arc::clone(&self.tables);
        let journal = Arc::clone(&self.journal);
        tokio::task::spawn_blocking(move || append_batch(&tables, &journal, &batch))
            .await
            .map_err(|err| StoreError::Io(format!("journal writer stopped: {err}")))?
    }

    async fn leaderboard(&self, limit: usize) -> StoreResult<Vec<(UserId, UserStats)>> {
        Ok(self.tables.lock().leaderboard(limit))
    }
}
