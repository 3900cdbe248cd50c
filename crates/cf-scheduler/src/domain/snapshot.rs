//! # Queue Snapshots
//!
//! Read-only dumps of queue contents for ground visibility.
//!
//! Format: \[MAGIC\]\[COUNT\]\[ENTRY1\]\[ENTRY2\]...
//!
//! Each entry is written as:
//! - source file (u16 length + bytes)
//! - source entity id (u16 length + bytes)
//! - transaction number (u32)
//! - status, condition code, priority, direction (u8 each)
//!
//! All integers are little-endian. Entries appear in arrival order.

use super::entities::{ConditionCode, Direction, TransactionRecord, TransactionStatus};
use std::io::{self, Read, Write};

/// Magic bytes for a single-queue dump.
pub const QUEUE_MAGIC: &[u8; 8] = b"CFQUEUE\x01";

/// Magic bytes for an active-transactions dump.
pub const ACTIVE_MAGIC: &[u8; 8] = b"CFACTIV\x01";

pub const DEFAULT_QUEUE_FILE: &str = "cf_queue_info.dat";
pub const DEFAULT_ACTIVE_FILE: &str = "cf_active_info.dat";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotKind {
    Queue,
    Active,
}

impl SnapshotKind {
    fn magic(self) -> &'static [u8; 8] {
        match self {
            Self::Queue => QUEUE_MAGIC,
            Self::Active => ACTIVE_MAGIC,
        }
    }
}

/// One record as it appears in a snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub source_file: String,
    pub source_entity: String,
    pub trans_num: u32,
    pub status: TransactionStatus,
    pub condition: ConditionCode,
    pub priority: u8,
    pub direction: Direction,
}

impl From<&TransactionRecord> for SnapshotEntry {
    fn from(record: &TransactionRecord) -> Self {
        Self {
            source_file: record.source_file.clone(),
            source_entity: record.source_entity.to_string(),
            trans_num: record.trans_num,
            status: record.status,
            condition: record.condition,
            priority: record.priority,
            direction: record.direction,
        }
    }
}

/// Writes `entries` and returns the number of bytes written.
pub fn write_snapshot<W: Write>(
    writer: &mut W,
    kind: SnapshotKind,
    entries: &[SnapshotEntry],
) -> io::Result<usize> {
    let mut buf = Vec::with_capacity(16 + entries.len() * 64);

    buf.extend_from_slice(kind.magic());
    buf.extend_from_slice(&(entries.len() as u32).to_le_bytes());

    for entry in entries {
        write_str(&mut buf, &entry.source_file)?;
        write_str(&mut buf, &entry.source_entity)?;
        buf.extend_from_slice(&entry.trans_num.to_le_bytes());
        buf.push(entry.status.code());
        buf.push(entry.condition.code());
        buf.push(entry.priority);
        buf.push(match entry.direction {
            Direction::Incoming => 0,
            Direction::Outgoing => 1,
        });
    }

    writer.write_all(&buf)?;
    writer.flush()?;
    Ok(buf.len())
}

/// Decodes a snapshot produced by [`write_snapshot`].
pub fn read_snapshot(data: &[u8]) -> io::Result<(SnapshotKind, Vec<SnapshotEntry>)> {
    let mut reader = data;

    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)?;
    let kind = if &magic == QUEUE_MAGIC {
        SnapshotKind::Queue
    } else if &magic == ACTIVE_MAGIC {
        SnapshotKind::Active
    } else {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "Invalid magic"));
    };

    let mut count_bytes = [0u8; 4];
    reader.read_exact(&mut count_bytes)?;
    let count = u32::from_le_bytes(count_bytes) as usize;

    let mut entries = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let source_file = read_str(&mut reader)?;
        let source_entity = read_str(&mut reader)?;

        let mut num = [0u8; 4];
        reader.read_exact(&mut num)?;

        let mut fields = [0u8; 4];
        reader.read_exact(&mut fields)?;

        entries.push(SnapshotEntry {
            source_file,
            source_entity,
            trans_num: u32::from_le_bytes(num),
            status: TransactionStatus::from_code(fields[0]),
            condition: ConditionCode::from_code(fields[1]),
            priority: fields[2],
            direction: if fields[3] == 0 {
                Direction::Incoming
            } else {
                Direction::Outgoing
            },
        });
    }

    Ok((kind, entries))
}

fn write_str(buf: &mut Vec<u8>, s: &str) -> io::Result<()> {
    let len = u16::try_from(s.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "String too long"))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

fn read_str(reader: &mut &[u8]) -> io::Result<String> {
    let mut len_bytes = [0u8; 2];
    reader.read_exact(&mut len_bytes)?;
    let mut bytes = vec![0u8; u16::from_le_bytes(len_bytes) as usize];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
