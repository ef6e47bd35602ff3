//! JSON-lines message table
//!
//! Durable backend: every game owns one append-only `game-<sha256>.jsonl`
//! file inside the data directory, named by the SHA-256 digest of the game
//! id so any id fits a file name. Each line is one serialized `Message`,
//! and the game id is recovered from the lines themselves.
//!
//! ```text
//! Write Path:
//! ┌──────────────┐    ┌────────────────┐    ┌───────────┐    ┌──────────────┐
//! │ put_if_absent│───►│ partition lock │───►│ append +  │───►│ index insert │
//! │              │    │ + key check    │    │ fsync     │    │ (visible)    │
//! └──────────────┘    └────────────────┘    └───────────┘    └──────────────┘
//!
//! Read Path (Startup):
//! ┌──────────────────┐    ┌─────────────────┐
//! │ scan data dir    │───►│ replay lines    │───► Ready!
//! │ (game-*.jsonl)   │    │ into the index  │
//! └──────────────────┘    └─────────────────┘
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use super::memory::{Partition, Partitions};
use super::table::{MessageTable, Page};
use super::{StoreError, StoreResult};
use crate::types::{GameId, Message};

const FILE_PREFIX: &str = "game-";
const FILE_EXTENSION: &str = "jsonl";
const DIGEST_HEX_LEN: usize = 64;

/// Open append handle plus the committed length of the file
struct PartitionWriter {
    file: File,
    len: u64,
    /// Set when a torn append could not be rolled back
    poisoned: bool,
}

impl PartitionWriter {
    fn open(path: &Path) -> StoreResult<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            file,
            len,
            poisoned: false,
        })
    }

    /// Append one line and fsync. A failed write is truncated away; if the
    /// truncation fails too, the writer refuses all further appends.
    fn append_line(&mut self, line: &str) -> StoreResult<()> {
        if self.poisoned {
            return Err(StoreError::StorageUnavailable(
                "partition log has an unrecovered torn append; reopen the table".to_string(),
            ));
        }

        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');

        let written = self
            .file
            .write_all(record.as_bytes())
            .and_then(|_| self.file.sync_data());

        if let Err(e) = written {
            if let Err(truncate_err) = self.file.set_len(self.len) {
                error!(error = %truncate_err, "failed to roll back torn append, partition disabled");
                self.poisoned = true;
            }
            return Err(e.into());
        }

        self.len += record.len() as u64;
        Ok(())
    }
}

/// On-disk partition: in-memory index guarded by the file writer
struct FilePartition {
    index: Partition,
    writer: Mutex<PartitionWriter>,
}

impl FilePartition {
    fn append(&self, message: &Message) -> StoreResult<()> {
        let mut writer = self.writer.lock();
        if self.index.contains(message.seq) {
            return Err(StoreError::SequenceConflict {
                game: message.game.to_string(),
                seq: message.seq,
            });
        }
        writer.append_line(&message.to_json_line()?)?;
        self.index.insert_if_absent(message.clone());
        Ok(())
    }
}

struct JsonlInner {
    data_dir: PathBuf,
    partitions: Partitions<FilePartition>,
}

impl JsonlInner {
    fn partition_path(&self, game: &GameId) -> PathBuf {
        self.data_dir.join(partition_file_name(game))
    }

    fn partition_for_write(&self, game: &GameId) -> StoreResult<Arc<FilePartition>> {
        self.partitions.get_or_try_insert_with(game, || {
            let path = self.partition_path(game);
            debug!(game = %game, path = %path.display(), "creating partition file");
            Ok(FilePartition {
                index: Partition::default(),
                writer: Mutex::new(PartitionWriter::open(&path)?),
            })
        })
    }
}

/// Message table persisted as one JSON-lines file per game
pub struct JsonlTable {
    inner: Arc<JsonlInner>,
}

impl JsonlTable {
    /// Open (or create) a table rooted at `data_dir`, replaying existing files
    pub fn open<P: AsRef<Path>>(data_dir: P) -> StoreResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)?;

        let partitions = Partitions::default();
        let mut total = 0usize;

        for entry in fs::read_dir(&data_dir)? {
            let path = entry?.path();
            if !is_partition_file(&path) {
                continue;
            }

            let Some((game, index)) = load_partition(&path)? else {
                continue;
            };
            total += index.len();
            let writer = PartitionWriter::open(&path)?;
            partitions.insert(
                game,
                FilePartition {
                    index,
                    writer: Mutex::new(writer),
                },
            );
        }

        info!(
            data_dir = %data_dir.display(),
            games = partitions.game_count(),
            messages = total,
            "opened message table"
        );

        Ok(Self {
            inner: Arc::new(JsonlInner {
                data_dir,
                partitions,
            }),
        })
    }
}

#[async_trait]
impl MessageTable for JsonlTable {
    async fn latest_seq(&self, game: &GameId) -> StoreResult<Option<u64>> {
        Ok(self
            .inner
            .partitions
            .get(game)
            .and_then(|p| p.index.latest_seq()))
    }

    async fn put_if_absent(&self, message: &Message) -> StoreResult<()> {
        let inner = self.inner.clone();
        let message = message.clone();
        // Runs to completion even if the caller is dropped mid-append.
        tokio::task::spawn_blocking(move || {
            inner
                .partition_for_write(&message.game)?
                .append(&message)
        })
        .await?
    }

    async fn query(&self, game: &GameId, start: u64, end: u64, limit: usize) -> StoreResult<Page> {
        Ok(self
            .inner
            .partitions
            .get(game)
            .map(|p| p.index.query(start, end, limit))
            .unwrap_or_default())
    }
}

/// `game-<sha256(game)>.jsonl`
fn partition_file_name(game: &GameId) -> String {
    let digest = Sha256::digest(game.as_str().as_bytes());
    format!("{}{}.{}", FILE_PREFIX, hex::encode(digest), FILE_EXTENSION)
}

fn is_partition_file(path: &Path) -> bool {
    if path.extension().map_or(true, |ext| ext != FILE_EXTENSION) {
        return false;
    }
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.strip_prefix(FILE_PREFIX))
        .is_some_and(|digest| {
            digest.len() == DIGEST_HEX_LEN && hex::decode(digest).is_ok()
        })
}

/// Replay a partition file into a fresh index.
///
/// The first line whose game hashes to the file name decides the owner;
/// returns `None` when no such line exists. A trailing line without newline
/// is the remains of an interrupted append and is cut off. Unparsable or
/// foreign lines are skipped.
fn load_partition(path: &Path) -> StoreResult<Option<(GameId, Partition)>> {
    let mut content = fs::read(path)?;

    if !content.is_empty() && !content.ends_with(b"\n") {
        let keep = content
            .iter()
            .rposition(|&b| b == b'\n')
            .map(|pos| pos + 1)
            .unwrap_or(0);
        warn!(
            path = %path.display(),
            dropped_bytes = content.len() - keep,
            "truncating torn append"
        );
        OpenOptions::new()
            .write(true)
            .open(path)?
            .set_len(keep as u64)?;
        content.truncate(keep);
    }

    let file_name = path.file_name().and_then(|name| name.to_str());
    let index = Partition::default();
    let mut owner: Option<GameId> = None;
    let text = String::from_utf8_lossy(&content);

    for (line_num, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let message = match Message::from_json_line(line) {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    line = line_num + 1,
                    error = %e,
                    "failed to parse message"
                );
                continue;
            }
        };

        let belongs = match &owner {
            Some(game) => &message.game == game,
            None => file_name == Some(partition_file_name(&message.game).as_str()),
        };
        if !belongs {
            warn!(
                path = %path.display(),
                line = line_num + 1,
                found = %message.game,
                "message for another game skipped"
            );
            continue;
        }

        owner.get_or_insert_with(|| message.game.clone());
        if !index.insert_if_absent(message) {
            warn!(path = %path.display(), line = line_num + 1, "duplicate seq skipped");
        }
    }

    if owner.is_none() && !content.is_empty() {
        warn!(path = %path.display(), "no readable message in partition file, skipped");
    }

    Ok(owner.map(|game| (game, index)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn message(game: &str, seq: u64, payload: &[u8]) -> Message {
        Message::new(GameId::parse(game).unwrap(), seq, payload.to_vec())
    }

    #[tokio::test]
    async fn test_put_and_query() {
        let temp_dir = TempDir::new().unwrap();
        let table = JsonlTable::open(temp_dir.path()).unwrap();

        table.put_if_absent(&message("chess", 0, b"hello")).await.unwrap();
        table.put_if_absent(&message("chess", 1, b"world")).await.unwrap();

        let chess = GameId::parse("chess").unwrap();
        assert_eq!(table.latest_seq(&chess).await.unwrap(), Some(1));

        let page = table.query(&chess, 0, 1, 10).await.unwrap();
        let payloads: Vec<&[u8]> = page.messages.iter().map(|m| m.payload.as_slice()).collect();
        assert_eq!(payloads, vec![b"hello".as_slice(), b"world".as_slice()]);
    }

    #[tokio::test]
    async fn test_conflict_does_not_touch_file() {
        let temp_dir = TempDir::new().unwrap();
        let table = JsonlTable::open(temp_dir.path()).unwrap();
        table.put_if_absent(&message("chess", 0, b"a")).await.unwrap();

        let err = table
            .put_if_absent(&message("chess", 0, b"b"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SequenceConflict { seq: 0, .. }));

        let chess = GameId::parse("chess").unwrap();
        let path = table.inner.partition_path(&chess);
        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_reopen_replays_every_partition() {
        let temp_dir = TempDir::new().unwrap();
        {
            let table = JsonlTable::open(temp_dir.path()).unwrap();
            table.put_if_absent(&message("chess", 0, b"e4")).await.unwrap();
            table.put_if_absent(&message("chess", 1, b"e5")).await.unwrap();
            table.put_if_absent(&message("go game/42", 0, &[0xff, 0x01])).await.unwrap();
        }

        let table = JsonlTable::open(temp_dir.path()).unwrap();
        let chess = GameId::parse("chess").unwrap();
        let go = GameId::parse("go game/42").unwrap();

        assert_eq!(table.latest_seq(&chess).await.unwrap(), Some(1));
        let page = table.query(&go, 0, u64::MAX, 10).await.unwrap();
        assert_eq!(page.messages.len(), 1);
        assert_eq!(page.messages[0].payload, vec![0xff, 0x01]);

        // Appends continue after the replayed state.
        let err = table
            .put_if_absent(&message("chess", 1, b"dup"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SequenceConflict { .. }));
        table.put_if_absent(&message("chess", 2, b"Nf3")).await.unwrap();
        assert_eq!(table.latest_seq(&chess).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_open_drops_torn_tail_and_bad_lines() {
        let temp_dir = TempDir::new().unwrap();
        let chess = GameId::parse("chess").unwrap();
        let path = temp_dir.path().join(partition_file_name(&chess));

        let good = message("chess", 0, b"ok").to_json_line().unwrap();
        let content = format!("{}\nnot json\n{{\"game\":\"chess\",\"seq\":1,", good);
        fs::write(&path, content).unwrap();

        let table = JsonlTable::open(temp_dir.path()).unwrap();
        assert_eq!(table.latest_seq(&chess).await.unwrap(), Some(0));

        let on_disk = fs::read_to_string(&path).unwrap();
        assert!(on_disk.ends_with('\n'));

        table.put_if_absent(&message("chess", 1, b"next")).await.unwrap();
        let reopened = JsonlTable::open(temp_dir.path()).unwrap();
        assert_eq!(reopened.latest_seq(&chess).await.unwrap(), Some(1));
    }

    #[test]
    fn test_ignores_unrelated_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "hi").unwrap();
        fs::write(temp_dir.path().join("game-zz.jsonl"), "").unwrap();
        let unowned = format!("game-{}.jsonl", "0".repeat(DIGEST_HEX_LEN));
        fs::write(temp_dir.path().join(unowned), "").unwrap();

        let table = JsonlTable::open(temp_dir.path()).unwrap();
        assert_eq!(table.inner.partitions.game_count(), 0);
    }

    #[tokio::test]
    async fn test_long_game_id_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let long_game = "g".repeat(300);
        {
            let table = JsonlTable::open(temp_dir.path()).unwrap();
            table.put_if_absent(&message(&long_game, 0, b"x")).await.unwrap();
            table.put_if_absent(&message(&long_game, 1, b"y")).await.unwrap();
        }

        let table = JsonlTable::open(temp_dir.path()).unwrap();
        let game = GameId::parse(&long_game).unwrap();
        assert_eq!(table.latest_seq(&game).await.unwrap(), Some(1));

        let page = table.query(&game, 0, u64::MAX, 10).await.unwrap();
        assert_eq!(page.messages.len(), 2);
        assert_eq!(page.messages[1].game.as_str(), long_game);

        let name = partition_file_name(&game);
        assert_eq!(
            name.len(),
            FILE_PREFIX.len() + DIGEST_HEX_LEN + 1 + FILE_EXTENSION.len()
        );
    }

    #[test]
    fn test_lines_for_another_game_are_not_adopted() {
        let temp_dir = TempDir::new().unwrap();
        let chess = GameId::parse("chess").unwrap();
        let path = temp_dir.path().join(partition_file_name(&chess));

        let stray = message("go", 0, b"stray").to_json_line().unwrap();
        let own = message("chess", 0, b"own").to_json_line().unwrap();
        fs::write(&path, format!("{}\n{}\n", stray, own)).unwrap();

        let table = JsonlTable::open(temp_dir.path()).unwrap();
        assert_eq!(table.inner.partitions.game_count(), 1);
        let partition = table.inner.partitions.get(&chess).unwrap();
        assert_eq!(partition.index.len(), 1);
        assert!(table.inner.partitions.get(&GameId::parse("go").unwrap()).is_none());
    }

    #[test]
    fn test_failed_write_leaves_file_and_index_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let chess = GameId::parse("chess").unwrap();
        let path = temp_dir.path().join(partition_file_name(&chess));
        let first = message("chess", 0, b"e4");
        fs::write(&path, format!("{}\n", first.to_json_line().unwrap())).unwrap();
        let len_before = fs::metadata(&path).unwrap().len();

        // A read-only handle makes every write fail.
        let partition = FilePartition {
            index: Partition::default(),
            writer: Mutex::new(PartitionWriter {
                file: File::open(&path).unwrap(),
                len: len_before,
                poisoned: false,
            }),
        };
        partition.index.insert_if_absent(first);

        let err = partition.append(&message("chess", 1, b"e5")).unwrap_err();
        assert!(matches!(err, StoreError::StorageUnavailable(_)));
        let err = partition.append(&message("chess", 1, b"e5")).unwrap_err();
        assert!(matches!(err, StoreError::StorageUnavailable(_)));

        assert_eq!(fs::metadata(&path).unwrap().len(), len_before);
        assert_eq!(partition.index.latest_seq(), Some(0));
        assert_eq!(partition.index.len(), 1);
    }

    #[test]
    fn test_disabled_writer_refuses_appends() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("game-disabled.jsonl");
        let mut writer = PartitionWriter::open(&path).unwrap();
        writer.poisoned = true;

        let err = writer.append_line("{}").unwrap_err();
        assert!(matches!(err, StoreError::StorageUnavailable(_)));
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
        assert_eq!(writer.len, 0);
    }
}
