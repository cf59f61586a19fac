//! Storage layer for roster.
//!
//! This module defines the [`StudentStore`] contract the HTTP layer depends
//! on, and [`Storage`], its `SQLite` implementation. Uniqueness of email and
//! roll number is enforced by unique indexes; a write rejected by one of them
//! surfaces as [`Error::Conflict`].

pub mod migrations;
pub mod schema;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::student::{NewStudent, Student, StudentId};

const IN_MEMORY: &str = ":memory:";

const STUDENT_COLUMNS: &str = "id, name, email, roll_number, department, year, phone, address, \
     created_at, updated_at";

/// Field a student count can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupField {
    /// Group by department.
    Department,
    /// Group by year of study.
    Year,
}

impl GroupField {
    fn column(self) -> &'static str {
        match self {
            Self::Department => "department",
            Self::Year => "year",
        }
    }
}

impl fmt::Display for GroupField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Number of students sharing one value of a [`GroupField`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCount {
    /// The shared value.
    #[serde(rename = "_id")]
    pub key: String,
    /// How many students carry it.
    pub count: u64,
}

/// Durable storage of student records.
///
/// The HTTP layer only sees this trait, so any backend (or a test double)
/// can be injected at startup.
#[async_trait]
pub trait StudentStore: Send + Sync + fmt::Debug {
    /// All records, newest first.
    async fn find_all(&self) -> Result<Vec<Student>>;

    /// One record, or `None` if no record has this id.
    async fn find_by_id(&self, id: &StudentId) -> Result<Option<Student>>;

    /// Any record sharing `email` or `roll_number`, other than `exclude`.
    async fn find_conflicting(
        &self,
        email: &str,
        roll_number: &str,
        exclude: Option<&StudentId>,
    ) -> Result<Option<Student>>;

    /// Store a new record, assigning its id and timestamps.
    ///
    /// Fails with [`Error::Conflict`] if the email or roll number is taken.
    async fn insert(&self, fields: NewStudent) -> Result<Student>;

    /// Replace the mutable fields of an existing record.
    ///
    /// Fails with [`Error::NotFound`] if the record does not exist and with
    /// [`Error::Conflict`] if the new email or roll number is taken.
    async fn update_by_id(&self, id: &StudentId, fields: NewStudent) -> Result<Student>;

    /// Remove a record, returning what it held.
    ///
    /// Fails with [`Error::NotFound`] if the record does not exist.
    async fn delete_by_id(&self, id: &StudentId) -> Result<Student>;

    /// Total number of records.
    async fn count_all(&self) -> Result<u64>;

    /// Record counts per distinct value of `field`, ordered by value.
    async fn count_by_group(&self, field: GroupField) -> Result<Vec<GroupCount>>;
}

/// `SQLite`-backed student store.
///
/// The connection is opened lazily: if the database cannot be reached when
/// the store is created, every operation retries the open and fails until
/// it succeeds. Queries run on tokio's blocking pool, one at a time.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection, `None` until the database could be opened.
    conn: Arc<Mutex<Option<Connection>>>,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = open_connection(&path)?;
        info!("Database opened successfully at {}", path.display());
        Ok(Self::with_connection(path, Some(conn)))
    }

    /// Create a store for the given path without requiring the database to be
    /// reachable yet.
    ///
    /// A failed first attempt is logged, not returned.
    #[must_use]
    pub fn connect_lazy(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let conn = match open_connection(&path) {
            Ok(conn) => {
                info!("Database opened successfully at {}", path.display());
                Some(conn)
            }
            Err(e) => {
                error!("Database unavailable, will retry on first request: {e}");
                None
            }
        };
        Self::with_connection(path, conn)
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(IN_MEMORY),
            source,
        })?;
        migrations::initialize_schema(&conn)?;

        Ok(Self::with_connection(PathBuf::from(IN_MEMORY), Some(conn)))
    }

    fn with_connection(path: PathBuf, conn: Option<Connection>) -> Self {
        Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a database connection is currently held.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.conn.lock().map(|guard| guard.is_some()).unwrap_or(false)
    }

    /// Run `f` against the connection on the blocking pool, opening the
    /// connection first if needed.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| Error::internal("storage connection lock poisoned"))?;

            if guard.is_none() {
                let opened = open_connection(&path)?;
                info!("Database connection restored at {}", path.display());
                *guard = Some(opened);
            }

            match guard.as_ref() {
                Some(conn) => f(conn),
                None => Err(Error::internal("storage connection missing after open")),
            }
        })
        .await
        .map_err(|e| Error::internal(format!("storage task failed: {e}")))?
    }
}

#[async_trait]
impl StudentStore for Storage {
    async fn find_all(&self) -> Result<Vec<Student>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {STUDENT_COLUMNS} FROM students ORDER BY created_at DESC, rowid DESC"
            ))?;
            let students = stmt
                .query_map([], row_to_student)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(students)
        })
        .await
    }

    async fn find_by_id(&self, id: &StudentId) -> Result<Option<Student>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let student = conn
                .query_row(
                    &format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?1"),
                    [id],
                    row_to_student,
                )
                .optional()?;
            Ok(student)
        })
        .await
    }

    async fn find_conflicting(
        &self,
        email: &str,
        roll_number: &str,
        exclude: Option<&StudentId>,
    ) -> Result<Option<Student>> {
        let email = email.to_owned();
        let roll_number = roll_number.to_owned();
        let exclude = exclude.map(ToString::to_string);
        self.with_conn(move |conn| {
            let student = conn
                .query_row(
                    &format!(
                        "SELECT {STUDENT_COLUMNS} FROM students
                         WHERE (email = ?1 OR roll_number = ?2)
                           AND (?3 IS NULL OR id <> ?3)
                         LIMIT 1"
                    ),
                    params![email, roll_number, exclude],
                    row_to_student,
                )
                .optional()?;
            Ok(student)
        })
        .await
    }

    async fn insert(&self, fields: NewStudent) -> Result<Student> {
        let student = Student::create(fields, now());
        let student = self
            .with_conn(move |conn| {
                conn.execute(
                    &format!(
                        "INSERT INTO students ({STUDENT_COLUMNS})
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                    ),
                    params![
                        student.id.to_string(),
                        student.name,
                        student.email,
                        student.roll_number,
                        student.department,
                        student.year,
                        student.phone,
                        student.address,
                        format_timestamp(student.created_at),
                        format_timestamp(student.updated_at),
                    ],
                )
                .map_err(map_write_error)?;
                Ok(student)
            })
            .await?;

        debug!("Inserted student {} ({})", student.id, student.roll_number);
        Ok(student)
    }

    async fn update_by_id(&self, id: &StudentId, fields: NewStudent) -> Result<Student> {
        let key = id.to_string();
        let stamp = format_timestamp(now());
        let updated = self
            .with_conn(move |conn| {
                // The MAX keeps updated_at monotonic; timestamps share one fixed-width format.
                conn.query_row(
                    &format!(
                        "UPDATE students
                         SET name = ?2, email = ?3, roll_number = ?4, department = ?5,
                             year = ?6, phone = ?7, address = ?8,
                             updated_at = MAX(updated_at, ?9)
                         WHERE id = ?1
                         RETURNING {STUDENT_COLUMNS}"
                    ),
                    params![
                        key,
                        fields.name,
                        fields.email,
                        fields.roll_number,
                        fields.department,
                        fields.year,
                        fields.phone,
                        fields.address,
                        stamp,
                    ],
                    row_to_student,
                )
                .optional()
                .map_err(map_write_error)
            })
            .await?;

        let student = updated.ok_or_else(|| Error::not_found(id.to_string()))?;
        debug!("Updated student {}", student.id);
        Ok(student)
    }

    async fn delete_by_id(&self, id: &StudentId) -> Result<Student> {
        let key = id.to_string();
        let deleted = self
            .with_conn(move |conn| {
                let student = conn
                    .query_row(
                        &format!("DELETE FROM students WHERE id = ?1 RETURNING {STUDENT_COLUMNS}"),
                        [key],
                        row_to_student,
                    )
                    .optional()?;
                Ok(student)
            })
            .await?;

        let student = deleted.ok_or_else(|| Error::not_found(id.to_string()))?;
        debug!("Deleted student {}", student.id);
        Ok(student)
    }

    async fn count_all(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM students", [], |row| row.get(0))?;
            to_count(count)
        })
        .await
    }

    async fn count_by_group(&self, field: GroupField) -> Result<Vec<GroupCount>> {
        let column = field.column();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {column}, COUNT(*) FROM students GROUP BY {column} ORDER BY {column}"
            ))?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(key, count)| {
                    Ok(GroupCount {
                        key,
                        count: to_count(count)?,
                    })
                })
                .collect()
        })
        .await
    }
}

/// Open a file-backed connection and bring its schema up to date.
fn open_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    debug!("Opening database at {}", path.display());
    let conn = Connection::open(path).map_err(|source| Error::DatabaseOpen {
        path: path.to_path_buf(),
        source,
    })?;

    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
    migrations::initialize_schema(&conn)?;

    Ok(conn)
}

/// Map a failed write, turning unique-index rejections into conflicts.
fn map_write_error(err: rusqlite::Error) -> Error {
    if let rusqlite::Error::SqliteFailure(failure, message) = &err {
        if failure.code == ErrorCode::ConstraintViolation {
            match failure.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    debug!("Unique constraint rejected write: {:?}", message);
                    return Error::duplicate_student();
                }
                rusqlite::ffi::SQLITE_CONSTRAINT_CHECK
                | rusqlite::ffi::SQLITE_CONSTRAINT_NOTNULL => {
                    return Error::validation(
                        message.clone().unwrap_or_else(|| err.to_string()),
                    );
                }
                _ => {}
            }
        }
    }
    Error::DatabaseQuery(err)
}

/// Current time at the precision timestamps are stored with.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn to_count(count: i64) -> Result<u64> {
    u64::try_from(count).map_err(|_| Error::InvalidData {
        message: format!("negative count: {count}"),
    })
}

/// Convert a database row to a Student struct.
fn row_to_student(row: &Row<'_>) -> rusqlite::Result<Student> {
    let id: String = row.get(0)?;
    let id = id
        .parse::<StudentId>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;

    Ok(Student {
        id,
        name: row.get(1)?,
        email: row.get(2)?,
        roll_number: row.get(3)?,
        department: row.get(4)?,
        year: row.get(5)?,
        phone: row.get(6)?,
        address: row.get(7)?,
        created_at: parse_timestamp(8, &created_at)?,
        updated_at: parse_timestamp(9, &updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::student::StudentInput;

    fn create_test_storage() -> Storage {
        crate::logging::init_test_logging();
        Storage::open_in_memory().expect("failed to create test storage")
    }

    fn fields(name: &str, email: &str, roll: &str, department: &str, year: &str) -> NewStudent {
        StudentInput::new(name, email, roll, department, year)
            .validate()
            .expect("valid test student")
    }

    fn ann() -> NewStudent {
        fields("Ann", "ann@x.com", "R1", "CS", "1st Year")
    }

    #[tokio::test]
    async fn test_insert_and_find_by_id() {
        let storage = create_test_storage();
        let created = storage.insert(ann()).await.unwrap();

        let found = storage.find_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(found, created);
        assert_eq!(found.created_at, found.updated_at);
    }

    #[tokio::test]
    async fn test_find_by_id_missing() {
        let storage = create_test_storage();
        let found = storage.find_by_id(&StudentId::generate()).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_find_all_newest_first() {
        let storage = create_test_storage();
        let first = storage.insert(ann()).await.unwrap();
        let second = storage
            .insert(fields("Bob", "bob@x.com", "R2", "EE", "2nd Year"))
            .await
            .unwrap();
        let third = storage
            .insert(fields("Cid", "cid@x.com", "R3", "CS", "2nd Year"))
            .await
            .unwrap();

        let ids: Vec<_> = storage
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);
    }

    #[tokio::test]
    async fn test_unique_email_enforced_by_index() {
        let storage = create_test_storage();
        storage.insert(ann()).await.unwrap();

        let err = storage
            .insert(fields("Ann Two", "ANN@x.com", "R9", "CS", "1st Year"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(storage.count_all().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unique_roll_number_enforced_by_index() {
        let storage = create_test_storage();
        storage.insert(ann()).await.unwrap();

        let err = storage
            .insert(fields("Other", "other@x.com", "R1", "CS", "1st Year"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_find_conflicting() {
        let storage = create_test_storage();
        let ann = storage.insert(ann()).await.unwrap();

        let by_email = storage
            .find_conflicting("ann@x.com", "ZZZ", None)
            .await
            .unwrap();
        assert_eq!(by_email.map(|s| s.id), Some(ann.id));

        let by_roll = storage
            .find_conflicting("nobody@x.com", "R1", None)
            .await
            .unwrap();
        assert_eq!(by_roll.map(|s| s.id), Some(ann.id));

        let none = storage
            .find_conflicting("nobody@x.com", "ZZZ", None)
            .await
            .unwrap();
        assert!(none.is_none());

        let excluded = storage
            .find_conflicting("ann@x.com", "R1", Some(&ann.id))
            .await
            .unwrap();
        assert!(excluded.is_none());
    }

    #[tokio::test]
    async fn test_update_by_id() {
        let storage = create_test_storage();
        let created = storage.insert(ann()).await.unwrap();

        let updated = storage
            .update_by_id(&created.id, fields("Ann", "ann@x.com", "R1", "EE", "2nd Year"))
            .await
            .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(updated.department, "EE");
        assert_eq!(updated.year, "2nd Year");
        assert_eq!(
            storage.find_by_id(&created.id).await.unwrap().unwrap(),
            updated
        );
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let storage = create_test_storage();
        let err = storage
            .update_by_id(&StudentId::generate(), ann())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_into_taken_roll_number_conflicts() {
        let storage = create_test_storage();
        storage.insert(ann()).await.unwrap();
        let bob = storage
            .insert(fields("Bob", "bob@x.com", "R2", "EE", "2nd Year"))
            .await
            .unwrap();

        let err = storage
            .update_by_id(&bob.id, fields("Bob", "bob@x.com", "R1", "EE", "2nd Year"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(
            storage.find_by_id(&bob.id).await.unwrap().unwrap().roll_number,
            "R2"
        );
    }

    #[tokio::test]
    async fn test_delete_by_id() {
        let storage = create_test_storage();
        let created = storage.insert(ann()).await.unwrap();

        let deleted = storage.delete_by_id(&created.id).await.unwrap();
        assert_eq!(deleted, created);
        assert!(storage.find_by_id(&created.id).await.unwrap().is_none());

        let err = storage.delete_by_id(&created.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_counts() {
        let storage = create_test_storage();
        assert_eq!(storage.count_all().await.unwrap(), 0);
        assert!(storage
            .count_by_group(GroupField::Department)
            .await
            .unwrap()
            .is_empty());

        storage.insert(ann()).await.unwrap();
        storage
            .insert(fields("Bob", "bob@x.com", "R2", "EE", "1st Year"))
            .await
            .unwrap();
        storage
            .insert(fields("Cid", "cid@x.com", "R3", "CS", "2nd Year"))
            .await
            .unwrap();

        assert_eq!(storage.count_all().await.unwrap(), 3);

        let departments = storage.count_by_group(GroupField::Department).await.unwrap();
        assert_eq!(
            departments,
            vec![
                GroupCount {
                    key: "CS".to_string(),
                    count: 2
                },
                GroupCount {
                    key: "EE".to_string(),
                    count: 1
                },
            ]
        );

        let years = storage.count_by_group(GroupField::Year).await.unwrap();
        assert_eq!(years.iter().map(|g| g.count).sum::<u64>(), 3);
    }

    #[test]
    fn test_group_count_serializes_with_underscore_id() {
        let json = serde_json::to_value(GroupCount {
            key: "CS".to_string(),
            count: 4,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"_id": "CS", "count": 4}));
    }

    #[test]
    fn test_group_field_display() {
        assert_eq!(GroupField::Department.to_string(), "department");
        assert_eq!(GroupField::Year.to_string(), "year");
    }

    #[test]
    fn test_path_in_memory() {
        let storage = create_test_storage();
        assert_eq!(storage.path().to_string_lossy(), ":memory:");
        assert!(storage.is_connected());
    }

    #[tokio::test]
    async fn test_open_file_based_persists() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("students.db");

        let id = {
            let storage = Storage::open(&db_path).unwrap();
            assert_eq!(storage.path(), db_path);
            storage.insert(ann()).await.unwrap().id
        };

        let reopened = Storage::open(&db_path).unwrap();
        let found = reopened.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(found.roll_number, "R1");
    }

    #[tokio::test]
    #[allow(clippy::await_holding_lock)]
    async fn test_busy_connection_does_not_block_the_runtime() {
        let storage = Arc::new(create_test_storage());
        let held = storage.conn.lock().unwrap();

        let waiting = tokio::spawn({
            let storage = Arc::clone(&storage);
            async move { storage.count_all().await }
        });

        // Single-threaded runtime: this only wakes if the query is parked off-thread.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiting.is_finished());

        drop(held);
        assert_eq!(waiting.await.unwrap().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_connect_lazy_recovers_when_database_becomes_reachable() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the parent directory should be blocks the open.
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let db_path = blocker.join("students.db");

        let storage = Storage::connect_lazy(&db_path);
        assert!(!storage.is_connected());
        assert!(storage.count_all().await.is_err());

        std::fs::remove_file(&blocker).unwrap();
        assert_eq!(storage.count_all().await.unwrap(), 0);
        assert!(storage.is_connected());
    }
}
