//! `SQLite` schema definitions for roster.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the students table.
pub const CREATE_STUDENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS students (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL CHECK (length(name) > 0),
    email TEXT NOT NULL CHECK (length(email) > 0),
    roll_number TEXT NOT NULL CHECK (length(roll_number) > 0),
    department TEXT NOT NULL CHECK (length(department) > 0),
    year TEXT NOT NULL CHECK (length(year) > 0),
    phone TEXT,
    address TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// Unique index backing the email uniqueness rule.
pub const CREATE_EMAIL_INDEX: &str = r"
CREATE UNIQUE INDEX IF NOT EXISTS idx_students_email ON students(email)
";

/// Unique index backing the roll number uniqueness rule.
pub const CREATE_ROLL_NUMBER_INDEX: &str = r"
CREATE UNIQUE INDEX IF NOT EXISTS idx_students_roll_number ON students(roll_number)
";

/// SQL statement to create an index on `department` for grouping.
pub const CREATE_DEPARTMENT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_students_department ON students(department)
";

/// SQL statement to create an index on `year` for grouping.
pub const CREATE_YEAR_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_students_year ON students(year)
";

/// SQL statement to create an index on `created_at` for newest-first listing.
pub const CREATE_CREATED_AT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_students_created_at ON students(created_at DESC)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_STUDENTS_TABLE,
    CREATE_EMAIL_INDEX,
    CREATE_ROLL_NUMBER_INDEX,
    CREATE_DEPARTMENT_INDEX,
    CREATE_YEAR_INDEX,
    CREATE_CREATED_AT_INDEX,
    CREATE_METADATA_TABLE,
];
