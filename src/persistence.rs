//! # SQLite Course Store
//!
//! [`CourseStore`] backed by SQLite. Coordinate sequences and run trails are
//! stored as MessagePack blobs; everything else is plain columns so courses
//! can be listed without decoding paths.

use rusqlite::{params, Connection, OptionalExtension, Row};

use log::{debug, info};

use crate::error::{Result, TrackerError};
use crate::store::{CourseDraft, CourseStore, RunRecord};
use crate::{Coordinate, Course, LatLng};

/// Course and run storage in a SQLite database.
pub struct SqliteCourseStore {
    db: Connection,
}

impl SqliteCourseStore {
    /// Open (or create) a store at the given database path.
    pub fn new(db_path: &str) -> Result<Self> {
        let db = Connection::open(db_path)?;
        Self::init_schema(&db)?;
        info!("[CourseStore] Opened {}", db_path);
        Ok(Self { db })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::new(":memory:")
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            -- Courses (path stored as MessagePack)
            CREATE TABLE IF NOT EXISTS courses (
                seq INTEGER PRIMARY KEY,
                id TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                distance_meters REAL NOT NULL,
                coordinates BLOB NOT NULL,
                point_count INTEGER NOT NULL,
                created_at REAL NOT NULL,
                created_by TEXT NOT NULL,
                is_public INTEGER NOT NULL,
                run_count INTEGER NOT NULL DEFAULT 0
            );

            -- Runs (trail stored as MessagePack)
            CREATE TABLE IF NOT EXISTS runs (
                seq INTEGER PRIMARY KEY,
                id TEXT NOT NULL UNIQUE,
                course_id TEXT,
                user_id TEXT NOT NULL,
                started_at REAL NOT NULL,
                distance_meters REAL NOT NULL,
                duration_seconds REAL NOT NULL,
                pace_seconds_per_km REAL NOT NULL,
                trail BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_runs_course ON runs(course_id);
            CREATE INDEX IF NOT EXISTS idx_courses_public ON courses(is_public);
        "#,
        )?;
        Ok(())
    }

    fn next_seq(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT IFNULL(MAX(seq), 0) + 1 FROM {}", table);
        Ok(self.db.query_row(&sql, [], |row| row.get(0))?)
    }

    /// Runs recorded against a course, oldest first.
    pub fn runs_for_course(&self, course_id: &str) -> Result<Vec<RunRecord>> {
        let mut stmt = self.db.prepare(
            "SELECT course_id, user_id, started_at, distance_meters, duration_seconds,
                    pace_seconds_per_km, trail
             FROM runs WHERE course_id = ? ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![course_id], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, f64>(5)?,
                row.get::<_, Vec<u8>>(6)?,
            ))
        })?;

        let mut runs = Vec::new();
        for row in rows {
            let (course_id, user_id, started_at, distance, duration, pace, trail_blob) = row?;
            let trail: Vec<LatLng> = decode(&trail_blob)?;
            runs.push(RunRecord {
                course_id,
                user_id,
                started_at,
                distance_meters: distance,
                duration_seconds: duration,
                pace_seconds_per_km: pace,
                trail,
            });
        }
        Ok(runs)
    }
}

const COURSE_COLUMNS: &str =
    "id, title, distance_meters, coordinates, created_at, created_by, is_public, run_count";

type CourseRow = (String, String, f64, Vec<u8>, f64, String, bool, u32);

fn read_course_row(row: &Row<'_>) -> rusqlite::Result<CourseRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn course_from_row(row: CourseRow) -> Result<Course> {
    let (id, title, distance_meters, blob, created_at, created_by, is_public, run_count) = row;
    let coordinates: Vec<Coordinate> = decode(&blob)?;
    Ok(Course {
        id,
        title,
        distance_meters,
        coordinates,
        created_at,
        created_by,
        is_public,
        run_count,
    })
}

fn encode<T: serde::Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    rmp_serde::to_vec(value).map_err(|e| TrackerError::Persistence {
        message: format!("encode failed: {}", e),
    })
}

fn decode<T: serde::de::DeserializeOwned>(blob: &[u8]) -> Result<T> {
    rmp_serde::from_slice(blob).map_err(|e| TrackerError::Persistence {
        message: format!("decode failed: {}", e),
    })
}

impl CourseStore for SqliteCourseStore {
    fn save_course(&mut self, draft: &CourseDraft) -> Result<String> {
        let seq = self.next_seq("courses")?;
        let id = format!("course-{}", seq);
        let blob = encode(&draft.coordinates)?;
        self.db.execute(
            "INSERT INTO courses (seq, id, title, distance_meters, coordinates, point_count,
                                  created_at, created_by, is_public, run_count)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0)",
            params![
                seq,
                id,
                draft.title,
                draft.distance_meters,
                blob,
                draft.coordinates.len() as i64,
                draft.created_at,
                draft.created_by,
                draft.is_public
            ],
        )?;
        info!(
            "[CourseStore] Saved course {} ({} points)",
            id,
            draft.coordinates.len()
        );
        Ok(id)
    }

    fn save_run(&mut self, run: &RunRecord) -> Result<String> {
        let seq = self.next_seq("runs")?;
        let id = format!("run-{}", seq);
        let trail = encode(&run.trail)?;

        let tx = self.db.transaction()?;
        tx.execute(
            "INSERT INTO runs (seq, id, course_id, user_id, started_at, distance_meters,
                               duration_seconds, pace_seconds_per_km, trail)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                seq,
                id,
                run.course_id,
                run.user_id,
                run.started_at,
                run.distance_meters,
                run.duration_seconds,
                run.pace_seconds_per_km,
                trail
            ],
        )?;
        if let Some(course_id) = &run.course_id {
            let updated = tx.execute(
                "UPDATE courses SET run_count = run_count + 1 WHERE id = ?",
                params![course_id],
            )?;
            if updated == 0 {
                debug!("[CourseStore] Run for unknown course {}", course_id);
            }
        }
        tx.commit()?;

        info!(
            "[CourseStore] Saved run {} ({:.0}m, {:.0}s)",
            id, run.distance_meters, run.duration_seconds
        );
        Ok(id)
    }

    fn load_course(&self, id: &str) -> Result<Option<Course>> {
        let sql = format!("SELECT {} FROM courses WHERE id = ?", COURSE_COLUMNS);
        let row = self
            .db
            .query_row(&sql, params![id], read_course_row)
            .optional()?;
        row.map(course_from_row).transpose()
    }

    fn list_courses(&self) -> Result<Vec<Course>> {
        let sql = format!("SELECT {} FROM courses ORDER BY seq", COURSE_COLUMNS);
        let mut stmt = self.db.prepare(&sql)?;
        let rows = stmt.query_map([], read_course_row)?;
        let mut courses = Vec::new();
        for row in rows {
            courses.push(course_from_row(row?)?);
        }
        Ok(courses)
    }
}
