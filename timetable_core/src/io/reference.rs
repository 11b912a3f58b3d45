//! Loading of the static reference files from the data directory.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::path::Path;

use super::json::parse_json_str;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{Course, Curriculum, Instructor, ReferenceData, Room};

pub const COURSES_FILE: &str = "courses.json";
pub const INSTRUCTORS_FILE: &str = "instructors.json";
pub const ROOMS_FILE: &str = "rooms.json";
pub const CURRICULUM_FILE: &str = "curriculum.json";
pub const CONSTRAINTS_FILE: &str = "constraints.json";

fn read_reference<T: DeserializeOwned>(path: &Path) -> PipelineResult<T> {
    let content = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    parse_json_str(&content)
        .map_err(|e| PipelineError::Serialization(format!("{}: {:#}", path.display(), e)))
}

fn load_required<T: DeserializeOwned>(
    data_dir: &Path,
    file: &str,
    is_empty: impl Fn(&T) -> bool,
) -> PipelineResult<T> {
    let path = data_dir.join(file);
    if !path.is_file() {
        return Err(PipelineError::MissingStaticData(format!(
            "{} not found",
            path.display()
        )));
    }

    let value: T = read_reference(&path)?;
    if is_empty(&value) {
        return Err(PipelineError::MissingStaticData(format!(
            "{} is empty",
            path.display()
        )));
    }
    Ok(value)
}

impl ReferenceData {
    /// Loads instructors, rooms, courses and curriculum from `data_dir`.
    ///
    /// The four files are required; a missing or empty one yields
    /// [`PipelineError::MissingStaticData`]. `constraints.json` is optional and
    /// forwarded to the proposer untouched.
    pub fn load(data_dir: &Path) -> PipelineResult<Self> {
        let courses: Vec<Course> = load_required(data_dir, COURSES_FILE, Vec::is_empty)?;
        let instructors: Vec<Instructor> =
            load_required(data_dir, INSTRUCTORS_FILE, Vec::is_empty)?;
        let rooms: Vec<Room> = load_required(data_dir, ROOMS_FILE, Vec::is_empty)?;
        let curriculum: Curriculum =
            load_required(data_dir, CURRICULUM_FILE, |c: &Curriculum| c.is_empty())?;

        let constraints_path = data_dir.join(CONSTRAINTS_FILE);
        let constraints = if constraints_path.is_file() {
            read_reference::<Value>(&constraints_path)?
        } else {
            log::debug!("No {} in {}", CONSTRAINTS_FILE, data_dir.display());
            Value::Null
        };

        log::info!(
            "Loaded reference data: {} courses, {} instructors, {} rooms, {} semesters",
            courses.len(),
            instructors.len(),
            rooms.len(),
            curriculum.len()
        );

        Ok(ReferenceData::new(instructors, rooms, courses, curriculum).with_constraints(constraints))
    }
}
