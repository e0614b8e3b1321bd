//! File and directory names inside a workspace.

pub const STUDENTS_FILE: &str = "students.json";
pub const USERS_FILE: &str = "users.json";
pub const RESULTS_DIR: &str = "results";
pub const RESULTS_MANIFEST: &str = "manifest.json";
