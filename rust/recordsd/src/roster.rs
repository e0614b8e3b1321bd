use crate::store::{read_json, FlatFile, StoreError};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ROSTER_VERSION: u32 = 2;

pub const CSV_HEADER: &str = "roll_no,name,father_name,class,mobile_no,address";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StudentRecord {
    pub roll_no: String,
    pub name: String,
    pub father_name: String,
    #[serde(rename = "class")]
    pub class_name: String,
    pub mobile_no: String,
    pub address: String,
}

impl StudentRecord {
    /// Names of fields that are blank; the roster form requires all of them.
    pub fn blank_fields(&self) -> Vec<&'static str> {
        let fields = [
            ("rollNo", &self.roll_no),
            ("name", &self.name),
            ("fatherName", &self.father_name),
            ("class", &self.class_name),
            ("mobileNo", &self.mobile_no),
            ("address", &self.address),
        ];
        fields
            .into_iter()
            .filter(|(_, v)| v.trim().is_empty())
            .map(|(k, _)| k)
            .collect()
    }
}

// Version 1 rows predate father_name, mobile_no and address.
#[derive(Debug, Deserialize)]
struct StudentRecordV1 {
    roll_no: String,
    name: String,
    #[serde(rename = "class")]
    class_name: String,
    father_name: Option<String>,
    mobile_no: Option<String>,
    address: Option<String>,
}

impl From<StudentRecordV1> for StudentRecord {
    fn from(v1: StudentRecordV1) -> Self {
        StudentRecord {
            roll_no: v1.roll_no,
            name: v1.name,
            father_name: v1.father_name.unwrap_or_default(),
            class_name: v1.class_name,
            mobile_no: v1.mobile_no.unwrap_or_default(),
            address: v1.address.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RosterFile {
    version: u32,
    students: Vec<StudentRecord>,
}

impl Default for RosterFile {
    fn default() -> Self {
        RosterFile {
            version: ROSTER_VERSION,
            students: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    RollNo,
    Name,
    Class,
    All,
}

impl SearchMode {
    /// Accepts protocol spellings (`rollNo`) and the form labels (`Roll No`, `View All`).
    pub fn parse(label: &str) -> Option<Self> {
        let key: String = label
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "rollno" => Some(SearchMode::RollNo),
            "name" => Some(SearchMode::Name),
            "class" => Some(SearchMode::Class),
            "all" | "viewall" => Some(SearchMode::All),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Roster {
    file: FlatFile<RosterFile>,
}

impl Roster {
    /// Opens the roster file, upgrading older layouts in place first.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let file = FlatFile::new(path);
        if let Some(upgraded) = upgrade(path)? {
            tracing::info!(
                path = %path.display(),
                students = upgraded.students.len(),
                "upgraded roster to version {}",
                ROSTER_VERSION
            );
            file.save(&upgraded)?;
        }
        Ok(Roster { file })
    }

    pub fn load(&self) -> Result<Vec<StudentRecord>, StoreError> {
        Ok(self.file.load()?.students)
    }

    fn save(&self, students: Vec<StudentRecord>) -> Result<(), StoreError> {
        self.file.save(&RosterFile {
            version: ROSTER_VERSION,
            students,
        })
    }

    /// Returns false, leaving the roster untouched, when the roll number is taken.
    pub fn add(&self, record: StudentRecord) -> Result<bool, StoreError> {
        let mut students = self.load()?;
        if students.iter().any(|s| s.roll_no == record.roll_no) {
            return Ok(false);
        }
        students.push(record);
        self.save(students)?;
        Ok(true)
    }

    pub fn search(
        &self,
        term: Option<&str>,
        mode: SearchMode,
    ) -> Result<Vec<StudentRecord>, StoreError> {
        let students = self.load()?;
        if mode == SearchMode::All {
            return Ok(students);
        }
        let Some(term) = term else {
            return Ok(Vec::new());
        };
        let needle = term.to_lowercase();
        Ok(students
            .into_iter()
            .filter(|s| match mode {
                SearchMode::RollNo => s.roll_no == term,
                SearchMode::Name => s.name.to_lowercase().contains(&needle),
                SearchMode::Class => s.class_name == term,
                SearchMode::All => true,
            })
            .collect())
    }

    /// Deleting an unknown roll number is a no-op.
    pub fn delete(&self, roll_no: &str) -> Result<(), StoreError> {
        let students = self.load()?;
        let before = students.len();
        let remaining: Vec<_> = students.into_iter().filter(|s| s.roll_no != roll_no).collect();
        if remaining.len() != before {
            self.save(remaining)?;
        }
        Ok(())
    }

    pub fn roll_numbers(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.load()?.into_iter().map(|s| s.roll_no).collect())
    }
}

fn upgrade(path: &Path) -> Result<Option<RosterFile>, StoreError> {
    let Some(raw) = read_json(path)? else {
        return Ok(None);
    };

    let (version, rows) = match raw {
        serde_json::Value::Array(rows) => (1, serde_json::Value::Array(rows)),
        serde_json::Value::Object(mut obj) => {
            let version = obj
                .get("version")
                .and_then(|v| v.as_u64())
                .ok_or_else(|| StoreError::corrupt(path, "missing roster version"))?;
            let rows = obj
                .remove("students")
                .unwrap_or_else(|| serde_json::Value::Array(Vec::new()));
            (version, rows)
        }
        _ => return Err(StoreError::corrupt(path, "roster is neither a list nor an object")),
    };

    match version {
        1 => {
            let rows: Vec<StudentRecordV1> = serde_json::from_value(rows)
                .map_err(|e| StoreError::corrupt(path, e.to_string()))?;
            Ok(Some(RosterFile {
                version: ROSTER_VERSION,
                students: rows.into_iter().map(StudentRecord::from).collect(),
            }))
        }
        v if v == u64::from(ROSTER_VERSION) => Ok(None),
        v => Err(StoreError::corrupt(
            path,
            format!("unsupported roster version {}", v),
        )),
    }
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

pub fn to_csv(students: &[StudentRecord]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for s in students {
        let row = [
            &s.roll_no,
            &s.name,
            &s.father_name,
            &s.class_name,
            &s.mobile_no,
            &s.address,
        ]
        .iter()
        .map(|v| csv_quote(v))
        .collect::<Vec<_>>()
        .join(",");
        out.push_str(&row);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    fn student(roll_no: &str, name: &str, class_name: &str) -> StudentRecord {
        StudentRecord {
            roll_no: roll_no.to_string(),
            name: name.to_string(),
            father_name: "Father".to_string(),
            class_name: class_name.to_string(),
            mobile_no: "0300".to_string(),
            address: "Street 1".to_string(),
        }
    }

    #[test]
    fn duplicate_roll_no_is_rejected_without_mutation() {
        let dir = temp_dir("recordsd-roster-dup");
        let roster = Roster::open(&dir.join("students.json")).expect("open");
        assert!(roster.add(student("1", "Ali Khan", "10A")).expect("add"));
        assert!(roster.add(student("2", "Sara", "10B")).expect("add"));
        let before = roster.load().expect("load");

        assert!(!roster.add(student("1", "Someone Else", "9C")).expect("add dup"));
        assert_eq!(roster.load().expect("load"), before);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn search_modes() {
        let dir = temp_dir("recordsd-roster-search");
        let roster = Roster::open(&dir.join("students.json")).expect("open");
        roster.add(student("1", "Ali Khan", "10A")).expect("add");
        roster.add(student("2", "Sara Ali", "10B")).expect("add");
        roster.add(student("3", "Bilal", "10A")).expect("add");

        let by_name = roster.search(Some("ali"), SearchMode::Name).expect("search");
        let names: HashSet<_> = by_name.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, HashSet::from(["Ali Khan", "Sara Ali"]));

        let by_roll = roster.search(Some("2"), SearchMode::RollNo).expect("search");
        assert_eq!(by_roll.len(), 1);
        assert_eq!(by_roll[0].name, "Sara Ali");

        let by_class = roster.search(Some("10A"), SearchMode::Class).expect("search");
        assert_eq!(by_class.len(), 2);
        // Class is exact, not a prefix or case-folded match.
        assert!(roster.search(Some("10a"), SearchMode::Class).expect("search").is_empty());

        assert_eq!(roster.search(None, SearchMode::All).expect("search").len(), 3);
        assert_eq!(
            roster.search(Some("ignored"), SearchMode::All).expect("search").len(),
            3
        );
        assert!(roster.search(None, SearchMode::Name).expect("search").is_empty());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn delete_then_search_is_empty_and_repeat_delete_is_fine() {
        let dir = temp_dir("recordsd-roster-delete");
        let roster = Roster::open(&dir.join("students.json")).expect("open");
        roster.add(student("7", "Hamza", "8")).expect("add");
        roster.delete("7").expect("delete");
        assert!(roster.search(Some("7"), SearchMode::RollNo).expect("search").is_empty());
        roster.delete("7").expect("delete absent");
        roster.delete("never-existed").expect("delete absent");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn v1_rows_are_upgraded_and_persisted_once() {
        let dir = temp_dir("recordsd-roster-upgrade");
        let path = dir.join("students.json");
        std::fs::write(
            &path,
            serde_json::to_vec(&serde_json::json!([
                { "roll_no": "1", "name": "Old Timer", "class": "5" },
                { "roll_no": "2", "name": "Newer", "class": "5", "father_name": "F", "mobile_no": "1", "address": "A" }
            ]))
            .expect("encode"),
        )
        .expect("write v1");

        let roster = Roster::open(&path).expect("open");
        let students = roster.load().expect("load");
        assert_eq!(students.len(), 2);
        assert_eq!(students[0].father_name, "");
        assert_eq!(students[0].mobile_no, "");
        assert_eq!(students[0].address, "");
        assert_eq!(students[1].father_name, "F");

        let on_disk = read_json(&path).expect("read").expect("present");
        assert_eq!(on_disk.get("version").and_then(|v| v.as_u64()), Some(2));
        assert_eq!(
            on_disk["students"][0].get("address").and_then(|v| v.as_str()),
            Some("")
        );
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn newer_version_is_refused() {
        let dir = temp_dir("recordsd-roster-future");
        let path = dir.join("students.json");
        std::fs::write(&path, br#"{"version": 9, "students": []}"#).expect("write");
        assert!(matches!(Roster::open(&path), Err(StoreError::Corrupt { .. })));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn search_mode_labels() {
        assert_eq!(SearchMode::parse("Roll No"), Some(SearchMode::RollNo));
        assert_eq!(SearchMode::parse("rollNo"), Some(SearchMode::RollNo));
        assert_eq!(SearchMode::parse("View All"), Some(SearchMode::All));
        assert_eq!(SearchMode::parse("Class"), Some(SearchMode::Class));
        assert_eq!(SearchMode::parse("address"), None);
    }

    #[test]
    fn csv_quotes_awkward_fields() {
        let mut s = student("1", "Khan, Ali", "10A");
        s.address = "House \"7\"\nBlock B".to_string();
        let csv = to_csv(&[s]);
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        assert!(csv.contains("\"Khan, Ali\""));
        assert!(csv.contains("\"House \"\"7\"\"\nBlock B\""));
    }

    #[test]
    fn blank_fields_are_reported() {
        let mut s = student("1", "Ali", "10A");
        s.mobile_no = "  ".to_string();
        s.address.clear();
        assert_eq!(s.blank_fields(), vec!["mobileNo", "address"]);
    }
}
