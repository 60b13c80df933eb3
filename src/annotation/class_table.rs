//! Class id table loaded from `id_list.txt`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::warn;

use crate::annotation::record::MalformedRecord;

/// Maps class ids to human-readable names.
///
/// Parsed once at startup from a `classname , id` line-oriented file;
/// reloading requires a process restart.
#[derive(Debug, Clone, Default)]
pub struct ClassTable {
    by_id: BTreeMap<u32, String>,
}

impl ClassTable {
    pub fn load(path: &Path) -> std::io::Result<(Self, Vec<MalformedRecord>)> {
        let contents = fs::read_to_string(path)?;
        let mut by_id = BTreeMap::new();
        let mut warnings = Vec::new();

        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let line_no = idx + 1;
            match parse_class_line(line) {
                Some((name, id)) => {
                    // Duplicate id: last definition wins.
                    by_id.insert(id, name);
                }
                None => {
                    let w = MalformedRecord {
                        line_no,
                        reason: format!("expected \"name , id\", got {line:?}"),
                    };
                    warn!(path = %path.display(), line = w.line_no, "skipped class entry: {}", w.reason);
                    warnings.push(w);
                }
            }
        }

        Ok((Self { by_id }, warnings))
    }

    pub fn name_of(&self, class_id: u32) -> Option<&str> {
        self.by_id.get(&class_id).map(String::as_str)
    }

    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.by_id
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.by_id.iter().map(|(id, name)| (*id, name.as_str()))
    }
}

fn parse_class_line(line: &str) -> Option<(String, u32)> {
    let (name, id) = line.rsplit_once(',')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let id: u32 = id.trim().parse().ok()?;
    Some((name.to_string(), id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id_list.txt");
        fs::write(&path, "person , 0\nbike , 1\nmotorbike , 2\n").unwrap();

        let (table, warnings) = ClassTable::load(&path).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(table.len(), 3);
        assert_eq!(table.name_of(1), Some("bike"));
        assert_eq!(table.id_of("motorbike"), Some(2));
    }

    #[test]
    fn test_malformed_entry_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id_list.txt");
        fs::write(&path, "person , 0\nno separator here\ncar , x\nbike , 1\n").unwrap();

        let (table, warnings) = ClassTable::load(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].line_no, 2);
        assert_eq!(warnings[1].line_no, 3);
    }
}
