// src/wheel/entry_points.rs

//! `entry_points.txt` (INI format)

use std::collections::BTreeMap;

/// Sections that install launcher scripts
pub const SCRIPT_SECTIONS: [&str; 2] = ["console_scripts", "gui_scripts"];

/// Parsed entry points, grouped by section in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPoints {
    sections: BTreeMap<String, Vec<(String, String)>>,
}

impl EntryPoints {
    pub fn parse(text: &str) -> Self {
        let mut sections: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
        let mut current: Option<String> = None;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(['#', ';']) {
                continue;
            }
            if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let section = section.trim().to_string();
                sections.entry(section.clone()).or_default();
                current = Some(section);
                continue;
            }
            match (&current, line.split_once('=')) {
                (Some(section), Some((name, target))) => {
                    if let Some(entries) = sections.get_mut(section) {
                        entries.push((name.trim().to_string(), target.trim().to_string()));
                    }
                }
                _ => tracing::debug!("Skipping entry point line: {:?}", line),
            }
        }

        Self { sections }
    }

    pub fn section(&self, name: &str) -> &[(String, String)] {
        self.sections.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Console and GUI scripts as `name=module:func`
    pub fn scripts(&self) -> Vec<String> {
        SCRIPT_SECTIONS
            .iter()
            .flat_map(|s| self.section(s))
            .map(|(name, target)| format!("{}={}", name, target))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.values().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts() {
        let eps = EntryPoints::parse(
            "[console_scripts]\nblack = black:patched_main\nblackd=blackd:patched_main [d]\n\n\
             # comment\n[gui_scripts]\nviewer = demo.gui:run\n\n[pytest11]\ndemo = demo.plugin\n",
        );
        assert_eq!(
            eps.scripts(),
            vec![
                "black=black:patched_main",
                "blackd=blackd:patched_main [d]",
                "viewer=demo.gui:run",
            ]
        );
        assert_eq!(eps.section("pytest11").len(), 1);
        assert!(!eps.is_empty());
    }

    #[test]
    fn test_empty() {
        assert!(EntryPoints::parse("").is_empty());
        assert!(EntryPoints::parse("[console_scripts]\n").is_empty());
    }
}
