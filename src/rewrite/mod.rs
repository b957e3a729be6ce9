// src/rewrite/mod.rs
//! Wheel metadata to conda metadata
//!
//! The [`Rewriter`] turns the parsed `METADATA` of a wheel into a
//! [`MetadataRecord`]: the conda dependency list, entry points, about fields,
//! license files and a rewritten `METADATA` document in which the original pip
//! dependencies are hidden behind the synthetic `original` extra, so that pip
//! does not try to reinstall what conda already provides.
//!
//! For each `Requires-Dist` entry:
//!
//! 1. entries conditioned on an extra are optional and omitted
//! 2. drop rules remove the entry
//! 3. the name is resolved through the [`RenameResolver`]
//! 4. entries with environment markers are omitted with a warning
//! 5. version clauses are translated to conda syntax

mod about;
mod record;

pub use about::{about_from_metadata, collect_license_files};
pub use record::update_record;

use crate::config::ConversionOptions;
use crate::error::{Error, Result};
use crate::package::info::AboutJson;
use crate::rename::{DropRule, RenameKind, RenameResolver, StandardRenameTable};
use crate::report::{ConversionReport, ConversionWarning, OmitReason};
use crate::specifier::{
    Condition, Requirement, TranslationWarning, conda_spec, split_marker, translate_requirement,
};
use crate::wheel::{CoreMetadata, Wheel};
use std::sync::Arc;
use tracing::{debug, warn};

/// Extra that hides the original pip dependencies
pub const ORIGINAL_EXTRA: &str = "original";

/// A license file shipped under `info/licenses/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseFile {
    /// Relative to `info/licenses/`
    pub path: String,
    pub data: Vec<u8>,
}

/// Everything the assembler needs to know about the package besides its files
#[derive(Debug, Clone)]
pub struct MetadataRecord {
    pub name: String,
    pub version: String,
    pub build_number: u32,
    /// Conda match specs, in output order
    pub depends: Vec<String>,
    /// `name=module:func`
    pub entry_points: Vec<String>,
    /// `Requires-Dist` entries as declared in the wheel
    pub original_dependencies: Vec<String>,
    /// Rewritten `METADATA`
    pub metadata: CoreMetadata,
    pub dist_info: String,
    pub data_dir: String,
    /// Updated `RECORD`; `None` keeps the wheel's file
    pub record_file: Option<String>,
    pub about: AboutJson,
    pub license: Option<String>,
    pub license_files: Vec<LicenseFile>,
}

impl MetadataRecord {
    pub fn metadata_text(&self) -> String {
        self.metadata.to_string()
    }
}

/// Output of [`Rewriter::rewrite`]
#[derive(Debug, Clone)]
pub struct RewriteOutcome {
    pub record: MetadataRecord,
    pub report: ConversionReport,
}

/// How one original entry is written back into `METADATA`
#[derive(Debug)]
struct OriginalEntry {
    raw: String,
    /// Already optional; written back untouched
    extra_conditioned: bool,
    /// Matched a drop rule or a user rename rule
    explicit: bool,
}

/// Applies conversion options to wheel metadata
#[derive(Debug, Clone)]
pub struct Rewriter {
    options: ConversionOptions,
    resolver: RenameResolver,
    drops: Vec<DropRule>,
}

impl Rewriter {
    /// Compile the rules in `options`; fails on invalid or ambiguous rules
    pub fn new(
        options: &ConversionOptions,
        table: Option<Arc<StandardRenameTable>>,
    ) -> Result<Self> {
        let resolver = RenameResolver::new(options.compiled_rename_rules()?, table)?;
        let drops = options.drop_rules()?;
        Ok(Self {
            options: options.clone(),
            resolver,
            drops,
        })
    }

    pub fn resolver(&self) -> &RenameResolver {
        &self.resolver
    }

    /// Name of the produced package
    ///
    /// The package's own name never goes through rename rules.
    pub fn package_name(&self, wheel: &Wheel) -> String {
        self.options
            .name_override
            .as_deref()
            .or(self.options.project_name.as_deref())
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from)
            .unwrap_or_else(|| wheel.name().trim().to_lowercase())
    }

    pub fn rewrite(&self, wheel: &Wheel) -> Result<RewriteOutcome> {
        let mut report = ConversionReport::new(wheel.filename.clone());
        let name = self.package_name(wheel);
        debug!("Package name: {}", name);

        let original_dependencies: Vec<String> = wheel
            .metadata
            .requires_dist()
            .into_iter()
            .map(String::from)
            .collect();

        let mut depends = Vec::new();
        let mut entries = Vec::with_capacity(original_dependencies.len());
        for raw in &original_dependencies {
            entries.push(self.convert_dependency(raw, &mut depends, &mut report)?);
        }

        let python = self.python_dependency(&wheel.metadata, &mut report);
        debug!("Dependency added: '{}'", python);
        depends.push(python);

        for dep in self
            .options
            .add_dependencies
            .iter()
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
        {
            debug!("Dependency added: '{}'", dep);
            depends.push(dep.to_string());
            report.add_added(dep);
        }

        let metadata = self.rewrite_metadata(&wheel.metadata, &entries, &mut report);
        let metadata_text = metadata.to_string();

        let metadata_path = wheel.dist_info_path("METADATA");
        let record_file = wheel.file(&wheel.dist_info_path("RECORD")).and_then(|f| {
            let text = String::from_utf8_lossy(&f.data);
            let updated = update_record(&text, &metadata_path, metadata_text.as_bytes());
            if updated.is_none() {
                warn!("RECORD has no entry for {}; left unchanged", metadata_path);
            }
            updated
        });

        let build_number = self
            .options
            .build_number
            .unwrap_or_else(|| wheel.build_number());

        report.depends = depends.clone();

        let record = MetadataRecord {
            name,
            version: wheel.version().trim().to_string(),
            build_number,
            depends,
            entry_points: wheel.entry_points.scripts(),
            original_dependencies,
            metadata,
            dist_info: wheel.dist_info.clone(),
            data_dir: wheel.data_dir(),
            record_file,
            about: about_from_metadata(&wheel.metadata),
            license: wheel.metadata.license().map(String::from),
            license_files: collect_license_files(wheel),
        };

        Ok(RewriteOutcome { record, report })
    }

    /// Translate one `Requires-Dist` entry, appending to `depends`
    fn convert_dependency(
        &self,
        raw: &str,
        depends: &mut Vec<String>,
        report: &mut ConversionReport,
    ) -> Result<OriginalEntry> {
        let mut entry = OriginalEntry {
            raw: raw.to_string(),
            extra_conditioned: false,
            explicit: false,
        };

        let req = match Requirement::parse(raw) {
            Ok(req) => req,
            Err(e) => {
                report.add_warning(ConversionWarning::UnparseableRequirement {
                    requirement: raw.to_string(),
                    reason: e.to_string(),
                });
                return Ok(entry);
            }
        };

        let condition = req.condition();
        if let Condition::Extra(extra) = &condition {
            debug!("Skipping extra dependency: {}", raw);
            report.add_omitted(raw, OmitReason::Extra(extra.clone()));
            entry.extra_conditioned = true;
            return Ok(entry);
        }

        if self.drops.iter().any(|d| d.matches(&req.name)) {
            debug!("Dependency dropped: {}", raw);
            report.add_dropped(raw);
            entry.explicit = true;
            return Ok(entry);
        }

        let resolution = self.resolver.resolve(&req.name);
        entry.explicit = resolution.kind == RenameKind::User;
        if resolution.name.is_empty() {
            debug!("Dependency dropped by rename: {}", raw);
            report.add_dropped(raw);
            return Ok(entry);
        }

        if let Condition::Environment(marker) = condition {
            report.add_omitted(raw, OmitReason::EnvironmentMarker(marker.clone()));
            report.add_warning(ConversionWarning::EnvironmentMarker {
                requirement: raw.to_string(),
                marker,
            });
            return Ok(entry);
        }

        if let Some(url) = &req.url {
            return Err(Error::UnsupportedSpecifier {
                spec: raw.to_string(),
                reason: format!("direct reference '{}' has no conda equivalent", url),
            });
        }

        report.add_rename(&req.name, &resolution.name, resolution.kind);
        let translation = translate_requirement(&req);
        for warning in translation.warnings {
            report.add_warning(ConversionWarning::from_translation(raw, warning));
        }

        let spec = conda_spec(&resolution.name, &translation.clauses);
        if resolution.name == req.name {
            debug!("Dependency copied: '{}'", spec);
        } else {
            debug!("Dependency renamed: '{}' -> '{}'", raw, spec);
        }
        depends.push(spec);
        Ok(entry)
    }

    /// `python` dependency from the override or `Requires-Python`
    fn python_dependency(&self, md: &CoreMetadata, report: &mut ConversionReport) -> String {
        if let Some(version) = self
            .options
            .python_version_override
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            return if version.starts_with("python") {
                version.to_string()
            } else {
                format!("python {}", version)
            };
        }

        let Some(requires_python) = md.get("Requires-Python").map(str::trim) else {
            return "python".to_string();
        };
        if requires_python.is_empty() {
            return "python".to_string();
        }

        let label = format!("Requires-Python: {}", requires_python);
        match Requirement::parse(&format!("python {}", requires_python)) {
            Ok(req) => {
                let translation = translate_requirement(&req);
                for warning in translation.warnings {
                    if !matches!(warning, TranslationWarning::EnvironmentMarker { .. }) {
                        report.add_warning(ConversionWarning::from_translation(&label, warning));
                    }
                }
                conda_spec("python", &translation.clauses)
            }
            Err(e) => {
                report.add_warning(ConversionWarning::UnparseableRequirement {
                    requirement: label,
                    reason: e.to_string(),
                });
                "python".to_string()
            }
        }
    }

    /// Write the dependency block back, hiding entries behind the `original` extra
    fn rewrite_metadata(
        &self,
        md: &CoreMetadata,
        entries: &[OriginalEntry],
        report: &mut ConversionReport,
    ) -> CoreMetadata {
        let mut metadata = md.clone();
        if entries.is_empty() {
            return metadata;
        }

        metadata.remove_all("Requires-Dist");
        metadata.remove_all("Requires");

        let keep = self.options.keep_original_dependencies;
        let mut hidden = 0usize;
        let mut kept = 0usize;
        for entry in entries {
            let value = if entry.extra_conditioned {
                entry.raw.clone()
            } else if keep && !entry.explicit {
                kept += 1;
                entry.raw.clone()
            } else {
                hidden += 1;
                hide_requirement(&entry.raw)
            };
            metadata.push("Requires-Dist", value);
        }

        let provides_original = metadata
            .get_all("Provides-Extra")
            .any(|e| e.trim() == ORIGINAL_EXTRA);
        if hidden > 0 && !provides_original {
            metadata.push("Provides-Extra", ORIGINAL_EXTRA);
        }
        if kept > 0 {
            report.add_warning(ConversionWarning::OriginalDependenciesKept { count: kept });
        }
        metadata
    }
}

/// Make a requirement conditional on the `original` extra
///
/// `req` becomes `req; extra == "original"` and `req; marker` becomes
/// `req; (marker) and extra == "original"`.
pub fn hide_requirement(raw: &str) -> String {
    match split_marker(raw.trim()) {
        (decl, Some(marker)) if !marker.is_empty() => {
            format!("{}; ({}) and extra == \"{}\"", decl, marker, ORIGINAL_EXTRA)
        }
        (decl, _) => format!("{}; extra == \"{}\"", decl, ORIGINAL_EXTRA),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenameRuleSpec;
    use crate::hash;
    use crate::wheel::WheelFile;

    fn file(path: &str, data: &str) -> WheelFile {
        WheelFile {
            path: path.to_string(),
            data: data.as_bytes().to_vec(),
            mode: 0o644,
        }
    }

    fn wheel(requires: &[&str], extra_headers: &str) -> Wheel {
        let mut metadata = String::from(
            "Metadata-Version: 2.1\nName: MyPackage\nVersion: 1.2.3\nSummary: demo\n",
        );
        metadata.push_str(extra_headers);
        for r in requires {
            metadata.push_str(&format!("Requires-Dist: {}\n", r));
        }
        metadata.push_str("\nLong description.\n");

        let files = vec![
            file("mypackage/__init__.py", ""),
            file(
                "mypackage-1.2.3.dist-info/WHEEL",
                "Wheel-Version: 1.0\nRoot-Is-Purelib: true\nTag: py3-none-any\n",
            ),
            file("mypackage-1.2.3.dist-info/METADATA", &metadata),
            file(
                "mypackage-1.2.3.dist-info/entry_points.txt",
                "[console_scripts]\nmytool = mypackage.cli:main\n",
            ),
            file(
                "mypackage-1.2.3.dist-info/RECORD",
                "mypackage/__init__.py,sha256=x,0\n\
                 mypackage-1.2.3.dist-info/METADATA,sha256=old,1\n\
                 mypackage-1.2.3.dist-info/RECORD,,\n",
            ),
        ];
        Wheel::from_files("mypackage-1.2.3-py3-none-any.whl", files).unwrap()
    }

    fn rewrite(options: &ConversionOptions, wheel: &Wheel) -> RewriteOutcome {
        Rewriter::new(options, None).unwrap().rewrite(wheel).unwrap()
    }

    fn requires(record: &MetadataRecord) -> Vec<String> {
        record
            .metadata
            .get_all("Requires-Dist")
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_black_jupyter_end_to_end() {
        let outcome = rewrite(
            &ConversionOptions::default(),
            &wheel(&["black[jupyter] ~=23.12"], ""),
        );
        let record = outcome.record;

        assert_eq!(record.name, "mypackage");
        assert_eq!(record.version, "1.2.3");
        assert_eq!(record.depends, vec!["black >=23.12,==23.*", "python"]);
        assert_eq!(
            requires(&record),
            vec!["black[jupyter] ~=23.12; extra == \"original\""]
        );
        assert_eq!(record.metadata.get("Provides-Extra"), Some("original"));
        assert_eq!(record.original_dependencies, vec!["black[jupyter] ~=23.12"]);
        assert!(record.metadata_text().ends_with("\nLong description.\n"));
        assert!(
            outcome
                .report
                .warnings
                .iter()
                .any(|w| matches!(w, ConversionWarning::ExtrasNotExpanded { .. }))
        );
    }

    #[test]
    fn test_hidden_dependencies_are_never_unconditional() {
        let outcome = rewrite(
            &ConversionOptions::default(),
            &wheel(
                &[
                    "requests >=2.0",
                    "tomli; python_version < '3.11'",
                    "pytest; extra == 'test'",
                    "-bad-name >=1",
                ],
                "",
            ),
        );
        let entries = requires(&outcome.record);
        assert_eq!(
            entries,
            vec![
                "requests >=2.0; extra == \"original\"",
                "tomli; (python_version < '3.11') and extra == \"original\"",
                "pytest; extra == 'test'",
                "-bad-name >=1; extra == \"original\"",
            ]
        );
        for entry in &entries {
            assert!(entry.contains("extra =="), "unconditional entry: {}", entry);
        }
        assert_eq!(outcome.record.depends, vec!["requests >=2.0", "python"]);
        assert_eq!(outcome.report.omitted.len(), 2);
        assert!(
            outcome
                .report
                .warnings
                .iter()
                .any(|w| matches!(w, ConversionWarning::UnparseableRequirement { .. }))
        );
    }

    #[test]
    fn test_renames_drops_and_additions() {
        let options = ConversionOptions {
            rename_rules: vec![
                RenameRuleSpec::new("acme-(.*)", "acme.$1"),
                RenameRuleSpec::new("typing-extensions-legacy", ""),
            ],
            drop_dependencies: vec!["mypy".to_string()],
            add_dependencies: vec!["libfoo >=1.0".to_string()],
            ..ConversionOptions::default()
        };
        let outcome = rewrite(
            &options,
            &wheel(
                &["acme-widgets >=2", "MyPy", "typing-extensions-legacy", "Numpy==1.26.*"],
                "",
            ),
        );
        assert_eq!(
            outcome.record.depends,
            vec!["acme.widgets >=2", "numpy ==1.26.*", "python", "libfoo >=1.0"]
        );
        assert_eq!(outcome.report.dropped, vec!["MyPy", "typing-extensions-legacy"]);
        assert_eq!(outcome.report.added, vec!["libfoo >=1.0"]);
        let renamed: Vec<_> = outcome.report.effective_renames().collect();
        assert_eq!(renamed.len(), 2);
        assert_eq!(renamed[0].reason, RenameKind::User);
        assert_eq!(renamed[1].reason, RenameKind::Identity);
    }

    #[test]
    fn test_keep_original_still_hides_explicit_rules() {
        let options = ConversionOptions {
            keep_original_dependencies: true,
            rename_rules: vec![RenameRuleSpec::new("foo", "conda-foo")],
            drop_dependencies: vec!["bar".to_string()],
            ..ConversionOptions::default()
        };
        let outcome = rewrite(&options, &wheel(&["foo", "bar", "baz >=1"], ""));
        assert_eq!(
            requires(&outcome.record),
            vec![
                "foo; extra == \"original\"",
                "bar; extra == \"original\"",
                "baz >=1",
            ]
        );
        assert!(
            outcome
                .report
                .warnings
                .contains(&ConversionWarning::OriginalDependenciesKept { count: 1 })
        );
    }

    #[test]
    fn test_direct_reference_is_fatal() {
        let rewriter = Rewriter::new(&ConversionOptions::default(), None).unwrap();
        let err = rewriter
            .rewrite(&wheel(&["foo @ https://example.com/foo.whl"], ""))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedSpecifier { .. }));

        // dropped references never reach the translator
        let options = ConversionOptions {
            drop_dependencies: vec!["foo".to_string()],
            ..ConversionOptions::default()
        };
        rewrite(&options, &wheel(&["foo @ https://example.com/foo.whl"], ""));
    }

    #[test]
    fn test_python_dependency() {
        let w = wheel(&[], "Requires-Python: >=3.8, <4\n");
        let outcome = rewrite(&ConversionOptions::default(), &w);
        assert_eq!(outcome.record.depends, vec!["python >=3.8,<4"]);

        let options = ConversionOptions {
            python_version_override: Some(">=3.10".to_string()),
            ..ConversionOptions::default()
        };
        assert_eq!(rewrite(&options, &w).record.depends, vec!["python >=3.10"]);
    }

    #[test]
    fn test_name_precedence() {
        let w = wheel(&[], "");
        let mut options = ConversionOptions {
            project_name: Some("project-name".to_string()),
            rename_rules: vec![RenameRuleSpec::new("mypackage", "renamed")],
            ..ConversionOptions::default()
        };
        assert_eq!(rewrite(&options, &w).record.name, "project-name");
        options.name_override = Some("override".to_string());
        assert_eq!(rewrite(&options, &w).record.name, "override");
        options.name_override = None;
        options.project_name = None;
        assert_eq!(rewrite(&options, &w).record.name, "mypackage");
    }

    #[test]
    fn test_record_entry_points_and_build() {
        let options = ConversionOptions {
            build_number: Some(3),
            ..ConversionOptions::default()
        };
        let record = rewrite(&options, &wheel(&["six"], "")).record;
        assert_eq!(record.build_number, 3);
        assert_eq!(record.entry_points, vec!["mytool=mypackage.cli:main"]);

        let text = record.metadata_text();
        let updated = record.record_file.unwrap();
        let line = updated
            .lines()
            .find(|l| l.starts_with("mypackage-1.2.3.dist-info/METADATA,"))
            .unwrap();
        assert_eq!(
            line,
            format!(
                "mypackage-1.2.3.dist-info/METADATA,{},{}",
                hash::record_digest(text.as_bytes()),
                text.len()
            )
        );
    }

    #[test]
    fn test_no_dependencies_leaves_metadata_alone() {
        let w = wheel(&[], "");
        let outcome = rewrite(&ConversionOptions::default(), &w);
        assert_eq!(outcome.record.metadata, w.metadata);
        assert!(!outcome.record.metadata.contains("Provides-Extra"));
    }

    #[test]
    fn test_hide_requirement() {
        assert_eq!(hide_requirement("foo"), "foo; extra == \"original\"");
        assert_eq!(
            hide_requirement("foo>=1 ; os_name == 'nt'"),
            "foo>=1; (os_name == 'nt') and extra == \"original\""
        );
    }
}
