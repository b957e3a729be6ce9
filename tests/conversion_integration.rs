// tests/conversion_integration.rs

//! Integration tests for wheel to conda conversion
//!
//! Wheels are built in-test, converted through the public `Converter` API and
//! the produced packages are read back and inspected.

mod common;

use common::{CondaContents, WheelBuilder, read_tar_bz2};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use whl2conda::rename::RenameResolver;
use whl2conda::{
    ConversionOptions, Converter, Error, RenameRule, RenameRuleSpec, StandardRenameTable,
    TargetFormat,
};

const TIMESTAMP: i64 = 1_700_000_000;

// =============================================================================
// TEST HELPERS
// =============================================================================

fn options(out_dir: &Path) -> ConversionOptions {
    ConversionOptions {
        out_dir: Some(out_dir.to_path_buf()),
        timestamp: Some(TIMESTAMP),
        ..ConversionOptions::default()
    }
}

fn converter(options: ConversionOptions) -> Converter {
    Converter::new(options, None).unwrap()
}

fn metadata_lines(contents: &CondaContents, dist_info: &str) -> Vec<String> {
    let path = format!("site-packages/{}/METADATA", dist_info);
    String::from_utf8(contents.pkg_file(&path).to_vec())
        .unwrap()
        .lines()
        .map(String::from)
        .collect()
}

fn depends(contents: &CondaContents) -> Vec<String> {
    contents.json("info/index.json")["depends"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d.as_str().unwrap().to_string())
        .collect()
}

// =============================================================================
// END-TO-END CONVERSION
// =============================================================================

#[test]
fn test_black_jupyter_dependency() {
    let temp = TempDir::new().unwrap();
    let builder = WheelBuilder::new("mypackage", "1.2.3").requires("black[jupyter] ~=23.12");
    let wheel = builder.write_to(temp.path());
    assert!(wheel.ends_with("mypackage-1.2.3-py3-none-any.whl"));

    let out = temp.path().join("out");
    let report = converter(options(&out)).convert_file(&wheel).unwrap();

    let package = out.join("mypackage-1.2.3-py_0.conda");
    assert_eq!(report.output.as_deref(), Some(package.as_path()));
    assert!(report.checksums.is_some());
    assert!(report.depends.contains(&"black >=23.12,==23.*".to_string()));

    let contents = CondaContents::read(&package);
    assert!(depends(&contents).contains(&"black >=23.12,==23.*".to_string()));

    let lines = metadata_lines(&contents, &builder.dist_info());
    let requires: Vec<&String> = lines
        .iter()
        .filter(|l| l.starts_with("Requires-Dist:"))
        .collect();
    assert_eq!(
        requires,
        vec!["Requires-Dist: black[jupyter] ~=23.12; extra == \"original\""]
    );
    assert!(lines.iter().any(|l| l == "Provides-Extra: original"));
}

#[test]
fn test_conda_archive_layout() {
    let temp = TempDir::new().unwrap();
    let builder = WheelBuilder::new("demo", "0.4.0")
        .metadata("Requires-Python", ">=3.9")
        .metadata("License", "MIT")
        .metadata("Home-page", "https://example.org/demo")
        .entry_points("[console_scripts]\ndemo = demo.cli:main\n")
        .file("demo-0.4.0.data/scripts/demo-tool", b"#!python\nprint(1)\n", 0o644);
    let wheel = builder.write_to(temp.path());

    converter(options(temp.path())).convert_file(&wheel).unwrap();
    let contents = CondaContents::read(&temp.path().join("demo-0.4.0-py_0.conda"));

    assert_eq!(
        contents.outer,
        vec![
            "metadata.json",
            "info-demo-0.4.0-py_0.tar.zst",
            "pkg-demo-0.4.0-py_0.tar.zst",
        ]
    );
    assert!(contents.info.iter().all(|(p, _)| p.starts_with("info/")));
    assert!(contents.pkg.iter().all(|(p, _)| !p.starts_with("info/")));

    let index = contents.json("info/index.json");
    assert_eq!(index["name"], "demo");
    assert_eq!(index["version"], "0.4.0");
    assert_eq!(index["build"], "py_0");
    assert_eq!(index["noarch"], "python");
    assert!(depends(&contents).contains(&"python >=3.9".to_string()));

    let about = contents.json("info/about.json");
    assert_eq!(about["license"], "MIT");
    assert_eq!(about["home"], "https://example.org/demo");

    let link = contents.json("info/link.json");
    assert_eq!(link["noarch"]["type"], "python");
    assert_eq!(link["entry_points"][0], "demo=demo.cli:main");

    contents.pkg_file("site-packages/demo/__init__.py");
    contents.pkg_file("python-scripts/demo-tool");

    let paths = contents.json("info/paths.json");
    let shipped: Vec<&str> = paths["paths"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["_path"].as_str().unwrap())
        .collect();
    assert_eq!(shipped.len(), contents.pkg.len());
    assert!(shipped.contains(&"python-scripts/demo-tool"));
}

#[test]
fn test_legacy_archive_format() {
    let temp = TempDir::new().unwrap();
    let wheel = WheelBuilder::new("demo", "1.0")
        .requires("requests >=2")
        .write_to(temp.path());

    let report = converter(ConversionOptions {
        target_format: TargetFormat::LegacyArchive,
        ..options(temp.path())
    })
    .convert_file(&wheel)
    .unwrap();
    assert_eq!(report.package.as_deref(), Some("demo-1.0-py_0.tar.bz2"));

    let members = read_tar_bz2(&temp.path().join("demo-1.0-py_0.tar.bz2"));
    let first_content = members
        .iter()
        .position(|(p, _)| !p.starts_with("info/"))
        .unwrap();
    assert!(members[..first_content].iter().all(|(p, _)| p.starts_with("info/")));
    assert!(members[first_content..].iter().all(|(p, _)| !p.starts_with("info/")));
    assert!(members.iter().any(|(p, _)| p == "site-packages/demo/__init__.py"));
}

#[test]
fn test_tree_format() {
    let temp = TempDir::new().unwrap();
    let wheel = WheelBuilder::new("demo", "1.0").write_to(temp.path());

    let report = converter(ConversionOptions {
        target_format: TargetFormat::Tree,
        ..options(temp.path())
    })
    .convert_file(&wheel)
    .unwrap();

    let root = temp.path().join("demo-1.0-py_0");
    assert_eq!(report.output.as_deref(), Some(root.as_path()));
    assert!(report.checksums.is_none());
    assert!(root.join("info/index.json").is_file());
    assert!(root.join("site-packages/demo/__init__.py").is_file());
}

#[test]
fn test_convert_bytes_and_dry_run() {
    let temp = TempDir::new().unwrap();
    let builder = WheelBuilder::new("demo", "2.0");

    let report = converter(ConversionOptions {
        dry_run: true,
        ..options(temp.path())
    })
    .convert_bytes(&builder.build(), &builder.filename())
    .unwrap();
    assert!(report.dry_run);
    assert!(report.output.is_none());
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);

    let report = converter(options(temp.path()))
        .convert_bytes(&builder.build(), &builder.filename())
        .unwrap();
    assert!(report.output.unwrap().is_file());
}

// =============================================================================
// DEPENDENCY HANDLING
// =============================================================================

#[test]
fn test_rename_precedence() {
    let table = Arc::new(StandardRenameTable::from_mappings([(
        "foo".to_string(),
        "qux".to_string(),
    )]));
    let rules = vec![
        RenameRule::pattern("fo.*", "baz").unwrap(),
        RenameRule::exact("foo", "bar"),
    ];
    let resolver = RenameResolver::new(rules, Some(table.clone())).unwrap();
    assert_eq!(resolver.resolve("foo").name, "bar");
    assert_eq!(resolver.resolve("fob").name, "baz");

    let temp = TempDir::new().unwrap();
    let wheel = WheelBuilder::new("demo", "1.0")
        .requires("foo >=1")
        .write_to(temp.path());
    let options = ConversionOptions {
        rename_rules: vec![
            RenameRuleSpec::new("fo.*", "baz"),
            RenameRuleSpec::new("foo", "bar"),
        ],
        ..options(temp.path())
    };
    let report = Converter::new(options, Some(table))
        .unwrap()
        .convert_file(&wheel)
        .unwrap();
    assert!(report.depends.contains(&"bar >=1".to_string()));
}

#[test]
fn test_standard_table_rename() {
    let temp = TempDir::new().unwrap();
    let table = Arc::new(StandardRenameTable::from_mappings([(
        "torch".to_string(),
        "pytorch".to_string(),
    )]));
    let wheel = WheelBuilder::new("demo", "1.0")
        .requires("Torch >=2.1")
        .write_to(temp.path());

    let report = Converter::new(options(temp.path()), Some(table))
        .unwrap()
        .convert_file(&wheel)
        .unwrap();
    assert!(report.depends.contains(&"pytorch >=2.1".to_string()));
    assert_eq!(report.effective_renames().count(), 1);
}

#[test]
fn test_named_capture_rename() {
    let temp = TempDir::new().unwrap();
    let wheel = WheelBuilder::new("demo", "1.0")
        .requires("acme-widgets >=3")
        .requires("widgets")
        .write_to(temp.path());

    let report = converter(ConversionOptions {
        rename_rules: vec![RenameRuleSpec::new("acme-(?P<part>.*)", "acme.${part}")],
        ..options(temp.path())
    })
    .convert_file(&wheel)
    .unwrap();
    assert!(report.depends.contains(&"acme.widgets >=3".to_string()));
    assert!(report.depends.contains(&"widgets".to_string()));
}

#[test]
fn test_pattern_does_not_match_partial_names() {
    let temp = TempDir::new().unwrap();
    let wheel = WheelBuilder::new("demo", "1.0")
        .requires("acme-widgets")
        .write_to(temp.path());

    let report = converter(ConversionOptions {
        rename_rules: vec![RenameRuleSpec::new("widgets", "gadgets")],
        ..options(temp.path())
    })
    .convert_file(&wheel)
    .unwrap();
    assert!(report.depends.contains(&"acme-widgets".to_string()));
    assert!(!report.depends.iter().any(|d| d.contains("gadgets")));
}

#[test]
fn test_original_dependencies_hidden() {
    let temp = TempDir::new().unwrap();
    let builder = WheelBuilder::new("demo", "1.0")
        .requires("numpy >=1.24")
        .requires("pywin32; sys_platform == \"win32\"")
        .requires("pytest; extra == \"test\"")
        .requires("tomli >=1.1")
        .metadata("Provides-Extra", "test");
    let wheel = builder.write_to(temp.path());

    let report = converter(ConversionOptions {
        drop_dependencies: vec!["tomli".to_string()],
        add_dependencies: vec!["tomli-w".to_string()],
        ..options(temp.path())
    })
    .convert_file(&wheel)
    .unwrap();
    assert_eq!(report.dropped, vec!["tomli >=1.1"]);
    assert_eq!(report.omitted.len(), 2);

    let contents = CondaContents::read(report.output.as_deref().unwrap());
    let depends = depends(&contents);
    assert_eq!(depends, vec!["numpy >=1.24", "python", "tomli-w"]);

    let lines = metadata_lines(&contents, &builder.dist_info());
    let requires: Vec<&str> = lines
        .iter()
        .filter_map(|l| l.strip_prefix("Requires-Dist: "))
        .collect();
    for runtime in ["numpy", "tomli", "pywin32"] {
        let entries: Vec<&&str> = requires.iter().filter(|r| r.starts_with(runtime)).collect();
        assert_eq!(entries.len(), 1, "{}", runtime);
        assert!(entries[0].contains("extra == \"original\""), "{}", entries[0]);
    }
    assert!(requires.contains(&"pytest; extra == \"test\""));
    assert_eq!(
        lines.iter().filter(|l| *l == "Provides-Extra: original").count(),
        1
    );

    let record_path = format!("site-packages/{}/RECORD", builder.dist_info());
    let record = String::from_utf8(contents.pkg_file(&record_path).to_vec()).unwrap();
    let metadata = contents.pkg_file(&format!("site-packages/{}/METADATA", builder.dist_info()));
    assert!(record.contains(&whl2conda::hash::record_digest(metadata)));
}

#[test]
fn test_direct_reference_is_fatal() {
    let temp = TempDir::new().unwrap();
    let wheel = WheelBuilder::new("demo", "1.0")
        .requires("private @ https://example.org/private-1.0.tar.gz")
        .write_to(temp.path());

    let err = converter(options(temp.path()))
        .convert_file(&wheel)
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedSpecifier { .. }));
    assert!(!temp.path().join("demo-1.0-py_0.conda").exists());
}

#[test]
fn test_compiled_content_rejected() {
    let temp = TempDir::new().unwrap();
    let wheel = WheelBuilder::new("demo", "1.0")
        .file("demo/_speedups.so", b"\x7fELF\x02\x01\x01", 0o755)
        .write_to(temp.path());

    let err = converter(options(temp.path()))
        .convert_file(&wheel)
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedContent(_)));

    let wheel = WheelBuilder::new("native", "1.0")
        .tag("cp312-cp312-manylinux_2_17_x86_64")
        .platlib()
        .write_to(temp.path());
    let err = converter(options(temp.path()))
        .convert_file(&wheel)
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedContent(_)));
}

// =============================================================================
// OUTPUT GUARANTEES
// =============================================================================

#[test]
fn test_repeat_conversion_is_byte_identical() {
    let temp = TempDir::new().unwrap();
    let wheel = WheelBuilder::new("demo", "1.0")
        .requires("attrs >=22")
        .write_to(temp.path());
    let out = temp.path().join("out");
    let converter = converter(ConversionOptions {
        overwrite: true,
        ..options(&out)
    });

    converter.convert_file(&wheel).unwrap();
    let first = fs::read(out.join("demo-1.0-py_0.conda")).unwrap();
    converter.convert_file(&wheel).unwrap();
    let second = fs::read(out.join("demo-1.0-py_0.conda")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_existing_output_untouched() {
    let temp = TempDir::new().unwrap();
    let wheel = WheelBuilder::new("demo", "1.0").write_to(temp.path());
    let dest = temp.path().join("demo-1.0-py_0.conda");
    fs::write(&dest, b"previous").unwrap();

    let err = converter(options(temp.path()))
        .convert_file(&wheel)
        .unwrap_err();
    assert!(matches!(err, Error::OutputExists(ref p) if p == &dest));
    assert_eq!(fs::read(&dest).unwrap(), b"previous");

    let leftovers: Vec<_> = fs::read_dir(temp.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_overwrite_replaces_tree() {
    let temp = TempDir::new().unwrap();
    let wheel = WheelBuilder::new("demo", "1.0").write_to(temp.path());
    let root = temp.path().join("demo-1.0-py_0");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("stale.txt"), b"old").unwrap();

    converter(ConversionOptions {
        target_format: TargetFormat::Tree,
        overwrite: true,
        ..options(temp.path())
    })
    .convert_file(&wheel)
    .unwrap();
    assert!(!root.join("stale.txt").exists());
    assert!(root.join("info/index.json").is_file());
}
