//! Offline rename scripts for sessions without write access.

use crate::model::{LibraryEntry, PLACEHOLDER_NAME};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    /// Windows `.bat`, CRLF line endings.
    Batch,
    /// POSIX shell.
    Shell,
    /// Python 3; reads the exported registry instead of embedding names.
    Python,
}

impl ScriptKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            ScriptKind::Batch => "rename_issues.bat",
            ScriptKind::Shell => "rename_issues.sh",
            ScriptKind::Python => "rename_issues.py",
        }
    }
}

/// Build a script that renames every `done` entry whose suggested name differs
/// from the original. Each rename runs only when the source exists and the
/// target does not, and echoes an OK/ERROR trace line; the script ends with the
/// number of files processed. Paths are relative to the scanned root, where the
/// script is meant to run. The Python variant takes its work list from the
/// registry file at run time.
pub fn rename_script(entries: &[LibraryEntry], kind: ScriptKind) -> String {
    let targets: Vec<&LibraryEntry> = entries.iter().filter(|e| e.needs_rename()).collect();
    match kind {
        ScriptKind::Batch => batch_script(&targets),
        ScriptKind::Shell => shell_script(&targets),
        ScriptKind::Python => python_script(),
    }
}

fn batch_script(targets: &[&LibraryEntry]) -> String {
    let mut lines = vec![
        "@echo off".to_string(),
        "chcp 65001 > nul".to_string(),
        "echo ==========================================".to_string(),
        "echo      Renaming magazine issues".to_string(),
        "echo ==========================================".to_string(),
        "echo.".to_string(),
    ];

    for entry in targets {
        let windows_path = entry.relative_path.replace('/', "\\");
        let target_path = match windows_path.rsplit_once('\\') {
            Some((dir, _)) => format!("{}\\{}", dir, entry.suggested_name),
            None => entry.suggested_name.clone(),
        };
        let source = batch_quoted(&windows_path);
        let new_name = batch_quoted(&entry.suggested_name);
        lines.push(format!("if not exist \"{}\" (", source));
        lines.push(format!(
            "    echo [ERROR] File not found: {}",
            batch_echo(&entry.relative_path)
        ));
        lines.push(format!(") else if exist \"{}\" (", batch_quoted(&target_path)));
        lines.push(format!(
            "    echo [ERROR] Target already exists: {}",
            batch_echo(&entry.suggested_name)
        ));
        lines.push(") else (".to_string());
        lines.push(format!("    ren \"{}\" \"{}\"", source, new_name));
        lines.push(format!(
            "    echo [OK] {} -^> {}",
            batch_echo(&entry.relative_path),
            batch_echo(&entry.suggested_name)
        ));
        lines.push(")".to_string());
    }

    lines.push("echo.".to_string());
    lines.push(format!("echo Done! {} files processed.", targets.len()));
    lines.push("pause".to_string());
    lines.join("\r\n")
}

fn shell_script(targets: &[&LibraryEntry]) -> String {
    let mut lines = vec![
        "#!/bin/sh".to_string(),
        "echo 'Renaming magazine issues...'".to_string(),
    ];

    for entry in targets {
        let source = shell_quoted(&entry.relative_path);
        let target = match entry.relative_path.rsplit_once('/') {
            Some((dir, _)) => format!("{}/{}", dir, entry.suggested_name),
            None => entry.suggested_name.clone(),
        };
        let target = shell_quoted(&target);
        lines.push(format!("if [ ! -e {} ]; then", source));
        lines.push(format!("    echo \"[ERROR] File not found: \"{}", source));
        lines.push(format!("elif [ -e {} ]; then", target));
        lines.push(format!("    echo \"[ERROR] Target already exists: \"{}", target));
        lines.push("else".to_string());
        lines.push(format!(
            "    mv -n {src} {dst} && echo \"[OK] \"{src}\" -> \"{dst}",
            src = source,
            dst = target
        ));
        lines.push("fi".to_string());
    }

    lines.push(format!("echo 'Done! {} files processed.'", targets.len()));
    lines.join("\n") + "\n"
}

const PYTHON_SCRIPT: &str = r#"#!/usr/bin/env python3
"""Rename magazine issues from an exported issue registry.

Usage: python3 rename_issues.py [REGISTRY_JSON]
Run it from the scanned folder.
"""
import json
import os
import sys

PLACEHOLDER = "__PLACEHOLDER__"


def candidates(original_path):
    paths = [original_path, os.path.basename(original_path)]
    if "/" in original_path:
        paths.append(original_path.split("/", 1)[1])
    return paths


def main():
    registry = sys.argv[1] if len(sys.argv) > 1 else "issue_registry.json"
    try:
        with open(registry, "r", encoding="utf-8") as handle:
            records = json.load(handle)
    except (OSError, ValueError) as err:
        print("[ERROR] Could not read %s: %s" % (registry, err))
        return 1

    renamed = skipped = failed = 0
    for record in records:
        original_path = record.get("originalPath") or ""
        new_name = record.get("currentName") or ""
        if record.get("status") not in ("done", "renamed"):
            continue
        if not record.get("metadata") and not record.get("isManualOverride"):
            continue
        if not original_path or not new_name or new_name == PLACEHOLDER:
            continue
        if "/" in new_name or "\\" in new_name or new_name in (".", ".."):
            print("[ERROR] Invalid target name: %s" % new_name)
            failed += 1
            continue

        found = next((p for p in candidates(original_path) if os.path.exists(p)), None)
        if found is None:
            if os.path.exists(new_name):
                skipped += 1
            else:
                print("[ERROR] File not found: %s" % original_path)
                failed += 1
            continue

        target = os.path.join(os.path.dirname(found), new_name)
        if os.path.normpath(found) == os.path.normpath(target):
            skipped += 1
            continue
        if os.path.exists(target):
            print("[ERROR] Target already exists: %s" % target)
            failed += 1
            continue

        try:
            os.rename(found, target)
            print("[OK] %s -> %s" % (found, new_name))
            renamed += 1
        except OSError as err:
            print("[ERROR] %s: %s" % (found, err))
            failed += 1

    print("Done! %d renamed, %d skipped, %d errors." % (renamed, skipped, failed))
    return 0 if failed == 0 else 1


if __name__ == "__main__":
    sys.exit(main())
"#;

fn python_script() -> String {
    PYTHON_SCRIPT.replace("__PLACEHOLDER__", PLACEHOLDER_NAME)
}

fn batch_quoted(value: &str) -> String {
    value.replace('%', "%%")
}

fn batch_echo(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '^' | '&' | '|' | '<' | '>' => {
                escaped.push('^');
                escaped.push(c);
            }
            '%' => escaped.push_str("%%"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn shell_quoted(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}
