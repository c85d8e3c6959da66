// src/manifest/parser.rs

//! Line classifier for the package manifest grammar.
//!
//! The parser is single-pass with one piece of state: the section currently
//! being filled, if any. Lines are classified against the grammar below;
//! a line matching nothing while a section is open closes the section and
//! is re-dispatched once as a potential section header, so an unexpected
//! line terminates a section instead of being silently dropped.
//!
//! ```text
//! name.pkg:                    section header
//! relativesrcdir path:         locale source-directory override
//! % payload                    registration directive
//! [*][+] dest [(["%"]source)]  entry (* = preprocess, + = overwrite,
//!                              leading % in parens = locale source)
//! # comment                    ignored, as are blank lines
//! ```

use regex::Regex;
use tracing::debug;

use super::{ManifestEntry, PackageSection};
use crate::error::{Error, Result};

/// Parser for package manifests.
///
/// Feed logical lines with [`write_line`](Self::write_line) (the text is
/// expected to be macro-expanded already), then take the sections with
/// [`into_sections`](Self::into_sections); or use [`parse`](Self::parse)
/// for whole-text input. Sections come out in creation order, including
/// the duplicate-name sections created by `relativesrcdir` overrides.
pub struct ManifestParser {
    ignore: Regex,
    section: Regex,
    relsrc: Regex,
    directive: Regex,
    entry: Regex,
    /// Index of the open section in `sections`, if any.
    current: Option<usize>,
    sections: Vec<PackageSection>,
}

impl ManifestParser {
    pub fn new() -> Self {
        Self {
            ignore: Regex::new(r"^\s*(#.*)?$").unwrap(),
            section: Regex::new(r"^([\w.\-\\/{}]+)\.pkg:$").unwrap(),
            relsrc: Regex::new(r"^relativesrcdir\s+(.+?):$").unwrap(),
            directive: Regex::new(r"^%\s+(.*)$").unwrap(),
            entry: Regex::new(r"^(\*)?(\+?)\s+([\w.\-\\/+@]+)\s*(?:\((%?)([\w.\-\\/@*]+)\))?\s*$")
                .unwrap(),
            current: None,
            sections: Vec::new(),
        }
    }

    /// Parse a complete manifest text.
    pub fn parse(text: &str) -> Result<Vec<PackageSection>> {
        let mut parser = Self::new();
        for line in text.lines() {
            parser.write_line(line)?;
        }
        Ok(parser.into_sections())
    }

    /// Classify one logical line.
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        let line = line.trim_end_matches(['\r', '\n']);

        if self.ignore.is_match(line) {
            return Ok(());
        }

        // Two-state dispatch: with no open section only a header is legal;
        // inside a section an unmatched line closes it and is retried as a
        // header, at most once.
        match self.current {
            None => self.open_section(line),
            Some(index) => {
                if self.classify_in_section(index, line)? {
                    return Ok(());
                }
                debug!("line closes section {:?}: {:?}", self.sections[index].name, line);
                self.current = None;
                self.open_section(line)
            }
        }
    }

    /// Consume the parser, yielding sections in creation order.
    pub fn into_sections(self) -> Vec<PackageSection> {
        self.sections
    }

    fn open_section(&mut self, line: &str) -> Result<()> {
        let m = self.section.captures(line).ok_or_else(|| Error::Grammar {
            line: line.to_string(),
        })?;
        self.sections.push(PackageSection::new(&m[1]));
        self.current = Some(self.sections.len() - 1);
        Ok(())
    }

    /// Try the in-section productions; Ok(false) means the line matched
    /// none of them.
    fn classify_in_section(&mut self, index: usize, line: &str) -> Result<bool> {
        if let Some(m) = self.relsrc.captures(line) {
            // Per-section metadata is fixed once content starts
            // accumulating; an override after that starts a new section
            // with the same name.
            let index = if self.sections[index].has_content() {
                let name = self.sections[index].name.clone();
                self.sections.push(PackageSection::new(&name));
                let index = self.sections.len() - 1;
                self.current = Some(index);
                index
            } else {
                index
            };
            self.sections[index].relative_src_dir = Some(m[1].to_string());
            return Ok(true);
        }

        if let Some(m) = self.directive.captures(line) {
            let payload = m[1].to_string();
            let section = &mut self.sections[index];
            if !section.directives.contains(&payload) {
                section.directives.push(payload);
            }
            return Ok(true);
        }

        if let Some(m) = self.entry.captures(line) {
            let output = m[3].to_string();
            let source = m
                .get(5)
                .map(|s| s.as_str().to_string())
                .unwrap_or_else(|| base_name(&output).to_string());
            self.sections[index].entries.push(ManifestEntry {
                output,
                source,
                is_locale: m.get(4).is_some_and(|l| !l.as_str().is_empty()),
                preprocess: m.get(1).is_some(),
                overwrite: m.get(2).is_some_and(|o| !o.as_str().is_empty()),
            });
            return Ok(true);
        }

        Ok(false)
    }
}

impl Default for ManifestParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Final path segment of a destination.
fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_section_single_entry() {
        let sections = ManifestParser::parse("a.pkg:\n foo (bar)\n").unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].name, "a");
        assert_eq!(sections[0].entries.len(), 1);
        let entry = &sections[0].entries[0];
        assert_eq!(entry.output, "foo");
        assert_eq!(entry.source, "bar");
        assert!(!entry.is_locale);
        assert!(!entry.preprocess);
        assert!(!entry.overwrite);
    }

    #[test]
    fn test_source_defaults_to_base_name() {
        let sections = ManifestParser::parse("a.pkg:\n  content/sub/thing.js\n").unwrap();
        let entry = &sections[0].entries[0];
        assert_eq!(entry.output, "content/sub/thing.js");
        assert_eq!(entry.source, "thing.js");
    }

    #[test]
    fn test_entry_flags() {
        let text = "a.pkg:\n\
                    * skin/main.css (style/main.css)\n\
                    + data/always.txt\n\
                    *+ both.js\n \
                    loc/hello.dtd (%hello.dtd)\n";
        let sections = ManifestParser::parse(text).unwrap();
        let entries = &sections[0].entries;
        assert!(entries[0].preprocess && !entries[0].overwrite);
        assert!(!entries[1].preprocess && entries[1].overwrite);
        assert!(entries[2].preprocess && entries[2].overwrite);
        assert!(entries[3].is_locale);
        assert_eq!(entries[3].source, "hello.dtd");
    }

    #[test]
    fn test_comments_and_blank_lines_ignored() {
        let text = "# leading comment\n\na.pkg:\n  # indented comment\n foo (bar)\n\n";
        let sections = ManifestParser::parse(text).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].entries.len(), 1);
    }

    #[test]
    fn test_directive_dedup_keeps_first_position() {
        let text = "a.pkg:\n\
                    % content branding %content/branding/\n\
                    % locale branding en-US %locale/en-US/\n\
                    % content branding %content/branding/\n";
        let sections = ManifestParser::parse(text).unwrap();
        assert_eq!(
            sections[0].directives,
            vec![
                "content branding %content/branding/",
                "locale branding en-US %locale/en-US/",
            ]
        );
    }

    #[test]
    fn test_relativesrcdir_before_content_sets_in_place() {
        let text = "a.pkg:\nrelativesrcdir app/locales:\n foo (bar)\n";
        let sections = ManifestParser::parse(text).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].relative_src_dir.as_deref(), Some("app/locales"));
    }

    #[test]
    fn test_relativesrcdir_after_content_starts_new_section() {
        let text = "a.pkg:\n \
                    foo.txt (foo.txt)\n\
                    relativesrcdir other/locales:\n \
                    bar.txt (bar.txt)\n";
        let sections = ManifestParser::parse(text).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].name, "a");
        assert_eq!(sections[1].name, "a");
        assert!(sections[0].relative_src_dir.is_none());
        assert_eq!(sections[1].relative_src_dir.as_deref(), Some("other/locales"));
        assert_eq!(sections[0].entries.len(), 1);
        assert_eq!(sections[1].entries.len(), 1);
    }

    #[test]
    fn test_new_header_closes_open_section() {
        let text = "a.pkg:\n one.txt\nb.pkg:\n two.txt\n";
        let sections = ManifestParser::parse(text).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].name, "a");
        assert_eq!(sections[1].name, "b");
    }

    #[test]
    fn test_garbage_with_no_section_is_grammar_error() {
        let err = ManifestParser::parse("not a header\n").unwrap_err();
        assert!(matches!(err, Error::Grammar { .. }));
    }

    #[test]
    fn test_garbage_inside_section_is_grammar_error() {
        // Unmatched line closes the section, then fails reclassification.
        let err = ManifestParser::parse("a.pkg:\n!!! bogus\n").unwrap_err();
        assert!(matches!(err, Error::Grammar { .. }));
    }

    #[test]
    fn test_entry_without_leading_space_is_not_an_entry() {
        // The entry production requires whitespace before the destination,
        // so a bare word is reclassified as a header and rejected.
        let err = ManifestParser::parse("a.pkg:\nfoo.txt\n").unwrap_err();
        assert!(matches!(err, Error::Grammar { .. }));
    }

    #[test]
    fn test_parse_is_idempotent_on_reconstructed_text() {
        let text = "a.pkg:\n\
                    % content a %content/\n\
                    * one.css (style/one.css)\n\
                    + two.txt (two.txt)\n\
                    b.pkg:\n\
                    relativesrcdir app/locales:\n \
                    three.dtd (%three.dtd)\n";
        let first = ManifestParser::parse(text).unwrap();

        // Naive reconstruction of the parsed sections.
        let mut rebuilt = String::new();
        for section in &first {
            rebuilt.push_str(&format!("{}.pkg:\n", section.name));
            if let Some(rel) = &section.relative_src_dir {
                rebuilt.push_str(&format!("relativesrcdir {}:\n", rel));
            }
            for directive in &section.directives {
                rebuilt.push_str(&format!("% {}\n", directive));
            }
            for entry in &section.entries {
                let pre = if entry.preprocess { "*" } else { "" };
                let over = if entry.overwrite { "+" } else { "" };
                let locale = if entry.is_locale { "%" } else { "" };
                rebuilt.push_str(&format!(
                    "{}{} {} ({}{})\n",
                    pre, over, entry.output, locale, entry.source
                ));
            }
        }

        let second = ManifestParser::parse(&rebuilt).unwrap();
        assert_eq!(first, second);
    }
}
