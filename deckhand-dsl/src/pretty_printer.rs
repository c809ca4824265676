//! Legacy-format printer for raw decks.

use crate::parser::{RawDeck, RawEntry, RawSection};
use deckhand_core::{EmitConfig, DEFAULT_END_MARKER};
use std::fmt::{self, Write};
use std::io;

/// Render a raw deck as legacy text.
///
/// Parsed entries are written verbatim; entries built from structured input
/// have their values aligned at `key_width`. Implicit sections get no header.
pub fn print_deck(deck: &RawDeck, config: &EmitConfig) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_deck_fmt(&mut out, deck, config);
    out
}

/// Stream a raw deck as legacy text.
pub fn write_deck<W: io::Write>(mut writer: W, deck: &RawDeck, config: &EmitConfig) -> io::Result<()> {
    writer.write_all(print_deck(deck, config).as_bytes())?;
    writer.flush()
}

fn write_deck_fmt(out: &mut String, deck: &RawDeck, config: &EmitConfig) -> fmt::Result {
    for section in &deck.sections {
        write_section(out, section, config)?;
    }
    if config.write_end_marker {
        write_header(out, DEFAULT_END_MARKER, config.header_width)?;
    }
    Ok(())
}

fn write_section(out: &mut String, section: &RawSection, config: &EmitConfig) -> fmt::Result {
    if !section.implicit {
        write_header(out, &section.path, config.header_width)?;
    }
    for entry in &section.entries {
        write_entry(out, entry, config.key_width)?;
    }
    for child in &section.children {
        write_section(out, child, config)?;
    }
    Ok(())
}

/// Dashes fill the gap up to `header_width`; never fewer than two. A name
/// that itself starts with a dash is set off by a space.
fn write_header(out: &mut String, name: &str, header_width: usize) -> fmt::Result {
    let separator = if name.starts_with('-') { " " } else { "" };
    let width = name.chars().count() + separator.len();
    let dashes = header_width.saturating_sub(width).max(2);
    writeln!(out, "{}{}{}", "-".repeat(dashes), separator, name)
}

fn write_entry(out: &mut String, entry: &RawEntry, key_width: usize) -> fmt::Result {
    let key = entry.tokens.first().filter(|_| entry.align_key);
    match key {
        Some(key) => {
            let split = key.span.end - entry.span.start;
            let key_text = entry.text.get(..split).unwrap_or(&entry.text);
            let value = entry.value_text();
            if value.is_empty() {
                writeln!(out, "{}", key_text)
            } else {
                writeln!(out, "{:<width$} {}", key_text, value, width = key_width.saturating_sub(1))
            }
        }
        None => writeln!(out, "{}", entry.text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn config() -> EmitConfig {
        EmitConfig {
            header_width: 20,
            key_width: 12,
            ..EmitConfig::default()
        }
    }

    #[test]
    fn test_print_parsed_deck_verbatim() {
        let parsed = parse("--------PROBLEM TYPE\nPROBLEMTYPE   Structure // comment\n--------DYN/GENALPHA\nRHO_INF 0.9\n");
        let text = print_deck(&parsed.deck, &config());
        assert_eq!(
            text,
            "--------PROBLEM TYPE\nPROBLEMTYPE   Structure\n--------DYN/GENALPHA\nRHO_INF 0.9\n"
        );
    }

    #[test]
    fn test_print_aligned_entries() {
        let markers = vec!["//".to_string()];
        let mut section = RawSection::new("IO", None);
        section.entries.push(RawEntry::from_parts(&["OUTPUT_DIR", "my results"], &markers, true));
        section.entries.push(RawEntry::from_parts(&["A_VERY_LONG_KEY_NAME", "1"], &markers, true));
        section.entries.push(RawEntry::from_parts(&["FLAG"], &markers, true));
        let mut deck = RawDeck::new();
        deck.sections.push(section);

        let text = print_deck(
            &deck,
            &EmitConfig {
                write_end_marker: true,
                ..config()
            },
        );
        assert_eq!(
            text,
            "------------------IO\nOUTPUT_DIR  \"my results\"\nA_VERY_LONG_KEY_NAME 1\nFLAG\n-----------------END\n"
        );
    }

    #[test]
    fn test_long_names_keep_two_dashes() {
        let mut deck = RawDeck::new();
        deck.sections.push(RawSection::new("A NAME LONGER THAN THE WIDTH", None));
        let text = print_deck(&deck, &config());
        assert_eq!(text, "--A NAME LONGER THAN THE WIDTH\n");
    }

    #[test]
    fn test_dash_names_survive() {
        let parsed = parse("-- -x\nk 1\n");
        let text = print_deck(&parsed.deck, &config());
        assert_eq!(text, "----------------- -x\nk 1\n");
        assert_eq!(parse(&text).deck.sections[0].name, "-x");
    }

    #[test]
    fn test_print_then_parse_is_stable() {
        let source = "--A\nx 1\n--A/B\ny \"two words\"\n--C\n";
        let first = parse(source);
        let text = print_deck(&first.deck, &config());
        let second = parse(&text);
        assert!(second.diagnostics.is_empty());
        assert_eq!(print_deck(&second.deck, &config()), text);
    }

    #[test]
    fn test_write_deck() {
        let parsed = parse("--A\nx 1\n");
        let mut buf = Vec::new();
        write_deck(&mut buf, &parsed.deck, &config()).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "-------------------A\nx 1\n");
    }
}
