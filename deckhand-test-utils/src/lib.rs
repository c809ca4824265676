//! deckhand Test Utilities
//!
//! Shared test infrastructure for the deckhand workspace:
//! - A fixture schema shaped like a real solver's metadata
//! - Proptest generators for decks that are valid under that schema
//! - Sample decks for the common scenarios
//! - Custom assertions over diagnostics

// Re-export core types for convenience
pub use deckhand_core::{
    metadata::load_str, Diagnostic, DiagnosticKind, Diagnostics, SchemaVersion, Severity, Value,
};
pub use deckhand_dsl::{parse, validate, StructuredTree, TypedDeck};

// ============================================================================
// LOGGING
// ============================================================================

/// Route `tracing` output from the crates under test to the test harness.
///
/// Filtered by `RUST_LOG`, defaulting to debug for the deckhand crates. Safe
/// to call from every test; only the first call installs the subscriber.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("deckhand_core=debug,deckhand_dsl=debug,warn"));
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Fixture schema and sample decks.

    use super::*;

    /// Metadata for the fixture solver. Covers every layout the tooling has
    /// to handle: keyed, keyed with a sub-section, records with and without
    /// unique ids, repeatable, and a conditional parameter in both a keyed
    /// and a records section.
    pub const SCHEMA_YAML: &str = r#"
version: fixture-1
sections:
  - name: PROBLEM TYPE
    required: true
    description: Physics selection
    parameters:
      - { name: PROBLEMTYPE, type: enum, choices: [Structure, Fluid, Scalar_Transport], required: true }
      - { name: RESTART, type: integer, min: 0, default: 0 }
  - name: IO
    parameters:
      - { name: OUTPUT_DIR, type: path }
      - { name: VERBOSE, type: boolean, default: false }
      - { name: STEPS, type: integer, min: 1 }
  - name: STRUCTURAL DYNAMIC
    parameters:
      - { name: DYNAMICTYPE, type: enum, choices: [Statics, GenAlpha, OneStepTheta], default: Statics }
      - { name: TIMESTEP, type: real, min: 0, min_exclusive: true }
      - { name: NUMSTEP, type: integer, min: 1 }
      - { name: THETA, type: real, min: 0, max: 1, condition: "DYNAMICTYPE == 'OneStepTheta'" }
    subsections:
      - name: GENALPHA
        parameters:
          - { name: RHO_INF, type: real, min: 0, max: 1 }
  - name: MATERIALS
    records: { keyword: MAT, unique_ids: true }
    parameters:
      - { name: MODEL, type: enum, choices: [elastic, plastic], required: true }
      - { name: YOUNG, type: real, min: 0, min_exclusive: true }
      - { name: DENSITY, type: real, min: 0 }
      - { name: YIELD, type: real, min: 0, condition: "MODEL == 'plastic'" }
      - { name: LABEL, type: string }
  - name: FUNCT
    repeatable: true
    parameters:
      - { name: NAME, type: string, unique: true }
      - { name: COMPONENTS, type: real, size: 3 }
  - name: NODE COORDS
    records: { keyword: NODE }
    parameters:
      - { name: COORD, type: real, size: 3 }
"#;

    /// Same document with `DENSITY` declared twice in `MATERIALS`.
    pub const DUPLICATE_DENSITY_YAML: &str = r#"
sections:
  - name: MATERIALS
    records: { keyword: MAT }
    parameters:
      - { name: DENSITY, type: real, min: 0 }
      - { name: DENSITY, type: real }
"#;

    /// A deck that validates clean under [`SCHEMA_YAML`].
    pub const SAMPLE_DECK: &str = "\
// fixture deck
--------------------------------------PROBLEM TYPE
PROBLEMTYPE                     Structure
--------------------------------------------IO
OUTPUT_DIR                      \"results/run 1\"
VERBOSE                         yes
STEPS                           20
----------------------------STRUCTURAL DYNAMIC
DYNAMICTYPE                     GenAlpha
TIMESTEP                        0.01
NUMSTEP                         200
-------------------STRUCTURAL DYNAMIC/GENALPHA
RHO_INF                         0.8
-------------------------------------MATERIALS
MAT 1 MODEL elastic YOUNG 210000.0 DENSITY 7.85
MAT 2 MODEL plastic YOUNG 70000 YIELD 250 // aluminium
-----------------------------------------FUNCT
NAME                            ramp
COMPONENTS                      0.0 1.0 0.5
-----------------------------------------FUNCT
NAME                            hold
-----------------------------------NODE COORDS
NODE 1 COORD 0.0 0.0 0.0
NODE 2 COORD 1.0 0.0 -2.5
-------------------------------------------END
";

    pub fn fixture_schema() -> SchemaVersion {
        load_str(SCHEMA_YAML).expect("fixture schema loads")
    }

    /// A deck whose line `line` (1-based, at least 4) holds an unterminated
    /// quoted string inside `IO`, followed by further sections.
    pub fn deck_with_unterminated_quote(line: usize) -> String {
        assert!(line >= 4, "the broken line must come after the IO header");
        let mut deck = String::from("--PROBLEM TYPE\nPROBLEMTYPE Structure\n--IO\n");
        for n in 4..line {
            deck.push_str(&format!("// padding {}\n", n));
        }
        deck.push_str("OUTPUT_DIR \"results\n");
        deck.push_str("STEPS 10\n--STRUCTURAL DYNAMIC\nNUMSTEP 5\n--MATERIALS\nMAT 1 MODEL elastic\n");
        deck
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies producing legacy deck text that is valid under
    //! [`fixtures::SCHEMA_YAML`](super::fixtures::SCHEMA_YAML).

    use proptest::prelude::*;
    use serde_yaml::Value as Yaml;

    const PROBLEM_TYPES: &[&str] = &["Structure", "Fluid", "Scalar_Transport"];
    const DYNAMIC_TYPES: &[&str] = &["Statics", "GenAlpha", "OneStepTheta"];
    const BOOL_LITERALS: &[&str] = &["true", "false", "yes", "no", "TRUE", "No"];
    /// Material labels, most of them spelling a `MATERIALS` parameter.
    const MATERIAL_LABELS: &[&str] = &["MODEL", "YOUNG", "DENSITY", "YIELD", "LABEL", "steel"];

    /// Real literal in `[lo, hi)`, as the lexer would read it.
    pub fn arb_real(lo: f64, hi: f64) -> impl Strategy<Value = String> {
        (lo..hi).prop_map(|x| format!("{}", x))
    }

    /// Relative path without comment markers or spaces.
    pub fn arb_path() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,7}(/[a-z][a-z0-9_]{0,7}){0,2}"
    }

    /// Any boolean spelling the coercer accepts.
    pub fn arb_bool_literal() -> impl Strategy<Value = &'static str> {
        prop::sample::select(BOOL_LITERALS)
    }

    pub fn arb_problem_type_section() -> impl Strategy<Value = String> {
        (
            prop::sample::select(PROBLEM_TYPES),
            prop::option::of(0i64..100),
        )
            .prop_map(|(ty, restart)| {
                let mut text = format!("--PROBLEM TYPE\nPROBLEMTYPE {}\n", ty);
                if let Some(restart) = restart {
                    text.push_str(&format!("RESTART {}\n", restart));
                }
                text
            })
    }

    pub fn arb_io_section() -> impl Strategy<Value = String> {
        (
            prop::option::of(arb_path()),
            prop::option::of(arb_bool_literal()),
            prop::option::of(1i64..1000),
        )
            .prop_map(|(dir, verbose, steps)| {
                let mut text = String::from("--IO\n");
                if let Some(dir) = dir {
                    text.push_str(&format!("OUTPUT_DIR {}\n", dir));
                }
                if let Some(verbose) = verbose {
                    text.push_str(&format!("VERBOSE {}\n", verbose));
                }
                if let Some(steps) = steps {
                    text.push_str(&format!("STEPS {}\n", steps));
                }
                text
            })
    }

    /// `THETA` is written exactly when the scheme is one-step-theta, so the
    /// condition never fires.
    pub fn arb_dynamic_section() -> impl Strategy<Value = String> {
        (
            prop::sample::select(DYNAMIC_TYPES),
            arb_real(0.001, 10.0),
            1i64..500,
            arb_real(0.0, 1.0),
            prop::option::of(arb_real(0.0, 1.0)),
        )
            .prop_map(|(ty, dt, steps, theta, rho)| {
                let mut text = format!(
                    "--STRUCTURAL DYNAMIC\nDYNAMICTYPE {}\nTIMESTEP {}\nNUMSTEP {}\n",
                    ty, dt, steps
                );
                if ty == "OneStepTheta" {
                    text.push_str(&format!("THETA {}\n", theta));
                }
                if let Some(rho) = rho {
                    text.push_str(&format!("--STRUCTURAL DYNAMIC/GENALPHA\nRHO_INF {}\n", rho));
                }
                text
            })
    }

    /// One `MAT` line body, without the keyword and id. `LABEL` values may
    /// spell other parameter names.
    pub fn arb_material() -> impl Strategy<Value = String> {
        (
            any::<bool>(),
            prop::option::of(prop::sample::select(MATERIAL_LABELS)),
            prop::option::of(arb_real(1.0, 1.0e6)),
            prop::option::of(arb_real(0.0, 100.0)),
            arb_real(0.0, 1000.0),
        )
            .prop_map(|(plastic, label, young, density, yield_stress)| {
                let mut text = String::new();
                if let Some(label) = label {
                    text.push_str(&format!("LABEL {} ", label));
                }
                text.push_str(if plastic { "MODEL plastic" } else { "MODEL elastic" });
                if let Some(young) = young {
                    text.push_str(&format!(" YOUNG {}", young));
                }
                if let Some(density) = density {
                    text.push_str(&format!(" DENSITY {}", density));
                }
                if plastic {
                    text.push_str(&format!(" YIELD {}", yield_stress));
                }
                text
            })
    }

    pub fn arb_materials_section() -> impl Strategy<Value = String> {
        prop::collection::vec(arb_material(), 1..5).prop_map(|materials| {
            let mut text = String::from("--MATERIALS\n");
            for (i, body) in materials.iter().enumerate() {
                text.push_str(&format!("MAT {} {}\n", i + 1, body));
            }
            text
        })
    }

    /// Zero or more `FUNCT` occurrences with distinct names.
    pub fn arb_funct_sections() -> impl Strategy<Value = String> {
        let components = prop::option::of(prop::collection::vec(arb_real(-10.0, 10.0), 3));
        prop::collection::vec(components, 0..4).prop_map(|functs| {
            let mut text = String::new();
            for (i, components) in functs.iter().enumerate() {
                text.push_str(&format!("--FUNCT\nNAME f{}\n", i + 1));
                if let Some(components) = components {
                    text.push_str(&format!("COMPONENTS {}\n", components.join(" ")));
                }
            }
            text
        })
    }

    pub fn arb_node_coords_section() -> impl Strategy<Value = String> {
        prop::collection::vec(prop::collection::vec(arb_real(-100.0, 100.0), 3), 1..6).prop_map(
            |nodes| {
                let mut text = String::from("--NODE COORDS\n");
                for (i, coord) in nodes.iter().enumerate() {
                    text.push_str(&format!("NODE {} COORD {}\n", i + 1, coord.join(" ")));
                }
                text
            },
        )
    }

    /// A complete deck with no error or warning under the fixture schema.
    pub fn arb_valid_deck() -> impl Strategy<Value = String> {
        (
            arb_problem_type_section(),
            prop::option::of(arb_io_section()),
            prop::option::of(arb_dynamic_section()),
            prop::option::of(arb_materials_section()),
            arb_funct_sections(),
            prop::option::of(arb_node_coords_section()),
        )
            .prop_map(|(problem, io, dynamic, materials, functs, nodes)| {
                let mut deck = problem;
                for section in [io, dynamic, materials].into_iter().flatten() {
                    deck.push_str(&section);
                }
                deck.push_str(&functs);
                if let Some(nodes) = nodes {
                    deck.push_str(&nodes);
                }
                deck
            })
    }

    /// Body line of an unknown section: plain words only.
    pub fn arb_plain_line() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-z0-9]{1,6}", 1..4).prop_map(|words| words.join(" "))
    }

    /// Value text of an unknown key, sometimes quoted.
    pub fn arb_unknown_value() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z0-9.]{1,8}",
            "[a-z]{1,5} [a-z]{1,5}".prop_map(|s| format!("\"{}\"", s)),
        ]
    }

    fn lines_value(lines: &[String]) -> Yaml {
        Yaml::Sequence(lines.iter().cloned().map(Yaml::String).collect())
    }

    /// Unknown keys and sections, and the deck they were added to.
    #[derive(Debug, Clone)]
    pub struct DeckWithUnknowns {
        pub deck: String,
        /// `(section, key, verbatim value text)` for every unknown key.
        pub keys: Vec<(String, String, String)>,
        /// Root key of the structured tree → expected line lists.
        pub sections: Vec<(String, Yaml)>,
        /// Unknown section occurrences, children included.
        pub unknown_sections: usize,
    }

    /// Lines of one unknown section occurrence and of an optional child.
    fn arb_unknown_occurrence() -> impl Strategy<Value = (Vec<String>, Option<Vec<String>>)> {
        (
            prop::collection::vec(arb_plain_line(), 1..4),
            prop::option::of(prop::collection::vec(arb_plain_line(), 1..3)),
        )
    }

    /// A valid deck plus:
    /// - unknown `IO` keys, one of them sharing its name with an unknown
    ///   `IO` child section
    /// - optionally an unknown `GENALPHA` key next to the real sub-section
    /// - unknown sections, possibly repeated, each occurrence possibly with
    ///   a child
    /// - optionally an unknown child of `MATERIALS`
    pub fn arb_deck_with_unknowns() -> impl Strategy<Value = DeckWithUnknowns> {
        (
            arb_valid_deck(),
            prop::collection::vec(("[A-Z]{1,6}", arb_unknown_value()), 1..4),
            prop::option::of((arb_unknown_value(), prop::collection::vec(arb_plain_line(), 1..3))),
            prop::option::of((arb_unknown_value(), arb_real(0.0, 1.0))),
            prop::collection::vec(prop::collection::vec(arb_unknown_occurrence(), 1..4), 0..3),
            prop::option::of(prop::collection::vec(arb_plain_line(), 1..3)),
        )
            .prop_map(|(valid, io_keys, shared, genalpha, extras, material_notes)| {
                let mut keys = Vec::new();
                let mut sections = Vec::new();
                let mut unknown_sections = 0;

                // IO and, when replaced, STRUCTURAL DYNAMIC are rebuilt below;
                // keeping the originals would make them duplicates.
                let mut deck = String::new();
                let mut skipping = false;
                for line in valid.lines() {
                    if line.starts_with("--") {
                        skipping = line == "--IO"
                            || (genalpha.is_some() && line.starts_with("--STRUCTURAL DYNAMIC"));
                    }
                    if !skipping {
                        deck.push_str(line);
                        deck.push('\n');
                    }
                }
                let has_materials = deck.contains("--MATERIALS\n");

                deck.push_str("--IO\n");
                for (i, (word, value)) in io_keys.into_iter().enumerate() {
                    let key = format!("X_{}{}", word, i);
                    deck.push_str(&format!("{} {}\n", key, value));
                    keys.push(("IO".to_string(), key, value));
                }
                if let Some((value, lines)) = shared {
                    deck.push_str(&format!("SHARED {}\n--IO/SHARED\n", value));
                    for line in &lines {
                        deck.push_str(&format!("{}\n", line));
                    }
                    keys.push(("IO".to_string(), "SHARED".to_string(), value));
                    sections.push(("IO/SHARED".to_string(), lines_value(&lines)));
                    unknown_sections += 1;
                }

                if let Some((value, rho)) = genalpha {
                    deck.push_str(&format!(
                        "--STRUCTURAL DYNAMIC\nNUMSTEP 3\nGENALPHA {}\n--STRUCTURAL DYNAMIC/GENALPHA\nRHO_INF {}\n",
                        value, rho
                    ));
                    keys.push(("STRUCTURAL DYNAMIC".to_string(), "GENALPHA".to_string(), value));
                }

                for (i, occurrences) in extras.iter().enumerate() {
                    let name = format!("EXTRA NOTES {}", i + 1);
                    let count = occurrences.len();
                    for (k, (lines, child)) in occurrences.iter().enumerate() {
                        deck.push_str(&format!("--{}\n", name));
                        for line in lines {
                            deck.push_str(&format!("{}\n", line));
                        }
                        unknown_sections += 1;
                        if let Some(child) = child {
                            deck.push_str(&format!("--{}/MORE\n", name));
                            for line in child {
                                deck.push_str(&format!("{}\n", line));
                            }
                            let parent = if k + 1 < count {
                                format!("{}[{}]", name, k + 1)
                            } else {
                                name.clone()
                            };
                            sections.push((format!("{}/MORE", parent), lines_value(child)));
                            unknown_sections += 1;
                        }
                    }
                    let value = match occurrences.as_slice() {
                        [(lines, _)] => lines_value(lines),
                        _ => Yaml::Sequence(occurrences.iter().map(|(lines, _)| lines_value(lines)).collect()),
                    };
                    sections.push((name, value));
                }

                if let (true, Some(lines)) = (has_materials, material_notes) {
                    deck.push_str("--MATERIALS/NOTES\n");
                    for line in &lines {
                        deck.push_str(&format!("{}\n", line));
                    }
                    sections.push(("MATERIALS/NOTES".to_string(), lines_value(&lines)));
                    unknown_sections += 1;
                }

                DeckWithUnknowns {
                    deck,
                    keys,
                    sections,
                    unknown_sections,
                }
            })
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over diagnostics.

    use super::*;

    /// Assert that no diagnostic has error severity.
    #[track_caller]
    pub fn assert_no_errors(diagnostics: &Diagnostics) {
        assert!(
            !diagnostics.has_errors(),
            "Expected no errors, got:\n{}",
            diagnostics
        );
    }

    /// Assert that there are no diagnostics at all.
    #[track_caller]
    pub fn assert_clean(diagnostics: &Diagnostics) {
        assert!(diagnostics.is_empty(), "Expected no diagnostics, got:\n{}", diagnostics);
    }

    /// Assert that every diagnostic is a warning.
    #[track_caller]
    pub fn assert_only_warnings(diagnostics: &Diagnostics) {
        for diagnostic in diagnostics.iter() {
            assert_eq!(
                diagnostic.severity,
                Severity::Warning,
                "Expected only warnings, got: {}",
                diagnostic
            );
        }
    }

    /// Assert exactly one diagnostic, of `kind` at `path`, and return it.
    #[track_caller]
    pub fn assert_single<'a>(
        diagnostics: &'a Diagnostics,
        kind: DiagnosticKind,
        path: &str,
    ) -> &'a Diagnostic {
        assert_eq!(
            diagnostics.len(),
            1,
            "Expected exactly one diagnostic, got:\n{}",
            diagnostics
        );
        let diagnostic = &diagnostics.as_slice()[0];
        assert_eq!(diagnostic.kind, kind, "Wrong kind: {}", diagnostic);
        assert_eq!(diagnostic.path, path, "Wrong path: {}", diagnostic);
        diagnostic
    }

    /// Assert that the diagnostics are exactly these `(kind, path)` pairs.
    #[track_caller]
    pub fn assert_kinds(diagnostics: &Diagnostics, expected: &[(DiagnosticKind, &str)]) {
        let found: Vec<(DiagnosticKind, &str)> = diagnostics
            .iter()
            .map(|d| (d.kind, d.path.as_str()))
            .collect();
        assert_eq!(found, expected, "Diagnostics:\n{}", diagnostics);
    }

    /// Assert that two typed decks hold the same sections, keys and values.
    #[track_caller]
    pub fn assert_equivalent(left: &TypedDeck<'_>, right: &TypedDeck<'_>) {
        assert!(
            left.equivalent(right),
            "Decks differ:\n{:#?}\n---\n{:#?}",
            left.sections,
            right.sections
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fixture_schema_loads() {
        let schema = fixtures::fixture_schema();
        assert_eq!(schema.version(), "fixture-1");
        assert!(schema.section("MATERIALS").and_then(|s| s.records()).is_some());
        assert!(schema.resolve_path("STRUCTURAL DYNAMIC/GENALPHA").is_some());
    }

    #[test]
    fn test_sample_deck_is_clean() {
        let schema = fixtures::fixture_schema();
        let parsed = parse(fixtures::SAMPLE_DECK);
        assertions::assert_clean(&parsed.diagnostics);
        let validated = validate(&parsed.deck, &schema);
        assertions::assert_clean(&validated.diagnostics);
    }

    #[test]
    fn test_unterminated_quote_fixture_line() {
        let deck = fixtures::deck_with_unterminated_quote(42);
        let line = deck.lines().nth(41).unwrap();
        assert_eq!(line, "OUTPUT_DIR \"results");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_generated_deck_parses_clean(deck in generators::arb_valid_deck()) {
            let parsed = parse(&deck);
            prop_assert!(parsed.diagnostics.is_empty(), "{}", parsed.diagnostics);
        }
    }
}
