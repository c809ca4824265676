use criterion::{black_box, criterion_group, criterion_main, Criterion};
use deckhand_core::metadata::load_str;
use deckhand_core::EmitConfig;
use deckhand_dsl::converter::{from_structured, to_structured, ConvertOptions};
use deckhand_dsl::{parse, print_deck, validate};

const SCHEMA: &str = r#"
version: bench
sections:
  - name: PROBLEM TYPE
    required: true
    parameters:
      - { name: PROBLEMTYPE, type: enum, choices: [Structure, Fluid], required: true }
  - name: STRUCTURAL DYNAMIC
    parameters:
      - { name: DYNAMICTYPE, type: enum, choices: [Statics, OneStepTheta], default: Statics }
      - { name: TIMESTEP, type: real, min: 0, min_exclusive: true }
      - { name: NUMSTEP, type: integer, min: 1 }
      - { name: THETA, type: real, min: 0, max: 1, condition: "DYNAMICTYPE == 'OneStepTheta'" }
  - name: MATERIALS
    records: { keyword: MAT, unique_ids: true }
    parameters:
      - { name: MODEL, type: enum, choices: [elastic, plastic], required: true }
      - { name: YIELD, type: real, min: 0, condition: "MODEL == 'plastic'" }
  - name: NODE COORDS
    records: { keyword: NODE, unique_ids: true }
    parameters:
      - { name: COORD, type: real, size: 3 }
"#;

/// A deck dominated by node records, like a meshed model.
fn large_deck(nodes: usize) -> String {
    let mut deck = String::from(
        "--PROBLEM TYPE\nPROBLEMTYPE Structure\n--STRUCTURAL DYNAMIC\nDYNAMICTYPE OneStepTheta\n\
         TIMESTEP 0.01\nNUMSTEP 100\nTHETA 0.5\n--MATERIALS\nMAT 1 MODEL elastic\nMAT 2 MODEL plastic YIELD 250\n\
         --NODE COORDS\n",
    );
    for i in 1..=nodes {
        deck.push_str(&format!("NODE {} COORD {}.0 {}.5 -{}.25 // node\n", i, i % 97, i % 13, i % 7));
    }
    deck
}

fn bench_parse_validate(c: &mut Criterion) {
    let schema = load_str(SCHEMA).expect("load schema");
    let deck = large_deck(5_000);

    c.bench_function("deck/parse_5k_nodes", |b| {
        b.iter(|| {
            let parsed = parse(black_box(&deck));
            black_box(parsed.deck.entry_count());
        });
    });

    let parsed = parse(&deck);
    c.bench_function("deck/validate_5k_nodes", |b| {
        b.iter(|| {
            let validated = validate(black_box(&parsed.deck), &schema);
            black_box(validated.diagnostics.len());
        });
    });
}

fn bench_convert(c: &mut Criterion) {
    let schema = load_str(SCHEMA).expect("load schema");
    let deck = large_deck(1_000);
    let validated = validate(&parse(&deck).deck, &schema);
    let options = ConvertOptions::default();

    c.bench_function("deck/to_structured_1k_nodes", |b| {
        b.iter(|| {
            let tree = to_structured(black_box(&validated.deck), &schema, &options);
            black_box(tree.len());
        });
    });

    let tree = to_structured(&validated.deck, &schema, &options);
    c.bench_function("deck/to_legacy_1k_nodes", |b| {
        b.iter(|| {
            let raw = from_structured(black_box(&tree), &schema).expect("convert back");
            black_box(print_deck(&raw, &EmitConfig::default()).len());
        });
    });
}

criterion_group!(benches, bench_parse_validate, bench_convert);
criterion_main!(benches);
