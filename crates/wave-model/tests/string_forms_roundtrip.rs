mod common;

use proptest::prelude::*;
use wave_model::automaton::is_well_formed;
use wave_model::doc_op::{
    normalize_initialization, parse_concise, parse_xml, resulting_document_length,
    to_concise_string, to_xml_string, DocInitialization, RandomInitializationGenerator,
    RandomInitializationParameters,
};
use wave_model::simple_doc::SimpleDocument;
use wave_model::tree::TreeDocument;
use wave_model_util::Fuzzer;

fn random_initialization(seed: u64) -> DocInitialization {
    let fuzzer = Fuzzer::from_u64(seed);
    RandomInitializationGenerator::new(&fuzzer, RandomInitializationParameters::default())
        .generate()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_initializations_are_well_formed(seed in any::<u64>()) {
        let init = random_initialization(seed);
        prop_assert!(is_well_formed(init.as_op()));
        let doc = SimpleDocument::from_initialization(&init);
        prop_assert!(doc.is_ok());
        prop_assert_eq!(doc.unwrap().len(), resulting_document_length(init.as_op()));
    }

    #[test]
    fn xml_form_is_stable(seed in any::<u64>()) {
        let init = random_initialization(seed);
        let xml = to_xml_string(&init);
        let parsed = parse_xml(&xml).unwrap();
        prop_assert_eq!(to_xml_string(&parsed), xml);
    }

    #[test]
    fn concise_form_parses_back(seed in any::<u64>()) {
        let init = random_initialization(seed);
        let parsed = parse_concise(&to_concise_string(init.as_op())).unwrap();
        prop_assert_eq!(&parsed, init.as_op());
    }

    #[test]
    fn snapshot_reproduces_itself(seed in any::<u64>()) {
        let init = random_initialization(seed);
        let doc = SimpleDocument::from_initialization(&init).unwrap();
        let again = SimpleDocument::from_initialization(&doc.to_initialization()).unwrap();
        prop_assert_eq!(again, doc);
    }
}

#[test]
fn normalization_keeps_the_rendered_document() {
    for seed in common::SEEDS {
        let init = random_initialization(seed);
        let normalized = normalize_initialization(&init);
        assert!(normalized.size() <= init.size(), "seed={seed}");
        assert_eq!(to_xml_string(&normalized), to_xml_string(&init), "seed={seed}");
    }
}

#[test]
fn tree_document_keeps_structure_and_text() {
    let xml = r#"<body><line t="h1"/>a &amp; b<p id="1">x<br/></p></body>"#;
    let tree = TreeDocument::from_initialization(&parse_xml(xml).unwrap());
    assert_eq!(tree.to_xml(), xml);
    assert_eq!(to_xml_string(&tree.to_initialization()), xml);
}
