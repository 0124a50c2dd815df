//! Validation entry points.

use log::debug;

use super::automaton::DocOpAutomaton;
use super::document::{AutomatonDocument, EmptyDocument};
use super::result::{ValidationResult, ViolationCollector, ViolationKind};
use super::schema::{DocumentSchema, NoSchema};
use crate::doc_op::{DocOp, DocOpError};

/// Walks `op` against `doc`, adding every violation found to `collector`.
///
/// The walk stops at the first ill-formed component. Components that only
/// conflict with the document or the schema are recorded and then applied,
/// so later components are still checked. Returns the worst result of this
/// walk.
pub fn validate(
    collector: &mut ViolationCollector,
    schema: &dyn DocumentSchema,
    doc: &dyn AutomatonDocument,
    op: &DocOp,
) -> ValidationResult {
    let mut automaton = DocOpAutomaton::new(doc, schema);
    let mut result = ValidationResult::Valid;
    for component in op {
        if let Err(violation) = automaton.check(component) {
            let kind = violation.kind;
            debug!(target: "wave_model::automaton", "{violation}");
            result = result.merge_with(kind.validation_result());
            collector.add(violation);
            if kind == ViolationKind::IllFormed {
                return result;
            }
        }
        automaton.apply(component);
    }
    if let Err(violation) = automaton.check_finish() {
        debug!(target: "wave_model::automaton", "{violation}");
        result = result.merge_with(violation.kind.validation_result());
        collector.add(violation);
    }
    result
}

/// Validates without keeping the violations.
pub fn validation_result(
    schema: &dyn DocumentSchema,
    doc: &dyn AutomatonDocument,
    op: &DocOp,
) -> ValidationResult {
    validate(&mut ViolationCollector::new(), schema, doc, op)
}

fn collect_ill_formedness(op: &DocOp) -> ViolationCollector {
    let mut collector = ViolationCollector::new();
    validate(&mut collector, &NoSchema, &EmptyDocument, op);
    collector
}

/// Whether `op` is well-formed on its own, without any document or schema.
/// A positive answer is cached on the operation.
pub fn is_well_formed(op: &DocOp) -> bool {
    if op.is_known_well_formed() {
        return true;
    }
    let well_formed = !collect_ill_formedness(op).is_ill_formed();
    if well_formed {
        op.mark_well_formed();
    }
    well_formed
}

/// Like [`is_well_formed`], returning the first problem as an error.
pub fn check_well_formed(op: &DocOp) -> Result<(), DocOpError> {
    if op.is_known_well_formed() {
        return Ok(());
    }
    let collector = collect_ill_formedness(op);
    if collector.is_ill_formed() {
        let message = collector.first_description().unwrap_or_default();
        return Err(DocOpError::IllFormed(message));
    }
    op.mark_well_formed();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::SchemaDefinition;
    use crate::doc_op::{AnnotationBoundaryMap, Attributes, DocOpBuilder, DocOpComponent};

    fn ill_formed(components: Vec<DocOpComponent>) -> String {
        let op = DocOp::new_unchecked(components);
        let collector = collect_ill_formedness(&op);
        assert!(!is_well_formed(&op));
        collector.first_description().unwrap()
    }

    #[test]
    fn empty_op_is_well_formed() {
        let op = DocOp::default();
        assert!(is_well_formed(&op));
        assert!(op.is_known_well_formed());
    }

    #[test]
    fn retain_is_well_formed_but_invalid_on_empty_document() {
        let op = DocOp::new_unchecked(vec![DocOpComponent::Retain(3)]);
        assert!(is_well_formed(&op));
        let mut collector = ViolationCollector::new();
        let result = validate(&mut collector, &NoSchema, &EmptyDocument, &op);
        assert_eq!(result, ValidationResult::IllFormed);
        assert!(collector.is_invalid_document());
        assert!(!collector.is_ill_formed());
        let first = collector.first_description().unwrap();
        assert!(first.starts_with(
            "invalid operation: retain past end of document, document length 0, retain item count 3"
        ));
    }

    #[test]
    fn zero_retain_is_ill_formed() {
        let message = ill_formed(vec![DocOpComponent::Retain(0)]);
        assert_eq!(
            message,
            "ill-formed: retain item count not positive at original document position 0 / \
             resulting document position 0"
        );
    }

    #[test]
    fn unbalanced_elements_are_ill_formed() {
        let message = ill_formed(vec![DocOpComponent::element_start("p", Attributes::new())]);
        assert!(message.starts_with("ill-formed: elementStart with no matching elementEnd"));
        let message = ill_formed(vec![DocOpComponent::ElementEnd]);
        assert!(message.starts_with("ill-formed: elementEnd with no matching elementStart"));
        let message = ill_formed(vec![DocOpComponent::DeleteElementEnd]);
        assert!(message.starts_with(
            "ill-formed: deleteElementEnd with no matching deleteElementStart"
        ));
    }

    #[test]
    fn adjacent_boundaries_are_ill_formed() {
        let open = AnnotationBoundaryMap::builder()
            .change("k", None, Some("v"))
            .build()
            .unwrap();
        let close = AnnotationBoundaryMap::builder().end("k").build().unwrap();
        let message = ill_formed(vec![
            DocOpComponent::AnnotationBoundary(open),
            DocOpComponent::AnnotationBoundary(close),
        ]);
        assert!(message.starts_with("ill-formed: adjacent annotation boundaries"));
    }

    #[test]
    fn unterminated_annotation_is_ill_formed() {
        let open = AnnotationBoundaryMap::builder()
            .change("k", None, Some("v"))
            .build()
            .unwrap();
        let message = ill_formed(vec![
            DocOpComponent::AnnotationBoundary(open),
            DocOpComponent::Characters("a".into()),
        ]);
        assert!(message.starts_with("ill-formed: annotation of key k starts but never ends"));
    }

    #[test]
    fn bad_annotation_keys_are_ill_formed() {
        let bad = AnnotationBoundaryMap::new_unchecked(
            Vec::new(),
            vec![crate::doc_op::ValueChange::new("a?b", None, Some("v"))],
        );
        let message = ill_formed(vec![
            DocOpComponent::AnnotationBoundary(bad),
            DocOpComponent::Characters("a".into()),
        ]);
        assert!(message.starts_with("ill-formed: invalid character in annotation key: a?b"));
    }

    #[test]
    fn element_names_must_be_xml_names() {
        let message = ill_formed(vec![
            DocOpComponent::element_start("1p", Attributes::new()),
            DocOpComponent::ElementEnd,
        ]);
        assert!(message.starts_with("ill-formed: element type is not an XML Name: \"1p\""));
    }

    #[test]
    fn insertion_inside_deletion_is_ill_formed() {
        let message = ill_formed(vec![
            DocOpComponent::delete_element_start("p", Attributes::new()),
            DocOpComponent::Characters("a".into()),
            DocOpComponent::DeleteElementEnd,
        ]);
        assert!(message.starts_with("ill-formed: insertion inside deletion"));
    }

    #[test]
    fn schema_violations_do_not_stop_the_walk() {
        let schema = SchemaDefinition::from_json(
            r#"{
                "top_level": { "children": ["body"] },
                "elements": { "body": { "characters": "any" } }
            }"#,
        )
        .unwrap();
        let op = DocOpBuilder::new()
            .characters("top")
            .element_start("body", Attributes::new())
            .characters("ok")
            .element_end()
            .element_start("head", Attributes::new())
            .element_end()
            .build()
            .unwrap();
        let mut collector = ViolationCollector::new();
        let result = validate(&mut collector, &schema, &EmptyDocument, &op);
        assert_eq!(result, ValidationResult::InvalidSchema);
        assert_eq!(collector.len(), 2);
        let messages: Vec<_> = collector.violations().map(|v| v.message.clone()).collect();
        assert_eq!(
            messages,
            vec![
                "element type null does not allow text content".to_owned(),
                "element type head not permitted at top level".to_owned(),
            ]
        );
    }

    #[test]
    fn required_first_child_is_enforced() {
        let schema = SchemaDefinition::from_json(
            r#"{
                "top_level": { "children": ["blip"] },
                "elements": {
                    "blip": { "children": ["body", "footer"], "required_first_child": "body" },
                    "body": {},
                    "footer": {}
                }
            }"#,
        )
        .unwrap();
        let op = DocOpBuilder::new()
            .element_start("blip", Attributes::new())
            .element_start("footer", Attributes::new())
            .element_end()
            .element_end()
            .build()
            .unwrap();
        let mut collector = ViolationCollector::new();
        assert_eq!(
            validate(&mut collector, &schema, &EmptyDocument, &op),
            ValidationResult::InvalidSchema
        );
        let first = collector.violations().next().unwrap();
        assert_eq!(first.message, "element of type body required, not footer");
        assert_eq!(first.resulting_pos, 1);
    }

    #[test]
    fn check_well_formed_reports_first_problem() {
        let op = DocOp::new_unchecked(vec![DocOpComponent::Characters(String::new())]);
        match check_well_formed(&op) {
            Err(DocOpError::IllFormed(message)) => {
                assert!(message.starts_with("ill-formed: characters is empty"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
