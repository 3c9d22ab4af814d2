use docgraph_core::graph::PropertyMap;
use docgraph_core::mapping::{AssociationRule, Endpoint, ObjectRule, ReferenceRule};
use docgraph_core::{
    BatchConverter, BatchInput, ConflictPolicy, ConvertOptions, Converter, EdgeKind, MappingDescriptor, PropertyGraph,
    PropertyValue, Scalar,
};

fn dynamic(xml: &str) -> PropertyGraph {
    Converter::dynamic().convert_bytes("doc.xml", xml.as_bytes()).unwrap().graph
}

fn text(properties: &PropertyMap, key: &str) -> String {
    match properties.get(key) {
        Some(PropertyValue::Scalar(Scalar::String(s))) => s.clone(),
        other => panic!("{key}: {other:?}"),
    }
}

#[test]
fn test_person_name_is_flattened() {
    let graph = dynamic(r#"<Person id="P1"><Name><Given>John</Given><Sur>Doe</Sur></Name></Person>"#);

    assert_eq!(graph.nodes().len(), 1);
    let person = graph.node("P1").unwrap();
    assert_eq!(person.label, "Person");
    assert_eq!(text(&person.properties, "Name__Given"), "John");
    assert_eq!(text(&person.properties, "Name__Sur"), "Doe");
    assert!(graph.edges().is_empty());
}

#[test]
fn test_conversion_is_deterministic() {
    let xml = r#"<Doc><Person><Name>Ann</Name></Person><Person><Name>Bob</Name></Person></Doc>"#;
    let descriptor = MappingDescriptor {
        objects: vec![ObjectRule::new("Person")],
        ..Default::default()
    };
    let converter = Converter::new(descriptor, ConvertOptions::dynamic().with_batch_tag("b1"));

    let first = converter.convert_bytes("doc.xml", xml.as_bytes()).unwrap().graph;
    let second = converter.convert_bytes("doc.xml", xml.as_bytes()).unwrap().graph;

    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert_eq!(first.nodes().len(), 3);
    assert!(first.nodes().iter().all(|n| n.identity.starts_with("b1-")));
}

#[test]
fn test_merge_is_idempotent_and_additive() {
    let converter = Converter::dynamic();
    let first = converter
        .convert_bytes("a.xml", br#"<Person id="P1"><Name>Ann</Name></Person>"#)
        .unwrap()
        .graph;
    let again = first.clone();
    let richer = converter
        .convert_bytes("b.xml", br#"<Person id="P1"><Name>Other</Name><Age>40</Age></Person>"#)
        .unwrap()
        .graph;

    let mut merged = PropertyGraph::new();
    merged.absorb(first, ConflictPolicy::KeepFirst);
    assert!(merged.absorb(again, ConflictPolicy::KeepFirst).is_empty());
    assert_eq!(merged.nodes().len(), 1);

    let conflicts = merged.absorb(richer, ConflictPolicy::KeepFirst);
    assert_eq!(merged.nodes().len(), 1);
    let person = merged.node("P1").unwrap();
    assert_eq!(text(&person.properties, "Name"), "Ann");
    assert_eq!(text(&person.properties, "Age"), "40");
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].key, "Name");
}

#[test]
fn test_flattening_at_every_depth() {
    let graph = dynamic(
        r#"<Doc id="D">
             <A>one</A>
             <B><C>two</C></B>
             <E><F><G>three</G></F></E>
             <H><I><J><K><L>five</L></K></J></I></H>
           </Doc>"#,
    );

    let doc = graph.node("D").unwrap();
    assert_eq!(text(&doc.properties, "A"), "one");
    assert_eq!(text(&doc.properties, "B__C"), "two");
    assert_eq!(text(&doc.properties, "E__F__G"), "three");
    assert_eq!(text(&doc.properties, "H__I__J__K__L"), "five");
    assert_eq!(graph.nodes().len(), 1);
}

#[test]
fn test_attributes_flatten_with_marker() {
    let graph = dynamic(r#"<Doc id="D"><Name lang="en">Ann</Name></Doc>"#);
    let doc = graph.node("D").unwrap();
    assert_eq!(text(&doc.properties, "Name"), "Ann");
    assert_eq!(text(&doc.properties, "Name__@lang"), "en");
}

#[test]
fn test_repeated_leaves_become_lists() {
    let graph = dynamic(r#"<P id="P"><Alias>X</Alias><Alias>Y</Alias><Single>Z</Single></P>"#);
    let p = graph.node("P").unwrap();

    assert_eq!(
        p.properties.get("Alias"),
        Some(&PropertyValue::List(vec![Scalar::from("X"), Scalar::from("Y")]))
    );
    assert_eq!(p.properties.get("Single"), Some(&PropertyValue::from("Z")));
}

fn vehicle_descriptor() -> MappingDescriptor {
    MappingDescriptor {
        objects: vec![
            ObjectRule::new("Person"),
            ObjectRule::new("Vehicle"),
            ObjectRule::new("Doc"),
        ],
        associations: vec![AssociationRule::new("PersonVehicle")
            .with_endpoint(Endpoint {
                role_qname: "driver".into(),
                target_label: "Person".into(),
                cardinality: Default::default(),
            })
            .with_endpoint(Endpoint {
                role_qname: "vehicle".into(),
                target_label: "Vehicle".into(),
                cardinality: Default::default(),
            })],
        ..Default::default()
    }
}

#[test]
fn test_association_becomes_one_edge() {
    let converter = Converter::new(vehicle_descriptor(), ConvertOptions::default());
    let outcome = converter
        .convert_bytes(
            "doc.xml",
            br#"<Doc>
                  <Person id="P1"/><Vehicle id="V1"/>
                  <PersonVehicle><driver ref="P1"/><vehicle ref="V1"/><Since>2020</Since></PersonVehicle>
                </Doc>"#,
        )
        .unwrap();

    let associations: Vec<_> = outcome
        .graph
        .edges()
        .iter()
        .filter(|e| e.kind == EdgeKind::Association)
        .collect();
    assert_eq!(associations.len(), 1);
    let edge = associations[0];
    assert_eq!(edge.rel_type, "PERSONVEHICLE");
    assert_eq!((edge.source.identity.as_str(), edge.source.label.as_str()), ("P1", "Person"));
    assert_eq!((edge.target.identity.as_str(), edge.target.label.as_str()), ("V1", "Vehicle"));
    assert_eq!(text(&edge.properties, "Since"), "2020");

    // role children do not turn into reference edges of their own
    assert_eq!(outcome.report.reference_edges, 0);
    assert!(outcome.graph.nodes().iter().all(|n| n.qname != "PersonVehicle"));
}

#[test]
fn test_association_with_missing_endpoints_is_skipped() {
    let converter = Converter::new(vehicle_descriptor(), ConvertOptions::default());
    let outcome = converter
        .convert_bytes(
            "doc.xml",
            br#"<Doc>
                  <PersonVehicle><driver ref="P1"/></PersonVehicle>
                  <PersonVehicle><Since>2020</Since></PersonVehicle>
                </Doc>"#,
        )
        .unwrap();

    assert_eq!(outcome.report.association_edges, 0);
    assert_eq!(outcome.report.skipped_associations, 2);
    assert_eq!(outcome.graph.nodes().len(), 1);
    assert!(outcome.graph.nodes().iter().all(|n| n.qname != "PersonVehicle"));
}

#[test]
fn test_dynamic_association_by_suffix() {
    let graph = dynamic(
        r#"<Doc>
             <Person id="P1"/><Vehicle id="V1"/>
             <PersonVehicleAssociation><Person ref="P1"/><Vehicle ref="V1"/></PersonVehicleAssociation>
           </Doc>"#,
    );

    let edge = graph.edges().iter().find(|e| e.kind == EdgeKind::Association).unwrap();
    assert_eq!(edge.rel_type, "PERSONVEHICLEASSOCIATION");
    assert_eq!(edge.source.label, "Person");
    assert_eq!(edge.target.label, "Vehicle");
}

#[test]
fn test_every_nested_node_has_one_containment_parent() {
    let graph = dynamic(
        r#"<Doc>
             <Person id="P1"><Vehicle id="V1"><Engine id="E1"/></Vehicle></Person>
             <Person id="P2"><Vehicle id="V2"/></Person>
           </Doc>"#,
    );

    let root = &graph.nodes()[0];
    assert_eq!(root.qname, "Doc");
    assert_eq!(graph.incoming(&root.identity, EdgeKind::Containment).count(), 0);
    for node in &graph.nodes()[1..] {
        assert_eq!(
            graph.incoming(&node.identity, EdgeKind::Containment).count(),
            1,
            "{}",
            node.identity
        );
    }
    assert_eq!(graph.nodes().len(), 6);
}

#[test]
fn test_reference_to_known_node_takes_its_label() {
    let graph = dynamic(r#"<Doc><Person id="P1"/><Case id="C1"><Subject ref="P1"/></Case></Doc>"#);

    let reference = graph.edges().iter().find(|e| e.kind == EdgeKind::Reference).unwrap();
    assert_eq!(reference.source.identity, "C1");
    assert_eq!(reference.rel_type, "SUBJECT");
    assert_eq!(reference.target.label, "Person");
    assert_eq!(graph.dangling_edges().count(), 0);
}

#[test]
fn test_synthetic_identities_differ_between_documents() {
    let converter = Converter::dynamic();
    let inputs = vec![
        BatchInput::new("a.xml", "<Doc><Item><Name>x</Name></Item></Doc>"),
        BatchInput::new("b.xml", "<Doc><Item><Name>y</Name></Item></Doc>"),
    ];

    let outcome = BatchConverter::new(&converter).run(&inputs);

    // root of each document, no collisions
    assert_eq!(outcome.graph.nodes().len(), 2);
    assert!(outcome.report.conflicts.is_empty());
}

#[test]
fn test_association_root_is_an_edge_not_a_node() {
    let converter = Converter::new(vehicle_descriptor(), ConvertOptions::default());
    let outcome = converter
        .convert_bytes(
            "link.xml",
            br#"<PersonVehicle><driver ref="P1"/><vehicle ref="V1"/></PersonVehicle>"#,
        )
        .unwrap();

    assert!(outcome.graph.nodes().is_empty());
    assert_eq!(outcome.report.association_edges, 1);
    assert_eq!(outcome.report.reference_edges, 0);
    let edge = &outcome.graph.edges()[0];
    assert_eq!((edge.source.identity.as_str(), edge.target.identity.as_str()), ("P1", "V1"));
}

#[test]
fn test_inline_roles_sharing_a_name_bind_in_order() {
    let descriptor = MappingDescriptor {
        objects: vec![ObjectRule::new("Person")],
        associations: vec![AssociationRule::new("PersonAssociation")
            .with_endpoint(Endpoint {
                role_qname: "Person".into(),
                target_label: "Person".into(),
                cardinality: Default::default(),
            })
            .with_endpoint(Endpoint {
                role_qname: "Person".into(),
                target_label: "Person".into(),
                cardinality: Default::default(),
            })],
        ..Default::default()
    };
    let converter = Converter::new(descriptor, ConvertOptions::default());
    let outcome = converter
        .convert_bytes(
            "doc.xml",
            br#"<Doc>
                  <PersonAssociation>
                    <Person id="P1"><Name>Ann</Name></Person>
                    <Person id="P2"><Name>Bob</Name></Person>
                  </PersonAssociation>
                </Doc>"#,
        )
        .unwrap();

    let graph = &outcome.graph;
    let pairs: Vec<(&str, &str)> = graph
        .edges()
        .iter()
        .filter(|e| e.kind == EdgeKind::Association)
        .map(|e| (e.source.identity.as_str(), e.target.identity.as_str()))
        .collect();
    assert_eq!(pairs, vec![("P1", "P2")]);

    // inline roles are still nodes of their own
    assert_eq!(text(&graph.node("P1").unwrap().properties, "Name"), "Ann");
    assert_eq!(text(&graph.node("P2").unwrap().properties, "Name"), "Bob");
}

#[test]
fn test_reference_with_content_keeps_its_edge() {
    let graph = dynamic(r#"<Case id="C1"><Subject ref="P1"><Note>x</Note></Subject></Case>"#);

    let references: Vec<_> = graph.edges().iter().filter(|e| e.kind == EdgeKind::Reference).collect();
    assert_eq!(references.len(), 1);
    assert_eq!(references[0].source.identity, "C1");
    assert_eq!(references[0].target.identity, "P1");
    assert_eq!(references[0].rel_type, "SUBJECT");

    let case = graph.node("C1").unwrap();
    assert_eq!(text(&case.properties, "Subject__Note"), "x");
    assert!(case.properties.keys().all(|k| !k.contains("ref")));
}

#[test]
fn test_reference_rule_applies_to_direct_children() {
    let descriptor = MappingDescriptor {
        objects: vec![ObjectRule::new("nc:PersonType").with_elements(["nc:Person".to_string()])],
        references: vec![ReferenceRule {
            owner: "nc:PersonType".into(),
            field_qname: "nc:PersonVehicle".into(),
            target_label: "nc_VehicleType".into(),
            rel_type: "NC_PERSONVEHICLE".into(),
            cardinality: Default::default(),
        }],
        ..Default::default()
    };
    let converter = Converter::new(descriptor, ConvertOptions::default());
    let outcome = converter
        .convert_bytes(
            "doc.xml",
            br#"<nc:Person xmlns:nc="urn:nc" id="P1">
                  <nc:PersonVehicle ref="V1"/>
                  <nc:Details><nc:PersonVehicle ref="V2"/></nc:Details>
                </nc:Person>"#,
        )
        .unwrap();

    let references: Vec<(&str, &str, &str)> = outcome
        .graph
        .edges()
        .iter()
        .filter(|e| e.kind == EdgeKind::Reference)
        .map(|e| (e.rel_type.as_str(), e.target.identity.as_str(), e.target.label.as_str()))
        .collect();
    assert_eq!(
        references,
        vec![
            ("NC_PERSONVEHICLE", "V1", "nc_VehicleType"),
            ("PERSONVEHICLE", "V2", "Unknown"),
        ]
    );
    for edge in outcome.graph.edges() {
        assert_eq!(edge.source.identity, "P1");
    }

    // unresolved targets stay as dangling edges
    assert_eq!(outcome.graph.nodes().len(), 1);
    assert_eq!(outcome.report.dangling_references, 2);
}

#[test]
fn test_later_document_wins_and_is_flagged() {
    let converter = Converter::dynamic();
    let inputs = vec![
        BatchInput::new("a.xml", r#"<Person id="P1"><Name>Ann</Name></Person>"#),
        BatchInput::new("b.xml", r#"<Person id="P1"><Name>Bob</Name></Person>"#),
    ];

    let outcome = BatchConverter::new(&converter).run(&inputs);

    assert_eq!(text(&outcome.graph.node("P1").unwrap().properties, "Name"), "Bob");
    assert_eq!(outcome.report.conflicts.len(), 1);
    let conflict = &outcome.report.conflicts[0];
    assert_eq!(conflict.key, "Name");
    assert_eq!(conflict.kept, PropertyValue::from("Bob"));
    assert_eq!(conflict.discarded, PropertyValue::from("Ann"));
}

#[test]
fn test_role_with_content_is_not_a_reference() {
    let graph = dynamic(
        r#"<Doc id="D">
             <PersonVehicleAssociation>
               <Person ref="P1"><Note>owner</Note></Person>
               <Vehicle ref="V1"/>
             </PersonVehicleAssociation>
           </Doc>"#,
    );

    assert!(graph.edges().iter().all(|e| e.kind != EdgeKind::Reference));
    let edge = graph.edges().iter().find(|e| e.kind == EdgeKind::Association).unwrap();
    assert_eq!((edge.source.identity.as_str(), edge.target.identity.as_str()), ("P1", "V1"));
    assert_eq!(text(&edge.properties, "Person__Note"), "owner");
}
