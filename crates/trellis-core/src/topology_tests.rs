use std::sync::Arc;

use crate::schema::{Direction, SchemaTable};
use crate::topology::{Catalog, Topology};
use crate::value::ColumnType;

const MODERN: &str = r#"{
    "schemas": [{
        "name": "public",
        "vertices": [
            {"label": "person", "columns": {"name": "text", "age": "int"}},
            {"label": "software", "columns": {"name": "text", "lang": "text"}}
        ],
        "edges": [
            {"label": "knows", "columns": {"weight": "float"},
             "connections": [{"out": "person", "in": "person"}]},
            {"label": "created", "columns": {"weight": "float"},
             "connections": [{"out": "person", "in": "software"}]}
        ]
    }]
}"#;

fn modern() -> Topology {
    Topology::from_json(MODERN).expect("valid topology")
}

#[test]
fn resolve_labels() {
    let topology = modern();
    assert_eq!(
        topology.resolve_vertex_table("person"),
        Some(SchemaTable::vertex("public", "person"))
    );
    assert_eq!(
        topology.resolve_edge_table("knows"),
        Some(SchemaTable::edge("public", "knows"))
    );
    assert_eq!(topology.resolve_vertex_table("nope"), None);
}

#[test]
fn enumerate_tables() {
    let topology = modern();
    let vertices = topology.vertex_tables();
    assert_eq!(vertices.len(), 2);
    assert_eq!(vertices[0].table, "V_person");
    assert_eq!(vertices[1].table, "V_software");
    assert_eq!(topology.edge_tables().len(), 2);
}

#[test]
fn edge_tables_from_vertex() {
    let topology = modern();
    let person = SchemaTable::vertex("public", "person");

    let out = topology.edge_tables_from(&person, Direction::Out, &[]);
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].0.table, "E_knows");
    assert_eq!(out[0].1.table, "V_person");
    assert_eq!(out[1].0.table, "E_created");
    assert_eq!(out[1].1.table, "V_software");

    let constrained =
        topology.edge_tables_from(&person, Direction::Out, &["knows".to_string()]);
    assert_eq!(constrained.len(), 1);

    // Software has no outgoing edges, only incoming `created`.
    let software = SchemaTable::vertex("public", "software");
    assert!(topology.edge_tables_from(&software, Direction::Out, &[]).is_empty());
    let incoming = topology.edge_tables_from(&software, Direction::In, &[]);
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].0.table, "E_created");
    assert_eq!(incoming[0].1.table, "V_person");
}

#[test]
fn columns_include_identity_and_foreign_keys() {
    let topology = modern();
    let person = SchemaTable::vertex("public", "person");
    let columns = topology.columns(&person);
    assert_eq!(columns[0], ("ID".to_string(), ColumnType::Int));
    assert!(columns.iter().any(|(name, _)| name == "age"));

    let knows = SchemaTable::edge("public", "knows");
    let columns = topology.columns(&knows);
    assert!(columns.iter().any(|(name, _)| name == "public.person__O"));
    assert!(columns.iter().any(|(name, _)| name == "public.person__I"));
    assert_eq!(
        topology.column_type(&knows, "weight"),
        Some(ColumnType::Float)
    );
    assert_eq!(topology.column_type(&knows, "nope"), None);
}

#[test]
fn duplicate_label_rejected() {
    let json = r#"{"schemas": [{"name": "public", "vertices": [
        {"label": "person"}, {"label": "person"}
    ]}]}"#;
    assert!(Topology::from_json(json).is_err());
}

#[test]
fn unknown_endpoint_rejected() {
    let json = r#"{"schemas": [{"name": "public",
        "vertices": [{"label": "person"}],
        "edges": [{"label": "knows", "connections": [{"out": "person", "in": "ghost"}]}]
    }]}"#;
    assert!(Topology::from_json(json).is_err());
}

#[test]
fn writer_sees_uncommitted_additions() {
    let topology = modern();
    let mut writer = topology.begin_update();
    writer.ensure_vertex_label("public", "dog", [("name".to_string(), ColumnType::Text)]);

    // The writer thread sees the addition before commit.
    assert!(topology.resolve_vertex_table("dog").is_some());
    assert_eq!(topology.vertex_tables().len(), 3);

    writer.rollback();
    assert!(topology.resolve_vertex_table("dog").is_none());
}

#[test]
fn commit_publishes_additions() {
    let topology = modern();
    let mut writer = topology.begin_update();
    writer.ensure_vertex_label("public", "dog", [("name".to_string(), ColumnType::Text)]);
    writer
        .ensure_edge_label("public", "owns", [], "person", "dog")
        .expect("endpoints exist");
    writer.commit();

    assert!(topology.resolve_vertex_table("dog").is_some());
    let person = SchemaTable::vertex("public", "person");
    let out = topology.edge_tables_from(&person, Direction::Out, &["owns".to_string()]);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].1.table, "V_dog");
}

#[test]
fn edge_endpoint_must_exist() {
    let topology = modern();
    let mut writer = topology.begin_update();
    let err = writer.ensure_edge_label("public", "owns", [], "person", "ghost");
    assert!(err.is_err());
}

#[test]
fn concurrent_readers_never_observe_partial_state() {
    let topology = Arc::new(modern());
    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let mut readers = Vec::new();
    for _ in 0..4 {
        let topology = Arc::clone(&topology);
        let stop = Arc::clone(&stop);
        readers.push(std::thread::spawn(move || {
            while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                let person = SchemaTable::vertex("public", "person");
                let owns = topology
                    .edge_tables_from(&person, Direction::Out, &["owns".to_string()]);
                // The edge label commits atomically with its endpoint
                // vertex label; once `owns` is visible, `dog` must be too.
                if !owns.is_empty() {
                    assert!(topology.resolve_vertex_table("dog").is_some());
                }
            }
        }));
    }

    {
        let mut writer = topology.begin_update();
        writer.ensure_vertex_label("public", "dog", [("name".to_string(), ColumnType::Text)]);
        writer
            .ensure_edge_label("public", "owns", [], "person", "dog")
            .expect("endpoints exist");
        writer.commit();
    }

    stop.store(true, std::sync::atomic::Ordering::Relaxed);
    for reader in readers {
        reader.join().expect("reader thread");
    }

    assert!(topology.resolve_vertex_table("dog").is_some());
}
