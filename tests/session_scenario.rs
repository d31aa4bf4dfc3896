use machdb::{Config, ErrorKind, Interpreter, Outcome, Value};

fn matches(outcome: Outcome) -> Vec<machdb::Match> {
    match outcome {
        Outcome::Matches(found) => found,
        other => panic!("expected matches, got {:?}", other),
    }
}

#[test]
fn ventas_walkthrough_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::default().with_storage_path(dir.path().join("store"));

    {
        let mut session = Interpreter::open(config.clone()).unwrap();
        for line in [
            "create db ventas",
            "select db ventas",
            "create collection clientes",
            "create collection usuarios",
            "select collection clientes",
            "create document registro",
        ] {
            session.run(line).unwrap();
        }
        assert_eq!(
            session.run(r#"insert {name:"Pedro", eps:"colfamilia"} in document registro"#).unwrap(),
            Outcome::Inserted(vec![0])
        );
        assert_eq!(
            session.run(r#"insert {name:"Luis", eps:"colsanitas"} in document registro"#).unwrap(),
            Outcome::Inserted(vec![1])
        );

        let found = matches(session.run(r#"find "name:Luis" in clientes"#).unwrap());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].object.id, 1);

        let report = session.save().unwrap();
        assert_eq!(report.documents_written, 1);
    }

    let mut session = Interpreter::open(config).unwrap();
    assert_eq!(session.run("list db").unwrap(), Outcome::Names(vec!["ventas".into()]));
    session.run("select db ventas").unwrap();
    assert_eq!(
        session.run("list collections").unwrap(),
        Outcome::Names(vec!["clientes".into(), "usuarios".into()])
    );
    session.run("select collection clientes").unwrap();

    let found = matches(session.run(r#"find "eps:colsanitas""#).unwrap());
    assert_eq!(found[0].object.get_field("name"), Some(&Value::Text("Luis".into())));

    // ids continue after the stored counter
    assert_eq!(
        session.run(r#"insert {name:"Ana"} in document registro"#).unwrap(),
        Outcome::Inserted(vec![2])
    );

    session.run("delete document registro").unwrap();
    let err = session.run(r#"find "name:Luis" in clientes"#).unwrap_err();
    assert!(err.is_not_found(), "{}", err);
}

#[test]
fn find_outside_the_allowed_collections_is_empty() {
    let catalog = std::sync::Arc::new(machdb::Catalog::new(Config::default()));
    let mut session = Interpreter::with_catalog(catalog.clone());
    for line in [
        "create db ventas",
        "select db ventas",
        "create collection clientes",
        "create collection usuarios",
        "select collection usuarios",
        "create document perfiles",
        "insert {name:luis} in document perfiles",
    ] {
        session.run(line).unwrap();
    }

    assert_eq!(session.run(r#"find "name:luis" in clientes"#).unwrap_err().kind, ErrorKind::NoResults);
    assert_eq!(matches(session.run(r#"find "name:luis" in clientes usuarios"#).unwrap()).len(), 1);
    assert_eq!(matches(session.run(r#"find "name:luis""#).unwrap()).len(), 1);

    // A second session over the same catalog keeps its own selection.
    let mut other = Interpreter::with_catalog(catalog);
    assert_eq!(other.run("list collections").unwrap_err().kind, ErrorKind::NoSelection);
    other.run("select db ventas").unwrap();
    assert_eq!(matches(other.run(r#"find "name:luis""#).unwrap()).len(), 1);
}

#[cfg(unix)]
#[test]
fn second_open_of_the_same_store_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::default().with_storage_path(dir.path());
    let _first = Interpreter::open(config.clone()).unwrap();
    let err = Interpreter::open(config.clone()).err().unwrap();
    assert_eq!(err.kind, ErrorKind::InvalidState);

    let unlocked = Interpreter::open(config.with_lock_storage(false));
    assert!(unlocked.is_ok());
}
