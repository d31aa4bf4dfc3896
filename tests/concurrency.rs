use std::sync::Arc;
use std::thread;
use machdb::{fields, Catalog, Config, Filter};

const WRITERS: usize = 4;
const INSERTS: i64 = 200;

fn collection(writer: usize) -> String {
    format!("clientes_{}", writer)
}

#[test]
fn writers_and_readers_share_one_catalog() {
    let catalog = Arc::new(Catalog::new(Config::default()));
    catalog.create_database("ventas").unwrap();
    for writer in 0..WRITERS {
        catalog.create_collection("ventas", &collection(writer)).unwrap();
        catalog.create_document("ventas", &collection(writer), "registro").unwrap();
    }

    thread::scope(|s| {
        for writer in 0..WRITERS {
            let catalog = Arc::clone(&catalog);
            s.spawn(move || {
                let coll = collection(writer);
                let scratch = format!("scratch_{}", writer);
                let mut ids = Vec::new();
                for n in 0..INSERTS {
                    let object = fields([("n", n % 10), ("writer", writer as i64)]);
                    ids.push(catalog.insert_object("ventas", &coll, "registro", object).unwrap());

                    if n % 10 == 9 {
                        let threes = Filter::from(fields([("n", 3i64)]));
                        catalog.delete_objects("ventas", &coll, "registro", &threes).unwrap();
                    }
                    if n % 50 == 0 {
                        catalog.create_collection("ventas", &scratch).unwrap();
                        catalog.create_document("ventas", &scratch, "tmp").unwrap();
                        catalog
                            .insert_object("ventas", &scratch, "tmp", fields([("writer", writer as i64)]))
                            .unwrap();
                        catalog.delete_collection("ventas", &scratch).unwrap();
                    }
                }
                assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids out of order for writer {}", writer);
            });
        }

        for _ in 0..2 {
            let catalog = Arc::clone(&catalog);
            s.spawn(move || {
                for _ in 0..100 {
                    let _ = catalog.find("writer", "0", "ventas", &[] as &[&str]);
                    catalog.verify_index().unwrap();
                    assert!(catalog.list_collections("ventas").unwrap().len() >= WRITERS);
                }
            });
        }
    });

    catalog.verify_index().unwrap();
    assert_eq!(catalog.list_collections("ventas").unwrap().len(), WRITERS);
    for writer in 0..WRITERS {
        let objects = catalog.objects("ventas", &collection(writer), "registro").unwrap();
        // every object with n == 3 was deleted by the writer's own sweeps
        assert_eq!(objects.len(), (INSERTS - INSERTS / 10) as usize);
        assert!(objects.windows(2).all(|w| w[0].id < w[1].id));
        assert_eq!(objects.last().unwrap().id, (INSERTS - 1) as u64);

        let found = catalog.find("writer", &writer.to_string(), "ventas", &[collection(writer)]).unwrap();
        assert_eq!(found.len(), objects.len());
    }
}
