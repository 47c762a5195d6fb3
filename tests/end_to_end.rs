mod common;

use std::fs;
use std::sync::Arc;

use batchrun::errors::BatchrunError;
use batchrun::pipeline::execute;
use batchrun_test_utils::builders::{ConfigBuilder, RecipeBuilder};
use batchrun_test_utils::fake_invoker::{FailWhen, FakeInvoker};
use batchrun_test_utils::with_timeout;
use common::{init_tracing, Workspace};
use rusqlite::Connection;

#[tokio::test]
async fn run_groups_and_exports_every_format() {
    init_tracing();
    let ws = Workspace::new();
    ws.install_binary("leaf_count");
    ws.install_binary("height");
    ws.add_images(&["A_G7_1.jpg", "A_G7_2.jpg", "B_G8_1.png", "notes.txt"]);

    let db_path = ws.root().join("results.sqlite");
    Connection::open(&db_path)
        .unwrap()
        .execute("CREATE TABLE phenotypes (image TEXT PRIMARY KEY)", [])
        .unwrap();

    let config = ConfigBuilder::new(ws.output_dir())
        .batch_size(2)
        .naming_convention("species_genotype_rep")
        .database(&db_path, "phenotypes")
        .build();
    let recipe = RecipeBuilder::new()
        .command("leaf-count")
        .command("height")
        .white_background(true)
        .separate_by("genotype")
        .csv()
        .json()
        .database()
        .build();

    let fake = FakeInvoker::new();
    let ctx = ws.context(config, recipe, Arc::new(fake.clone()));
    let summary = with_timeout(execute(ctx)).await.unwrap();

    assert_eq!(summary.images, 3);
    assert_eq!(summary.table.len(), 3);
    assert_eq!(summary.table.get("A_G7_1", "leaf_count"), Some("leaf_count:A_G7_1"));
    assert!(summary.dispatch.is_clean());
    assert!(summary.export.is_clean());
    assert_eq!(summary.export.database_rows, Some(3));

    assert!(fake
        .calls()
        .iter()
        .all(|c| c.flags == vec!["--white-background".to_string()]));

    let g7 = fs::read_to_string(ws.output_dir().join("g7.csv")).unwrap();
    assert_eq!(
        g7,
        "image,height,leaf_count\n\
         A_G7_1,height:A_G7_1,leaf_count:A_G7_1\n\
         A_G7_2,height:A_G7_2,leaf_count:A_G7_2\n"
    );
    assert!(ws.output_dir().join("g8.json").is_file());
    assert!(!ws.output_dir().join("results.csv").exists());

    let rows: i64 = Connection::open(&db_path)
        .unwrap()
        .query_row("SELECT COUNT(*) FROM phenotypes", [], |r| r.get(0))
        .unwrap();
    assert_eq!(rows, 3);
}

#[tokio::test]
async fn failed_batches_leave_empty_cells() {
    let ws = Workspace::new();
    ws.install_binary("m1");
    ws.add_images(&["a.jpg", "b.jpg", "c.jpg", "d.jpg"]);

    let config = ConfigBuilder::new(ws.output_dir()).batch_size(4).build();
    let recipe = RecipeBuilder::new().command("m1").csv().build();

    let fake = FakeInvoker::new().fail_when(FailWhen::Contains("a.jpg".to_string()));
    let summary = execute(ws.context(config, recipe, Arc::new(fake)))
        .await
        .unwrap();

    assert_eq!(summary.table.len(), 2);
    assert_eq!(summary.dispatch.batch_failures.len(), 1);
    let csv = fs::read_to_string(ws.output_dir().join("results.csv")).unwrap();
    assert_eq!(csv, "image,m1\nc,m1:c\nd,m1:d\n");
}

#[tokio::test]
async fn unknown_grouping_token_stops_before_dispatch() {
    let ws = Workspace::new();
    ws.install_binary("m1");
    ws.add_images(&["a_b_c.jpg"]);

    let config = ConfigBuilder::new(ws.output_dir())
        .naming_convention("species_genotype_rep")
        .build();
    let recipe = RecipeBuilder::new().command("m1").csv().separate_by("treatment").build();

    let fake = FakeInvoker::new();
    let err = execute(ws.context(config, recipe, Arc::new(fake.clone())))
        .await
        .unwrap_err();

    assert!(matches!(err, BatchrunError::ConfigError(_)));
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn database_export_without_database_config_is_fatal() {
    let ws = Workspace::new();
    ws.add_images(&["a.jpg"]);

    let config = ConfigBuilder::new(ws.output_dir()).build();
    let recipe = RecipeBuilder::new().command("m1").database().build();

    let err = execute(ws.context(config, recipe, Arc::new(FakeInvoker::new())))
        .await
        .unwrap_err();
    assert!(matches!(err, BatchrunError::ConfigError(_)));
}

#[tokio::test]
async fn empty_upload_dir_is_fatal() {
    let ws = Workspace::new();
    ws.install_binary("m1");

    let config = ConfigBuilder::new(ws.output_dir()).build();
    let recipe = RecipeBuilder::new().command("m1").csv().build();

    let err = execute(ws.context(config, recipe, Arc::new(FakeInvoker::new())))
        .await
        .unwrap_err();
    assert!(matches!(err, BatchrunError::NoImages(_)));
}
