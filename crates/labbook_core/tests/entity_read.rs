use labbook_core::db::open_db_in_memory;
use labbook_core::{
    execute, execute_named, read, DateFilter, EntityKind, ErrorCategory, FieldValue, FilterSet,
    OrderField, ReadResult, Record, SortDirection, SqliteRecordStore,
};
use rusqlite::Connection;

const SEED_SQL: &str = "
INSERT INTO teams (id, name) VALUES (1, 'Bench'), (2, 'Cell');
INSERT INTO users (userid, team, firstname, lastname, is_admin) VALUES
    (5, 1, 'Ada', 'Byron', 0),
    (7, 1, 'Rosalind', 'Franklin', 0),
    (9, 2, 'Barbara', 'McClintock', 1);
INSERT INTO status (id, team, name, color) VALUES
    (1, 1, 'Running', '29AEB9'),
    (2, 1, 'Success', '54AA08');
INSERT INTO items_types (id, team, name, color) VALUES
    (1, 1, 'Antibody', 'AA0000'),
    (2, 1, 'Equipment', '00AA00'),
    (3, 2, 'Strain', '0000AA');
INSERT INTO experiments (id, team, userid, title, date, body, status, visibility) VALUES
    (1, 1, 5, 'PCR of gene A', 20240105, 'agarose gel 1%', 1, 'team'),
    (2, 1, 7, 'Western blot', 20240110, 'transfer 100 percent done', 2, 'public'),
    (3, 1, 5, 'Cloning_v2', 20240120, 'ligation', 1, 'user'),
    (4, 2, 9, 'Yeast screen', 20240115, 'plates', NULL, 'organization');
INSERT INTO experiments_tags (tag, item_id, userid) VALUES
    ('pcr', 1, 5), ('gene-a', 1, 5), ('blot', 2, 7), ('pcr', 3, 5), ('pcr', 4, 9);
INSERT INTO uploads (item_id, type, real_name) VALUES
    (1, 'experiments', 'gel.png'),
    (1, 'experiments', 'ladder.png'),
    (2, 'items', 'manual.pdf');
INSERT INTO experiments_comments (exp_id, userid, datetime, comment) VALUES
    (1, 7, '2024-01-06 10:00:00', 'nice bands'),
    (1, 5, '2024-01-07 09:00:00', 'thanks'),
    (2, 5, '2024-01-11 08:00:00', 'which antibody?');
INSERT INTO items (id, team, userid, title, date, body, type, bookable) VALUES
    (1, 1, 5, 'Anti-GFP', 20231201, 'rabbit polyclonal', 1, 0),
    (2, 1, 7, 'Confocal microscope', 20231210, 'room 204', 2, 1),
    (3, 2, 9, 'BY4741', 20231111, 'haploid', 3, 0);
INSERT INTO items_tags (tag, item_id, team) VALUES
    ('antibody', 1, 1), ('gfp', 1, 1), ('equipment', 2, 1);
";

fn seeded() -> Connection {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(SEED_SQL).unwrap();
    conn
}

fn ids(records: &[Record]) -> Vec<i64> {
    records.iter().map(|record| record.id().unwrap()).collect()
}

fn find(records: &[Record], id: i64) -> &Record {
    records
        .iter()
        .find(|record| record.id().unwrap() == id)
        .expect("record should be present")
}

#[test]
fn experiments_are_team_scoped_and_default_to_id_desc() {
    let conn = seeded();
    let store = SqliteRecordStore::new(&conn);

    let team_one = execute(&store, EntityKind::Experiments, &FilterSet::new(), 1).unwrap();
    assert_eq!(ids(&team_one), vec![3, 2, 1]);

    let team_two = execute(&store, EntityKind::Experiments, &FilterSet::new(), 2).unwrap();
    assert_eq!(ids(&team_two), vec![4]);
}

#[test]
fn tags_attachments_and_comments_do_not_multiply_rows() {
    let conn = seeded();
    let store = SqliteRecordStore::new(&conn);

    let records = execute(&store, EntityKind::Experiments, &FilterSet::new(), 1).unwrap();
    assert_eq!(records.len(), 3);

    let pcr = find(&records, 1);
    assert_eq!(pcr.text("category").unwrap(), Some("Running"));
    assert_eq!(pcr.text("color").unwrap(), Some("29AEB9"));
    assert_eq!(pcr.get("has_attachment"), Some(&FieldValue::Integer(1)));
    assert_eq!(
        pcr.text("last_comment").unwrap(),
        Some("2024-01-07 09:00:00")
    );

    let cloning = find(&records, 3);
    assert_eq!(cloning.get("has_attachment"), Some(&FieldValue::Integer(0)));
    assert_eq!(cloning.get("last_comment"), Some(&FieldValue::Null));
}

#[test]
fn attachments_are_matched_on_their_own_kind_only() {
    let conn = seeded();
    let store = SqliteRecordStore::new(&conn);

    let experiments = execute(&store, EntityKind::Experiments, &FilterSet::new(), 1).unwrap();
    assert_eq!(
        find(&experiments, 2).get("has_attachment"),
        Some(&FieldValue::Integer(0))
    );

    let items = execute(&store, EntityKind::Items, &FilterSet::new(), 1).unwrap();
    assert_eq!(
        find(&items, 2).get("has_attachment"),
        Some(&FieldValue::Integer(1))
    );
    assert_eq!(
        find(&items, 1).get("has_attachment"),
        Some(&FieldValue::Integer(0))
    );
}

#[test]
fn items_view_carries_type_metadata_and_owner_name() {
    let conn = seeded();
    let store = SqliteRecordStore::new(&conn);

    let items = execute(&store, EntityKind::Items, &FilterSet::new(), 1).unwrap();
    assert_eq!(ids(&items), vec![2, 1]);

    let microscope = find(&items, 2);
    assert_eq!(
        microscope.text("fullname").unwrap(),
        Some("Rosalind Franklin")
    );
    assert_eq!(microscope.text("category").unwrap(), Some("Equipment"));

    let team_two = execute(&store, EntityKind::Items, &FilterSet::new(), 2).unwrap();
    assert_eq!(ids(&team_two), vec![3]);
}

#[test]
fn tag_filter_matches_within_team_without_duplicates() {
    let conn = seeded();
    let store = SqliteRecordStore::new(&conn);

    let mut filters = FilterSet::new();
    filters.set_tag_filter("pcr").unwrap();
    let tagged = execute(&store, EntityKind::Experiments, &filters, 1).unwrap();
    assert_eq!(ids(&tagged), vec![3, 1]);

    filters.set_title_filter("PCR").unwrap();
    match read(&store, EntityKind::Experiments, &filters, 1).unwrap() {
        ReadResult::Single(record) => assert_eq!(record.id().unwrap(), 1),
        other => panic!("expected a single record, got {other:?}"),
    }
}

#[test]
fn free_text_query_treats_wildcards_literally() {
    let conn = seeded();
    let store = SqliteRecordStore::new(&conn);

    let mut percent = FilterSet::new();
    percent.set_query_filter("1%").unwrap();
    let matched = execute(&store, EntityKind::Experiments, &percent, 1).unwrap();
    assert_eq!(ids(&matched), vec![1]);

    let mut underscore = FilterSet::new();
    underscore.set_title_filter("PCR_of").unwrap();
    let matched = execute(&store, EntityKind::Experiments, &underscore, 1).unwrap();
    assert!(matched.is_empty());

    let mut by_date = FilterSet::new();
    by_date.set_query_filter("202401").unwrap();
    let matched = execute(&store, EntityKind::Experiments, &by_date, 1).unwrap();
    assert_eq!(ids(&matched), vec![3, 2, 1]);
}

#[test]
fn hostile_filter_values_are_bound_not_spliced() {
    let conn = seeded();
    let store = SqliteRecordStore::new(&conn);

    let mut filters = FilterSet::new();
    filters.set_title_filter("x' OR 1=1 --").unwrap();
    filters.set_tag_filter("pcr' OR '1'='1").unwrap();
    let matched = execute(&store, EntityKind::Experiments, &filters, 1).unwrap();
    assert!(matched.is_empty());
}

#[test]
fn date_body_and_category_filters_combine() {
    let conn = seeded();
    let store = SqliteRecordStore::new(&conn);

    let mut range = FilterSet::new();
    range
        .set_date_filter(DateFilter::Between(20240101, 20240112))
        .unwrap();
    assert_eq!(
        ids(&execute(&store, EntityKind::Experiments, &range, 1).unwrap()),
        vec![2, 1]
    );

    let mut since = FilterSet::new();
    since.set_date_filter(DateFilter::From(20240110)).unwrap();
    assert_eq!(
        ids(&execute(&store, EntityKind::Experiments, &since, 1).unwrap()),
        vec![3, 2]
    );

    let mut running = FilterSet::new();
    running.set_category_filter(1).unwrap();
    running.set_body_filter("ligation").unwrap();
    assert_eq!(
        ids(&execute(&store, EntityKind::Experiments, &running, 1).unwrap()),
        vec![3]
    );
}

#[test]
fn bookable_and_owner_filters_apply_per_kind() {
    let conn = seeded();
    let store = SqliteRecordStore::new(&conn);

    let mut bookable = FilterSet::new();
    bookable.set_bookable_filter();
    assert_eq!(
        ids(&execute(&store, EntityKind::Items, &bookable, 1).unwrap()),
        vec![2]
    );
    let err = execute(&store, EntityKind::Experiments, &bookable, 1).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::InvalidArgument);

    let mut mine = FilterSet::new();
    mine.set_owner_filter(5).unwrap();
    assert_eq!(
        ids(&execute(&store, EntityKind::Experiments, &mine, 1).unwrap()),
        vec![3, 1]
    );
}

#[test]
fn order_sort_and_pagination() {
    let conn = seeded();
    let store = SqliteRecordStore::new(&conn);

    let mut by_title = FilterSet::new();
    by_title.set_order(OrderField::Title);
    by_title.set_sort(SortDirection::Asc);
    assert_eq!(
        ids(&execute(&store, EntityKind::Experiments, &by_title, 1).unwrap()),
        vec![3, 1, 2]
    );

    let mut by_comment = FilterSet::new();
    by_comment.set_order(OrderField::LastComment);
    assert_eq!(
        ids(&execute(&store, EntityKind::Experiments, &by_comment, 1).unwrap()),
        vec![2, 1, 3]
    );

    let mut by_category = FilterSet::new();
    by_category.set_order_name("category").unwrap();
    by_category.set_sort_name("asc").unwrap();
    assert_eq!(
        ids(&execute(&store, EntityKind::Items, &by_category, 1).unwrap()),
        vec![1, 2]
    );

    let mut paged = FilterSet::new();
    paged.set_limit(2);
    assert_eq!(
        ids(&execute(&store, EntityKind::Experiments, &paged, 1).unwrap()),
        vec![3, 2]
    );
    paged.set_offset(1);
    paged.set_limit(1);
    assert_eq!(
        ids(&execute(&store, EntityKind::Experiments, &paged, 1).unwrap()),
        vec![2]
    );

    let mut unlimited = FilterSet::new();
    unlimited.set_limit(0);
    assert_eq!(
        execute(&store, EntityKind::Experiments, &unlimited, 1)
            .unwrap()
            .len(),
        3
    );
}

#[test]
fn single_row_collapses_while_collections_stay_sequences() {
    let conn = seeded();
    let store = SqliteRecordStore::new(&conn);

    let mut filters = FilterSet::new();
    filters.set_tag_filter("pcr").unwrap();
    let collection = read(&store, EntityKind::Experiments, &filters, 1).unwrap();
    assert!(matches!(collection, ReadResult::Many(ref rows) if rows.len() == 2));

    filters.set_id_filter(3).unwrap();
    let single = read(&store, EntityKind::Experiments, &filters, 1).unwrap();
    assert!(matches!(single, ReadResult::Single(_)));

    let mut foreign = FilterSet::new();
    foreign.set_id_filter(4).unwrap();
    let hidden = read(&store, EntityKind::Experiments, &foreign, 1).unwrap();
    assert!(hidden.is_empty());
}

#[test]
fn named_reads_reject_unsupported_kinds() {
    let conn = seeded();
    let store = SqliteRecordStore::new(&conn);

    let err = execute_named(&store, "status", &FilterSet::new(), 1).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Query);

    let items = execute_named(&store, "database", &FilterSet::new(), 1).unwrap();
    assert_eq!(ids(&items), vec![2, 1]);
}
