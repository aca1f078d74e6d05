// ==========================================
// ReportApi 集成测试
// ==========================================
// 测试目标: 基于 SQLite 记录表的分页渲染、过滤、排序回退、时间桶偏好
// ==========================================


use report_grid::engine::header::SortState;
use report_grid::engine::paginator::{PageItem, PageLink, Paginator};
use report_grid::repository::{BucketRepository, PreferenceRepository};
use report_grid::{
    ApiError, BucketSpec, ConfigManager, MemoryTable, RecordAccess, ReportApi, SqliteTable, Value,
};
use test_helpers::{
    create_test_db, date, demand_definition, inventory_definition, open_test_connection, record,
    request, seed_demand,
};

fn demand_api(db_path: &str) -> ReportApi {
    let manager = ConfigManager::new(db_path).expect("创建 ConfigManager 失败");
    ReportApi::from_config_manager(&manager).expect("创建 ReportApi 失败")
}

fn names<R: RecordAccess>(rows: &[R]) -> Vec<String> {
    rows.iter().map(|r| r.get_value("name").to_string()).collect()
}

#[test]
fn test_range_filters_combine_with_and() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    seed_demand(&conn, 25).unwrap();
    let table = SqliteTable::open(conn, "demand", "name").unwrap();
    let api = demand_api(&db_path);
    let def = demand_definition();

    let page = api
        .render_page(&def, &table, &request("qty__gte=5&qty__lte=20&o=3d"), None)
        .unwrap();
    assert_eq!(page.hits, 16);
    assert_eq!(page.full_hits, 25);
    assert_eq!(page.window.total_pages(), 2);
    assert_eq!(
        names(&page.rows),
        (11..=20).rev().map(|i| format!("D{:03}", i)).collect::<Vec<_>>()
    );
    assert_eq!(page.rows[0].get_value("qty"), Value::Integer(20));

    let page = api
        .render_page(&def, &table, &request("qty__gte=5&qty__lte=20&o=3d&p=2"), None)
        .unwrap();
    assert_eq!(page.rows.len(), 6);
    assert_eq!((page.window.start_index(), page.window.end_index()), (11, 16));
}

#[test]
fn test_header_and_links_follow_request() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    seed_demand(&conn, 25).unwrap();
    let table = SqliteTable::open(conn, "demand", "name").unwrap();
    let page = demand_api(&db_path)
        .render_page(&demand_definition(), &table, &request("o=3d&item__exact=item-1"), None)
        .unwrap();

    assert_eq!(page.row_header.frozen.len(), 1);
    assert_eq!(page.row_header.scrollable.len(), 3);
    let qty = page.row_header.cells().find(|c| c.index == 3).unwrap();
    assert_eq!(qty.sort_state, Some(SortState::Descending));
    assert_eq!(qty.title, "Quantity");

    // item-1: 1,4,7,...,25 共 9 条，单页
    assert_eq!(page.hits, 9);
    assert_eq!(page.links, vec![PageLink::Current(1)]);
    let summary = page.filters.unwrap();
    assert_eq!(summary.active.len(), 1);
    assert_eq!(summary.hidden, vec![("o".to_string(), "3d".to_string())]);
}

#[test]
fn test_invalid_sort_token_falls_back_to_default() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    seed_demand(&conn, 3).unwrap();
    let table = SqliteTable::open(conn, "demand", "name").unwrap();
    let page = demand_api(&db_path)
        .render_page(&demand_definition(), &table, &request("o=9d"), None)
        .unwrap();
    assert!(page.sort_fallback);
    assert_eq!(page.sort, "1a");
    assert_eq!(names(&page.rows), vec!["D001", "D002", "D003"]);
}

#[test]
fn test_bad_requests_map_to_status_codes() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    seed_demand(&conn, 3).unwrap();
    let table = SqliteTable::open(conn, "demand", "name").unwrap();
    let api = demand_api(&db_path);
    let def = demand_definition();

    let err = api
        .render_page(&def, &table, &request("qty__between=3"), None)
        .unwrap_err();
    assert_eq!(err.status_code(), 400);

    let err = api
        .render_page(&def, &table, &request("secret__exact=3"), None)
        .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));

    let err = api
        .render_page(&def, &table, &request("p=abc"), None)
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[test]
fn test_single_entity_view() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    seed_demand(&conn, 5).unwrap();
    let table = SqliteTable::open(conn, "demand", "name").unwrap();
    let page = demand_api(&db_path)
        .render_page(&demand_definition(), &table, &request("qty__gte=100"), Some("D004"))
        .unwrap();
    assert_eq!(page.hits, 1);
    assert_eq!(page.full_hits, 5);
    assert_eq!(names(&page.rows), vec!["D004"]);
    assert!(page.filters.is_none());
}

#[test]
fn test_paginator_window_for_large_result() {
    let items = Paginator::new(10).page_numbers(50, 100);
    let mut expected = vec![PageItem::Page(1), PageItem::Page(2), PageItem::Ellipsis];
    expected.extend((47..=53).map(PageItem::Page));
    expected.push(PageItem::Ellipsis);
    expected.extend([PageItem::Page(99), PageItem::Page(100)]);
    assert_eq!(items, expected);
}

#[test]
fn test_pivot_buckets_remembered_per_user() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let manager = ConfigManager::new(&db_path).unwrap();
    manager.set_current_date(date(2024, 1, 1)).unwrap();
    BucketRepository::new(manager.connection())
        .insert_all(
            "week",
            &[
                BucketSpec::new("W1", date(2024, 1, 1), date(2024, 1, 8)),
                BucketSpec::new("W2", date(2024, 1, 8), date(2024, 1, 15)),
                BucketSpec::new("W3", date(2024, 1, 15), date(2024, 1, 22)),
            ],
        )
        .unwrap();
    let api = ReportApi::from_config_manager(&manager).unwrap();
    let def = inventory_definition();
    let source = MemoryTable::new("inventory", "item").with_records(vec![
        record(&[("item", Value::text("A")), ("demand", Value::Integer(3))]),
        record(&[("item", Value::text("B")), ("demand", Value::Integer(1))]),
    ]);

    let ctx = request("reportbucket=week&reportstart=2024-01-08").with_user("alice");
    let page = api.render_page(&def, &source, &ctx, None).unwrap();
    let titles: Vec<&str> = page.column_header.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(titles, vec!["W2", "W3"]);
    assert_eq!(page.cross_header.len(), 2);

    let stored = PreferenceRepository::new(manager.connection())
        .find("alice")
        .unwrap()
        .unwrap();
    assert_eq!(stored.buckets.as_deref(), Some("week"));
    assert_eq!(stored.start_date, Some(date(2024, 1, 8)));

    // 不带参数时沿用偏好
    let page = api
        .render_page(&def, &source, &request("").with_user("alice"), None)
        .unwrap();
    assert_eq!(page.column_header.len(), 2);

    // 其他用户使用默认方案
    let page = api
        .render_page(&def, &source, &request("").with_user("bob"), None)
        .unwrap();
    assert_eq!(page.buckets.unwrap().scheme, "default");
    assert!(page.column_header.is_empty());
}
