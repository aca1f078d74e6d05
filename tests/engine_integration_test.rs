// ==========================================
// 引擎层集成测试
// ==========================================
// 测试目标: 排序令牌、表头链接、分页链接与过滤链在内存记录表上的组合
// ==========================================


use report_grid::domain::Query;
use report_grid::engine::header::row_header;
use report_grid::engine::paginator::PageLink;
use report_grid::{FilterChain, MemoryTable, Paginator, QuerySource, SortCodec, Value};
use test_helpers::{demand_definition, record, request};

fn table() -> MemoryTable {
    let rows = [("alpha", "w", 3), ("bravo", "w", 9), ("delta", "x", 9), ("Dune", "y", 1)];
    MemoryTable::new("demand", "name").with_records(rows.iter().map(|(name, item, qty)| {
        record(&[
            ("name", Value::text(*name)),
            ("item", Value::text(*item)),
            ("qty", Value::Integer(*qty)),
        ])
    }))
}

#[test]
fn test_sort_token_drives_ordering_with_default_tie_break() {
    let def = demand_definition();
    let codec = SortCodec::new(&def);
    let key = codec.decode(Some("3d")).key();
    assert_eq!(codec.positional_sql(key), "3 desc, 1 asc");

    let names: Vec<String> = table()
        .fetch(&Query::new(Vec::new(), codec.ordering(key)))
        .unwrap()
        .map(|r| r.unwrap()["name"].to_string())
        .collect();
    assert_eq!(names, vec!["bravo", "delta", "alpha", "Dune"]);
}

#[test]
fn test_case_insensitive_filters_over_memory_table() {
    let ctx = request("name__istartswith=d&qty__gt=2");
    let chain = FilterChain::from_params(&ctx.params).unwrap();
    let source = table();
    assert_eq!(source.count(chain.predicates()).unwrap(), 1);

    let ctx = request("name__startswith=d");
    let chain = FilterChain::from_params(&ctx.params).unwrap();
    assert_eq!(source.count(chain.predicates()).unwrap(), 1);
}

#[test]
fn test_header_links_reset_paging() {
    let def = demand_definition();
    let ctx = request("o=3a&p=3&name__icontains=d");
    let key = SortCodec::new(&def).decode(ctx.params.get("o")).key();
    let header = row_header(&def, key, &ctx);
    for cell in header.cells() {
        let href = cell.href.as_deref().unwrap();
        assert!(!href.contains("p=3"), "{}", href);
        assert!(href.contains("name__icontains=d"), "{}", href);
    }
    let qty = header.cells().find(|c| c.index == 3).unwrap();
    assert!(qty.href.as_deref().unwrap().contains("o=3d"));
}

#[test]
fn test_first_page_link_omits_page_parameter() {
    let paginator = Paginator::new(2);
    let ctx = request("o=2a&p=3");
    let window = paginator.window(10, 3).unwrap();
    let links = paginator.links(&window, &ctx);
    assert_eq!(links.len(), 5);
    assert_eq!(links[2], PageLink::Current(3));
    match &links[0] {
        PageLink::Link { page, href } => {
            assert_eq!(*page, 1);
            assert_eq!(href, "/demand/?o=2a");
        }
        other => panic!("unexpected link {:?}", other),
    }
}
