use super::*;

#[test]
fn equal_wire_form() {
    let q = Query::equal("userId", "u1");
    assert_eq!(q.to_param(), r#"{"method":"equal","attribute":"userId","values":["u1"]}"#);
}

#[test]
fn search_wire_form() {
    let q = Query::search("title", "mountain lake");
    assert_eq!(q.to_param(), r#"{"method":"search","attribute":"title","values":["mountain lake"]}"#);
}

#[test]
fn order_wire_forms() {
    assert_eq!(Query::order_desc("$createdAt").to_param(), r#"{"method":"orderDesc","attribute":"$createdAt"}"#);
    assert_eq!(Query::order_asc("likes").to_param(), r#"{"method":"orderAsc","attribute":"likes"}"#);
}

#[test]
fn limit_and_offset_wire_forms() {
    assert_eq!(Query::limit(12).to_param(), r#"{"method":"limit","values":[12]}"#);
    assert_eq!(Query::offset(24).to_param(), r#"{"method":"offset","values":[24]}"#);
}

#[test]
fn equal_accepts_non_string_values() {
    let q = Query::equal("likes", 3);
    assert_eq!(q.to_param(), r#"{"method":"equal","attribute":"likes","values":[3]}"#);
}

// =============================================================================
// Page
// =============================================================================

#[test]
fn page_defaults() {
    let page = Page::new(None, None, 12);
    assert_eq!(page, Page { page: 1, limit: 12 });
    assert_eq!(page.offset(), 0);
}

#[test]
fn page_offset_is_zero_based() {
    assert_eq!(Page::new(Some(3), Some(12), 12).offset(), 24);
}

#[test]
fn page_zero_is_clamped_to_first() {
    assert_eq!(Page::new(Some(0), None, 20).page, 1);
}

#[test]
fn limit_is_clamped() {
    assert_eq!(Page::new(None, Some(0), 12).limit, 1);
    assert_eq!(Page::new(None, Some(10_000), 12).limit, Page::MAX_LIMIT);
}

#[test]
fn page_queries() {
    let [limit, offset] = Page::new(Some(2), Some(10), 12).queries();
    assert_eq!(limit, Query::limit(10));
    assert_eq!(offset, Query::offset(10));
}
