//! Resolver behavior over mock ports: status mapping, eligibility,
//! substitution, and multi-product ingredient lines.

use larder::cart::resolver::{resolve_ingredient, ExtractedProduct, ResolveContext};
use larder::ports::{
    FulfillmentEligibility, FulfillmentMethod, Product, StockLevel, StockReport,
};
use larder::testing::mocks::MockPorts;
use larder::workflow::{ItemStatus, RawIngredient};

fn ctx() -> ResolveContext {
    ResolveContext {
        fulfillment: FulfillmentMethod::Pickup,
        store_location_id: Some("store-1".to_string()),
    }
}

fn ingredient(text: &str) -> RawIngredient {
    RawIngredient {
        original_text: text.to_string(),
        recipe_name: "Test Recipe".to_string(),
    }
}

fn extracted(product: &str, quantity: i64) -> ExtractedProduct {
    ExtractedProduct {
        product: Some(product.to_string()),
        quantity: Some(quantity),
    }
}

fn product(catalog_id: &str, stock: StockReport, pickup: Option<bool>) -> Product {
    Product {
        catalog_id: catalog_id.to_string(),
        description: format!("Product {catalog_id}"),
        size: Some("1 each".to_string()),
        stock,
        fulfillment: FulfillmentEligibility {
            pickup,
            delivery: None,
        },
    }
}

fn in_stock(level: StockLevel) -> StockReport {
    StockReport::Level(level)
}

#[tokio::test]
async fn empty_search_is_not_found_and_commits_nothing() {
    let mocks = MockPorts::new();
    let items = resolve_ingredient(
        &mocks.ports(),
        &ctx(),
        &ingredient("1 unicorn fruit"),
        Some(vec![extracted("unicorn fruit", 1)]),
    )
    .await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].status, ItemStatus::NotFound);
    assert!(mocks.retail.cart_adds().is_empty());
}

#[tokio::test]
async fn all_ineligible_candidates_yield_unavailable() {
    let mocks = MockPorts::new();
    mocks.retail.stock_products(
        "milk",
        vec![
            product("p-1", in_stock(StockLevel::High), Some(false)),
            product("p-2", in_stock(StockLevel::Low), Some(false)),
        ],
    );

    let items = resolve_ingredient(
        &mocks.ports(),
        &ctx(),
        &ingredient("1 cup milk"),
        Some(vec![extracted("milk", 1)]),
    )
    .await;

    assert_eq!(items[0].status, ItemStatus::Unavailable);
    assert!(mocks.retail.cart_adds().is_empty());
}

#[tokio::test]
async fn ineligible_top_choice_substitutes_a_lower_candidate() {
    let mocks = MockPorts::new();
    mocks.retail.stock_products(
        "milk",
        vec![
            product("p-1", in_stock(StockLevel::High), Some(false)),
            product("p-2", in_stock(StockLevel::Medium), Some(true)),
        ],
    );

    let items = resolve_ingredient(
        &mocks.ports(),
        &ctx(),
        &ingredient("1 cup milk"),
        Some(vec![extracted("milk", 1)]),
    )
    .await;

    assert_eq!(items[0].status, ItemStatus::Added);
    assert_eq!(
        items[0].error.as_deref(),
        Some("substituted (first choice unavailable)")
    );
    let adds = mocks.retail.cart_adds();
    assert_eq!(adds.len(), 1);
    assert_eq!(adds[0].0, "p-2");
}

#[tokio::test]
async fn unknown_stock_is_a_last_resort_substitution() {
    let mocks = MockPorts::new();
    mocks
        .retail
        .stock_products("milk", vec![product("p-1", StockReport::Unlisted, Some(true))]);

    let items = resolve_ingredient(
        &mocks.ports(),
        &ctx(),
        &ingredient("1 cup milk"),
        Some(vec![extracted("milk", 1)]),
    )
    .await;

    assert_eq!(items[0].status, ItemStatus::Added);
    assert_eq!(
        items[0].error.as_deref(),
        Some("substituted (first choice unavailable)")
    );
}

#[tokio::test]
async fn explicit_stock_wins_over_earlier_unknown_stock() {
    let mocks = MockPorts::new();
    mocks.retail.stock_products(
        "milk",
        vec![
            product("p-1", StockReport::Unlisted, Some(true)),
            product("p-2", in_stock(StockLevel::High), Some(true)),
        ],
    );

    let items = resolve_ingredient(
        &mocks.ports(),
        &ctx(),
        &ingredient("1 cup milk"),
        Some(vec![extracted("milk", 1)]),
    )
    .await;

    assert_eq!(items[0].status, ItemStatus::Added);
    assert_eq!(mocks.retail.cart_adds()[0].0, "p-2");
}

#[tokio::test]
async fn out_of_stock_candidates_are_never_committed() {
    let mocks = MockPorts::new();
    mocks.retail.stock_products(
        "milk",
        vec![product(
            "p-1",
            StockReport::Other("TEMPORARILY_OUT_OF_STOCK".to_string()),
            Some(true),
        )],
    );

    let items = resolve_ingredient(
        &mocks.ports(),
        &ctx(),
        &ingredient("1 cup milk"),
        Some(vec![extracted("milk", 1)]),
    )
    .await;

    assert_eq!(items[0].status, ItemStatus::Unavailable);
    assert!(mocks.retail.cart_adds().is_empty());
}

#[tokio::test]
async fn out_of_stock_top_choice_substitutes_a_stocked_candidate() {
    let mocks = MockPorts::new();
    mocks.retail.stock_products(
        "milk",
        vec![
            product(
                "p-1",
                StockReport::Other("TEMPORARILY_OUT_OF_STOCK".to_string()),
                Some(true),
            ),
            product("p-2", in_stock(StockLevel::Low), Some(true)),
        ],
    );

    let items = resolve_ingredient(
        &mocks.ports(),
        &ctx(),
        &ingredient("1 cup milk"),
        Some(vec![extracted("milk", 1)]),
    )
    .await;

    assert_eq!(items[0].status, ItemStatus::Added);
    assert_eq!(
        items[0].error.as_deref(),
        Some("substituted (first choice unavailable)")
    );
    assert_eq!(mocks.retail.cart_adds()[0].0, "p-2");
}

#[tokio::test]
async fn unlisted_stock_beats_an_out_of_stock_candidate() {
    // An explicit out-of-stock value must not be confused with a product
    // the catalog simply didn't report stock for.
    let mocks = MockPorts::new();
    mocks.retail.stock_products(
        "milk",
        vec![
            product(
                "p-1",
                StockReport::Other("TEMPORARILY_OUT_OF_STOCK".to_string()),
                Some(true),
            ),
            product("p-2", StockReport::Unlisted, Some(true)),
        ],
    );

    let items = resolve_ingredient(
        &mocks.ports(),
        &ctx(),
        &ingredient("1 cup milk"),
        Some(vec![extracted("milk", 1)]),
    )
    .await;

    assert_eq!(items[0].status, ItemStatus::Added);
    assert_eq!(mocks.retail.cart_adds()[0].0, "p-2");
}

#[tokio::test]
async fn one_line_can_yield_independent_entries() {
    let mocks = MockPorts::new();
    mocks.text_gen.respond_when(
        "salt and pepper to taste",
        r#"[{"product": "salt", "quantity": 1}, {"product": "black pepper", "quantity": 1}]"#,
    );
    // Only salt is in the catalog; pepper's failure must not block it.
    mocks
        .retail
        .stock_products("salt", vec![product("p-salt", in_stock(StockLevel::High), None)]);

    let items = resolve_ingredient(
        &mocks.ports(),
        &ctx(),
        &ingredient("salt and pepper to taste"),
        None,
    )
    .await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].item, "salt");
    assert_eq!(items[0].status, ItemStatus::Added);
    assert_eq!(items[1].item, "black pepper");
    assert_eq!(items[1].status, ItemStatus::NotFound);
    assert_eq!(mocks.retail.cart_adds().len(), 1);
}

#[tokio::test]
async fn unparsable_extraction_falls_back_to_the_raw_line() {
    let mocks = MockPorts::new();
    mocks.text_gen.set_default_response("no json here");
    mocks.retail.stock_products(
        "2 cups mystery flour",
        vec![product("p-1", in_stock(StockLevel::High), None)],
    );

    let items = resolve_ingredient(
        &mocks.ports(),
        &ctx(),
        &ingredient("2 cups mystery flour"),
        None,
    )
    .await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].item, "2 cups mystery flour");
    assert_eq!(items[0].quantity, 1);
    assert_eq!(items[0].status, ItemStatus::Added);
    assert_eq!(
        mocks.retail.search_calls(),
        vec!["2 cups mystery flour"]
    );
}

#[tokio::test]
async fn cart_rejection_is_reported_as_failed() {
    let mocks = MockPorts::new();
    mocks.retail.fail_cart_adds();
    mocks
        .retail
        .stock_products("milk", vec![product("p-1", in_stock(StockLevel::High), None)]);

    let items = resolve_ingredient(
        &mocks.ports(),
        &ctx(),
        &ingredient("1 cup milk"),
        Some(vec![extracted("milk", 1)]),
    )
    .await;

    assert_eq!(items[0].status, ItemStatus::Failed);
    assert!(items[0].error.is_some());
    assert_eq!(items[0].product.as_deref(), Some("Product p-1"));
}
