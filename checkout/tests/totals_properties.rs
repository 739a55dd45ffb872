//! Property tests for order totals

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use eventdesk_checkout::types::{CartItem, Discount, Money, TaxRate, Totals};
use proptest::prelude::*;

fn cart_item() -> impl Strategy<Value = CartItem> {
    (0u64..5_000_000, 1u32..20).prop_map(|(cents, quantity)| {
        CartItem::new("evt", "Event", Money::from_cents(cents), quantity)
    })
}

fn discount() -> impl Strategy<Value = Discount> {
    (0u32..=100).prop_map(|percent| Discount {
        code: "CODE".to_string(),
        percentage: f64::from(percent),
        description: String::new(),
    })
}

proptest! {
    #[test]
    fn total_is_discounted_subtotal_plus_tax(
        items in prop::collection::vec(cart_item(), 0..8),
        discount in prop::option::of(discount()),
    ) {
        let totals = Totals::compute(&items, discount.as_ref(), TaxRate::STANDARD);

        prop_assert!(totals.discount_amount <= totals.subtotal);

        let taxable = totals.subtotal.cents() - totals.discount_amount.cents();
        prop_assert_eq!(totals.total.cents(), taxable + totals.tax.cents());

        // 8% of the taxable amount, rounded half-up to the cent
        prop_assert_eq!(totals.tax.cents(), (taxable * 8 + 50) / 100);
    }

    #[test]
    fn removing_a_discount_restores_undiscounted_totals(
        items in prop::collection::vec(cart_item(), 1..8),
        discount in discount(),
    ) {
        let before = Totals::compute(&items, None, TaxRate::STANDARD);
        let discounted = Totals::compute(&items, Some(&discount), TaxRate::STANDARD);
        let after = Totals::compute(&items, None, TaxRate::STANDARD);

        prop_assert_eq!(before, after);
        prop_assert!(discounted.total <= before.total);
        prop_assert_eq!(discounted.subtotal, before.subtotal);
    }

    #[test]
    fn subtotal_is_sum_of_line_totals(items in prop::collection::vec(cart_item(), 0..8)) {
        let expected: u64 = items
            .iter()
            .map(|item| item.price.cents() * u64::from(item.quantity))
            .sum();

        let totals = Totals::compute(&items, None, TaxRate::STANDARD);

        prop_assert_eq!(totals.subtotal.cents(), expected);
        prop_assert_eq!(totals.discount_amount, Money::ZERO);
    }
}

#[test]
fn worked_example() {
    let items = vec![CartItem::new("evt-1", "Jazz Night", Money::from_major(100), 1)];
    let discount = Discount {
        code: "SAVE10".to_string(),
        percentage: 10.0,
        description: String::new(),
    };

    let totals = Totals::compute(&items, Some(&discount), TaxRate::STANDARD);

    assert_eq!(totals.discount_amount.to_string(), "10.00");
    assert_eq!(totals.tax.to_string(), "7.20");
    assert_eq!(totals.total.to_string(), "97.20");
}
