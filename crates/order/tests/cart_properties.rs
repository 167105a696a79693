use proptest::prelude::*;

use zatiaras_order::{Cart, LineKey, Product};

#[derive(Debug, Clone)]
enum Op {
    Add { id: u8, size: Option<u8>, price: u32 },
    Remove { id: u8, size: Option<u8> },
    RemoveProduct { id: u8 },
    Update { id: u8, size: Option<u8>, quantity: i64 },
    Clear,
}

fn size_name(size: Option<u8>) -> Option<String> {
    size.map(|s| ["Regular", "Large"][s as usize % 2].to_string())
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..4, proptest::option::of(0u8..2), 1_000u32..60_000)
            .prop_map(|(id, size, price)| Op::Add { id, size, price }),
        1 => (0u8..4, proptest::option::of(0u8..2)).prop_map(|(id, size)| Op::Remove { id, size }),
        1 => (0u8..4).prop_map(|id| Op::RemoveProduct { id }),
        2 => (0u8..4, proptest::option::of(0u8..2), -3i64..20)
            .prop_map(|(id, size, quantity)| Op::Update { id, size, quantity }),
        1 => Just(Op::Clear),
    ]
}

fn apply(cart: &mut Cart, op: &Op) {
    match op {
        Op::Add { id, size, price } => {
            let mut p = Product::new(format!("jus-{id}"), format!("Jus {id}"), *price as u64);
            p.size = size_name(*size);
            cart.add_to_cart(p);
        }
        Op::Remove { id, size } => {
            let size = size_name(*size);
            cart.remove_from_cart(&LineKey::new(format!("jus-{id}"), size.as_deref()));
        }
        Op::RemoveProduct { id } => {
            cart.remove_product(&format!("jus-{id}"));
        }
        Op::Update { id, size, quantity } => {
            let size = size_name(*size);
            cart.update_quantity(&LineKey::new(format!("jus-{id}"), size.as_deref()), *quantity);
        }
        Op::Clear => cart.clear_cart(),
    }
}

proptest! {
    #[test]
    fn totals_match_lines_after_every_op(ops in proptest::collection::vec(op(), 1..60)) {
        let mut cart = Cart::new();
        for op in &ops {
            apply(&mut cart, op);

            let qty: u64 = cart.items().iter().map(|i| i.quantity as u64).sum();
            let price: u64 = cart.items().iter().map(|i| i.price * i.quantity as u64).sum();
            prop_assert_eq!(cart.total_items(), qty);
            prop_assert_eq!(cart.total_price(), price);
        }
    }

    #[test]
    fn lines_are_unique_and_positive(ops in proptest::collection::vec(op(), 1..60)) {
        let mut cart = Cart::new();
        for op in &ops {
            apply(&mut cart, op);
        }

        let mut keys: Vec<LineKey> = cart.items().iter().map(|i| i.key()).collect();
        let total = keys.len();
        keys.sort_by(|a, b| (&a.id, &a.size).cmp(&(&b.id, &b.size)));
        keys.dedup();
        prop_assert_eq!(keys.len(), total);
        prop_assert!(cart.items().iter().all(|i| i.quantity >= 1));
    }
}
