use std::fmt::Write;

use rust_decimal::Decimal;

use crate::{
    domain::order_rules::{OrderStatus, PaymentMethod, PaymentStatus},
    entity::{addresses, order_items, orders},
};

const RULE: &str = "------------------------------------------------------------------------";

pub fn file_name(order_number: &str) -> String {
    format!("invoice_{order_number}.txt")
}

fn money(value: Decimal) -> String {
    format!("₹{:.2}", value)
}

/// Plain-text invoice for a placed order.
pub fn render(
    order: &orders::Model,
    items: &[order_items::Model],
    address: Option<&addresses::Model>,
) -> String {
    let status = order
        .status
        .parse::<OrderStatus>()
        .map(|s| s.label().to_string())
        .unwrap_or_else(|_| order.status.clone());
    let payment_method = order
        .payment_method
        .parse::<PaymentMethod>()
        .map(|m| m.label().to_string())
        .unwrap_or_else(|_| order.payment_method.clone());
    let payment_status = order
        .payment_status
        .parse::<PaymentStatus>()
        .map(|s| s.label().to_string())
        .unwrap_or_else(|_| order.payment_status.clone());

    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "SANJERI PERFUMES");
    let _ = writeln!(out, "INVOICE - #{}", order.order_number);
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(
        out,
        "Order Date: {:<30} Status: {}",
        order.created_at.format("%B %d, %Y"),
        status
    );
    let _ = writeln!(
        out,
        "Payment Method: {:<26} Payment Status: {}",
        payment_method, payment_status
    );
    let _ = writeln!(out, "{RULE}");

    match address {
        Some(addr) => {
            let _ = writeln!(out, "BILL TO / SHIP TO:");
            let _ = writeln!(out, "  {}", addr.full_name);
            let _ = writeln!(out, "  {}", addr.phone);
            let _ = writeln!(out, "  {}", addr.address_line1);
            if let Some(line2) = addr.address_line2.as_ref().filter(|l| !l.is_empty()) {
                let _ = writeln!(out, "  {line2}");
            }
            let _ = writeln!(out, "  {}", addr.city);
            let _ = writeln!(out, "  {} - {}", addr.state, addr.postal_code);
        }
        None => {
            let _ = writeln!(out, "SHIP TO: address no longer available");
        }
    }
    let _ = writeln!(out, "{RULE}");

    let _ = writeln!(
        out,
        "{:<28} {:<16} {:>5} {:>10} {:>10}",
        "Product", "Variant", "Qty", "Unit", "Total"
    );
    for item in items {
        let name = if item.is_cancelled {
            format!("{} (cancelled)", item.product_name)
        } else {
            item.product_name.clone()
        };
        let _ = writeln!(
            out,
            "{:<28} {:<16} {:>5} {:>10} {:>10}",
            name,
            item.variant_details,
            item.quantity,
            money(item.unit_price),
            money(item.total_price)
        );
    }
    let _ = writeln!(out, "{RULE}");

    let shipping = if order.shipping_charge > Decimal::ZERO {
        money(order.shipping_charge)
    } else {
        "FREE".to_string()
    };
    let _ = writeln!(out, "{:<50}{:>20}", "Subtotal:", money(order.subtotal));
    let _ = writeln!(out, "{:<50}{:>20}", "Shipping:", shipping);
    let _ = writeln!(out, "{:<50}{:>20}", "Tax (18%):", money(order.tax_amount));
    if order.discount_amount > Decimal::ZERO {
        let _ = writeln!(
            out,
            "{:<50}{:>20}",
            "Discount:",
            format!("-{}", money(order.discount_amount))
        );
    }
    let _ = writeln!(out, "{:<50}{:>20}", "TOTAL:", money(order.total_amount));
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Thank you for your business!");
    let _ = writeln!(out, "Sanjeri Perfumes - A Scent Beyond the Soul");
    let _ = writeln!(out, "For any queries, please contact our customer support");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use uuid::Uuid;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn order(shipping: &str, discount: &str) -> orders::Model {
        let at = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2025, 1, 14, 10, 0, 0)
            .unwrap();
        orders::Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            order_number: "ORD202501140001".into(),
            shipping_address_id: None,
            status: "pending".into(),
            payment_method: "cod".into(),
            payment_status: "pending".into(),
            subtotal: dec("1200.00"),
            shipping_charge: dec(shipping),
            tax_amount: dec("216.00"),
            discount_amount: dec(discount),
            total_amount: dec("1296.00"),
            cancellation_reason: None,
            return_reason: None,
            cancelled_at: None,
            returned_at: None,
            delivered_at: None,
            notes: None,
            tracking_number: None,
            gateway_order_id: None,
            gateway_payment_id: None,
            gateway_signature: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn free_shipping_and_discount_lines() {
        let text = render(&order("0", "120.00"), &[], None);
        assert!(text.contains("INVOICE - #ORD202501140001"));
        assert!(text.contains("FREE"));
        assert!(text.contains("-₹120.00"));
        assert!(text.contains("Cash on Delivery"));
    }

    #[test]
    fn discount_line_omitted_when_zero() {
        let text = render(&order("40.00", "0"), &[], None);
        assert!(!text.contains("Discount:"));
        assert!(text.contains("₹40.00"));
    }

    #[test]
    fn file_name_uses_order_number() {
        assert_eq!(file_name("ORD202501140001"), "invoice_ORD202501140001.txt");
    }
}
