use std::{fmt, str::FromStr};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Days after delivery during which a return is accepted.
pub const RETURN_WINDOW_DAYS: i64 = 7;

pub const ALL_ITEMS_CANCELLED_REASON: &str = "All items cancelled individually";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    OutForDelivery,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Shipped,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::OutForDelivery => "Out for Delivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Refunded => "Refunded",
        }
    }

    pub fn can_be_cancelled(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    /// Online payment is refused once the order is closed out.
    pub fn accepts_payment(&self) -> bool {
        !matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Pending,
        PaymentStatus::Completed,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Completed => "Completed",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Refunded => "Refunded",
        }
    }

    pub fn is_payable(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cod,
    Online,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 2] = [PaymentMethod::Cod, PaymentMethod::Online];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "cod",
            PaymentMethod::Online => "online",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "Cash on Delivery",
            PaymentMethod::Online => "Online Payment",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownValue(pub String);

impl fmt::Display for UnknownValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value `{}`", self.0)
    }
}

impl std::error::Error for UnknownValue {}

macro_rules! parse_by_as_str {
    ($ty:ty) => {
        impl FromStr for $ty {
            type Err = UnknownValue;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$ty>::ALL
                    .into_iter()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| UnknownValue(s.to_string()))
            }
        }
    };
}

parse_by_as_str!(OrderStatus);
parse_by_as_str!(PaymentStatus);
parse_by_as_str!(PaymentMethod);

/// A return is allowed for delivered orders within the return window, measured
/// from delivery or, when that was never recorded, from placement.
pub fn can_be_returned(
    status: OrderStatus,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> bool {
    if status != OrderStatus::Delivered {
        return false;
    }
    let since = delivered_at.unwrap_or(created_at);
    since >= now - Duration::days(RETURN_WINDOW_DAYS)
}

/// Day prefix of an order number, e.g. `ORD20250114`.
pub fn order_number_prefix(date: NaiveDate) -> String {
    format!("ORD{}", date.format("%Y%m%d"))
}

/// Next number for the day given the last issued one (if any).
pub fn next_order_number(date: NaiveDate, last: Option<&str>) -> String {
    let prefix = order_number_prefix(date);
    let next = last
        .and_then(|n| n.strip_prefix(prefix.as_str()))
        .and_then(|seq| seq.parse::<u32>().ok())
        .map(|n| n + 1)
        .unwrap_or(1);
    format!("{prefix}{next:04}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn status_strings_round_trip() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert!("paid".parse::<OrderStatus>().is_err());
        assert_eq!("online".parse::<PaymentMethod>(), Ok(PaymentMethod::Online));
    }

    #[test]
    fn only_early_states_cancel() {
        assert!(OrderStatus::Pending.can_be_cancelled());
        assert!(OrderStatus::Confirmed.can_be_cancelled());
        assert!(!OrderStatus::Shipped.can_be_cancelled());
        assert!(!OrderStatus::Delivered.can_be_cancelled());
    }

    #[test]
    fn return_window_uses_delivery_time() {
        let now = Utc.with_ymd_and_hms(2025, 3, 20, 12, 0, 0).unwrap();
        let created = now - Duration::days(30);
        assert!(can_be_returned(
            OrderStatus::Delivered,
            Some(now - Duration::days(6)),
            created,
            now
        ));
        assert!(!can_be_returned(
            OrderStatus::Delivered,
            Some(now - Duration::days(8)),
            created,
            now
        ));
        assert!(!can_be_returned(OrderStatus::Delivered, None, created, now));
        assert!(!can_be_returned(
            OrderStatus::Shipped,
            Some(now),
            created,
            now
        ));
    }

    #[test]
    fn order_numbers_follow_daily_sequence() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 14).unwrap();
        assert_eq!(next_order_number(day, None), "ORD202501140001");
        assert_eq!(
            next_order_number(day, Some("ORD202501140041")),
            "ORD202501140042"
        );
        assert_eq!(
            next_order_number(day, Some("ORD202501130007")),
            "ORD202501140001"
        );
    }

    #[test]
    fn order_numbers_widen_past_four_digits() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 14).unwrap();
        assert_eq!(
            next_order_number(day, Some("ORD202501149999")),
            "ORD2025011410000"
        );
        assert_eq!(
            next_order_number(day, Some("ORD2025011410000")),
            "ORD2025011410001"
        );
    }

    #[test]
    fn payable_states() {
        assert!(PaymentStatus::Pending.is_payable());
        assert!(PaymentStatus::Failed.is_payable());
        assert!(!PaymentStatus::Completed.is_payable());
        assert!(!OrderStatus::Cancelled.accepts_payment());
    }
}
