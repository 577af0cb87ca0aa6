//! Domain entities and invariant logic, free of storage and HTTP concerns.

pub mod account;
pub mod adoption;
pub mod listing;
pub mod money;
pub mod order;
pub mod payment;

pub use account::Account;
pub use adoption::{AdoptionRecord, NewAdoption};
pub use listing::{CategoryRate, Listing, NewCategoryRate, NewListing};
pub use order::{
    NewOrder, NewOrderItem, NewProduct, Order, OrderItem, OrderStatus, Product, order_total,
};
pub use payment::{
    GatewayStatus, NewPaymentTransaction, PaymentStatus, PaymentTransaction,
};
